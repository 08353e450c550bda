use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use is_terminal::IsTerminal;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

mod analyze;
mod backup;
mod diff;
mod encoding;
mod logging;
mod plugin;
mod repair;
mod saves;
mod scan;

use analyze::ReportFormat;

#[derive(Parser)]
#[command(
    name = "prisonfix",
    version,
    about = "Repairs stuck construction tasks in Prison Architect saves"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace a save's Construction block with a known-good empty one
    Fix(FixCommand),
    /// List saves in the game's saves folder, newest first
    List(ListCommand),
    /// Copy a save (and its screenshot) into the saves folder
    Transfer(TransferCommand),
    /// Report camera and guard coverage for a save or the whole folder
    Analyze(AnalyzeCommand),
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Default)]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn should_color(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        }
    }
}

#[derive(Args)]
struct CommonArgs {
    /// Saves folder override; auto-detected per OS when omitted
    #[arg(long, value_hint = ValueHint::DirPath)]
    saves_dir: Option<PathBuf>,
}

#[derive(Args)]
struct FixCommand {
    /// Save name (with or without .prison) or a full path
    #[arg(value_hint = ValueHint::FilePath)]
    save: String,

    /// Write the repaired file; without this only the preview is shown
    #[arg(long)]
    apply: bool,

    /// Context lines shown around the change in the preview
    #[arg(long, default_value_t = 3)]
    context: usize,

    /// When to color the diff preview
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorChoice,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct ListCommand {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct TransferCommand {
    /// Save file to copy into the game's saves folder
    #[arg(value_hint = ValueHint::FilePath)]
    source: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct AnalyzeCommand {
    /// Save to analyze; all saves in the folder when omitted
    #[arg(value_hint = ValueHint::FilePath)]
    save: Option<String>,

    /// Emit one JSON object per save instead of a table
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Fix(cmd) => handle_fix(cmd),
        Command::List(cmd) => handle_list(cmd),
        Command::Transfer(cmd) => handle_transfer(cmd),
        Command::Analyze(cmd) => handle_analyze(cmd),
    }
}

fn handle_fix(cmd: FixCommand) -> Result<()> {
    let colorize = cmd.color.should_color();
    let path = saves::resolve_save(&cmd.save, cmd.common.saves_dir.as_deref())?;
    let plan = repair::plan_fix(&path)?;

    println!("save: {}", path.display());
    println!("encoding: {}", plan.decoded.encoding);
    let old_block = &plan.decoded.text[plan.span.start..plan.span.end];
    if plan.already_canonical() {
        println!("Construction block already matches the canonical template.");
    }
    println!("--- preview: {} ---", path.display());
    diff::print_diff(
        old_block,
        repair::CONSTRUCTION_TEMPLATE,
        cmd.context,
        colorize,
    );

    if !cmd.apply {
        println!("dry-run: rerun with --apply to write this change.");
        return Ok(());
    }

    let backup_path = plan.commit()?;
    println!("backup saved: {}", backup_path.display());
    println!("fixed {}", path.display());
    let summary = diff::summarize_lines(old_block, repair::CONSTRUCTION_TEMPLATE);
    let _ = logging::record_action("fix", &path, &summary);
    Ok(())
}

fn handle_list(cmd: ListCommand) -> Result<()> {
    let dir = saves::resolve_saves_dir(cmd.common.saves_dir.as_deref())?;
    let saves = saves::list_saves(&dir)?;
    println!("saves folder: {}", dir.display());
    if saves.is_empty() {
        println!("no .prison saves found");
        return Ok(());
    }
    for save in &saves {
        let name = save
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("(unreadable name)");
        println!(
            "  {:<32} [{}] ({})",
            name,
            format_timestamp(save.modified),
            format_size(save.len)
        );
    }
    Ok(())
}

fn handle_transfer(cmd: TransferCommand) -> Result<()> {
    let dir = saves::resolve_saves_dir(cmd.common.saves_dir.as_deref())?;
    let copied = saves::transfer_save(&cmd.source, &dir)?;
    for dest in &copied {
        println!("copied {}", dest.display());
    }
    let _ = logging::record_action(
        "transfer",
        &cmd.source,
        &format!("{} file(s) into {}", copied.len(), dir.display()),
    );
    Ok(())
}

fn handle_analyze(cmd: AnalyzeCommand) -> Result<()> {
    let format = if cmd.json {
        ReportFormat::Json
    } else {
        ReportFormat::Table
    };
    match &cmd.save {
        Some(name) => {
            let path = saves::resolve_save(name, cmd.common.saves_dir.as_deref())?;
            let coverage = analyze::report_save(&path)?;
            analyze::print_coverage(&path, &coverage, format)
        }
        None => {
            let dir = saves::resolve_saves_dir(cmd.common.saves_dir.as_deref())?;
            for tool in plugin::builtin_tools() {
                println!("== {} ==", tool.label());
                tool.run(&dir, format)?;
            }
            Ok(())
        }
    }
}

fn format_timestamp(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into())
}

fn format_size(len: u64) -> String {
    if len >= 1024 * 1024 {
        format!("{:.1} MB", len as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} KB", len as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_scale_between_kb_and_mb() {
        assert_eq!(format_size(512), "0.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn never_disables_color_regardless_of_terminal() {
        assert!(!ColorChoice::Never.should_color());
        assert!(ColorChoice::Always.should_color());
    }
}
