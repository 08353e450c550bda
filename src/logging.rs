use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const LOG_DIR: &str = ".prisonfix";
const LOG_FILE: &str = "change_log.jsonl";
const MAX_ENTRIES: usize = 500;

#[derive(Debug, Serialize)]
pub struct ChangeLogEntry<'a> {
    pub timestamp: &'a str,
    pub action: &'a str,
    pub path: &'a Path,
    pub detail: &'a str,
}

/// Appends one entry to the change log beside the working directory.
/// Callers treat logging as advisory: a failure never blocks the fix itself.
pub fn record_action(action: &str, path: &Path, detail: &str) -> Result<()> {
    record_action_in(Path::new(LOG_DIR), action, path, detail)
}

fn record_action_in(dir: &Path, action: &str, path: &Path, detail: &str) -> Result<()> {
    let log_path = ensure_log_file(dir)?;
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into());
    let entry = ChangeLogEntry {
        timestamp: &timestamp,
        action,
        path,
        detail,
    };
    let json = serde_json::to_string(&entry)?;
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&log_path)
        .with_context(|| format!("opening {log_path:?}"))?;
    writeln!(file, "{json}")?;
    truncate_log(&log_path)?;
    Ok(())
}

fn ensure_log_file(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("creating {dir:?}"))?;
    }
    Ok(dir.join(LOG_FILE))
}

fn truncate_log(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("reading {path:?}"))?;
    let reader = BufReader::new(file);
    let lines: Vec<_> = reader.lines().collect::<Result<_, _>>()?;
    if lines.len() <= MAX_ENTRIES {
        return Ok(());
    }
    let keep = &lines[lines.len() - MAX_ENTRIES..];
    fs::write(path, keep.join("\n") + "\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn each_action_appends_one_jsonl_line() {
        let dir = tempdir().expect("temp dir");
        let log_dir = dir.path().join("log");

        record_action_in(&log_dir, "fix", Path::new("/saves/1.prison"), "-9 +5")
            .expect("record");
        record_action_in(&log_dir, "transfer", Path::new("/saves/2.prison"), "copied")
            .expect("record");

        let contents = fs::read_to_string(log_dir.join(LOG_FILE)).expect("read log");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"action\":\"fix\""));
        assert!(lines[1].contains("\"action\":\"transfer\""));
    }

    #[test]
    fn log_is_capped_at_the_newest_entries() {
        let dir = tempdir().expect("temp dir");
        let log_dir = dir.path().join("log");
        let log_path = log_dir.join(LOG_FILE);
        fs::create_dir_all(&log_dir).expect("log dir");
        let filler: String = (0..MAX_ENTRIES)
            .map(|idx| format!("{{\"n\":{idx}}}\n"))
            .collect();
        fs::write(&log_path, filler).expect("seed log");

        record_action_in(&log_dir, "fix", Path::new("x.prison"), "-1 +1").expect("record");

        let contents = fs::read_to_string(&log_path).expect("read log");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), MAX_ENTRIES);
        assert!(lines.last().expect("last line").contains("x.prison"));
    }
}
