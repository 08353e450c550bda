use similar::{ChangeTag, TextDiff};

const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";

/// Prints a line diff of the planned rewrite with `context` unchanged lines
/// around each change group.
pub fn print_diff(old: &str, new: &str, context: usize, colorize: bool) {
    let diff = TextDiff::configure()
        .algorithm(similar::Algorithm::Myers)
        .diff_lines(old, new);

    for (idx, group) in diff.grouped_ops(context).iter().enumerate() {
        if idx > 0 {
            println!("...");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let (sign, color) = match change.tag() {
                    ChangeTag::Delete => ("- ", RED),
                    ChangeTag::Insert => ("+ ", GREEN),
                    ChangeTag::Equal => ("  ", ""),
                };
                if colorize && !color.is_empty() {
                    print!("{color}{sign}{change}{RESET}");
                } else {
                    print!("{sign}{change}");
                }
            }
        }
    }
}

/// Added/removed line counts, for log entries and summaries.
pub fn summarize_lines(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut removed = 0usize;
    let mut added = 0usize;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => removed += 1,
            ChangeTag::Insert => added += 1,
            ChangeTag::Equal => {}
        }
    }
    format!("-{removed} +{added}")
}
