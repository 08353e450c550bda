use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Marker appended to the filename stem of every backup copy.
const BACKUP_MARKER: &str = "copy";

/// Backup destination beside the source: `5.prison` becomes `5copy.prison`.
pub fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("save");
    let name = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}{BACKUP_MARKER}.{ext}"),
        None => format!("{stem}{BACKUP_MARKER}"),
    };
    path.with_file_name(name)
}

/// Copies the file to its sibling backup path before any rewrite.
///
/// A previous backup at the same destination is replaced: each fix attempt
/// backs up the state it found. The copy is verified complete against the
/// source length; on any failure the caller must not touch the original.
pub fn create_backup(path: &Path) -> Result<PathBuf> {
    let dest = backup_path(path);
    let expected = fs::metadata(path)
        .with_context(|| format!("reading metadata for {}", path.display()))?
        .len();
    let copied = fs::copy(path, &dest)
        .with_context(|| format!("creating backup {}", dest.display()))?;
    if copied != expected {
        bail!(
            "backup {} is incomplete ({copied} of {expected} bytes)",
            dest.display()
        );
    }
    Ok(dest)
}
