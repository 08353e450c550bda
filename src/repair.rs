use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use time::OffsetDateTime;

use crate::backup;
use crate::encoding::{self, DecodedSave};
use crate::scan::{self, BlockSpan};

/// Tag of the section this tool repairs.
pub const CONSTRUCTION_TAG: &str = "Construction";

/// Canonical healthy Construction section: no pending jobs, a pre-sized
/// planning queue, no blocked areas. Emitted verbatim in place of the
/// located block, never derived from the file's own content.
pub const CONSTRUCTION_TEMPLATE: &str = "\nBEGIN Construction\n\
BEGIN Jobs Size 0 END\n\
BEGIN PlanningJobs Size 16000 END\n\
BEGIN BlockedAreas END\n\
END\n";

/// Pure splice of the replacement block over the located span.
pub fn replace_block(text: &str, span: BlockSpan, template: &str) -> String {
    let mut out = String::with_capacity(text.len() - span.len() + template.len());
    out.push_str(&text[..span.start]);
    out.push_str(template);
    out.push_str(&text[span.end..]);
    out
}

/// Everything needed to rewrite one save, computed without touching the file.
///
/// Planning reads, decodes and locates; committing backs up and writes. At
/// most one fix may be active against a given path at a time: no file lock
/// is taken, callers running fixes in parallel must use distinct paths.
#[derive(Debug)]
pub struct FixPlan {
    pub path: PathBuf,
    pub decoded: DecodedSave,
    pub span: BlockSpan,
    pub new_text: String,
}

pub fn plan_fix(path: &Path) -> Result<FixPlan> {
    let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let decoded =
        encoding::decode(&raw).with_context(|| format!("decoding {}", path.display()))?;
    let Some(span) = scan::find_block(&decoded.text, CONSTRUCTION_TAG)? else {
        bail!(
            "no balanced Construction block found in {}",
            path.display()
        );
    };
    let new_text = replace_block(&decoded.text, span, CONSTRUCTION_TEMPLATE);
    Ok(FixPlan {
        path: path.to_path_buf(),
        decoded,
        span,
        new_text,
    })
}

impl FixPlan {
    /// True when the located block already matches the canonical template.
    pub fn already_canonical(&self) -> bool {
        &self.decoded.text[self.span.start..self.span.end] == CONSTRUCTION_TEMPLATE
    }

    /// Backs up the original, then rewrites it under the encoding detected at
    /// decode time. The original is written only once the backup exists; a
    /// failed write restores from that backup. Returns the backup path.
    pub fn commit(&self) -> Result<PathBuf> {
        let encoded = encoding::encode(&self.new_text, self.decoded.encoding)
            .with_context(|| format!("re-encoding {}", self.path.display()))?;
        let backup_path = backup::create_backup(&self.path)
            .with_context(|| format!("backing up {}", self.path.display()))?;
        if let Err(err) = write_via_temp(&self.path, &encoded) {
            restore_from_backup(&backup_path, &self.path);
            return Err(err).with_context(|| format!("writing {}", self.path.display()));
        }
        Ok(backup_path)
    }
}

fn restore_from_backup(backup_path: &Path, path: &Path) {
    if let Err(err) = fs::copy(backup_path, path) {
        println!(
            "warning: could not restore {} from {}: {err}",
            path.display(),
            backup_path.display()
        );
    }
}

fn write_via_temp(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let unique = format!(
        ".prisonfix-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = dir.join(unique);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("creating temp file {}", temp_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing temp file {}", temp_path.display()))?;
    }
    fs::rename(&temp_path, path).or_else(|err| {
        let _ = fs::remove_file(&temp_path);
        Err(err).with_context(|| format!("replacing {}", path.display()))
    })?;
    Ok(())
}
