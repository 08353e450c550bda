use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use glob::glob;

/// Extension the game gives its save files.
pub const SAVE_EXTENSION: &str = ".prison";

#[derive(Debug, Clone)]
pub struct SaveFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub len: u64,
}

/// Known saves locations, per OS, first existing directory wins.
///
/// Windows has two: the Documents folder for retail installs and the
/// Introversion AppData folder for Steam ones.
pub fn default_saves_dir() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let candidates: Vec<PathBuf> = if cfg!(target_os = "windows") {
        vec![
            home.join("Documents")
                .join("Prison Architect")
                .join("saves"),
            home.join("AppData")
                .join("Local")
                .join("Introversion")
                .join("Prison Architect")
                .join("saves"),
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            home.join("Library")
                .join("Application Support")
                .join("Prison Architect")
                .join("saves"),
        ]
    } else {
        vec![
            home.join(".local")
                .join("share")
                .join("Prison Architect")
                .join("saves"),
            home.join(".Prison Architect").join("saves"),
        ]
    };
    candidates.into_iter().find(|dir| dir.is_dir())
}

pub fn resolve_saves_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        if !dir.is_dir() {
            bail!("saves directory {} does not exist", dir.display());
        }
        return Ok(dir.to_path_buf());
    }
    default_saves_dir()
        .context("could not locate the Prison Architect saves folder; pass --saves-dir")
}

/// Lists `.prison` files in the folder, newest first.
pub fn list_saves(dir: &Path) -> Result<Vec<SaveFile>> {
    let pattern_path = dir.join(format!("*{SAVE_EXTENSION}"));
    let pattern = pattern_path
        .to_str()
        .ok_or_else(|| anyhow!("saves directory {} is not valid UTF-8", dir.display()))?;

    let mut saves = Vec::new();
    for entry in glob(pattern).with_context(|| format!("listing saves in {}", dir.display()))? {
        let path = entry.map_err(|err| anyhow!("reading saves in {}: {err}", dir.display()))?;
        let metadata =
            fs::metadata(&path).with_context(|| format!("metadata for {}", path.display()))?;
        if !metadata.is_file() {
            continue;
        }
        saves.push(SaveFile {
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
            len: metadata.len(),
            path,
        });
    }
    saves.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(saves)
}

/// Appends the save extension when the name lacks it, case-insensitively.
pub fn normalize_name(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(SAVE_EXTENSION) {
        name.to_string()
    } else {
        format!("{name}{SAVE_EXTENSION}")
    }
}

/// Resolves user input to an existing save file.
///
/// Absolute or path-like inputs are taken as given; bare names resolve
/// inside the saves folder, with the extension appended when missing.
pub fn resolve_save(input: &str, override_dir: Option<&Path>) -> Result<PathBuf> {
    let direct = Path::new(input);
    if direct.is_absolute() || input.contains(std::path::MAIN_SEPARATOR) {
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }
        bail!("save file {input} does not exist");
    }

    let dir = resolve_saves_dir(override_dir)?;
    let candidate = dir.join(input);
    if candidate.is_file() {
        return Ok(candidate);
    }
    let candidate = dir.join(normalize_name(input));
    if candidate.is_file() {
        return Ok(candidate);
    }
    bail!("save '{input}' not found in {}", dir.display())
}

/// Copies a save, and its sibling `.png` screenshot when present, into the
/// saves folder. Returns every destination written.
pub fn transfer_save(source: &Path, saves_dir: &Path) -> Result<Vec<PathBuf>> {
    if !source.is_file() {
        bail!("{} is not a file", source.display());
    }
    let name = source
        .file_name()
        .ok_or_else(|| anyhow!("{} has no file name", source.display()))?;

    let dest = saves_dir.join(name);
    fs::copy(source, &dest)
        .with_context(|| format!("copying {} to {}", source.display(), dest.display()))?;
    let mut copied = vec![dest];

    let screenshot = source.with_extension("png");
    if screenshot.is_file() {
        if let Some(shot_name) = screenshot.file_name() {
            let dest = saves_dir.join(shot_name);
            fs::copy(&screenshot, &dest).with_context(|| {
                format!("copying {} to {}", screenshot.display(), dest.display())
            })?;
            copied.push(dest);
        }
    }

    Ok(copied)
}
