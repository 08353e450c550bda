use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::Serialize;

use crate::encoding;
use crate::plugin::Tool;
use crate::saves;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Json,
}

/// Security-coverage counts pulled from one save by line-anchored scans.
///
/// The save is otherwise opaque; these are the same `Type`/`RoomType`/`Zone`
/// lines the in-game objects serialize to.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub cameras: usize,
    pub monitors: usize,
    pub guards: usize,
    pub patrols: usize,
    pub patrol_points: usize,
    pub cells: usize,
    pub doors: usize,
    pub staff_zones: usize,
    pub minsec_zones: usize,
    pub maxsec_zones: usize,
    pub deathrow_zones: usize,
}

pub fn scan_coverage(text: &str) -> Result<Coverage> {
    Ok(Coverage {
        cameras: count_matches(text, r"(?im)^\s*Type\s+Cctv\s*$")?,
        monitors: count_matches(text, r"(?im)^\s*Type\s+CctvMonitor\s*$")?,
        guards: count_matches(text, r"(?im)^\s*Type\s+Guard\s*$")?,
        patrols: patrol_count(text)?,
        patrol_points: count_matches(text, r"(?im)^\s*Type\s+PatrolPoint\s*$")?,
        cells: count_matches(text, r"(?im)^\s*RoomType\s+Cell\s*$")?,
        doors: count_matches(
            text,
            r"(?im)^\s*Type\s+(?:JailDoor|Door|StaffDoor|DoubleDoor|JailDoorLarge|DoubleStaffDoorBlue)\b",
        )?,
        staff_zones: count_matches(text, r"(?i)Zone\s+StaffOnly")?,
        minsec_zones: count_matches(text, r"(?i)Zone\s+MinSecOnly")?,
        maxsec_zones: count_matches(text, r"(?i)Zone\s+MaxSecOnly")?,
        deathrow_zones: count_matches(text, r"(?i)Zone\s+DeathRow")?,
    })
}

fn count_matches(text: &str, pattern: &str) -> Result<usize> {
    let regex = Regex::new(pattern).map_err(|err| anyhow!("count pattern: {err}"))?;
    Ok(regex.find_iter(text).count())
}

/// Patrol routes come from the `Patrols` section header rather than object
/// counting.
fn patrol_count(text: &str) -> Result<usize> {
    let regex = Regex::new(r"(?i)BEGIN\s+Patrols\s*\n\s*Size\s+(\d+)")
        .map_err(|err| anyhow!("patrol pattern: {err}"))?;
    let Some(captures) = regex.captures(text) else {
        return Ok(0);
    };
    captures[1]
        .parse()
        .map_err(|err| anyhow!("patrol size: {err}"))
}

impl Coverage {
    /// Obvious coverage gaps, in the order the original report listed them.
    pub fn findings(&self) -> Vec<String> {
        let mut findings = Vec::new();
        if self.cameras == 0 {
            findings.push("no surveillance cameras installed".to_string());
        } else if self.monitors == 0 {
            findings.push(format!(
                "{} cameras but no monitors to watch them",
                self.cameras
            ));
        } else if self.monitors < self.cameras / 4 {
            findings.push(format!(
                "only {} monitors for {} cameras (one per four recommended)",
                self.monitors, self.cameras
            ));
        }
        if self.patrols > 0 && self.guards < self.patrols * 2 {
            findings.push(format!(
                "{} patrol routes but only {} guards (two per route recommended)",
                self.patrols, self.guards
            ));
        }
        let high_risk = self.maxsec_zones + self.deathrow_zones;
        if high_risk > 0 && self.cameras < high_risk {
            findings.push(format!(
                "{high_risk} high-security zones with only {} cameras",
                self.cameras
            ));
        }
        findings
    }
}

pub fn report_save(path: &Path) -> Result<Coverage> {
    let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let decoded =
        encoding::decode(&raw).with_context(|| format!("decoding {}", path.display()))?;
    scan_coverage(&decoded.text)
}

#[derive(Serialize)]
struct CoverageRow<'a> {
    path: String,
    #[serde(flatten)]
    coverage: &'a Coverage,
}

pub fn print_coverage(path: &Path, coverage: &Coverage, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Table => {
            println!("{}:", path.display());
            println!(
                "  cameras: {}, monitors: {}, guards: {}, patrols: {} ({} points)",
                coverage.cameras,
                coverage.monitors,
                coverage.guards,
                coverage.patrols,
                coverage.patrol_points
            );
            println!(
                "  cells: {}, doors: {}, zones: staff {}, minsec {}, maxsec {}, deathrow {}",
                coverage.cells,
                coverage.doors,
                coverage.staff_zones,
                coverage.minsec_zones,
                coverage.maxsec_zones,
                coverage.deathrow_zones
            );
            let findings = coverage.findings();
            if findings.is_empty() {
                println!("  coverage looks healthy");
            } else {
                for finding in findings {
                    println!("  ! {finding}");
                }
            }
        }
        ReportFormat::Json => {
            let row = CoverageRow {
                path: path.display().to_string(),
                coverage,
            };
            println!("{}", serde_json::to_string(&row)?);
        }
    }
    Ok(())
}

/// The built-in tool: coverage rows for every save in the folder.
pub struct CoverageReport;

impl Tool for CoverageReport {
    fn label(&self) -> &'static str {
        "Camera and guard coverage report"
    }

    fn run(&self, saves_dir: &Path, format: ReportFormat) -> Result<()> {
        let saves = saves::list_saves(saves_dir)?;
        if saves.is_empty() {
            println!("no .prison saves found in {}", saves_dir.display());
            return Ok(());
        }
        for save in &saves {
            match report_save(&save.path) {
                Ok(coverage) => print_coverage(&save.path, &coverage, format)?,
                Err(err) => println!("skipping {}: {err:#}", save.path.display()),
            }
        }
        Ok(())
    }
}
