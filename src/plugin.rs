use std::path::Path;

use anyhow::Result;

use crate::analyze::{CoverageReport, ReportFormat};

/// An analysis tool that runs against the saves folder.
///
/// Tools are statically linked: each contributes a label for the tool
/// listing and an entry point taking the saves directory. This replaces the
/// original dynamically loaded plugins; nothing is decrypted or executed
/// from files at runtime.
pub trait Tool {
    fn label(&self) -> &'static str;
    fn run(&self, saves_dir: &Path, format: ReportFormat) -> Result<()>;
}

pub fn builtin_tools() -> Vec<Box<dyn Tool>> {
    vec![Box::new(CoverageReport)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_the_coverage_report() {
        let tools = builtin_tools();
        assert_eq!(tools.len(), 1);
        assert!(tools[0].label().to_lowercase().contains("coverage"));
    }
}
