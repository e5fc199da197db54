//! Workflow step-template catalog
//!
//! Maps a workflow name to its ordered step list. The catalog is data, not
//! logic: compiled-in defaults can be replaced per-deployment by a TOML
//! file, so adding a workflow does not require a redeploy.

use serde::Deserialize;
use sitebeam_common::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Workflow names accepted by row validation
///
/// A spreadsheet row naming anything else is a row error. The catalog may
/// still lack steps for an accepted name (see [`WorkflowCatalog::steps`]).
pub const ALLOWED_WORKFLOWS: &[&str] = &["fabrication", "erection", "inspection"];

pub fn is_allowed_workflow(name: &str) -> bool {
    ALLOWED_WORKFLOWS.contains(&name)
}

/// TOML shape: `[workflows]` table of name -> step list
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    workflows: BTreeMap<String, Vec<String>>,
}

/// Static workflow-name → ordered-step-list catalog
#[derive(Debug, Clone)]
pub struct WorkflowCatalog {
    steps: BTreeMap<String, Vec<String>>,
}

impl WorkflowCatalog {
    /// Compiled-in defaults
    pub fn builtin() -> Self {
        let mut steps = BTreeMap::new();
        steps.insert(
            "fabrication".to_string(),
            vec![
                "Cut".to_string(),
                "Drill".to_string(),
                "Weld".to_string(),
                "Grind".to_string(),
                "Paint".to_string(),
            ],
        );
        steps.insert(
            "erection".to_string(),
            vec![
                "Deliver".to_string(),
                "Shake out".to_string(),
                "Hoist".to_string(),
                "Bolt up".to_string(),
                "Plumb".to_string(),
                "Torque".to_string(),
            ],
        );
        steps.insert(
            "inspection".to_string(),
            vec![
                "Visual check".to_string(),
                "Weld inspection".to_string(),
                "Sign off".to_string(),
            ],
        );
        Self { steps }
    }

    /// Load the builtin catalog, then overlay entries from a TOML file
    ///
    /// A name present in the file replaces the builtin step list wholesale.
    pub fn load(path: &Path) -> Result<Self> {
        let mut catalog = Self::builtin();
        if !path.exists() {
            return Ok(catalog);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read workflow catalog failed: {}", e)))?;
        let file: CatalogFile = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse workflow catalog failed: {}", e)))?;
        for (name, steps) in file.workflows {
            catalog.steps.insert(name, steps);
        }
        Ok(catalog)
    }

    /// Ordered step list for a workflow name, if the catalog knows it
    pub fn steps(&self, name: &str) -> Option<&[String]> {
        self.steps.get(name).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_catalog_covers_allowed_workflows() {
        let catalog = WorkflowCatalog::builtin();
        for name in ALLOWED_WORKFLOWS {
            let steps = catalog.steps(name).unwrap();
            assert!(!steps.is_empty());
        }
        assert!(catalog.steps("demolition").is_none());
    }

    #[test]
    fn toml_override_replaces_builtin_steps() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[workflows]\nfabrication = [\"Cut\", \"Weld\"]\nsurvey = [\"Stake out\"]"
        )
        .unwrap();

        let catalog = WorkflowCatalog::load(file.path()).unwrap();
        assert_eq!(
            catalog.steps("fabrication").unwrap(),
            &["Cut".to_string(), "Weld".to_string()]
        );
        // builtin entries not named in the file survive
        assert_eq!(catalog.steps("erection").unwrap().len(), 6);
        // new entries from the file are available
        assert_eq!(catalog.steps("survey").unwrap().len(), 1);
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let catalog = WorkflowCatalog::load(Path::new("/nonexistent/workflows.toml")).unwrap();
        assert!(catalog.steps("fabrication").is_some());
    }
}
