//! Project manifest (`module.json`).

use std::path::Path;

use serde::{Deserialize, Serialize};

/// The `compiler` section of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSection {
    /// `"runnable"` or `"library"`
    pub target: String,
    /// The entry file, relative to the project root
    pub entry: String,
}

/// The `module.json` file at a project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub compiler: CompilerSection,
}

impl ProjectManifest {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(project_dir: &Path) -> std::io::Result<Result<Self, serde_json::Error>> {
        let content = std::fs::read_to_string(project_dir.join("module.json"))?;
        Ok(Self::from_json(&content))
    }

    pub fn is_runnable(&self) -> bool {
        self.compiler.target == "runnable"
    }

    /// Entry file path segments, with the `.tc` extension stripped.
    pub fn entry_segments(&self) -> Vec<String> {
        self.compiler
            .entry
            .trim_end_matches(".tc")
            .split('/')
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let manifest = ProjectManifest::from_json(
            r#"{
                "name": "demo",
                "version": "0.1.0",
                "author": "someone",
                "dependencies": ["vectors"],
                "description": "a demo project",
                "compiler": { "target": "runnable", "entry": "src/main.tc" }
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.name, "demo");
        assert!(manifest.is_runnable());
        assert_eq!(manifest.entry_segments(), vec!["src", "main"]);
    }

    #[test]
    fn optional_fields_default() {
        let manifest = ProjectManifest::from_json(
            r#"{
                "name": "lib",
                "version": "1.0.0",
                "compiler": { "target": "library", "entry": "lib.tc" }
            }"#,
        )
        .unwrap();

        assert!(manifest.author.is_empty());
        assert!(manifest.dependencies.is_empty());
        assert!(!manifest.is_runnable());
    }
}
