//! Source file representation for the Tycho compiler.
//!
//! This module provides the `SourceFile` struct which represents a source file
//! with its path and contents, along with conversions into the diagnostic
//! source types used by error reporting.

use std::{path::PathBuf, sync::Arc};

use miette::NamedSource;

/// A source file with its path and code content.
///
/// The path is stored as components so that module paths (`a.b.c`) and host
/// filesystem paths stay interchangeable. Both fields are shared so cloning a
/// `SourceFile` is cheap; every diagnostic and AST node holds one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// The file path as a vector of path components
    pub path: Arc<Vec<String>>,
    /// The source code content of the file
    pub code: Arc<String>,
}

impl SourceFile {
    /// Creates a new source file with the given path components and code.
    pub fn new(path: Vec<String>, code: String) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
        }
    }

    /// A placeholder file for synthesized nodes that have no source text.
    pub fn synthetic(name: &str) -> Self {
        Self::new(vec![format!("<{name}>")], String::new())
    }

    /// Returns the path joined with the host separator, for display.
    pub fn display_path(&self) -> String {
        PathBuf::from_iter(self.path.iter()).to_string_lossy().into_owned()
    }

    /// Returns a reference to the file path components.
    pub fn path(&self) -> &Vec<String> {
        &self.path
    }

    /// Returns a reference to the source code content.
    pub fn code(&self) -> &str {
        self.code.as_ref()
    }
}

impl From<SourceFile> for NamedSource<String> {
    fn from(file: SourceFile) -> Self {
        NamedSource::new(file.display_path(), file.code.to_string())
    }
}

impl From<&SourceFile> for NamedSource<String> {
    fn from(file: &SourceFile) -> Self {
        NamedSource::new(file.display_path(), file.code.to_string())
    }
}

impl std::fmt::Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SourceFile: {:?}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_path_joins_components() {
        let file = SourceFile::new(vec!["sub".into(), "mod".into()], "x".to_string());
        assert!(file.display_path().contains("sub"));
        assert!(file.display_path().contains("mod"));
    }

    #[test]
    fn synthetic_file_is_empty() {
        let file = SourceFile::synthetic("builtin");
        assert_eq!(file.code(), "");
        assert_eq!(file.path()[0], "<builtin>");
    }
}
