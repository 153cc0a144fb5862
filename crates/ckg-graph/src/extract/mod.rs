//! Fact extraction: per-language extractors behind a common trait.
//!
//! An [`Extractor`] turns one source file into a [`LanguageRecord`]. The
//! [`ExtractorRegistry`] maps file extensions to extractors and the
//! [`coordinator`] fans extraction out over a whole project.

pub mod coordinator;
pub mod scanner;

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::lang::{DartExtractor, JavaExtractor, KotlinExtractor, PythonExtractor};
use crate::language::Language;
use crate::record::LanguageRecord;

/// Errors that can occur while extracting a single file.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("File is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("Parsing exceeded the {timeout_ms} ms timeout")]
    Timeout { timeout_ms: u64 },

    #[error("Failed to parse source code: {0}")]
    ParseFailed(String),

    #[error("Failed to set parser language: {0}")]
    Language(String),

    #[error("Failed to compile query: {0}")]
    Query(String),
}

/// How an extractor obtains its facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    /// Line-oriented pattern scanning; best effort.
    Heuristic,
    /// A real grammar (tree-sitter).
    Parser,
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fidelity::Heuristic => write!(f, "heuristic"),
            Fidelity::Parser => write!(f, "parser"),
        }
    }
}

/// Tuning for extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Per-file parse timeout for parser-backed extractors.
    pub parse_timeout_ms: u64,
    /// Files larger than this are reported as failures without being read.
    pub max_file_bytes: u64,
    /// Worker threads; 0 uses every core.
    pub threads: usize,
    /// Directory names never descended into.
    pub exclude_dirs: Vec<String>,
    /// Honour `.gitignore` and friends while walking.
    pub follow_gitignore: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            parse_timeout_ms: 5_000,
            max_file_bytes: 2 * 1024 * 1024,
            threads: 0,
            exclude_dirs: [
                "build",
                "target",
                "node_modules",
                ".gradle",
                ".dart_tool",
                "__pycache__",
                ".venv",
                "venv",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            follow_gitignore: true,
        }
    }
}

/// Result of extracting a single file. Never an `Err`: failures are data.
#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    pub record: Option<LanguageRecord>,
    pub success: bool,
    pub error: Option<String>,
    pub line_count: usize,
}

impl ExtractOutcome {
    fn failed(error: impl Into<String>, line_count: usize) -> Self {
        Self {
            record: None,
            success: false,
            error: Some(error.into()),
            line_count,
        }
    }
}

/// Language-specific fact extractor.
///
/// Implementations hold no per-file state, so one instance is shared by
/// every worker thread.
pub trait Extractor: Send + Sync {
    fn language(&self) -> Language;

    fn fidelity(&self) -> Fidelity;

    /// File extensions this extractor handles.
    fn extensions(&self) -> &'static [&'static str] {
        self.language().extensions()
    }

    /// Extract facts from already-loaded source.
    fn extract(
        &self,
        path: &Path,
        relative_path: &str,
        source: &str,
    ) -> Result<LanguageRecord, ExtractError>;

    /// Read and extract a file, converting every failure (including a
    /// panic inside the extractor) into an unsuccessful outcome.
    fn extract_file(&self, path: &Path, relative_path: &str, max_file_bytes: u64) -> ExtractOutcome {
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => return ExtractOutcome::failed(ExtractError::Io(e).to_string(), 0),
        };
        if size > max_file_bytes {
            let err = ExtractError::TooLarge {
                size,
                limit: max_file_bytes,
            };
            return ExtractOutcome::failed(err.to_string(), 0);
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return ExtractOutcome::failed(ExtractError::Io(e).to_string(), 0),
        };
        let source = String::from_utf8_lossy(&bytes);
        let line_count = source.lines().count();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.extract(path, relative_path, &source)
        }));

        match result {
            Ok(Ok(record)) => ExtractOutcome {
                record: Some(record),
                success: true,
                error: None,
                line_count,
            },
            Ok(Err(e)) => {
                debug!(file = relative_path, error = %e, "Extraction failed");
                ExtractOutcome::failed(e.to_string(), line_count)
            }
            Err(_) => ExtractOutcome::failed(
                format!("{} extractor panicked", self.language()),
                line_count,
            ),
        }
    }
}

/// Maps file extensions to extractors.
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Create a registry with every built-in extractor.
    pub fn new(config: &ExtractionConfig) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(JavaExtractor::new(config.parse_timeout_ms)));
        registry.register(Arc::new(PythonExtractor::new(config.parse_timeout_ms)));
        registry.register(Arc::new(KotlinExtractor::new()));
        registry.register(Arc::new(DartExtractor::new()));
        registry
    }

    /// Register an extractor for its extensions, replacing any previous one.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        for ext in extractor.extensions() {
            self.extractors
                .insert(ext.to_lowercase(), Arc::clone(&extractor));
        }
    }

    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors.get(&extension.to_lowercase()).cloned()
    }

    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn Extractor>> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.for_extension(ext))
    }

    pub fn for_language(&self, language: Language) -> Option<Arc<dyn Extractor>> {
        language
            .extensions()
            .iter()
            .find_map(|ext| self.for_extension(ext))
            .filter(|extractor| extractor.language() == language)
    }

    pub fn can_extract(&self, extension: &str) -> bool {
        self.extractors.contains_key(&extension.to_lowercase())
    }

    /// Registered languages with their fidelity, sorted by language.
    pub fn languages(&self) -> Vec<(Language, Fidelity)> {
        let mut langs: Vec<_> = self
            .extractors
            .values()
            .map(|e| (e.language(), e.fidelity()))
            .collect();
        langs.sort();
        langs.dedup();
        langs
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_registry_has_all_languages() {
        let registry = ExtractorRegistry::default();
        for ext in ["java", "kt", "kts", "dart", "py", "pyi"] {
            assert!(registry.can_extract(ext), "missing extractor for .{ext}");
        }
        assert!(!registry.can_extract("rs"));
        assert_eq!(
            registry.languages(),
            vec![
                (Language::Java, Fidelity::Parser),
                (Language::Kotlin, Fidelity::Heuristic),
                (Language::Dart, Fidelity::Heuristic),
                (Language::Python, Fidelity::Parser),
            ]
        );
    }

    #[test]
    fn test_for_path_and_language() {
        let registry = ExtractorRegistry::default();
        let extractor = registry.for_path(Path::new("src/App.KT")).expect("kotlin");
        assert_eq!(extractor.language(), Language::Kotlin);
        assert!(registry.for_language(Language::Dart).is_some());
        assert!(registry.for_path(Path::new("README")).is_none());
    }

    #[test]
    fn test_extract_file_missing_is_failure() {
        let registry = ExtractorRegistry::default();
        let extractor = registry.for_language(Language::Java).expect("java");
        let outcome = extractor.extract_file(Path::new("/nonexistent/Foo.java"), "Foo.java", 1024);
        assert!(!outcome.success);
        assert!(outcome.record.is_none());
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_extract_file_too_large() {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        writeln!(file, "x = 1\ny = 2\n").unwrap();

        let registry = ExtractorRegistry::default();
        let extractor = registry.for_language(Language::Python).expect("python");
        let outcome = extractor.extract_file(file.path(), "big.py", 4);
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("limit"));
    }
}
