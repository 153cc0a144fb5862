//! Project-wide extraction.
//!
//! The coordinator enumerates source files, dispatches each one to the
//! extractor registered for its extension and merges the per-file outcomes
//! into a [`ProjectParseResult`]. Files are independent, so extraction runs
//! on a rayon pool; the merged result is sorted and does not depend on
//! completion order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ExtractionConfig, ExtractorRegistry, Fidelity};
use crate::language::Language;
use crate::model::normalize_path;
use crate::record::LanguageRecord;

/// A file to extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub absolute: PathBuf,
    /// Path relative to the project root, `/`-separated.
    pub relative: String,
    pub language: Language,
}

/// An explicit list of files under a project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectFileSet {
    pub root: PathBuf,
    pub files: Vec<SourceFile>,
}

impl ProjectFileSet {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Vec::new(),
        }
    }

    /// Add a file by path; the language comes from its extension.
    ///
    /// Returns false when the extension maps to no supported language.
    pub fn add(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let Some(language) = Language::from_path(path) else {
            return false;
        };
        let absolute = if path.is_absolute() || path.starts_with(&self.root) {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let relative = absolute
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        self.files.push(SourceFile {
            absolute,
            relative: normalize_path(&relative),
            language,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Extraction outcome for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    pub file_path: PathBuf,
    pub relative_path: String,
    pub language: Language,
    pub record: Option<LanguageRecord>,
    pub success: bool,
    pub error_message: Option<String>,
    /// Declarations found (types, callables, fields, imports).
    pub node_count: usize,
    pub line_count: usize,
    pub fidelity: Fidelity,
}

impl ParsedFile {
    /// A successful file built from an in-memory record.
    pub fn from_record(relative_path: impl Into<String>, record: LanguageRecord) -> Self {
        let relative_path = normalize_path(&relative_path.into());
        let language = record.language();
        let fidelity = match language {
            Language::Java | Language::Python => Fidelity::Parser,
            Language::Kotlin | Language::Dart => Fidelity::Heuristic,
        };
        Self {
            file_path: PathBuf::from(&relative_path),
            relative_path,
            language,
            node_count: record.declaration_count(),
            record: Some(record),
            success: true,
            error_message: None,
            line_count: 0,
            fidelity,
        }
    }
}

/// A per-file failure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParseErrorEntry {
    pub file_path: String,
    pub language: Language,
    pub message: String,
}

/// Per-language totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub files: usize,
    pub lines: usize,
    pub failures: usize,
}

/// Merged extraction output for a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectParseResult {
    pub project_path: PathBuf,
    /// Languages present in the file set, sorted.
    pub languages: Vec<Language>,
    /// Sorted by relative path.
    pub parsed_files: Vec<ParsedFile>,
    pub total_files: usize,
    pub total_lines: usize,
    /// Sorted by file path.
    pub parse_errors: Vec<ParseErrorEntry>,
    pub language_stats: BTreeMap<Language, LanguageStats>,
    /// Set when the file set itself could not be enumerated.
    pub enumeration_error: Option<String>,
}

impl ProjectParseResult {
    /// Assemble a result from per-file outcomes in any order.
    pub fn from_parsed(project_path: impl Into<PathBuf>, mut parsed_files: Vec<ParsedFile>) -> Self {
        parsed_files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let mut languages = BTreeSet::new();
        let mut language_stats: BTreeMap<Language, LanguageStats> = BTreeMap::new();
        let mut parse_errors = Vec::new();
        let mut total_lines = 0;

        for file in &parsed_files {
            languages.insert(file.language);
            total_lines += file.line_count;
            let stats = language_stats.entry(file.language).or_default();
            stats.files += 1;
            stats.lines += file.line_count;
            if !file.success {
                stats.failures += 1;
                parse_errors.push(ParseErrorEntry {
                    file_path: file.relative_path.clone(),
                    language: file.language,
                    message: file
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string()),
                });
            }
        }
        parse_errors.sort();

        Self {
            project_path: project_path.into(),
            languages: languages.into_iter().collect(),
            total_files: parsed_files.len(),
            parsed_files,
            total_lines,
            parse_errors,
            language_stats,
            enumeration_error: None,
        }
    }

    fn enumeration_failed(project_path: &Path, error: String) -> Self {
        Self {
            project_path: project_path.to_path_buf(),
            enumeration_error: Some(error),
            ..Default::default()
        }
    }

    /// True unless the file set could not be enumerated. Per-file failures
    /// do not affect this.
    pub fn success(&self) -> bool {
        self.enumeration_error.is_none()
    }

    pub fn successful_files(&self) -> impl Iterator<Item = &ParsedFile> {
        self.parsed_files.iter().filter(|f| f.success)
    }

    pub fn language_stats(&self) -> &BTreeMap<Language, LanguageStats> {
        &self.language_stats
    }
}

/// Runs extraction over a project.
pub struct Coordinator {
    registry: ExtractorRegistry,
    config: ExtractionConfig,
}

impl Coordinator {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            registry: ExtractorRegistry::new(&config),
            config,
        }
    }

    pub fn with_registry(registry: ExtractorRegistry, config: ExtractionConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Enumerate supported source files under `root`.
    pub fn discover(&self, root: &Path) -> Result<ProjectFileSet, String> {
        if !root.is_dir() {
            return Err(format!("{} is not a directory", root.display()));
        }

        let exclude = self.config.exclude_dirs.clone();
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(self.config.follow_gitignore)
            .git_exclude(self.config.follow_gitignore)
            .ignore(self.config.follow_gitignore)
            .require_git(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir && exclude.iter().any(|d| entry.file_name() == d.as_str()))
            })
            .build();

        let mut set = ProjectFileSet::new(root);
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if self.registry.for_path(path).is_some() {
                set.add(path);
            }
        }
        set.files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(set)
    }

    /// Discover and extract every supported file under `root`.
    pub fn parse_project(&self, root: &Path) -> ProjectParseResult {
        match self.discover(root) {
            Ok(set) => self.parse_file_set(&set),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Failed to enumerate project");
                ProjectParseResult::enumeration_failed(root, e)
            }
        }
    }

    /// Extract an explicit file set.
    pub fn parse_file_set(&self, set: &ProjectFileSet) -> ProjectParseResult {
        info!(root = %set.root.display(), files = set.len(), "Extracting project");

        let parsed = if self.config.threads > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .thread_name(|i| format!("ckg-extract-{i}"))
                .build()
            {
                Ok(pool) => pool.install(|| self.extract_all(&set.files)),
                Err(e) => {
                    warn!(error = %e, "Failed to build extraction pool, using the global pool");
                    self.extract_all(&set.files)
                }
            }
        } else {
            self.extract_all(&set.files)
        };

        let result = ProjectParseResult::from_parsed(&set.root, parsed);
        info!(
            files = result.total_files,
            lines = result.total_lines,
            errors = result.parse_errors.len(),
            "Extraction complete"
        );
        result
    }

    fn extract_all(&self, files: &[SourceFile]) -> Vec<ParsedFile> {
        files.par_iter().map(|file| self.extract_one(file)).collect()
    }

    fn extract_one(&self, file: &SourceFile) -> ParsedFile {
        let Some(extractor) = self.registry.for_language(file.language) else {
            return ParsedFile {
                file_path: file.absolute.clone(),
                relative_path: file.relative.clone(),
                language: file.language,
                record: None,
                success: false,
                error_message: Some(format!("No extractor registered for {}", file.language)),
                node_count: 0,
                line_count: 0,
                fidelity: Fidelity::Heuristic,
            };
        };

        let outcome =
            extractor.extract_file(&file.absolute, &file.relative, self.config.max_file_bytes);
        debug!(
            file = %file.relative,
            success = outcome.success,
            lines = outcome.line_count,
            "Extracted file"
        );
        if let Some(error) = &outcome.error {
            warn!(file = %file.relative, %error, "Extraction failed");
        }

        ParsedFile {
            file_path: file.absolute.clone(),
            relative_path: file.relative.clone(),
            language: file.language,
            node_count: outcome
                .record
                .as_ref()
                .map(LanguageRecord::declaration_count)
                .unwrap_or(0),
            record: outcome.record,
            success: outcome.success,
            error_message: outcome.error,
            line_count: outcome.line_count,
            fidelity: extractor.fidelity(),
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_empty_project_succeeds() {
        let dir = TempDir::new().unwrap();
        let result = Coordinator::default().parse_project(dir.path());
        assert!(result.success());
        assert_eq!(result.total_files, 0);
        assert!(result.parsed_files.is_empty());
        assert!(result.parse_errors.is_empty());
    }

    #[test]
    fn test_missing_root_fails_enumeration() {
        let result = Coordinator::default().parse_project(Path::new("/nonexistent/ckg/project"));
        assert!(!result.success());
        assert!(result.enumeration_error.is_some());
    }

    #[test]
    fn test_discover_skips_excluded_and_unsupported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/App.java", "class App {}");
        write(dir.path(), "src/util.py", "x = 1");
        write(dir.path(), "build/Gen.java", "class Gen {}");
        write(dir.path(), "README.md", "# readme");

        let set = Coordinator::default().discover(dir.path()).unwrap();
        let rels: Vec<_> = set.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(rels, vec!["src/App.java", "src/util.py"]);
    }

    #[test]
    fn test_partial_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/One.kt", "package a\nclass One");
        write(dir.path(), "b/two.py", "def two():\n    pass\n");

        let mut set = ProjectFileSet::new(dir.path());
        set.add("a/One.kt");
        set.add("b/two.py");
        set.add("c/Missing.java");
        assert!(!set.add("notes.txt"));

        let result = Coordinator::default().parse_file_set(&set);
        assert!(result.success());
        assert_eq!(result.total_files, 3);
        assert_eq!(result.successful_files().count(), 2);
        assert_eq!(result.parse_errors.len(), 1);
        assert_eq!(result.parse_errors[0].file_path, "c/Missing.java");
        assert_eq!(result.language_stats()[&Language::Java].failures, 1);
        assert_eq!(
            result.languages,
            vec![Language::Java, Language::Kotlin, Language::Python]
        );
    }

    #[test]
    fn test_results_are_sorted_regardless_of_thread_count() {
        let dir = TempDir::new().unwrap();
        for i in 0..12 {
            write(dir.path(), &format!("m{i:02}.py"), "def f():\n    return 1\n");
        }
        let single = Coordinator::new(ExtractionConfig {
            threads: 1,
            ..Default::default()
        })
        .parse_project(dir.path());
        let multi = Coordinator::new(ExtractionConfig {
            threads: 4,
            ..Default::default()
        })
        .parse_project(dir.path());

        let a: Vec<_> = single.parsed_files.iter().map(|f| &f.relative_path).collect();
        let b: Vec<_> = multi.parsed_files.iter().map(|f| &f.relative_path).collect();
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(a, sorted);
    }
}
