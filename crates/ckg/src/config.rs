//! Configuration file support for ckg.
//!
//! All ckg data is stored in a `.ckg/` directory:
//! - `.ckg/config.toml` - Configuration file
//! - `.ckg/graph.db` - Code graph database
//!
//! Config discovery searches for `.ckg/config.toml` starting from the current
//! directory and walking up to parent directories.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ckg_graph::{BuildConfig, ExtractionConfig};
use serde::{Deserialize, Serialize};

/// The ckg data directory name.
pub const CKG_DIR: &str = ".ckg";
/// The config file name within the ckg directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Written by `ckg init`.
pub const DEFAULT_CONFIG: &str = r#"# ckg configuration
# All paths are relative to this .ckg/ directory unless absolute

[project]
root = ".."  # Parent directory (the actual project root)

[graph]
path = "graph.db"  # Stored in .ckg/graph.db

[extraction]
parse_timeout_ms = 5000
max_file_bytes = 2097152
threads = 0  # 0 uses every core
exclude_dirs = ["build", "target", "node_modules", ".gradle", ".dart_tool", "__pycache__", ".venv", "venv"]
follow_gitignore = true

[build]
emit_statements = true
"#;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Project settings.
    pub project: ProjectConfig,
    /// Graph database settings.
    pub graph: GraphConfig,
    /// Extraction tuning.
    pub extraction: ExtractionConfig,
    /// Build pass settings.
    pub build: BuildConfig,
}

/// Project configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Root directory of the project.
    pub root: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

/// Graph database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Path to the graph database.
    pub path: PathBuf,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            // Relative to .ckg/ directory
            path: PathBuf::from("graph.db"),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Find and load configuration from current or parent directories.
    pub fn find_and_load() -> Result<Option<(Self, PathBuf)>> {
        let current = std::env::current_dir()?;
        Self::find_and_load_from(&current)
    }

    /// Find and load configuration starting from a specific directory.
    ///
    /// Returns the config together with the `.ckg` directory it came from.
    pub fn find_and_load_from(start: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start.to_path_buf();

        loop {
            let ckg_dir = dir.join(CKG_DIR);
            let config_path = ckg_dir.join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::from_file(&config_path)?;
                return Ok(Some((config, ckg_dir)));
            }

            if !dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve the graph path relative to the .ckg directory.
    pub fn resolve_graph_path(&self, ckg_dir: Option<&Path>) -> PathBuf {
        if self.graph.path.is_absolute() {
            self.graph.path.clone()
        } else if let Some(dir) = ckg_dir {
            dir.join(&self.graph.path)
        } else {
            PathBuf::from(CKG_DIR).join(&self.graph.path)
        }
    }

    /// Resolve the project root relative to the .ckg directory.
    pub fn resolve_project_root(&self, ckg_dir: Option<&Path>) -> PathBuf {
        match ckg_dir {
            Some(dir) if !self.project.root.is_absolute() => dir.join(&self.project.root),
            _ => self.project.root.clone(),
        }
    }
}
