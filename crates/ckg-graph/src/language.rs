//! Supported source languages and their file-extension mapping.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::Namespace;

/// Languages with an extractor in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Java,
    Kotlin,
    Dart,
    Python,
}

impl Language {
    /// Every supported language, in a stable order.
    pub const ALL: [Language; 4] = [
        Language::Java,
        Language::Kotlin,
        Language::Dart,
        Language::Python,
    ];

    /// Detect language from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "java" => Some(Language::Java),
            "kt" | "kts" => Some(Language::Kotlin),
            "dart" => Some(Language::Dart),
            "py" | "pyi" => Some(Language::Python),
            _ => None,
        }
    }

    /// Detect language from file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get file extensions associated with this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Java => &["java"],
            Language::Kotlin => &["kt", "kts"],
            Language::Dart => &["dart"],
            Language::Python => &["py", "pyi"],
        }
    }

    /// Get the display name for this language.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Java => "Java",
            Language::Kotlin => "Kotlin",
            Language::Dart => "Dart",
            Language::Python => "Python",
        }
    }

    /// Lowercase tag used in node properties and config files.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Dart => "dart",
            Language::Python => "python",
        }
    }

    /// The node/relationship namespace this language's facts live in.
    ///
    /// Python has no subtype namespace of its own and uses the generic one.
    pub fn namespace(&self) -> Namespace {
        match self {
            Language::Java => Namespace::Java,
            Language::Kotlin => Namespace::Kotlin,
            Language::Dart => Namespace::Dart,
            Language::Python => Namespace::Generic,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown language: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("java"), Some(Language::Java));
        assert_eq!(Language::from_extension("kt"), Some(Language::Kotlin));
        assert_eq!(Language::from_extension("KTS"), Some(Language::Kotlin));
        assert_eq!(Language::from_extension("dart"), Some(Language::Dart));
        assert_eq!(Language::from_extension("pyi"), Some(Language::Python));
        assert_eq!(Language::from_extension("rs"), None);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(
            Language::from_path(Path::new("src/main/java/App.java")),
            Some(Language::Java)
        );
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("Kotlin".parse::<Language>(), Ok(Language::Kotlin));
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn test_python_uses_generic_namespace() {
        assert_eq!(Language::Python.namespace(), Namespace::Generic);
        assert_eq!(Language::Dart.namespace(), Namespace::Dart);
    }
}
