//! Language-specific extractors.

pub mod dart;
pub mod java;
pub mod kotlin;
pub mod python;

pub use dart::DartExtractor;
pub use java::JavaExtractor;
pub use kotlin::KotlinExtractor;
pub use python::PythonExtractor;

use tree_sitter::{Node, Tree};

use crate::extract::ExtractError;
use crate::record::Span;

/// Parse source with a fresh tree-sitter parser and a bounded timeout.
///
/// A `timeout_ms` of zero disables the timeout.
pub(crate) fn parse_tree(
    language: tree_sitter::Language,
    source: &str,
    timeout_ms: u64,
) -> Result<Tree, ExtractError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| ExtractError::Language(e.to_string()))?;
    #[allow(deprecated)]
    parser.set_timeout_micros(timeout_ms.saturating_mul(1_000));

    parser
        .parse(source, None)
        .ok_or(ExtractError::Timeout { timeout_ms })
}

/// Get text content of a node.
pub(crate) fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

pub(crate) fn span_of(node: &Node) -> Span {
    Span::new(node.start_position().row + 1, node.end_position().row + 1)
}

/// Collapse runs of whitespace so multi-line signatures fit on one line.
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
