//! ckg-graph: Code knowledge graph core
//!
//! This crate turns a multi-language project into a queryable graph:
//! - Fact extraction per file (tree-sitter for Java and Python, line
//!   scanners for Kotlin and Dart)
//! - A schema that validates every node and relationship
//! - An idempotent graph builder that resolves cross-file references
//! - A graphqlite-backed store and a typed query interface

pub mod builder;
pub mod extract;
pub mod lang;
pub mod language;
pub mod model;
pub mod query;
pub mod record;
pub mod schema;
pub mod store;

pub use builder::{BuildConfig, BuildError, BuildResult, GraphBuilder, LanguageRoutine, RoutineRegistry};
pub use extract::coordinator::{Coordinator, ParsedFile, ProjectFileSet, ProjectParseResult, SourceFile};
pub use extract::{ExtractError, ExtractionConfig, Extractor, ExtractorRegistry, Fidelity};
pub use lang::{DartExtractor, JavaExtractor, KotlinExtractor, PythonExtractor};
pub use language::Language;
pub use model::{Category, Namespace, Node, NodeKind, PropertyValue, RelKind, RelVerb, Relationship};
pub use query::{CycleRelation, QueryInterface, QueryResult, SearchMode};
pub use record::LanguageRecord;
pub use schema::{Rejection, Schema, SchemaDescription, Statement};
pub use store::{GraphSession, GraphStats, GraphStore, Row, StoreError};
