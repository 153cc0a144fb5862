//! Graph construction from extraction results.
//!
//! A build pass walks every successfully parsed file in relative-path
//! order, turns its record into nodes and relationships inside a
//! [`WorkingSet`], resolves cross-file references once every file has
//! been seen, validates everything against the [`Schema`] and renders
//! merge statements. [`GraphBuilder::build_into`] also executes them.

pub mod arena;
mod dart;
mod emit;
mod java;
mod kotlin;
mod python;
mod resolve;

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::extract::coordinator::{ParsedFile, ProjectParseResult};
use crate::language::Language;
use crate::model::{Category, Namespace, Node, NodeKind, RelKind, RelVerb};
use crate::record::{CallSite, CallableDecl, FieldDecl, ImportDecl, LanguageRecord, TypeDecl};
use crate::schema::{Schema, Statement};
use crate::store::{GraphSession, StoreError};

pub use arena::{Origin, PendingRef, SuperClause, WorkingSet};
pub use dart::DartRoutine;
pub use java::JavaRoutine;
pub use kotlin::KotlinRoutine;
pub use python::PythonRoutine;

/// Error type for store execution during a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Graph store rejected the batch: {0}")]
    Store(#[from] StoreError),
    #[error("Batch write failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: usize,
        #[source]
        source: StoreError,
    },
}

/// Builder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Keep rendered statement text in [`BuildResult::statements`].
    pub emit_statements: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            emit_statements: true,
        }
    }
}

/// Outcome of one build pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub success: bool,
    pub nodes_created: usize,
    pub relationships_created: usize,
    /// Rendered statements, nodes first. Empty unless statements are emitted.
    pub statements: Vec<String>,
    pub statement_count: usize,
    /// Statements applied by the session, if one was used.
    pub executed: usize,
    pub errors: Vec<String>,
    /// Schema rejections and skipped files.
    pub warnings: Vec<String>,
    pub node_types: BTreeMap<String, usize>,
    pub relationship_types: BTreeMap<String, usize>,
    pub created_nodes: Vec<String>,
}

/// Language-neutral view of one record.
#[derive(Debug, Clone)]
pub struct RecordView<'r> {
    /// Package, library or module name and its declaration line.
    pub scope: Option<(Cow<'r, str>, usize)>,
    pub scope_doc: Option<&'r str>,
    pub imports: &'r [ImportDecl],
    pub types: &'r [TypeDecl],
    pub callables: &'r [CallableDecl],
    pub fields: &'r [FieldDecl],
    pub calls: &'r [CallSite],
}

/// How one language's record maps onto the graph.
pub trait LanguageRoutine: Send + Sync {
    fn language(&self) -> Language;

    fn namespace(&self) -> Namespace {
        self.language().namespace()
    }

    /// The record's declarations, or `None` if it belongs to another language.
    fn view<'r>(&self, record: &'r LanguageRecord) -> Option<RecordView<'r>>;

    /// Category of the package/library/module node.
    fn scope_category(&self) -> Category;

    fn type_category(&self, decl: &TypeDecl) -> Category;

    fn callable_category(&self, decl: &CallableDecl) -> Category;

    fn field_category(&self) -> Category;

    /// Relationship from the scope node to a top-level declaration.
    fn scope_link(&self, _child: Category) -> RelKind {
        RelKind::CONTAINS
    }

    /// Supertypes named by a type declaration.
    fn supertypes(&self, decl: &TypeDecl) -> Vec<(SuperClause, String)> {
        let mut out = Vec::new();
        if let Some(superclass) = &decl.superclass {
            out.push((SuperClause::Superclass, superclass.clone()));
        }
        out.extend(
            decl.interfaces
                .iter()
                .map(|i| (SuperClause::Interface, i.clone())),
        );
        out.extend(decl.mixins.iter().map(|m| (SuperClause::Mixin, m.clone())));
        out
    }

    /// Category of the stub created for an unresolved supertype.
    fn stub_category(&self, clause: SuperClause) -> Category;

    fn hierarchy_verb(&self, source: Category, target: Category, clause: SuperClause) -> RelVerb;

    fn is_override(&self, _decl: &CallableDecl) -> bool {
        false
    }

    /// Whether annotations become `ANNOTATED_WITH` relationships.
    fn links_annotations(&self) -> bool {
        false
    }

    /// Receiver type of an extension declaration.
    fn extension_target<'d>(&self, _decl: &'d TypeDecl) -> Option<&'d str> {
        None
    }

    /// Project files an import refers to, as relative paths.
    fn import_targets(&self, set: &WorkingSet, from: &str, import: &ImportRef<'_>) -> Vec<String>;
}

/// An import waiting for resolution.
#[derive(Debug, Clone, Copy)]
pub struct ImportRef<'a> {
    pub path: &'a str,
    pub name: Option<&'a str>,
    pub wildcard: bool,
}

/// Routines keyed by language.
pub struct RoutineRegistry {
    routines: BTreeMap<Language, Box<dyn LanguageRoutine>>,
}

impl RoutineRegistry {
    pub fn empty() -> Self {
        Self {
            routines: BTreeMap::new(),
        }
    }

    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(JavaRoutine));
        registry.register(Box::new(KotlinRoutine));
        registry.register(Box::new(DartRoutine));
        registry.register(Box::new(PythonRoutine));
        registry
    }

    pub fn register(&mut self, routine: Box<dyn LanguageRoutine>) {
        self.routines.insert(routine.language(), routine);
    }

    pub fn get(&self, language: Language) -> Option<&dyn LanguageRoutine> {
        self.routines.get(&language).map(|r| r.as_ref())
    }

    pub fn for_namespace(&self, namespace: Namespace) -> Option<&dyn LanguageRoutine> {
        self.routines
            .values()
            .find(|r| r.namespace() == namespace)
            .map(|r| r.as_ref())
    }
}

impl Default for RoutineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The file being processed.
#[derive(Debug, Clone, Copy)]
pub struct FileContext<'a> {
    pub relative_path: &'a str,
    pub file_id: &'a str,
    pub language: Language,
}

/// Builds the graph for a [`ProjectParseResult`].
pub struct GraphBuilder<'s> {
    schema: &'s Schema,
    routines: RoutineRegistry,
    config: BuildConfig,
}

impl GraphBuilder<'static> {
    pub fn new() -> Self {
        Self::with_schema(Schema::global())
    }
}

impl Default for GraphBuilder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s> GraphBuilder<'s> {
    pub fn with_schema(schema: &'s Schema) -> Self {
        Self {
            schema,
            routines: RoutineRegistry::new(),
            config: BuildConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_routines(mut self, routines: RoutineRegistry) -> Self {
        self.routines = routines;
        self
    }

    /// Produce the statements for a parse result without executing them.
    pub fn build(&self, result: &ProjectParseResult) -> BuildResult {
        self.plan(result).0
    }

    /// Produce the statements and execute them as one batch.
    ///
    /// A failed batch is retried once with the same statements; a second
    /// failure fails the build.
    pub fn build_into(&self, result: &ProjectParseResult, session: &dyn GraphSession) -> BuildResult {
        let (mut outcome, statements) = self.plan(result);
        match execute_with_retry(session, &statements) {
            Ok(executed) => {
                outcome.executed = executed;
                info!(executed, "Graph store updated");
            }
            Err(e) => {
                warn!(error = %e, "Build failed");
                outcome.success = false;
                outcome.errors.push(e.to_string());
            }
        }
        outcome
    }

    /// Run a build pass and return the result with its statements.
    pub fn plan(&self, result: &ProjectParseResult) -> (BuildResult, Vec<Statement>) {
        let mut set = WorkingSet::new();

        for parsed in &result.parsed_files {
            self.process_file(parsed, &mut set);
        }
        resolve::resolve_pending(&self.routines, &mut set);

        let mut outcome = BuildResult {
            success: true,
            ..Default::default()
        };
        outcome.warnings.extend(set.warnings().iter().cloned());

        let mut accepted: HashSet<&str> = HashSet::new();
        let mut statements = Vec::new();
        for node in set.nodes() {
            match self.schema.check_node(node) {
                Ok(()) => {
                    accepted.insert(node.id.as_str());
                    *outcome.node_types.entry(node.kind.label()).or_default() += 1;
                    outcome.created_nodes.push(node.id.clone());
                    statements.push(self.schema.node_statement(node));
                }
                Err(rejection) => {
                    warn!(%rejection, "Node rejected");
                    outcome.warnings.push(rejection.to_string());
                }
            }
        }

        for rel in set.relationships() {
            if !accepted.contains(rel.source_node_id.as_str())
                || !accepted.contains(rel.target_node_id.as_str())
            {
                outcome.warnings.push(format!(
                    "{} {} -> {} dropped: endpoint not in graph",
                    rel.kind, rel.source_node_id, rel.target_node_id
                ));
                continue;
            }
            let (Some(source), Some(target)) =
                (set.kind_of(&rel.source_node_id), set.kind_of(&rel.target_node_id))
            else {
                continue;
            };
            match self.schema.check_relationship(rel, source, target) {
                Ok(()) => {
                    *outcome.relationship_types.entry(rel.kind.label()).or_default() += 1;
                    statements.push(self.schema.relationship_statement(rel));
                }
                Err(rejection) => {
                    warn!(%rejection, "Relationship rejected");
                    outcome.warnings.push(rejection.to_string());
                }
            }
        }

        outcome.nodes_created = outcome.created_nodes.len();
        outcome.relationships_created = outcome.relationship_types.values().sum();
        outcome.statement_count = statements.len();
        if self.config.emit_statements {
            outcome.statements = statements.iter().map(|s| s.text().to_string()).collect();
        }

        info!(
            files = result.parsed_files.len(),
            nodes = outcome.nodes_created,
            relationships = outcome.relationships_created,
            warnings = outcome.warnings.len(),
            "Build pass complete"
        );
        (outcome, statements)
    }

    fn process_file(&self, parsed: &ParsedFile, set: &mut WorkingSet) {
        let relative = parsed.relative_path.as_str();
        let Some(record) = parsed.record.as_ref().filter(|_| parsed.success) else {
            set.warn(format!(
                "{relative}: skipped ({})",
                parsed.error_message.as_deref().unwrap_or("not parsed")
            ));
            return;
        };
        let Some(routine) = self.routines.get(parsed.language) else {
            set.warn(format!("{relative}: no build routine for {}", parsed.language));
            return;
        };
        let Some(view) = routine.view(record) else {
            set.warn(format!(
                "{relative}: {} record does not match file language {}",
                record.language(),
                parsed.language
            ));
            return;
        };

        let file_node = Node::new(
            NodeKind::generic(Category::File),
            relative,
            file_name(relative),
            relative,
            1,
        )
        .with_property("language", parsed.language.name())
        .with_property("relative_path", relative)
        .with_property("line_count", parsed.line_count)
        .with_property("fidelity", parsed.fidelity.to_string());
        let file_id = set.add_file(relative, file_node);

        debug!(file = relative, language = %parsed.language, "Building file");
        let context = FileContext {
            relative_path: relative,
            file_id: &file_id,
            language: parsed.language,
        };
        emit::emit_record(routine, &context, view, set);
    }
}

fn file_name(relative_path: &str) -> &str {
    relative_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(relative_path)
}

/// Execute a batch, retrying once on failure.
pub fn execute_with_retry(
    session: &dyn GraphSession,
    statements: &[Statement],
) -> Result<usize, BuildError> {
    match session.execute_batch(statements) {
        Ok(n) => Ok(n),
        Err(StoreError::InvalidData(message)) => {
            Err(BuildError::Store(StoreError::InvalidData(message)))
        }
        Err(first) => {
            warn!(error = %first, "Batch write failed, retrying once");
            session
                .execute_batch(statements)
                .map_err(|source| BuildError::RetryExhausted {
                    attempts: 2,
                    source,
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::coordinator::ProjectParseResult;
    use crate::extract::Fidelity;
    use crate::record::{JavaRecord, KotlinRecord, Span, TypeKind};
    use crate::store::Row;
    use std::cell::Cell;
    use std::path::PathBuf;

    fn parsed(relative: &str, record: LanguageRecord) -> ParsedFile {
        ParsedFile::from_record(relative, record)
    }

    fn project(files: Vec<ParsedFile>) -> ProjectParseResult {
        ProjectParseResult::from_parsed(PathBuf::from("/project"), files)
    }

    fn kotlin_scenario() -> ProjectParseResult {
        let record = crate::lang::KotlinExtractor::new()
            .extract_source("package com.example\n\nclass Foo\n\nfun bar() {}\n")
            .unwrap();
        project(vec![parsed("src/Foo.kt", LanguageRecord::Kotlin(record))])
    }

    /// Session that fails a configurable number of times before succeeding.
    struct FlakySession {
        failures: Cell<usize>,
        calls: Cell<usize>,
    }

    impl FlakySession {
        fn failing(times: usize) -> Self {
            Self {
                failures: Cell::new(times),
                calls: Cell::new(0),
            }
        }
    }

    impl GraphSession for FlakySession {
        fn execute_batch(&self, statements: &[Statement]) -> crate::store::Result<usize> {
            self.calls.set(self.calls.get() + 1);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            Ok(statements.len())
        }

        fn query(&self, _cypher: &str) -> crate::store::Result<Vec<Row>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_kotlin_scenario() {
        let outcome = GraphBuilder::new().build(&kotlin_scenario());
        assert!(outcome.success);
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
        assert_eq!(outcome.node_types.get("KotlinPackage"), Some(&1));
        assert_eq!(outcome.node_types.get("KotlinClass"), Some(&1));
        assert_eq!(outcome.node_types.get("KotlinFunction"), Some(&1));
        assert_eq!(outcome.node_types.get("File"), Some(&1));
        // file -> package, package -> class, package -> function
        assert_eq!(outcome.relationship_types.get("CONTAINS"), Some(&3));
        assert_eq!(outcome.statement_count, outcome.statements.len());
        assert!(outcome.statements.iter().all(|s| s.starts_with("MERGE") || s.starts_with("MATCH")));
    }

    #[test]
    fn test_build_is_idempotent() {
        let builder = GraphBuilder::new();
        let first = builder.build(&kotlin_scenario());
        let second = builder.build(&kotlin_scenario());
        assert_eq!(first.created_nodes, second.created_nodes);
        assert_eq!(first.statements, second.statements);
    }

    #[test]
    fn test_failed_files_are_skipped_with_warning() {
        let mut failed = parsed("Broken.java", LanguageRecord::Java(JavaRecord::default()));
        failed.success = false;
        failed.record = None;
        failed.error_message = Some("unreadable".to_string());
        let outcome = GraphBuilder::new().build(&project(vec![failed]));
        assert!(outcome.success);
        assert_eq!(outcome.nodes_created, 0);
        assert!(outcome.warnings[0].contains("Broken.java"));
    }

    #[test]
    fn test_mismatched_record_is_skipped() {
        let mut file = parsed("Foo.java", LanguageRecord::Kotlin(KotlinRecord::default()));
        file.language = Language::Java;
        let outcome = GraphBuilder::new().build(&project(vec![file]));
        assert_eq!(outcome.nodes_created, 0);
        assert!(outcome.warnings.iter().any(|w| w.contains("does not match")));
    }

    #[test]
    fn test_type_without_line_is_rejected() {
        let mut record = JavaRecord::default();
        record.types.push(TypeDecl::new("Foo", TypeKind::Class, Span::new(0, 0)));
        let outcome = GraphBuilder::new().build(&project(vec![parsed(
            "Foo.java",
            LanguageRecord::Java(record),
        )]));
        assert_eq!(outcome.node_types.get("JavaClass"), None);
        assert!(outcome.warnings.iter().any(|w| w.contains("line_number")));
        assert!(outcome.warnings.iter().any(|w| w.contains("endpoint not in graph")));
    }

    #[test]
    fn test_emit_statements_off() {
        let outcome = GraphBuilder::new()
            .with_config(BuildConfig {
                emit_statements: false,
            })
            .build(&kotlin_scenario());
        assert!(outcome.statements.is_empty());
        assert!(outcome.statement_count > 0);
    }

    #[test]
    fn test_build_into_retries_once() {
        let session = FlakySession::failing(1);
        let outcome = GraphBuilder::new().build_into(&kotlin_scenario(), &session);
        assert!(outcome.success);
        assert_eq!(session.calls.get(), 2);
        assert_eq!(outcome.executed, outcome.statement_count);
    }

    #[test]
    fn test_build_into_fails_after_second_failure() {
        let session = FlakySession::failing(2);
        let outcome = GraphBuilder::new().build_into(&kotlin_scenario(), &session);
        assert!(!outcome.success);
        assert_eq!(session.calls.get(), 2);
        assert!(outcome.errors[0].contains("2 attempts"));
    }

    #[test]
    fn test_parsed_fidelity_recorded_on_file() {
        let (_, statements) = GraphBuilder::new().plan(&kotlin_scenario());
        let file = statements
            .iter()
            .find_map(|s| match s {
                Statement::MergeNode { node, .. } if node.kind.category == Category::File => {
                    Some(node.clone())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(
            file.property("fidelity").and_then(|p| p.as_text()),
            Some(Fidelity::Heuristic.to_string().as_str())
        );
        assert_eq!(file.name, "Foo.kt");
    }
}
