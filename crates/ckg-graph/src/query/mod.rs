//! Typed read queries over a graph session.
//!
//! Every operation returns a [`QueryResult`]; store failures and invalid
//! input are reported through `success` and `error_message`, never raised.
//! Properties are stored as text, so numeric and list fields are decoded
//! here and most filtering on node types happens after the fetch.

pub mod cycles;
mod shapes;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::model::{Category, Namespace, NodeKind, RelKind, RelVerb};
use crate::store::{GraphSession, Row};

pub use cycles::find_cycles;

/// Outcome of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub data: Vec<Value>,
    /// Cypher text that was run; several statements are joined with `;\n`.
    pub query_text: String,
    pub execution_time_ms: f64,
    pub error_message: Option<String>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Name matching for [`QueryInterface::search_by_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Contains,
    Exact,
    Regex,
}

/// Relationship followed by [`QueryInterface::find_circular_dependencies`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleRelation {
    Imports,
    Calls,
}

impl CycleRelation {
    fn rel_kind(&self) -> RelKind {
        match self {
            CycleRelation::Imports => RelKind::IMPORTS,
            CycleRelation::Calls => RelKind::CALLS,
        }
    }
}

/// Read-only queries over a [`GraphSession`].
pub struct QueryInterface<'a, S: GraphSession + ?Sized> {
    session: &'a S,
}

impl<'a, S: GraphSession + ?Sized> QueryInterface<'a, S> {
    pub fn new(session: &'a S) -> Self {
        Self { session }
    }

    /// Run `queries` and shape their rows, timing the whole operation.
    fn run(
        &self,
        queries: &[String],
        shape: impl FnOnce(Vec<Vec<Row>>) -> Vec<Value>,
    ) -> QueryResult {
        let start = Instant::now();
        let query_text = queries.join(";\n");
        let mut results = Vec::with_capacity(queries.len());
        for cypher in queries {
            match self.session.query(cypher) {
                Ok(rows) => results.push(rows),
                Err(e) => {
                    warn!(query = %cypher, error = %e, "Query failed");
                    return QueryResult {
                        success: false,
                        data: Vec::new(),
                        query_text,
                        execution_time_ms: elapsed_ms(start),
                        error_message: Some(e.to_string()),
                    };
                }
            }
        }
        let data = shape(results);
        debug!(rows = data.len(), "Query complete");
        QueryResult {
            success: true,
            data,
            query_text,
            execution_time_ms: elapsed_ms(start),
            error_message: None,
        }
    }

    fn rejected(&self, query_text: String, message: String) -> QueryResult {
        warn!(%message, "Query rejected");
        QueryResult {
            success: false,
            data: Vec::new(),
            query_text,
            execution_time_ms: 0.0,
            error_message: Some(message),
        }
    }

    /// Run an ad-hoc read query.
    pub fn raw(&self, cypher: &str) -> QueryResult {
        self.run(&[cypher.to_string()], |mut results| {
            results
                .pop()
                .unwrap_or_default()
                .into_iter()
                .map(Value::Object)
                .collect()
        })
    }

    /// Callables declared in a file, by line.
    pub fn functions_in_file(&self, file_path: &str) -> QueryResult {
        self.declarations_in_file(file_path, Category::is_callable)
    }

    /// Type declarations in a file, by line.
    pub fn classes_in_file(&self, file_path: &str) -> QueryResult {
        self.declarations_in_file(file_path, Category::is_type_definition)
    }

    fn declarations_in_file(&self, file_path: &str, keep: fn(&Category) -> bool) -> QueryResult {
        let cypher = format!(
            "MATCH (n {{file_path: '{}'}}) RETURN n.name AS name, n.node_type AS type, \
             n.qualified_name AS qualified_name, n.line_number AS line, \
             n.end_line AS end_line, n.signature AS signature",
            graphqlite::escape_string(file_path)
        );
        self.run(&[cypher], |mut results| {
            let mut rows: Vec<Row> = results
                .pop()
                .unwrap_or_default()
                .into_iter()
                .filter(|row| kind_of(row, "type").is_some_and(|k| keep(&k.category)))
                .collect();
            rows.sort_by_key(|row| (number(row, "line").unwrap_or(0), text(row, "name")));
            rows.into_iter().map(decode_row).collect()
        })
    }

    /// Callables that call a function with the given name.
    pub fn callers_of_function(&self, name: &str) -> QueryResult {
        let cypher = format!(
            "MATCH (caller)-[r:{calls}]->(callee) WHERE callee.name = '{name}' \
             RETURN caller.name AS name, caller.qualified_name AS qualified_name, \
             caller.node_type AS type, caller.file_path AS file, r.line AS line, \
             callee.qualified_name AS callee",
            calls = RelKind::CALLS.store_label(),
            name = graphqlite::escape_string(name)
        );
        self.run(&[cypher], sorted_rows)
    }

    /// Callables called by a function with the given name.
    pub fn callees_of_function(&self, name: &str) -> QueryResult {
        let cypher = format!(
            "MATCH (caller)-[r:{calls}]->(callee) WHERE caller.name = '{name}' \
             RETURN callee.name AS name, callee.qualified_name AS qualified_name, \
             callee.node_type AS type, callee.file_path AS file, r.line AS line, \
             caller.qualified_name AS caller",
            calls = RelKind::CALLS.store_label(),
            name = graphqlite::escape_string(name)
        );
        self.run(&[cypher], sorted_rows)
    }

    /// Supertype edges of one namespace.
    ///
    /// With a root, only types below the root (transitively) are returned,
    /// each with its depth under the root.
    pub fn inheritance_tree(&self, namespace: Namespace, root: Option<&str>) -> QueryResult {
        let cypher = format!(
            "MATCH (child)-[r]->(parent) WHERE {} \
             RETURN child.name AS child, child.node_type AS child_type, \
             parent.name AS parent, parent.node_type AS parent_type, \
             type(r) AS relationship",
            type_filter(&hierarchy_kinds(namespace))
        );
        let root = root.map(str::to_string);
        self.run(&[cypher], move |mut results| {
            let mut rows: Vec<Row> = results.pop().unwrap_or_default();
            for row in &mut rows {
                normalize_rel(row, "relationship");
            }
            rows.sort_by_key(|row| (text(row, "parent"), text(row, "child")));

            let Some(root) = root else {
                return rows.into_iter().map(Value::Object).collect();
            };
            let mut children: HashMap<String, Vec<Row>> = HashMap::new();
            for row in rows {
                children.entry(text(&row, "parent")).or_default().push(row);
            }
            let mut out = Vec::new();
            let mut seen = HashSet::from([root.clone()]);
            let mut queue = VecDeque::from([(root, 1usize)]);
            while let Some((parent, depth)) = queue.pop_front() {
                for mut row in children.remove(&parent).unwrap_or_default() {
                    let child = text(&row, "child");
                    row.insert("depth".to_string(), json!(depth));
                    out.push(Value::Object(row));
                    if seen.insert(child.clone()) {
                        queue.push_back((child, depth + 1));
                    }
                }
            }
            out
        })
    }

    /// Node and relationship counts by type, plus languages and stubs.
    pub fn project_statistics(&self) -> QueryResult {
        let queries = [
            "MATCH (n) RETURN n.node_type AS type, n.language AS language, n.stub AS stub".to_string(),
            "MATCH (a)-[r]->(b) RETURN type(r) AS type".to_string(),
        ];
        self.run(&queries, |mut results| {
            let rels = results.pop().unwrap_or_default();
            let nodes = results.pop().unwrap_or_default();

            let mut node_types: BTreeMap<String, usize> = BTreeMap::new();
            let mut languages: BTreeMap<String, usize> = BTreeMap::new();
            let mut stubs = 0usize;
            for row in &nodes {
                let node_type = text(row, "type");
                if node_type == NodeKind::generic(Category::File).label() {
                    *languages.entry(text(row, "language")).or_default() += 1;
                }
                if flag(row, "stub") {
                    stubs += 1;
                }
                *node_types.entry(node_type).or_default() += 1;
            }
            let mut relationship_types: BTreeMap<String, usize> = BTreeMap::new();
            for row in &rels {
                let stored = text(row, "type");
                let label = RelKind::from_label(&stored)
                    .map(|k| k.label())
                    .unwrap_or(stored);
                *relationship_types.entry(label).or_default() += 1;
            }

            vec![json!({
                "total_nodes": nodes.len(),
                "total_relationships": rels.len(),
                "files": languages.values().sum::<usize>(),
                "stub_nodes": stubs,
                "languages": languages,
                "node_types": node_types,
                "relationship_types": relationship_types,
            })]
        })
    }

    /// Nodes whose name matches `pattern`.
    pub fn search_by_name(&self, pattern: &str, mode: SearchMode) -> QueryResult {
        let returns = "RETURN n.name AS name, n.node_type AS type, \
                       n.qualified_name AS qualified_name, n.file_path AS file, \
                       n.line_number AS line";
        let escaped = graphqlite::escape_string(pattern);
        match mode {
            SearchMode::Contains => self.run(
                &[format!("MATCH (n) WHERE n.name CONTAINS '{escaped}' {returns}")],
                sorted_rows,
            ),
            SearchMode::Exact => self.run(
                &[format!("MATCH (n) WHERE n.name = '{escaped}' {returns}")],
                sorted_rows,
            ),
            SearchMode::Regex => {
                let cypher = format!("MATCH (n) {returns}");
                let regex = match Regex::new(pattern) {
                    Ok(regex) => regex,
                    Err(e) => {
                        return self.rejected(cypher, format!("Invalid regex '{pattern}': {e}"));
                    }
                };
                self.run(&[cypher], move |results| {
                    let rows = results
                        .into_iter()
                        .flatten()
                        .filter(|row| regex.is_match(&text(row, "name")))
                        .collect();
                    sorted_rows(vec![rows])
                })
            }
        }
    }

    /// Cycles along `IMPORTS` (file level) or `CALLS` (callable level).
    pub fn find_circular_dependencies(&self, relation: CycleRelation) -> QueryResult {
        let cypher = format!(
            "MATCH (a)-[r:{}]->(b) RETURN a.id AS source, b.id AS target, \
             a.name AS source_name, b.name AS target_name",
            relation.rel_kind().store_label()
        );
        self.run(&[cypher], |mut results| {
            let rows = results.pop().unwrap_or_default();
            let mut names: HashMap<String, String> = HashMap::new();
            let edges: Vec<(String, String)> = rows
                .iter()
                .map(|row| {
                    let source = text(row, "source");
                    let target = text(row, "target");
                    names.insert(source.clone(), text(row, "source_name"));
                    names.insert(target.clone(), text(row, "target_name"));
                    (source, target)
                })
                .collect();

            find_cycles(&edges)
                .into_iter()
                .map(|ids| {
                    let members: Vec<String> = ids
                        .iter()
                        .map(|id| names.get(id).cloned().unwrap_or_else(|| id.clone()))
                        .collect();
                    json!({ "length": ids.len(), "nodes": members, "ids": ids })
                })
                .collect()
        })
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Text of a column; numbers and booleans are stringified, nulls are empty.
pub(crate) fn text(row: &Row, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn number(row: &Row, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean column; accepts a stored bool or its text form.
pub(crate) fn flag(row: &Row, key: &str) -> bool {
    match row.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

pub(crate) fn kind_of(row: &Row, key: &str) -> Option<NodeKind> {
    NodeKind::from_label(&text(row, key))
}

/// Replace a stored relationship type with its public label.
fn normalize_rel(row: &mut Row, key: &str) {
    if let Some(kind) = RelKind::from_label(&text(row, key)) {
        row.insert(key.to_string(), Value::String(kind.label()));
    }
}

/// Columns that only ever hold integers.
const INTEGER_COLUMNS: &[&str] = &["line", "end_line", "line_count", "length", "depth"];

/// Decode JSON-stored lists, and integers some stores return as text.
///
/// Only [`INTEGER_COLUMNS`] are parsed as numbers, so a name like `"2024"`
/// stays a string.
pub(crate) fn decode_row(mut row: Row) -> Value {
    for (key, value) in row.iter_mut() {
        let Value::String(s) = value else {
            continue;
        };
        if s.starts_with('[') {
            if let Ok(list) = serde_json::from_str::<Vec<String>>(s) {
                *value = json!(list);
            }
        } else if INTEGER_COLUMNS.contains(&key.as_str()) {
            if let Ok(n) = s.trim().parse::<i64>() {
                *value = json!(n);
            }
        }
    }
    Value::Object(row)
}

/// Rows of the single query ordered by file, line and name.
fn sorted_rows(mut results: Vec<Vec<Row>>) -> Vec<Value> {
    let mut rows = results.pop().unwrap_or_default();
    rows.sort_by_key(|row| {
        (
            text(row, "file"),
            number(row, "line").unwrap_or(0),
            text(row, "name"),
        )
    });
    rows.into_iter().map(decode_row).collect()
}

/// `type(r) = 'X' OR ...` over the store labels of `kinds`.
fn type_filter(kinds: &[RelKind]) -> String {
    let clauses: Vec<String> = kinds
        .iter()
        .map(|k| format!("type(r) = '{}'", k.store_label()))
        .collect();
    format!("({})", clauses.join(" OR "))
}

fn hierarchy_kinds(namespace: Namespace) -> Vec<RelKind> {
    RelVerb::ALL
        .into_iter()
        .filter(|v| v.is_type_hierarchy())
        .map(|v| RelKind::new(namespace, v))
        .filter(|k| crate::schema::Schema::global().relationship_kinds().any(|r| r == *k))
        .collect()
}
