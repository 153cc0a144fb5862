//! Graph storage using graphqlite.
//!
//! [`GraphSession`] is the seam the builder and the query interface talk
//! to; [`GraphStore`] implements it on SQLite with Cypher query support.

use std::path::Path;

use graphqlite::{Graph, Value};

use crate::model::{Node, PropertyValue, Relationship};
use crate::schema::Statement;
use crate::schema::statement::node_fields;

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Error type for graph store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] graphqlite::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A transactional executor for merge statements and read queries.
pub trait GraphSession {
    /// Apply all statements as one unit. Returns the number applied.
    fn execute_batch(&self, statements: &[Statement]) -> Result<usize>;

    /// Run a read query.
    fn query(&self, cypher: &str) -> Result<Vec<Row>>;
}

/// Persistent storage for the code knowledge graph.
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    /// Open or create a graph database at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let graph = Graph::open(path)?;
        Ok(Self { graph })
    }

    /// Create an in-memory graph database.
    pub fn open_in_memory() -> Result<Self> {
        let graph = Graph::open_in_memory()?;
        Ok(Self { graph })
    }

    /// Merge a node by id.
    pub fn upsert_node(&self, node: &Node) -> Result<()> {
        let fields = node_fields(node);
        let props: Vec<(&str, graphqlite::PropertyValue)> = fields
            .iter()
            .map(|(key, value)| (*key, stored_value(value)))
            .collect();
        self.graph.upsert_node(&node.id, props, &node.kind.label())?;
        Ok(())
    }

    /// Merge a relationship between two existing nodes.
    pub fn upsert_relationship(&self, relationship: &Relationship) -> Result<()> {
        let props: Vec<(&str, graphqlite::PropertyValue)> = relationship
            .properties
            .iter()
            .map(|(key, value)| (key.as_str(), stored_value(value)))
            .collect();
        self.graph.upsert_edge(
            &relationship.source_node_id,
            &relationship.target_node_id,
            props,
            &relationship.kind.store_label(),
        )?;
        Ok(())
    }

    fn apply(&self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::MergeNode { node, .. } => self.upsert_node(node),
            Statement::MergeRelationship { relationship, .. } => {
                self.upsert_relationship(relationship)
            }
        }
    }

    /// Delete all nodes (and their edges) recorded for a file.
    ///
    /// Used before re-indexing a single changed file.
    pub fn clear_file(&self, file_path: &str) -> Result<usize> {
        let cypher = format!(
            "MATCH (n {{file_path: '{}'}}) RETURN n.id",
            graphqlite::escape_string(file_path)
        );
        let result = self.graph.query(&cypher)?;
        let ids: Vec<String> = result
            .iter()
            .filter_map(|row| row.get::<String>("n.id").ok())
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        self.in_transaction(|| {
            ids.iter()
                .try_for_each(|id| self.graph.delete_node(id).map_err(StoreError::from))
        })?;
        Ok(ids.len())
    }

    /// Run `work` between BEGIN and COMMIT, rolling back if either fails.
    fn in_transaction(&self, work: impl FnOnce() -> Result<()>) -> Result<()> {
        self.graph.connection().execute("BEGIN")?;
        let outcome = work().and_then(|()| {
            self.graph.connection().execute("COMMIT")?;
            Ok(())
        });
        if outcome.is_err() {
            let _ = self.graph.connection().execute("ROLLBACK");
        }
        outcome
    }

    /// Check if a node exists.
    pub fn has_node(&self, node_id: &str) -> Result<bool> {
        Ok(self.graph.has_node(node_id)?)
    }

    /// Get graph statistics.
    pub fn stats(&self) -> Result<GraphStats> {
        let stats = self.graph.stats()?;
        Ok(GraphStats {
            node_count: stats.node_count,
            edge_count: stats.edge_count,
        })
    }
}

impl GraphSession for GraphStore {
    fn execute_batch(&self, statements: &[Statement]) -> Result<usize> {
        if statements.is_empty() {
            return Ok(0);
        }
        self.in_transaction(|| statements.iter().try_for_each(|s| self.apply(s)))?;
        Ok(statements.len())
    }

    fn query(&self, cypher: &str) -> Result<Vec<Row>> {
        let result = self.graph.query(cypher)?;
        let columns: Vec<String> = result.columns().to_vec();
        Ok(result
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| {
                        let value = row.get_value(column).map(value_to_json);
                        (column.clone(), value.unwrap_or(serde_json::Value::Null))
                    })
                    .collect()
            })
            .collect())
    }
}

/// Graph statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStats {
    pub node_count: i64,
    pub edge_count: i64,
}

/// Typed form of a property for graphqlite.
///
/// Text is passed as `Text` so names that look numeric or boolean stay
/// strings. Lists are stored as a JSON array string.
fn stored_value(value: &PropertyValue) -> graphqlite::PropertyValue {
    match value {
        PropertyValue::Bool(b) => graphqlite::PropertyValue::Bool(*b),
        PropertyValue::Integer(i) => graphqlite::PropertyValue::Integer(*i),
        PropertyValue::Text(_) | PropertyValue::List(_) => {
            graphqlite::PropertyValue::Text(value.to_storage_string())
        }
    }
}

/// Convert a graphqlite Value to a serde_json Value.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(arr) => serde_json::Value::Array(arr.iter().map(value_to_json).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Namespace, NodeKind, RelKind, RelVerb};
    use serial_test::serial;

    fn class(name: &str, file: &str) -> Node {
        Node::new(
            NodeKind::new(Namespace::Java, Category::Class),
            format!("com.example.{name}"),
            name,
            file,
            1,
        )
    }

    #[test]
    #[serial]
    fn test_store_open_in_memory() {
        let store = GraphStore::open_in_memory().expect("Should open in-memory store");
        let stats = store.stats().expect("Should get stats");
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.edge_count, 0);
    }

    #[test]
    #[serial]
    fn test_execute_batch_merges() {
        let store = GraphStore::open_in_memory().unwrap();
        let base = class("Base", "Base.java");
        let child = class("Child", "Child.java");
        let extends = Relationship::new(
            RelKind::new(Namespace::Java, RelVerb::Extends),
            child.id.clone(),
            base.id.clone(),
        );
        let batch = vec![
            Statement::node(&base),
            Statement::node(&child),
            Statement::relationship(&extends),
        ];

        assert_eq!(store.execute_batch(&batch).unwrap(), 3);
        assert_eq!(
            store.stats().unwrap(),
            GraphStats {
                node_count: 2,
                edge_count: 1
            }
        );

        // Re-applying the same statements leaves the graph unchanged.
        store.execute_batch(&batch).unwrap();
        assert_eq!(store.stats().unwrap().node_count, 2);
        assert_eq!(store.stats().unwrap().edge_count, 1);
        assert!(store.has_node(&child.id).unwrap());
    }

    #[test]
    #[serial]
    fn test_query_rows() {
        let store = GraphStore::open_in_memory().unwrap();
        store
            .execute_batch(&[Statement::node(&class("Foo", "Foo.java"))])
            .unwrap();

        let rows = store
            .query("MATCH (n:JavaClass) RETURN n.name AS name, n.node_type AS kind")
            .expect("Should query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Foo");
        assert_eq!(rows[0]["kind"], "JavaClass");
    }

    #[test]
    #[serial]
    fn test_contains_is_stored_under_safe_type() {
        let store = GraphStore::open_in_memory().unwrap();
        let file = Node::new(NodeKind::generic(Category::File), "A.java", "A.java", "A.java", 1);
        let foo = class("Foo", "A.java");
        let contains = Relationship::new(RelKind::CONTAINS, file.id.clone(), foo.id.clone());
        store
            .execute_batch(&[
                Statement::node(&file),
                Statement::node(&foo),
                Statement::relationship(&contains),
            ])
            .unwrap();

        let rows = store
            .query("MATCH (a)-[r]->(b) RETURN type(r) AS rel")
            .unwrap();
        assert_eq!(rows.len(), 1);
        let stored = rows[0]["rel"].as_str().unwrap();
        assert_eq!(RelKind::from_label(stored), Some(RelKind::CONTAINS));
    }

    #[test]
    #[serial]
    fn test_clear_file() {
        let store = GraphStore::open_in_memory().unwrap();
        store
            .execute_batch(&[
                Statement::node(&class("A", "one.java")),
                Statement::node(&class("B", "one.java")),
                Statement::node(&class("C", "two.java")),
            ])
            .unwrap();

        assert_eq!(store.clear_file("one.java").unwrap(), 2);
        assert_eq!(store.stats().unwrap().node_count, 1);
        assert_eq!(store.clear_file("missing.java").unwrap(), 0);
    }

    #[test]
    #[serial]
    fn test_properties_keep_their_types() {
        let store = GraphStore::open_in_memory().unwrap();
        let stub = Node::stub(NodeKind::new(Namespace::Java, Category::Class), "org.lib.Base");
        let odd = class("007", "true.java").with_property("modifiers", vec!["public".to_string()]);
        store
            .execute_batch(&[Statement::node(&stub), Statement::node(&odd)])
            .unwrap();

        let rows = store
            .query("MATCH (n) WHERE n.stub = true RETURN n.name AS name, n.stub AS stub")
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Base");
        assert_eq!(rows[0]["stub"], serde_json::Value::Bool(true));

        let rows = store
            .query(&format!(
                "MATCH (n {{id: '{}'}}) RETURN n.name AS name, n.file_path AS file, n.line_number AS line, n.modifiers AS modifiers",
                odd.id
            ))
            .unwrap();
        assert_eq!(rows[0]["name"], "007");
        assert_eq!(rows[0]["file"], "true.java");
        assert_eq!(rows[0]["line"], 1);
        assert_eq!(rows[0]["modifiers"], r#"["public"]"#);
    }

    #[test]
    #[serial]
    fn test_failed_commit_rolls_back() {
        let store = GraphStore::open_in_memory().unwrap();
        store
            .execute_batch(&[Statement::node(&class("Foo", "Foo.java"))])
            .unwrap();
        let connection = store.graph.connection();
        connection.execute("PRAGMA foreign_keys = ON").unwrap();

        // A dangling edge only fails at COMMIT once foreign keys are deferred.
        let result = store.in_transaction(|| {
            connection.execute("PRAGMA defer_foreign_keys = ON")?;
            connection.execute(
                "INSERT INTO edges (source_id, target_id, type) VALUES (999, 998, 'DANGLING')",
            )?;
            Ok(())
        });

        assert!(result.is_err());
        assert!(connection.sqlite_connection().is_autocommit());
        assert_eq!(store.stats().unwrap().edge_count, 0);
        store
            .execute_batch(&[Statement::node(&class("Bar", "Bar.java"))])
            .expect("Store should accept new work after a failed commit");
        assert_eq!(store.stats().unwrap().node_count, 2);
    }

    #[test]
    #[serial]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.db");
        let store = GraphStore::open(&path).expect("Should open file store");
        store
            .execute_batch(&[Statement::node(&class("Foo", "Foo.java"))])
            .unwrap();
        drop(store);

        let reopened = GraphStore::open(&path).unwrap();
        assert_eq!(reopened.stats().unwrap().node_count, 1);
    }
}
