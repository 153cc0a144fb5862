//! Language-shape queries: data classes, extensions, sealed hierarchies
//! and overrides.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::{QueryInterface, QueryResult, decode_row, kind_of, text, type_filter};
use crate::model::{Category, Namespace, NodeKind, RelKind, RelVerb};
use crate::store::{GraphSession, Row};

/// Node types that are data classes without further checks.
const DATA_CLASS_KINDS: [NodeKind; 2] = [
    NodeKind::new(Namespace::Kotlin, Category::DataClass),
    NodeKind::new(Namespace::Java, Category::Record),
];

fn node_type_filter(kinds: &[NodeKind]) -> String {
    let clauses: Vec<String> = kinds
        .iter()
        .map(|k| format!("n.node_type = '{}'", k.label()))
        .collect();
    format!("({})", clauses.join(" OR "))
}

fn list_contains(row: &Row, key: &str, item: &str) -> bool {
    match row.get(key) {
        Some(serde_json::Value::Array(items)) => items.iter().any(|i| i == item),
        _ => serde_json::from_str::<Vec<String>>(&text(row, key))
            .map(|items| items.iter().any(|i| i == item))
            .unwrap_or(false),
    }
}

fn in_namespace(row: &Row, key: &str, namespace: Option<Namespace>) -> bool {
    namespace.is_none_or(|ns| kind_of(row, key).is_some_and(|k| k.namespace == ns))
}

impl<'a, S: GraphSession + ?Sized> QueryInterface<'a, S> {
    /// Kotlin data classes, Java records and Python `@dataclass` classes.
    pub fn find_data_classes(&self, namespace: Option<Namespace>) -> QueryResult {
        let mut kinds = DATA_CLASS_KINDS.to_vec();
        kinds.push(NodeKind::generic(Category::Class));
        let cypher = format!(
            "MATCH (n) WHERE {} RETURN n.name AS name, n.node_type AS type, \
             n.qualified_name AS qualified_name, n.file_path AS file, \
             n.line_number AS line, n.annotations AS annotations",
            node_type_filter(&kinds)
        );
        self.run(&[cypher], move |mut results| {
            let mut rows: Vec<Row> = results
                .pop()
                .unwrap_or_default()
                .into_iter()
                .filter(|row| in_namespace(row, "type", namespace))
                .filter(|row| match kind_of(row, "type") {
                    Some(kind) if DATA_CLASS_KINDS.contains(&kind) => true,
                    Some(_) => {
                        list_contains(row, "annotations", "dataclass")
                            || list_contains(row, "annotations", "dataclasses.dataclass")
                    }
                    None => false,
                })
                .collect();
            rows.sort_by_key(|row| (text(row, "file"), text(row, "name")));
            rows.into_iter().map(decode_row).collect()
        })
    }

    /// Kotlin extension functions and properties and Dart extensions,
    /// optionally limited to one receiver type.
    pub fn find_extension_functions(&self, receiver: Option<&str>) -> QueryResult {
        let kinds = [
            RelKind::new(Namespace::Kotlin, RelVerb::ExtensionOf),
            RelKind::new(Namespace::Dart, RelVerb::ExtensionOf),
        ];
        let cypher = format!(
            "MATCH (n)-[r]->(t) WHERE {} RETURN n.name AS name, n.node_type AS type, \
             n.qualified_name AS qualified_name, n.file_path AS file, \
             n.line_number AS line, t.name AS receiver",
            type_filter(&kinds)
        );
        let receiver = receiver.map(str::to_string);
        self.run(&[cypher], move |mut results| {
            let mut rows: Vec<Row> = results
                .pop()
                .unwrap_or_default()
                .into_iter()
                .filter(|row| {
                    receiver
                        .as_deref()
                        .is_none_or(|r| text(row, "receiver") == r)
                })
                .collect();
            rows.sort_by_key(|row| (text(row, "receiver"), text(row, "name")));
            rows.into_iter().map(decode_row).collect()
        })
    }

    /// Kotlin sealed classes and Dart `sealed` classes with their direct subtypes.
    pub fn find_sealed_hierarchies(&self) -> QueryResult {
        let roots = [
            NodeKind::new(Namespace::Kotlin, Category::SealedClass),
            NodeKind::new(Namespace::Dart, Category::Class),
        ];
        let subtype_kinds = [
            RelKind::new(Namespace::Kotlin, RelVerb::Extends),
            RelKind::new(Namespace::Kotlin, RelVerb::Implements),
            RelKind::new(Namespace::Dart, RelVerb::Extends),
            RelKind::new(Namespace::Dart, RelVerb::Implements),
        ];
        let queries = [
            format!(
                "MATCH (n) WHERE {} RETURN n.id AS id, n.name AS name, n.node_type AS type, \
                 n.file_path AS file, n.line_number AS line, n.modifiers AS modifiers",
                node_type_filter(&roots)
            ),
            format!(
                "MATCH (child)-[r]->(parent) WHERE {} RETURN parent.id AS parent, \
                 child.name AS name, child.node_type AS type",
                type_filter(&subtype_kinds)
            ),
        ];
        self.run(&queries, |mut results| {
            let edges = results.pop().unwrap_or_default();
            let nodes = results.pop().unwrap_or_default();

            let mut subtypes: BTreeMap<String, Vec<Value>> = BTreeMap::new();
            for edge in edges {
                subtypes
                    .entry(text(&edge, "parent"))
                    .or_default()
                    .push(json!({ "name": text(&edge, "name"), "type": text(&edge, "type") }));
            }

            let mut sealed: Vec<Row> = nodes
                .into_iter()
                .filter(|row| {
                    kind_of(row, "type").is_some_and(|k| k.namespace == Namespace::Kotlin)
                        || list_contains(row, "modifiers", "sealed")
                })
                .collect();
            sealed.sort_by_key(|row| (text(row, "file"), text(row, "name")));
            sealed
                .into_iter()
                .map(|mut row| {
                    let id = text(&row, "id");
                    let mut children = subtypes.remove(&id).unwrap_or_default();
                    children.sort_by_key(|c| c["name"].as_str().unwrap_or("").to_string());
                    row.remove("modifiers");
                    row.insert("subtypes".to_string(), Value::Array(children));
                    decode_row(row)
                })
                .collect()
        })
    }

    /// Override edges whose overriding member is named `member`.
    pub fn find_overrides(&self, member: &str, namespace: Option<Namespace>) -> QueryResult {
        let kinds: Vec<RelKind> = [Namespace::Java, Namespace::Kotlin, Namespace::Dart]
            .into_iter()
            .filter(|ns| namespace.is_none_or(|wanted| wanted == *ns))
            .map(|ns| RelKind::new(ns, RelVerb::Overrides))
            .collect();
        if let (true, Some(namespace)) = (kinds.is_empty(), namespace) {
            return self.rejected(
                String::new(),
                format!("{namespace} has no override relationships"),
            );
        }
        let cypher = format!(
            "MATCH (m)-[r]->(p) WHERE {} AND m.name = '{}' \
             RETURN m.name AS name, m.qualified_name AS qualified_name, \
             m.node_type AS type, m.file_path AS file, m.line_number AS line, \
             p.qualified_name AS overrides, p.file_path AS overrides_file",
            type_filter(&kinds),
            graphqlite::escape_string(member)
        );
        self.run(&[cypher], super::sorted_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Statement;
    use crate::store::Result as StoreResult;

    struct Fixed(Vec<Vec<Value>>, std::cell::Cell<usize>);

    impl GraphSession for Fixed {
        fn execute_batch(&self, statements: &[Statement]) -> StoreResult<usize> {
            Ok(statements.len())
        }

        fn query(&self, _cypher: &str) -> StoreResult<Vec<Row>> {
            let index = self.1.get();
            self.1.set(index + 1);
            Ok(self
                .0
                .get(index)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect())
        }
    }

    fn session(batches: Vec<Vec<Value>>) -> Fixed {
        Fixed(batches, std::cell::Cell::new(0))
    }

    #[test]
    fn test_data_classes_include_python_dataclasses() {
        let s = session(vec![vec![
            json!({"name": "User", "type": "KotlinDataClass", "file": "a.kt"}),
            json!({"name": "Point", "type": "Class", "file": "p.py", "annotations": "[\"dataclass\"]"}),
            json!({"name": "Plain", "type": "Class", "file": "p.py", "annotations": null}),
            json!({"name": "Pair", "type": "JavaRecord", "file": "Pair.java"}),
        ]]);
        let query = QueryInterface::new(&s);
        let all = query.find_data_classes(None);
        let names: Vec<_> = all.data.iter().map(|v| v["name"].clone()).collect();
        assert_eq!(names, vec![json!("Pair"), json!("User"), json!("Point")]);

        let s = session(vec![vec![
            json!({"name": "User", "type": "KotlinDataClass", "file": "a.kt"}),
            json!({"name": "Pair", "type": "JavaRecord", "file": "Pair.java"}),
        ]]);
        let kotlin = QueryInterface::new(&s).find_data_classes(Some(Namespace::Kotlin));
        assert_eq!(kotlin.len(), 1);
    }

    #[test]
    fn test_sealed_hierarchies() {
        let s = session(vec![
            vec![
                json!({"id": "k1", "name": "Result", "type": "KotlinSealedClass", "file": "r.kt"}),
                json!({"id": "d1", "name": "Shape", "type": "DartClass", "file": "s.dart", "modifiers": "[\"sealed\"]"}),
                json!({"id": "d2", "name": "Open", "type": "DartClass", "file": "s.dart", "modifiers": null}),
            ],
            vec![
                json!({"parent": "k1", "name": "Ok", "type": "KotlinDataClass"}),
                json!({"parent": "k1", "name": "Err", "type": "KotlinClass"}),
                json!({"parent": "d1", "name": "Circle", "type": "DartClass"}),
            ],
        ]);
        let result = QueryInterface::new(&s).find_sealed_hierarchies();
        assert_eq!(result.len(), 2);
        assert_eq!(result.data[0]["name"], "Result");
        assert_eq!(result.data[0]["subtypes"][0]["name"], "Err");
        assert_eq!(result.data[1]["subtypes"][0]["name"], "Circle");
    }

    #[test]
    fn test_extension_receiver_filter() {
        let s = session(vec![vec![
            json!({"name": "shout", "type": "KotlinExtensionFunction", "receiver": "String"}),
            json!({"name": "DogX", "type": "DartExtension", "receiver": "Dog"}),
        ]]);
        let result = QueryInterface::new(&s).find_extension_functions(Some("Dog"));
        assert_eq!(result.len(), 1);
        assert_eq!(result.data[0]["name"], "DogX");
    }

    #[test]
    fn test_overrides_in_generic_namespace_is_rejected() {
        let s = session(vec![]);
        let result = QueryInterface::new(&s).find_overrides("run", Some(Namespace::Generic));
        assert!(!result.success);
    }
}
