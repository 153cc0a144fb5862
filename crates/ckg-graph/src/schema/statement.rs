//! Merge statements for nodes and relationships.
//!
//! Each statement carries both the rendered Cypher text and the structured
//! payload, so a session can either run the text or apply the merge
//! natively. Rendering is deterministic: properties are emitted in key order.

use serde::Serialize;

use crate::model::{Node, PropertyValue, Relationship};

/// An idempotent graph mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    MergeNode { node: Node, text: String },
    MergeRelationship { relationship: Relationship, text: String },
}

impl Statement {
    pub fn node(node: &Node) -> Self {
        Statement::MergeNode {
            node: node.clone(),
            text: render_node(node),
        }
    }

    pub fn relationship(relationship: &Relationship) -> Self {
        Statement::MergeRelationship {
            relationship: relationship.clone(),
            text: render_relationship(relationship),
        }
    }

    /// Cypher text of the statement.
    pub fn text(&self) -> &str {
        match self {
            Statement::MergeNode { text, .. } | Statement::MergeRelationship { text, .. } => text,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Statement::MergeNode { .. })
    }
}

/// Core fields and properties of a node as stored, in a stable order.
///
/// `node_type` holds the label so queries can group without label functions.
pub fn node_fields(node: &Node) -> Vec<(&str, PropertyValue)> {
    let mut fields = vec![
        ("name", PropertyValue::from(node.name.as_str())),
        ("file_path", PropertyValue::from(node.file_path.as_str())),
        ("node_type", PropertyValue::from(node.kind.label())),
    ];
    if let Some(line) = node.line_number {
        fields.push(("line_number", PropertyValue::from(line)));
    }
    for (key, value) in &node.properties {
        if !matches!(key.as_str(), "id" | "name" | "file_path" | "node_type" | "line_number") {
            fields.push((key.as_str(), value.clone()));
        }
    }
    fields
}

/// `MERGE` on the id, then the same assignments on both branches.
///
/// A bare `SET` after `MERGE` is not applied by graphqlite.
pub fn render_node(node: &Node) -> String {
    let assignments = node_fields(node)
        .iter()
        .map(|(key, value)| format!("n.{key} = {}", render_value(value)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "MERGE (n:{} {{id: {}}}) ON CREATE SET {assignments} ON MATCH SET {assignments}",
        node.kind.label(),
        quote(&node.id),
    )
}

/// Relationship properties live in the merge pattern, so re-running the
/// statement matches the existing edge.
pub fn render_relationship(relationship: &Relationship) -> String {
    let properties = if relationship.properties.is_empty() {
        String::new()
    } else {
        let pairs: Vec<String> = relationship
            .properties
            .iter()
            .map(|(key, value)| format!("{key}: {}", render_value(value)))
            .collect();
        format!(" {{{}}}", pairs.join(", "))
    };
    format!(
        "MATCH (a {{id: {}}}), (b {{id: {}}}) MERGE (a)-[r:{}{properties}]->(b)",
        quote(&relationship.source_node_id),
        quote(&relationship.target_node_id),
        relationship.kind.store_label()
    )
}

/// Render a property value as a Cypher literal.
pub fn render_value(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Bool(b) => b.to_string(),
        PropertyValue::Integer(i) => i.to_string(),
        PropertyValue::Text(s) => quote(s),
        PropertyValue::List(items) => {
            let items: Vec<String> = items.iter().map(|item| quote(item)).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

/// Single-quote a string, escaping backslashes, quotes and control characters.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
