//! Graph schema: the registered node and relationship types.
//!
//! Every node type lists its required and optional properties; every
//! relationship type lists the (source, target) node type pairs it may
//! connect. The builder validates everything against the schema before
//! a statement is rendered.
//!
//! Each namespace registers its own table in a submodule, so adding a
//! language does not touch the others.

mod dart;
mod generic;
mod java;
mod kotlin;
pub mod statement;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::model::{Category, Namespace, Node, NodeKind, RelKind, Relationship};

pub use statement::Statement;

/// Properties every node carries.
pub const CORE_PROPERTIES: [&str; 3] = ["name", "file_path", "line_number"];

/// Why a node or relationship was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Unknown node type: {0}")]
    UnknownNodeKind(String),
    #[error("{node_type} node {node_id} is missing required property '{property}'")]
    MissingProperty {
        node_type: String,
        node_id: String,
        property: String,
    },
    #[error("Unknown relationship type: {0}")]
    UnknownRelationship(String),
    #[error("{rel_type} cannot connect {source_type} to {target_type}")]
    InvalidPair {
        rel_type: String,
        source_type: String,
        target_type: String,
    },
}

/// Property table of one node type.
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    pub required: Vec<&'static str>,
    pub optional: Vec<&'static str>,
}

/// The closed set of node and relationship types.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    nodes: BTreeMap<NodeKind, NodeSpec>,
    relationships: BTreeMap<RelKind, BTreeSet<(NodeKind, NodeKind)>>,
}

static GLOBAL_SCHEMA: OnceLock<Schema> = OnceLock::new();

impl Schema {
    /// The schema with every supported namespace registered.
    pub fn global() -> &'static Schema {
        GLOBAL_SCHEMA.get_or_init(Schema::standard)
    }

    pub fn standard() -> Schema {
        let mut builder = SchemaBuilder::new();
        generic::register(&mut builder);
        java::register(&mut builder);
        kotlin::register(&mut builder);
        dart::register(&mut builder);
        builder.build()
    }

    pub fn is_registered(&self, kind: NodeKind) -> bool {
        self.nodes.contains_key(&kind)
    }

    pub fn node_kinds(&self) -> impl Iterator<Item = NodeKind> + '_ {
        self.nodes.keys().copied()
    }

    pub fn relationship_kinds(&self) -> impl Iterator<Item = RelKind> + '_ {
        self.relationships.keys().copied()
    }

    pub fn node_required_properties(&self, kind: NodeKind) -> &[&'static str] {
        self.nodes
            .get(&kind)
            .map(|spec| spec.required.as_slice())
            .unwrap_or(&[])
    }

    pub fn node_optional_properties(&self, kind: NodeKind) -> &[&'static str] {
        self.nodes
            .get(&kind)
            .map(|spec| spec.optional.as_slice())
            .unwrap_or(&[])
    }

    pub fn valid_relationship_pairs(&self, kind: RelKind) -> Vec<(NodeKind, NodeKind)> {
        self.relationships
            .get(&kind)
            .map(|pairs| pairs.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Check a node's type and required properties.
    pub fn check_node(&self, node: &Node) -> Result<(), Rejection> {
        let spec = self
            .nodes
            .get(&node.kind)
            .ok_or_else(|| Rejection::UnknownNodeKind(node.kind.label()))?;
        for property in &spec.required {
            let present = node
                .field_text(property)
                .is_some_and(|value| !value.trim().is_empty() && value != "[]");
            if !present {
                return Err(Rejection::MissingProperty {
                    node_type: node.kind.label(),
                    node_id: node.id.clone(),
                    property: property.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn validate_node(&self, node: &Node) -> bool {
        self.check_node(node).is_ok()
    }

    /// Check that `relationship` may connect a `source` node to a `target` node.
    pub fn check_relationship(
        &self,
        relationship: &Relationship,
        source: NodeKind,
        target: NodeKind,
    ) -> Result<(), Rejection> {
        let pairs = self
            .relationships
            .get(&relationship.kind)
            .ok_or_else(|| Rejection::UnknownRelationship(relationship.kind.label()))?;
        if pairs.contains(&(source, target)) {
            Ok(())
        } else {
            Err(Rejection::InvalidPair {
                rel_type: relationship.kind.label(),
                source_type: source.label(),
                target_type: target.label(),
            })
        }
    }

    pub fn validate_relationship(
        &self,
        relationship: &Relationship,
        source: NodeKind,
        target: NodeKind,
    ) -> bool {
        self.check_relationship(relationship, source, target).is_ok()
    }

    /// Merge statement for a node.
    pub fn node_statement(&self, node: &Node) -> Statement {
        Statement::node(node)
    }

    /// Merge statement for a relationship.
    pub fn relationship_statement(&self, relationship: &Relationship) -> Statement {
        Statement::relationship(relationship)
    }

    /// Serializable description of every registered type.
    pub fn describe(&self) -> SchemaDescription {
        let node_types = self
            .nodes
            .iter()
            .map(|(kind, spec)| NodeTypeDescription {
                label: kind.label(),
                namespace: kind.namespace,
                required: spec.required.iter().map(|p| p.to_string()).collect(),
                optional: spec.optional.iter().map(|p| p.to_string()).collect(),
            })
            .collect();
        let relationship_types = self
            .relationships
            .iter()
            .map(|(kind, pairs)| RelationshipTypeDescription {
                label: kind.label(),
                namespace: kind.namespace,
                pairs: pairs
                    .iter()
                    .map(|(source, target)| (source.label(), target.label()))
                    .collect(),
            })
            .collect();
        SchemaDescription {
            version: env!("CARGO_PKG_VERSION").to_string(),
            node_types,
            relationship_types,
        }
    }

    /// Write [`Schema::describe`] as pretty JSON.
    pub fn write_description(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.describe()).map_err(std::io::Error::other)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
    }
}

/// Registers node and relationship types into a [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type. Core properties are always required.
    pub fn node(
        &mut self,
        kind: NodeKind,
        required: &[&'static str],
        optional: &[&'static str],
    ) -> &mut Self {
        let spec = self.schema.nodes.entry(kind).or_default();
        for property in CORE_PROPERTIES.iter().chain(required) {
            if !spec.required.contains(property) {
                spec.required.push(*property);
            }
        }
        for property in optional {
            if !spec.optional.contains(property) && !spec.required.contains(property) {
                spec.optional.push(*property);
            }
        }
        self
    }

    /// Register `kind` for every node type in `categories` of `namespace`.
    pub fn nodes(
        &mut self,
        namespace: Namespace,
        categories: &[Category],
        required: &[&'static str],
        optional: &[&'static str],
    ) -> &mut Self {
        for category in categories {
            self.node(NodeKind::new(namespace, *category), required, optional);
        }
        self
    }

    /// Allow `kind` from every source to every target.
    pub fn relationship(
        &mut self,
        kind: RelKind,
        sources: &[NodeKind],
        targets: &[NodeKind],
    ) -> &mut Self {
        let pairs = self.schema.relationships.entry(kind).or_default();
        for source in sources {
            for target in targets {
                pairs.insert((*source, *target));
            }
        }
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

/// Optional properties shared by type declarations.
pub(crate) const TYPE_OPTIONAL: &[&str] = &[
    "modifiers",
    "annotations",
    "superclass",
    "interfaces",
    "mixins",
    "on_type",
    "type_parameters",
    "enclosing",
    "end_line",
    "doc",
    "stub",
];

/// Optional properties shared by callables.
pub(crate) const CALLABLE_OPTIONAL: &[&str] = &[
    "modifiers",
    "annotations",
    "owner",
    "receiver",
    "parameters",
    "parameter_count",
    "return_type",
    "signature",
    "complexity",
    "end_line",
    "doc",
    "stub",
];

/// Optional properties shared by fields, properties and variables.
pub(crate) const MEMBER_OPTIONAL: &[&str] =
    &["modifiers", "annotations", "owner", "receiver", "type"];

/// Optional properties of import nodes.
pub(crate) const IMPORT_OPTIONAL: &[&str] = &["alias", "wildcard", "static", "imported_name"];

/// Node kinds of `namespace` for each category.
pub(crate) fn kinds(namespace: Namespace, categories: &[Category]) -> Vec<NodeKind> {
    categories
        .iter()
        .map(|category| NodeKind::new(namespace, *category))
        .collect()
}

/// Persisted schema description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub version: String,
    pub node_types: Vec<NodeTypeDescription>,
    pub relationship_types: Vec<RelationshipTypeDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypeDescription {
    pub label: String,
    pub namespace: Namespace,
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipTypeDescription {
    pub label: String,
    pub namespace: Namespace,
    pub pairs: Vec<(String, String)>,
}
