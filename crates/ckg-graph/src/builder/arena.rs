//! The per-build-pass working set.
//!
//! Holds every node and relationship produced during one build pass,
//! the references still waiting for resolution, and the lookup indexes
//! resolution needs. Discarded when the pass ends.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::language::Language;
use crate::model::{Namespace, Node, NodeKind, RelKind, Relationship, simple_name};

/// Which clause of a type declaration named a supertype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperClause {
    Superclass,
    Interface,
    Mixin,
}

/// A reference recorded while walking records, resolved after all files.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingRef {
    Supertype {
        source: String,
        name: String,
        clause: SuperClause,
    },
    /// Extension declaration or extension function to its receiver type.
    Extension { source: String, receiver: String },
    /// Member marked as overriding; resolved through the owner's supertypes.
    Override {
        member: String,
        owner: String,
        name: String,
    },
    Annotation { source: String, name: String },
    Call {
        caller: String,
        callee: String,
        qualifier: Option<String>,
        line: usize,
    },
    Import {
        file: String,
        language: Language,
        path: String,
        name: Option<String>,
        wildcard: bool,
        line: usize,
        statement: String,
    },
}

/// Where a declaration lives, for name lookup preference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
    pub file: String,
    pub scope: Option<String>,
    pub owner: Option<String>,
}

/// Build-pass arena: nodes by id, deduplicated relationships, pending refs.
#[derive(Debug, Default)]
pub struct WorkingSet {
    nodes: HashMap<String, Node>,
    order: Vec<String>,
    relationships: Vec<Relationship>,
    relationship_keys: HashSet<(String, RelKind, String)>,
    pending: Vec<PendingRef>,
    origins: HashMap<String, Origin>,
    by_simple: HashMap<String, Vec<String>>,
    by_qualified: HashMap<String, Vec<String>>,
    members: HashMap<String, Vec<String>>,
    files: BTreeMap<String, String>,
    file_scopes: HashMap<String, String>,
    supertypes: HashMap<String, Vec<String>>,
    warnings: Vec<String>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, merging with an existing node of the same id.
    ///
    /// Returns the id.
    pub fn add_node(&mut self, node: Node) -> String {
        let id = node.id.clone();
        match self.nodes.get_mut(&id) {
            Some(existing) => existing.merge_from(node),
            None => {
                self.order.push(id.clone());
                self.nodes.insert(id.clone(), node);
            }
        }
        id
    }

    /// Insert a declaration node and index it for name resolution.
    pub fn add_declaration(&mut self, node: Node, origin: Origin) -> String {
        let simple = simple_name(&node.name).to_string();
        let qualified = node.qualified_name().to_string();
        let owner = origin.owner.clone();
        let id = self.add_node(node);
        if self.origins.contains_key(&id) {
            return id;
        }
        self.origins.insert(id.clone(), origin);
        self.by_simple.entry(simple).or_default().push(id.clone());
        self.by_qualified.entry(qualified).or_default().push(id.clone());
        if let Some(owner) = owner {
            self.members.entry(owner).or_default().push(id.clone());
        }
        id
    }

    /// Register the file node for a relative path.
    pub fn add_file(&mut self, relative_path: &str, node: Node) -> String {
        let id = self.add_node(node);
        self.files.insert(relative_path.to_string(), id.clone());
        id
    }

    pub fn set_file_scope(&mut self, relative_path: &str, scope: &str) {
        self.file_scopes
            .insert(relative_path.to_string(), scope.to_string());
    }

    /// Package/library/module name declared by a file.
    pub fn file_scope(&self, relative_path: &str) -> Option<&str> {
        self.file_scopes.get(relative_path).map(String::as_str)
    }

    pub fn file_id(&self, relative_path: &str) -> Option<&str> {
        self.files.get(relative_path).map(String::as_str)
    }

    /// Relative paths of all files in the pass, sorted.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Add a relationship unless one with the same key already exists.
    pub fn relate(&mut self, relationship: Relationship) -> bool {
        if self.relationship_keys.insert(relationship.key()) {
            self.relationships.push(relationship);
            true
        } else {
            false
        }
    }

    pub fn defer(&mut self, reference: PendingRef) {
        self.pending.push(reference);
    }

    pub fn take_pending(&mut self) -> Vec<PendingRef> {
        std::mem::take(&mut self.pending)
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn kind_of(&self, id: &str) -> Option<NodeKind> {
        self.nodes.get(id).map(|n| n.kind)
    }

    pub fn origin(&self, id: &str) -> Option<&Origin> {
        self.origins.get(id)
    }

    pub fn members_of(&self, owner: &str) -> &[String] {
        self.members.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn record_supertype(&mut self, child: &str, parent: &str) {
        let parents = self.supertypes.entry(child.to_string()).or_default();
        if !parents.iter().any(|p| p == parent) {
            parents.push(parent.to_string());
        }
    }

    pub fn supertypes_of(&self, id: &str) -> &[String] {
        self.supertypes.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Declarations with an exact qualified name.
    pub fn by_qualified(&self, qualified: &str) -> &[String] {
        self.by_qualified
            .get(qualified)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve a referenced name from `origin`.
    ///
    /// Preference: exact qualified name, then same file, then same scope,
    /// then a unique match across the project. Ambiguous names stay
    /// unresolved.
    pub fn resolve(
        &self,
        name: &str,
        origin: &Origin,
        accept: impl Fn(NodeKind) -> bool,
    ) -> Option<String> {
        let accepted = |ids: &[String]| -> Vec<String> {
            ids.iter()
                .filter(|id| self.kind_of(id).is_some_and(&accept))
                .cloned()
                .collect()
        };

        if name.contains('.') {
            if let Some(id) = accepted(self.by_qualified(name)).into_iter().next() {
                return Some(id);
            }
        }

        let candidates = accepted(
            self.by_simple
                .get(simple_name(name))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        );
        match candidates.len() {
            0 => return None,
            1 => return candidates.into_iter().next(),
            _ => {}
        }

        let in_file: Vec<&String> = candidates
            .iter()
            .filter(|id| self.origins.get(*id).is_some_and(|o| o.file == origin.file))
            .collect();
        if let Some(id) = in_file.first() {
            return Some((*id).clone());
        }
        if origin.scope.is_some() {
            let in_scope: Vec<&String> = candidates
                .iter()
                .filter(|id| self.origins.get(*id).is_some_and(|o| o.scope == origin.scope))
                .collect();
            if in_scope.len() == 1 {
                return Some(in_scope[0].clone());
            }
        }
        None
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Namespace a declaration was registered under.
    pub fn namespace_of(&self, id: &str) -> Option<Namespace> {
        self.kind_of(id).map(|k| k.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn class(name: &str, file: &str, scope: &str) -> (Node, Origin) {
        let node = Node::new(
            NodeKind::new(Namespace::Java, Category::Class),
            format!("{scope}.{name}"),
            name,
            file,
            1,
        );
        let origin = Origin {
            file: file.to_string(),
            scope: Some(scope.to_string()),
            owner: None,
        };
        (node, origin)
    }

    fn any(_: NodeKind) -> bool {
        true
    }

    #[test]
    fn test_add_node_merges_duplicates() {
        let mut set = WorkingSet::new();
        let (node, origin) = class("Foo", "Foo.java", "a");
        let first = set.add_declaration(node.clone(), origin.clone());
        let second = set.add_declaration(node, origin);
        assert_eq!(first, second);
        assert_eq!(set.node_count(), 1);
        assert_eq!(set.by_qualified("a.Foo").len(), 1);
    }

    #[test]
    fn test_relate_deduplicates() {
        let mut set = WorkingSet::new();
        assert!(set.relate(Relationship::new(RelKind::CALLS, "a", "b")));
        assert!(!set.relate(Relationship::new(RelKind::CALLS, "a", "b").with_property("line", 3usize)));
        assert!(set.relate(Relationship::new(RelKind::CALLS, "b", "a")));
        assert_eq!(set.relationships().len(), 2);
    }

    #[test]
    fn test_resolve_prefers_file_then_scope() {
        let mut set = WorkingSet::new();
        let (a, a_origin) = class("Util", "a/Util.java", "a");
        let (b, b_origin) = class("Util", "b/Util.java", "b");
        let a_id = set.add_declaration(a, a_origin.clone());
        let b_id = set.add_declaration(b, b_origin);

        assert_eq!(set.resolve("Util", &a_origin, any), Some(a_id.clone()));

        let from_b_scope = Origin {
            file: "b/Other.java".to_string(),
            scope: Some("b".to_string()),
            owner: None,
        };
        assert_eq!(set.resolve("Util", &from_b_scope, any), Some(b_id));

        let elsewhere = Origin {
            file: "c/Main.java".to_string(),
            scope: Some("c".to_string()),
            owner: None,
        };
        assert_eq!(set.resolve("Util", &elsewhere, any), None);
        assert_eq!(set.resolve("a.Util", &elsewhere, any), Some(a_id));
    }

    #[test]
    fn test_resolve_filters_kinds() {
        let mut set = WorkingSet::new();
        let (node, origin) = class("Foo", "Foo.java", "a");
        set.add_declaration(node, origin.clone());
        assert!(set.resolve("Foo", &origin, |k| k.category.is_callable()).is_none());
    }
}
