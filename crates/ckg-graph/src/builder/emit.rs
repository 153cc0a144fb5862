//! Turns one record into nodes and in-file relationships.
//!
//! Cross-file references (supertypes, calls, imports, overrides,
//! annotations, extension receivers) are deferred to the resolution pass.

use std::collections::HashMap;

use super::arena::{Origin, PendingRef, WorkingSet};
use super::{FileContext, LanguageRoutine, RecordView};
use crate::model::{Category, Node, NodeKind, Relationship, RelKind, simple_name};
use crate::record::{CallableDecl, FieldDecl, ImportDecl, Span, TypeDecl};

/// A declared type: node id and qualified name.
struct Declared {
    id: String,
    qualified: String,
}

struct Emitter<'a, 'r> {
    routine: &'a dyn LanguageRoutine,
    file: &'a FileContext<'a>,
    view: RecordView<'r>,
    scope_name: Option<String>,
    scope_id: Option<String>,
    types: HashMap<String, Declared>,
    callables: Vec<(Span, String)>,
}

pub(crate) fn emit_record(
    routine: &dyn LanguageRoutine,
    file: &FileContext<'_>,
    view: RecordView<'_>,
    set: &mut WorkingSet,
) {
    let mut emitter = Emitter {
        routine,
        file,
        view,
        scope_name: None,
        scope_id: None,
        types: HashMap::new(),
        callables: Vec::new(),
    };
    emitter.scope(set);
    emitter.imports(set);
    emitter.types(set);
    emitter.callables(set);
    emitter.fields(set);
    emitter.calls(set);
}

impl<'a, 'r> Emitter<'a, 'r> {
    fn kind(&self, category: Category) -> NodeKind {
        NodeKind::new(self.routine.namespace(), category)
    }

    fn origin(&self, owner: Option<&str>) -> Origin {
        Origin {
            file: self.file.relative_path.to_string(),
            scope: self.scope_name.clone(),
            owner: owner.map(str::to_string),
        }
    }

    /// Qualify a top-level name with the scope name.
    fn qualify(&self, name: &str) -> String {
        match &self.scope_name {
            Some(scope) => format!("{scope}.{name}"),
            None => name.to_string(),
        }
    }

    /// Node that holds top-level declarations: the scope if any, else the file.
    fn top_level_parent(&self) -> &str {
        self.scope_id.as_deref().unwrap_or(self.file.file_id)
    }

    fn link_top_level(&self, set: &mut WorkingSet, child: &str, category: Category) {
        let link = if self.scope_id.is_some() {
            self.routine.scope_link(category)
        } else {
            RelKind::CONTAINS
        };
        set.relate(Relationship::new(link, self.top_level_parent(), child));
    }

    fn scope(&mut self, set: &mut WorkingSet) {
        let Some((name, line)) = self.view.scope.clone() else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let mut node = Node::shared(
            self.kind(self.routine.scope_category()),
            name,
            name,
            self.file.relative_path,
            line.max(1),
        );
        if let Some(doc) = self.view.scope_doc {
            node.set_if_present("doc", doc);
        }
        let id = set.add_declaration(
            node,
            Origin {
                file: self.file.relative_path.to_string(),
                scope: Some(name.to_string()),
                owner: None,
            },
        );
        set.relate(Relationship::new(RelKind::CONTAINS, self.file.file_id, id.as_str()));
        set.set_file_scope(self.file.relative_path, name);
        self.scope_name = Some(name.to_string());
        self.scope_id = Some(id);
    }

    fn imports(&mut self, set: &mut WorkingSet) {
        let imports = self.view.imports;
        for import in imports {
            let id = set.add_node(self.import_node(import));
            set.relate(Relationship::new(RelKind::CONTAINS, self.file.file_id, id));
            set.defer(PendingRef::Import {
                file: self.file.relative_path.to_string(),
                language: self.file.language,
                path: import.path.clone(),
                name: import.name.clone(),
                wildcard: import.wildcard,
                line: import.line,
                statement: import.statement.clone(),
            });
        }
    }

    fn import_node(&self, import: &ImportDecl) -> Node {
        let qualified = match import.name.as_deref() {
            Some(name) if name != "*" && !import.path.contains(':') => {
                format!("{}.{name}", import.path.trim_end_matches('.'))
            }
            _ => import.path.clone(),
        };
        let mut node = Node::new(
            self.kind(Category::Import),
            format!("{qualified}@{}", import.line),
            qualified.as_str(),
            self.file.relative_path,
            import.line,
        );
        node.set_property("qualified_name", qualified.as_str());
        node.set_property("statement", import.statement.as_str());
        node.set_property("path", import.path.as_str());
        if let Some(alias) = &import.alias {
            node.set_property("alias", alias.as_str());
        }
        node.set_property("wildcard", import.wildcard);
        node.set_property("is_static", import.is_static);
        node
    }

    fn types(&mut self, set: &mut WorkingSet) {
        let types = self.view.types;
        // Nodes first so nested types can find their enclosing type in any order.
        for decl in types {
            let nested = decl.nested_name();
            let qualified = self.qualify(&nested);
            let category = self.routine.type_category(decl);
            let node = type_node(self.kind(category), decl, &qualified, self.file.relative_path);
            let owner = decl
                .enclosing
                .as_ref()
                .and_then(|e| self.types.get(e))
                .map(|d| d.id.clone());
            let id = set.add_declaration(node, self.origin(owner.as_deref()));
            self.types.insert(nested, Declared { id, qualified });
        }

        for decl in types {
            let Some(declared) = self.types.get(&decl.nested_name()) else {
                continue;
            };
            let id = declared.id.clone();
            let category = self.routine.type_category(decl);
            match decl.enclosing.as_ref().and_then(|e| self.types.get(e)) {
                Some(outer) => {
                    set.relate(Relationship::new(RelKind::CONTAINS, outer.id.as_str(), id.as_str()));
                }
                None => self.link_top_level(set, &id, category),
            }

            for (clause, name) in self.routine.supertypes(decl) {
                set.defer(PendingRef::Supertype {
                    source: id.clone(),
                    name,
                    clause,
                });
            }
            if let Some(receiver) = self.routine.extension_target(decl) {
                set.defer(PendingRef::Extension {
                    source: id.clone(),
                    receiver: receiver.to_string(),
                });
            }
            self.defer_annotations(set, &id, &decl.annotations);
        }
    }

    fn callables(&mut self, set: &mut WorkingSet) {
        let callables = self.view.callables;
        for decl in callables {
            let owner = decl.owner.as_ref().and_then(|o| self.types.get(o));
            let qualified = match owner {
                Some(owner) => format!("{}.{}", owner.qualified, decl.name),
                None => self.qualify(&decl.name),
            };
            let owner_id = owner.map(|o| o.id.clone());
            let category = self.routine.callable_category(decl);
            let node = callable_node(
                self.kind(category),
                decl,
                &qualified,
                self.file.relative_path,
            );
            let id = set.add_declaration(node, self.origin(owner_id.as_deref()));

            match &owner_id {
                Some(owner_id) => {
                    set.relate(Relationship::new(RelKind::CONTAINS, owner_id.as_str(), id.as_str()));
                    if self.routine.is_override(decl) {
                        set.defer(PendingRef::Override {
                            member: id.clone(),
                            owner: owner_id.clone(),
                            name: decl.name.clone(),
                        });
                    }
                }
                None => self.link_top_level(set, &id, category),
            }
            if let Some(receiver) = &decl.receiver {
                set.defer(PendingRef::Extension {
                    source: id.clone(),
                    receiver: receiver.clone(),
                });
            }
            self.defer_annotations(set, &id, &decl.annotations);
            self.callables.push((decl.span, id));
        }
    }

    fn fields(&mut self, set: &mut WorkingSet) {
        let fields = self.view.fields;
        let category = self.routine.field_category();
        for decl in fields {
            let owner = decl.owner.as_ref().and_then(|o| self.types.get(o));
            let qualified = match owner {
                Some(owner) => format!("{}.{}", owner.qualified, decl.name),
                None => match &decl.receiver {
                    Some(receiver) => self.qualify(&format!("{}.{}", simple_name(receiver), decl.name)),
                    None => self.qualify(&decl.name),
                },
            };
            let owner_id = owner.map(|o| o.id.clone());
            let node = field_node(self.kind(category), decl, &qualified, self.file.relative_path);
            let id = set.add_declaration(node, self.origin(owner_id.as_deref()));

            match &owner_id {
                Some(owner_id) => {
                    set.relate(Relationship::new(RelKind::CONTAINS, owner_id.as_str(), id.as_str()));
                }
                None => self.link_top_level(set, &id, category),
            }
            if let Some(receiver) = &decl.receiver {
                set.defer(PendingRef::Extension {
                    source: id.clone(),
                    receiver: receiver.clone(),
                });
            }
            self.defer_annotations(set, &id, &decl.annotations);
        }
    }

    fn calls(&mut self, set: &mut WorkingSet) {
        let calls = self.view.calls;
        for call in calls {
            let Some(caller) = innermost(&self.callables, call.line) else {
                continue;
            };
            set.defer(PendingRef::Call {
                caller: caller.to_string(),
                callee: call.callee.clone(),
                qualifier: call.qualifier.clone(),
                line: call.line,
            });
        }
    }

    fn defer_annotations(&self, set: &mut WorkingSet, source: &str, annotations: &[String]) {
        if !self.routine.links_annotations() {
            return;
        }
        for annotation in annotations {
            set.defer(PendingRef::Annotation {
                source: source.to_string(),
                name: annotation.trim_start_matches('@').to_string(),
            });
        }
    }
}

/// The callable with the smallest span containing `line`.
fn innermost(callables: &[(Span, String)], line: usize) -> Option<&str> {
    callables
        .iter()
        .filter(|(span, _)| span.contains(line))
        .min_by_key(|(span, _)| span.len())
        .map(|(_, id)| id.as_str())
}

fn type_node(kind: NodeKind, decl: &TypeDecl, qualified: &str, file: &str) -> Node {
    let mut node = Node::new(kind, qualified, decl.name.as_str(), file, decl.span.start_line);
    if decl.span.start_line == 0 {
        node.line_number = None;
    }
    node.set_if_present("modifiers", decl.modifiers.clone());
    node.set_if_present("annotations", decl.annotations.clone());
    node.set_if_present("type_parameters", decl.type_parameters.clone());
    node.set_if_present("nested_name", decl.nested_name());
    if let Some(superclass) = &decl.superclass {
        node.set_if_present("superclass", superclass.as_str());
    }
    node.set_if_present("interfaces", decl.interfaces.clone());
    node.set_if_present("mixins", decl.mixins.clone());
    if let Some(on_type) = &decl.on_type {
        node.set_if_present("on_type", on_type.as_str());
    }
    if let Some(doc) = &decl.doc {
        node.set_if_present("doc", doc.as_str());
    }
    node.set_property("end_line", decl.span.end_line);
    node.set_property("is_abstract", decl.has_modifier("abstract"));
    node
}

fn callable_node(kind: NodeKind, decl: &CallableDecl, qualified: &str, file: &str) -> Node {
    // Overloads share a qualified name, so the id also covers parameter types.
    let param_types: Vec<&str> = decl
        .parameters
        .iter()
        .map(|p| p.type_name.as_deref().unwrap_or("_"))
        .collect();
    let receiver = decl
        .receiver
        .as_deref()
        .map(|r| format!("{r}."))
        .unwrap_or_default();
    let key = format!("{receiver}{qualified}({})", param_types.join(","));

    let mut node = Node::new(kind, key, decl.name.as_str(), file, decl.span.start_line);
    if decl.span.start_line == 0 {
        node.line_number = None;
    }
    node.set_property("qualified_name", qualified);
    node.set_property("signature", decl.signature());
    node.set_property("parameter_count", decl.parameters.len());
    node.set_if_present(
        "parameters",
        decl.parameters
            .iter()
            .map(|p| p.name.clone())
            .collect::<Vec<_>>(),
    );
    if let Some(ret) = &decl.return_type {
        node.set_if_present("return_type", ret.as_str());
    }
    if let Some(receiver) = &decl.receiver {
        node.set_if_present("receiver", receiver.as_str());
    }
    if let Some(owner) = &decl.owner {
        node.set_if_present("owner", owner.as_str());
    }
    if let Some(doc) = &decl.doc {
        node.set_if_present("doc", doc.as_str());
    }
    node.set_if_present("modifiers", decl.modifiers.clone());
    node.set_if_present("annotations", decl.annotations.clone());
    node.set_property("complexity", decl.complexity);
    node.set_property("end_line", decl.span.end_line);
    node.set_property("is_static", decl.has_modifier("static"));
    node.set_property(
        "is_async",
        decl.has_modifier("async") || decl.has_modifier("suspend"),
    );
    node
}

fn field_node(kind: NodeKind, decl: &FieldDecl, qualified: &str, file: &str) -> Node {
    let mut node = Node::new(kind, qualified, decl.name.as_str(), file, decl.span.start_line);
    if decl.span.start_line == 0 {
        node.line_number = None;
    }
    if let Some(type_name) = &decl.type_name {
        node.set_if_present("type_name", type_name.as_str());
    }
    if let Some(receiver) = &decl.receiver {
        node.set_if_present("receiver", receiver.as_str());
    }
    if let Some(owner) = &decl.owner {
        node.set_if_present("owner", owner.as_str());
    }
    node.set_if_present("modifiers", decl.modifiers.clone());
    node.set_if_present("annotations", decl.annotations.clone());
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_innermost_callable() {
        let callables = vec![
            (Span::new(1, 20), "outer".to_string()),
            (Span::new(5, 8), "inner".to_string()),
        ];
        assert_eq!(innermost(&callables, 6), Some("inner"));
        assert_eq!(innermost(&callables, 12), Some("outer"));
        assert_eq!(innermost(&callables, 30), None);
    }

    #[test]
    fn test_overloads_get_distinct_ids() {
        use crate::model::Namespace;
        use crate::record::{CallableKind, Parameter};

        let kind = NodeKind::new(Namespace::Java, Category::Method);
        let mut one = CallableDecl::new("run", CallableKind::Method, Span::new(2, 3));
        let mut two = one.clone();
        one.parameters.push(Parameter {
            name: "a".to_string(),
            type_name: Some("int".to_string()),
        });
        two.parameters.push(Parameter {
            name: "a".to_string(),
            type_name: Some("String".to_string()),
        });
        let a = callable_node(kind, &one, "p.T.run", "T.java");
        let b = callable_node(kind, &two, "p.T.run", "T.java");
        assert_ne!(a.id, b.id);
        assert_eq!(a.qualified_name(), "p.T.run");
        assert_eq!(b.qualified_name(), "p.T.run");
    }

    #[test]
    fn test_missing_line_is_unset() {
        let kind = NodeKind::new(crate::model::Namespace::Java, Category::Class);
        let decl = TypeDecl::new("Foo", crate::record::TypeKind::Class, Span::new(0, 0));
        let node = type_node(kind, &decl, "p.Foo", "Foo.java");
        assert_eq!(node.line_number, None);
    }
}
