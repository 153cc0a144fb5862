//! Java build routine.

use std::borrow::Cow;

use super::arena::{SuperClause, WorkingSet};
use super::resolve::qualified_import_targets;
use super::{ImportRef, LanguageRoutine, RecordView};
use crate::language::Language;
use crate::model::{Category, Namespace, RelVerb};
use crate::record::{CallableDecl, CallableKind, LanguageRecord, TypeDecl, TypeKind};

pub struct JavaRoutine;

impl LanguageRoutine for JavaRoutine {
    fn language(&self) -> Language {
        Language::Java
    }

    fn view<'r>(&self, record: &'r LanguageRecord) -> Option<RecordView<'r>> {
        let LanguageRecord::Java(record) = record else {
            return None;
        };
        Some(RecordView {
            scope: record
                .package
                .as_deref()
                .map(|p| (Cow::Borrowed(p), record.package_line)),
            scope_doc: None,
            imports: &record.imports,
            types: &record.types,
            callables: &record.callables,
            fields: &record.fields,
            calls: &record.calls,
        })
    }

    fn scope_category(&self) -> Category {
        Category::Package
    }

    fn type_category(&self, decl: &TypeDecl) -> Category {
        match decl.kind {
            TypeKind::Interface => Category::Interface,
            TypeKind::Enum => Category::Enum,
            TypeKind::Record => Category::Record,
            TypeKind::Annotation => Category::Annotation,
            _ => Category::Class,
        }
    }

    fn callable_category(&self, decl: &CallableDecl) -> Category {
        match decl.kind {
            CallableKind::Constructor => Category::Constructor,
            _ => Category::Method,
        }
    }

    fn field_category(&self) -> Category {
        Category::Field
    }

    fn stub_category(&self, clause: SuperClause) -> Category {
        match clause {
            SuperClause::Superclass => Category::Class,
            SuperClause::Interface | SuperClause::Mixin => Category::Interface,
        }
    }

    fn hierarchy_verb(&self, source: Category, target: Category, _clause: SuperClause) -> RelVerb {
        jvm_hierarchy_verb(source, target)
    }

    fn is_override(&self, decl: &CallableDecl) -> bool {
        decl.has_annotation("Override")
    }

    fn links_annotations(&self) -> bool {
        true
    }

    fn import_targets(&self, set: &WorkingSet, _from: &str, import: &ImportRef<'_>) -> Vec<String> {
        qualified_import_targets(set, Namespace::Java, import)
    }
}

/// `IMPLEMENTS` when a non-interface names an interface, `EXTENDS` otherwise.
pub(crate) fn jvm_hierarchy_verb(source: Category, target: Category) -> RelVerb {
    if target == Category::Interface && source != Category::Interface {
        RelVerb::Implements
    } else {
        RelVerb::Extends
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::extract::coordinator::{ParsedFile, ProjectParseResult};
    use crate::lang::JavaExtractor;
    use crate::model::Node;
    use crate::schema::Statement;

    fn build(files: &[(&str, &str)]) -> (Vec<Node>, Vec<(String, String, String)>) {
        let extractor = JavaExtractor::new(5_000);
        let parsed = files
            .iter()
            .map(|(path, source)| {
                let record = extractor.extract_source(source).unwrap();
                ParsedFile::from_record(*path, LanguageRecord::Java(record))
            })
            .collect();
        let (_, statements) = GraphBuilder::new().plan(&ProjectParseResult::from_parsed("/p", parsed));

        let mut nodes = Vec::new();
        let mut names = std::collections::HashMap::new();
        let mut edges = Vec::new();
        for statement in statements {
            match statement {
                Statement::MergeNode { node, .. } => {
                    names.insert(node.id.clone(), node.name.clone());
                    nodes.push(node);
                }
                Statement::MergeRelationship { relationship, .. } => {
                    edges.push((
                        names[&relationship.source_node_id].clone(),
                        relationship.kind.label(),
                        names[&relationship.target_node_id].clone(),
                    ));
                }
            }
        }
        (nodes, edges)
    }

    fn has(edges: &[(String, String, String)], source: &str, rel: &str, target: &str) -> bool {
        edges
            .iter()
            .any(|(s, r, t)| s == source && r == rel && t == target)
    }

    #[test]
    fn test_hierarchy_and_overrides() {
        let (nodes, edges) = build(&[
            (
                "src/Animal.java",
                "package zoo;\npublic abstract class Animal {\n    public abstract String sound();\n}\n",
            ),
            (
                "src/Dog.java",
                "package zoo;\nimport java.io.Serializable;\npublic class Dog extends Animal implements Serializable {\n    @Override\n    public String sound() { return bark(); }\n    private String bark() { return \"woof\"; }\n}\n",
            ),
        ]);

        assert!(has(&edges, "Dog", "JAVA_EXTENDS", "Animal"));
        assert!(has(&edges, "Dog", "JAVA_IMPLEMENTS", "Serializable"));
        assert!(has(&edges, "sound", "JAVA_OVERRIDES", "sound"));
        assert!(has(&edges, "sound", "CALLS", "bark"));
        assert!(has(&edges, "zoo", "CONTAINS", "Dog"));
        assert!(has(&edges, "Dog", "CONTAINS", "bark"));

        let stub = nodes.iter().find(|n| n.name == "Serializable").unwrap();
        assert!(stub.is_stub());
        assert_eq!(stub.kind.label(), "JavaInterface");
        // One package node shared by both files.
        assert_eq!(nodes.iter().filter(|n| n.kind.label() == "JavaPackage").count(), 1);
    }

    #[test]
    fn test_imports_link_files() {
        let (_, edges) = build(&[
            ("a/Util.java", "package a;\npublic class Util {}\n"),
            ("b/Main.java", "package b;\nimport a.Util;\nimport java.util.List;\nclass Main {}\n"),
        ]);
        assert!(has(&edges, "Main.java", "IMPORTS", "Util.java"));
        assert_eq!(edges.iter().filter(|(_, r, _)| r == "IMPORTS").count(), 1);
    }

    #[test]
    fn test_annotation_links() {
        let (_, edges) = build(&[
            ("Marker.java", "package p;\npublic @interface Marker {}\n"),
            ("Thing.java", "package p;\n@Marker\npublic class Thing {}\n"),
        ]);
        assert!(has(&edges, "Thing", "JAVA_ANNOTATED_WITH", "Marker"));
    }

    #[test]
    fn test_verbs() {
        assert_eq!(jvm_hierarchy_verb(Category::Class, Category::Interface), RelVerb::Implements);
        assert_eq!(jvm_hierarchy_verb(Category::Interface, Category::Interface), RelVerb::Extends);
        assert_eq!(jvm_hierarchy_verb(Category::Class, Category::Class), RelVerb::Extends);
    }
}
