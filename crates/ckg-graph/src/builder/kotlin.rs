//! Kotlin build routine.

use std::borrow::Cow;

use super::arena::{SuperClause, WorkingSet};
use super::java::jvm_hierarchy_verb;
use super::resolve::qualified_import_targets;
use super::{ImportRef, LanguageRoutine, RecordView};
use crate::language::Language;
use crate::model::{Category, Namespace, RelVerb};
use crate::record::{CallableDecl, CallableKind, LanguageRecord, TypeDecl, TypeKind};

pub struct KotlinRoutine;

impl LanguageRoutine for KotlinRoutine {
    fn language(&self) -> Language {
        Language::Kotlin
    }

    fn view<'r>(&self, record: &'r LanguageRecord) -> Option<RecordView<'r>> {
        let LanguageRecord::Kotlin(record) = record else {
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
            fields: &record.properties,
            calls: &record.calls,
        })
    }

    fn scope_category(&self) -> Category {
        Category::Package
    }

    fn type_category(&self, decl: &TypeDecl) -> Category {
        match decl.kind {
            TypeKind::DataClass => Category::DataClass,
            TypeKind::SealedClass => Category::SealedClass,
            TypeKind::Interface => Category::Interface,
            TypeKind::Object => Category::Object,
            TypeKind::Enum => Category::Enum,
            TypeKind::Annotation => Category::Annotation,
            TypeKind::TypeAlias => Category::TypeAlias,
            _ => Category::Class,
        }
    }

    fn callable_category(&self, decl: &CallableDecl) -> Category {
        match decl.kind {
            CallableKind::ExtensionFunction => Category::ExtensionFunction,
            _ if decl.receiver.is_some() => Category::ExtensionFunction,
            _ => Category::Function,
        }
    }

    fn field_category(&self) -> Category {
        Category::Property
    }

    fn supertypes(&self, decl: &TypeDecl) -> Vec<(SuperClause, String)> {
        if decl.kind == TypeKind::TypeAlias {
            return Vec::new();
        }
        let mut out = Vec::new();
        if let Some(superclass) = &decl.superclass {
            out.push((SuperClause::Superclass, superclass.clone()));
        }
        out.extend(
            decl.interfaces
                .iter()
                .map(|i| (SuperClause::Interface, i.clone())),
        );
        out
    }

    fn stub_category(&self, clause: SuperClause) -> Category {
        match clause {
            SuperClause::Superclass | SuperClause::Mixin => Category::Class,
            SuperClause::Interface => Category::Interface,
        }
    }

    fn hierarchy_verb(&self, source: Category, target: Category, _clause: SuperClause) -> RelVerb {
        jvm_hierarchy_verb(source, target)
    }

    fn is_override(&self, decl: &CallableDecl) -> bool {
        decl.has_modifier("override")
    }

    fn links_annotations(&self) -> bool {
        true
    }

    fn import_targets(&self, set: &WorkingSet, _from: &str, import: &ImportRef<'_>) -> Vec<String> {
        qualified_import_targets(set, Namespace::Kotlin, import)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::extract::coordinator::{ParsedFile, ProjectParseResult};
    use crate::lang::KotlinExtractor;
    use crate::schema::Statement;
    use std::collections::HashMap;

    /// Build and return edges as (source name, label, target name) plus node labels by name.
    fn build(files: &[(&str, &str)]) -> (HashMap<String, String>, Vec<(String, String, String)>) {
        let parsed = files
            .iter()
            .map(|(path, source)| {
                let record = KotlinExtractor::new().extract_source(source).unwrap();
                ParsedFile::from_record(*path, LanguageRecord::Kotlin(record))
            })
            .collect();
        let (outcome, statements) =
            GraphBuilder::new().plan(&ProjectParseResult::from_parsed("/p", parsed));
        assert!(outcome.success);

        let mut ids = HashMap::new();
        let mut labels = HashMap::new();
        let mut edges = Vec::new();
        for statement in statements {
            match statement {
                Statement::MergeNode { node, .. } => {
                    ids.insert(node.id.clone(), node.name.clone());
                    labels.insert(node.name.clone(), node.kind.label());
                }
                Statement::MergeRelationship { relationship, .. } => edges.push((
                    ids[&relationship.source_node_id].clone(),
                    relationship.kind.label(),
                    ids[&relationship.target_node_id].clone(),
                )),
            }
        }
        (labels, edges)
    }

    fn has(edges: &[(String, String, String)], source: &str, rel: &str, target: &str) -> bool {
        edges
            .iter()
            .any(|(s, r, t)| s == source && r == rel && t == target)
    }

    #[test]
    fn test_kinds_and_hierarchy() {
        let (labels, edges) = build(&[(
            "src/Model.kt",
            r#"package app.model

interface Entity {
    fun id(): String
}

sealed class Shape : Entity {
    abstract fun area(): Double
}

data class Circle(val radius: Double) : Shape() {
    override fun area(): Double = radius * radius
    override fun id(): String = "circle"
}

object Registry

fun String.shout(): String = uppercase()

val Circle.diameter: Double get() = radius * 2
"#,
        )]);

        assert_eq!(labels["Entity"], "KotlinInterface");
        assert_eq!(labels["Shape"], "KotlinSealedClass");
        assert_eq!(labels["Circle"], "KotlinDataClass");
        assert_eq!(labels["Registry"], "KotlinObject");
        assert_eq!(labels["shout"], "KotlinExtensionFunction");
        assert_eq!(labels["radius"], "KotlinProperty");

        assert!(has(&edges, "Shape", "KOTLIN_IMPLEMENTS", "Entity"));
        assert!(has(&edges, "Circle", "KOTLIN_EXTENDS", "Shape"));
        assert!(has(&edges, "area", "KOTLIN_OVERRIDES", "area"));
        assert!(has(&edges, "id", "KOTLIN_OVERRIDES", "id"));
        assert!(has(&edges, "shout", "KOTLIN_EXTENSION_OF", "String"));
        assert!(has(&edges, "diameter", "KOTLIN_EXTENSION_OF", "Circle"));
        assert!(has(&edges, "app.model", "CONTAINS", "Circle"));
        assert!(has(&edges, "Circle", "CONTAINS", "radius"));
    }

    #[test]
    fn test_cross_file_calls_and_imports() {
        let (_, edges) = build(&[
            (
                "src/util/Strings.kt",
                "package app.util\n\nfun normalize(s: String): String {\n    return s.trim()\n}\n",
            ),
            (
                "src/Main.kt",
                "package app\n\nimport app.util.normalize\n\nfun main() {\n    normalize(\" x \")\n}\n",
            ),
        ]);
        assert!(has(&edges, "main", "CALLS", "normalize"));
        assert!(has(&edges, "Main.kt", "IMPORTS", "Strings.kt"));
    }
}
