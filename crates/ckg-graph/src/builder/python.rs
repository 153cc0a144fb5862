//! Python build routine.
//!
//! Python maps onto the generic namespace: modules define classes and
//! functions, classes contain methods and attributes, and every base
//! class becomes an `INHERITS` edge.

use std::borrow::Cow;

use super::arena::{SuperClause, WorkingSet};
use super::{ImportRef, LanguageRoutine, RecordView};
use crate::language::Language;
use crate::model::{Category, Namespace, RelKind, RelVerb};
use crate::record::{CallableDecl, LanguageRecord, TypeDecl};

/// Scope name for a root-level `__init__.py`, whose dotted module name is empty.
const ROOT_PACKAGE: &str = "__init__";

pub struct PythonRoutine;

impl LanguageRoutine for PythonRoutine {
    fn language(&self) -> Language {
        Language::Python
    }

    fn view<'r>(&self, record: &'r LanguageRecord) -> Option<RecordView<'r>> {
        let LanguageRecord::Python(record) = record else {
            return None;
        };
        let module = if record.module.is_empty() {
            Cow::Borrowed(ROOT_PACKAGE)
        } else {
            Cow::Borrowed(record.module.as_str())
        };
        Some(RecordView {
            scope: Some((module, 1)),
            scope_doc: record.doc.as_deref(),
            imports: &record.imports,
            types: &record.classes,
            callables: &record.functions,
            fields: &record.variables,
            calls: &record.calls,
        })
    }

    fn scope_category(&self) -> Category {
        Category::Module
    }

    fn type_category(&self, _decl: &TypeDecl) -> Category {
        Category::Class
    }

    fn callable_category(&self, _decl: &CallableDecl) -> Category {
        Category::Function
    }

    fn field_category(&self) -> Category {
        Category::Variable
    }

    fn scope_link(&self, child: Category) -> RelKind {
        match child {
            Category::Class => RelKind::DEFINES_CLASS,
            Category::Function => RelKind::DEFINES_FUNCTION,
            _ => RelKind::CONTAINS,
        }
    }

    fn supertypes(&self, decl: &TypeDecl) -> Vec<(SuperClause, String)> {
        decl.superclass
            .iter()
            .chain(&decl.interfaces)
            .filter(|base| base.as_str() != "object")
            .map(|base| (SuperClause::Superclass, base.clone()))
            .collect()
    }

    fn stub_category(&self, _clause: SuperClause) -> Category {
        Category::Class
    }

    fn hierarchy_verb(&self, _source: Category, _target: Category, _clause: SuperClause) -> RelVerb {
        RelVerb::Inherits
    }

    fn import_targets(&self, set: &WorkingSet, from: &str, import: &ImportRef<'_>) -> Vec<String> {
        let Some(module) = absolute_module(set.file_scope(from), from, import.path) else {
            return Vec::new();
        };
        let mut candidates = Vec::new();
        if let Some(name) = import.name.filter(|n| *n != "*") {
            candidates.push(if module.is_empty() {
                name.to_string()
            } else {
                format!("{module}.{name}")
            });
        }
        candidates.push(module);

        for candidate in candidates.iter().filter(|c| !c.is_empty()) {
            let files: Vec<String> = set
                .by_qualified(candidate)
                .iter()
                .filter_map(|id| set.node(id))
                .filter(|n| n.kind.namespace == Namespace::Generic && n.kind.category == Category::Module)
                .map(|n| n.file_path.clone())
                .collect();
            if !files.is_empty() {
                return files;
            }
        }
        Vec::new()
    }
}

/// Turn a possibly relative import path into an absolute dotted module name.
///
/// `current` is the importing file's module name; a package `__init__.py`
/// is its own package, any other module's package is its parent.
fn absolute_module(current: Option<&str>, from: &str, path: &str) -> Option<String> {
    let dots = path.chars().take_while(|c| *c == '.').count();
    if dots == 0 {
        return Some(path.to_string());
    }
    let current = current.unwrap_or(ROOT_PACKAGE);
    let mut parts: Vec<&str> = if current == ROOT_PACKAGE {
        Vec::new()
    } else {
        current.split('.').collect()
    };
    let is_package = from.ends_with("__init__.py") || from.ends_with("__init__.pyi");
    if !is_package {
        parts.pop();
    }
    for _ in 1..dots {
        parts.pop()?;
    }
    let rest = &path[dots..];
    if !rest.is_empty() {
        parts.push(rest);
    }
    Some(parts.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::extract::coordinator::{ParsedFile, ProjectParseResult};
    use crate::lang::PythonExtractor;
    use crate::schema::Statement;
    use std::collections::HashMap;

    fn edges(files: &[(&str, &str)]) -> Vec<(String, String, String)> {
        let extractor = PythonExtractor::new(5_000);
        let parsed = files
            .iter()
            .map(|(path, source)| {
                let record = extractor.extract_source(path, source).unwrap();
                ParsedFile::from_record(*path, LanguageRecord::Python(record))
            })
            .collect();
        let (outcome, statements) =
            GraphBuilder::new().plan(&ProjectParseResult::from_parsed("/p", parsed));
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);

        let mut names = HashMap::new();
        let mut out = Vec::new();
        for statement in statements {
            match statement {
                Statement::MergeNode { node, .. } => {
                    names.insert(node.id.clone(), node.name.clone());
                }
                Statement::MergeRelationship { relationship, .. } => out.push((
                    names[&relationship.source_node_id].clone(),
                    relationship.kind.label(),
                    names[&relationship.target_node_id].clone(),
                )),
            }
        }
        out
    }

    fn has(edges: &[(String, String, String)], source: &str, rel: &str, target: &str) -> bool {
        edges
            .iter()
            .any(|(s, r, t)| s == source && r == rel && t == target)
    }

    #[test]
    fn test_absolute_module() {
        assert_eq!(absolute_module(Some("pkg.mod"), "pkg/mod.py", "os.path").as_deref(), Some("os.path"));
        assert_eq!(absolute_module(Some("pkg.mod"), "pkg/mod.py", ".util").as_deref(), Some("pkg.util"));
        assert_eq!(absolute_module(Some("pkg.sub"), "pkg/sub/__init__.py", ".a").as_deref(), Some("pkg.sub.a"));
        assert_eq!(absolute_module(Some("pkg.sub.m"), "pkg/sub/m.py", "..").as_deref(), Some("pkg"));
        assert_eq!(absolute_module(Some("top"), "top.py", "...x"), None);
    }

    #[test]
    fn test_modules_classes_and_imports() {
        let edges = edges(&[
            (
                "shapes/base.py",
                "class Shape:\n    def area(self):\n        return 0\n",
            ),
            (
                "shapes/circle.py",
                "from .base import Shape\n\nclass Circle(Shape):\n    def area(self):\n        return self.radius()\n\n    def radius(self):\n        return 1\n\ndef make():\n    return Circle()\n",
            ),
        ]);

        assert!(has(&edges, "circle.py", "CONTAINS", "shapes.circle"));
        assert!(has(&edges, "shapes.circle", "DEFINES_CLASS", "Circle"));
        assert!(has(&edges, "shapes.circle", "DEFINES_FUNCTION", "make"));
        assert!(has(&edges, "Circle", "CONTAINS", "radius"));
        assert!(has(&edges, "Circle", "INHERITS", "Shape"));
        assert!(has(&edges, "area", "CALLS", "radius"));
        assert!(has(&edges, "circle.py", "IMPORTS", "base.py"));
    }
}
