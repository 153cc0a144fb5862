//! Dart build routine.

use std::borrow::Cow;

use super::arena::{SuperClause, WorkingSet};
use super::{ImportRef, LanguageRoutine, RecordView};
use crate::language::Language;
use crate::model::{Category, RelVerb};
use crate::record::{CallableDecl, CallableKind, LanguageRecord, TypeDecl, TypeKind};

pub struct DartRoutine;

impl LanguageRoutine for DartRoutine {
    fn language(&self) -> Language {
        Language::Dart
    }

    fn view<'r>(&self, record: &'r LanguageRecord) -> Option<RecordView<'r>> {
        let LanguageRecord::Dart(record) = record else {
            return None;
        };
        Some(RecordView {
            scope: record
                .library
                .as_deref()
                .map(|l| (Cow::Borrowed(l), record.library_line)),
            scope_doc: None,
            imports: &record.imports,
            types: &record.types,
            callables: &record.callables,
            fields: &record.fields,
            calls: &record.calls,
        })
    }

    fn scope_category(&self) -> Category {
        Category::Library
    }

    fn type_category(&self, decl: &TypeDecl) -> Category {
        match decl.kind {
            TypeKind::Mixin => Category::Mixin,
            TypeKind::Extension => Category::Extension,
            TypeKind::Enum => Category::Enum,
            TypeKind::TypeAlias => Category::TypeAlias,
            _ => Category::Class,
        }
    }

    fn callable_category(&self, decl: &CallableDecl) -> Category {
        match decl.kind {
            CallableKind::Constructor => Category::Constructor,
            _ if decl.owner.is_some() => Category::Method,
            _ => Category::Function,
        }
    }

    fn field_category(&self) -> Category {
        Category::Field
    }

    fn supertypes(&self, decl: &TypeDecl) -> Vec<(SuperClause, String)> {
        // Typedef targets and extension receivers are not supertypes.
        if matches!(decl.kind, TypeKind::TypeAlias | TypeKind::Extension) {
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
        out.extend(decl.mixins.iter().map(|m| (SuperClause::Mixin, m.clone())));
        out
    }

    fn stub_category(&self, clause: SuperClause) -> Category {
        match clause {
            SuperClause::Mixin => Category::Mixin,
            SuperClause::Superclass | SuperClause::Interface => Category::Class,
        }
    }

    fn hierarchy_verb(&self, _source: Category, _target: Category, clause: SuperClause) -> RelVerb {
        match clause {
            SuperClause::Superclass => RelVerb::Extends,
            SuperClause::Interface => RelVerb::Implements,
            SuperClause::Mixin => RelVerb::MixesIn,
        }
    }

    fn is_override(&self, decl: &CallableDecl) -> bool {
        decl.has_annotation("override")
    }

    fn extension_target<'d>(&self, decl: &'d TypeDecl) -> Option<&'d str> {
        match decl.kind {
            TypeKind::Extension => decl.on_type.as_deref(),
            _ => None,
        }
    }

    fn import_targets(&self, set: &WorkingSet, from: &str, import: &ImportRef<'_>) -> Vec<String> {
        let path = import.path;
        if path.starts_with("dart:") {
            return Vec::new();
        }
        if let Some(rest) = path.strip_prefix("package:") {
            // `package:name/src/x.dart` lives at `lib/src/x.dart` of package `name`.
            let Some((_, inner)) = rest.split_once('/') else {
                return Vec::new();
            };
            let suffix = format!("lib/{inner}");
            return set
                .file_paths()
                .filter(|f| *f == suffix || f.ends_with(&format!("/{suffix}")))
                .map(str::to_string)
                .collect();
        }
        let joined = join_relative(from, path);
        if set.file_id(&joined).is_some() {
            vec![joined]
        } else {
            Vec::new()
        }
    }
}

/// Resolve `target` against the directory of `from`, folding `.` and `..`.
fn join_relative(from: &str, target: &str) -> String {
    let mut parts: Vec<&str> = from.split('/').collect();
    parts.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::extract::coordinator::{ParsedFile, ProjectParseResult};
    use crate::lang::DartExtractor;
    use crate::schema::Statement;
    use std::collections::HashMap;

    fn edges(files: &[(&str, &str)]) -> Vec<(String, String, String)> {
        let parsed = files
            .iter()
            .map(|(path, source)| {
                let record = DartExtractor::new().extract_source(source).unwrap();
                ParsedFile::from_record(*path, LanguageRecord::Dart(record))
            })
            .collect();
        let (_, statements) = GraphBuilder::new().plan(&ProjectParseResult::from_parsed("/p", parsed));

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
    fn test_join_relative() {
        assert_eq!(join_relative("lib/src/a.dart", "b.dart"), "lib/src/b.dart");
        assert_eq!(join_relative("lib/src/a.dart", "../c.dart"), "lib/c.dart");
        assert_eq!(join_relative("a.dart", "./b.dart"), "b.dart");
    }

    #[test]
    fn test_mixins_extensions_and_imports() {
        let edges = edges(&[
            (
                "lib/animals.dart",
                r#"library animals;

import 'package:zoo/src/walker.dart';
import 'dart:math';

class Animal {
  void move() {}
}

class Dog extends Animal with Walker implements Comparable {
  @override
  void move() {
    walk();
  }
}

extension DogX on Dog {
  void fetch() {}
}
"#,
            ),
            (
                "lib/src/walker.dart",
                "mixin Walker {\n  void walk() {}\n}\n",
            ),
        ]);

        assert!(has(&edges, "Dog", "DART_EXTENDS", "Animal"));
        assert!(has(&edges, "Dog", "DART_MIXES_IN", "Walker"));
        assert!(has(&edges, "Dog", "DART_IMPLEMENTS", "Comparable"));
        assert!(has(&edges, "DogX", "DART_EXTENSION_OF", "Dog"));
        assert!(has(&edges, "move", "DART_OVERRIDES", "move"));
        assert!(has(&edges, "move", "CALLS", "walk"));
        assert!(has(&edges, "animals.dart", "IMPORTS", "walker.dart"));
        assert!(has(&edges, "animals", "CONTAINS", "Dog"));
        assert!(has(&edges, "walker.dart", "CONTAINS", "Walker"));
    }
}
