//! Java fact extraction using tree-sitter.
//!
//! Walks the syntax tree for the package, imports and declarations
//! (including nested types) and runs a call query over the whole file.

use std::path::Path;
use std::sync::OnceLock;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, Tree};

use super::{node_text, parse_tree, span_of, squash_whitespace};
use crate::extract::scanner::base_type_name;
use crate::extract::{ExtractError, Extractor, Fidelity};
use crate::language::Language;
use crate::record::{
    CallSite, CallableDecl, CallableKind, FieldDecl, ImportDecl, JavaRecord, LanguageRecord,
    Parameter, TypeDecl, TypeKind,
};

const CALLS_QUERY: &str = r#"
(method_invocation
  name: (identifier) @callee) @call

(object_creation_expression
  type: (_) @ctor_type) @ctor
"#;

/// Node kinds that add a branch to a method's control flow.
const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "enhanced_for_statement",
    "while_statement",
    "do_statement",
    "catch_clause",
    "ternary_expression",
    "switch_label",
];

struct JavaQueries {
    calls: Query,
}

static JAVA_QUERIES: OnceLock<Result<JavaQueries, String>> = OnceLock::new();

fn get_queries() -> Result<&'static JavaQueries, ExtractError> {
    JAVA_QUERIES
        .get_or_init(|| {
            let language = tree_sitter_java::LANGUAGE.into();
            let calls = Query::new(&language, CALLS_QUERY).map_err(|e| e.to_string())?;
            Ok(JavaQueries { calls })
        })
        .as_ref()
        .map_err(|e| ExtractError::Query(e.clone()))
}

/// Java extractor backed by `tree-sitter-java`.
pub struct JavaExtractor {
    timeout_ms: u64,
}

impl JavaExtractor {
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }

    /// Extract a record from Java source.
    pub fn extract_source(&self, source: &str) -> Result<JavaRecord, ExtractError> {
        let tree = parse_tree(tree_sitter_java::LANGUAGE.into(), source, self.timeout_ms)?;
        let mut walker = Walker {
            source,
            record: JavaRecord::default(),
            owners: Vec::new(),
        };
        walker.visit(tree.root_node());
        let mut record = walker.record;
        record.calls = extract_calls(&tree, source)?;
        Ok(record)
    }
}

impl Extractor for JavaExtractor {
    fn language(&self) -> Language {
        Language::Java
    }

    fn fidelity(&self) -> Fidelity {
        Fidelity::Parser
    }

    fn extract(
        &self,
        _path: &Path,
        _relative_path: &str,
        source: &str,
    ) -> Result<LanguageRecord, ExtractError> {
        self.extract_source(source).map(LanguageRecord::Java)
    }
}

struct Walker<'a> {
    source: &'a str,
    record: JavaRecord,
    /// Nested names of the enclosing type declarations.
    owners: Vec<String>,
}

impl<'a> Walker<'a> {
    fn text(&self, node: &Node) -> &'a str {
        node_text(node, self.source)
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "package_declaration" => self.visit_package(node),
            "import_declaration" => self.visit_import(node),
            "class_declaration" => self.visit_type(node, TypeKind::Class),
            "interface_declaration" => self.visit_type(node, TypeKind::Interface),
            "enum_declaration" => self.visit_type(node, TypeKind::Enum),
            "record_declaration" => self.visit_type(node, TypeKind::Record),
            "annotation_type_declaration" => self.visit_type(node, TypeKind::Annotation),
            "method_declaration" => self.visit_callable(node, CallableKind::Method),
            "constructor_declaration" | "compact_constructor_declaration" => {
                self.visit_callable(node, CallableKind::Constructor)
            }
            "field_declaration" | "constant_declaration" => self.visit_field(node),
            "enum_constant" => self.visit_enum_constant(node),
            // Anonymous class bodies do not belong to the enclosing type.
            "object_creation_expression" | "lambda_expression" => {}
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn visit_package(&mut self, node: Node) {
        let mut cursor = node.walk();
        let name = node
            .named_children(&mut cursor)
            .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
            .map(|c| self.text(&c).to_string());
        if let Some(name) = name {
            self.record.package = Some(name);
            self.record.package_line = node.start_position().row + 1;
        }
    }

    fn visit_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        let mut path = String::new();
        let mut is_static = false;
        let mut wildcard = false;
        for child in node.children(&mut cursor) {
            match child.kind() {
                "static" => is_static = true,
                "asterisk" => wildcard = true,
                "scoped_identifier" | "identifier" => path = self.text(&child).to_string(),
                _ => {}
            }
        }
        if path.is_empty() {
            return;
        }
        self.record.imports.push(ImportDecl {
            path,
            name: None,
            alias: None,
            wildcard,
            is_static,
            line: node.start_position().row + 1,
            statement: squash_whitespace(self.text(&node)),
        });
    }

    fn visit_type(&mut self, node: Node, kind: TypeKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let mut decl = TypeDecl::new(self.text(&name_node), kind, span_of(&node));
        let (modifiers, annotations) = self.modifiers(node);
        decl.modifiers = modifiers;
        decl.annotations = annotations;
        decl.enclosing = self.owners.last().cloned();
        decl.doc = self.javadoc(node);

        if let Some(superclass) = node.child_by_field_name("superclass") {
            let mut cursor = superclass.walk();
            decl.superclass = superclass
                .named_children(&mut cursor)
                .next()
                .map(|t| base_type_name(self.text(&t)));
        }
        if let Some(interfaces) = node.child_by_field_name("interfaces") {
            decl.interfaces = self.type_list(interfaces);
        }
        // `interface A extends B, C` lists super-interfaces without a field name.
        let mut cursor = node.walk();
        let extends_interfaces: Vec<Node> = node
            .children(&mut cursor)
            .filter(|c| c.kind() == "extends_interfaces")
            .collect();
        for ext in extends_interfaces {
            for name in self.type_list(ext) {
                if !decl.interfaces.contains(&name) {
                    decl.interfaces.push(name);
                }
            }
        }

        if let Some(params) = node.child_by_field_name("type_parameters") {
            let mut cursor = params.walk();
            decl.type_parameters = params
                .named_children(&mut cursor)
                .filter_map(|p| {
                    self.text(&p)
                        .split_whitespace()
                        .next()
                        .map(|s| s.to_string())
                })
                .collect();
        }

        let nested = decl.nested_name();

        // Record components become final fields.
        if kind == TypeKind::Record {
            if let Some(params) = node.child_by_field_name("parameters") {
                for param in self.parameters(params) {
                    let mut field = FieldDecl::new(param.name, span_of(&params));
                    field.owner = Some(nested.clone());
                    field.type_name = param.type_name;
                    field.modifiers = vec!["final".to_string()];
                    self.record.fields.push(field);
                }
            }
        }

        self.record.types.push(decl);
        if let Some(body) = node.child_by_field_name("body") {
            self.owners.push(nested);
            self.visit_children(body);
            self.owners.pop();
        }
    }

    fn visit_callable(&mut self, node: Node, kind: CallableKind) {
        let name = match node.child_by_field_name("name") {
            Some(n) => self.text(&n).to_string(),
            None => return,
        };
        let mut decl = CallableDecl::new(name, kind, span_of(&node));
        let (modifiers, annotations) = self.modifiers(node);
        decl.modifiers = modifiers;
        decl.annotations = annotations;
        decl.owner = self.owners.last().cloned();
        decl.doc = self.javadoc(node);
        decl.return_type = node
            .child_by_field_name("type")
            .map(|t| squash_whitespace(self.text(&t)));
        if let Some(params) = node.child_by_field_name("parameters") {
            decl.parameters = self.parameters(params);
        }
        if let Some(body) = node.child_by_field_name("body") {
            decl.complexity = 1 + count_decisions(body, self.source);
            self.record.callables.push(decl);
            // Local classes declared inside the body.
            self.visit_children(body);
        } else {
            self.record.callables.push(decl);
        }
    }

    fn visit_field(&mut self, node: Node) {
        let (modifiers, annotations) = self.modifiers(node);
        let type_name = node
            .child_by_field_name("type")
            .map(|t| squash_whitespace(self.text(&t)));
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            let mut field = FieldDecl::new(self.text(&name), span_of(&node));
            field.owner = self.owners.last().cloned();
            field.type_name = type_name.clone();
            field.modifiers = modifiers.clone();
            field.annotations = annotations.clone();
            self.record.fields.push(field);
        }
    }

    fn visit_enum_constant(&mut self, node: Node) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let mut field = FieldDecl::new(self.text(&name), span_of(&node));
        field.owner = self.owners.last().cloned();
        field.type_name = self.owners.last().cloned();
        field.modifiers = vec![
            "public".to_string(),
            "static".to_string(),
            "final".to_string(),
        ];
        self.record.fields.push(field);
    }

    /// Keyword modifiers and annotation names from a declaration's `modifiers` child.
    fn modifiers(&self, node: Node) -> (Vec<String>, Vec<String>) {
        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();
        let mut cursor = node.walk();
        let Some(mods) = node.children(&mut cursor).find(|c| c.kind() == "modifiers") else {
            return (modifiers, annotations);
        };
        let mut cursor = mods.walk();
        for child in mods.children(&mut cursor) {
            match child.kind() {
                "annotation" | "marker_annotation" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        annotations.push(self.text(&name).to_string());
                    }
                }
                "line_comment" | "block_comment" => {}
                _ => modifiers.push(self.text(&child).to_string()),
            }
        }
        (modifiers, annotations)
    }

    fn type_list(&self, node: Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "type_list" {
                let mut inner = child.walk();
                names.extend(
                    child
                        .named_children(&mut inner)
                        .map(|t| base_type_name(self.text(&t))),
                );
            } else {
                names.push(base_type_name(self.text(&child)));
            }
        }
        names.retain(|n| !n.is_empty());
        names
    }

    fn parameters(&self, node: Node) -> Vec<Parameter> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|p| matches!(p.kind(), "formal_parameter" | "spread_parameter"))
            .map(|p| {
                let name = p
                    .child_by_field_name("name")
                    .map(|n| self.text(&n).to_string())
                    .or_else(|| {
                        // spread_parameter: `String... args`
                        let text = self.text(&p);
                        text.split_whitespace().last().map(|s| s.to_string())
                    })
                    .unwrap_or_default();
                let type_name = p
                    .child_by_field_name("type")
                    .map(|t| squash_whitespace(self.text(&t)));
                Parameter { name, type_name }
            })
            .collect()
    }

    /// Javadoc block immediately preceding the declaration.
    fn javadoc(&self, node: Node) -> Option<String> {
        let prev = node.prev_sibling()?;
        if prev.kind() != "block_comment" {
            return None;
        }
        let text = self.text(&prev);
        if !text.starts_with("/**") {
            return None;
        }
        let doc = text
            .trim_start_matches("/**")
            .trim_end_matches("*/")
            .lines()
            .map(|l| l.trim().trim_start_matches('*').trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if doc.is_empty() { None } else { Some(doc) }
    }
}

/// Count decision points below `node`.
fn count_decisions(node: Node, source: &str) -> usize {
    let mut count = 0;
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        let kind = current.kind();
        if DECISION_KINDS.contains(&kind) {
            count += 1;
        } else if kind == "binary_expression" {
            if let Some(op) = current.child_by_field_name("operator") {
                if matches!(node_text(&op, source), "&&" | "||") {
                    count += 1;
                }
            }
        }
        let mut cursor = current.walk();
        stack.extend(current.children(&mut cursor));
    }
    count
}

fn extract_calls(tree: &Tree, source: &str) -> Result<Vec<CallSite>, ExtractError> {
    let queries = get_queries()?;
    let mut calls = Vec::new();

    let mut cursor = tree_sitter::QueryCursor::new();
    let mut matches = cursor.matches(&queries.calls, tree.root_node(), source.as_bytes());

    while let Some(match_) = matches.next() {
        for capture in match_.captures {
            let node = capture.node;
            let capture_name = queries.calls.capture_names()[capture.index as usize];
            match capture_name {
                "call" => {
                    let Some(name) = node.child_by_field_name("name") else {
                        continue;
                    };
                    let qualifier = node
                        .child_by_field_name("object")
                        .map(|o| squash_whitespace(node_text(&o, source)));
                    calls.push(CallSite {
                        callee: node_text(&name, source).to_string(),
                        is_method: qualifier.is_some(),
                        qualifier,
                        line: name.start_position().row + 1,
                    });
                }
                "ctor" => {
                    let Some(ty) = node.child_by_field_name("type") else {
                        continue;
                    };
                    let callee = base_type_name(node_text(&ty, source));
                    let simple = callee.rsplit('.').next().unwrap_or(&callee).to_string();
                    calls.push(CallSite {
                        callee: simple,
                        qualifier: None,
                        line: ty.start_position().row + 1,
                        is_method: false,
                    });
                }
                _ => {}
            }
        }
    }

    calls.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.callee.cmp(&b.callee)));
    Ok(calls)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> JavaRecord {
        JavaExtractor::new(5_000).extract_source(source).unwrap()
    }

    #[test]
    fn test_extract_package_and_imports() {
        let record = extract(
            r#"
package com.example.app;

import java.util.List;
import java.util.*;
import static org.junit.Assert.assertEquals;

public class App {}
"#,
        );
        assert_eq!(record.package.as_deref(), Some("com.example.app"));
        assert_eq!(record.package_line, 2);
        assert_eq!(record.imports.len(), 3);
        assert_eq!(record.imports[0].path, "java.util.List");
        assert!(record.imports[1].wildcard);
        assert_eq!(record.imports[1].path, "java.util");
        assert!(record.imports[2].is_static);
        assert_eq!(record.imports[2].statement, "import static org.junit.Assert.assertEquals;");
    }

    #[test]
    fn test_extract_class_hierarchy() {
        let record = extract(
            r#"
/** Shapes with area. */
public abstract class Shape<T> extends Base<T> implements Comparable<Shape>, Serializable {
    protected double size;

    public Shape(double size) {
        this.size = size;
    }

    @Override
    public int compareTo(Shape other) {
        if (size > other.size && other.size > 0) {
            return 1;
        }
        return helper(other);
    }

    abstract double area();
}
"#,
        );
        assert_eq!(record.types.len(), 1);
        let shape = &record.types[0];
        assert_eq!(shape.name, "Shape");
        assert_eq!(shape.kind, TypeKind::Class);
        assert_eq!(shape.span.start_line, 3);
        assert_eq!(shape.superclass.as_deref(), Some("Base"));
        assert_eq!(shape.interfaces, vec!["Comparable", "Serializable"]);
        assert_eq!(shape.type_parameters, vec!["T"]);
        assert!(shape.has_modifier("abstract"));
        assert_eq!(shape.doc.as_deref(), Some("Shapes with area."));

        let names: Vec<_> = record.callables.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Shape", "compareTo", "area"]);
        assert_eq!(record.callables[0].kind, CallableKind::Constructor);

        let compare = &record.callables[1];
        assert!(compare.has_annotation("Override"));
        assert_eq!(compare.owner.as_deref(), Some("Shape"));
        assert_eq!(compare.return_type.as_deref(), Some("int"));
        assert_eq!(compare.parameters[0].name, "other");
        assert_eq!(compare.complexity, 3);

        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.fields[0].name, "size");
        assert_eq!(record.fields[0].type_name.as_deref(), Some("double"));

        let helper = record.calls.iter().find(|c| c.callee == "helper").unwrap();
        assert!(!helper.is_method);
        let caller = record
            .callables
            .iter()
            .filter(|c| c.span.contains(helper.line))
            .min_by_key(|c| c.span.len())
            .unwrap();
        assert_eq!(caller.name, "compareTo");
    }

    #[test]
    fn test_extract_nested_and_other_kinds() {
        let record = extract(
            r#"
package p;

public interface Repo extends Reader, Writer {
    void save(Object o);
}

enum Color implements Named { RED, GREEN }

record Point(int x, int y) {}

@interface Marker {}

class Outer {
    static class Inner {
        void run() { new Worker().start(); }
    }
}
"#,
        );
        let kinds: Vec<_> = record
            .types
            .iter()
            .map(|t| (t.nested_name(), t.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("Repo".to_string(), TypeKind::Interface),
                ("Color".to_string(), TypeKind::Enum),
                ("Point".to_string(), TypeKind::Record),
                ("Marker".to_string(), TypeKind::Annotation),
                ("Outer".to_string(), TypeKind::Class),
                ("Outer.Inner".to_string(), TypeKind::Class),
            ]
        );
        assert_eq!(record.types[0].interfaces, vec!["Reader", "Writer"]);
        assert_eq!(record.types[1].interfaces, vec!["Named"]);

        let run = record.callables.iter().find(|c| c.name == "run").unwrap();
        assert_eq!(run.owner.as_deref(), Some("Outer.Inner"));

        let point_fields: Vec<_> = record
            .fields
            .iter()
            .filter(|f| f.owner.as_deref() == Some("Point"))
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(point_fields, vec!["x", "y"]);
        assert!(record.fields.iter().any(|f| f.name == "RED"));

        let calls: Vec<_> = record.calls.iter().map(|c| c.callee.as_str()).collect();
        assert!(calls.contains(&"Worker"));
        assert!(calls.contains(&"start"));
    }
}
