//! Python fact extraction using tree-sitter.
//!
//! Extracts the module's imports, classes, functions, module-level variables
//! and call sites. Python facts live in the generic namespace.

use std::path::Path;
use std::sync::OnceLock;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, Tree};

use super::{node_text, parse_tree, span_of, squash_whitespace};
use crate::extract::{ExtractError, Extractor, Fidelity};
use crate::language::Language;
use crate::record::{
    CallSite, CallableDecl, CallableKind, FieldDecl, ImportDecl, LanguageRecord, Parameter,
    PythonRecord, TypeDecl, TypeKind,
};

const CALLS_QUERY: &str = r#"
;; Simple function calls
(call
  function: (identifier) @func_callee) @func_call

;; Method calls
(call
  function: (attribute
    object: (_) @receiver
    attribute: (identifier) @method_callee)) @method_call
"#;

const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "conditional_expression",
    "boolean_operator",
    "if_clause",
    "case_clause",
];

/// Compiled tree-sitter queries for Python.
struct PythonQueries {
    calls: Query,
}

static PYTHON_QUERIES: OnceLock<Result<PythonQueries, String>> = OnceLock::new();

fn get_queries() -> Result<&'static PythonQueries, ExtractError> {
    PYTHON_QUERIES
        .get_or_init(|| {
            let language = tree_sitter_python::LANGUAGE.into();
            let calls = Query::new(&language, CALLS_QUERY).map_err(|e| e.to_string())?;
            Ok(PythonQueries { calls })
        })
        .as_ref()
        .map_err(|e| ExtractError::Query(e.clone()))
}

/// Dotted module name for a project-relative path (`pkg/sub/mod.py` -> `pkg.sub.mod`).
///
/// Package `__init__` files name the package itself.
pub fn module_name(relative_path: &str) -> String {
    let path = relative_path.replace('\\', "/");
    let stem = path
        .strip_suffix(".pyi")
        .or_else(|| path.strip_suffix(".py"))
        .unwrap_or(&path);
    let stem = stem.strip_suffix("/__init__").unwrap_or(stem);
    let stem = if stem == "__init__" { "" } else { stem };
    stem.trim_start_matches("./").replace('/', ".")
}

/// Python extractor backed by `tree-sitter-python`.
pub struct PythonExtractor {
    timeout_ms: u64,
}

impl PythonExtractor {
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }

    /// Extract a record from Python source for the module at `relative_path`.
    pub fn extract_source(
        &self,
        relative_path: &str,
        source: &str,
    ) -> Result<PythonRecord, ExtractError> {
        let tree = parse_tree(tree_sitter_python::LANGUAGE.into(), source, self.timeout_ms)?;
        let root = tree.root_node();

        let mut walker = Walker {
            source,
            record: PythonRecord {
                module: module_name(relative_path),
                doc: extract_docstring(&root, source),
                ..Default::default()
            },
        };
        walker.visit_block(root, None);
        walker.collect_imports(root);

        let mut record = walker.record;
        record.calls = extract_calls(&tree, source)?;
        Ok(record)
    }
}

impl Extractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn fidelity(&self) -> Fidelity {
        Fidelity::Parser
    }

    fn extract(
        &self,
        _path: &Path,
        relative_path: &str,
        source: &str,
    ) -> Result<LanguageRecord, ExtractError> {
        self.extract_source(relative_path, source)
            .map(LanguageRecord::Python)
    }
}

struct Walker<'a> {
    source: &'a str,
    record: PythonRecord,
}

impl<'a> Walker<'a> {
    fn text(&self, node: &Node) -> &'a str {
        node_text(node, self.source)
    }

    /// Visit the statements of a module (`owner == None`) or class body.
    fn visit_block(&mut self, block: Node, owner: Option<&str>) {
        let mut cursor = block.walk();
        let statements: Vec<Node> = block.named_children(&mut cursor).collect();
        for stmt in statements {
            match stmt.kind() {
                "class_definition" => self.visit_class(stmt, owner, Vec::new()),
                "function_definition" => self.visit_function(stmt, owner, Vec::new()),
                "decorated_definition" => self.visit_decorated(stmt, owner),
                "expression_statement" => self.visit_assignment(stmt, owner),
                _ => {}
            }
        }
    }

    fn visit_decorated(&mut self, node: Node, owner: Option<&str>) {
        let mut cursor = node.walk();
        let decorators: Vec<String> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "decorator")
            .map(|d| decorator_name(self.text(&d)))
            .collect();
        let Some(definition) = node.child_by_field_name("definition") else {
            return;
        };
        match definition.kind() {
            "class_definition" => self.visit_class_at(definition, node, owner, decorators),
            "function_definition" => self.visit_function_at(definition, node, owner, decorators),
            _ => {}
        }
    }

    fn visit_class(&mut self, node: Node, owner: Option<&str>, decorators: Vec<String>) {
        self.visit_class_at(node, node, owner, decorators);
    }

    /// `outer` is the decorated wrapper when present, so the span covers decorators.
    fn visit_class_at(&mut self, node: Node, outer: Node, owner: Option<&str>, decorators: Vec<String>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let mut decl = TypeDecl::new(self.text(&name_node), TypeKind::Class, span_of(&outer));
        decl.span.start_line = name_node.start_position().row + 1;
        decl.annotations = decorators;
        decl.enclosing = owner.map(|o| o.to_string());

        if let Some(bases) = node.child_by_field_name("superclasses") {
            let mut cursor = bases.walk();
            for base in bases.named_children(&mut cursor) {
                match base.kind() {
                    "identifier" | "attribute" => decl.interfaces.push(self.text(&base).to_string()),
                    "keyword_argument" => {
                        if let Some(value) = base.child_by_field_name("value") {
                            decl.modifiers.push(format!("metaclass={}", self.text(&value)));
                        }
                    }
                    _ => {}
                }
            }
        }

        let body = node.child_by_field_name("body");
        decl.doc = body.and_then(|b| extract_docstring(&b, self.source));
        let nested = decl.nested_name();
        self.record.classes.push(decl);

        if let Some(body) = body {
            self.visit_block(body, Some(&nested));
        }
    }

    fn visit_function(&mut self, node: Node, owner: Option<&str>, decorators: Vec<String>) {
        self.visit_function_at(node, node, owner, decorators);
    }

    fn visit_function_at(
        &mut self,
        node: Node,
        outer: Node,
        owner: Option<&str>,
        decorators: Vec<String>,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let kind = match owner {
            Some(_) if name == "__init__" => CallableKind::Constructor,
            Some(_) => CallableKind::Method,
            None => CallableKind::Function,
        };
        let mut span = span_of(&outer);
        span.start_line = name_node.start_position().row + 1;

        let mut decl = CallableDecl::new(name.clone(), kind, span);
        decl.owner = owner.map(|o| o.to_string());
        decl.annotations = decorators;
        decl.modifiers.push(visibility_from_name(&name).to_string());
        if self.text(&node).starts_with("async") {
            decl.modifiers.push("async".to_string());
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            decl.parameters = self.parameters(params);
        }
        decl.return_type = node
            .child_by_field_name("return_type")
            .map(|r| squash_whitespace(self.text(&r)));
        if let Some(body) = node.child_by_field_name("body") {
            decl.doc = extract_docstring(&body, self.source);
            decl.complexity = 1 + count_decisions(body);
        }
        self.record.functions.push(decl);
    }

    fn visit_assignment(&mut self, stmt: Node, owner: Option<&str>) {
        let Some(assignment) = stmt.named_child(0) else {
            return;
        };
        if assignment.kind() != "assignment" {
            return;
        }
        let Some(left) = assignment.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = self.text(&left).to_string();
        let mut var = FieldDecl::new(name.clone(), span_of(&stmt));
        var.owner = owner.map(|o| o.to_string());
        var.type_name = assignment
            .child_by_field_name("type")
            .map(|t| squash_whitespace(self.text(&t)));
        if name.chars().all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '_') {
            var.modifiers.push("constant".to_string());
        }
        self.record.variables.push(var);
    }

    fn parameters(&self, node: Node) -> Vec<Parameter> {
        let mut cursor = node.walk();
        let mut params = Vec::new();
        for param in node.named_children(&mut cursor) {
            let (name, type_name) = match param.kind() {
                "identifier" => (self.text(&param).to_string(), None),
                "typed_parameter" => {
                    let name = param
                        .named_child(0)
                        .map(|n| self.text(&n).to_string())
                        .unwrap_or_default();
                    let ty = param
                        .child_by_field_name("type")
                        .map(|t| self.text(&t).to_string());
                    (name, ty)
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = param
                        .child_by_field_name("name")
                        .map(|n| self.text(&n).to_string())
                        .unwrap_or_default();
                    let ty = param
                        .child_by_field_name("type")
                        .map(|t| self.text(&t).to_string());
                    (name, ty)
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    (self.text(&param).to_string(), None)
                }
                _ => continue,
            };
            if !name.is_empty() {
                params.push(Parameter { name, type_name });
            }
        }
        params
    }

    /// Imports anywhere in the file, including function-local ones.
    fn collect_imports(&mut self, root: Node) {
        let mut stack = vec![root];
        let mut found = Vec::new();
        while let Some(node) = stack.pop() {
            match node.kind() {
                "import_statement" | "import_from_statement" => found.push(node),
                _ => {
                    let mut cursor = node.walk();
                    stack.extend(node.named_children(&mut cursor));
                }
            }
        }
        found.sort_by_key(|n| n.start_byte());

        for node in found {
            let line = node.start_position().row + 1;
            let statement = squash_whitespace(self.text(&node));
            if node.kind() == "import_statement" {
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    let (path, alias) = self.aliased(name);
                    self.record.imports.push(ImportDecl {
                        path,
                        name: None,
                        alias,
                        wildcard: false,
                        is_static: false,
                        line,
                        statement: statement.clone(),
                    });
                }
                continue;
            }

            let module = node
                .child_by_field_name("module_name")
                .map(|m| self.text(&m).to_string())
                .unwrap_or_default();
            let mut cursor = node.walk();
            let wildcard = node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "wildcard_import");
            if wildcard {
                self.record.imports.push(ImportDecl {
                    path: module,
                    name: Some("*".to_string()),
                    alias: None,
                    wildcard: true,
                    is_static: false,
                    line,
                    statement,
                });
                continue;
            }
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                let (imported, alias) = self.aliased(name);
                self.record.imports.push(ImportDecl {
                    path: module.clone(),
                    name: Some(imported),
                    alias,
                    wildcard: false,
                    is_static: false,
                    line,
                    statement: statement.clone(),
                });
            }
        }
    }

    fn aliased(&self, node: Node) -> (String, Option<String>) {
        if node.kind() == "aliased_import" {
            let name = node
                .child_by_field_name("name")
                .map(|n| self.text(&n).to_string())
                .unwrap_or_default();
            let alias = node
                .child_by_field_name("alias")
                .map(|a| self.text(&a).to_string());
            (name, alias)
        } else {
            (self.text(&node).to_string(), None)
        }
    }
}

/// Decorator name without `@` and call arguments (`@dataclass(frozen=True)` -> `dataclass`).
fn decorator_name(text: &str) -> String {
    let text = text.trim().trim_start_matches('@');
    text.split('(').next().unwrap_or(text).trim().to_string()
}

/// Determine visibility from Python naming convention.
fn visibility_from_name(name: &str) -> &'static str {
    if name.starts_with("__") && name.ends_with("__") {
        "public"
    } else if name.starts_with('_') {
        "private"
    } else {
        "public"
    }
}

fn count_decisions(node: Node) -> usize {
    let mut count = 0;
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if DECISION_KINDS.contains(&current.kind()) {
            count += 1;
        }
        // Nested definitions are scored on their own.
        if current.id() != node.id()
            && matches!(current.kind(), "function_definition" | "class_definition")
        {
            continue;
        }
        let mut cursor = current.walk();
        stack.extend(current.named_children(&mut cursor));
    }
    count
}

/// Extract docstring from a block (first string literal).
fn extract_docstring(block: &Node, source: &str) -> Option<String> {
    let first = block.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let child = first.named_child(0)?;
    if child.kind() != "string" {
        return None;
    }
    let text = node_text(&child, source);
    let trimmed = text
        .trim_start_matches("\"\"\"")
        .trim_end_matches("\"\"\"")
        .trim_start_matches("'''")
        .trim_end_matches("'''")
        .trim_start_matches('"')
        .trim_end_matches('"')
        .trim_start_matches('\'')
        .trim_end_matches('\'')
        .trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn extract_calls(tree: &Tree, source: &str) -> Result<Vec<CallSite>, ExtractError> {
    let queries = get_queries()?;
    let mut calls = Vec::new();

    let mut cursor = tree_sitter::QueryCursor::new();
    let mut matches = cursor.matches(&queries.calls, tree.root_node(), source.as_bytes());

    while let Some(match_) = matches.next() {
        let mut callee = String::new();
        let mut qualifier = None;
        let mut line = 0;
        let mut is_method = false;

        for capture in match_.captures {
            let node = capture.node;
            let capture_name = queries.calls.capture_names()[capture.index as usize];

            match capture_name {
                "func_callee" => {
                    callee = node_text(&node, source).to_string();
                    line = node.start_position().row + 1;
                    is_method = false;
                }
                "method_callee" => {
                    callee = node_text(&node, source).to_string();
                    line = node.start_position().row + 1;
                    is_method = true;
                }
                "receiver" => {
                    qualifier = Some(squash_whitespace(node_text(&node, source)));
                }
                _ => {}
            }
        }

        if !callee.is_empty() {
            calls.push(CallSite {
                callee,
                qualifier,
                line,
                is_method,
            });
        }
    }

    calls.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.callee.cmp(&b.callee)));
    Ok(calls)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(path: &str, source: &str) -> PythonRecord {
        PythonExtractor::new(5_000)
            .extract_source(path, source)
            .unwrap()
    }

    #[test]
    fn test_module_name() {
        assert_eq!(module_name("pkg/sub/mod.py"), "pkg.sub.mod");
        assert_eq!(module_name("pkg/__init__.py"), "pkg");
        assert_eq!(module_name("stubs/types.pyi"), "stubs.types");
        assert_eq!(module_name("main.py"), "main");
    }

    #[test]
    fn test_extract_class() {
        let source = r#"
class MyClass(Base, mixins.Loggable):
    """A simple class."""

    limit = 10

    def __init__(self, value):
        self.value = value

    def get_value(self):
        return self.value
"#;
        let record = extract("app/models.py", source);
        assert_eq!(record.module, "app.models");
        assert_eq!(record.classes.len(), 1);
        let class = &record.classes[0];
        assert_eq!(class.name, "MyClass");
        assert_eq!(class.span.start_line, 2);
        assert_eq!(class.interfaces, vec!["Base", "mixins.Loggable"]);
        assert!(class.doc.as_ref().is_some_and(|d| d.contains("simple class")));

        let kinds: Vec<_> = record
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f.kind, f.owner.as_deref()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("__init__", CallableKind::Constructor, Some("MyClass")),
                ("get_value", CallableKind::Method, Some("MyClass")),
            ]
        );
        assert_eq!(record.variables.len(), 1);
        assert_eq!(record.variables[0].owner.as_deref(), Some("MyClass"));
    }

    #[test]
    fn test_extract_decorated_and_functions() {
        let source = r#"
from dataclasses import dataclass
import os.path as osp

MAX_SIZE: int = 100

@dataclass(frozen=True)
class Point:
    x: int
    y: int

async def fetch(url: str, retries=3) -> bytes:
    if retries and url:
        return download(url)
    for _ in range(retries):
        client.get(url)
    return b""

def _helper(*args, **kwargs):
    pass
"#;
        let record = extract("net.py", source);

        let point = &record.classes[0];
        assert_eq!(point.annotations, vec!["dataclass"]);
        assert_eq!(point.span.start_line, 8);

        let fetch = record.functions.iter().find(|f| f.name == "fetch").unwrap();
        assert_eq!(fetch.kind, CallableKind::Function);
        assert!(fetch.has_modifier("async"));
        assert_eq!(fetch.return_type.as_deref(), Some("bytes"));
        assert_eq!(fetch.parameters.len(), 2);
        assert_eq!(fetch.parameters[0].type_name.as_deref(), Some("str"));
        assert_eq!(fetch.complexity, 4);

        let helper = record.functions.iter().find(|f| f.name == "_helper").unwrap();
        assert!(helper.has_modifier("private"));
        assert_eq!(helper.parameters.len(), 2);

        let max = record.variables.iter().find(|v| v.name == "MAX_SIZE").unwrap();
        assert_eq!(max.type_name.as_deref(), Some("int"));
        assert!(max.modifiers.contains(&"constant".to_string()));

        assert_eq!(record.imports.len(), 2);
        assert_eq!(record.imports[0].path, "dataclasses");
        assert_eq!(record.imports[0].name.as_deref(), Some("dataclass"));
        assert_eq!(record.imports[1].path, "os.path");
        assert_eq!(record.imports[1].alias.as_deref(), Some("osp"));

        let download = record.calls.iter().find(|c| c.callee == "download").unwrap();
        assert!(!download.is_method);
        let get = record.calls.iter().find(|c| c.callee == "get").unwrap();
        assert!(get.is_method);
        assert_eq!(get.qualifier.as_deref(), Some("client"));
    }

    #[test]
    fn test_relative_and_wildcard_imports() {
        let source = "from . import sibling\nfrom ..core import *\n";
        let record = extract("pkg/sub/mod.py", source);
        assert_eq!(record.imports.len(), 2);
        assert_eq!(record.imports[0].path, ".");
        assert_eq!(record.imports[0].name.as_deref(), Some("sibling"));
        assert!(record.imports[1].wildcard);
        assert_eq!(record.imports[1].path, "..core");
    }
}
