//! Dart fact extraction by line scanning.
//!
//! Recognises library directives, type declarations (classes, mixins,
//! extensions, enums, typedefs) and their members on comment- and
//! string-free lines. Best effort, like the Kotlin scanner.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::extract::scanner::{
    self, ScannedLine, base_type_name, block_end, collect_header, count_decisions, find_calls,
    is_ident_char, matching_paren, split_top_level, strip_annotations,
};
use crate::extract::{ExtractError, Extractor, Fidelity};
use crate::language::Language;
use crate::record::{
    CallSite, CallableDecl, CallableKind, DartRecord, FieldDecl, ImportDecl, LanguageRecord,
    Parameter, Span, TypeDecl, TypeKind,
};

const MEMBER_MODIFIERS: &[&str] = &[
    "static", "external", "abstract", "const", "factory", "late", "final", "covariant", "var",
];

const DECISION_KEYWORDS: &[&str] = &["if", "for", "while", "catch", "case"];

const CALL_SKIP: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "super", "this", "assert", "await",
    "throw", "get", "set", "operator",
];

/// Words that start statements rather than declarations.
const STATEMENT_WORDS: &[&str] = &[
    "return", "if", "else", "for", "while", "do", "switch", "case", "default", "throw", "try",
    "catch", "finally", "await", "yield", "assert", "super", "this", "break", "continue",
];

struct DartPatterns {
    library: Regex,
    directive: Regex,
    quoted: Regex,
    class_decl: Regex,
    mixin_decl: Regex,
    extension_decl: Regex,
    enum_decl: Regex,
}

static DART_PATTERNS: OnceLock<Result<DartPatterns, String>> = OnceLock::new();

fn get_patterns() -> Result<&'static DartPatterns, ExtractError> {
    DART_PATTERNS
        .get_or_init(|| {
            let compile = |pattern: &str| Regex::new(pattern).map_err(|e| e.to_string());
            Ok(DartPatterns {
                library: compile(r"^library\b\s*([\w.]*)\s*;")?,
                directive: compile(r"^(import|export|part)\s+(of\b)?")?,
                quoted: compile(r#"['"]([^'"]+)['"]"#)?,
                class_decl: compile(
                    r"^((?:(?:abstract|sealed|base|final|interface|mixin)\s+)*)class\s+([A-Za-z_$][\w$]*)",
                )?,
                mixin_decl: compile(r"^(?:base\s+)?mixin\s+([A-Za-z_$][\w$]*)")?,
                extension_decl: compile(
                    r"^extension\s+(?:([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s+)?on\s+([^{]+)",
                )?,
                enum_decl: compile(r"^enum\s+([A-Za-z_$][\w$]*)")?,
            })
        })
        .as_ref()
        .map_err(|e| ExtractError::Query(e.clone()))
}

/// Heuristic Dart extractor.
pub struct DartExtractor;

impl DartExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract a record from Dart source.
    pub fn extract_source(&self, source: &str) -> Result<DartRecord, ExtractError> {
        let patterns = get_patterns()?;
        let lines = scanner::scan(source);
        let mut scan = Scan {
            patterns,
            lines: &lines,
            record: DartRecord::default(),
            scopes: Vec::new(),
            pending_annotations: Vec::new(),
        };
        scan.run();
        Ok(scan.record)
    }
}

impl Default for DartExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for DartExtractor {
    fn language(&self) -> Language {
        Language::Dart
    }

    fn fidelity(&self) -> Fidelity {
        Fidelity::Heuristic
    }

    fn extract(
        &self,
        _path: &Path,
        _relative_path: &str,
        source: &str,
    ) -> Result<LanguageRecord, ExtractError> {
        self.extract_source(source).map(LanguageRecord::Dart)
    }
}

struct Scope {
    nested_name: String,
    simple_name: String,
    depth: usize,
    /// Enum bodies open with the value list, closed by `;` or `}`.
    enum_values: bool,
}

struct Scan<'a> {
    patterns: &'static DartPatterns,
    lines: &'a [ScannedLine],
    record: DartRecord,
    scopes: Vec<Scope>,
    pending_annotations: Vec<String>,
}

impl Scan<'_> {
    fn run(&mut self) {
        let lines = self.lines;
        let mut i = 0;
        while i < lines.len() {
            let line = &lines[i];
            while self.scopes.last().is_some_and(|s| line.depth < s.depth) {
                self.scopes.pop();
            }
            if line.is_blank() {
                i += 1;
                continue;
            }

            let member_depth = self.scopes.last().map(|s| s.depth).unwrap_or(0);
            if line.depth != member_depth {
                self.record_calls(&line.code, line.number);
                i += 1;
                continue;
            }

            let (annotations, code) = strip_annotations(&line.code);
            self.pending_annotations.extend(annotations);
            let code = code.trim();
            if code.is_empty() {
                i += 1;
                continue;
            }

            if let Some(scope) = self.scopes.last().filter(|s| s.enum_values) {
                let owner = scope.nested_name.clone();
                let enum_name = scope.simple_name.clone();
                if self.enum_values(line.number, code, owner, enum_name) {
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.enum_values = false;
                    }
                }
                i += 1;
                continue;
            }

            i = if let Some(caps) = self.patterns.library.captures(code) {
                let name = caps[1].to_string();
                self.record.library = if name.is_empty() { None } else { Some(name) };
                self.record.library_line = line.number;
                i + 1
            } else if let Some(caps) = self.patterns.directive.captures(code) {
                // `part of` names the owning library, not a dependency.
                if caps.get(2).is_none() {
                    self.directive(line, code, &caps[1]);
                }
                i + 1
            } else if code.starts_with("typedef ") {
                self.typedef(line, code);
                i + 1
            } else if let Some(caps) = self.patterns.class_decl.captures(code) {
                let modifiers: Vec<String> =
                    caps[1].split_whitespace().map(|s| s.to_string()).collect();
                let name = caps[2].to_string();
                let rest_start = caps.get(0).map(|m| m.end()).unwrap_or(0);
                self.type_declaration(i, TypeKind::Class, name, modifiers, rest_start)
            } else if let Some(caps) = self.patterns.mixin_decl.captures(code) {
                let modifiers = if code.starts_with("base ") {
                    vec!["base".to_string()]
                } else {
                    Vec::new()
                };
                let name = caps[1].to_string();
                let rest_start = caps.get(0).map(|m| m.end()).unwrap_or(0);
                self.type_declaration(i, TypeKind::Mixin, name, modifiers, rest_start)
            } else if let Some(caps) = self.patterns.extension_decl.captures(code) {
                let on_type = base_type_name(&caps[2]);
                let name = caps
                    .get(1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| format!("_{on_type}Extension"));
                let next =
                    self.type_declaration(i, TypeKind::Extension, name, Vec::new(), code.len());
                if let Some(decl) = self.record.types.last_mut() {
                    decl.on_type = Some(on_type);
                }
                next
            } else if let Some(caps) = self.patterns.enum_decl.captures(code) {
                let name = caps[1].to_string();
                let rest_start = caps.get(0).map(|m| m.end()).unwrap_or(0);
                self.type_declaration(i, TypeKind::Enum, name, Vec::new(), rest_start)
            } else {
                self.member(i)
            };
        }
    }

    fn owner(&self) -> Option<String> {
        self.scopes.last().map(|s| s.nested_name.clone())
    }

    fn record_calls(&mut self, code: &str, line: usize) {
        for (qualifier, callee) in find_calls(code, CALL_SKIP) {
            let is_method = qualifier.is_some();
            self.record.calls.push(CallSite {
                callee,
                qualifier: qualifier.filter(|q| !q.is_empty()),
                line,
                is_method,
            });
        }
    }

    fn directive(&mut self, line: &ScannedLine, code: &str, keyword: &str) {
        let Some(caps) = self.patterns.quoted.captures(&line.raw) else {
            return;
        };
        let alias = code
            .split_whitespace()
            .skip_while(|w| *w != "as")
            .nth(1)
            .map(|a| a.trim_end_matches(';').to_string());
        self.record.imports.push(ImportDecl {
            path: caps[1].to_string(),
            name: Some(keyword.to_string()),
            alias,
            wildcard: false,
            is_static: false,
            line: line.number,
            statement: line.raw.trim().to_string(),
        });
    }

    fn typedef(&mut self, line: &ScannedLine, code: &str) {
        let body = code.trim_start_matches("typedef").trim();
        let name = match body.split_once('=') {
            Some((lhs, _)) => base_type_name(lhs),
            None => body
                .split('(')
                .next()
                .and_then(|prefix| prefix.split_whitespace().last())
                .map(base_type_name)
                .unwrap_or_default(),
        };
        if name.is_empty() {
            return;
        }
        let mut decl = TypeDecl::new(name, TypeKind::TypeAlias, Span::single(line.number));
        decl.annotations = std::mem::take(&mut self.pending_annotations);
        decl.enclosing = self.owner();
        if let Some((_, target)) = body.split_once('=') {
            decl.superclass = Some(target.trim().trim_end_matches(';').trim().to_string());
        }
        self.record.types.push(decl);
    }

    fn type_declaration(
        &mut self,
        start: usize,
        kind: TypeKind,
        name: String,
        modifiers: Vec<String>,
        rest_start: usize,
    ) -> usize {
        let (header, header_end) = collect_header(self.lines, start);
        let (_, header) = strip_annotations(&header);
        let end = block_end(self.lines, start, header_end);
        let line_number = self.lines[start].number;

        let mut decl = TypeDecl::new(name, kind, Span::new(line_number, self.lines[end].number));
        decl.modifiers = modifiers;
        decl.annotations = std::mem::take(&mut self.pending_annotations);
        decl.enclosing = self.owner();

        if kind != TypeKind::Extension {
            let rest = header.get(rest_start..).unwrap_or("");
            let clauses = parse_clauses(rest);
            decl.type_parameters = clauses.type_parameters;
            decl.superclass = clauses.extends;
            decl.mixins = clauses.with;
            decl.interfaces = clauses.implements;
            decl.on_type = clauses.on;
        }

        let simple = decl.name.clone();
        let nested = decl.nested_name();
        self.record.types.push(decl);

        // Values written on the header line: `enum Color { red, green }`.
        let mut values_closed = false;
        if kind == TypeKind::Enum {
            if let Some(open) = header.find('{') {
                values_closed = self.enum_values(
                    self.lines[header_end].number,
                    &header[open + 1..],
                    nested.clone(),
                    simple.clone(),
                );
            }
        }

        if self.lines[header_end].depth_after > self.lines[start].depth {
            self.scopes.push(Scope {
                nested_name: nested,
                simple_name: simple,
                depth: self.lines[start].depth + 1,
                enum_values: kind == TypeKind::Enum && !values_closed,
            });
        }
        header_end + 1
    }

    /// Record enum values on one line; returns true once the value list ends.
    fn enum_values(&mut self, line: usize, code: &str, owner: String, enum_name: String) -> bool {
        let (values, closed) = match code.find([';', '}']) {
            Some(idx) => (&code[..idx], true),
            None => (code, false),
        };
        for value in split_top_level(values, ',') {
            let Some(name) = scanner::leading_ident(&value) else {
                continue;
            };
            let mut field = FieldDecl::new(name, Span::single(line));
            field.owner = Some(owner.clone());
            field.type_name = Some(enum_name.clone());
            field.modifiers = vec!["static".to_string(), "const".to_string()];
            self.record.fields.push(field);
        }
        closed
    }

    /// A function, method, constructor, getter or field declaration.
    fn member(&mut self, start: usize) -> usize {
        let lines = self.lines;
        let (header, header_end) = collect_header(lines, start);
        let (_, header) = strip_annotations(&header);
        let header = header.trim();
        let first = header.split_whitespace().next().unwrap_or("");
        let first_word: String = first.chars().take_while(|c| is_ident_char(*c)).collect();
        if STATEMENT_WORDS.contains(&first_word.as_str())
            || !header.chars().next().is_some_and(is_ident_char)
        {
            self.pending_annotations.clear();
            self.record_calls(&lines[start].code, lines[start].number);
            return start + 1;
        }

        // Declaration part: before a body, arrow or initializer.
        let decl_end = header
            .find(|c| c == '{' || c == ';')
            .unwrap_or(header.len())
            .min(header.find("=>").unwrap_or(header.len()));
        let decl_text = &header[..decl_end];
        let paren = decl_text.find('(');
        let assign = decl_text.find('=');

        let is_callable = match (paren, assign) {
            (Some(p), Some(a)) => p < a,
            (Some(_), None) => true,
            _ => false,
        };

        if is_callable {
            return self.callable(start, header_end, header);
        }

        // Getter without parameter list: `int get count => _count;`
        let words: Vec<&str> = decl_text.split_whitespace().collect();
        if let Some(pos) = words.iter().position(|w| *w == "get") {
            if let Some(name) = words.get(pos + 1) {
                let end = block_end(lines, start, header_end);
                let span = Span::new(lines[start].number, lines[end].number);
                let kind = if self.scopes.is_empty() {
                    CallableKind::Function
                } else {
                    CallableKind::Method
                };
                let mut decl = CallableDecl::new(name.to_string(), kind, span);
                decl.owner = self.owner();
                decl.annotations = std::mem::take(&mut self.pending_annotations);
                decl.modifiers = words[..pos]
                    .iter()
                    .filter(|w| MEMBER_MODIFIERS.contains(*w))
                    .map(|w| w.to_string())
                    .collect();
                decl.modifiers.push("get".to_string());
                let ret: Vec<&str> = words[..pos]
                    .iter()
                    .filter(|w| !MEMBER_MODIFIERS.contains(*w))
                    .copied()
                    .collect();
                if !ret.is_empty() {
                    decl.return_type = Some(ret.join(" "));
                }
                self.record.callables.push(decl);
                for line in &lines[start..=end] {
                    self.record_calls(&line.code, line.number);
                }
                return end.max(header_end) + 1;
            }
        }

        if header.ends_with(';') || assign.is_some() {
            self.fields(start, header_end, header);
            return header_end + 1;
        }

        self.pending_annotations.clear();
        self.record_calls(&lines[start].code, lines[start].number);
        start + 1
    }

    fn callable(&mut self, start: usize, header_end: usize, header: &str) -> usize {
        let lines = self.lines;
        let Some(open) = header.find('(') else {
            return start + 1;
        };
        let prefix = header[..open].trim();
        let words: Vec<&str> = prefix.split_whitespace().collect();

        let (name, operator) = match words.iter().position(|w| *w == "operator") {
            Some(pos) => (format!("operator {}", words[pos + 1..].join("")), true),
            None => match words.last() {
                Some(last) => (last.to_string(), false),
                None => return start + 1,
            },
        };
        if !operator
            && !name
                .chars()
                .all(|c| is_ident_char(c) || c == '.' || c == '<' || c == '>' || c == ',')
        {
            self.pending_annotations.clear();
            return start + 1;
        }
        let name = name.split('<').next().unwrap_or(&name).to_string();

        let owner_simple = self.scopes.last().map(|s| s.simple_name.clone());
        let is_constructor = !operator
            && owner_simple.as_deref().is_some_and(|owner| {
                name == owner || name.split('.').next() == Some(owner)
            });
        let kind = if is_constructor {
            CallableKind::Constructor
        } else if self.scopes.is_empty() {
            CallableKind::Function
        } else {
            CallableKind::Method
        };

        let end = block_end(lines, start, header_end);
        // A body may still open after an initializer list on later lines.
        let span = Span::new(lines[start].number, lines[end].number);
        let mut decl = CallableDecl::new(name, kind, span);
        decl.owner = self.owner();
        decl.annotations = std::mem::take(&mut self.pending_annotations);

        let name_words = if operator {
            words
                .iter()
                .position(|w| *w == "operator")
                .unwrap_or(words.len())
        } else {
            words.len().saturating_sub(1)
        };
        let mut ret = Vec::new();
        for word in &words[..name_words] {
            if MEMBER_MODIFIERS.contains(word) || *word == "set" {
                decl.modifiers.push(word.to_string());
            } else {
                ret.push(*word);
            }
        }
        if !ret.is_empty() && !is_constructor {
            decl.return_type = Some(ret.join(" "));
        }

        let mut tail = "";
        if let Some(close) = matching_paren(header, open) {
            decl.parameters = parse_parameters(&header[open + 1..close]);
            tail = &header[close + 1..];
            let tail_words: Vec<&str> = tail.split_whitespace().collect();
            if tail_words.first().is_some_and(|w| w.starts_with("async")) {
                decl.modifiers.push(tail_words[0].trim_end_matches('{').to_string());
            }
        }

        let body = &lines[start..=end];
        decl.complexity = 1 + body
            .iter()
            .map(|l| count_decisions(&l.code, DECISION_KEYWORDS) + l.code.matches("??").count())
            .sum::<usize>();
        self.record.callables.push(decl);

        let tail = tail.to_string();
        self.record_calls(&tail, lines[header_end].number);
        for line in &lines[header_end + 1..=end.max(header_end)] {
            self.record_calls(&line.code, line.number);
        }
        end.max(header_end) + 1
    }

    fn fields(&mut self, start: usize, header_end: usize, header: &str) {
        let lines = self.lines;
        let text = header.trim_end_matches(';');
        let declarators = split_top_level(text, ',');
        let Some(first) = declarators.first() else {
            return;
        };
        let first_decl = first.split('=').next().unwrap_or(first).trim();
        let words: Vec<&str> = first_decl.split_whitespace().collect();
        let Some(first_name) = words.last() else {
            return;
        };
        let modifiers: Vec<String> = words[..words.len() - 1]
            .iter()
            .filter(|w| MEMBER_MODIFIERS.contains(*w))
            .map(|w| w.to_string())
            .collect();
        let type_words: Vec<&str> = words[..words.len() - 1]
            .iter()
            .filter(|w| !MEMBER_MODIFIERS.contains(*w))
            .copied()
            .collect();
        let type_name = if type_words.is_empty() {
            None
        } else {
            Some(type_words.join(" "))
        };
        let annotations = std::mem::take(&mut self.pending_annotations);

        let mut names = vec![first_name.to_string()];
        for extra in &declarators[1..] {
            if let Some(name) = scanner::leading_ident(extra.split('=').next().unwrap_or(extra)) {
                names.push(name.to_string());
            }
        }
        for name in names {
            if !name.chars().all(is_ident_char) {
                continue;
            }
            let mut field = FieldDecl::new(name, Span::single(lines[start].number));
            field.owner = self.owner();
            field.type_name = type_name.clone();
            field.modifiers = modifiers.clone();
            field.annotations = annotations.clone();
            self.record.fields.push(field);
        }

        if let Some((_, init)) = header.split_once('=') {
            self.record_calls(init, lines[header_end].number);
        }
    }
}

#[derive(Debug, Default)]
struct Clauses {
    type_parameters: Vec<String>,
    extends: Option<String>,
    with: Vec<String>,
    implements: Vec<String>,
    on: Option<String>,
}

/// Parse `<T> extends A with B, C implements D on E` up to the body.
fn parse_clauses(rest: &str) -> Clauses {
    let mut clauses = Clauses::default();
    let mut rest = rest.split('{').next().unwrap_or("").trim();

    if rest.starts_with('<') {
        let mut level = 0;
        let mut close = rest.len();
        for (i, c) in rest.char_indices() {
            match c {
                '<' => level += 1,
                '>' => {
                    level -= 1;
                    if level == 0 {
                        close = i;
                        break;
                    }
                }
                _ => {}
            }
        }
        clauses.type_parameters = split_top_level(&rest[1..close.min(rest.len())], ',')
            .iter()
            .filter_map(|p| p.split_whitespace().next().map(|s| s.to_string()))
            .collect();
        rest = rest.get(close + 1..).unwrap_or("").trim();
    }

    let mut current: Option<&str> = None;
    let mut buffers: Vec<(&str, String)> = Vec::new();
    for word in rest.split_whitespace() {
        match word {
            "extends" | "with" | "implements" | "on" => {
                current = Some(word);
                buffers.push((word, String::new()));
            }
            _ if current.is_some() => {
                if let Some((_, buf)) = buffers.last_mut() {
                    buf.push(' ');
                    buf.push_str(word);
                }
            }
            _ => {}
        }
    }

    for (keyword, text) in buffers {
        let names: Vec<String> = split_top_level(&text, ',')
            .iter()
            .map(|t| base_type_name(t))
            .filter(|t| !t.is_empty())
            .collect();
        match keyword {
            "extends" => clauses.extends = names.into_iter().next(),
            "with" => clauses.with.extend(names),
            "implements" => clauses.implements.extend(names),
            "on" => clauses.on = names.into_iter().next(),
            _ => {}
        }
    }
    clauses
}

/// Parse Dart parameters, including `{named}` and `[optional]` groups.
fn parse_parameters(text: &str) -> Vec<Parameter> {
    let flat: String = text
        .chars()
        .map(|c| if c == '{' || c == '}' || c == '[' || c == ']' { ' ' } else { c })
        .collect();
    split_top_level(&flat, ',')
        .into_iter()
        .filter_map(|raw| {
            let (_, raw) = strip_annotations(&raw);
            let decl = raw.split('=').next().unwrap_or(raw).trim();
            let words: Vec<&str> = decl
                .split_whitespace()
                .filter(|w| !matches!(*w, "required" | "final" | "covariant" | "const"))
                .collect();
            let name = words.last()?;
            let name = name
                .trim_start_matches("this.")
                .trim_start_matches("super.")
                .to_string();
            let type_name = if words.len() > 1 {
                Some(words[..words.len() - 1].join(" "))
            } else {
                None
            };
            Some(Parameter { name, type_name })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> DartRecord {
        DartExtractor::new().extract_source(source).unwrap()
    }

    #[test]
    fn test_directives() {
        let record = extract(
            r#"
library app.models;

import 'package:flutter/material.dart';
import '../util/strings.dart' as strings;
export 'src/api.dart';
part 'models.g.dart';
part of 'other.dart';
"#,
        );
        assert_eq!(record.library.as_deref(), Some("app.models"));
        assert_eq!(record.library_line, 2);
        let paths: Vec<_> = record.imports.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "package:flutter/material.dart",
                "../util/strings.dart",
                "src/api.dart",
                "models.g.dart"
            ]
        );
        assert_eq!(record.imports[1].alias.as_deref(), Some("strings"));
        assert_eq!(record.imports[2].name.as_deref(), Some("export"));
    }

    #[test]
    fn test_class_with_members() {
        let record = extract(
            r#"
abstract class Animal<T> extends Base<T> with Walker, Swimmer implements Comparable<Animal> {
  final String name;
  int legs = 4, eyes = 2;
  static const kingdom = 'animalia';

  Animal(this.name);
  Animal.named({required this.name});

  int get legCount => legs;

  @override
  int compareTo(Animal other) {
    if (legs > other.legs || name.isEmpty) {
      return describe(other);
    }
    return 0;
  }

  void speak();
}
"#,
        );
        let animal = &record.types[0];
        assert_eq!(animal.name, "Animal");
        assert_eq!(animal.kind, TypeKind::Class);
        assert_eq!(animal.modifiers, vec!["abstract"]);
        assert_eq!(animal.superclass.as_deref(), Some("Base"));
        assert_eq!(animal.mixins, vec!["Walker", "Swimmer"]);
        assert_eq!(animal.interfaces, vec!["Comparable"]);
        assert_eq!(animal.type_parameters, vec!["T"]);
        assert_eq!(animal.span, Span::new(2, 21));

        let fields: Vec<_> = record.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["name", "legs", "eyes", "kingdom"]);
        assert_eq!(record.fields[0].type_name.as_deref(), Some("String"));
        assert_eq!(record.fields[0].modifiers, vec!["final"]);

        let callables: Vec<_> = record
            .callables
            .iter()
            .map(|c| (c.name.as_str(), c.kind))
            .collect();
        assert_eq!(
            callables,
            vec![
                ("Animal", CallableKind::Constructor),
                ("Animal.named", CallableKind::Constructor),
                ("legCount", CallableKind::Method),
                ("compareTo", CallableKind::Method),
                ("speak", CallableKind::Method),
            ]
        );
        let compare = &record.callables[3];
        assert!(compare.has_annotation("override"));
        assert_eq!(compare.return_type.as_deref(), Some("int"));
        assert_eq!(compare.owner.as_deref(), Some("Animal"));
        assert_eq!(compare.complexity, 3);
        assert_eq!(record.callables[1].parameters[0].name, "name");

        assert!(record.calls.iter().any(|c| c.callee == "describe"));
    }

    #[test]
    fn test_other_type_kinds() {
        let record = extract(
            r#"
mixin Walker on Animal {
  void walk() {}
}

extension StringX on String {
  bool get isBlank => trim().isEmpty;
}

extension on int {
  int doubled() => this * 2;
}

enum Color { red, green, blue }

enum Status implements Labeled {
  active,
  inactive;

  String get label => name;
}

typedef Json = Map<String, dynamic>;

sealed class Shape {}

Future<void> main() async {
  runApp(App());
}
"#,
        );
        let kinds: Vec<_> = record
            .types
            .iter()
            .map(|t| (t.name.as_str(), t.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("Walker", TypeKind::Mixin),
                ("StringX", TypeKind::Extension),
                ("_intExtension", TypeKind::Extension),
                ("Color", TypeKind::Enum),
                ("Status", TypeKind::Enum),
                ("Json", TypeKind::TypeAlias),
                ("Shape", TypeKind::Class),
            ]
        );
        assert_eq!(record.types[0].on_type.as_deref(), Some("Animal"));
        assert_eq!(record.types[1].on_type.as_deref(), Some("String"));
        assert_eq!(record.types[2].on_type.as_deref(), Some("int"));
        assert_eq!(record.types[4].interfaces, vec!["Labeled"]);
        assert_eq!(record.types[6].modifiers, vec!["sealed"]);

        let values: Vec<_> = record
            .fields
            .iter()
            .map(|f| (f.owner.as_deref().unwrap_or(""), f.name.as_str()))
            .collect();
        assert_eq!(
            values,
            vec![
                ("Color", "red"),
                ("Color", "green"),
                ("Color", "blue"),
                ("Status", "active"),
                ("Status", "inactive"),
            ]
        );

        let is_blank = record.callables.iter().find(|c| c.name == "isBlank").unwrap();
        assert_eq!(is_blank.owner.as_deref(), Some("StringX"));
        let label = record.callables.iter().find(|c| c.name == "label").unwrap();
        assert_eq!(label.owner.as_deref(), Some("Status"));

        let main = record.callables.iter().find(|c| c.name == "main").unwrap();
        assert_eq!(main.kind, CallableKind::Function);
        assert_eq!(main.return_type.as_deref(), Some("Future<void>"));
        assert!(main.has_modifier("async"));
        let callees: Vec<_> = record.calls.iter().map(|c| c.callee.as_str()).collect();
        assert!(callees.contains(&"runApp"));
        assert!(callees.contains(&"App"));
    }

    #[test]
    fn test_ignores_comments() {
        let record = extract("// class Hidden {}\n/* mixin Gone {} */\n/// class DocOnly\nclass Shown {}\n");
        let names: Vec<_> = record.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Shown"]);
    }
}
