//! Kotlin fact extraction by line scanning.
//!
//! There is no grammar behind this extractor: declarations are recognised
//! line by line on comment- and string-free code, and brace depth decides
//! which type a member belongs to. Output is best effort.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::extract::scanner::{
    self, ScannedLine, base_type_name, block_end, collect_header, count_decisions, find_calls,
    matching_paren, split_top_level, strip_annotations,
};
use crate::extract::{ExtractError, Extractor, Fidelity};
use crate::language::Language;
use crate::record::{
    CallSite, CallableDecl, CallableKind, FieldDecl, ImportDecl, KotlinRecord, LanguageRecord,
    Parameter, Span, TypeDecl, TypeKind,
};

const MODIFIERS: &str = r"public|private|protected|internal|abstract|open|final|sealed|data|enum|annotation|inner|value|inline|expect|actual|external|companion|override|suspend|operator|infix|tailrec|lateinit|const|crossinline|noinline|vararg";

const DECISION_KEYWORDS: &[&str] = &["if", "for", "while", "catch"];

const CALL_SKIP: &[&str] = &[
    "if", "for", "while", "when", "catch", "return", "fun", "constructor", "init", "throw",
    "super", "this", "object", "class", "interface", "get", "set",
];

struct KotlinPatterns {
    package: Regex,
    import: Regex,
    type_decl: Regex,
    type_alias: Regex,
    function: Regex,
    property: Regex,
}

static KOTLIN_PATTERNS: OnceLock<Result<KotlinPatterns, String>> = OnceLock::new();

fn get_patterns() -> Result<&'static KotlinPatterns, ExtractError> {
    KOTLIN_PATTERNS
        .get_or_init(|| {
            let compile = |pattern: &str| Regex::new(pattern).map_err(|e| e.to_string());
            Ok(KotlinPatterns {
                package: compile(r"^package\s+([\w.]+)")?,
                import: compile(r"^import\s+([\w.]+?)(\.\*)?(?:\s+as\s+(\w+))?\s*;?\s*$")?,
                type_decl: compile(&format!(
                    r"^((?:(?:{MODIFIERS}|fun)\s+)*)(class|interface|object)\b\s*([A-Za-z_]\w*)?"
                ))?,
                type_alias: compile(&format!(
                    r"^((?:(?:{MODIFIERS})\s+)*)typealias\s+([A-Za-z_]\w*)"
                ))?,
                function: compile(&format!(
                    r"^((?:(?:{MODIFIERS})\s+)*)fun\s+(?:<[^>]*>\s*)?(?:([\w.<>?, *]+?)\.)?([A-Za-z_]\w*|`[^`]+`)\s*\("
                ))?,
                property: compile(&format!(
                    r"^((?:(?:{MODIFIERS})\s+)*)(val|var)\s+(?:<[^>]*>\s*)?(?:([\w.<>?]+?)\.)?([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*(?:=|\bby\b|$)"
                ))?,
            })
        })
        .as_ref()
        .map_err(|e| ExtractError::Query(e.clone()))
}

/// Heuristic Kotlin extractor.
pub struct KotlinExtractor;

impl KotlinExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract a record from Kotlin source.
    pub fn extract_source(&self, source: &str) -> Result<KotlinRecord, ExtractError> {
        let patterns = get_patterns()?;
        let lines = scanner::scan(source);
        let mut scan = Scan {
            patterns,
            lines: &lines,
            record: KotlinRecord::default(),
            scopes: Vec::new(),
            pending_annotations: Vec::new(),
        };
        scan.run();
        Ok(scan.record)
    }
}

impl Default for KotlinExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for KotlinExtractor {
    fn language(&self) -> Language {
        Language::Kotlin
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
        self.extract_source(source).map(LanguageRecord::Kotlin)
    }
}

/// A type body currently open.
struct Scope {
    nested_name: String,
    /// Brace depth of lines directly inside the body.
    depth: usize,
}

struct Scan<'a> {
    patterns: &'static KotlinPatterns,
    lines: &'a [ScannedLine],
    record: KotlinRecord,
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
                // Inside a function, initializer or lambda body.
                self.record_calls(line);
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

            let next = if let Some(caps) = self.patterns.package.captures(code) {
                self.record.package = Some(caps[1].to_string());
                self.record.package_line = line.number;
                i + 1
            } else if let Some(caps) = self.patterns.import.captures(code) {
                self.record.imports.push(ImportDecl {
                    path: caps[1].to_string(),
                    name: None,
                    alias: caps.get(3).map(|m| m.as_str().to_string()),
                    wildcard: caps.get(2).is_some(),
                    is_static: false,
                    line: line.number,
                    statement: line.raw.trim().to_string(),
                });
                i + 1
            } else if let Some(caps) = self.patterns.type_alias.captures(code) {
                let mut decl = TypeDecl::new(&caps[2], TypeKind::TypeAlias, Span::single(line.number));
                decl.modifiers = split_modifiers(&caps[1]);
                decl.annotations = std::mem::take(&mut self.pending_annotations);
                decl.enclosing = self.owner();
                if let Some((_, target)) = code.split_once('=') {
                    decl.superclass = Some(target.trim().to_string());
                }
                self.record.types.push(decl);
                i + 1
            } else if self.patterns.type_decl.is_match(code) {
                self.type_declaration(i)
            } else if self.patterns.function.is_match(code) {
                self.function_declaration(i)
            } else if let Some(caps) = self.patterns.property.captures(code) {
                let mut prop = FieldDecl::new(&caps[4], Span::single(line.number));
                prop.modifiers = split_modifiers(&caps[1]);
                prop.modifiers.push(caps[2].to_string());
                prop.receiver = caps.get(3).map(|m| m.as_str().to_string());
                prop.type_name = caps.get(5).map(|m| {
                    let ty = m.as_str();
                    ty.split(" get").next().unwrap_or(ty).trim().to_string()
                });
                prop.annotations = std::mem::take(&mut self.pending_annotations);
                prop.owner = self.owner();
                self.record.properties.push(prop);
                self.record_calls(line);
                i + 1
            } else {
                self.pending_annotations.clear();
                self.record_calls(line);
                i + 1
            };
            i = next;
        }
    }

    fn owner(&self) -> Option<String> {
        self.scopes.last().map(|s| s.nested_name.clone())
    }

    fn record_calls(&mut self, line: &ScannedLine) {
        let (_, code) = strip_annotations(&line.code);
        if self.patterns.function.is_match(code.trim()) {
            return;
        }
        for (qualifier, callee) in find_calls(&line.code, CALL_SKIP) {
            let is_method = qualifier.is_some();
            self.record.calls.push(CallSite {
                callee,
                qualifier: qualifier.filter(|q| !q.is_empty()),
                line: line.number,
                is_method,
            });
        }
    }

    /// Returns the index of the first line after the declaration header.
    fn type_declaration(&mut self, start: usize) -> usize {
        let (header, header_end) = collect_header(self.lines, start);
        let (_, header) = strip_annotations(&header);
        let Some(caps) = self.patterns.type_decl.captures(header) else {
            return start + 1;
        };
        let modifiers = split_modifiers(&caps[1]);
        let keyword = &caps[2];
        let is_companion = modifiers.iter().any(|m| m == "companion");
        let name = match caps.get(3) {
            Some(m) => m.as_str().to_string(),
            None if is_companion => "Companion".to_string(),
            None => return start + 1,
        };
        let rest = &header[caps.get(0).map(|m| m.end()).unwrap_or(0)..];

        let kind = match keyword {
            "interface" => TypeKind::Interface,
            "object" => TypeKind::Object,
            _ if modifiers.iter().any(|m| m == "data") => TypeKind::DataClass,
            _ if modifiers.iter().any(|m| m == "sealed") => TypeKind::SealedClass,
            _ if modifiers.iter().any(|m| m == "enum") => TypeKind::Enum,
            _ if modifiers.iter().any(|m| m == "annotation") => TypeKind::Annotation,
            _ => TypeKind::Class,
        };

        let end = block_end(self.lines, start, header_end);
        let line_number = self.lines[start].number;
        let mut decl = TypeDecl::new(name, kind, Span::new(line_number, self.lines[end].number));
        decl.modifiers = modifiers;
        decl.annotations = std::mem::take(&mut self.pending_annotations);
        decl.enclosing = self.owner();

        let header_info = parse_type_header(rest);
        decl.type_parameters = header_info.type_parameters;
        decl.superclass = header_info.superclass;
        decl.interfaces = header_info.interfaces;
        let nested = decl.nested_name();

        for (param, modifier) in header_info.properties {
            let mut prop = FieldDecl::new(param.name, Span::single(line_number));
            prop.type_name = param.type_name;
            prop.modifiers = vec![modifier];
            prop.owner = Some(nested.clone());
            self.record.properties.push(prop);
        }
        self.record.types.push(decl);

        if self.lines[header_end].depth_after > self.lines[start].depth {
            self.scopes.push(Scope {
                nested_name: nested,
                depth: self.lines[start].depth + 1,
            });
        }
        header_end + 1
    }

    fn function_declaration(&mut self, start: usize) -> usize {
        let (header, header_end) = collect_header(self.lines, start);
        let (_, header) = strip_annotations(&header);
        let Some(caps) = self.patterns.function.captures(header) else {
            return start + 1;
        };
        let modifiers = split_modifiers(&caps[1]);
        let receiver = caps.get(2).map(|m| m.as_str().trim().to_string());
        let name = caps[3].trim_matches('`').to_string();
        let open_paren = caps.get(0).map(|m| m.end() - 1).unwrap_or(0);

        let owner = self.owner();
        let kind = match (&receiver, &owner) {
            (Some(_), _) => CallableKind::ExtensionFunction,
            (None, Some(_)) => CallableKind::Method,
            (None, None) => CallableKind::Function,
        };

        let end = block_end(self.lines, start, header_end);
        let span = Span::new(self.lines[start].number, self.lines[end].number);
        let mut decl = CallableDecl::new(name, kind, span);
        decl.modifiers = modifiers;
        decl.annotations = std::mem::take(&mut self.pending_annotations);
        decl.owner = owner;
        decl.receiver = receiver;

        let mut header_tail = None;
        if let Some(close) = matching_paren(header, open_paren) {
            header_tail = Some(header[close + 1..].to_string());
            decl.parameters = parse_parameters(&header[open_paren + 1..close])
                .into_iter()
                .map(|(p, _)| p)
                .collect();
            let after = header[close + 1..].trim_start();
            if let Some(ret) = after.strip_prefix(':') {
                let ret = ret
                    .split(['{', '='])
                    .next()
                    .unwrap_or("")
                    .split(" where ")
                    .next()
                    .unwrap_or("")
                    .trim();
                if !ret.is_empty() {
                    decl.return_type = Some(ret.to_string());
                }
            }
        }

        let body = &self.lines[start..=end];
        decl.complexity = 1 + body
            .iter()
            .map(|l| count_decisions(&l.code, DECISION_KEYWORDS) + l.code.matches("?:").count())
            .sum::<usize>();
        self.record.callables.push(decl);

        // Expression bodies and one-line block bodies start on the header.
        if let Some(tail) = header_tail {
            for (qualifier, callee) in find_calls(&tail, CALL_SKIP) {
                let is_method = qualifier.is_some();
                self.record.calls.push(CallSite {
                    callee,
                    qualifier: qualifier.filter(|q| !q.is_empty()),
                    line: self.lines[header_end].number,
                    is_method,
                });
            }
        }
        let lines = self.lines;
        for line in &lines[header_end + 1..=end.max(header_end)] {
            self.record_calls(line);
        }
        end.max(header_end) + 1
    }
}

fn split_modifiers(text: &str) -> Vec<String> {
    text.split_whitespace().map(|s| s.to_string()).collect()
}

#[derive(Debug, Default)]
struct TypeHeader {
    type_parameters: Vec<String>,
    superclass: Option<String>,
    interfaces: Vec<String>,
    /// Primary-constructor `val`/`var` parameters with their keyword.
    properties: Vec<(Parameter, String)>,
}

/// Parse what follows the type name: type parameters, primary constructor
/// and the supertype list.
fn parse_type_header(rest: &str) -> TypeHeader {
    let mut info = TypeHeader::default();
    let mut rest = rest.trim_start();

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
        info.type_parameters = split_top_level(&rest[1..close.min(rest.len())], ',')
            .iter()
            .filter_map(|p| {
                p.split([':', ' '])
                    .find(|s| !s.is_empty() && !matches!(*s, "in" | "out" | "reified"))
                    .map(|s| s.to_string())
            })
            .collect();
        rest = rest.get(close + 1..).unwrap_or("").trim_start();
    }

    // Primary constructor, possibly with modifiers/annotations and `constructor`.
    let (_, after_annotations) = strip_annotations(rest);
    let mut ctor = after_annotations;
    for word in ["private", "protected", "internal", "public"] {
        ctor = ctor.strip_prefix(word).map(str::trim_start).unwrap_or(ctor);
    }
    ctor = ctor
        .strip_prefix("constructor")
        .map(str::trim_start)
        .unwrap_or(ctor);
    if ctor.starts_with('(') {
        if let Some(close) = matching_paren(ctor, 0) {
            info.properties = parse_parameters(&ctor[1..close])
                .into_iter()
                .filter_map(|(p, keyword)| keyword.map(|k| (p, k)))
                .collect();
            rest = ctor[close + 1..].trim_start();
        }
    }

    if let Some(supertypes) = rest.strip_prefix(':') {
        let supertypes = supertypes.split('{').next().unwrap_or("");
        let supertypes = supertypes.split(" where ").next().unwrap_or("");
        for entry in split_top_level(supertypes, ',') {
            let entry = entry.split(" by ").next().unwrap_or(&entry).trim();
            let (_, entry) = strip_annotations(entry);
            let name = base_type_name(entry);
            if name.is_empty() {
                continue;
            }
            // A constructor call marks the superclass.
            if entry.contains('(') && info.superclass.is_none() {
                info.superclass = Some(name);
            } else {
                info.interfaces.push(name);
            }
        }
    }

    info
}

/// Parse a parameter list, returning each parameter with its `val`/`var`
/// keyword when present.
fn parse_parameters(text: &str) -> Vec<(Parameter, Option<String>)> {
    split_top_level(text, ',')
        .into_iter()
        .filter_map(|raw| {
            let (_, raw) = strip_annotations(&raw);
            let decl = raw.split('=').next().unwrap_or(raw).trim();
            let (names, type_name) = match decl.split_once(':') {
                Some((n, t)) => (n.trim(), Some(t.trim().to_string())),
                None => (decl, None),
            };
            let mut keyword = None;
            let mut name = None;
            for word in names.split_whitespace() {
                match word {
                    "val" | "var" => keyword = Some(word.to_string()),
                    _ => name = Some(word.to_string()),
                }
            }
            let name = name?;
            Some((Parameter { name, type_name }, keyword))
        })
        .collect()
}
