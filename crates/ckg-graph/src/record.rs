//! Per-language extraction records.
//!
//! Extractors produce one [`LanguageRecord`] per file. The records are plain
//! data: the builder decides what becomes a node or a relationship.

use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Inclusive 1-indexed line range of a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line: end_line.max(start_line),
        }
    }

    pub fn single(line: usize) -> Self {
        Self::new(line, line)
    }

    pub fn contains(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    pub fn len(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    pub fn is_empty(&self) -> bool {
        self.start_line == 0
    }
}

/// An import/using directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDecl {
    /// Imported path as written (`java.util.List`, `os.path`, `package:a/b.dart`).
    pub path: String,
    /// Imported member for `from x import y` forms.
    pub name: Option<String>,
    pub alias: Option<String>,
    pub wildcard: bool,
    pub is_static: bool,
    pub line: usize,
    /// Source text of the directive.
    pub statement: String,
}

/// Kind of a type declaration as observed in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    DataClass,
    SealedClass,
    Interface,
    Object,
    Enum,
    Record,
    Annotation,
    TypeAlias,
    Mixin,
    Extension,
}

/// A class-like declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeKind,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    pub superclass: Option<String>,
    /// Implemented interfaces, or undifferentiated supertypes for languages
    /// that do not mark the difference syntactically.
    pub interfaces: Vec<String>,
    /// Dart `with` clause.
    pub mixins: Vec<String>,
    /// Dart `extension X on T` target, Dart mixin `on` constraint.
    pub on_type: Option<String>,
    /// Nested name of the enclosing type for nested declarations.
    pub enclosing: Option<String>,
    pub type_parameters: Vec<String>,
    pub span: Span,
    pub doc: Option<String>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, kind: TypeKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            modifiers: Vec::new(),
            annotations: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            mixins: Vec::new(),
            on_type: None,
            enclosing: None,
            type_parameters: Vec::new(),
            span,
            doc: None,
        }
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    /// Name qualified with its enclosing types (`Outer.Inner`).
    pub fn nested_name(&self) -> String {
        match &self.enclosing {
            Some(outer) => format!("{outer}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Kind of a callable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallableKind {
    Function,
    Method,
    Constructor,
    ExtensionFunction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_name: Option<String>,
}

/// A function, method or constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableDecl {
    pub name: String,
    pub kind: CallableKind,
    /// Enclosing type (possibly nested, `Outer.Inner`); `None` for top-level.
    pub owner: Option<String>,
    /// Receiver type of an extension function.
    pub receiver: Option<String>,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub span: Span,
    /// Cyclomatic complexity estimate (1 + decision points).
    pub complexity: usize,
    pub doc: Option<String>,
}

impl CallableDecl {
    pub fn new(name: impl Into<String>, kind: CallableKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            owner: None,
            receiver: None,
            modifiers: Vec::new(),
            annotations: Vec::new(),
            parameters: Vec::new(),
            return_type: None,
            span,
            complexity: 1,
            doc: None,
        }
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations
            .iter()
            .any(|a| a.trim_start_matches('@') == annotation)
    }

    /// Parenthesized parameter list for display.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| match &p.type_name {
                Some(t) => format!("{}: {}", p.name, t),
                None => p.name.clone(),
            })
            .collect();
        match &self.return_type {
            Some(ret) => format!("{}({}) -> {}", self.name, params.join(", "), ret),
            None => format!("{}({})", self.name, params.join(", ")),
        }
    }
}

/// A field, property or module-level variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub owner: Option<String>,
    pub type_name: Option<String>,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    /// Kotlin extension property receiver.
    pub receiver: Option<String>,
    pub span: Span,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            owner: None,
            type_name: None,
            modifiers: Vec::new(),
            annotations: Vec::new(),
            receiver: None,
            span,
        }
    }
}

/// A call expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub callee: String,
    /// Receiver expression text for method calls (`this`, `repo`, `Foo`).
    pub qualifier: Option<String>,
    pub line: usize,
    pub is_method: bool,
}

/// Facts extracted from one Java file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaRecord {
    pub package: Option<String>,
    pub package_line: usize,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    pub callables: Vec<CallableDecl>,
    pub fields: Vec<FieldDecl>,
    pub calls: Vec<CallSite>,
}

/// Facts extracted from one Kotlin file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KotlinRecord {
    pub package: Option<String>,
    pub package_line: usize,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    pub callables: Vec<CallableDecl>,
    pub properties: Vec<FieldDecl>,
    pub calls: Vec<CallSite>,
}

/// Facts extracted from one Dart file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DartRecord {
    /// `library` directive name, if any.
    pub library: Option<String>,
    pub library_line: usize,
    /// `import`, `export` and `part` directives.
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    pub callables: Vec<CallableDecl>,
    pub fields: Vec<FieldDecl>,
    pub calls: Vec<CallSite>,
}

/// Facts extracted from one Python file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonRecord {
    /// Dotted module name derived from the relative path.
    pub module: String,
    pub doc: Option<String>,
    pub imports: Vec<ImportDecl>,
    pub classes: Vec<TypeDecl>,
    pub functions: Vec<CallableDecl>,
    pub variables: Vec<FieldDecl>,
    pub calls: Vec<CallSite>,
}

/// Extraction output for a single file, one variant per language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "language", rename_all = "snake_case")]
pub enum LanguageRecord {
    Java(JavaRecord),
    Kotlin(KotlinRecord),
    Dart(DartRecord),
    Python(PythonRecord),
}

impl LanguageRecord {
    pub fn language(&self) -> Language {
        match self {
            LanguageRecord::Java(_) => Language::Java,
            LanguageRecord::Kotlin(_) => Language::Kotlin,
            LanguageRecord::Dart(_) => Language::Dart,
            LanguageRecord::Python(_) => Language::Python,
        }
    }

    /// Number of declarations the record will contribute as nodes.
    pub fn declaration_count(&self) -> usize {
        match self {
            LanguageRecord::Java(r) => {
                r.types.len() + r.callables.len() + r.fields.len() + r.imports.len()
            }
            LanguageRecord::Kotlin(r) => {
                r.types.len() + r.callables.len() + r.properties.len() + r.imports.len()
            }
            LanguageRecord::Dart(r) => {
                r.types.len() + r.callables.len() + r.fields.len() + r.imports.len()
            }
            LanguageRecord::Python(r) => {
                r.classes.len() + r.functions.len() + r.variables.len() + r.imports.len()
            }
        }
    }
}
