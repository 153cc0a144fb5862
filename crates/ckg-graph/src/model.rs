//! Node and relationship types for the code knowledge graph.
//!
//! Node and relationship types are tagged pairs: a [`Namespace`] (the
//! generic namespace or one language's subtype namespace) plus a closed
//! category or verb. Each pair renders to the label used in the graph
//! store, e.g. `NodeKind { Java, Class }` is `JavaClass` and
//! `RelKind { Kotlin, Implements }` is `KOTLIN_IMPLEMENTS`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// File path recorded on stub nodes that stand in for declarations outside the project.
pub const EXTERNAL_PATH: &str = "<external>";

/// Owner of a slice of the node/relationship taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Language-neutral types (File, Module, Class, Function, ...). Python lives here.
    Generic,
    Java,
    Kotlin,
    Dart,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Generic,
        Namespace::Java,
        Namespace::Kotlin,
        Namespace::Dart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Generic => "generic",
            Namespace::Java => "java",
            Namespace::Kotlin => "kotlin",
            Namespace::Dart => "dart",
        }
    }

    /// Prefix prepended to node labels.
    pub fn label_prefix(&self) -> &'static str {
        match self {
            Namespace::Generic => "",
            Namespace::Java => "Java",
            Namespace::Kotlin => "Kotlin",
            Namespace::Dart => "Dart",
        }
    }

    /// Prefix prepended to relationship types.
    pub fn rel_prefix(&self) -> &'static str {
        match self {
            Namespace::Generic => "",
            Namespace::Java => "JAVA_",
            Namespace::Kotlin => "KOTLIN_",
            Namespace::Dart => "DART_",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The category of a node within its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    File,
    Module,
    Package,
    Library,
    Class,
    DataClass,
    SealedClass,
    Record,
    Interface,
    Object,
    Enum,
    Annotation,
    TypeAlias,
    Mixin,
    Extension,
    Function,
    ExtensionFunction,
    Method,
    Constructor,
    Field,
    Property,
    Variable,
    Import,
}

impl Category {
    pub const ALL: [Category; 23] = [
        Category::File,
        Category::Module,
        Category::Package,
        Category::Library,
        Category::Class,
        Category::DataClass,
        Category::SealedClass,
        Category::Record,
        Category::Interface,
        Category::Object,
        Category::Enum,
        Category::Annotation,
        Category::TypeAlias,
        Category::Mixin,
        Category::Extension,
        Category::Function,
        Category::ExtensionFunction,
        Category::Method,
        Category::Constructor,
        Category::Field,
        Category::Property,
        Category::Variable,
        Category::Import,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::File => "File",
            Category::Module => "Module",
            Category::Package => "Package",
            Category::Library => "Library",
            Category::Class => "Class",
            Category::DataClass => "DataClass",
            Category::SealedClass => "SealedClass",
            Category::Record => "Record",
            Category::Interface => "Interface",
            Category::Object => "Object",
            Category::Enum => "Enum",
            Category::Annotation => "Annotation",
            Category::TypeAlias => "TypeAlias",
            Category::Mixin => "Mixin",
            Category::Extension => "Extension",
            Category::Function => "Function",
            Category::ExtensionFunction => "ExtensionFunction",
            Category::Method => "Method",
            Category::Constructor => "Constructor",
            Category::Field => "Field",
            Category::Property => "Property",
            Category::Variable => "Variable",
            Category::Import => "Import",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Returns true if this category represents a type definition.
    pub fn is_type_definition(&self) -> bool {
        matches!(
            self,
            Category::Class
                | Category::DataClass
                | Category::SealedClass
                | Category::Record
                | Category::Interface
                | Category::Object
                | Category::Enum
                | Category::Annotation
                | Category::TypeAlias
                | Category::Mixin
                | Category::Extension
        )
    }

    /// Returns true if this category represents a callable.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Category::Function
                | Category::ExtensionFunction
                | Category::Method
                | Category::Constructor
        )
    }

    /// Returns true if this category names a scope that holds top-level declarations.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            Category::File | Category::Module | Category::Package | Category::Library
        )
    }
}

/// A node type: namespace plus category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NodeKind {
    pub namespace: Namespace,
    pub category: Category,
}

impl NodeKind {
    pub const fn new(namespace: Namespace, category: Category) -> Self {
        Self {
            namespace,
            category,
        }
    }

    pub const fn generic(category: Category) -> Self {
        Self::new(Namespace::Generic, category)
    }

    /// The graph label, e.g. `File`, `JavaClass`, `KotlinDataClass`.
    pub fn label(&self) -> String {
        format!("{}{}", self.namespace.label_prefix(), self.category.as_str())
    }

    /// Parse a label produced by [`NodeKind::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        for namespace in [Namespace::Java, Namespace::Kotlin, Namespace::Dart] {
            if let Some(rest) = label.strip_prefix(namespace.label_prefix()) {
                if let Some(category) = Category::parse(rest) {
                    return Some(Self::new(namespace, category));
                }
            }
        }
        Category::parse(label).map(Self::generic)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.label()
    }
}

impl TryFrom<String> for NodeKind {
    type Error = String;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        NodeKind::from_label(&label).ok_or_else(|| format!("unknown node type: {label}"))
    }
}

/// The verb of a relationship within its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelVerb {
    /// Parent scope contains child (File -> Package, Class -> Method)
    Contains,
    /// File-level import resolved to another project file
    Imports,
    /// Callable invokes callable
    Calls,
    /// Module defines a top-level function
    DefinesFunction,
    /// Module defines a top-level class
    DefinesClass,
    /// Class inheritance without a language-specific namespace
    Inherits,
    Extends,
    Implements,
    Overrides,
    MixesIn,
    /// Extension declaration to the type it extends
    ExtensionOf,
    AnnotatedWith,
}

impl RelVerb {
    pub const ALL: [RelVerb; 12] = [
        RelVerb::Contains,
        RelVerb::Imports,
        RelVerb::Calls,
        RelVerb::DefinesFunction,
        RelVerb::DefinesClass,
        RelVerb::Inherits,
        RelVerb::Extends,
        RelVerb::Implements,
        RelVerb::Overrides,
        RelVerb::MixesIn,
        RelVerb::ExtensionOf,
        RelVerb::AnnotatedWith,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelVerb::Contains => "CONTAINS",
            RelVerb::Imports => "IMPORTS",
            RelVerb::Calls => "CALLS",
            RelVerb::DefinesFunction => "DEFINES_FUNCTION",
            RelVerb::DefinesClass => "DEFINES_CLASS",
            RelVerb::Inherits => "INHERITS",
            RelVerb::Extends => "EXTENDS",
            RelVerb::Implements => "IMPLEMENTS",
            RelVerb::Overrides => "OVERRIDES",
            RelVerb::MixesIn => "MIXES_IN",
            RelVerb::ExtensionOf => "EXTENSION_OF",
            RelVerb::AnnotatedWith => "ANNOTATED_WITH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        RelVerb::ALL.into_iter().find(|v| v.as_str() == s)
    }

    /// Returns true if this verb links a type to one of its supertypes.
    pub fn is_type_hierarchy(&self) -> bool {
        matches!(
            self,
            RelVerb::Inherits | RelVerb::Extends | RelVerb::Implements | RelVerb::MixesIn
        )
    }
}

/// A relationship type: namespace plus verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RelKind {
    pub namespace: Namespace,
    pub verb: RelVerb,
}

impl RelKind {
    pub const CONTAINS: RelKind = RelKind::generic(RelVerb::Contains);
    pub const IMPORTS: RelKind = RelKind::generic(RelVerb::Imports);
    pub const CALLS: RelKind = RelKind::generic(RelVerb::Calls);
    pub const DEFINES_FUNCTION: RelKind = RelKind::generic(RelVerb::DefinesFunction);
    pub const DEFINES_CLASS: RelKind = RelKind::generic(RelVerb::DefinesClass);
    pub const INHERITS: RelKind = RelKind::generic(RelVerb::Inherits);

    pub const fn new(namespace: Namespace, verb: RelVerb) -> Self {
        Self { namespace, verb }
    }

    pub const fn generic(verb: RelVerb) -> Self {
        Self::new(Namespace::Generic, verb)
    }

    /// The relationship type in the store, e.g. `CONTAINS` or `JAVA_EXTENDS`.
    pub fn label(&self) -> String {
        format!("{}{}", self.namespace.rel_prefix(), self.verb.as_str())
    }

    /// The type written to the store.
    ///
    /// `CONTAINS` is a Cypher keyword, so it is stored as `_CONTAINS`.
    pub fn store_label(&self) -> String {
        let label = self.label();
        if label == "CONTAINS" {
            format!("_{label}")
        } else {
            label
        }
    }

    /// Parse a label produced by [`RelKind::label`] or [`RelKind::store_label`].
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.strip_prefix('_').unwrap_or(label);
        for namespace in [Namespace::Java, Namespace::Kotlin, Namespace::Dart] {
            if let Some(rest) = label.strip_prefix(namespace.rel_prefix()) {
                if let Some(verb) = RelVerb::parse(rest) {
                    return Some(Self::new(namespace, verb));
                }
            }
        }
        RelVerb::parse(label).map(Self::generic)
    }
}

impl fmt::Display for RelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<RelKind> for String {
    fn from(kind: RelKind) -> Self {
        kind.label()
    }
}

impl TryFrom<String> for RelKind {
    type Error = String;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        RelKind::from_label(&label).ok_or_else(|| format!("unknown relationship type: {label}"))
    }
}

/// A property value attached to a node or relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl PropertyValue {
    /// Returns true for empty text and empty lists.
    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Text(s) => s.trim().is_empty(),
            PropertyValue::List(items) => items.is_empty(),
            PropertyValue::Bool(_) | PropertyValue::Integer(_) => false,
        }
    }

    /// Flat string form of the value.
    ///
    /// Lists become a JSON array so they round-trip.
    pub fn to_storage_string(&self) -> String {
        match self {
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Integer(i) => i.to_string(),
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::List(items) => {
                serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        PropertyValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::List(value)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// Derive a deterministic node id.
///
/// The id hashes the label, the normalized qualified name and the normalized
/// file path, so names containing separators or quotes never collide or leak
/// into store syntax. A readable label prefix is kept for debugging.
pub fn node_id(kind: NodeKind, qualified_name: &str, file_path: &str) -> String {
    let label = kind.label();
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update([0u8]);
    hasher.update(qualified_name.trim().as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize_path(file_path).as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("{}:{}", label.to_lowercase(), hex)
}

/// Normalize path separators so ids do not depend on the host OS.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_string()
}

/// A code entity in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    pub file_path: String,
    /// 1-indexed declaration line; `None` when the extractor could not observe it.
    pub line_number: Option<usize>,
    pub properties: Properties,
}

impl Node {
    /// Create a node whose id is scoped to the declaring file.
    pub fn new(
        kind: NodeKind,
        qualified_name: impl Into<String>,
        name: impl Into<String>,
        file_path: impl Into<String>,
        line_number: usize,
    ) -> Self {
        let qualified_name = qualified_name.into();
        let file_path = normalize_path(&file_path.into());
        let id = node_id(kind, &qualified_name, &file_path);
        Self::with_id(id, kind, qualified_name, name, file_path, Some(line_number))
    }

    /// Create a node whose id ignores the file path.
    ///
    /// Used for packages, libraries and modules: every file declaring the
    /// same package name contributes to the same node.
    pub fn shared(
        kind: NodeKind,
        qualified_name: impl Into<String>,
        name: impl Into<String>,
        file_path: impl Into<String>,
        line_number: usize,
    ) -> Self {
        let qualified_name = qualified_name.into();
        let id = node_id(kind, &qualified_name, "");
        Self::with_id(
            id,
            kind,
            qualified_name,
            name,
            normalize_path(&file_path.into()),
            Some(line_number),
        )
    }

    /// Create a placeholder for a referenced declaration outside the project.
    pub fn stub(kind: NodeKind, qualified_name: impl Into<String>) -> Self {
        let qualified_name = qualified_name.into();
        let name = simple_name(&qualified_name).to_string();
        let id = node_id(kind, &qualified_name, "");
        Self::with_id(id, kind, qualified_name, name, EXTERNAL_PATH, Some(0))
            .with_property("stub", true)
    }

    fn with_id(
        id: String,
        kind: NodeKind,
        qualified_name: String,
        name: impl Into<String>,
        file_path: impl Into<String>,
        line_number: Option<usize>,
    ) -> Self {
        let mut properties = Properties::new();
        properties.insert(
            "qualified_name".to_string(),
            PropertyValue::Text(qualified_name),
        );
        Self {
            id,
            kind,
            name: name.into(),
            file_path: file_path.into(),
            line_number,
            properties,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Set a property only when the value carries information.
    pub fn set_if_present(&mut self, key: &str, value: impl Into<PropertyValue>) {
        let value = value.into();
        if !value.is_empty() {
            self.properties.insert(key.to_string(), value);
        }
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Text form of a core field or property, as the schema sees it.
    pub fn field_text(&self, key: &str) -> Option<String> {
        match key {
            "id" => Some(self.id.clone()),
            "name" => Some(self.name.clone()),
            "file_path" => Some(self.file_path.clone()),
            "line_number" => self.line_number.map(|line| line.to_string()),
            _ => self.properties.get(key).map(PropertyValue::to_storage_string),
        }
    }

    pub fn qualified_name(&self) -> &str {
        self.properties
            .get("qualified_name")
            .and_then(PropertyValue::as_text)
            .unwrap_or(&self.name)
    }

    pub fn is_stub(&self) -> bool {
        matches!(self.properties.get("stub"), Some(PropertyValue::Bool(true)))
    }

    /// Fold a later declaration of the same node into this one.
    ///
    /// The first declaration wins for core fields; properties the first one
    /// lacks are taken from the later one. A real declaration replaces a stub.
    pub fn merge_from(&mut self, other: Node) {
        if self.is_stub() && !other.is_stub() {
            let mut replacement = other;
            for (key, value) in std::mem::take(&mut self.properties) {
                if key != "stub" {
                    replacement.properties.entry(key).or_insert(value);
                }
            }
            *self = replacement;
            return;
        }
        for (key, value) in other.properties {
            self.properties.entry(key).or_insert(value);
        }
        if self.line_number.is_none() {
            self.line_number = other.line_number;
        }
    }

    /// Returns a location string for display (file:line).
    pub fn location(&self) -> String {
        match self.line_number {
            Some(line) => format!("{}:{}", self.file_path, line),
            None => self.file_path.clone(),
        }
    }
}

/// Last segment of a dotted name, without generic arguments.
pub fn simple_name(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit('.').next().unwrap_or(base).trim()
}

/// A directed, typed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub kind: RelKind,
    pub source_node_id: String,
    pub target_node_id: String,
    pub properties: Properties,
}

impl Relationship {
    pub fn new(kind: RelKind, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind,
            source_node_id: source.into(),
            target_node_id: target.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Identity used for deduplication within a build pass.
    pub fn key(&self) -> (String, RelKind, String) {
        (
            self.source_node_id.clone(),
            self.kind,
            self.target_node_id.clone(),
        )
    }
}
