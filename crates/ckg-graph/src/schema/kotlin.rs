use super::{
    CALLABLE_OPTIONAL, IMPORT_OPTIONAL, MEMBER_OPTIONAL, SchemaBuilder, TYPE_OPTIONAL, kinds,
};
use crate::model::{Category, Namespace, NodeKind, RelKind, RelVerb};

const TYPES: &[Category] = &[
    Category::Class,
    Category::DataClass,
    Category::SealedClass,
    Category::Interface,
    Category::Object,
    Category::Enum,
    Category::Annotation,
    Category::TypeAlias,
];

/// Types that may declare members.
const BODIED: &[Category] = &[
    Category::Class,
    Category::DataClass,
    Category::SealedClass,
    Category::Interface,
    Category::Object,
    Category::Enum,
    Category::Annotation,
];

/// Concrete class-like types that may extend a class or implement interfaces.
const CLASS_LIKE: &[Category] = &[
    Category::Class,
    Category::DataClass,
    Category::SealedClass,
    Category::Object,
    Category::Enum,
];

const CALLABLES: &[Category] = &[Category::Function, Category::ExtensionFunction];

pub(super) fn register(builder: &mut SchemaBuilder) {
    let ns = Namespace::Kotlin;
    let kind = |category| NodeKind::new(ns, category);
    let file = NodeKind::generic(Category::File);
    let package = kind(Category::Package);
    let import = kind(Category::Import);
    let property = kind(Category::Property);
    let interface = kind(Category::Interface);
    let types = kinds(ns, TYPES);
    let bodied = kinds(ns, BODIED);
    let class_like = kinds(ns, CLASS_LIKE);
    let callables = kinds(ns, CALLABLES);

    let mut declarations = types.clone();
    declarations.extend(&callables);
    declarations.push(property);
    let mut members = callables.clone();
    members.push(property);

    builder
        .node(package, &["qualified_name"], &[])
        .node(import, &["statement"], IMPORT_OPTIONAL)
        .nodes(ns, TYPES, &["qualified_name"], TYPE_OPTIONAL)
        .nodes(ns, CALLABLES, &["qualified_name"], CALLABLE_OPTIONAL)
        .node(property, &["qualified_name"], MEMBER_OPTIONAL);

    let rel = |verb| RelKind::new(ns, verb);
    builder
        .relationship(RelKind::CONTAINS, &[file], &[package, import])
        .relationship(RelKind::CONTAINS, &[file], &declarations)
        .relationship(RelKind::CONTAINS, &[package], &declarations)
        .relationship(RelKind::CONTAINS, &bodied, &members)
        .relationship(RelKind::CONTAINS, &bodied, &types)
        .relationship(RelKind::CALLS, &callables, &callables)
        .relationship(
            rel(RelVerb::Extends),
            &class_like,
            &[kind(Category::Class), kind(Category::SealedClass)],
        )
        .relationship(rel(RelVerb::Extends), &[interface], &[interface])
        .relationship(rel(RelVerb::Implements), &class_like, &[interface])
        .relationship(
            rel(RelVerb::Overrides),
            &[kind(Category::Function)],
            &[kind(Category::Function)],
        )
        .relationship(
            rel(RelVerb::ExtensionOf),
            &[kind(Category::ExtensionFunction), property],
            &bodied,
        )
        .relationship(
            rel(RelVerb::AnnotatedWith),
            &declarations,
            &[kind(Category::Annotation)],
        );
}
