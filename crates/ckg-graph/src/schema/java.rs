use super::{
    CALLABLE_OPTIONAL, IMPORT_OPTIONAL, MEMBER_OPTIONAL, SchemaBuilder, TYPE_OPTIONAL, kinds,
};
use crate::model::{Category, Namespace, NodeKind, RelKind, RelVerb};

const TYPES: &[Category] = &[
    Category::Class,
    Category::Interface,
    Category::Enum,
    Category::Record,
    Category::Annotation,
];

const CALLABLES: &[Category] = &[Category::Method, Category::Constructor];

pub(super) fn register(builder: &mut SchemaBuilder) {
    let ns = Namespace::Java;
    let kind = |category| NodeKind::new(ns, category);
    let file = NodeKind::generic(Category::File);
    let package = kind(Category::Package);
    let import = kind(Category::Import);
    let types = kinds(ns, TYPES);
    let callables = kinds(ns, CALLABLES);
    let field = kind(Category::Field);
    let mut members = callables.clone();
    members.push(field);
    let mut annotated = types.clone();
    annotated.extend(&members);

    builder
        .node(package, &["qualified_name"], &[])
        .node(import, &["statement"], IMPORT_OPTIONAL)
        .nodes(ns, TYPES, &["qualified_name"], TYPE_OPTIONAL)
        .nodes(ns, CALLABLES, &["qualified_name"], CALLABLE_OPTIONAL)
        .node(field, &["qualified_name"], MEMBER_OPTIONAL);

    let rel = |verb| RelKind::new(ns, verb);
    builder
        .relationship(RelKind::CONTAINS, &[file], &[package, import])
        .relationship(RelKind::CONTAINS, &[file], &types)
        .relationship(RelKind::CONTAINS, &[package], &types)
        .relationship(RelKind::CONTAINS, &types, &members)
        .relationship(RelKind::CONTAINS, &types, &types)
        .relationship(RelKind::CALLS, &callables, &callables)
        .relationship(
            rel(RelVerb::Extends),
            &[kind(Category::Class)],
            &[kind(Category::Class)],
        )
        .relationship(
            rel(RelVerb::Extends),
            &[kind(Category::Interface)],
            &[kind(Category::Interface)],
        )
        .relationship(
            rel(RelVerb::Implements),
            &[
                kind(Category::Class),
                kind(Category::Enum),
                kind(Category::Record),
            ],
            &[kind(Category::Interface)],
        )
        .relationship(
            rel(RelVerb::Overrides),
            &[kind(Category::Method)],
            &[kind(Category::Method)],
        )
        .relationship(
            rel(RelVerb::AnnotatedWith),
            &annotated,
            &[kind(Category::Annotation)],
        );
}
