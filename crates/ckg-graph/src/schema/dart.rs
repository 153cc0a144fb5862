use super::{
    CALLABLE_OPTIONAL, IMPORT_OPTIONAL, MEMBER_OPTIONAL, SchemaBuilder, TYPE_OPTIONAL, kinds,
};
use crate::model::{Category, Namespace, NodeKind, RelKind, RelVerb};

const TYPES: &[Category] = &[
    Category::Class,
    Category::Mixin,
    Category::Extension,
    Category::Enum,
    Category::TypeAlias,
];

const BODIED: &[Category] = &[
    Category::Class,
    Category::Mixin,
    Category::Extension,
    Category::Enum,
];

const CALLABLES: &[Category] = &[Category::Function, Category::Method, Category::Constructor];

pub(super) fn register(builder: &mut SchemaBuilder) {
    let ns = Namespace::Dart;
    let kind = |category| NodeKind::new(ns, category);
    let file = NodeKind::generic(Category::File);
    let library = kind(Category::Library);
    let import = kind(Category::Import);
    let class = kind(Category::Class);
    let field = kind(Category::Field);
    let function = kind(Category::Function);
    let method = kind(Category::Method);
    let types = kinds(ns, TYPES);
    let bodied = kinds(ns, BODIED);
    let callables = kinds(ns, CALLABLES);

    let mut top_level = types.clone();
    top_level.extend([function, field]);
    let members = [method, kind(Category::Constructor), field];

    builder
        .node(library, &["qualified_name"], &[])
        .node(import, &["statement"], IMPORT_OPTIONAL)
        .nodes(ns, TYPES, &["qualified_name"], TYPE_OPTIONAL)
        .nodes(ns, CALLABLES, &["qualified_name"], CALLABLE_OPTIONAL)
        .node(field, &["qualified_name"], MEMBER_OPTIONAL);

    let rel = |verb| RelKind::new(ns, verb);
    builder
        .relationship(RelKind::CONTAINS, &[file], &[library, import])
        .relationship(RelKind::CONTAINS, &[file], &top_level)
        .relationship(RelKind::CONTAINS, &[library], &top_level)
        .relationship(RelKind::CONTAINS, &bodied, &members)
        .relationship(RelKind::CALLS, &callables, &callables)
        .relationship(rel(RelVerb::Extends), &[class], &[class])
        .relationship(
            rel(RelVerb::Implements),
            &[class, kind(Category::Mixin), kind(Category::Enum)],
            &[class],
        )
        .relationship(
            rel(RelVerb::MixesIn),
            &[class, kind(Category::Enum)],
            &[kind(Category::Mixin)],
        )
        .relationship(rel(RelVerb::ExtensionOf), &[kind(Category::Extension)], &[class])
        .relationship(rel(RelVerb::Overrides), &[method], &[method]);
}
