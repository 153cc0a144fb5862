//! Language-neutral types. Python nodes live here.

use super::{CALLABLE_OPTIONAL, IMPORT_OPTIONAL, MEMBER_OPTIONAL, SchemaBuilder, TYPE_OPTIONAL};
use crate::model::{Category, NodeKind, RelKind};

pub(super) fn register(builder: &mut SchemaBuilder) {
    let file = NodeKind::generic(Category::File);
    let module = NodeKind::generic(Category::Module);
    let class = NodeKind::generic(Category::Class);
    let function = NodeKind::generic(Category::Function);
    let variable = NodeKind::generic(Category::Variable);
    let import = NodeKind::generic(Category::Import);

    builder
        .node(file, &["language"], &["relative_path", "line_count", "fidelity"])
        .node(module, &["qualified_name"], &["doc"])
        .node(class, &["qualified_name"], TYPE_OPTIONAL)
        .node(function, &["qualified_name"], CALLABLE_OPTIONAL)
        .node(variable, &["qualified_name"], MEMBER_OPTIONAL)
        .node(import, &["statement"], IMPORT_OPTIONAL);

    builder
        .relationship(RelKind::CONTAINS, &[file], &[module, import])
        .relationship(RelKind::CONTAINS, &[module], &[variable])
        .relationship(RelKind::CONTAINS, &[class], &[function, class, variable])
        .relationship(RelKind::DEFINES_CLASS, &[module], &[class])
        .relationship(RelKind::DEFINES_FUNCTION, &[module], &[function])
        .relationship(RelKind::IMPORTS, &[file], &[file])
        .relationship(RelKind::CALLS, &[function], &[function])
        .relationship(RelKind::INHERITS, &[class], &[class]);
}
