//! Cross-file reference resolution.
//!
//! Runs once after every file of a build pass has been emitted. Type-level
//! references go first so overrides can walk the recorded hierarchy.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::arena::{Origin, PendingRef, SuperClause, WorkingSet};
use super::{ImportRef, LanguageRoutine, RoutineRegistry};
use crate::model::{Category, Namespace, Node, NodeKind, RelKind, RelVerb, Relationship};

pub(crate) fn resolve_pending(registry: &RoutineRegistry, set: &mut WorkingSet) {
    let pending = set.take_pending();
    let (types, rest): (Vec<_>, Vec<_>) = pending.into_iter().partition(|r| {
        matches!(r, PendingRef::Supertype { .. } | PendingRef::Extension { .. })
    });

    let mut resolved = 0usize;
    let mut dropped = 0usize;
    for reference in types.into_iter().chain(rest) {
        if resolve_one(registry, set, reference) {
            resolved += 1;
        } else {
            dropped += 1;
        }
    }
    debug!(resolved, dropped, "References resolved");
}

fn resolve_one(registry: &RoutineRegistry, set: &mut WorkingSet, reference: PendingRef) -> bool {
    match reference {
        PendingRef::Supertype {
            source,
            name,
            clause,
        } => supertype(registry, set, &source, &name, clause),
        PendingRef::Extension { source, receiver } => extension(registry, set, &source, &receiver),
        PendingRef::Override {
            member,
            owner,
            name,
        } => overrides(set, &member, &owner, &name),
        PendingRef::Annotation { source, name } => annotation(set, &source, &name),
        PendingRef::Call {
            caller,
            callee,
            qualifier,
            line,
        } => call(set, &caller, &callee, qualifier.as_deref(), line),
        PendingRef::Import {
            file,
            language,
            path,
            name,
            wildcard,
            line,
            statement,
        } => {
            let Some(routine) = registry.get(language) else {
                return false;
            };
            let import = ImportRef {
                path: &path,
                name: name.as_deref(),
                wildcard,
            };
            import_edges(routine, set, &file, &import, line, &statement)
        }
    }
}

/// Routine and origin for a declaration id.
fn context<'r>(
    registry: &'r RoutineRegistry,
    set: &WorkingSet,
    id: &str,
) -> Option<(&'r dyn LanguageRoutine, NodeKind, Origin)> {
    let kind = set.kind_of(id)?;
    let routine = registry.for_namespace(kind.namespace)?;
    let origin = set.origin(id).cloned().unwrap_or_default();
    Some((routine, kind, origin))
}

fn is_type_in(namespace: Namespace) -> impl Fn(NodeKind) -> bool {
    move |k| k.namespace == namespace && k.category.is_type_definition()
}

fn supertype(
    registry: &RoutineRegistry,
    set: &mut WorkingSet,
    source: &str,
    name: &str,
    clause: SuperClause,
) -> bool {
    let Some((routine, kind, origin)) = context(registry, set, source) else {
        return false;
    };
    let ns = kind.namespace;
    let target = match set.resolve(name, &origin, is_type_in(ns)) {
        Some(id) => id,
        None => set.add_node(Node::stub(
            NodeKind::new(ns, routine.stub_category(clause)),
            name,
        )),
    };
    if target == source {
        return false;
    }
    let Some(target_kind) = set.kind_of(&target) else {
        return false;
    };
    let verb = routine.hierarchy_verb(kind.category, target_kind.category, clause);
    set.relate(Relationship::new(RelKind::new(ns, verb), source, target.as_str()));
    set.record_supertype(source, &target);
    true
}

fn extension(registry: &RoutineRegistry, set: &mut WorkingSet, source: &str, receiver: &str) -> bool {
    let Some((routine, kind, origin)) = context(registry, set, source) else {
        return false;
    };
    let ns = kind.namespace;
    let receiver = receiver.trim_end_matches('?');
    let target = match set.resolve(receiver, &origin, is_type_in(ns)) {
        Some(id) => id,
        None => set.add_node(Node::stub(
            NodeKind::new(ns, routine.stub_category(SuperClause::Superclass)),
            receiver,
        )),
    };
    set.relate(Relationship::new(
        RelKind::new(ns, RelVerb::ExtensionOf),
        source,
        target,
    ))
}

/// Link a member to the nearest same-name callable up the type hierarchy.
fn overrides(set: &mut WorkingSet, member: &str, owner: &str, name: &str) -> bool {
    let Some(ns) = set.namespace_of(member) else {
        return false;
    };
    let mut queue: VecDeque<String> = set.supertypes_of(owner).iter().cloned().collect();
    let mut seen: HashSet<String> = HashSet::from([owner.to_string()]);

    while let Some(ancestor) = queue.pop_front() {
        if !seen.insert(ancestor.clone()) {
            continue;
        }
        let found = set.members_of(&ancestor).iter().find(|id| {
            id.as_str() != member
                && set
                    .node(id)
                    .is_some_and(|n| n.name == name && n.kind.category.is_callable())
        });
        if let Some(target) = found.cloned() {
            return set.relate(Relationship::new(
                RelKind::new(ns, RelVerb::Overrides),
                member,
                target,
            ));
        }
        queue.extend(set.supertypes_of(&ancestor).iter().cloned());
    }
    false
}

fn annotation(set: &mut WorkingSet, source: &str, name: &str) -> bool {
    let Some(ns) = set.namespace_of(source) else {
        return false;
    };
    let origin = set.origin(source).cloned().unwrap_or_default();
    let accept = |k: NodeKind| k.namespace == ns && k.category == Category::Annotation;
    match set.resolve(name, &origin, accept) {
        Some(target) => set.relate(Relationship::new(
            RelKind::new(ns, RelVerb::AnnotatedWith),
            source,
            target,
        )),
        None => false,
    }
}

fn call(
    set: &mut WorkingSet,
    caller: &str,
    callee: &str,
    qualifier: Option<&str>,
    line: usize,
) -> bool {
    let Some(ns) = set.namespace_of(caller) else {
        return false;
    };
    let origin = set.origin(caller).cloned().unwrap_or_default();
    let is_callable = |k: NodeKind| k.namespace == ns && k.category.is_callable();

    let target = match qualifier {
        None | Some("this" | "self" | "super") => origin
            .owner
            .as_deref()
            .and_then(|owner| member_in_hierarchy(set, owner, callee))
            .or_else(|| set.resolve(callee, &origin, is_callable)),
        Some(q) if q.starts_with(char::is_uppercase) => set
            .resolve(q, &origin, is_type_in(ns))
            .and_then(|owner| member_in_hierarchy(set, &owner, callee))
            .or_else(|| set.resolve(&format!("{q}.{callee}"), &origin, is_callable)),
        Some(_) => set.resolve(callee, &origin, is_callable),
    };

    match target {
        Some(target) => set.relate(
            Relationship::new(RelKind::CALLS, caller, target).with_property("line", line),
        ),
        None => false,
    }
}

/// A callable named `name` declared on `owner` or one of its supertypes.
fn member_in_hierarchy(set: &WorkingSet, owner: &str, name: &str) -> Option<String> {
    let mut queue = VecDeque::from([owner.to_string()]);
    let mut seen = HashSet::new();
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        let found = set.members_of(&current).iter().find(|id| {
            set.node(id)
                .is_some_and(|n| n.name == name && n.kind.category.is_callable())
        });
        if let Some(id) = found {
            return Some(id.clone());
        }
        queue.extend(set.supertypes_of(&current).iter().cloned());
    }
    None
}

fn import_edges(
    routine: &dyn LanguageRoutine,
    set: &mut WorkingSet,
    file: &str,
    import: &ImportRef<'_>,
    line: usize,
    statement: &str,
) -> bool {
    let Some(source) = set.file_id(file).map(str::to_string) else {
        return false;
    };
    let targets = routine.import_targets(set, file, import);
    let mut linked = false;
    for target in targets {
        if target == file {
            continue;
        }
        let Some(target_id) = set.file_id(&target).map(str::to_string) else {
            continue;
        };
        linked |= set.relate(
            Relationship::new(RelKind::IMPORTS, source.as_str(), target_id)
                .with_property("line", line)
                .with_property("statement", statement),
        );
    }
    linked
}

/// Files declaring `qualified`, or for wildcards, files whose scope is `qualified`.
///
/// Shared by the JVM languages, where imports name packages and types.
pub(crate) fn qualified_import_targets(
    set: &WorkingSet,
    namespace: Namespace,
    import: &ImportRef<'_>,
) -> Vec<String> {
    let path = import.path.trim_end_matches(".*");
    if import.wildcard {
        let mut files: Vec<String> = set
            .file_paths()
            .filter(|f| set.file_scope(f) == Some(path))
            .map(str::to_string)
            .collect();
        // `import static a.B.*` names a type rather than a package.
        files.extend(declaring_files(set, namespace, path));
        files.sort();
        files.dedup();
        return files;
    }

    let mut candidate = path;
    loop {
        let files = declaring_files(set, namespace, candidate);
        if !files.is_empty() {
            return files;
        }
        match candidate.rsplit_once('.') {
            Some((parent, _)) => candidate = parent,
            None => return Vec::new(),
        }
    }
}

fn declaring_files(set: &WorkingSet, namespace: Namespace, qualified: &str) -> Vec<String> {
    let mut files: Vec<String> = set
        .by_qualified(qualified)
        .iter()
        .filter_map(|id| set.node(id))
        .filter(|n| n.kind.namespace == namespace && !n.kind.category.is_scope())
        .filter(|n| n.kind.category != Category::Import)
        .map(|n| n.file_path.clone())
        .collect();
    files.sort();
    files.dedup();
    files
}
