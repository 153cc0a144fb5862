//! Integration tests for ckg-graph
//!
//! Runs the whole pipeline against projects written to a temp directory:
//! discovery, extraction, graph building into graphqlite, then queries.

use std::fs;
use std::path::Path;

use ckg_graph::{
    BuildResult, Coordinator, CycleRelation, GraphBuilder, GraphSession, GraphStore, Namespace,
    ProjectParseResult, QueryInterface, SearchMode,
};
use serial_test::serial;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project(files: &[(&str, &str)]) -> (TempDir, ProjectParseResult) {
    let dir = TempDir::new().unwrap();
    for (relative, contents) in files {
        write(dir.path(), relative, contents);
    }
    let parsed = Coordinator::default().parse_project(dir.path());
    (dir, parsed)
}

fn index(parsed: &ProjectParseResult) -> (GraphStore, BuildResult) {
    let store = GraphStore::open_in_memory().expect("Should open in-memory store");
    let result = GraphBuilder::new().build_into(parsed, &store);
    assert!(result.success, "build failed: {:?}", result.errors);
    (store, result)
}

fn count(store: &GraphStore, node_type: &str) -> usize {
    store
        .query(&format!(
            "MATCH (n) WHERE n.node_type = '{node_type}' RETURN n.id AS id"
        ))
        .unwrap()
        .len()
}

#[test]
#[serial]
fn kotlin_package_class_and_function() {
    let (_dir, parsed) = project(&[(
        "src/Foo.kt",
        "package com.example\n\nclass Foo\n\nfun bar() {}\n",
    )]);
    assert!(parsed.parse_errors.is_empty());

    let (store, result) = index(&parsed);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert_eq!(count(&store, "KotlinPackage"), 1);
    assert_eq!(count(&store, "KotlinClass"), 1);
    assert_eq!(count(&store, "KotlinFunction"), 1);

    let contains = store
        .query("MATCH (p)-[r]->(c) WHERE p.node_type = 'KotlinPackage' RETURN c.name AS name")
        .unwrap();
    let mut names: Vec<_> = contains
        .iter()
        .map(|row| row["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Foo", "bar"]);
}

#[test]
#[serial]
fn second_build_leaves_store_counts_unchanged() {
    let (_dir, parsed) = project(&[
        (
            "src/main/java/com/example/Animal.java",
            "package com.example;\n\npublic class Animal {\n    public void speak() {}\n}\n",
        ),
        (
            "src/main/java/com/example/Dog.java",
            "package com.example;\n\npublic class Dog extends Animal {\n    @Override\n    public void speak() { bark(); }\n\n    void bark() {}\n}\n",
        ),
    ]);

    let (store, first) = index(&parsed);
    let before = store.stats().unwrap();

    let second = GraphBuilder::new().build_into(&parsed, &store);
    assert!(second.success);
    assert_eq!(store.stats().unwrap(), before);
    assert_eq!(first.created_nodes, second.created_nodes);
    assert_eq!(first.statements, second.statements);
}

#[test]
#[serial]
fn emitted_statements_replay_into_an_empty_store() {
    let (_dir, parsed) = project(&[
        (
            "src/main/java/com/example/Dog.java",
            "package com.example;\n\npublic class Dog extends org.lib.Animal {\n    public void speak() { bark(); }\n\n    void bark() {}\n}\n",
        ),
        ("a.kt", "package p.a\n\nimport p.b.B\n\nclass A\n"),
        ("b.kt", "package p.b\n\nclass B\n"),
    ]);
    let (native, result) = index(&parsed);
    assert!(!result.statements.is_empty());
    assert_eq!(result.statements.len(), result.statement_count);

    let replayed = GraphStore::open_in_memory().unwrap();
    for text in &result.statements {
        if let Err(e) = replayed.query(text) {
            panic!("statement failed: {text}\n{e}");
        }
    }
    let stats = replayed.stats().unwrap();
    assert_eq!(stats.node_count as usize, result.nodes_created);
    assert_eq!(stats.edge_count as usize, result.relationships_created);
    assert_eq!(stats, native.stats().unwrap());

    // Properties set by the text form match the native merge.
    let properties = "MATCH (n) RETURN n.id AS id, n.name AS name, n.node_type AS type, \
                      n.line_number AS line, n.stub AS stub ORDER BY n.id";
    assert_eq!(
        replayed.query(properties).unwrap(),
        native.query(properties).unwrap()
    );
    let calls = replayed
        .query("MATCH (a)-[r:CALLS]->(b) RETURN b.name AS callee, r.line AS line")
        .unwrap();
    assert!(!calls.is_empty());
    assert!(calls.iter().all(|row| row["line"].as_i64().is_some()));
    let imports = replayed
        .query("MATCH (a)-[r:IMPORTS]->(b) RETURN r.line AS line, r.statement AS statement")
        .unwrap();
    assert_eq!(imports.len(), 1);
    assert!(imports[0]["line"].as_i64().is_some());
    assert!(imports[0]["statement"].as_str().unwrap().contains("p.b.B"));

    for text in &result.statements {
        replayed.query(text).unwrap();
    }
    assert_eq!(replayed.stats().unwrap(), stats);
}

#[test]
#[serial]
fn one_failing_file_does_not_stop_the_build() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a/One.java", "package a;\nclass One {}\n");
    write(dir.path(), "a/Two.java", "package a;\nclass Two {}\n");
    write(
        dir.path(),
        "a/Big.java",
        &format!("package a;\nclass Big {{}}\n{}", "// padding\n".repeat(200)),
    );
    let config = ckg_graph::ExtractionConfig {
        max_file_bytes: 256,
        ..Default::default()
    };
    let parsed = Coordinator::new(config).parse_project(dir.path());

    assert_eq!(parsed.total_files, 3);
    assert_eq!(parsed.successful_files().count(), 2);
    assert_eq!(parsed.parse_errors.len(), 1);
    assert_eq!(parsed.parse_errors[0].file_path, "a/Big.java");

    let (store, result) = index(&parsed);
    assert!(result.warnings.iter().any(|w| w.contains("a/Big.java")));
    assert_eq!(count(&store, "File"), 2);
    assert_eq!(count(&store, "JavaClass"), 2);
}

#[test]
#[serial]
fn import_cycle_is_reported() {
    let (_dir, parsed) = project(&[
        ("a.kt", "package p.a\n\nimport p.b.B\n\nclass A\n"),
        ("b.kt", "package p.b\n\nimport p.c.C\n\nclass B\n"),
        ("c.kt", "package p.c\n\nimport p.a.A\n\nclass C\n"),
    ]);
    let (store, _) = index(&parsed);

    let result = QueryInterface::new(&store).find_circular_dependencies(CycleRelation::Imports);
    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.len(), 1);
    assert_eq!(result.data[0]["length"], 3);
    let nodes = result.data[0]["nodes"].as_array().unwrap();
    assert!(nodes.iter().any(|n| n == "a.kt"));
}

#[test]
#[serial]
fn import_chain_is_not_a_cycle() {
    let (_dir, parsed) = project(&[
        ("a.kt", "package p.a\n\nimport p.b.B\n\nclass A\n"),
        ("b.kt", "package p.b\n\nimport p.c.C\n\nclass B\n"),
        ("c.kt", "package p.c\n\nclass C\n"),
    ]);
    let (store, _) = index(&parsed);

    let imports = store
        .query("MATCH (a)-[r:IMPORTS]->(b) RETURN a.name AS source")
        .unwrap();
    assert_eq!(imports.len(), 2);

    let result = QueryInterface::new(&store).find_circular_dependencies(CycleRelation::Imports);
    assert!(result.success);
    assert!(result.is_empty());
}

#[test]
#[serial]
fn unresolved_supertype_becomes_a_stub_and_override_resolves() {
    let (_dir, parsed) = project(&[
        (
            "com/example/Animal.java",
            "package com.example;\n\npublic abstract class Animal extends org.lib.Base {\n    public abstract String speak();\n}\n",
        ),
        (
            "com/example/Dog.java",
            "package com.example;\n\npublic class Dog extends Animal {\n    @Override\n    public String speak() { return \"woof\"; }\n}\n",
        ),
    ]);
    let (store, _) = index(&parsed);
    let query = QueryInterface::new(&store);

    let stats = query.project_statistics();
    assert!(stats.success);
    assert_eq!(stats.data[0]["files"], 2);
    assert!(stats.data[0]["stub_nodes"].as_u64().unwrap() >= 1);

    let stub = store
        .query("MATCH (n) WHERE n.stub = true RETURN n.name AS name, n.file_path AS file")
        .unwrap();
    assert!(stub.iter().any(|row| row["name"] == "Base"));
    assert!(stub.iter().all(|row| row["file"] == "<external>"));

    let overrides = query.find_overrides("speak", Some(Namespace::Java));
    assert!(overrides.success, "{:?}", overrides.error_message);
    assert_eq!(overrides.len(), 1);
    assert_eq!(overrides.data[0]["overrides"], "com.example.Animal.speak");
}

#[test]
#[serial]
fn search_and_file_queries() {
    let (_dir, parsed) = project(&[(
        "pkg/shapes.py",
        "class Circle:\n    def area(self):\n        return 3\n\n\ndef make_circle():\n    return Circle()\n",
    )]);
    let (store, _) = index(&parsed);
    let query = QueryInterface::new(&store);

    let found = query.search_by_name("Circle", SearchMode::Exact);
    assert!(found.success);
    assert_eq!(found.len(), 1);
    assert_eq!(found.data[0]["type"], "Class");

    let regex = query.search_by_name("^make_", SearchMode::Regex);
    assert_eq!(regex.len(), 1);

    let invalid = query.search_by_name("(", SearchMode::Regex);
    assert!(!invalid.success);
    assert!(invalid.error_message.unwrap().contains("Invalid regex"));

    let functions = query.functions_in_file("pkg/shapes.py");
    let names: Vec<_> = functions.data.iter().map(|v| v["name"].clone()).collect();
    assert_eq!(names, vec!["area", "make_circle"]);

    let classes = query.classes_in_file("pkg/shapes.py");
    assert_eq!(classes.len(), 1);
}
