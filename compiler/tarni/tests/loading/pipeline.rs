//! Registry behavior across requests.

use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tarni::{ImportRequest, LoadError, LocationError, ENTRY_CONTEXT};

use crate::common::{expect_err, run, Tree};

fn shared_dependency() -> Tree {
    Tree::new()
        .file(
            "app/main.tarn",
            "package main
import \"../util\"
import \"../greet\"
func main() {
    println(util.Name(), greet.Hello())
}
",
        )
        .file(
            "greet/greet.tarn",
            "package greet
import \"../util\"
func Hello() string {
    return \"hello \" + util.Name()
}
",
        )
        .file(
            "util/util.tarn",
            "package util
func init() {
    println(\"util ready\")
}
func Name() string {
    return \"tarn\"
}
",
        )
}

#[test]
fn each_package_is_loaded_once() {
    let tree = shared_dependency();
    let interp = tree.interpreter();
    assert_eq!(
        run(&interp, "app").unwrap(),
        "util ready\ntarn hello tarn\n"
    );
    assert_eq!(tree.fs().reads("/work/util/util.tarn"), 1);
    assert_eq!(tree.fs().total_reads(), 3);

    // Repeated requests, in any spelling of the same path, reuse the
    // registered package.
    assert_eq!(interp.import("./util").unwrap(), "util");
    assert_eq!(interp.import("./app/../util").unwrap(), "util");
    assert_eq!(interp.eval_path("app").unwrap(), "main");
    assert_eq!(tree.fs().total_reads(), 3);
    assert_eq!(interp.output(), "util ready\ntarn hello tarn\n");
}

#[test]
fn import_cycle_is_reported() {
    let tree = Tree::new()
        .file("a/a.tarn", "package a\nimport \"../b\"\nvar X = b.Y\n")
        .file("b/b.tarn", "package b\nimport \"../a\"\nvar Y = a.X\n");
    let err = expect_err(tree.interpreter().import("./a"));
    assert!(
        matches!(&err, LoadError::ImportCycle { import_path } if import_path == "./a"),
        "{err:?}"
    );
    assert_eq!(err.to_string(), "import cycle not allowed\n\timports ./a");
}

#[test]
fn self_import_is_a_cycle() {
    let tree = Tree::new().file("a/a.tarn", "package a\nimport \".\"\n");
    let err = expect_err(tree.interpreter().import("./a"));
    assert!(matches!(err, LoadError::ImportCycle { .. }), "{err:?}");
}

#[test]
fn failed_package_is_not_loaded_again() {
    let tree = Tree::new().file("broken/b.tarn", "package broken\nvar = 1\n");
    let interp = tree.interpreter();

    let first = expect_err(interp.import("./broken"));
    assert!(matches!(first, LoadError::Parse { .. }), "{first:?}");
    assert_eq!(first.import_path(), Some("./broken"));

    let second = expect_err(interp.import("./broken"));
    assert!(matches!(second, LoadError::ImportCycle { .. }), "{second:?}");
    assert_eq!(tree.fs().total_reads(), 1);
}

#[test]
fn failing_dependency_fails_the_importer() {
    let tree = Tree::new()
        .file("app/main.tarn", "package main\nimport \"../dep\"\nfunc main() {}\n")
        .file("dep/dep.tarn", "package dep\nvar X int = \"text\"\n");
    let err = expect_err(tree.interpreter().eval_path("app"));
    assert!(
        matches!(&err, LoadError::Cfg { import_path, .. } if import_path == "./dep"),
        "{err:?}"
    );
}

#[test]
fn missing_library_lists_searched_directories() {
    let tree = Tree::new().file(
        "app/main.tarn",
        "package main\nimport \"net/nowhere\"\nfunc main() {}\n",
    );
    let err = expect_err(tree.interpreter().eval_path("app"));
    match &err {
        LoadError::Location(LocationError::NotFound { import_path, searched }) => {
            assert_eq!(import_path, "net/nowhere");
            assert_eq!(
                searched,
                &vec![std::path::PathBuf::from("/libs/src/net/nowhere")]
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "cannot find package \"net/nowhere\" in any of:\n\t/libs/src/net/nowhere"
    );
}

#[test]
fn directory_without_sources() {
    let tree = Tree::new().file("docs/readme.md", "# docs\n");
    let err = expect_err(tree.interpreter().import("./docs"));
    assert!(matches!(err, LoadError::NoSourceFiles { .. }), "{err:?}");
}

#[test]
fn import_src_accepts_explicit_requests() {
    let tree = Tree::new()
        .file("app/main.tarn", "package main\nfunc main() {\nprintln(\"entry\")\n}\n")
        .file("app/main_test.tarn", "package main\nfunc helper() int {\nreturn 1\n}\n");
    let interp = tree.interpreter();
    let request = ImportRequest::new(ENTRY_CONTEXT, "./app").with_tests();
    assert_eq!(interp.import_src(&request).unwrap(), "main");
    // Test builds never run the entry point.
    assert_eq!(interp.output(), "");
    assert_eq!(tree.fs().reads("/work/app/main_test.tarn"), 1);
}

#[test]
fn concurrent_imports_share_one_load() {
    let tree = Tree::new().file(
        "lib/lib.tarn",
        "package lib\nvar Ready = true\nfunc init() {\nprintln(\"lib init\")\n}\n",
    );
    tree.fs().set_read_delay(Duration::from_millis(50));
    let interp = tree.interpreter();
    let barrier = Barrier::new(2);

    let results: Vec<Result<String, String>> = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    interp.import("./lib").map_err(|e| e.to_string())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results, vec![Ok("lib".to_string()), Ok("lib".to_string())]);
    assert_eq!(tree.fs().reads("/work/lib/lib.tarn"), 1);
    assert_eq!(interp.output(), "lib init\n");
}

#[test]
fn concurrent_importers_wait_for_a_shared_dependency() {
    let tree = shared_dependency();
    tree.fs().set_read_delay(Duration::from_millis(20));
    let interp = tree.interpreter();
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        let greet = s.spawn(|| {
            barrier.wait();
            interp.import("./greet").unwrap()
        });
        let util = s.spawn(|| {
            barrier.wait();
            interp.import("./util").unwrap()
        });
        assert_eq!(greet.join().unwrap(), "greet");
        assert_eq!(util.join().unwrap(), "util");
    });
    assert_eq!(tree.fs().reads("/work/util/util.tarn"), 1);
    assert_eq!(interp.output(), "util ready\n");
}
