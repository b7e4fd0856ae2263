//! Global initializers, `init` functions and the entry point.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tarn_eval::ExecErrorKind;
use tarni::{buffer_handler, Interpreter, LoadError, MemoryFileSystem, Options, Value};

use crate::common::{expect_err, linux, run, Tree, SOURCE_ROOT};

fn two_file_program() -> Tree {
    Tree::new()
        .file(
            "app/a.tarn",
            "package main
func init() {
    println(\"init a\")
}
func main() {
    println(\"main\")
}
",
        )
        .file(
            "app/b.tarn",
            "package main
func init() {
    println(\"init b\")
}
",
        )
}

#[test]
fn inits_run_in_file_order_then_main_once() {
    let tree = two_file_program();
    let interp = tree.interpreter();
    assert_eq!(run(&interp, "app").unwrap(), "init a\ninit b\nmain\n");
    assert_eq!(run(&interp, "app").unwrap(), "init a\ninit b\nmain\n");
}

#[test]
fn dependency_main_package_never_runs_main() {
    let tree = two_file_program();
    let interp = tree.interpreter();
    assert_eq!(interp.import("./app").unwrap(), "main");
    assert_eq!(interp.output(), "init a\ninit b\n");
}

#[test]
fn imported_main_package_never_runs_main() {
    let tree = two_file_program().file(
        "host/host.tarn",
        "package main\nimport inner \"../app\"\nfunc main() {\nprintln(\"host\")\n}\n",
    );
    assert_eq!(
        run(&tree.interpreter(), "host").unwrap(),
        "init a\ninit b\nhost\n"
    );
}

#[test]
fn entry_package_without_main_only_initializes() {
    let tree = Tree::new().file(
        "app/a.tarn",
        "package main\nfunc init() {\nprintln(\"only init\")\n}\n",
    );
    assert_eq!(run(&tree.interpreter(), "app").unwrap(), "only init\n");
}

#[test]
fn globals_follow_dependency_order() {
    let tree = Tree::new().file("p/p.tarn", "package p\nvar x = y + 1\nvar y = 10\n");
    let interp = tree.interpreter();
    interp.import("./p").unwrap();
    assert_eq!(interp.lookup_global("./p", "x"), Some(Value::Int(11)));
    assert_eq!(interp.lookup_global("./p", "y"), Some(Value::Int(10)));
}

#[test]
fn dependencies_initialize_before_importers() {
    let tree = Tree::new()
        .file(
            "app/main.tarn",
            "package main
import \"../counter\"
var start = counter.Next()
func init() {
    println(\"app init\", start)
}
func main() {
    println(\"main\", counter.Next())
}
",
        )
        .file(
            "counter/counter.tarn",
            "package counter
var n = seed()
func seed() int {
    println(\"counter global\")
    return 10
}
func init() {
    println(\"counter init\")
}
func Next() int {
    n++
    return n
}
",
        );
    assert_eq!(
        run(&tree.interpreter(), "app").unwrap(),
        "counter global\ncounter init\napp init 11\nmain 12\n"
    );
}

#[test]
fn initialization_cycle_is_rejected() {
    let tree = Tree::new().file(
        "p/p.tarn",
        "package p\nvar a = f()\nfunc f() int {\nreturn a + 1\n}\n",
    );
    let err = expect_err(tree.interpreter().import("./p"));
    assert!(matches!(err, LoadError::Cfg { .. }), "{err:?}");
    assert!(err.to_string().contains("initialization cycle"), "{err}");
}

#[test]
fn init_functions_cannot_be_referenced() {
    let tree = Tree::new().file(
        "app/main.tarn",
        "package main\nfunc init() {}\nfunc main() {\ninit()\n}\n",
    );
    let err = expect_err(tree.interpreter().eval_path("app"));
    assert!(matches!(err, LoadError::Cfg { .. }), "{err:?}");
    assert!(err.to_string().contains("undefined: init"), "{err}");
}

#[test]
fn runtime_errors_in_dependencies_stop_the_load() {
    let tree = Tree::new()
        .file(
            "app/main.tarn",
            "package main\nimport \"../bad\"\nfunc main() {\nprintln(\"never\")\n}\n",
        )
        .file(
            "bad/bad.tarn",
            "package bad\nvar zero = 0\nvar ratio = 1 / zero\n",
        );
    let interp = tree.interpreter();
    let err = expect_err(interp.eval_path("app"));
    match &err {
        LoadError::Execution {
            import_path,
            source,
        } => {
            assert_eq!(import_path, "./bad");
            assert_eq!(source.kind, ExecErrorKind::DivisionByZero);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(interp.output(), "");
}

#[test]
fn call_depth_is_limited() {
    let interp = Interpreter::builder()
        .options(Options {
            max_call_depth: 32,
            build: linux(),
            ..Options::default()
        })
        .file_system(Arc::new(MemoryFileSystem::new().with_file(
            "/work/app/main.tarn",
            "package main\nfunc down(n int) int {\nreturn down(n + 1)\n}\nfunc main() {\nprintln(down(0))\n}\n",
        )))
        .print_handler(buffer_handler())
        .source_root(SOURCE_ROOT)
        .build();
    let err = expect_err(interp.eval_path("app"));
    assert!(
        matches!(
            &err,
            LoadError::Execution { source, .. }
                if source.kind == ExecErrorKind::CallDepthExceeded { limit: 32 }
        ),
        "{err:?}"
    );
}
