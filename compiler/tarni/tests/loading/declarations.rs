//! Package-level declarations spread over files and packages.

use pretty_assertions::assert_eq;
use tarni::{ImportRequest, LoadError, Value, ENTRY_CONTEXT};

use crate::common::{expect_err, run, Tree};

const USES_LATER: &str = "package p\nvar Total = Base + Step\nfunc Twice() int {\nreturn Total * 2\n}\n";
const DECLARES: &str = "package p\nconst Step = 2\nvar Base = 40\n";

#[test]
fn forward_references_resolve_in_either_file_order() {
    for files in [
        [("p/a.tarn", USES_LATER), ("p/b.tarn", DECLARES)],
        [("p/b.tarn", DECLARES), ("p/a.tarn", USES_LATER)],
    ] {
        let tree = files
            .iter()
            .fold(Tree::new(), |tree, (path, src)| tree.file(path, src));
        let interp = tree.interpreter();
        assert_eq!(interp.import("./p").unwrap(), "p");
        assert_eq!(interp.lookup_global("./p", "Total"), Some(Value::Int(42)));
    }
}

const CALLS_LATER: &str = "package p\nvar R = f()\nfunc f() int {\nreturn g() * 2\n}\n";
const CALLED: &str = "package p\nfunc g() int {\nreturn 21\n}\n";

#[test]
fn functions_call_functions_of_later_files() {
    for files in [
        [("p/a.tarn", CALLS_LATER), ("p/b.tarn", CALLED)],
        [("p/b.tarn", CALLED), ("p/a.tarn", CALLS_LATER)],
    ] {
        let tree = files
            .iter()
            .fold(Tree::new(), |tree, (path, src)| tree.file(path, src));
        let interp = tree.interpreter();
        assert_eq!(interp.import("./p").unwrap(), "p");
        assert_eq!(interp.lookup_global("./p", "R"), Some(Value::Int(42)));
    }
}

#[test]
fn type_declarations_chain_forward() {
    let tree = Tree::new().file(
        "app/main.tarn",
        "package main
var limit Meters = 7
type Meters Length
type Length Unit
type Unit int
func main() {
    println(limit + 1)
}
",
    );
    assert_eq!(run(&tree.interpreter(), "app").unwrap(), "8\n");
}

#[test]
fn package_name_conflict() {
    let tree = Tree::new()
        .file("pkg/a.tarn", "package alpha\n")
        .file("pkg/b.tarn", "package beta\n");
    let err = expect_err(tree.interpreter().import("./pkg"));
    assert_eq!(err.to_string(), "found packages alpha and beta in /work/pkg");
}

#[test]
fn test_builds_merge_files_of_another_package() {
    let tree = Tree::new()
        .file("pkg/a.tarn", "package alpha\nvar V = 1\n")
        .file("pkg/a_test.tarn", "package alpha_test\nvar Other = 2\n")
        .file("pkg/b_test.tarn", "package alpha\nvar W = V + 1\n");
    let interp = tree.interpreter();
    let request = ImportRequest::new("", "./pkg").with_tests();
    assert_eq!(interp.import_src(&request).unwrap(), "alpha");
    assert_eq!(interp.lookup_global("./pkg", "W"), Some(Value::Int(2)));
    assert_eq!(interp.lookup_global("./pkg", "Other"), Some(Value::Int(2)));
}

#[test]
fn test_files_are_ignored_by_regular_builds() {
    let tree = Tree::new()
        .file("pkg/a.tarn", "package alpha\nvar V = 1\n")
        .file("pkg/a_test.tarn", "package alpha_test\nvar = broken\n");
    let interp = tree.interpreter();
    assert_eq!(interp.import("./pkg").unwrap(), "alpha");
    assert_eq!(tree.fs().reads("/work/pkg/a_test.tarn"), 0);
}

#[test]
fn redeclaration_across_files() {
    let tree = Tree::new()
        .file("p/a.tarn", "package p\nvar Count = 1\n")
        .file("p/b.tarn", "package p\n\nfunc Count() {}\n");
    let err = expect_err(tree.interpreter().import("./p"));
    assert_eq!(
        err.to_string(),
        "./p: Count redeclared at /work/p/b.tarn:3:1\n\tprevious declaration at /work/p/a.tarn:2:5"
    );
}

#[test]
fn unresolved_declaration_names_symbol_and_position() {
    let tree = Tree::new().file("p/a.tarn", "package p\nvar X = Missing + 1\n");
    let err = expect_err(tree.interpreter().import("./p"));
    match &err {
        LoadError::UnresolvedDeclaration { name, missing, .. } => {
            assert_eq!(name, "X");
            assert_eq!(missing, "Missing");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "./p: /work/p/a.tarn:2:9: cannot resolve X: undefined: Missing"
    );
}

#[test]
fn selectors_reach_exported_members_of_imports() {
    let tree = Tree::new()
        .file(
            "app/main.tarn",
            "package main
import units \"../temp\"
var reading units.Celsius = units.Boiling
func main() {
    println(units.Describe(reading), units.Readings)
}
",
        )
        .file(
            "temp/temp.tarn",
            "package temp
type Celsius int
const Boiling Celsius = 100
var Readings = 0
func Describe(c Celsius) string {
    Readings++
    if c >= Boiling {
        return \"boiling\"
    }
    return \"fine\"
}
",
        );
    assert_eq!(run(&tree.interpreter(), "app").unwrap(), "boiling 1\n");
}

#[test]
fn unexported_members_are_rejected() {
    let tree = Tree::new()
        .file(
            "app/main.tarn",
            "package main\nimport \"../lib\"\nfunc main() {\nprintln(lib.secret())\n}\n",
        )
        .file("lib/lib.tarn", "package lib\nfunc secret() int {\nreturn 1\n}\n");
    let err = expect_err(tree.interpreter().eval_path("app"));
    assert!(
        matches!(&err, LoadError::Cfg { import_path, .. } if import_path == "./app"),
        "{err:?}"
    );
    assert!(
        err.to_string().contains("name secret not exported by package lib"),
        "{err}"
    );
}

#[test]
fn entry_context_resolves_like_eval_path() {
    let tree = Tree::new().file(
        "tool/main.tarn",
        "package main\nfunc main() {\nprintln(\"ran\")\n}\n",
    );
    let interp = tree.interpreter();
    let request = ImportRequest::new(ENTRY_CONTEXT, "./tool");
    assert_eq!(interp.import_src(&request).unwrap(), "main");
    assert_eq!(interp.output(), "ran\n");
}
