use super::*;
use crate::test_support::{compile_error, Harness};
use pretty_assertions::assert_eq;

fn error_in_main(body: &str) -> String {
    compile_error(&[&format!("package main\nfunc main() {{\n{body}\n}}\n")])
}

#[test]
fn file_unit_collects_functions_globals_and_inits() {
    let mut harness = Harness::new();
    let loaded = harness
        .load(
            "main",
            &["package main\nvar a = f()\nfunc init() {}\nfunc f() int { return b }\nvar b = 2\nfunc init() {}\nfunc main() {}\n"],
        )
        .unwrap_or_else(|e| panic!("{e}"));
    let unit = &loaded.units[0];
    let names: Vec<_> = unit.functions.iter().map(|(_, _, r)| r.name.as_str()).collect();
    assert_eq!(names, vec!["main.f", "main.main"]);
    assert_eq!(unit.init_nodes.len(), 2);
    assert!(unit.init_nodes.iter().all(|r| r.kind == RoutineKind::Init));
    assert_eq!(unit.globals.len(), 2);

    let f = harness.interner.intern("f");
    let b = harness.interner.intern("b");
    assert_eq!(unit.globals[0].refs, vec![f]);
    assert_eq!(unit.func_refs.get(&f), Some(&vec![b]));
    assert!(unit.function(f).is_some());
}

#[test]
fn wrapper_binds_every_import() {
    let mut harness = Harness::new();
    harness.load_and_register("lib/a", &["package a\nconst X = 1\n"]);
    harness.load_and_register("lib/b", &["package b\nconst Y = 2\n"]);
    let loaded = harness
        .load(
            "main",
            &["package main\nimport (\n\"lib/a\"\nbee \"lib/b\"\n)\nvar z = a.X + bee.Y\n"],
        )
        .unwrap_or_else(|e| panic!("{e}"));
    let wrapper = &loaded.units[0].wrapper;
    assert_eq!(wrapper.kind, RoutineKind::Wrapper);
    assert!(matches!(
        wrapper.body.as_slice(),
        [
            Stmt { kind: StmtKind::BindImport(0), .. },
            Stmt { kind: StmtKind::BindImport(1), .. }
        ]
    ));
    assert_eq!(wrapper.context.import_path(1), "lib/b");
}

#[test]
fn undefined_identifier() {
    let err = error_in_main("println(missing)");
    assert_eq!(err, "file0.tarn:3:9: undefined: missing");
}

#[test]
fn init_cannot_be_referenced() {
    let err = compile_error(&["package main\nfunc init() {}\nfunc main() { init() }\n"]);
    assert!(err.ends_with("undefined: init"), "{err}");
}

#[test]
fn expression_statement_must_be_a_call() {
    let err = error_in_main("x := 1\nx + 1");
    assert!(err.ends_with("x + 1 is not used"), "{err}");
}

#[test]
fn branch_outside_loop() {
    assert!(error_in_main("break").ends_with("break is not in a loop"));
    assert!(error_in_main("if true { continue }").ends_with("continue is not in a loop"));
}

#[test]
fn missing_return() {
    let err = compile_error(&["package main\nfunc f(n int) int {\nif n > 0 { return 1 }\n}\n"]);
    assert_eq!(err, "file0.tarn:4:1: missing return in main.f");
}

#[test]
fn terminating_statements_satisfy_return() {
    let mut harness = Harness::new();
    let result = harness.load(
        "main",
        &["package main\nfunc f(n int) int {\nif n > 0 { return 1 } else { panic(\"neg\") }\n}\nfunc g() int {\nfor {\n}\n}\n"],
    );
    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn loop_with_break_does_not_terminate() {
    let err = compile_error(&["package main\nfunc g() int {\nfor {\nbreak\n}\n}\n"]);
    assert!(err.ends_with("missing return in main.g"), "{err}");
}

#[test]
fn mismatched_operand_types() {
    let err = error_in_main("println(1 + \"a\")");
    assert!(
        err.ends_with("invalid operation: mismatched types untyped int and untyped string for +"),
        "{err}"
    );
}

#[test]
fn operator_not_defined_on_type() {
    let err = error_in_main("println(\"a\" - \"b\")");
    assert!(err.ends_with("operator - not defined on untyped string"), "{err}");
}

#[test]
fn argument_count_and_types() {
    let sources = "package main\nfunc add(a, b int) int { return a + b }\nfunc main() {\n";
    let err = compile_error(&[&format!("{sources}println(add(1))\n}}\n")]);
    assert!(
        err.ends_with("not enough arguments in call to add: have 1, want 2"),
        "{err}"
    );
    let err = compile_error(&[&format!("{sources}println(add(1, \"x\"))\n}}\n")]);
    assert!(
        err.ends_with("cannot use value of type untyped string as int value in argument to add"),
        "{err}"
    );
}

#[test]
fn void_call_used_as_value() {
    let err = compile_error(&["package main\nfunc f() {}\nvar x = f()\n"]);
    assert!(err.ends_with("f() (no value) used as value"), "{err}");
}

#[test]
fn assignment_targets() {
    let err = compile_error(&["package main\nconst c = 1\nfunc main() { c = 2 }\n"]);
    assert!(err.ends_with("cannot assign to c (constant)"), "{err}");
    let err = compile_error(&["package main\nfunc f() {}\nfunc main() { f = f }\n"]);
    assert!(err.ends_with("cannot assign to f (function)"), "{err}");
}

#[test]
fn constant_initializer_must_be_constant() {
    let err = compile_error(&["package main\nvar v = 1\nconst c = v + 1\n"]);
    assert!(err.ends_with("v is not constant"), "{err}");
    let mut harness = Harness::new();
    let ok = harness.load(
        "main",
        &["package main\ntype N int\nconst a = 2\nconst b = N(a * 3)\nconst s = len(\"abc\")\n"],
    );
    assert!(ok.is_ok(), "{:?}", ok.err());
}

#[test]
fn redeclared_local() {
    let err = error_in_main("x := 1\nx := 2\nprintln(x)");
    assert!(err.ends_with("x redeclared in this block"), "{err}");
}

#[test]
fn shadowing_in_nested_block_is_allowed() {
    let mut harness = Harness::new();
    let ok = harness.load(
        "main",
        &["package main\nfunc main() {\nx := 1\nif true {\nx := \"s\"\nprintln(x)\n}\nprintln(x)\n}\n"],
    );
    assert!(ok.is_ok(), "{:?}", ok.err());
}

#[test]
fn non_boolean_condition() {
    let err = error_in_main("if 1 { }");
    assert!(err.ends_with("non-boolean condition of type untyped int"), "{err}");
}

#[test]
fn import_members() {
    let mut harness = Harness::new();
    harness.load_and_register("lib/a", &["package a\nvar hidden = 1\nvar Shown = 2\n"]);
    let err = harness
        .load("main", &["package main\nimport \"lib/a\"\nvar x = a.hidden\n"])
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(err.ends_with("name hidden not exported by package a"), "{err}");

    let err = harness
        .load("main", &["package main\nimport \"lib/a\"\nvar x = a.Missing\n"])
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(err.ends_with("undefined: a.Missing"), "{err}");

    let err = harness
        .load("main", &["package main\nimport \"lib/a\"\nvar x = a\n"])
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(err.ends_with("use of package a without selector"), "{err}");
}

#[test]
fn conversion_requires_same_underlying_type() {
    let err = compile_error(&["package main\ntype N int\nvar x = N(\"s\")\n"]);
    assert!(
        err.ends_with("cannot use value of type untyped string as N value in conversion"),
        "{err}"
    );
}

#[test]
fn calling_a_non_function() {
    let err = compile_error(&["package main\nvar n = 1\nvar m = n()\n"]);
    assert!(err.ends_with("cannot call non-function n (value of type int)"), "{err}");
}
