use super::*;
use crate::test_support::{compile_error, Harness};
use pretty_assertions::assert_eq;

fn named(name: &str, underlying: Basic) -> Ty {
    Ty::Named(Arc::new(NamedTy {
        package: Arc::from("main"),
        name: Arc::from(name),
        underlying,
    }))
}

#[test]
fn untyped_constants_assign_to_matching_underlying() {
    let celsius = named("Celsius", Basic::Int);
    assert!(Ty::Untyped(Basic::Int).assignable_to(&Ty::INT));
    assert!(Ty::Untyped(Basic::Int).assignable_to(&celsius));
    assert!(!Ty::Untyped(Basic::Str).assignable_to(&Ty::INT));
    assert!(!Ty::INT.assignable_to(&celsius));
    assert!(Ty::Unknown.assignable_to(&celsius));
}

#[test]
fn unify_prefers_the_typed_side() {
    let celsius = named("Celsius", Basic::Int);
    assert_eq!(Ty::Untyped(Basic::Int).unify(&celsius), Some(celsius.clone()));
    assert_eq!(celsius.unify(&Ty::Untyped(Basic::Int)), Some(celsius.clone()));
    assert_eq!(Ty::INT.unify(&celsius), None);
    assert_eq!(Ty::STRING.unify(&Ty::Unknown), Some(Ty::STRING));
}

#[test]
fn display() {
    let sig = Signature {
        params: vec![Ty::INT, Ty::STRING],
        result: Some(Ty::BOOL),
    };
    assert_eq!(Ty::Func(Arc::new(sig)).to_string(), "func(int, string) bool");
    assert_eq!(Ty::Untyped(Basic::Int).to_string(), "untyped int");
    assert_eq!(named("Celsius", Basic::Int).to_string(), "Celsius");
}

#[test]
fn predeclared_names() {
    assert!(is_predeclared("int"));
    assert!(is_predeclared("println"));
    assert!(!is_predeclared("main"));
}

#[test]
fn package_types_are_inferred_across_files() {
    let mut harness = Harness::new();
    let loaded = harness
        .load(
            "main",
            &[
                "package main\nvar total = base * 2\nconst label = \"n\"\n",
                "package main\ntype Count int\nvar base Count = 3\nfunc f(c Count) bool { return c > 0 }\n",
            ],
        )
        .unwrap_or_else(|e| panic!("{e}"));
    let types = &loaded.exports.types;
    let get = |name: &str| types.value_of(harness.interner.intern(name)).cloned();

    let count = types
        .type_of(harness.interner.intern("Count"))
        .cloned()
        .unwrap_or(Ty::Unknown);
    assert_eq!(count.to_string(), "Count");
    assert_eq!(count.underlying(), Some(Basic::Int));
    assert_eq!(get("total"), Some(count.clone()));
    assert_eq!(get("label"), Some(Ty::Untyped(Basic::Str)));
    assert_eq!(
        get("f"),
        Some(Ty::Func(Arc::new(Signature {
            params: vec![count],
            result: Some(Ty::BOOL),
        })))
    );
}

#[test]
fn var_without_type_defaults_untyped_value() {
    let mut harness = Harness::new();
    let loaded = harness
        .load("main", &["package main\nvar n = 1 + 2\nvar ok = n > 1\n"])
        .unwrap_or_else(|e| panic!("{e}"));
    let types = &loaded.exports.types;
    assert_eq!(types.value_of(harness.interner.intern("n")), Some(&Ty::INT));
    assert_eq!(types.value_of(harness.interner.intern("ok")), Some(&Ty::BOOL));
}

#[test]
fn recursive_type_is_rejected() {
    let err = compile_error(&["package main\ntype A B\ntype B A\n"]);
    assert!(err.contains("invalid recursive type"), "{err}");
}

#[test]
fn value_used_as_type() {
    let err = compile_error(&["package main\nvar x = 1\nvar y x\n"]);
    assert!(err.ends_with("x is not a type"), "{err}");
}

#[test]
fn unknown_type_is_undefined() {
    let err = compile_error(&["package main\nfunc f(a float) {}\n"]);
    assert_eq!(err, "file0.tarn:2:10: undefined: float");
}
