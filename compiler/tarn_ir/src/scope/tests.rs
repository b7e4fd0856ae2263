use super::*;
use crate::StringInterner;

fn var(name: Name, slot: u32) -> Symbol {
    Symbol {
        name,
        kind: SymbolKind::Var,
        decl: DeclRef {
            file: 0,
            node: NodeId::new(slot),
        },
        span: Span::new(slot, slot + 1),
        slot: Some(Slot::new(slot)),
        arity: None,
        resolved: false,
    }
}

#[test]
fn declare_and_lookup() {
    let interner = StringInterner::new();
    let pkg = interner.intern("main");
    let x = interner.intern("x");

    let mut scope = PackageScope::new("./app", pkg);
    assert!(scope.declare(var(x, 3)).is_ok());
    assert!(scope.contains(x));
    assert_eq!(scope.get(x).and_then(|s| s.slot), Some(Slot::new(3)));
    assert_eq!(scope.import_path(), "./app");
    assert_eq!(scope.package(), pkg);
}

#[test]
fn redeclaration_returns_existing() {
    let interner = StringInterner::new();
    let x = interner.intern("x");

    let mut scope = PackageScope::new("p", Name::EMPTY);
    assert!(scope.declare(var(x, 1)).is_ok());
    let existing = scope.declare(var(x, 2));
    assert_eq!(existing.map_err(|s| s.slot), Err(Some(Slot::new(1))));
    assert_eq!(scope.len(), 1);
}

#[test]
fn iteration_follows_declaration_order() {
    let interner = StringInterner::new();
    let names: Vec<Name> = ["c", "a", "b"].iter().map(|s| interner.intern(s)).collect();

    let mut scope = PackageScope::new("p", Name::EMPTY);
    for (i, name) in names.iter().enumerate() {
        let slot = u32::try_from(i).unwrap_or(0);
        assert!(scope.declare(var(*name, slot)).is_ok());
    }
    let order: Vec<Name> = scope.iter().map(|s| s.name).collect();
    assert_eq!(order, names);
    assert_eq!(scope.slot_end(), 3);
}

#[test]
fn mark_resolved() {
    let interner = StringInterner::new();
    let x = interner.intern("x");
    let y = interner.intern("y");

    let mut scope = PackageScope::new("p", Name::EMPTY);
    assert!(scope.declare(var(x, 0)).is_ok());
    assert!(!scope.is_resolved(x));
    assert!(scope.mark_resolved(x));
    assert!(scope.is_resolved(x));
    assert!(!scope.mark_resolved(y));
}

#[test]
fn exported_identifiers() {
    assert!(is_exported("Value"));
    assert!(!is_exported("value"));
    assert!(!is_exported("_Value"));
    assert!(!is_exported(""));
}
