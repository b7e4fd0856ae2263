use super::*;

#[test]
fn display_matches_println_output() {
    assert_eq!(Value::Int(-3).to_string(), "-3");
    assert_eq!(Value::Bool(false).to_string(), "false");
    assert_eq!(Value::string("hi").to_string(), "hi");
    assert_eq!(Value::Void.to_string(), "()");
}

#[test]
fn equality_by_value() {
    assert_eq!(Value::string("a"), Value::string("a"));
    assert_ne!(Value::Int(1), Value::Bool(true));
    assert_ne!(Value::Int(1), Value::Int(2));
}

#[test]
fn accessors() {
    assert_eq!(Value::Int(7).as_int(), Some(7));
    assert_eq!(Value::Int(7).as_bool(), None);
    assert_eq!(Value::string("s").as_str(), Some("s"));
    assert_eq!(Value::Bool(true).type_name(), "bool");
}
