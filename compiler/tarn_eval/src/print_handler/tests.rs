use super::*;

#[test]
fn buffer_captures_println_with_newline() {
    let handler = buffer_handler();
    handler.println("hello");
    handler.print("a");
    handler.print("b");
    assert_eq!(handler.output(), "hello\nab");
}

#[test]
fn buffer_clear() {
    let handler = buffer_handler();
    handler.println("x");
    handler.clear();
    assert!(handler.output().is_empty());
}

#[test]
fn silent_and_stdout_capture_nothing() {
    let silent = silent_handler();
    silent.println("dropped");
    assert_eq!(silent.output(), "");
    assert_eq!(stdout_handler().output(), "");
}
