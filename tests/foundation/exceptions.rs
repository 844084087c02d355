//! Integration tests for raised errors and tracebacks
//!
//! Tests the error class hierarchy and traceback chains.

use skein_foundation::{ErrorClass, ErrorValue, Raised, TraceEntry, Traceback, Value};

fn entry(unit: &str, frame: u64) -> TraceEntry {
    TraceEntry {
        unit: unit.into(),
        frame,
        index: 0,
        offset: 0,
    }
}

#[test]
fn builtin_hierarchy() {
    let recursion = ErrorClass::recursion_error();
    assert!(recursion.is_subclass_of(&ErrorClass::runtime_error()));
    assert!(recursion.is_subclass_of(&ErrorClass::base_error()));
    assert!(!recursion.is_subclass_of(&ErrorClass::value_error()));

    let names: Vec<_> = recursion.ancestors().map(ErrorClass::name).collect();
    assert_eq!(names, vec!["RecursionError", "RuntimeError", "Error", "BaseError"]);
}

#[test]
fn user_subclasses_match_their_bases() {
    let custom = ErrorClass::value_error().subclass("ConfigError");
    let err = ErrorValue::new(custom, "missing key");
    assert!(err.is_instance_of(&ErrorClass::value_error()));
    assert!(!err.is_instance_of(&ErrorClass::type_error()));
}

#[test]
fn recording_frames_builds_call_order() {
    let mut raised = Raised::of(ErrorClass::value_error(), "deep");
    raised.record_frame(entry("inner", 3));
    raised.record_frame(entry("middle", 2));
    raised.record_frame(entry("outer", 1));

    let tb = raised.traceback.as_ref().unwrap();
    let units: Vec<_> = tb.entries().map(|e| e.unit.to_string()).collect();
    assert_eq!(units, vec!["outer", "middle", "inner"]);
    assert_eq!(tb.innermost().frame, 3);
    assert_eq!(tb.len(), 3);
}

#[test]
fn chains_share_tails() {
    let tail = Traceback::new(entry("inner", 2));
    let a = Traceback::prepend(entry("a", 1), Some(tail.clone()));
    let b = Traceback::prepend(entry("b", 3), Some(tail));
    assert_eq!(a.head().next, b.head().next);
    assert_ne!(a, b);
}

#[test]
fn display_includes_traceback_and_cause() {
    let mut raised = Raised::of(ErrorClass::value_error(), "bad")
        .with_cause(Value::Error(ErrorValue::new(ErrorClass::type_error(), "root")));
    raised.record_frame(entry("main", 1));

    let text = raised.to_string();
    assert!(text.starts_with("Traceback (outermost first):"));
    assert!(text.contains("in main"));
    assert!(text.contains("ValueError: bad"));
    assert!(text.contains("caused by TypeError: root"));
}
