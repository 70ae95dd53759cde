//! Integration tests for diagnostics events and sinks.

use std::sync::Arc;

use vellum_common::{Category, ConsoleSink, DiagnosticEvent, DiagnosticSink, Diagnostics, MemorySink};

#[test]
fn test_event_serializes_category_and_payload() {
    let event = DiagnosticEvent::new(Category::Dimension, "percentage-fallback")
        .with("element", "div#hero")
        .with("axis", "width");

    let json = serde_json::to_value(&event).expect("event should serialize");
    assert_eq!(json["category"], "dimension");
    assert_eq!(json["kind"], "percentage-fallback");
    assert_eq!(json["payload"]["axis"], "width");
    assert_eq!(json["payload"]["element"], "div#hero");
}

#[test]
fn test_shared_memory_sink_sees_events_from_clones() {
    let sink = Arc::new(MemorySink::new());
    let diagnostics = Diagnostics::new(sink.clone());
    let clone = diagnostics.clone();

    diagnostics.emit(DiagnosticEvent::new(Category::Layout, "a"));
    clone.emit(DiagnosticEvent::new(Category::Layout, "b"));

    assert_eq!(sink.kinds(), vec!["a", "b"]);
}

#[test]
fn test_console_sink_accepts_events() {
    let event = DiagnosticEvent::new(Category::Validation, "structural-violation").with("path", "div/table");
    assert!(ConsoleSink::new().record(&event).is_ok());
}
