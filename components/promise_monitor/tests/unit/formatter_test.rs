//! Unit tests for stack stitching

use promise_monitor::{Formatter, FormatterConfig};

use super::setup;

#[test]
fn stack_stitches_creation_ancestors_and_rejection() {
    let (event_loop, flavor, aggregator, _reports) = setup();
    let (root, resolver) = flavor.defer();
    let leaf = root.and_then(Ok).and_then(Ok);
    resolver.reject("deep");
    event_loop.run_until_done();

    let record = aggregator.record(leaf.id()).unwrap();
    let formatted = Formatter::default().format(&record);
    let config = FormatterConfig::default();

    assert_eq!(formatted.promise, leaf.id().get());
    assert_eq!(formatted.reason.as_deref(), Some("deep"));
    assert_eq!(formatted.stack.len(), 6);
    assert_eq!(formatted.stack[0], config.unhandled_message);
    assert!(formatted.stack[1].starts_with("at then ("));
    assert!(formatted.stack[3].starts_with("at defer ("));
    assert_eq!(formatted.stack[4], config.reason_message);
    assert!(formatted.stack[5].starts_with("at reject ("));
    assert!(formatted.stack[1..4]
        .iter()
        .all(|frame| frame.contains("formatter_test.rs")));
}

#[test]
fn ancestors_are_capped() {
    let (event_loop, flavor, aggregator, _reports) = setup();
    let (root, resolver) = flavor.defer();
    let leaf = root.and_then(Ok).and_then(Ok).and_then(Ok);
    resolver.reject("deep");
    event_loop.run_until_done();

    let formatter = Formatter::new(FormatterConfig {
        max_ancestors: 1,
        ..FormatterConfig::default()
    });
    let formatted = formatter.format(&aggregator.record(leaf.id()).unwrap());
    assert_eq!(formatted.stack.len(), 5);
}

#[test]
fn omitted_sources_leave_only_headings() {
    let (event_loop, flavor, aggregator, _reports) = setup();
    let lost = flavor.reject("lost");
    event_loop.run_until_done();

    let formatter = Formatter::from_json(r#"{"omit_sources": ["formatter_test.rs"]}"#).unwrap();
    let formatted = formatter.format(&aggregator.record(lost.id()).unwrap());
    let config = FormatterConfig::default();
    assert_eq!(formatted.stack, vec![config.unhandled_message, config.reason_message]);
}

#[test]
fn formatted_rejection_serializes() {
    let (event_loop, flavor, aggregator, _reports) = setup();
    let lost = flavor.reject("lost");
    event_loop.run_until_done();

    let formatted = Formatter::default().format(&aggregator.record(lost.id()).unwrap());
    let json: serde_json::Value = serde_json::from_str(&formatted.to_json().unwrap()).unwrap();
    assert_eq!(json["promise"], lost.id().get());
    assert_eq!(json["reason"], "lost");
    assert!(json["stack"].is_array());
    assert!(json["created"].as_u64().unwrap() > 0);
}

#[test]
fn pending_record_formats_without_reason() {
    let (_event_loop, flavor, aggregator, _reports) = setup();
    let (pending, _resolver) = flavor.defer();

    let formatted = Formatter::default().format(&aggregator.record(pending.id()).unwrap());
    assert_eq!(formatted.reason, None);
    assert_eq!(formatted.stack.len(), 2);
}
