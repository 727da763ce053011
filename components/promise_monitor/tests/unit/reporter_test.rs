//! Unit tests for the tracing reporter

use std::rc::Rc;

use promise_core::{make_core, CoreOptions, EventLoop, Flavor, Scheduler, Value};
use promise_monitor::{Aggregator, Formatter, Reporter, TracingReporter, UnhandledRejection};

fn setup_tracing() -> (EventLoop, Flavor, Rc<TracingReporter>) {
    let reporter = Rc::new(TracingReporter::new(Formatter::default()));
    let shared = reporter.clone();
    let aggregator = Aggregator::new(move |unhandled: &[UnhandledRejection]| shared.report(unhandled));
    let event_loop = EventLoop::with_virtual_clock();
    let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
    let flavor = make_core(CoreOptions::new(Rc::new(scheduler)).with_monitor(aggregator.publish()));
    (event_loop, flavor, reporter)
}

#[test]
fn outstanding_follows_the_unhandled_set() {
    let (event_loop, flavor, reporter) = setup_tracing();
    assert!(!reporter.has_outstanding());

    let lost = flavor.reject("lost");
    event_loop.run_until_done();
    assert!(reporter.has_outstanding());

    let _handled = lost.otherwise(|_| Ok(Value::Undefined));
    event_loop.run_until_done();
    assert!(!reporter.has_outstanding());
}

#[test]
fn empty_report_without_history_is_quiet() {
    let reporter = TracingReporter::default();
    reporter.report(&[]);
    assert!(!reporter.has_outstanding());
}

#[test]
fn format_all_keeps_report_order() {
    let reporter = TracingReporter::default();
    let aggregator = Aggregator::new(|_: &[UnhandledRejection]| {});
    let event_loop = EventLoop::with_virtual_clock();
    let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
    let flavor = make_core(CoreOptions::new(Rc::new(scheduler)).with_monitor(aggregator.publish()));

    let first = flavor.reject("one");
    let second = flavor.reject("two");
    event_loop.run_until_done();

    let entries: Vec<UnhandledRejection> = aggregator
        .unhandled()
        .into_iter()
        .map(|record| UnhandledRejection {
            record,
            first_report: false,
        })
        .collect();
    let formatted = reporter.format_all(&entries);
    assert_eq!(
        formatted.iter().map(|f| f.promise).collect::<Vec<_>>(),
        vec![first.id().get(), second.id().get()]
    );
    assert_eq!(formatted[1].reason.as_deref(), Some("two"));
}
