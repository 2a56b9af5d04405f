//! Bridge Integration Tests
//!
//! Drives the event loop end to end: submission, worker execution, callback
//! delivery and Baton disposal.

use baton::{
    codes, BatonState, BlueprintParser, CallbackFault, ConfigError, EventLoop, HostArg, Job,
    ParseOutcome, Parser, TransitionLog, WorkerPool,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

type Delivered = Rc<RefCell<Vec<(Option<Value>, Value)>>>;

fn pool(workers: usize) -> Arc<WorkerPool> {
    Arc::new(WorkerPool::with_workers(workers).expect("Failed to start pool"))
}

fn recorder() -> (Delivered, impl Fn() -> Delivered) {
    let delivered: Delivered = Rc::new(RefCell::new(Vec::new()));
    let handle = Rc::clone(&delivered);
    (delivered, move || Rc::clone(&handle))
}

// ============================================================================
// Delivery
// ============================================================================

#[test]
fn test_valid_input_delivers_result() {
    let mut el = EventLoop::builder().pool(pool(2)).build().unwrap();
    let (delivered, sink) = recorder();
    let sink = sink();

    el.parse_text(
        "# Notes API\n## Notes [/notes]\n### List [GET]\n",
        None,
        move |error, result| sink.borrow_mut().push((error, result)),
    )
    .unwrap();
    assert_eq!(el.run(), 1);

    let delivered = delivered.borrow();
    assert_eq!(delivered.len(), 1);
    let (error, result) = &delivered[0];
    assert!(error.is_none());
    assert_eq!(result["_version"], "2.0");
    assert_eq!(result["ast"]["name"], "Notes API");
    assert_eq!(
        result["ast"]["resourceGroups"][0]["resources"][0]["actions"][0]["method"],
        "GET"
    );
    assert_eq!(result["warnings"], json!([]));
    assert_eq!(el.stats().outstanding(), 0);
}

#[test]
fn test_sourcemap_option() {
    let mut el = EventLoop::builder().pool(pool(1)).build().unwrap();
    let (delivered, sink) = recorder();
    let sink = sink();

    el.parse_text(
        "# Notes API\n",
        Some(json!({"exportSourcemap": true})),
        move |error, result| sink.borrow_mut().push((error, result)),
    )
    .unwrap();
    el.run();

    let delivered = delivered.borrow();
    assert!(delivered[0].1.get("sourcemap").is_some());
}

#[test]
fn test_malformed_input_delivers_error_and_partial_result() {
    let mut el = EventLoop::builder().pool(pool(2)).build().unwrap();
    let (delivered, sink) = recorder();
    let sink = sink();

    el.parse_text(
        "# Notes\n## List [/notes]\n### Read [FETCH]\n",
        None,
        move |error, result| sink.borrow_mut().push((error, result)),
    )
    .unwrap();
    el.run();

    let delivered = delivered.borrow();
    assert_eq!(delivered.len(), 1);
    let (error, result) = &delivered[0];
    let error = error.as_ref().expect("error annotation expected");
    assert_eq!(error["line"], 3);
    assert_eq!(error["code"], codes::BUSINESS_ERROR);
    assert!(error["message"].as_str().unwrap().contains("FETCH"));
    assert_eq!(result["ast"]["name"], "Notes");
}

#[test]
fn test_required_name_missing() {
    let mut el = EventLoop::builder().pool(pool(1)).build().unwrap();
    let (delivered, sink) = recorder();
    let sink = sink();

    el.parse_text(
        "## Notes [/notes]\n",
        Some(json!({"requireBlueprintName": true})),
        move |error, result| sink.borrow_mut().push((error, result)),
    )
    .unwrap();
    el.run();

    let error = delivered.borrow()[0].0.clone().unwrap();
    assert_eq!(error["code"], codes::BUSINESS_ERROR);
}

#[test]
fn test_parser_panic_still_delivers() {
    let mut el = EventLoop::builder()
        .pool(pool(1))
        .parser(|_: &Job| -> ParseOutcome { panic!("parser exploded") })
        .build()
        .unwrap();
    let (delivered, sink) = recorder();
    let sink = sink();

    el.parse_text("# A\n", None, move |error, result| {
        sink.borrow_mut().push((error, result))
    })
    .unwrap();
    assert_eq!(el.run(), 1);

    let delivered = delivered.borrow();
    let error = delivered[0].0.as_ref().unwrap();
    assert_eq!(error["code"], codes::APPLICATION_ERROR);
    assert!(error["message"].as_str().unwrap().contains("parser exploded"));
    assert_eq!(el.stats().outstanding(), 0);
}

#[test]
fn test_dropped_loop_still_delivers() {
    let log = TransitionLog::new();
    let mut el = EventLoop::builder()
        .pool(pool(1))
        .parser(|job: &Job| {
            thread::sleep(Duration::from_millis(200));
            BlueprintParser.parse(job)
        })
        .observer(log.clone())
        .build()
        .unwrap();
    let (delivered, sink) = recorder();
    let sink = sink();
    let id = el
        .parse_text("# A\n", None, move |error, result| {
            sink.borrow_mut().push((error, result))
        })
        .unwrap();
    assert_eq!(el.pending(), 1);
    drop(el);

    let delivered = delivered.borrow();
    assert_eq!(delivered.len(), 1, "accepted request was not delivered");
    assert!(delivered[0].0.is_none());
    assert_eq!(delivered[0].1["ast"]["name"], "A");

    let states: Vec<BatonState> = log.for_baton(id).iter().map(|t| t.state).collect();
    assert_eq!(states, BatonState::ALL);
    assert_eq!(log.verify(thread::current().id()), Ok(1));
    let disposed = log
        .for_baton(id)
        .into_iter()
        .find(|t| t.state == BatonState::Disposed)
        .unwrap();
    assert_eq!(disposed.thread, thread::current().id());
}

#[test]
fn test_follow_up_parse_from_callback() {
    let mut el = EventLoop::builder().pool(pool(2)).build().unwrap();
    let (delivered, sink) = recorder();
    let submitter = el.submitter();
    let outer = sink();
    let inner = sink();

    el.parse_text("# Index\n", None, move |error, result| {
        outer.borrow_mut().push((error, result));
        submitter
            .parse_text(
                "# Detail\n",
                Some(json!({"exportSourcemap": true})),
                move |error, result| inner.borrow_mut().push((error, result)),
            )
            .unwrap();
    })
    .unwrap();

    assert_eq!(el.run(), 2);
    let delivered = delivered.borrow();
    assert_eq!(delivered[0].1["ast"]["name"], "Index");
    assert_eq!(delivered[1].1["ast"]["name"], "Detail");
    assert!(delivered[1].1.get("sourcemap").is_some());
    assert_eq!(el.stats().outstanding(), 0);
}

// ============================================================================
// Rejected Calls
// ============================================================================

#[test]
fn test_unknown_option_rejected_synchronously() {
    let mut el = EventLoop::builder().pool(pool(1)).build().unwrap();
    let called = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&called);

    let err = el
        .parse_text("# A\n", Some(json!({"badOption": true})), move |_, _| {
            *flag.borrow_mut() = true;
        })
        .unwrap_err();

    assert_eq!(err, ConfigError::UnknownOption("badOption".into()));
    assert_eq!(el.run(), 0);
    assert!(!*called.borrow());
    assert_eq!(el.stats().created, 0);
}

#[test]
fn test_malformed_calls_schedule_nothing() {
    let mut el = EventLoop::builder().pool(pool(1)).build().unwrap();

    let cases: Vec<(Vec<HostArg>, ConfigError)> = vec![
        (
            vec![HostArg::text("# A\n")],
            ConfigError::WrongArity { got: 1 },
        ),
        (
            vec![HostArg::value(json!(42)), HostArg::function(|_, _| {})],
            ConfigError::ExpectedString,
        ),
        (
            vec![HostArg::text("# A\n"), HostArg::value(json!({}))],
            ConfigError::ExpectedCallback,
        ),
        (
            vec![
                HostArg::text("# A\n"),
                HostArg::value(json!("options")),
                HostArg::function(|_, _| {}),
            ],
            ConfigError::ExpectedObject,
        ),
        (
            vec![
                HostArg::text("# A\n"),
                HostArg::value(json!({"exportSourcemap": "yes"})),
                HostArg::function(|_, _| {}),
            ],
            ConfigError::InvalidOptionValue("exportSourcemap".into()),
        ),
    ];

    for (args, expected) in cases {
        assert_eq!(el.parse(args).unwrap_err(), expected);
    }
    assert_eq!(el.pending(), 0);
    assert_eq!(el.stored_callbacks(), 0);
    assert_eq!(el.stats().created, 0);
    assert_eq!(el.pool().stats().scheduled(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_submissions_complete_exactly_once() {
    const COUNT: usize = 100;

    let log = TransitionLog::new();
    let mut el = EventLoop::builder()
        .pool(pool(4))
        .observer(log.clone())
        .build()
        .unwrap();
    let calls = Rc::new(RefCell::new(vec![0u32; COUNT]));

    for i in 0..COUNT {
        let calls = Rc::clone(&calls);
        el.parse_text(
            format!("# API {}\n## Items [/items/{}]\n### Read [GET]\n", i, i),
            None,
            move |error, result| {
                assert!(error.is_none());
                assert_eq!(result["ast"]["name"], format!("API {}", i));
                calls.borrow_mut()[i] += 1;
            },
        )
        .unwrap();
    }
    assert_eq!(el.pending(), COUNT);
    assert_eq!(el.run(), COUNT);

    assert!(calls.borrow().iter().all(|&n| n == 1));

    let stats = el.stats();
    assert_eq!(stats.created, COUNT as u64);
    assert_eq!(stats.dispatched, COUNT as u64);
    assert_eq!(stats.disposed, COUNT as u64);
    assert_eq!(el.stored_callbacks(), 0);
    assert_eq!(el.pool().stats().completed(), COUNT as u64);

    assert_eq!(log.verify(thread::current().id()), Ok(COUNT));
}

#[test]
fn test_loops_share_one_pool() {
    let shared = pool(2);
    let mut first = EventLoop::builder().pool(Arc::clone(&shared)).build().unwrap();
    let mut second = EventLoop::builder().pool(Arc::clone(&shared)).build().unwrap();
    let (delivered, sink) = recorder();

    let a = sink();
    first
        .parse_text("# First\n", None, move |e, r| a.borrow_mut().push((e, r)))
        .unwrap();
    let b = sink();
    second
        .parse_text("# Second\n", None, move |e, r| b.borrow_mut().push((e, r)))
        .unwrap();

    assert_eq!(second.run(), 1);
    assert_eq!(first.run(), 1);

    let names: Vec<Value> = delivered
        .borrow()
        .iter()
        .map(|(_, r)| r["ast"]["name"].clone())
        .collect();
    assert_eq!(names, vec![json!("Second"), json!("First")]);
}

// ============================================================================
// Callback Faults
// ============================================================================

#[test]
fn test_callback_panic_disposes_before_fault() {
    let log = TransitionLog::new();
    let observed = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&observed);
    let transitions = Arc::clone(&log);

    let mut el = EventLoop::builder()
        .pool(pool(1))
        .observer(log.clone())
        .fault_handler(move |fault: CallbackFault| {
            let disposed = transitions
                .for_baton(fault.baton())
                .iter()
                .any(|t| t.state == BatonState::Disposed);
            seen.borrow_mut().push((fault.message().to_string(), disposed));
        })
        .build()
        .unwrap();

    el.parse_text("# A\n", None, |_, _| panic!("callback failed"))
        .unwrap();
    el.parse_text("# B\n", None, |_, _| {}).unwrap();
    assert_eq!(el.run(), 2);

    assert_eq!(
        *observed.borrow(),
        vec![("callback failed".to_string(), true)]
    );
    let stats = el.stats();
    assert_eq!(stats.faults, 1);
    assert_eq!(stats.outstanding(), 0);
}

#[test]
fn test_default_policy_propagates_after_disposal() {
    let mut el = EventLoop::builder().pool(pool(1)).build().unwrap();
    el.parse_text("# A\n", None, |_, _| panic!("callback failed"))
        .unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| el.run()));
    let payload = result.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"callback failed"));

    let stats = el.stats();
    assert_eq!(stats.disposed, 1);
    assert_eq!(stats.outstanding(), 0);
    assert_eq!(el.pending(), 0);
    assert_eq!(el.stored_callbacks(), 0);
}
