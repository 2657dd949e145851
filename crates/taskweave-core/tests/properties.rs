//! End-to-end behaviour of the combinators composed through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde_json::json;
use taskweave_core::flow::{Loop, ParallelFlow, SequentialFlow, predicate};
use taskweave_core::resilience::matchers::{network_errors, timeout_errors};
use taskweave_core::resilience::{
    CircuitBreaker, CircuitState, FixedBackoff, ParallelErrorCollector, Retry, TimeoutWrapper,
    TryCatch,
};
use taskweave_core::{Action, ActionFunc, BoxAction, WorkContext, WorkReport, execute};
use taskweave_types::error::WorkError;
use taskweave_types::status::WorkStatus;

/// Action that counts its runs and always succeeds.
fn counted(hits: &Arc<AtomicUsize>) -> BoxAction {
    let hits = Arc::clone(hits);
    BoxAction::new(ActionFunc::new("counted", move |_ctx| {
        hits.fetch_add(1, Ordering::SeqCst);
        std::future::ready(WorkReport::completed())
    }))
}

/// Action that counts its runs and always fails with `message`.
fn failing(hits: &Arc<AtomicUsize>, message: &'static str) -> BoxAction {
    let hits = Arc::clone(hits);
    BoxAction::new(ActionFunc::new("failing", move |_ctx| {
        hits.fetch_add(1, Ordering::SeqCst);
        std::future::ready(WorkReport::failure(WorkError::message(message)))
    }))
}

fn sleeping(name: &'static str, ms: u64) -> BoxAction {
    BoxAction::new(ActionFunc::new(name, move |_ctx| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        WorkReport::completed_with(json!(name))
    }))
}

#[tokio::test]
async fn test_counted_loop_runs_exactly_n_times() {
    for n in [0usize, 1, 2, 10, 50] {
        let hits = Arc::new(AtomicUsize::new(0));
        let report = Loop::count("loop", n)
            .body(counted(&hits))
            .run(&WorkContext::new())
            .await;

        assert_eq!(report.status, WorkStatus::Completed, "n = {n}");
        assert_eq!(hits.load(Ordering::SeqCst), n);
    }
}

#[tokio::test]
async fn test_sequential_halts_at_first_failure() {
    let before = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let after = Arc::new(AtomicUsize::new(0));

    let report = SequentialFlow::new("seq")
        .then(counted(&before))
        .then(failing(&failed, "stop here"))
        .then(counted(&after))
        .run(&WorkContext::new())
        .await;

    assert!(report.is_failure());
    assert_eq!(before.load(Ordering::SeqCst), 1);
    assert_eq!(failed.load(Ordering::SeqCst), 1);
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_runs_every_child_concurrently() {
    let failed = Arc::new(AtomicUsize::new(0));
    let flow = ParallelFlow::new("fan-out")
        .with(sleeping("a", 200))
        .with(failing(&failed, "sibling failed"))
        .with(sleeping("b", 200))
        .with(sleeping("c", 200));

    let started = Instant::now();
    let report = flow.run(&WorkContext::new()).await;
    let elapsed = started.elapsed();

    assert!(report.is_failure());
    assert_eq!(failed.load(Ordering::SeqCst), 1);
    assert_eq!(report.data, Some(json!("a\n\n---\n\nb\n\n---\n\nc")));
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(550), "took {elapsed:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_error_collector_runs_every_child_concurrently() {
    let failed = Arc::new(AtomicUsize::new(0));
    let collector = ParallelErrorCollector::new("health")
        .with(sleeping("a", 200))
        .with(failing(&failed, "db down"))
        .with(failing(&failed, "cache down"))
        .with(sleeping("b", 200));

    let started = Instant::now();
    let report = collector.run(&WorkContext::new()).await;

    assert!(started.elapsed() < Duration::from_millis(450));
    assert_eq!(failed.load(Ordering::SeqCst), 2);
    assert_eq!(
        report.errors,
        vec![WorkError::message("db down"), WorkError::message("cache down")]
    );
}

#[tokio::test]
async fn test_circuit_breaker_lifecycle() {
    let calls = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let action = {
        let calls = Arc::clone(&calls);
        let healthy = Arc::clone(&healthy);
        ActionFunc::new("upstream", move |_ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            let ok = healthy.load(Ordering::SeqCst);
            async move {
                if ok {
                    WorkReport::completed()
                } else {
                    WorkReport::failure(WorkError::message("upstream 503"))
                }
            }
        })
    };
    let breaker = CircuitBreaker::new("cb", action, 2, Duration::from_millis(60));
    let ctx = WorkContext::new();

    breaker.run(&ctx).await;
    breaker.run(&ctx).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    let rejected = breaker.run(&ctx).await;
    assert!(matches!(rejected.first_error(), Some(WorkError::CircuitOpen { .. })));
    assert!(rejected.errors[0].to_string().contains("is open"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_millis(90)).await;
    healthy.store(true, Ordering::SeqCst);

    let probe = breaker.run(&ctx).await;
    assert!(probe.is_completed());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().consecutive_failures, 0);
}

#[tokio::test]
async fn test_timeout_returns_near_deadline() {
    let wrapper = TimeoutWrapper::new("deadline", sleeping("slow", 2_000), Duration::from_millis(80));

    let started = Instant::now();
    let report = wrapper.run(&WorkContext::new()).await;
    let elapsed = started.elapsed();

    assert!(report.is_failure());
    assert!(report.errors[0].is_timeout());
    assert!(elapsed >= Duration::from_millis(80));
    assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
}

#[tokio::test]
async fn test_retry_fixed_backoff_spacing() {
    let hits = Arc::new(AtomicUsize::new(0));
    let retry = Retry::new("retry", failing(&hits, "flaky"))
        .max_attempts(4)
        .backoff(FixedBackoff::new(Duration::from_millis(40)));

    let started = Instant::now();
    let report = retry.run(&WorkContext::new()).await;
    let elapsed = started.elapsed();

    assert!(report.is_failure());
    assert_eq!(hits.load(Ordering::SeqCst), 4);
    assert!(elapsed >= Duration::from_millis(120));
    assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
}

#[tokio::test]
async fn test_retry_condition_false_runs_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let report = Retry::new("retry", failing(&hits, "fatal"))
        .max_attempts(5)
        .retry_if(|_| false)
        .run(&WorkContext::new())
        .await;

    assert!(report.is_failure());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_try_catch_dispatch_and_finally() {
    let network = Arc::new(AtomicUsize::new(0));
    let fallback = Arc::new(AtomicUsize::new(0));
    let finally = Arc::new(AtomicUsize::new(0));
    let tried = Arc::new(AtomicUsize::new(0));

    let report = TryCatch::new("guarded")
        .try_action(failing(&tried, "connection reset by peer"))
        .catch(timeout_errors(), counted(&Arc::new(AtomicUsize::new(0))))
        .catch(network_errors(), counted(&network))
        .catch_any(counted(&fallback))
        .finally(counted(&finally))
        .run(&WorkContext::new())
        .await;

    assert!(report.is_completed());
    assert_eq!(network.load(Ordering::SeqCst), 1);
    assert_eq!(fallback.load(Ordering::SeqCst), 0);
    assert_eq!(finally.load(Ordering::SeqCst), 1);

    let unmatched = TryCatch::new("guarded")
        .try_action(failing(&tried, "disk full"))
        .catch(network_errors(), counted(&network))
        .finally(counted(&finally))
        .run(&WorkContext::new())
        .await;

    assert_eq!(unmatched.status, WorkStatus::Failure);
    assert_eq!(unmatched.errors, vec![WorkError::message("disk full")]);
    assert_eq!(network.load(Ordering::SeqCst), 1);
    assert_eq!(finally.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_nested_tree_through_execute() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let flaky = {
        let attempts = Arc::clone(&attempts);
        ActionFunc::new("flaky", move |_ctx| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(WorkError::message("transient"))
                } else {
                    Ok(json!("recovered"))
                }
            }
        })
    };

    let tree = SequentialFlow::new("root")
        .then(
            Retry::new("retry", flaky)
                .max_attempts(2)
                .backoff(FixedBackoff::new(Duration::from_millis(1))),
        )
        .then(Loop::count("repeat", 3).body(ActionFunc::new("noop", |_ctx| async {
            WorkReport::completed()
        })))
        .then(TimeoutWrapper::new("bounded", sleeping("quick", 5), Duration::from_secs(1)));

    let report = execute(tree, &WorkContext::new()).await;

    assert!(report.is_completed(), "{report:?}");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(report.data, Some(json!("quick")));
    assert_eq!(report.metadata["retry_attempts"], json!(2));
    assert_eq!(report.metadata["loop_iterations"], json!(3));
}

#[tokio::test]
async fn test_predicate_panic_is_contained() {
    let report = Loop::while_true(
        "loop",
        predicate(|ctx| {
            let n: u64 = ctx
                .get("loop_iteration")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            if n >= 2 {
                panic!("predicate blew up");
            }
            Ok(true)
        }),
    )
    .body(ActionFunc::new("noop", |_ctx| async { WorkReport::completed() }))
    .run(&WorkContext::new())
    .await;

    assert!(report.is_failure());
}
