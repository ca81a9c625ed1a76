//! Retry loop behaviour against a scripted network.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use nexec_core::engine::{CancelToken, ExecuteError};
use nexec_core::node::NodeId;
use nexec_core::retry::{Backoff, FailureKind, RetryNodePolicy};
use nexec_core::sim::ScriptedTransport;
use nexec_core::transport::{RawOutcome, Status, TransportError};
use tokio::time::Instant;

use common::{executor, request, settings, NODES};

#[tokio::test(start_paused = true)]
async fn server_errors_fail_over_to_distinct_nodes() {
    let transport = Arc::new(ScriptedTransport::with_outcomes([
        RawOutcome::from(TransportError::ConnectionRefused("127.0.0.1:50211".into())),
        RawOutcome::busy("platform not active"),
        RawOutcome::ok("receipt"),
    ]));
    let exec = executor(&transport, &NODES, settings(5));

    let done = exec.execute(&request("transfer")).await.unwrap();
    assert_eq!(done.attempts, 3);
    assert_eq!(&done.payload[..], b"receipt");

    let nodes = transport.nodes_called();
    assert_eq!(nodes.len(), 3);
    let distinct: HashSet<&NodeId> = nodes.iter().collect();
    assert_eq!(distinct.len(), 3, "each retry must go to a node not yet tried: {nodes:?}");
    assert_eq!(done.node, nodes[2]);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_reports_last_failure() {
    let transport = Arc::new(
        ScriptedTransport::new().with_fallback(TransportError::Timeout.into()),
    );
    let exec = executor(&transport, &NODES, settings(3));

    let err = exec.execute(&request("transfer")).await.unwrap_err();
    match err {
        ExecuteError::MaxAttemptsExceeded { attempts, last } => {
            assert_eq!(attempts, 3);
            let last = last.expect("last failure recorded");
            assert_eq!(last.attempt, 3);
            assert_eq!(last.kind, FailureKind::Transport(TransportError::Timeout));
        }
        other => panic!("expected MaxAttemptsExceeded, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_nodes_are_skipped_until_every_node_failed() {
    let transport = Arc::new(ScriptedTransport::new().with_fallback(RawOutcome::busy("busy")));
    let exec = executor(&transport, &NODES, settings(5));

    let err = exec.execute(&request("transfer")).await.unwrap_err();
    assert!(
        matches!(err, ExecuteError::MaxAttemptsExceeded { attempts: 5, .. }),
        "{err:?}"
    );

    let nodes = transport.nodes_called();
    assert_eq!(nodes.len(), 5);
    let first_round: HashSet<&NodeId> = nodes[..3].iter().collect();
    assert_eq!(first_round.len(), 3, "{nodes:?}");
    // After the reset the node closest to readmission goes first, then the next.
    assert_eq!(nodes[3], nodes[0], "{nodes:?}");
    assert_eq!(nodes[4], nodes[1], "{nodes:?}");
}

#[tokio::test(start_paused = true)]
async fn exhaustion_wins_over_deadline_passed_during_last_send() {
    let transport = Arc::new(ScriptedTransport::with_outcomes([
        RawOutcome::busy("b"),
        RawOutcome::busy("b"),
    ]));
    transport.push_delayed(Duration::from_secs(5), RawOutcome::busy("b"));
    let mut s = settings(3);
    s.request_timeout = Some(Duration::from_secs(2));
    let exec = executor(&transport, &NODES, s);

    let err = exec.execute(&request("transfer")).await.unwrap_err();
    match err {
        ExecuteError::MaxAttemptsExceeded { attempts, last } => {
            assert_eq!(attempts, 3);
            assert_eq!(last.map(|f| f.attempt), Some(3));
        }
        other => panic!("expected MaxAttemptsExceeded, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_wins_over_cancel_during_last_send() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_delayed(Duration::from_secs(5), RawOutcome::busy("b"));
    let exec = executor(&transport, &NODES, settings(1));

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = exec
        .execute_cancellable(&request("transfer"), &cancel)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ExecuteError::MaxAttemptsExceeded { attempts: 1, .. }),
        "{err:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn request_error_stops_immediately_without_backoff() {
    let transport = Arc::new(ScriptedTransport::with_outcomes([RawOutcome::invalid(
        "bad signature",
    )]));
    let exec = executor(&transport, &NODES, settings(10));

    let start = Instant::now();
    let err = exec.execute(&request("transfer")).await.unwrap_err();
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(transport.call_count(), 1);
    match err {
        ExecuteError::Request(f) => {
            assert_eq!(f.attempt, 1);
            assert_eq!(f.kind, FailureKind::Status(Status::Invalid("bad signature".into())));
        }
        other => panic!("expected Request, got {other:?}"),
    }
}

#[tokio::test]
async fn success_ends_the_execution() {
    let transport = Arc::new(ScriptedTransport::new());
    let exec = executor(&transport, &NODES, settings(10));

    let done = exec.execute(&request("query")).await.unwrap();
    assert_eq!(done.attempts, 1);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_between_attempts() {
    let transport = Arc::new(ScriptedTransport::with_outcomes([
        RawOutcome::pending(),
        RawOutcome::pending(),
        RawOutcome::ok("receipt"),
    ]));
    let exec = executor(&transport, &NODES, settings(10));

    let start = Instant::now();
    let done = exec.execute(&request("transfer")).await.unwrap();
    let elapsed = start.elapsed();
    assert_eq!(done.attempts, 3);
    // 250ms after attempt 1, 500ms after attempt 2.
    assert!(elapsed >= Duration::from_millis(750), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(800), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_backoff() {
    let transport = Arc::new(ScriptedTransport::new().with_fallback(RawOutcome::busy("busy")));
    let mut s = settings(10);
    s.retry.backoff = Backoff::new(Duration::from_secs(3600), Duration::from_secs(3600));
    let exec = executor(&transport, &NODES, s);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = exec
        .execute_cancellable(&request("transfer"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, ExecuteError::Cancelled { attempts: 1 });
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn cancelled_before_start_sends_nothing() {
    let transport = Arc::new(ScriptedTransport::new());
    let exec = executor(&transport, &NODES, settings(10));
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = exec
        .execute_cancellable(&request("transfer"), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn single_node_is_retried_after_exclusion_reset() {
    let transport = Arc::new(ScriptedTransport::with_outcomes([
        RawOutcome::busy("busy"),
        RawOutcome::ok("receipt"),
    ]));
    let exec = executor(&transport, &["0.0.3"], settings(3));

    let done = exec.execute(&request("transfer")).await.unwrap();
    assert_eq!(done.attempts, 2);
    assert_eq!(transport.nodes_called(), vec![NodeId::from("0.0.3"); 2]);
}

#[tokio::test(start_paused = true)]
async fn pending_stays_on_node_by_default() {
    let transport = Arc::new(ScriptedTransport::with_outcomes([
        RawOutcome::pending(),
        RawOutcome::pending(),
        RawOutcome::ok("receipt"),
    ]));
    let exec = executor(&transport, &NODES, settings(10));

    exec.execute(&request("transfer")).await.unwrap();
    let nodes = transport.nodes_called();
    assert!(nodes.iter().all(|n| n == &nodes[0]), "{nodes:?}");
}

#[tokio::test(start_paused = true)]
async fn pending_rotates_when_configured() {
    let transport = Arc::new(ScriptedTransport::with_outcomes([
        RawOutcome::pending(),
        RawOutcome::pending(),
        RawOutcome::ok("receipt"),
    ]));
    let mut s = settings(10);
    s.retry.node_policy = RetryNodePolicy::Rotate;
    let exec = executor(&transport, &NODES, s);

    exec.execute(&request("transfer")).await.unwrap();
    let distinct: HashSet<NodeId> = transport.nodes_called().into_iter().collect();
    assert_eq!(distinct.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn slow_attempt_times_out_and_fails_over() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_delayed(Duration::from_secs(3600), RawOutcome::ok("too late"));
    transport.push(RawOutcome::ok("receipt"));
    let mut s = settings(5);
    s.attempt_timeout = Some(Duration::from_millis(100));
    let exec = executor(&transport, &NODES, s);

    let start = Instant::now();
    let done = exec.execute(&request("transfer")).await.unwrap();
    assert_eq!(done.attempts, 2);
    assert_eq!(&done.payload[..], b"receipt");
    assert_ne!(done.node, transport.nodes_called()[0]);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn request_deadline_ends_execution() {
    let transport = Arc::new(ScriptedTransport::new().with_fallback(RawOutcome::busy("busy")));
    let mut s = settings(10);
    s.retry.backoff = Backoff::new(Duration::from_millis(400), Duration::from_secs(8));
    s.request_timeout = Some(Duration::from_secs(1));
    let exec = executor(&transport, &NODES, s);

    // Attempts at t=0 and t=0.4s; the next check at t=1.2s is past the deadline.
    let err = exec.execute(&request("transfer")).await.unwrap_err();
    match err {
        ExecuteError::Timeout { attempts, last } => {
            assert_eq!(attempts, 2);
            assert_eq!(last.map(|f| f.attempt), Some(2));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_directory_reports_no_available_node() {
    let transport = Arc::new(ScriptedTransport::new());
    let exec = executor(&transport, &[], settings(3));

    let err = exec.execute(&request("transfer")).await.unwrap_err();
    assert!(matches!(err, ExecuteError::NoAvailableNode(_)), "{err:?}");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn server_error_backs_the_node_off() {
    let transport = Arc::new(ScriptedTransport::with_outcomes([RawOutcome::busy("busy")]));
    let exec = executor(&transport, &NODES, settings(3));

    exec.execute(&request("transfer")).await.unwrap();
    let failed = transport.nodes_called()[0].clone();
    let node = exec.directory().get(&failed).unwrap();
    assert_eq!(node.health().failures(), 1);
    assert!(!node.health().is_healthy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_executions_are_independent() {
    let transport = Arc::new(ScriptedTransport::new());
    let exec = Arc::new(executor(&transport, &NODES, settings(3)));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let exec = Arc::clone(&exec);
            tokio::spawn(async move { exec.execute(&request("query")).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().attempts, 1);
    }
    assert_eq!(transport.call_count(), 16);
}
