//! Integration tests for completion polling: attempt bounds, sleeps,
//! failure handling, and cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use aigc_client::transport::TransportError;
use aigc_client::{GenerationEvent, PollError, Poller};
use aigc_core::polling::PollBudget;
use aigc_core::protocol::TaskHandle;
use assert_matches::assert_matches;
use common::{complete, field, progress, RecordingClock, ScriptedTransport};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const QUERY_URL: &str = "http://service.test/aigc/query";
const INTERVAL: Duration = Duration::from_secs(2);

fn handle() -> TaskHandle {
    TaskHandle {
        task_id: "T1".into(),
        token: "tok".into(),
        timestamp: "100".into(),
        original_prompt: "a cat".into(),
    }
}

fn budget(max_attempts: u32) -> PollBudget {
    PollBudget {
        max_attempts,
        interval: INTERVAL,
    }
}

fn poller(transport: &Arc<ScriptedTransport>, clock: &Arc<RecordingClock>) -> Poller {
    Poller::new(transport.clone(), clock.clone(), QUERY_URL.to_string())
}

// ---------------------------------------------------------------------------
// Test: completion
// ---------------------------------------------------------------------------

/// Two in-progress replies then completion: three requests, two sleeps,
/// and the image URLs in service order.
#[tokio::test]
async fn completes_after_progress_updates() {
    let transport = ScriptedTransport::new()
        .poll_json(&progress(30))
        .poll_json(&progress(70))
        .poll_json(&complete(&["u1", "u2"]))
        .into_arc();
    let clock = Arc::new(RecordingClock::new());

    let status = poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(30), &CancellationToken::new())
        .await
        .expect("task should complete");

    assert!(status.is_complete);
    assert_eq!(status.image_urls().collect::<Vec<_>>(), vec!["u1", "u2"]);
    assert_eq!(transport.poll_count(), 3);
    assert_eq!(clock.sleep_count(), 2);
    assert_eq!(clock.total_slept(), INTERVAL * 2);
}

/// Completion on the first attempt returns without sleeping.
#[tokio::test]
async fn immediate_completion_never_sleeps() {
    let transport = ScriptedTransport::new()
        .poll_json(&complete(&["u1"]))
        .into_arc();
    let clock = Arc::new(RecordingClock::new());

    poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(5), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(transport.poll_count(), 1);
    assert_eq!(clock.sleep_count(), 0);
}

/// `isGenerate` alone, or progress 100 alone, is not completion.
#[tokio::test]
async fn completion_requires_both_signals() {
    let transport = ScriptedTransport::new()
        .poll_json(r#"{"isGenerate":true,"progress":90,"picArr":[{"src":"early"}]}"#)
        .poll_json(r#"{"isGenerate":false,"progress":100}"#)
        .poll_json(&complete(&["u1"]))
        .into_arc();
    let clock = Arc::new(RecordingClock::new());

    let status = poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(5), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(status.image_urls().collect::<Vec<_>>(), vec!["u1"]);
    assert_eq!(transport.poll_count(), 3);
}

/// A `null` generation flag is an in-progress reply, not a decode failure.
#[tokio::test]
async fn null_generation_flag_keeps_polling() {
    let transport = ScriptedTransport::new()
        .poll_json(r#"{"isGenerate":null,"progress":40}"#)
        .poll_json(&complete(&["u1"]))
        .into_arc();
    let clock = Arc::new(RecordingClock::new());

    let status = poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(5), &CancellationToken::new())
        .await
        .expect("null flag should not end polling");

    assert!(status.is_complete);
    assert_eq!(transport.poll_count(), 2);
    assert_eq!(clock.sleep_count(), 1);
}

/// Every poll echoes the handle's values and the fixed parameters.
#[tokio::test]
async fn poll_query_echoes_handle() {
    let transport = ScriptedTransport::new()
        .poll_json(&progress(10))
        .poll_json(&complete(&["u1"]))
        .into_arc();
    let clock = Arc::new(RecordingClock::new());

    poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(5), &CancellationToken::new())
        .await
        .unwrap();

    let calls = transport.poll_calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    for call in calls.iter() {
        assert_eq!(call.0, QUERY_URL);
        assert_eq!(field(call, "taskid"), Some("T1"));
        assert_eq!(field(call, "token"), Some("tok"));
        assert_eq!(field(call, "timestamp"), Some("100"));
        assert_eq!(field(call, "query"), Some("a cat"));
        assert_eq!(field(call, "source"), Some("wen_b_page"));
        assert_eq!(field(call, "productSource"), Some("image"));
        assert_eq!(field(call, "modelParameter[id]"), Some("1"));
        assert_eq!(field(call, "modelParameter[quality]"), Some("1"));
    }
}

// ---------------------------------------------------------------------------
// Test: timeout
// ---------------------------------------------------------------------------

/// A task that never completes stops after exactly `max_attempts`
/// requests and `max_attempts - 1` sleeps.
#[tokio::test]
async fn times_out_after_max_attempts() {
    let transport = ScriptedTransport::new()
        .poll_json(&progress(10))
        .poll_json(&progress(20))
        .poll_json(&progress(30))
        .poll_json(&complete(&["never-reached"]))
        .into_arc();
    let clock = Arc::new(RecordingClock::new());

    let err = poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(3), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(err, PollError::Timeout { attempts: 3 });
    assert_eq!(transport.poll_count(), 3);
    assert_eq!(clock.sleep_count(), 2);
}

/// A zero budget times out without issuing a request.
#[tokio::test]
async fn zero_attempts_times_out_immediately() {
    let transport = ScriptedTransport::new()
        .poll_json(&complete(&["u1"]))
        .into_arc();
    let clock = Arc::new(RecordingClock::new());

    let err = poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(0), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(err, PollError::Timeout { attempts: 0 });
    assert_eq!(transport.poll_count(), 0);
    assert_eq!(clock.sleep_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: transport failures
// ---------------------------------------------------------------------------

/// A failed poll request ends polling at once; there is no retry.
#[tokio::test]
async fn transport_failure_stops_polling() {
    let transport = ScriptedTransport::new()
        .poll_json(&progress(40))
        .poll_error(502)
        .poll_json(&complete(&["u1"]))
        .into_arc();
    let clock = Arc::new(RecordingClock::new());

    let err = poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(10), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        PollError::Transport(TransportError::Status { status: 502, .. })
    );
    assert_eq!(transport.poll_count(), 2);
    assert_eq!(clock.sleep_count(), 1);
}

/// A non-JSON poll body is a transport failure, not a timeout.
#[tokio::test]
async fn malformed_poll_body_is_transport_failure() {
    let transport = ScriptedTransport::new().poll_json("not json").into_arc();
    let clock = Arc::new(RecordingClock::new());

    let err = poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(10), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(err, PollError::Transport(TransportError::MalformedBody(_)));
    assert_eq!(transport.poll_count(), 1);
}

// ---------------------------------------------------------------------------
// Test: cancellation
// ---------------------------------------------------------------------------

/// A token cancelled up front prevents any request.
#[tokio::test]
async fn cancelled_before_start_makes_no_request() {
    let transport = ScriptedTransport::new()
        .poll_json(&complete(&["u1"]))
        .into_arc();
    let clock = Arc::new(RecordingClock::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(10), &cancel)
        .await
        .unwrap_err();

    assert_matches!(err, PollError::Cancelled);
    assert_eq!(transport.poll_count(), 0);
}

/// Cancelling during the wait between attempts stops before the next
/// request.
#[tokio::test]
async fn cancel_during_sleep_stops_polling() {
    let transport = ScriptedTransport::new()
        .poll_json(&progress(10))
        .poll_json(&progress(20))
        .poll_json(&complete(&["u1"]))
        .into_arc();
    let cancel = CancellationToken::new();
    let clock = Arc::new(RecordingClock::cancelling_on_sleep(2, cancel.clone()));

    let err = poller(&transport, &clock)
        .wait_for_completion(&handle(), &budget(10), &cancel)
        .await
        .unwrap_err();

    assert_matches!(err, PollError::Cancelled);
    assert_eq!(transport.poll_count(), 2);
    assert_eq!(clock.sleep_count(), 2);
}

// ---------------------------------------------------------------------------
// Test: events
// ---------------------------------------------------------------------------

/// Each incomplete poll publishes a progress event; completion publishes
/// a completed event.
#[tokio::test]
async fn publishes_progress_and_completion_events() {
    let transport = ScriptedTransport::new()
        .poll_json(&progress(25))
        .poll_json(&progress(150))
        .poll_json(&complete(&["u1", "u2"]))
        .into_arc();
    let clock = Arc::new(RecordingClock::new());
    let (tx, mut rx) = broadcast::channel(16);

    poller(&transport, &clock)
        .with_events(tx)
        .wait_for_completion(&handle(), &budget(5), &CancellationToken::new())
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            GenerationEvent::Progress {
                task_id: "T1".into(),
                attempt: 1,
                percent: 25,
            },
            // Out-of-range progress is clamped.
            GenerationEvent::Progress {
                task_id: "T1".into(),
                attempt: 2,
                percent: 100,
            },
            GenerationEvent::Completed {
                task_id: "T1".into(),
                image_count: 2,
            },
        ]
    );
}
