//! Tests for the execution context lifecycle and cancellation.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use autohelm::config::HelmConfig;
use autohelm::context::{ExecutionContext, ExecutionState};
use autohelm::error::HelmError;

fn context() -> ExecutionContext {
    ExecutionContext::new(&HelmConfig::default())
}

#[tokio::test]
async fn begin_task_records_metadata_and_enters_starting() {
    let context = context();
    let run_id = Uuid::new_v4();

    context.begin_task(run_id, "book a flight").unwrap();

    assert_eq!(context.state(), ExecutionState::Starting);
    let metadata = context.task_metadata().unwrap();
    assert_eq!(metadata.run_id, run_id);
    assert_eq!(metadata.task, "book a flight");
}

#[tokio::test]
async fn begin_task_rejects_a_busy_context() {
    let context = context();
    context.begin_task(Uuid::new_v4(), "first").unwrap();

    let err = context.begin_task(Uuid::new_v4(), "second").unwrap_err();

    assert!(matches!(err, HelmError::InvalidState(_)));
}

#[tokio::test]
async fn state_sink_observes_the_whole_lifecycle() {
    let context = context();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    context.set_state_sink(Arc::new(move |change| {
        sink_seen.lock().unwrap().push((change.from, change.to));
    }));

    context.begin_task(Uuid::new_v4(), "watched run").unwrap();
    context.set_state(ExecutionState::Running);
    context.set_state(ExecutionState::Completed);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (ExecutionState::Idle, ExecutionState::Starting),
            (ExecutionState::Starting, ExecutionState::Running),
            (ExecutionState::Running, ExecutionState::Completed),
        ]
    );
}

#[tokio::test]
async fn check_canceled_probes_without_side_effects() {
    let context = context();
    context.begin_task(Uuid::new_v4(), "probed run").unwrap();
    context.set_state(ExecutionState::Running);
    assert!(context.check_canceled().is_ok());

    context.cancellation_token().cancel();

    assert!(context.check_canceled().is_err());
    assert!(context.check_canceled().is_err());
    assert_eq!(context.state(), ExecutionState::Running);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_cancel_forces_aborted_after_grace() {
    let context = context();
    context.begin_task(Uuid::new_v4(), "stuck run").unwrap();
    context.set_state(ExecutionState::Running);

    context.cancel(true).await;

    assert_eq!(context.state(), ExecutionState::Aborted);
    assert!(context.state_log().last().unwrap().forced);
    assert!(matches!(
        context.check_canceled(),
        Err(HelmError::Canceled {
            user_initiated: true
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn acknowledged_cancel_takes_the_legal_path() {
    let context = Arc::new(context());
    context.begin_task(Uuid::new_v4(), "polite run").unwrap();
    context.set_state(ExecutionState::Running);

    // A cooperative loop: acknowledge as soon as the token fires.
    let loop_side = context.clone();
    tokio::spawn(async move {
        loop_side.cancellation_token().cancelled().await;
        loop_side.ensure_aborted();
    });

    context.cancel(false).await;

    assert_eq!(context.state(), ExecutionState::Aborted);
    assert!(context.state_log().iter().all(|change| !change.forced));
}

#[tokio::test]
async fn cancel_without_a_run_is_a_noop() {
    let context = context();

    context.cancel(true).await;

    assert_eq!(context.state(), ExecutionState::Idle);
    assert!(context.state_log().is_empty());
    assert!(context.check_canceled().is_ok());
}

#[tokio::test(start_paused = true)]
async fn preempt_forces_out_a_stuck_run() {
    let context = context();
    context.begin_task(Uuid::new_v4(), "stuck run").unwrap();
    context.set_state(ExecutionState::Running);

    context.preempt().await;

    assert_eq!(context.state(), ExecutionState::Aborted);
}

#[tokio::test]
async fn reset_rearms_a_terminal_context() {
    let context = context();
    context.begin_task(Uuid::new_v4(), "doomed run").unwrap();
    context.set_state(ExecutionState::Running);
    context.set_state(ExecutionState::Aborting);
    context.set_state(ExecutionState::Aborted);
    context.todos().add("leftover step");
    assert!(context.check_canceled().is_err());

    context.reset();

    assert_eq!(context.state(), ExecutionState::Idle);
    assert!(context.check_canceled().is_ok());
    assert!(context.state_log().is_empty());
    assert!(context.todos().is_empty());
    assert!(context.task_metadata().is_none());
    context.begin_task(Uuid::new_v4(), "fresh run").unwrap();
}

#[tokio::test]
async fn reset_keeps_history_for_follow_up_handling() {
    let context = context();
    context
        .history()
        .lock()
        .unwrap()
        .append(autohelm::types::Message::human("earlier conversation"));

    context.reset();

    assert_eq!(context.history().lock().unwrap().len(), 1);
}
