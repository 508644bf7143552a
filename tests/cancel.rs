mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mail_chat::{SessionState, SubmitError};
use support::{assistant_content, mounted, wait_until};
use tokio::sync::Semaphore;
use turn_provider::{
    is_cancelled, CancelSignal, ProviderProfile, TurnEvent, TurnExecutor, TurnRequest,
};
use turn_provider_mock::ScriptedTurnExecutor;

/// Streams one delta, then waits for cancellation and for `linger` before
/// sending more text and a `Finished` that must never reach the log.
struct StubbornExecutor {
    saw_cancel: AtomicBool,
    linger: Semaphore,
}

impl StubbornExecutor {
    fn new() -> Self {
        Self {
            saw_cancel: AtomicBool::new(false),
            linger: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl TurnExecutor for StubbornExecutor {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: "stubborn".to_string(),
            model_id: "stubborn".to_string(),
        }
    }

    async fn execute(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut (dyn FnMut(TurnEvent) + Send),
    ) -> Result<(), String> {
        let turn_id = req.turn_id;
        emit(TurnEvent::Started { turn_id });
        emit(TurnEvent::Delta {
            turn_id,
            text: "Hello wo".to_string(),
        });

        while !is_cancelled(&cancel) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.saw_cancel.store(true, Ordering::SeqCst);
        if let Ok(permit) = self.linger.acquire().await {
            permit.forget();
        }

        emit(TurnEvent::Delta {
            turn_id,
            text: "Hello world, ignored".to_string(),
        });
        emit(TurnEvent::Finished {
            turn_id,
            text: "Hello world, ignored".to_string(),
        });
        Ok(())
    }
}

#[tokio::test]
async fn cancel_mid_stream_keeps_partial_text_and_drops_late_events() {
    let executor = Arc::new(StubbornExecutor::new());
    let harness = mounted(Arc::clone(&executor) as _).await;
    let controller = Arc::clone(&harness.controller);

    let turn = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.submit("hi").await }
    });
    wait_until("first delta", || {
        assistant_content(&controller).as_deref() == Some("Hello wo")
    })
    .await;

    assert!(controller.cancel());
    assert_eq!(controller.state(), SessionState::Ready);
    let messages = controller.messages();
    assert_eq!(messages[1].content, "Hello wo");
    assert!(!messages[1].streaming);

    wait_until("executor to observe cancel", || {
        executor.saw_cancel.load(Ordering::SeqCst)
    })
    .await;
    assert!(!controller.accepts_input());
    assert_eq!(
        controller.submit("too soon").await,
        Err(SubmitError::TurnActive)
    );
    assert_eq!(controller.messages(), messages);

    executor.linger.add_permits(1);
    turn.await.expect("turn task").expect("turn accepted");

    assert_eq!(
        assistant_content(&controller).as_deref(),
        Some("Hello wo")
    );
    assert!(controller.streaming_message().is_none());
    assert!(controller.accepts_input());
}

#[tokio::test]
async fn next_turn_starts_after_cancelled_turn_winds_down() {
    let (executor, gate) = ScriptedTurnExecutor::new(["Hel", "lo"]).gated();
    let harness = mounted(Arc::new(executor)).await;
    let controller = Arc::clone(&harness.controller);

    let turn = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.submit("first").await }
    });
    gate.release_one();
    wait_until("first delta", || {
        assistant_content(&controller).as_deref() == Some("Hel")
    })
    .await;

    assert!(controller.cancel());
    assert!(!controller.cancel(), "second cancel has nothing to stop");
    turn.await.expect("turn task").expect("turn accepted");

    gate.release(3);
    let next = controller.submit("second").await;
    assert!(next.is_ok(), "{next:?}");
    let contents: Vec<_> = controller
        .messages()
        .into_iter()
        .map(|message| message.content)
        .collect();
    assert_eq!(contents, ["first", "Hel", "second", "Hello"]);
}

#[tokio::test]
async fn submit_while_sending_or_streaming_leaves_log_unchanged() {
    let (executor, gate) = ScriptedTurnExecutor::new(["Hel"]).gated();
    let harness = mounted(Arc::new(executor)).await;
    let controller = Arc::clone(&harness.controller);

    let turn = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.submit("first").await }
    });
    wait_until("turn in flight", || controller.state().turn_id().is_some()).await;

    let before = controller.messages();
    assert_eq!(
        controller.submit("second").await,
        Err(SubmitError::TurnActive)
    );
    assert_eq!(controller.messages(), before);

    gate.release(2);
    turn.await.expect("turn task").expect("turn accepted");
    assert_eq!(assistant_content(&controller).as_deref(), Some("Hel"));
}

#[tokio::test]
async fn cancel_without_turn_is_a_no_op() {
    let harness = mounted(Arc::new(ScriptedTurnExecutor::new(["ok"]))).await;

    assert!(!harness.controller.cancel());
    assert_eq!(harness.controller.state(), SessionState::Ready);
    assert!(harness.controller.messages().is_empty());
}

#[tokio::test]
async fn turn_timeout_fails_the_turn() {
    let (executor, _gate) = ScriptedTurnExecutor::new(["never"]).gated();
    let harness = support::harness_with(
        Some(support::valid_record()),
        support::RecordingSynchronizer::default(),
        Arc::new(executor),
        |controller| controller.with_turn_timeout(Duration::from_millis(100)),
    );
    harness.controller.mount().await;

    harness.controller.submit("hi").await.expect("turn accepted");

    assert_eq!(
        assistant_content(&harness.controller).as_deref(),
        Some("❌ turn timed out after 100ms")
    );
    assert_eq!(harness.controller.state(), SessionState::Ready);
    assert!(harness.controller.accepts_input());
}

#[tokio::test]
async fn logout_mid_stream_cancels_turn_and_clears_everything() {
    let (executor, _gate) = ScriptedTurnExecutor::new(["Hel"]).gated();
    let harness = mounted(Arc::new(executor)).await;
    let controller = Arc::clone(&harness.controller);

    let turn = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.submit("hi").await }
    });
    wait_until("stream open", || {
        matches!(controller.state(), SessionState::Streaming { .. })
    })
    .await;

    controller.logout().expect("logout should succeed");
    assert_eq!(controller.state(), SessionState::Unauthenticated);
    assert!(controller.messages().is_empty());

    turn.await.expect("turn task").expect("turn accepted");
    assert!(controller.messages().is_empty());
    assert!(harness.storage.snapshot().is_none());
}
