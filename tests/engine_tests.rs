// Integration tests for the call engine
//
// These tests drive a LocalProvider and verify lifecycle transitions,
// transcript reconciliation timing, dedup and the end-of-call sequence.
// Timing tests run on a paused clock and step it with `advance`.

use anyhow::Result;
use call_session::{
    CallEngine, CallError, CallStatus, EngineEvent, LocalProvider, Role, SessionConfig,
    VoiceProvider,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config() -> SessionConfig {
    SessionConfig {
        assistant_id: Some("assistant-1".to_string()),
        ..SessionConfig::default()
    }
}

fn spawn_engine(config: SessionConfig) -> (Arc<LocalProvider>, CallEngine) {
    let provider = Arc::new(LocalProvider::new());
    let dyn_provider: Arc<dyn VoiceProvider> = provider.clone();
    let engine = CallEngine::spawn(dyn_provider, config);
    (provider, engine)
}

async fn active_call() -> Result<(Arc<LocalProvider>, CallEngine)> {
    let (provider, engine) = spawn_engine(config());
    engine.start_call(None).await?;
    provider.emit("call-start", json!({ "call": { "id": "call-42" } }));
    assert_eq!(engine.snapshot().await?.status, CallStatus::Active);
    Ok((provider, engine))
}

async fn transcript_texts(engine: &CallEngine) -> Result<Vec<(Role, String)>> {
    Ok(engine
        .transcript()
        .await?
        .into_iter()
        .map(|m| (m.role, m.text))
        .collect())
}

/// Provider that offers neither registration capability
struct BareProvider;

#[async_trait::async_trait]
impl VoiceProvider for BareProvider {
    fn name(&self) -> &str {
        "bare"
    }

    async fn start(&self, _assistant_id: &str) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn is_muted(&self) -> Result<bool> {
        Ok(false)
    }

    async fn set_muted(&self, _muted: bool) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_start_call_registers_handlers() -> Result<()> {
    let (provider, engine) = spawn_engine(config());

    let session_id = engine.start_call(None).await?;
    assert!(session_id.starts_with("call-"));

    let snapshot = engine.snapshot().await?;
    assert_eq!(snapshot.status, CallStatus::Connecting);
    assert!(!snapshot.is_connected);
    assert_eq!(provider.listener_count(), 8, "One handler per provider event");
    assert_eq!(provider.started_assistants(), vec!["assistant-1".to_string()]);

    provider.emit("call-start", json!({ "call": { "id": "call-42" } }));

    let snapshot = engine.snapshot().await?;
    assert_eq!(snapshot.status, CallStatus::Active);
    assert!(snapshot.is_connected);

    let stats = engine.stats().await?;
    assert_eq!(stats.session_id.as_deref(), Some(session_id.as_str()));
    assert_eq!(stats.provider_call_id.as_deref(), Some("call-42"));
    assert!(stats.connected_at.is_some());

    Ok(())
}

#[tokio::test]
async fn test_explicit_assistant_overrides_config() -> Result<()> {
    let (provider, engine) = spawn_engine(config());
    engine.start_call(Some("assistant-2".to_string())).await?;

    assert_eq!(provider.started_assistants(), vec!["assistant-2".to_string()]);
    assert_eq!(
        engine.stats().await?.assistant_id.as_deref(),
        Some("assistant-2")
    );
    Ok(())
}

#[tokio::test]
async fn test_missing_assistant_is_rejected() -> Result<()> {
    let (provider, engine) = spawn_engine(SessionConfig::default());

    let result = engine.start_call(None).await;
    assert!(matches!(result, Err(CallError::MissingAssistant)));
    assert_eq!(engine.snapshot().await?.status, CallStatus::Idle);
    assert_eq!(provider.listener_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_start_while_in_call_is_rejected() -> Result<()> {
    let (_provider, engine) = active_call().await?;

    let result = engine.start_call(None).await;
    assert!(matches!(result, Err(CallError::CallInProgress)));
    assert_eq!(engine.snapshot().await?.status, CallStatus::Active);
    Ok(())
}

#[tokio::test]
async fn test_unsupported_transport_fails_fast() -> Result<()> {
    let engine = CallEngine::spawn(Arc::new(BareProvider), config());

    let result = engine.start_call(None).await;
    assert!(matches!(result, Err(CallError::UnsupportedTransport(ref name)) if name == "bare"));

    let snapshot = engine.snapshot().await?;
    assert_eq!(snapshot.status, CallStatus::Idle);
    assert!(snapshot.last_error.is_some());
    Ok(())
}

#[tokio::test]
async fn test_provider_start_failure_rolls_back() -> Result<()> {
    let (provider, engine) = spawn_engine(config());
    provider.fail_next_start(true);

    let result = engine.start_call(None).await;
    assert!(matches!(result, Err(CallError::Provider { .. })));

    let snapshot = engine.snapshot().await?;
    assert_eq!(snapshot.status, CallStatus::Idle);
    assert!(snapshot.last_error.is_some());
    assert_eq!(provider.listener_count(), 0, "Handlers must be detached");

    // A later start succeeds and clears the error
    provider.fail_next_start(false);
    engine.start_call(None).await?;
    let snapshot = engine.snapshot().await?;
    assert_eq!(snapshot.status, CallStatus::Connecting);
    assert_eq!(snapshot.last_error, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_partial_superseded_by_final() -> Result<()> {
    let (provider, engine) = active_call().await?;

    provider.emit(
        "message",
        json!({ "transcript": "Hallo, mein Na", "role": "user", "transcriptType": "partial" }),
    );
    tokio::time::advance(Duration::from_secs(1)).await;
    provider.emit(
        "message",
        json!({ "transcript": "Hallo, mein Name ist Max", "role": "user", "transcriptType": "final" }),
    );

    // Well past the quiet period: the superseded partial must not reappear
    tokio::time::advance(Duration::from_secs(5)).await;

    assert_eq!(
        transcript_texts(&engine).await?,
        vec![(Role::User, "Hallo, mein Name ist Max".to_string())]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_identical_finals_are_deduplicated() -> Result<()> {
    let (provider, engine) = active_call().await?;

    provider.emit("transcript", json!({ "transcript": "Guten Tag", "role": "assistant" }));
    tokio::time::advance(Duration::from_secs(2)).await;
    provider.emit("transcript", json!({ "transcript": "Guten Tag", "role": "assistant" }));

    assert_eq!(
        transcript_texts(&engine).await?,
        vec![(Role::Assistant, "Guten Tag".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn test_unusable_notification_changes_nothing() -> Result<()> {
    let (provider, engine) = active_call().await?;
    let before = engine.snapshot().await?;

    provider.emit("message", json!({ "foo": 1, "bar": "x" }));

    assert_eq!(engine.snapshot().await?, before);
    assert!(engine.transcript().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_volume_samples() -> Result<()> {
    let (provider, engine) = active_call().await?;

    provider.emit("volume-level", json!({ "detail": 0.73 }));
    assert_eq!(engine.snapshot().await?.volume_level, 0.73);

    provider.emit("volume-level", json!({ "detail": "abc" }));
    assert_eq!(engine.snapshot().await?.volume_level, 0.73);

    provider.emit("volume-level", json!(0.25));
    assert_eq!(engine.snapshot().await?.volume_level, 0.25);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_partial_promoted_after_quiet_period() -> Result<()> {
    let (provider, engine) = active_call().await?;

    provider.emit(
        "message",
        json!({ "transcript": "Ich bin Softwareentwickler", "role": "user", "transcriptType": "partial" }),
    );

    tokio::time::advance(Duration::from_millis(3900)).await;
    assert!(engine.transcript().await?.is_empty(), "Still inside the quiet period");

    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(
        transcript_texts(&engine).await?,
        vec![(Role::User, "Ich bin Softwareentwickler".to_string())]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rapid_partials_produce_one_entry() -> Result<()> {
    let (provider, engine) = active_call().await?;

    let hypotheses = ["Ich", "Ich habe", "Ich habe fünf", "Ich habe fünf Jahre Erfahrung"];
    for text in hypotheses {
        provider.emit(
            "message",
            json!({ "transcript": text, "role": "user", "transcriptType": "partial" }),
        );
        tokio::time::advance(Duration::from_millis(500)).await;
    }

    // 500ms after the last partial: nothing promoted yet
    assert!(engine.transcript().await?.is_empty());

    tokio::time::advance(Duration::from_secs(4)).await;
    assert_eq!(
        transcript_texts(&engine).await?,
        vec![(Role::User, "Ich habe fünf Jahre Erfahrung".to_string())]
    );

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(engine.transcript().await?.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_custom_debounce_period() -> Result<()> {
    let (provider, engine) = spawn_engine(SessionConfig {
        debounce: Duration::from_millis(800),
        ..config()
    });
    engine.start_call(None).await?;
    provider.emit("call-start", json!({}));

    provider.emit("message", json!({ "text": "Kurz", "transcriptType": "partial" }));
    engine.snapshot().await?;
    tokio::time::advance(Duration::from_millis(800)).await;

    assert_eq!(
        transcript_texts(&engine).await?,
        vec![(Role::Assistant, "Kurz".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn test_end_call_finalizes_pending_and_detaches() -> Result<()> {
    let (provider, engine) = active_call().await?;

    provider.emit(
        "message",
        json!({ "transcript": "Vielen Dank für das Gespr", "role": "user", "transcriptType": "partial" }),
    );
    engine.end_call().await?;

    assert_eq!(
        transcript_texts(&engine).await?,
        vec![(Role::User, "Vielen Dank für das Gespr".to_string())]
    );

    let snapshot = engine.snapshot().await?;
    assert_eq!(snapshot.status, CallStatus::Ended);
    assert!(!snapshot.is_connected);
    assert_eq!(provider.listener_count(), 0);
    assert_eq!(provider.stop_calls(), 1);
    assert!(engine.stats().await?.ended_at.is_some());

    // Late notifications reach nobody
    assert_eq!(provider.emit("message", json!({ "text": "zu spät" })), 0);

    // Ending again is a no-op
    engine.end_call().await?;
    assert_eq!(provider.stop_calls(), 1);
    assert_eq!(engine.snapshot().await?.status, CallStatus::Ended);
    Ok(())
}

#[tokio::test]
async fn test_end_call_while_idle_is_noop() -> Result<()> {
    let (provider, engine) = spawn_engine(config());

    engine.end_call().await?;
    assert_eq!(engine.snapshot().await?.status, CallStatus::Idle);
    assert_eq!(provider.stop_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_provider_call_end() -> Result<()> {
    let (provider, engine) = active_call().await?;

    provider.emit(
        "call-end",
        json!({ "call": { "id": "call-42", "endedReason": "assistant-ended-call" } }),
    );

    let snapshot = engine.snapshot().await?;
    assert_eq!(snapshot.status, CallStatus::Ended);
    assert_eq!(provider.stop_calls(), 0, "Provider already hung up");
    assert_eq!(provider.listener_count(), 0);
    assert_eq!(
        engine.stats().await?.ended_reason.as_deref(),
        Some("assistant-ended-call")
    );
    Ok(())
}

#[tokio::test]
async fn test_provider_error_is_recorded() -> Result<()> {
    let (provider, engine) = active_call().await?;

    provider.emit("error", json!({ "error": { "message": "Mikrofon nicht verfügbar" } }));

    let snapshot = engine.snapshot().await?;
    assert_eq!(snapshot.status, CallStatus::Active);
    assert_eq!(snapshot.last_error.as_deref(), Some("Mikrofon nicht verfügbar"));
    Ok(())
}

#[tokio::test]
async fn test_toggle_mute() -> Result<()> {
    let (provider, engine) = spawn_engine(config());

    let result = engine.toggle_mute().await;
    assert!(matches!(result, Err(CallError::NoActiveCall)));
    assert!(!engine.snapshot().await?.is_muted);

    engine.start_call(None).await?;
    assert!(engine.toggle_mute().await?);
    assert!(engine.snapshot().await?.is_muted);
    assert!(provider.is_muted().await?);

    assert!(!engine.toggle_mute().await?);
    assert!(!engine.snapshot().await?.is_muted);
    Ok(())
}

#[tokio::test]
async fn test_new_call_after_end_resets_session() -> Result<()> {
    let (provider, engine) = active_call().await?;
    let first = engine.stats().await?.session_id;

    provider.emit("message", json!({ "transcript": "Hallo", "role": "user" }));
    engine.end_call().await?;
    assert_eq!(engine.transcript().await?.len(), 1);

    engine.start_call(None).await?;
    let snapshot = engine.snapshot().await?;
    assert_eq!(snapshot.status, CallStatus::Connecting);
    assert_eq!(snapshot.last_error, None);
    assert!(engine.transcript().await?.is_empty());

    let stats = engine.stats().await?;
    assert_ne!(stats.session_id, first);
    assert_eq!(stats.duration_secs, 0);

    // The same text is welcome again in the new transcript
    provider.emit("call-start", json!({}));
    provider.emit("message", json!({ "transcript": "Hallo", "role": "user" }));
    assert_eq!(engine.transcript().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_reset_returns_to_idle() -> Result<()> {
    let (provider, engine) = active_call().await?;
    provider.emit("message", json!({ "transcript": "Hallo", "role": "user" }));

    engine.reset().await?;

    let snapshot = engine.snapshot().await?;
    assert_eq!(snapshot.status, CallStatus::Idle);
    assert!(engine.transcript().await?.is_empty());
    assert_eq!(provider.listener_count(), 0);
    assert_eq!(provider.stop_calls(), 1);
    assert_eq!(engine.stats().await?.session_id, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_duration_counts_only_while_active() -> Result<()> {
    let (provider, engine) = spawn_engine(config());
    engine.start_call(None).await?;

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(engine.stats().await?.duration_secs, 0, "Not counted while connecting");

    provider.emit("call-start", json!({}));
    engine.snapshot().await?;

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(1)).await;
        engine.snapshot().await?;
    }
    assert_eq!(engine.stats().await?.duration_secs, 3);

    engine.end_call().await?;
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(engine.stats().await?.duration_secs, 3);
    Ok(())
}

#[tokio::test]
async fn test_observers_are_notified() -> Result<()> {
    let (provider, engine) = spawn_engine(config());
    let mut events = engine.subscribe();
    let mut status = engine.watch_status();

    engine.start_call(None).await?;
    provider.emit("speech-start", json!(null));
    provider.emit("message", json!({ "transcript": "Willkommen zum Interview" }));
    engine.snapshot().await?;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert!(matches!(
        seen.first(),
        Some(EngineEvent::StatusChanged(snapshot)) if snapshot.status == CallStatus::Connecting
    ));
    assert!(seen.contains(&EngineEvent::SpeechStarted));
    assert!(seen.iter().any(|event| matches!(
        event,
        EngineEvent::TranscriptAppended(message)
            if message.role == Role::Assistant && message.text == "Willkommen zum Interview"
    )));

    assert!(status.has_changed()?);
    assert_eq!(status.borrow_and_update().status, CallStatus::Connecting);
    Ok(())
}
