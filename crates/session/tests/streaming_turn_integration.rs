//! Integration tests for the streaming response path
//!
//! These drive whole turns through the orchestrator: token stream ->
//! segmenter -> generation -> playback, with scripted collaborators.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::timeout;

use voice_assistant_config::{VoiceConfig, VoiceManager};
use voice_assistant_core::{AssistantEvent, Turn, TurnRole};
use voice_assistant_pipeline::{
    AudioPipeline, AudioPlayer, PipelineConfig, PipelineError, SpeechSynthesizer,
};
use voice_assistant_session::{
    SessionConfig, SessionOrchestrator, SourceError, SpeechRecognizer, TokenSource, TokenStream,
};

/// Token source that replies `Echo: {input}.` so turns are correlatable
struct EchoingSource;

#[async_trait]
impl TokenSource for EchoingSource {
    async fn stream(&self, input: &str, _history: &[Turn]) -> Result<TokenStream, SourceError> {
        let tokens = vec!["Echo: ".to_string(), input.to_string(), ".".to_string()];
        Ok(Box::pin(tokio_stream::iter(tokens.into_iter().map(Ok))))
    }
}

/// Token source with a fixed script, independent of the input
struct ScriptedSource {
    tokens: Vec<&'static str>,
}

#[async_trait]
impl TokenSource for ScriptedSource {
    async fn stream(&self, _input: &str, _history: &[Turn]) -> Result<TokenStream, SourceError> {
        let tokens: Vec<Result<String, SourceError>> =
            self.tokens.iter().map(|t| Ok(t.to_string())).collect();
        Ok(Box::pin(tokio_stream::iter(tokens)))
    }
}

/// Token source whose stream fails after one token
struct FailingSource;

#[async_trait]
impl TokenSource for FailingSource {
    async fn stream(&self, _input: &str, _history: &[Turn]) -> Result<TokenStream, SourceError> {
        let items: Vec<Result<String, SourceError>> = vec![
            Ok("Partial".to_string()),
            Err(SourceError("model backend unreachable".to_string())),
        ];
        Ok(Box::pin(tokio_stream::iter(items)))
    }
}

/// Synthesizer that records calls and injects failures by text marker
///
/// Text containing `ALWAYSFAIL` never synthesizes; text containing `RETRY`
/// fails until the configured failure budget is spent.
struct ScriptedSynthesizer {
    calls: Mutex<Vec<String>>,
    retry_budget: Mutex<u32>,
    delay: Duration,
}

impl ScriptedSynthesizer {
    fn new(retry_budget: u32) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            retry_budget: Mutex::new(retry_budget),
            delay: Duration::from_millis(2),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &VoiceConfig) -> Result<Vec<u8>, PipelineError> {
        self.calls.lock().push(text.to_string());
        tokio::time::sleep(self.delay).await;

        if text.contains("ALWAYSFAIL") {
            return Err(PipelineError::Synthesis("permanent failure".to_string()));
        }
        if text.contains("RETRY") {
            let mut budget = self.retry_budget.lock();
            if *budget > 0 {
                *budget -= 1;
                return Err(PipelineError::Synthesis("transient failure".to_string()));
            }
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Player recording the text carried in each audio buffer
struct RecordingPlayer {
    played: Mutex<Vec<String>>,
}

#[async_trait]
impl AudioPlayer for RecordingPlayer {
    async fn play(&self, audio: &[u8]) -> Result<(), PipelineError> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.played
            .lock()
            .push(String::from_utf8_lossy(audio).to_string());
        Ok(())
    }
}

/// Recognizer with a fixed transcript (or silence)
struct FixedRecognizer {
    transcript: Option<&'static str>,
}

#[async_trait]
impl SpeechRecognizer for FixedRecognizer {
    async fn listen(
        &self,
        _timeout: Duration,
        _silence: Duration,
    ) -> Result<Option<String>, SourceError> {
        Ok(self.transcript.map(str::to_string))
    }
}

struct Harness {
    orchestrator: Arc<SessionOrchestrator>,
    synthesizer: Arc<ScriptedSynthesizer>,
    player: Arc<RecordingPlayer>,
    pipeline: Arc<AudioPipeline>,
}

fn harness_with(
    source: Arc<dyn TokenSource>,
    recognizer: Arc<dyn SpeechRecognizer>,
    retry_budget: u32,
) -> Harness {
    let synthesizer = Arc::new(ScriptedSynthesizer::new(retry_budget));
    let player = Arc::new(RecordingPlayer {
        played: Mutex::new(Vec::new()),
    });

    let pipeline_config = PipelineConfig {
        retry_backoff: Duration::from_millis(2),
        idle_log_interval: Duration::from_secs(5),
        playback_timeout: Duration::from_secs(2),
        warm_up_text: String::new(),
        ..Default::default()
    };
    let pipeline = Arc::new(AudioPipeline::new(
        pipeline_config,
        synthesizer.clone(),
        player.clone(),
        VoiceConfig::default(),
    ));

    let session_config = SessionConfig {
        min_drain: Duration::from_secs(5),
        drain_poll: Duration::from_millis(10),
        ..Default::default()
    };
    let orchestrator = Arc::new(SessionOrchestrator::new(
        source,
        recognizer,
        pipeline.clone(),
        Arc::new(VoiceManager::new(VoiceConfig::default())),
        session_config,
    ));

    Harness {
        orchestrator,
        synthesizer,
        player,
        pipeline,
    }
}

fn drain_events(rx: &mut broadcast::Receiver<AssistantEvent>) -> Vec<AssistantEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_streaming_turn_plays_sentences_in_order() {
    let harness = harness_with(
        Arc::new(ScriptedSource {
            tokens: vec!["Bonjour", ".", " Comment", " vas", "-tu", "?"],
        }),
        Arc::new(FixedRecognizer { transcript: None }),
        0,
    );
    harness.orchestrator.initialize().await.unwrap();
    let mut rx = harness.orchestrator.subscribe();

    timeout(
        Duration::from_secs(10),
        harness.orchestrator.process_text("salut"),
    )
    .await
    .unwrap();

    assert_eq!(
        *harness.player.played.lock(),
        vec!["Bonjour.", "Comment vas-tu?"]
    );

    let events = drain_events(&mut rx);
    assert!(matches!(
        events.first(),
        Some(AssistantEvent::MessageProcessingStart { .. })
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, AssistantEvent::FirstToken { ttft, .. } if *ttft >= 0.0)));

    let complete = events
        .iter()
        .find_map(|e| match e {
            AssistantEvent::LlmComplete { content, metrics } => Some((content, metrics)),
            _ => None,
        })
        .expect("missing llm_complete event");
    assert_eq!(complete.0, "Bonjour. Comment vas-tu?");
    assert_eq!(complete.1.token_count, 6);
    assert!(complete.1.first_audio_time > 0.0);
}

#[tokio::test]
async fn test_failed_unit_is_dropped_and_turn_continues() {
    let harness = harness_with(
        Arc::new(ScriptedSource {
            tokens: vec!["First one.", " This will ALWAYSFAIL.", " Third one."],
        }),
        Arc::new(FixedRecognizer { transcript: None }),
        0,
    );
    harness.orchestrator.initialize().await.unwrap();
    let mut rx = harness.orchestrator.subscribe();

    timeout(
        Duration::from_secs(10),
        harness.orchestrator.process_text("go"),
    )
    .await
    .unwrap();

    // The failing unit never reaches playback; later units still play
    assert_eq!(
        *harness.player.played.lock(),
        vec!["First one.", "Third one."]
    );

    let stats = harness.pipeline.stats();
    assert_eq!(stats.units_dropped, 1);
    assert_eq!(stats.units_played, 2);

    // The turn itself still completes
    let events = drain_events(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, AssistantEvent::LlmComplete { .. })));
}

#[tokio::test]
async fn test_transient_failures_are_retried_to_success() {
    let harness = harness_with(
        Arc::new(ScriptedSource {
            tokens: vec!["Please RETRY this sentence."],
        }),
        Arc::new(FixedRecognizer { transcript: None }),
        2,
    );
    harness.orchestrator.initialize().await.unwrap();

    timeout(
        Duration::from_secs(10),
        harness.orchestrator.process_text("go"),
    )
    .await
    .unwrap();

    // Two failures, then the third attempt lands
    assert_eq!(harness.synthesizer.calls.lock().len(), 3);
    assert_eq!(
        *harness.player.played.lock(),
        vec!["Please RETRY this sentence."]
    );
    assert_eq!(harness.pipeline.stats().units_dropped, 0);
}

#[tokio::test]
async fn test_duplicate_message_is_admitted_once() {
    let harness = harness_with(
        Arc::new(EchoingSource),
        Arc::new(FixedRecognizer { transcript: None }),
        0,
    );
    harness.orchestrator.initialize().await.unwrap();

    let first = {
        let orchestrator = harness.orchestrator.clone();
        tokio::spawn(async move { orchestrator.process_text("Bonjour.").await })
    };
    let second = {
        let orchestrator = harness.orchestrator.clone();
        tokio::spawn(async move { orchestrator.process_text("Bonjour.").await })
    };
    timeout(Duration::from_secs(10), async {
        first.await.unwrap();
        second.await.unwrap();
    })
    .await
    .unwrap();

    // Exactly one turn ran: one user entry, one assistant entry
    let history = harness.orchestrator.history();
    assert_eq!(history.len(), 2);
    assert_eq!(harness.orchestrator.stats().messages, 1);
}

#[tokio::test]
async fn test_concurrent_turns_are_serialized() {
    let harness = harness_with(
        Arc::new(EchoingSource),
        Arc::new(FixedRecognizer { transcript: None }),
        0,
    );
    harness.orchestrator.initialize().await.unwrap();

    let first = {
        let orchestrator = harness.orchestrator.clone();
        tokio::spawn(async move { orchestrator.process_text("premier message").await })
    };
    let second = {
        let orchestrator = harness.orchestrator.clone();
        tokio::spawn(async move { orchestrator.process_text("second message").await })
    };
    timeout(Duration::from_secs(10), async {
        first.await.unwrap();
        second.await.unwrap();
    })
    .await
    .unwrap();

    // Both turns ran, and never interleaved: user A, assistant A, user B,
    // assistant B, with each reply echoing its own input.
    let history = harness.orchestrator.history();
    assert_eq!(history.len(), 4);
    for (i, turn) in history.iter().enumerate() {
        let expected = if i % 2 == 0 {
            TurnRole::User
        } else {
            TurnRole::Assistant
        };
        assert_eq!(turn.role, expected);
    }
    assert!(history[1].content.contains(&history[0].content));
    assert!(history[3].content.contains(&history[2].content));
    assert_eq!(harness.orchestrator.stats().messages, 2);
}

#[tokio::test]
async fn test_silent_voice_turn_aborts_without_error() {
    let harness = harness_with(
        Arc::new(EchoingSource),
        Arc::new(FixedRecognizer { transcript: None }),
        0,
    );
    harness.orchestrator.initialize().await.unwrap();
    let mut rx = harness.orchestrator.subscribe();

    timeout(Duration::from_secs(10), harness.orchestrator.process_voice())
        .await
        .unwrap();

    let events = drain_events(&mut rx);
    assert!(matches!(events[0], AssistantEvent::ListeningStart));
    assert!(matches!(events[1], AssistantEvent::ListeningEnd));
    assert!(!events
        .iter()
        .any(|e| matches!(e, AssistantEvent::Error { .. })));
    assert!(harness.orchestrator.history().is_empty());
}

#[tokio::test]
async fn test_voice_turn_with_transcript_runs_the_text_path() {
    let harness = harness_with(
        Arc::new(EchoingSource),
        Arc::new(FixedRecognizer {
            transcript: Some("Quelle heure est-il"),
        }),
        0,
    );
    harness.orchestrator.initialize().await.unwrap();
    let mut rx = harness.orchestrator.subscribe();

    timeout(Duration::from_secs(10), harness.orchestrator.process_voice())
        .await
        .unwrap();

    let events = drain_events(&mut rx);
    assert!(events.iter().any(
        |e| matches!(e, AssistantEvent::Transcription { content } if content == "Quelle heure est-il")
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, AssistantEvent::LlmComplete { .. })));
    assert_eq!(harness.orchestrator.history().len(), 2);
}

#[tokio::test]
async fn test_uninitialized_session_surfaces_an_error_event() {
    let harness = harness_with(
        Arc::new(EchoingSource),
        Arc::new(FixedRecognizer { transcript: None }),
        0,
    );
    let mut rx = harness.orchestrator.subscribe();

    timeout(
        Duration::from_secs(10),
        harness.orchestrator.process_text("hello"),
    )
    .await
    .unwrap();

    let events = drain_events(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, AssistantEvent::Error { .. })));
    assert!(harness.orchestrator.history().is_empty());
}

#[tokio::test]
async fn test_token_source_failure_aborts_the_turn() {
    let harness = harness_with(
        Arc::new(FailingSource),
        Arc::new(FixedRecognizer { transcript: None }),
        0,
    );
    harness.orchestrator.initialize().await.unwrap();
    let mut rx = harness.orchestrator.subscribe();

    timeout(
        Duration::from_secs(10),
        harness.orchestrator.process_text("hello"),
    )
    .await
    .unwrap();

    let events = drain_events(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, AssistantEvent::Error { content } if content.contains("unreachable"))));
    assert!(!events
        .iter()
        .any(|e| matches!(e, AssistantEvent::LlmComplete { .. })));

    // The user turn is recorded, the assistant turn never happened
    let history = harness.orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, TurnRole::User);
}
