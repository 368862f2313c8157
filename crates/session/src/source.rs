//! Token source and speech recognition collaborator contracts
//!
//! The orchestrator depends only on these traits. Real language-model and
//! microphone backends live out of tree; the in-process implementations
//! here serve demos and tests.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tokio_stream::Stream;

use voice_assistant_core::Turn;

/// Collaborator failure surfaced as a turn-level error
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct SourceError(pub String);

/// Lazy, finite, non-restartable token sequence for one input
///
/// A failing source yields a single terminal `Err` item.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, SourceError>> + Send>>;

/// Produces the response token stream for one user input
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn stream(&self, input: &str, history: &[Turn]) -> Result<TokenStream, SourceError>;
}

/// Blocking speech capture
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Listen until a transcript or silence; `None` means nothing was heard
    async fn listen(
        &self,
        timeout: Duration,
        silence: Duration,
    ) -> Result<Option<String>, SourceError>;
}

/// Demo source that acknowledges the input, token by token
pub struct EchoTokenSource {
    token_delay: Duration,
}

impl EchoTokenSource {
    pub fn new() -> Self {
        Self {
            token_delay: Duration::from_millis(30),
        }
    }

    pub fn with_token_delay(token_delay: Duration) -> Self {
        Self { token_delay }
    }
}

impl Default for EchoTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for EchoTokenSource {
    async fn stream(&self, input: &str, _history: &[Turn]) -> Result<TokenStream, SourceError> {
        let reply = format!("You said: {}. Noted.", input.trim_end_matches(['.', '!', '?']));
        let tokens: Vec<Result<String, SourceError>> = reply
            .split_inclusive(' ')
            .map(|t| Ok(t.to_string()))
            .collect();

        let delay = self.token_delay;
        let stream = tokio_stream::iter(tokens).then(move |token| async move {
            tokio::time::sleep(delay).await;
            token
        });

        Ok(Box::pin(stream))
    }
}

/// Recognizer that always reports silence
pub struct SilentRecognizer;

#[async_trait]
impl SpeechRecognizer for SilentRecognizer {
    async fn listen(
        &self,
        _timeout: Duration,
        _silence: Duration,
    ) -> Result<Option<String>, SourceError> {
        Ok(None)
    }
}
