//! Inbound client messages and their deduplication hashes

use std::time::Instant;

use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Control message kinds accepted over a client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Voice,
    ConfigUpdate,
    Ping,
}

impl MessageKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::ConfigUpdate => "config_update",
            Self::Ping => "ping",
        }
    }
}

/// Wire form of an inbound control message
///
/// The `type` tag and field names are part of the client protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    TextMessage { text: String },
    VoiceInput,
    ConfigUpdate { config: serde_json::Value },
    Ping,
}

/// An inbound request as seen by the admission gate
///
/// `content_hash` covers the kind and the normalized payload, so identical
/// requests collide regardless of surrounding whitespace.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub kind: MessageKind,
    /// Normalized (trimmed) payload
    pub payload: String,
    pub received_at: Instant,
    /// Hex sha256 over kind and normalized payload
    pub content_hash: String,
}

impl InboundMessage {
    /// Build a message, normalizing the payload and computing its hash
    pub fn new(kind: MessageKind, payload: impl AsRef<str>) -> Self {
        let normalized = payload.as_ref().trim().to_string();

        let mut hasher = Sha256::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(normalized.as_bytes());
        let content_hash = format!("{:x}", hasher.finalize());

        Self {
            kind,
            payload: normalized,
            received_at: Instant::now(),
            content_hash,
        }
    }

    /// A text turn request
    pub fn text(text: impl AsRef<str>) -> Self {
        Self::new(MessageKind::Text, text)
    }

    /// A voice turn request (no payload)
    pub fn voice() -> Self {
        Self::new(MessageKind::Voice, "")
    }
}
