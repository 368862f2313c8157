//! Core types for the streaming voice assistant
//!
//! This crate provides the foundational types used across all other crates:
//! - Text and audio units flowing through the response pipeline
//! - Inbound client messages and their deduplication hashes
//! - Conversation history entries and running session statistics
//! - Wire events exposed to connected clients

pub mod conversation;
pub mod events;
pub mod message;
pub mod units;

pub use conversation::{SessionStats, Turn, TurnRole};
pub use events::{AssistantEvent, TurnMetrics};
pub use message::{ClientMessage, InboundMessage, MessageKind};
pub use units::{AudioUnit, TextUnit};
