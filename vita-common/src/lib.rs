//! # Vita Common Library
//!
//! Shared code for the vita diet/fitness agents including:
//! - Cross-agent event envelope and builder
//! - Event vocabularies per agent
//! - Durable message channel (at-least-once delivery)
//! - Consumer dispatcher with manual ack/nack
//! - In-process activity bus and SSE utilities
//! - Configuration loading

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
