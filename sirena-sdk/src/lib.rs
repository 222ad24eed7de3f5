//! Shared types and collaborator clients for the Sirena alert pipeline.
//!
//! The `objects` module carries the value types that cross crate boundaries.
//! The `client` module (behind the `client` feature) talks to the external
//! services: channel web previews, the chat-completions classifier and
//! Firebase Cloud Messaging.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
