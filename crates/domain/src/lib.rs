//! Shared types for the localchat workspace.
//!
//! Everything the other crates agree on lives here: the error type, the
//! provider-agnostic chat and stream types, the persisted message model,
//! configuration, and structured trace events.

pub mod config;
pub mod error;
pub mod message;
pub mod stream;
pub mod tool;
pub mod trace;
