//! Shared domain types for Huddle.
//!
//! Users, conversations, participants, messages, sessions, domain events,
//! configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod message;
pub mod session;
pub mod user;
