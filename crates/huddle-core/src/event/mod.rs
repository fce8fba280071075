//! In-process publish/subscribe for domain events.
//!
//! Provides an `EventBus` that fans `DomainEvent`s out to every subscriber
//! of a named topic via `tokio::sync::broadcast` channels.

pub mod bus;

pub use bus::{EventBus, Subscription};
