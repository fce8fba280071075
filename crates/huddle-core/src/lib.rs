//! Business logic and repository trait definitions for Huddle.
//!
//! This crate defines the "ports" (repository traits and the identity
//! provider) that the infrastructure layer implements, plus the event bus,
//! services, and subscription gateway. It depends only on `huddle-types` --
//! never on `huddle-infra` or any database/IO crate.

pub mod event;
pub mod repository;
pub mod service;
pub mod session;
pub mod subscription;
