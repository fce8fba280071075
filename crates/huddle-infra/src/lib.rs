//! Infrastructure layer for Huddle.
//!
//! Contains implementations of the ports defined in `huddle-core`: SQLite
//! repositories, the SQLite-backed session store acting as identity provider,
//! and the `config.toml` loader.

pub mod config;
pub mod sqlite;
