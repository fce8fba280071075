//! Session context resolution for both transports.
//!
//! - `resolver` -- derives a [`SessionContext`] from a bearer token (request
//!   path) or a WebSocket handshake payload (stream path)
//!
//! [`SessionContext`]: huddle_types::session::SessionContext

pub mod resolver;

pub use resolver::{IdentityProvider, resolve_handshake, resolve_request};
