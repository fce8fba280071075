//! HTTP/WebSocket API layer for Huddle.
//!
//! Axum-based REST API at `/api/v1/` with bearer-session resolution,
//! envelope response format, CORS, and a WebSocket subscription endpoint.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
