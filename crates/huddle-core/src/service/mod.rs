//! Application services.
//!
//! - `conversation` -- conversation listing/creation and messaging, with event publication
//! - `user` -- username selection and user search

pub mod conversation;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;
