//! Query parameter extractors.

use serde::Deserialize;

/// Query parameters for the user search endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct UserSearchQuery {
    /// Substring to match against usernames.
    #[serde(default)]
    pub username: String,
}
