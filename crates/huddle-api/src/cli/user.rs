//! User CLI commands.

use anyhow::{Context, Result};
use console::style;

use huddle_types::session::{Session, SessionContext, SessionUser};

use crate::state::AppState;

/// Register a user, optionally claim a username, and print a bearer token.
///
/// # Examples
///
/// ```bash
/// huddle user create ada@example.com --name Ada --username ada
/// ```
pub async fn create_user(
    state: &AppState,
    email: String,
    name: Option<String>,
    username: Option<String>,
    json: bool,
) -> Result<()> {
    let user = state
        .user_service
        .register_user(Some(email), name)
        .await
        .context("Failed to register user")?;

    if let Some(ref username) = username {
        let ctx = SessionContext::authenticated(Session::new(SessionUser {
            id: user.id,
            username: None,
        }));
        state
            .user_service
            .create_username(&ctx, username)
            .await
            .with_context(|| format!("Failed to claim username '{username}'"))?;
    }

    let issued = state
        .sessions
        .issue_session(&user.id, state.session_ttl())
        .await
        .context("Failed to issue session")?;

    if json {
        let out = serde_json::json!({
            "user_id": user.id,
            "username": username,
            "token": issued.token,
            "expires_at": issued.expires_at,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} User {} created",
        style("✓").green().bold(),
        style(user.id).cyan()
    );
    if let Some(username) = username {
        println!("  Username: {}", style(username).bold());
    }
    println!();
    println!(
        "  {} Bearer token (save this -- it won't be shown again):",
        style("🔑").bold()
    );
    println!();
    println!("  {}", style(&issued.token).yellow().bold());
    println!();

    Ok(())
}
