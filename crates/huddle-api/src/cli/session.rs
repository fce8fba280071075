//! Session CLI commands: issue and purge bearer tokens.

use anyhow::{Context, Result};
use console::style;

use huddle_types::user::UserId;

use crate::state::AppState;

/// Issue a new bearer token for an existing user.
pub async fn issue_session(state: &AppState, user_id: &str, json: bool) -> Result<()> {
    let user_id: UserId = user_id
        .parse()
        .with_context(|| format!("'{user_id}' is not a valid user id"))?;

    let user = state
        .user_service
        .get_user(&user_id)
        .await
        .with_context(|| format!("User '{user_id}' not found"))?;

    let issued = state
        .sessions
        .issue_session(&user.id, state.session_ttl())
        .await
        .context("Failed to issue session")?;

    if json {
        let out = serde_json::json!({
            "user_id": user.id,
            "token": issued.token,
            "expires_at": issued.expires_at,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Session issued for {}",
        style("✓").green().bold(),
        style(user.username.as_deref().unwrap_or("(no username)")).cyan()
    );
    match issued.expires_at {
        Some(at) => println!("  Expires: {}", style(at.format("%Y-%m-%d %H:%M UTC")).dim()),
        None => println!("  Expires: {}", style("never").dim()),
    }
    println!();
    println!("  {}", style(&issued.token).yellow().bold());
    println!();

    Ok(())
}

/// Remove expired sessions from the store.
pub async fn purge_sessions(state: &AppState, json: bool) -> Result<()> {
    let removed = state
        .sessions
        .purge_expired()
        .await
        .context("Failed to purge sessions")?;

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!(
            "  {} Removed {} expired session(s)",
            style("✓").green().bold(),
            removed
        );
    }
    Ok(())
}
