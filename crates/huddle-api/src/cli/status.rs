//! System status command.

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Row counts of the main tables.
struct StoreCounts {
    users: i64,
    conversations: i64,
    messages: i64,
    sessions: i64,
}

async fn count(state: &AppState, table: &str) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(&state.db_pool.reader)
        .await?;
    Ok(n)
}

async fn store_counts(state: &AppState) -> Result<StoreCounts> {
    Ok(StoreCounts {
        users: count(state, "users").await?,
        conversations: count(state, "conversations").await?,
        messages: count(state, "messages").await?,
        sessions: count(state, "sessions").await?,
    })
}

/// Display store counts, configuration, and version.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let counts = store_counts(state).await?;
    let config = &state.config;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "listen": format!("{}:{}", config.host, config.port),
            "fanout_policy": config.fanout_policy,
            "client_origin": config.client_origin,
            "store": {
                "users": counts.users,
                "conversations": counts.conversations,
                "messages": counts.messages,
                "sessions": counts.sessions,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Huddle v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Store ──").dim());
    println!("  Users:         {}", style(counts.users).bold());
    println!("  Conversations: {}", style(counts.conversations).bold());
    println!("  Messages:      {}", counts.messages);
    println!("  Sessions:      {}", counts.sessions);
    println!();

    println!("  {}", style("── Server ──").dim());
    println!("  Listen:        {}:{}", config.host, config.port);
    println!("  Fan-out:       {:?}", config.fanout_policy);
    println!(
        "  Client origin: {}",
        style(config.client_origin.as_deref().unwrap_or("any")).dim()
    );
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!();

    Ok(())
}
