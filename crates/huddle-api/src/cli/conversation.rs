//! Conversation listing CLI command.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use huddle_types::conversation::Conversation;
use huddle_types::session::{Session, SessionContext, SessionUser};
use huddle_types::user::UserId;

use crate::state::AppState;

/// Longest message preview shown in the table.
const PREVIEW_CHARS: usize = 40;

/// List a user's conversations, most recently updated first.
///
/// Goes through the same service call as `GET /api/v1/conversations`, so the
/// membership filter applies.
pub async fn list_conversations(state: &AppState, user_id: &str, json: bool) -> Result<()> {
    let user_id: UserId = user_id
        .parse()
        .with_context(|| format!("'{user_id}' is not a valid user id"))?;
    let user = state
        .user_service
        .get_user(&user_id)
        .await
        .with_context(|| format!("User '{user_id}' not found"))?;

    let ctx = SessionContext::authenticated(Session::new(SessionUser {
        id: user.id,
        username: user.username.clone(),
    }));
    let conversations = state.conversation_service.list_conversations(&ctx).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!(
            "  {} No conversations for {}",
            style("i").blue().bold(),
            style(user.username.as_deref().unwrap_or("this user")).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Participants").fg(Color::White),
        Cell::new("Latest message").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
        Cell::new("Seen").fg(Color::White),
    ]);

    for conversation in &conversations {
        let seen = conversation
            .participants
            .iter()
            .find(|p| p.user.id == user.id)
            .is_some_and(|p| p.has_seen_latest_message);

        table.add_row(vec![
            Cell::new(conversation.id),
            Cell::new(participant_names(conversation)),
            Cell::new(preview(conversation)),
            Cell::new(conversation.updated_at.format("%Y-%m-%d %H:%M")),
            if seen {
                Cell::new("yes").fg(Color::Green)
            } else {
                Cell::new("no").fg(Color::Yellow)
            },
        ]);
    }

    println!("{table}");
    Ok(())
}

fn participant_names(conversation: &Conversation) -> String {
    conversation
        .participants
        .iter()
        .map(|p| p.user.username.clone().unwrap_or_else(|| p.user.id.to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn preview(conversation: &Conversation) -> String {
    let Some(message) = conversation.latest_message.as_ref() else {
        return "(none)".to_string();
    };
    if message.body.chars().count() > PREVIEW_CHARS {
        let cut: String = message.body.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        message.body.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use huddle_types::conversation::ConversationId;
    use huddle_types::message::{Message, MessageId, MessageSender};

    fn conversation_with_body(body: &str) -> Conversation {
        let id = ConversationId::new();
        let sender = UserId::new();
        Conversation {
            id,
            participants: Vec::new(),
            latest_message: Some(Message {
                id: MessageId::new(),
                conversation_id: id,
                sender: MessageSender {
                    id: sender,
                    username: None,
                },
                body: body.to_string(),
                created_at: Utc::now(),
            }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_preview_truncates_long_bodies() {
        let long = "x".repeat(100);
        let p = preview(&conversation_with_body(&long));
        assert_eq!(p.chars().count(), PREVIEW_CHARS);
        assert!(p.ends_with("..."));
        assert_eq!(preview(&conversation_with_body("hi")), "hi");
    }
}
