//! `parley chat`: a terminal conversation against the configured provider.
//!
//! Runs turns through the same `ConversationService` the HTTP API uses.
//! Slash commands: `/new` starts a fresh session, `/history` prints it,
//! `/exit` quits.

use std::io::Write;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use parley_types::error::{ConversationError, TurnError};
use parley_types::session::{MessageRole, SessionId};

use crate::state::AppState;

/// Read lines from stdin until EOF or `/exit`.
pub async fn run_chat_loop(state: &AppState) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session_id: Option<SessionId> = None;

    println!();
    println!(
        "  {} Chatting via {} (model {})",
        style("💬").bold(),
        style(state.conversation.provider_name()).cyan(),
        state.config.model
    );
    println!("  {}", style("/new, /history, /exit. Ctrl+C cancels a reply.").dim());
    println!();

    loop {
        print!("{} ", style("you ›").green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/new" => {
                session_id = None;
                println!("  {}", style("Started a new session.").dim());
                continue;
            }
            "/history" => {
                print_history(state, session_id).await;
                continue;
            }
            _ => {}
        }

        let turn = state.conversation.handle_turn(session_id, line);
        let result = tokio::select! {
            result = turn => result,
            _ = tokio::signal::ctrl_c() => Err(TurnError::from(ConversationError::Cancelled)),
        };

        match result {
            Ok(outcome) => {
                session_id = Some(outcome.session_id);
                println!("{} {}", style("bot ›").cyan().bold(), outcome.reply);
            }
            Err(e) => {
                // Keep the session the failed turn wrote its message to.
                if let Some(id) = e.session_id {
                    session_id = Some(id);
                }
                println!("  {} {} ({})", style("✗").red(), e, style(e.code()).dim());
            }
        }
    }

    if let Some(id) = session_id {
        state.conversation.delete_session(&id).await?;
    }
    println!();
    Ok(())
}

async fn print_history(state: &AppState, session_id: Option<SessionId>) {
    let Some(id) = session_id else {
        println!("  {}", style("No messages yet.").dim());
        return;
    };
    match state.conversation.get_session(&id).await {
        Ok(session) => {
            for message in &session.messages {
                let label = match message.role {
                    MessageRole::System => style("system").magenta(),
                    MessageRole::User => style("you").green(),
                    MessageRole::Assistant => style("bot").cyan(),
                };
                println!("  {label}: {}", message.content);
            }
        }
        Err(e) => println!("  {} {e}", style("✗").red()),
    }
}
