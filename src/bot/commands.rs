use std::sync::Arc;

use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;

use crate::bot::{router, AppState, HandlerResult};
use crate::quiz::Subject;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum BotCommand {
    #[command(description = "Show the welcome message")]
    Start,
    #[command(description = "Show help")]
    Help,
    #[command(description = "Start a quiz")]
    Quiz,
    #[command(description = "Leave the current quiz")]
    Cancel,
    #[command(description = "Ask me anything, e.g. /ask why is the sky blue?")]
    Ask(String),
    #[command(description = "Bot statistics (admin only)")]
    Stats,
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: BotCommand,
    state: Arc<AppState>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;

    match cmd {
        BotCommand::Start => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "👋 Hi {}! I'm your Gemini-powered Telegram bot.\n\n\
                     Message me directly, mention me in a group, or reply to one of my messages.\n\n{}",
                    user.first_name,
                    BotCommand::descriptions()
                ),
            )
            .await?;
        }

        BotCommand::Help => {
            bot.send_message(msg.chat.id, BotCommand::descriptions().to_string())
                .await?;
        }

        BotCommand::Quiz => {
            state.quiz.start(user_id).await;
            bot.send_message(msg.chat.id, "📚 Choose a quiz subject:")
                .reply_markup(subject_keyboard())
                .await?;
        }

        BotCommand::Cancel => {
            state.quiz.cancel(user_id).await;
        }

        BotCommand::Ask(question) => {
            if let Some(reply) = ask_reply(&state, user_id, &question, Utc::now()).await {
                bot.send_message(msg.chat.id, reply).await?;
            }
        }

        BotCommand::Stats => {
            bot.send_message(msg.chat.id, stats_reply(&state, user_id).await)
                .await?;
        }
    }

    Ok(())
}

pub fn subject_keyboard() -> InlineKeyboardMarkup {
    let rows = Subject::ALL
        .into_iter()
        .map(|subject| {
            vec![InlineKeyboardButton::callback(
                subject.display_name(),
                format!("subject_{}", subject.key()),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

/// `/ask` is rate limited like free text. `None` means stay silent.
async fn ask_reply(
    state: &AppState,
    user_id: i64,
    question: &str,
    now: DateTime<Utc>,
) -> Option<String> {
    let question = question.trim();
    if question.is_empty() {
        return Some("Usage: /ask <your question>".to_string());
    }

    if !state.rate_limiter.check(user_id, now).await {
        return None;
    }

    Some(router::generate_reply(state, question).await)
}

async fn stats_reply(state: &AppState, user_id: i64) -> String {
    if !state.config.is_admin(user_id) {
        return "❌ Admin only.".to_string();
    }

    format!(
        "📊 Bot Stats\nAdmin ID: {}\nActive groups: {}",
        state.config.admin_id,
        state.activity.active_groups().await
    )
}
