pub mod callbacks;
pub mod commands;
pub mod handlers;
pub mod router;

use std::sync::Arc;
use std::time::Duration;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::Me;

use crate::ai::llm::{Responder, TextGenerator};
use crate::config::AppConfig;
use crate::quiz::QuizFlow;
use crate::tracking::activity::ActivityTracker;
use crate::tracking::rate_limit::RateLimiter;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

const MAX_TRACKED_USERS: u64 = 100_000;
const MAX_TRACKED_GROUPS: u64 = 10_000;
const GROUP_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const MAX_QUIZ_SESSIONS: u64 = 10_000;
const QUIZ_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Shared application state, accessible from all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub responder: Responder,
    pub rate_limiter: RateLimiter,
    pub activity: ActivityTracker,
    pub quiz: QuizFlow,
}

impl AppState {
    pub fn new(config: AppConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let cooldown = Duration::from_secs(config.message_cooldown_secs);
        Self {
            config,
            responder: Responder::new(generator),
            rate_limiter: RateLimiter::new(cooldown, MAX_TRACKED_USERS),
            activity: ActivityTracker::new(GROUP_RETENTION, MAX_TRACKED_GROUPS),
            quiz: QuizFlow::new(QUIZ_SESSION_TTL, MAX_QUIZ_SESSIONS),
        }
    }
}

/// The bot's own account, as needed to recognise mentions and replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: String,
}

impl From<&Me> for BotIdentity {
    fn from(me: &Me) -> Self {
        Self {
            id: me.user.id.0 as i64,
            username: me.user.username.clone().unwrap_or_default(),
        }
    }
}

/// Build the teloxide update handler tree.
pub fn build_handler() -> UpdateHandler<HandlerError> {
    let command_handler = Update::filter_message()
        .filter_command::<commands::BotCommand>()
        .endpoint(commands::handle_command);

    let callback_handler = Update::filter_callback_query()
        .endpoint(callbacks::handle_callback);

    let message_handler = Update::filter_message()
        .endpoint(handlers::handle_message);

    dptree::entry()
        .branch(command_handler)
        .branch(callback_handler)
        .branch(message_handler)
}
