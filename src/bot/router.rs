//! Decides whether a plain text message gets a generated reply.
//!
//! Everything here works on [`InboundText`] so the rules can be exercised
//! without a Telegram connection.

use chrono::{DateTime, Utc};

use crate::bot::{AppState, BotIdentity};

/// Telegram rejects messages above 4096 UTF-16 code units; keep a margin.
pub const MAX_REPLY_UNITS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group | Self::Supergroup)
    }
}

#[derive(Debug, Clone)]
pub struct InboundText {
    pub sender_id: i64,
    pub sender_is_bot: bool,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub text: String,
    /// Author of the message this one replies to, if any.
    pub reply_to_user_id: Option<i64>,
}

/// Mentions the bot by handle, or replies to one of its messages.
pub fn is_directed(me: &BotIdentity, inbound: &InboundText) -> bool {
    let mentioned = !me.username.is_empty() && inbound.text.contains(&mention(me));
    mentioned || inbound.reply_to_user_id == Some(me.id)
}

pub fn strip_mention(me: &BotIdentity, text: &str) -> String {
    if me.username.is_empty() {
        return text.trim().to_string();
    }
    text.replace(&mention(me), "").trim().to_string()
}

/// Cuts `text` to at most [`MAX_REPLY_UNITS`] UTF-16 code units, never
/// splitting a character.
pub fn truncate_reply(mut text: String) -> String {
    let mut units = 0;
    let cut = text.char_indices().find_map(|(index, c)| {
        units += c.len_utf16();
        (units > MAX_REPLY_UNITS).then_some(index)
    });
    if let Some(cut) = cut {
        text.truncate(cut);
    }
    text
}

fn mention(me: &BotIdentity) -> String {
    format!("@{}", me.username)
}

/// Applies the bot filter, the rate limiter and the activity tracker, then
/// returns the prompt to answer, or `None` if the message must be ignored.
pub async fn prompt_for(
    state: &AppState,
    me: &BotIdentity,
    inbound: &InboundText,
    now: DateTime<Utc>,
) -> Option<String> {
    if inbound.sender_is_bot {
        return None;
    }

    if !state.rate_limiter.check(inbound.sender_id, now).await {
        return None;
    }

    if inbound.chat_kind.is_group() {
        state.activity.record(inbound.chat_id, now).await;
    }

    if inbound.chat_kind == ChatKind::Private || is_directed(me, inbound) {
        Some(strip_mention(me, &inbound.text))
    } else {
        None
    }
}

pub async fn generate_reply(state: &AppState, prompt: &str) -> String {
    truncate_reply(state.responder.reply(prompt).await)
}

pub async fn route_text(
    state: &AppState,
    me: &BotIdentity,
    inbound: &InboundText,
    now: DateTime<Utc>,
) -> Option<String> {
    let prompt = prompt_for(state, me, inbound, now).await?;
    Some(generate_reply(state, &prompt).await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ai::llm::testing::ScriptedGenerator;
    use crate::ai::llm::SYSTEM_INSTRUCTION;
    use crate::config::AppConfig;

    const BOT_ID: i64 = 999;
    const GROUP: i64 = -1001;

    fn utf16_len(text: &str) -> usize {
        text.chars().map(char::len_utf16).sum()
    }

    fn me() -> BotIdentity {
        BotIdentity {
            id: BOT_ID,
            username: "bot_handle".to_string(),
        }
    }

    fn state_with(generator: Arc<ScriptedGenerator>) -> AppState {
        AppState::new(AppConfig::for_tests(1), generator)
    }

    fn private(sender_id: i64, text: &str) -> InboundText {
        InboundText {
            sender_id,
            sender_is_bot: false,
            chat_id: sender_id,
            chat_kind: ChatKind::Private,
            text: text.to_string(),
            reply_to_user_id: None,
        }
    }

    fn group(sender_id: i64, text: &str) -> InboundText {
        InboundText {
            chat_id: GROUP,
            chat_kind: ChatKind::Supergroup,
            ..private(sender_id, text)
        }
    }

    #[tokio::test]
    async fn private_messages_inside_cooldown_get_one_reply() {
        let state = state_with(ScriptedGenerator::replying("hi!"));
        let t0 = Utc::now();

        let first = route_text(&state, &me(), &private(10, "hello"), t0).await;
        let second = route_text(
            &state,
            &me(),
            &private(10, "hello again"),
            t0 + chrono::Duration::seconds(3),
        )
        .await;

        assert_eq!(first.as_deref(), Some("hi!"));
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn undirected_group_message_is_ignored_but_tracked() {
        let generator = ScriptedGenerator::replying("unused");
        let state = state_with(generator.clone());
        let now = Utc::now();

        let reply = route_text(&state, &me(), &group(10, "just chatting"), now).await;

        assert_eq!(reply, None);
        assert!(generator.prompts().is_empty());
        assert_eq!(state.activity.last_seen(GROUP).await, Some(now));
    }

    #[tokio::test]
    async fn mention_in_group_is_answered_without_the_handle() {
        let generator = ScriptedGenerator::replying("hello to you");
        let state = state_with(generator.clone());

        let reply = route_text(&state, &me(), &group(10, "@bot_handle hello"), Utc::now()).await;

        assert_eq!(reply.as_deref(), Some("hello to you"));
        assert_eq!(generator.prompts(), vec![format!("{SYSTEM_INSTRUCTION}hello")]);
    }

    #[tokio::test]
    async fn reply_to_bot_in_group_is_directed() {
        let state = state_with(ScriptedGenerator::replying("ok"));
        let inbound = InboundText {
            reply_to_user_id: Some(BOT_ID),
            ..group(10, "and what about tomorrow?")
        };

        assert!(route_text(&state, &me(), &inbound, Utc::now()).await.is_some());
    }

    #[tokio::test]
    async fn reply_to_someone_else_is_not_directed() {
        let state = state_with(ScriptedGenerator::replying("ok"));
        let inbound = InboundText {
            reply_to_user_id: Some(12345),
            ..group(10, "agreed")
        };

        assert_eq!(route_text(&state, &me(), &inbound, Utc::now()).await, None);
    }

    #[tokio::test]
    async fn bot_senders_are_ignored_before_anything_else() {
        let state = state_with(ScriptedGenerator::replying("ok"));
        let now = Utc::now();
        let inbound = InboundText {
            sender_is_bot: true,
            ..group(10, "@bot_handle hello")
        };

        assert_eq!(route_text(&state, &me(), &inbound, now).await, None);
        assert_eq!(state.activity.last_seen(GROUP).await, None);
        // The bot message did not consume the sender's cooldown.
        assert!(state.rate_limiter.check(10, now).await);
    }

    #[tokio::test]
    async fn activity_follows_latest_group_message_and_ignores_private_chats() {
        let state = state_with(ScriptedGenerator::replying("ok"));
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(20);

        route_text(&state, &me(), &group(10, "first"), t0).await;
        route_text(&state, &me(), &group(11, "second"), t1).await;
        route_text(&state, &me(), &private(12, "private"), t1).await;

        assert_eq!(state.activity.last_seen(GROUP).await, Some(t1));
        assert_eq!(state.activity.last_seen(12).await, None);
        assert_eq!(state.activity.active_groups().await, 1);
    }

    #[tokio::test]
    async fn long_replies_are_truncated_to_the_limit() {
        let long = "é".repeat(MAX_REPLY_UNITS + 250);
        let state = state_with(ScriptedGenerator::replying(long));

        let reply = route_text(&state, &me(), &private(10, "essay please"), Utc::now())
            .await
            .unwrap();

        assert_eq!(reply.chars().count(), MAX_REPLY_UNITS);
    }

    #[tokio::test]
    async fn generation_failure_still_replies_with_fallback() {
        let state = state_with(ScriptedGenerator::failing());

        let reply = route_text(&state, &me(), &private(10, "hello"), Utc::now()).await;

        assert_eq!(reply.as_deref(), Some(crate::ai::llm::FALLBACK_REPLY));
    }

    #[test]
    fn short_replies_are_untouched() {
        assert_eq!(truncate_reply("short".to_string()), "short");
        let exact = "x".repeat(MAX_REPLY_UNITS);
        assert_eq!(truncate_reply(exact.clone()), exact);
    }

    #[test]
    fn astral_characters_count_as_two_units() {
        let emoji = "😀".repeat(MAX_REPLY_UNITS);
        let cut = truncate_reply(emoji);
        assert_eq!(cut.chars().count(), MAX_REPLY_UNITS / 2);
        assert_eq!(utf16_len(&cut), MAX_REPLY_UNITS);
    }

    #[test]
    fn surrogate_pair_straddling_the_limit_is_dropped_whole() {
        let text = format!("{}😀", "x".repeat(MAX_REPLY_UNITS - 1));
        let cut = truncate_reply(text);
        assert_eq!(cut, "x".repeat(MAX_REPLY_UNITS - 1));
    }

    #[test]
    fn empty_username_never_counts_as_mention() {
        let anonymous = BotIdentity {
            id: BOT_ID,
            username: String::new(),
        };
        assert!(!is_directed(&anonymous, &group(10, "@ someone")));
    }
}
