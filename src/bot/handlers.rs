use std::sync::Arc;

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, Me, ReplyParameters};

use crate::bot::router::{self, ChatKind, InboundText};
use crate::bot::{AppState, BotIdentity, HandlerResult};

/// Handler for plain text messages (commands are matched earlier).
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    me: Me,
    state: Arc<AppState>,
) -> HandlerResult {
    let Some(inbound) = inbound_text(&msg) else {
        return Ok(());
    };
    let identity = BotIdentity::from(&me);

    let Some(prompt) = router::prompt_for(&state, &identity, &inbound, Utc::now()).await else {
        return Ok(());
    };

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;

    let reply = router::generate_reply(&state, &prompt).await;
    bot.send_message(msg.chat.id, reply)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;

    Ok(())
}

fn inbound_text(msg: &Message) -> Option<InboundText> {
    let from = msg.from.as_ref()?;
    let text = msg.text()?;

    // Commands for other bots, or ones we don't know.
    if text.starts_with('/') {
        return None;
    }

    let chat_kind = if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_group() {
        ChatKind::Group
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Channel
    };

    Some(InboundText {
        sender_id: from.id.0 as i64,
        sender_is_bot: from.is_bot,
        chat_id: msg.chat.id.0,
        chat_kind,
        text: text.to_string(),
        reply_to_user_id: msg
            .reply_to_message()
            .and_then(|replied| replied.from.as_ref())
            .map(|author| author.id.0 as i64),
    })
}
