use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::bot::{AppState, HandlerResult};
use crate::quiz::question::QuizQuestion;
use crate::quiz::{QuizEnding, Subject, SubjectOutcome};

pub const QUIZ_FAILED: &str = "⚠️ Failed to generate quiz. Try again later.";

pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> HandlerResult {
    let data = match q.data.as_deref() {
        Some(d) => d,
        None => return Ok(()),
    };

    let user_id = q.from.id.0 as i64;

    // Stop the button spinner before a possibly slow generation.
    bot.answer_callback_query(&q.id).await?;

    // ── Subject Selection ──────────────────────────────────────────
    if let Some(key) = data.strip_prefix("subject_") {
        let Some(subject) = Subject::from_key(key) else {
            return Ok(());
        };

        match state
            .quiz
            .choose_subject(user_id, subject, &state.responder)
            .await
        {
            SubjectOutcome::Presented(question) => {
                edit_quiz_message(
                    &bot,
                    &q,
                    format!("❓ {}", question.question),
                    Some(answer_keyboard(&question)),
                )
                .await?;
            }
            SubjectOutcome::Failed => {
                edit_quiz_message(&bot, &q, QUIZ_FAILED.to_string(), None).await?;
            }
            SubjectOutcome::Ignored => {}
        }
        return Ok(());
    }

    // ── Answer Selection ───────────────────────────────────────────
    if let Some(letter) = data.strip_prefix("ans_") {
        let ending = state.quiz.answer(user_id, letter).await;
        if let Some(text) = ending.as_ref().and_then(ending_text) {
            edit_quiz_message(&bot, &q, text, None).await?;
        }
        return Ok(());
    }

    Ok(())
}

pub fn answer_keyboard(question: &QuizQuestion) -> InlineKeyboardMarkup {
    let rows = question
        .options
        .iter()
        .map(|option| {
            vec![InlineKeyboardButton::callback(
                option.label(),
                format!("ans_{}", option.letter),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

/// Text shown when a quiz ends. Cancelling is silent.
pub fn ending_text(ending: &QuizEnding) -> Option<String> {
    match ending {
        QuizEnding::Correct => Some("✅ Correct!".to_string()),
        QuizEnding::Incorrect { correct } => Some(format!(
            "❌ Incorrect. The correct answer was {}.",
            correct
        )),
        QuizEnding::Failed => Some(QUIZ_FAILED.to_string()),
        QuizEnding::Cancelled => None,
    }
}

async fn edit_quiz_message(
    bot: &Bot,
    q: &CallbackQuery,
    text: String,
    keyboard: Option<InlineKeyboardMarkup>,
) -> HandlerResult {
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };

    let request = bot.edit_message_text(message.chat().id, message.id(), text);
    match keyboard {
        Some(keyboard) => request.reply_markup(keyboard).await?,
        None => request.await?,
    };

    Ok(())
}
