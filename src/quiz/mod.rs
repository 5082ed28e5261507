pub mod question;

use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;

use crate::ai::llm::{LlmError, Responder};
use question::{normalize_letter, parse_question, QuizParseError, QuizQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Math,
    Science,
    GeneralKnowledge,
}

impl Subject {
    pub const ALL: [Subject; 3] = [Subject::Math, Subject::Science, Subject::GeneralKnowledge];

    /// Stable identifier used in callback data.
    pub fn key(self) -> &'static str {
        match self {
            Self::Math => "math",
            Self::Science => "science",
            Self::GeneralKnowledge => "gk",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Math => "Math",
            Self::Science => "Science",
            Self::GeneralKnowledge => "General Knowledge",
        }
    }

    fn prompt_name(self) -> &'static str {
        match self {
            Self::Math => "math",
            Self::Science => "science",
            Self::GeneralKnowledge => "general knowledge",
        }
    }
}

pub fn question_prompt(subject: Subject) -> String {
    format!(
        "Create one multiple-choice quiz question for grade 8 students about {}. \
         Format: Question: [question]\nA) [option1]\nB) [option2]\nC) [option3]\nD) [option4]\n\
         Correct: [letter]",
        subject.prompt_name()
    )
}

/// Where a user is in the quiz. No entry means no quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizState {
    SelectingSubject,
    InProgress { correct: char },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizEvent<'a> {
    Start,
    QuestionReady { correct: char },
    GenerationFailed,
    Answer(&'a str),
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizEnding {
    Correct,
    Incorrect { correct: char },
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Enter(QuizState),
    End(QuizEnding),
    Ignore,
}

/// The whole quiz state machine. Answers match case-insensitively on the
/// first letter (see [`normalize_letter`]).
pub fn transition(current: Option<&QuizState>, event: QuizEvent<'_>) -> Transition {
    match (current, event) {
        (_, QuizEvent::Start) => Transition::Enter(QuizState::SelectingSubject),
        (_, QuizEvent::Cancel) => Transition::End(QuizEnding::Cancelled),
        (Some(QuizState::SelectingSubject), QuizEvent::QuestionReady { correct }) => {
            Transition::Enter(QuizState::InProgress { correct })
        }
        (Some(QuizState::SelectingSubject), QuizEvent::GenerationFailed) => {
            Transition::End(QuizEnding::Failed)
        }
        (Some(QuizState::InProgress { correct }), QuizEvent::Answer(raw)) => {
            if normalize_letter(raw) == Some(*correct) {
                Transition::End(QuizEnding::Correct)
            } else {
                Transition::End(QuizEnding::Incorrect { correct: *correct })
            }
        }
        _ => Transition::Ignore,
    }
}

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("question generation failed: {0}")]
    Generation(#[from] LlmError),
    #[error("could not parse generated question: {0}")]
    Parse(#[from] QuizParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectOutcome {
    Presented(QuizQuestion),
    Failed,
    Ignored,
}

/// Per-user quiz sessions. Abandoned sessions expire after the TTL.
#[derive(Clone)]
pub struct QuizFlow {
    sessions: Cache<i64, QuizState>,
}

impl QuizFlow {
    pub fn new(session_ttl: Duration, max_capacity: u64) -> Self {
        let sessions = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(session_ttl)
            .build();

        Self { sessions }
    }

    pub async fn state(&self, user_id: i64) -> Option<QuizState> {
        self.sessions.get(&user_id).await
    }

    async fn apply(&self, user_id: i64, event: QuizEvent<'_>) -> Transition {
        let current = self.sessions.get(&user_id).await;
        let next = transition(current.as_ref(), event);
        tracing::debug!("Quiz user {}: {:?} --{:?}--> {:?}", user_id, current, event, next);

        match &next {
            Transition::Enter(state) => self.sessions.insert(user_id, state.clone()).await,
            Transition::End(_) => self.sessions.invalidate(&user_id).await,
            Transition::Ignore => {}
        }
        next
    }

    pub async fn start(&self, user_id: i64) {
        self.apply(user_id, QuizEvent::Start).await;
    }

    /// Generates a question for `subject` if the user is choosing one.
    ///
    /// A cancel that lands while the question is being generated wins: the
    /// finished question is then dropped.
    pub async fn choose_subject(
        &self,
        user_id: i64,
        subject: Subject,
        responder: &Responder,
    ) -> SubjectOutcome {
        if self.state(user_id).await != Some(QuizState::SelectingSubject) {
            return SubjectOutcome::Ignored;
        }

        match generate_question(subject, responder).await {
            Ok(question) => {
                let event = QuizEvent::QuestionReady {
                    correct: question.correct,
                };
                match self.apply(user_id, event).await {
                    Transition::Enter(_) => SubjectOutcome::Presented(question),
                    _ => SubjectOutcome::Ignored,
                }
            }
            Err(e) => {
                tracing::warn!("Quiz generation for user {} failed: {}", user_id, e);
                match self.apply(user_id, QuizEvent::GenerationFailed).await {
                    Transition::End(_) => SubjectOutcome::Failed,
                    _ => SubjectOutcome::Ignored,
                }
            }
        }
    }

    /// Scores an answer. `None` if the user has no question in flight.
    pub async fn answer(&self, user_id: i64, raw: &str) -> Option<QuizEnding> {
        match self.apply(user_id, QuizEvent::Answer(raw)).await {
            Transition::End(ending) => Some(ending),
            _ => None,
        }
    }

    pub async fn cancel(&self, user_id: i64) {
        self.apply(user_id, QuizEvent::Cancel).await;
    }
}

async fn generate_question(
    subject: Subject,
    responder: &Responder,
) -> Result<QuizQuestion, QuizError> {
    let text = responder.generate(&question_prompt(subject)).await?;
    Ok(parse_question(&text)?)
}
