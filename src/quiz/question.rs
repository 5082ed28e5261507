use thiserror::Error;

/// Letters a generated question may use for its options.
pub const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    pub letter: char,
    pub text: String,
}

impl QuizOption {
    /// Button label, e.g. `B) Paris`.
    pub fn label(&self) -> String {
        format!("{}) {}", self.letter, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<QuizOption>,
    pub correct: char,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizParseError {
    #[error("no question text found")]
    MissingQuestion,
    #[error("expected at least 2 options, found {0}")]
    TooFewOptions(usize),
    #[error("no correct-answer line found")]
    MissingAnswer,
    #[error("correct answer {0:?} is not an option letter")]
    InvalidAnswer(String),
    #[error("correct answer {0} does not match any option")]
    AnswerNotAmongOptions(char),
}

/// Reduces a user- or model-supplied answer to a single upper-case letter.
///
/// Accepts `b`, ` B `, `B)`, `(B)` and `B. Paris`; rejects anything whose first
/// letter is followed by more letters (`Berlin`).
pub fn normalize_letter(raw: &str) -> Option<char> {
    let trimmed = raw.trim().trim_start_matches('(').trim_start();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    match chars.next() {
        Some(next) if next.is_alphanumeric() => None,
        _ => Some(first.to_ascii_uppercase()),
    }
}

/// Extracts a question from free-form generator output.
///
/// The output is scanned for labeled fields (`Question:`, `A)`..`D)`,
/// `Correct:`) in any order, so blank lines, markdown emphasis and chatty
/// preambles do not break parsing. Without a `Question:` label, the question
/// is the last unlabeled line before the options, preferring one ending in `?`.
pub fn parse_question(text: &str) -> Result<QuizQuestion, QuizParseError> {
    let mut question: Option<String> = None;
    let mut before_options: Vec<String> = Vec::new();
    let mut after_options: Option<String> = None;
    let mut options: Vec<QuizOption> = Vec::new();
    let mut answer: Option<char> = None;
    let mut unreadable_answer: Option<String> = None;

    for raw_line in text.lines() {
        let line = clean_line(raw_line);
        if line.is_empty() {
            continue;
        }

        if let Some((letter, value)) = option_line(&line) {
            if !value.is_empty() && !options.iter().any(|o| o.letter == letter) {
                options.push(QuizOption {
                    letter,
                    text: value.to_string(),
                });
            }
        } else if let Some(value) = labeled(&line, &["question", "q"]) {
            if question.is_none() && !value.is_empty() {
                question = Some(value.to_string());
            }
        } else if let Some(value) = answer_field(&line) {
            if answer.is_none() && !value.is_empty() {
                match normalize_letter(strip_answer_filler(value)) {
                    Some(letter) => answer = Some(letter),
                    None => {
                        unreadable_answer.get_or_insert_with(|| value.to_string());
                    }
                }
            }
        } else if line.ends_with(':') {
            // "Here's a question for you:"
        } else if options.is_empty() {
            before_options.push(line);
        } else if after_options.is_none() {
            after_options = Some(line);
        }
    }

    let unlabeled = match before_options.iter().rposition(|l| l.ends_with('?')) {
        Some(index) => Some(before_options.swap_remove(index)),
        None => before_options.pop(),
    };
    let question = question
        .or(unlabeled)
        .or(after_options)
        .ok_or(QuizParseError::MissingQuestion)?;

    if options.len() < 2 {
        return Err(QuizParseError::TooFewOptions(options.len()));
    }

    let correct = match (answer, unreadable_answer) {
        (Some(letter), _) => letter,
        (None, Some(value)) => return Err(QuizParseError::InvalidAnswer(value)),
        (None, None) => return Err(QuizParseError::MissingAnswer),
    };
    if !options.iter().any(|o| o.letter == correct) {
        return Err(QuizParseError::AnswerNotAmongOptions(correct));
    }

    Ok(QuizQuestion {
        question,
        options,
        correct,
    })
}

fn clean_line(line: &str) -> String {
    let without_emphasis: String = line.chars().filter(|c| *c != '*').collect();
    without_emphasis
        .trim()
        .trim_start_matches('#')
        .trim()
        .to_string()
}

fn labeled<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    let (head, rest) = line.split_once(':')?;
    let head = head.trim().to_ascii_lowercase();
    labels.contains(&head.as_str()).then(|| rest.trim())
}

/// `Correct: B`, `The correct answer is: B` style lines, and the colon-less
/// `The correct answer is B`.
fn answer_field(line: &str) -> Option<&str> {
    if let Some((head, rest)) = line.split_once(':') {
        let head = head.to_ascii_lowercase();
        if head.contains("correct") || head.contains("answer") {
            return Some(rest.trim());
        }
    }

    let lower = line.to_ascii_lowercase();
    ["the correct answer is", "correct answer is", "the answer is", "answer is"]
        .iter()
        .find(|phrase| lower.starts_with(*phrase))
        .map(|phrase| line[phrase.len()..].trim())
}

fn strip_answer_filler(value: &str) -> &str {
    let mut value = value.trim();
    for filler in ["answer is", "option", "letter", "choice"] {
        let lower = value.to_ascii_lowercase();
        if lower.starts_with(filler) {
            value = value[filler.len()..].trim_start();
        }
    }
    value
}

fn option_line(line: &str) -> Option<(char, &str)> {
    let line = line.strip_prefix('(').unwrap_or(line);
    let mut chars = line.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !OPTION_LETTERS.contains(&letter) {
        return None;
    }
    let rest = chars.as_str();
    let rest = rest
        .strip_prefix(')')
        .or_else(|| rest.strip_prefix('.'))
        .or_else(|| rest.strip_prefix(':'))?;
    Some((letter, rest.trim()))
}
