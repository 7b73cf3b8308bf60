//! Scrapes structured records out of free-form model output.
//!
//! The grammar is the line-prefix layout requested in `prompts.rs`. There is
//! no escaping and no recovery: unrecognised lines are skipped and missing
//! fields stay empty. The only error is finding nothing at all.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::{Meaning, OPTION_LABELS, QuizQuestion};

pub const MAX_MEANINGS: usize = 3;

static MEANING_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)most\s+common\s+meaning").expect("valid meaning header regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("model output contained no {0}")]
    Empty(&'static str),
}

pub fn parse_quiz(raw: &str) -> Result<Vec<QuizQuestion>, ParseError> {
    let mut questions = Vec::new();
    let mut current: Option<QuizQuestion> = None;

    for line in raw.lines().map(str::trim) {
        if line.is_empty() || line == "---" {
            questions.extend(current.take());
            continue;
        }

        if let Some(text) = line.strip_prefix("Q:") {
            questions.extend(current.take());
            current = Some(QuizQuestion {
                question: text.trim().to_string(),
                ..QuizQuestion::default()
            });
        } else if let Some((label, text)) = option_line(line) {
            current
                .get_or_insert_with(QuizQuestion::default)
                .set_option(label, text.trim().to_string());
        } else if let Some(text) = line.strip_prefix("Correct:") {
            current.get_or_insert_with(QuizQuestion::default).correct = normalize_label(text);
        } else if let Some(text) = line.strip_prefix("Explanation:") {
            current.get_or_insert_with(QuizQuestion::default).explanation =
                text.trim().to_string();
        }
    }

    questions.extend(current);

    if questions.is_empty() {
        return Err(ParseError::Empty("quiz questions"));
    }

    Ok(questions)
}

fn option_line(line: &str) -> Option<(&'static str, &str)> {
    OPTION_LABELS.iter().find_map(|label| {
        line.strip_prefix(label)
            .and_then(|rest| rest.strip_prefix(')'))
            .map(|text| (*label, text))
    })
}

/// `"B"`, `"b"`, `"[B]"` and `"B) to run"` all become `"B"`. Anything that
/// does not start with an option letter is kept as written.
fn normalize_label(raw: &str) -> String {
    let trimmed = raw.trim();
    let letter = trimmed
        .trim_start_matches(['[', '('])
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase());

    match letter {
        Some(c @ 'A'..='D') => {
            let after = trimmed.trim_start_matches(['[', '(']).chars().nth(1);
            match after {
                None | Some(')' | ']' | '.' | ' ' | ':') => c.to_string(),
                Some(_) => trimmed.to_string(),
            }
        }
        _ => trimmed.to_string(),
    }
}

pub fn parse_definitions(raw: &str) -> Result<Vec<Meaning>, ParseError> {
    let mut meanings: Vec<Meaning> = Vec::new();
    let mut current: Option<Meaning> = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if MEANING_HEADER.is_match(line) {
            meanings.extend(current.take());
            if meanings.len() >= MAX_MEANINGS {
                break;
            }
            current = Some(Meaning {
                order: meanings.len() + 1,
                ..Meaning::default()
            });
        } else if let Some(example) = line.strip_prefix("Example:") {
            if let Some(meaning) = current.as_mut() {
                meaning.example = example.trim().to_string();
            }
        } else if let Some(meaning) = current.as_mut() {
            if meaning.definition.is_empty() {
                meaning.definition = line.to_string();
            }
        }
    }

    if meanings.len() < MAX_MEANINGS {
        meanings.extend(current);
    }

    if meanings.is_empty() {
        return Err(ParseError::Empty("meanings"));
    }

    Ok(meanings)
}
