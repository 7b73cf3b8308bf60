use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::models::{QuizOption, QuizQuestion};

/// The questions generated for one quiz and the words they cover.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSnapshot {
    pub questions: Vec<QuizQuestion>,
    pub words: Vec<String>,
    pub stashed_at: DateTime<Utc>,
}

/// Pending quizzes keyed by login-session token. Stashing again under the
/// same key replaces the previous quiz; entries older than `ttl` are treated
/// as absent and removed on access or by `purge_expired`.
pub struct QuizStash {
    entries: Mutex<HashMap<String, QuizSnapshot>>,
    ttl: Option<Duration>,
}

impl QuizStash {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, QuizSnapshot>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, snapshot: &QuizSnapshot, now: DateTime<Utc>) -> bool {
        self.ttl
            .is_some_and(|ttl| now.signed_duration_since(snapshot.stashed_at) >= ttl)
    }

    pub fn stash(&self, key: &str, questions: Vec<QuizQuestion>, words: Vec<String>) {
        let snapshot = QuizSnapshot {
            questions,
            words,
            stashed_at: Utc::now(),
        };
        self.entries().insert(key.to_string(), snapshot);
    }

    pub fn get(&self, key: &str) -> Option<QuizSnapshot> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<QuizSnapshot> {
        let mut entries = self.entries();
        let expired = self.is_expired(entries.get(key)?, now);
        if expired {
            debug!("Dropping expired quiz stash entry");
            entries.remove(key);
            return None;
        }
        entries.get(key).cloned()
    }

    pub fn clear(&self, key: &str) {
        self.entries().remove(key);
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, snapshot| !self.is_expired(snapshot, now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct QuestionResult {
    pub question: String,
    pub options: Vec<QuizOption>,
    pub user_answer: Option<String>,
    pub correct_answer: String,
    /// Text of the correct option, when the label names one that was parsed.
    pub correct_text: Option<String>,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct QuizOutcome {
    pub results: Vec<QuestionResult>,
    pub total_correct: usize,
    pub total_questions: usize,
    pub score_percentage: f64,
}

/// Grades submitted answers. `answers` maps `q0..qN` to the chosen option
/// letter. A question whose correct label is missing can never be answered
/// correctly.
pub fn grade(questions: &[QuizQuestion], answers: &HashMap<String, String>) -> QuizOutcome {
    let results: Vec<QuestionResult> = questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let user_answer = answers
                .get(&format!("q{}", i))
                .map(|answer| answer.trim().to_string())
                .filter(|answer| !answer.is_empty());

            let is_correct = !question.correct.is_empty()
                && user_answer
                    .as_deref()
                    .is_some_and(|answer| answer.eq_ignore_ascii_case(&question.correct));

            QuestionResult {
                question: question.question.clone(),
                options: question.options.clone(),
                user_answer,
                correct_answer: question.correct.clone(),
                correct_text: question
                    .option_text(&question.correct)
                    .filter(|text| !text.is_empty())
                    .map(String::from),
                is_correct,
                explanation: question.explanation.clone(),
            }
        })
        .collect();

    let total_questions = results.len();
    let total_correct = results.iter().filter(|r| r.is_correct).count();

    QuizOutcome {
        results,
        total_correct,
        total_questions,
        score_percentage: score_percentage(total_correct, total_questions),
    }
}

pub fn score_percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}
