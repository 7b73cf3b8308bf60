use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user's batch of words for one day.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Progress {
    pub id: i64,
    pub user_id: i64,
    pub day: i64,
    pub words: Vec<String>,
    pub completed: bool,
    pub date_completed: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbProgress {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub day: Option<i64>,
    pub words: Option<String>,
    pub completed: Option<bool>,
    pub date_completed: Option<NaiveDateTime>,
}

impl From<DbProgress> for Progress {
    fn from(db: DbProgress) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            day: db.day.unwrap_or_default(),
            words: db
                .words
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default(),
            completed: db.completed.unwrap_or_default(),
            date_completed: db
                .date_completed
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)),
        }
    }
}

/// A multiple-choice question as scraped from model output. Fields the model
/// left out stay empty.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<QuizOption>,
    pub correct: String,
    pub explanation: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QuizOption {
    pub label: String,
    pub text: String,
}

pub const OPTION_LABELS: [&str; 4] = ["A", "B", "C", "D"];

impl QuizQuestion {
    pub fn option_text(&self, label: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.label == label)
            .map(|o| o.text.as_str())
    }

    pub(crate) fn set_option(&mut self, label: &str, text: String) {
        if self.options.is_empty() {
            self.options = OPTION_LABELS
                .iter()
                .map(|l| QuizOption {
                    label: l.to_string(),
                    text: String::new(),
                })
                .collect();
        }

        if let Some(option) = self.options.iter_mut().find(|o| o.label == label) {
            option.text = text;
        }
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct Meaning {
    pub order: usize,
    pub definition: String,
    pub example: String,
    /// Base64 image payload, filled in after parsing.
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct WordDetail {
    pub word: String,
    pub meanings: Vec<Meaning>,
}
