//! Content for each step of a day, assembled from generator calls. Calls are
//! made one after another; nothing here is cached.

use tracing::{instrument, warn};

use crate::error::AppError;
use crate::generator::ContentGenerator;
use crate::models::{QuizQuestion, WordDetail};
use crate::{parser, prompts};

/// Definitions for `word` plus one image per meaning.
#[instrument(skip(generator))]
pub async fn word_detail(
    generator: &dyn ContentGenerator,
    word: &str,
) -> Result<WordDetail, AppError> {
    let raw = generator
        .generate_text(&prompts::definition_prompt(word))
        .await?;

    let mut meanings = parser::parse_definitions(&raw).unwrap_or_else(|err| {
        warn!(error = %err, "Definition output could not be parsed");
        Vec::new()
    });

    for meaning in &mut meanings {
        let scene = if meaning.example.is_empty() {
            &meaning.definition
        } else {
            &meaning.example
        };
        if scene.is_empty() {
            continue;
        }

        let prompt = prompts::image_prompt(word, scene);
        meaning.image = Some(generator.generate_image(&prompt).await?);
    }

    Ok(WordDetail {
        word: word.to_string(),
        meanings,
    })
}

#[instrument(skip(generator))]
pub async fn story(generator: &dyn ContentGenerator, words: &[String]) -> Result<String, AppError> {
    let text = generator.generate_text(&prompts::story_prompt(words)).await?;
    Ok(text.trim().to_string())
}

#[instrument(skip(generator))]
pub async fn quiz_questions(
    generator: &dyn ContentGenerator,
    words: &[String],
) -> Result<Vec<QuizQuestion>, AppError> {
    let raw = generator.generate_text(&prompts::quiz_prompt(words)).await?;

    Ok(parser::parse_quiz(&raw).unwrap_or_else(|err| {
        warn!(error = %err, "Quiz output could not be parsed");
        Vec::new()
    }))
}

/// Trims the `words` query values and drops empty ones.
pub fn clean_words(words: Vec<String>) -> Vec<String> {
    words
        .into_iter()
        .map(|word| word.trim().to_string())
        .filter(|word| !word.is_empty())
        .collect()
}
