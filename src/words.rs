use std::collections::HashSet;
use std::path::Path;

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, instrument};

use crate::error::AppError;

/// Reads a newline-delimited word list. Blank lines, surrounding whitespace
/// and repeated entries are dropped.
pub fn load_word_list(path: &Path) -> Result<Vec<String>, AppError> {
    let contents = std::fs::read_to_string(path).map_err(|err| {
        AppError::WordList(format!("Could not read {}: {}", path.display(), err))
    })?;

    let mut seen = HashSet::new();
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && seen.insert(*line))
        .map(String::from)
        .collect())
}

/// Draws `count` distinct entries from `words`, uniformly and without
/// replacement.
pub fn sample_words<R>(words: &[String], count: usize, rng: &mut R) -> Result<Vec<String>, AppError>
where
    R: Rng + ?Sized,
{
    if count > words.len() {
        return Err(AppError::WordList(format!(
            "Requested {} words but the list only has {}",
            count,
            words.len()
        )));
    }

    Ok(words.choose_multiple(rng, count).cloned().collect())
}

/// Loads the list from disk and samples a fresh batch for a new day.
#[instrument]
pub fn random_words(path: &Path, count: usize) -> Result<Vec<String>, AppError> {
    let words = load_word_list(path)?;
    let picked = sample_words(&words, count, &mut rand::rng())?;
    debug!(available = words.len(), ?picked, "Sampled words for new day");
    Ok(picked)
}
