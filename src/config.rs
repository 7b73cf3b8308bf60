use std::path::{Path, PathBuf};

use rocket::figment::Figment;
use serde::{Deserialize, Serialize};

/// Settings for the vocabulary trainer, read from the Rocket figment
/// (`Rocket.toml` and `ROCKET_*` variables) with a few plain environment
/// overrides layered on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub word_list_path: PathBuf,
    pub words_per_day: usize,
    /// Minutes a stashed quiz stays gradeable. Zero keeps it until overwritten.
    pub quiz_ttl_minutes: i64,
    pub session_hours: i64,
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub text_model: String,
    pub image_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub image_size: u32,
    /// Guidance scale, for image backends that take one. Unset for OpenAI.
    pub cfg_scale: Option<f32>,
    /// Negative prompt, for image backends that take one. Unset for OpenAI.
    pub negative_prompt: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://vocab.db?mode=rwc".to_string(),
            word_list_path: PathBuf::from("a1-words.txt"),
            words_per_day: 2,
            quiz_ttl_minutes: 120,
            session_hours: 24,
            generator: GeneratorConfig::default(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            text_model: "gpt-4o-mini".to_string(),
            image_model: "dall-e-2".to_string(),
            max_tokens: 3000,
            temperature: 0.7,
            top_p: 0.9,
            image_size: 512,
            cfg_scale: None,
            negative_prompt: None,
        }
    }
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self, rocket::figment::Error> {
        let config: AppConfig = figment.extract()?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(url) = non_empty_var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(key) = non_empty_var("GENERATOR_API_KEY") {
            self.generator.api_key = key;
        }
        if let Some(base_url) = non_empty_var("GENERATOR_BASE_URL") {
            self.generator.base_url = base_url;
        }
        self
    }

    pub fn quiz_ttl(&self) -> Option<chrono::Duration> {
        (self.quiz_ttl_minutes > 0).then(|| chrono::Duration::minutes(self.quiz_ttl_minutes))
    }

    pub fn session_duration(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_hours.max(1))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Env files read at startup, in override order, for the given Rocket profile.
pub fn env_files_for_profile(profile: &str) -> Vec<&'static str> {
    match profile {
        "production" | "release" => vec!["config/common.env", "config/prod.env", ".secrets.env"],
        _ => vec!["config/common.env", "config/dev.env", ".secrets.env"],
    }
}

/// Loads whichever env files exist for the active profile and returns the
/// ones that were applied. Runs before tracing is installed, so the caller
/// logs the result.
pub fn load_environment() -> Result<Vec<PathBuf>, dotenvy::Error> {
    let profile = dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

    let mut loaded = Vec::new();
    for file in env_files_for_profile(&profile) {
        let path = Path::new(file);
        if !path.exists() {
            continue;
        }

        dotenvy::from_filename_override(path)?;
        loaded.push(path.to_path_buf());
    }

    Ok(loaded)
}
