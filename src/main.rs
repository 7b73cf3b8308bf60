#[macro_use]
extern crate rocket;

mod auth;
mod config;
mod db;
mod error;
mod generator;
mod lessons;
mod models;
mod parser;
mod prompts;
mod quiz;
mod routes;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;
mod words;

use std::sync::Arc;
use std::time::Duration;

use auth::{logout, process_login, process_signup, unauthorized};
use config::AppConfig;
use db::clean_expired_sessions;
use generator::{HttpGenerator, SharedGenerator};
use quiz::QuizStash;
use rocket::{Build, Rocket, tokio};
use rocket_dyn_templates::Template;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Figment(#[from] rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Launch failed: {0}")]
    Launch(String),
}

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
const QUIZ_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

fn spawn_maintenance(pool: SqlitePool, stash: Arc<QuizStash>) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) if count > 0 => info!("Cleaned up {} expired sessions", count),
                Ok(_) => {}
                Err(e) => error!("Failed to clean expired sessions: {}", e),
            }

            tokio::time::sleep(SESSION_SWEEP_INTERVAL).await;
        }
    });

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(QUIZ_SWEEP_INTERVAL).await;

            let purged = stash.purge_expired();
            if purged > 0 {
                info!("Evicted {} expired quiz stash entries", purged);
            }
        }
    });
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let loaded_env = config::load_environment();
    let _telemetry = init_tracing();

    match loaded_env {
        Ok(files) => {
            for file in files {
                info!(file = %file.display(), "Loaded environment file");
            }
        }
        Err(e) => warn!("Failed to load environment files: {}", e),
    }

    let config = AppConfig::from_figment(&rocket::Config::figment())?;

    let pool = SqlitePoolOptions::new()
        .connect(&config.database_url)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed successfully");

    if config.generator.api_key.is_empty() {
        warn!("GENERATOR_API_KEY is not set; generation requests will be rejected upstream");
    }

    let stash = Arc::new(QuizStash::new(config.quiz_ttl()));
    spawn_maintenance(pool.clone(), stash.clone());

    let generator: SharedGenerator = Arc::new(HttpGenerator::new(config.generator.clone()));

    if let Err(e) = init_rocket(pool, generator, stash, config).launch().await {
        error!("Rocket failed: {}", e);
        return Err(Error::Launch(e.to_string()));
    }

    Ok(())
}

/// Builds the app around explicitly constructed services, so tests can hand
/// in an in-memory pool and a fake generator.
pub fn init_rocket(
    pool: SqlitePool,
    generator: SharedGenerator,
    stash: Arc<QuizStash>,
    config: AppConfig,
) -> Rocket<Build> {
    info!(
        words_per_day = config.words_per_day,
        word_list = %config.word_list_path.display(),
        "Starting vocabulary trainer"
    );

    rocket::build()
        .manage(pool)
        .manage(generator)
        .manage(stash)
        .manage(config)
        .mount(
            "/",
            routes![
                routes::index,
                routes::learn,
                routes::story,
                routes::summary,
                routes::quiz,
                routes::quiz_result,
                routes::dashboard,
                routes::health,
                auth::login,
                process_login,
                auth::signup,
                process_signup,
                logout,
            ],
        )
        .register("/", catchers![unauthorized])
        .attach(Template::fairing())
        .attach(TelemetryFairing)
}
