use crate::{
    auth::{DbUser, DbUserSession, User, UserSession},
    error::AppError,
    models::{DbProgress, Progress},
};
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

const USER_COLUMNS: &str = "id, username, current_day, created_at";
const PROGRESS_COLUMNS: &str = "id, user_id, day, words, completed, date_completed";

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument(skip_all, fields(username))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    if find_user_by_username(pool, username).await?.is_some() {
        return Err(AppError::Validation(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO users (username, password, current_day) VALUES (?, ?, 1)")
        .bind(username)
        .bind(hashed_password)
        .execute(pool)
        .await;

    match res {
        Ok(res) => Ok(res.last_insert_rowid()),
        // Lost a race with a concurrent signup for the same name.
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(
            AppError::Validation(format!("Username '{}' already exists", username)),
        ),
        Err(err) => Err(err.into()),
    }
}

/// Returns the user when the password matches the stored bcrypt hash.
#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    #[derive(sqlx::FromRow)]
    struct Credentials {
        id: i64,
        password: String,
    }

    let credentials =
        sqlx::query_as::<_, Credentials>("SELECT id, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    let Some(credentials) = credentials else {
        return Ok(None);
    };

    match bcrypt::verify(password, &credentials.password) {
        Ok(true) => Ok(Some(get_user(pool, credentials.id).await?)),
        Ok(false) => Ok(None),
        Err(err) => {
            warn!(error = %err, "Stored password hash could not be verified");
            Ok(None)
        }
    }
}

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[instrument]
pub async fn find_incomplete_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    day: i64,
) -> Result<Option<Progress>, AppError> {
    info!("Looking up open progress");
    let row = sqlx::query_as::<_, DbProgress>(&format!(
        "SELECT {PROGRESS_COLUMNS} FROM user_progress
         WHERE user_id = ? AND day = ? AND completed = 0
         ORDER BY id
         LIMIT 1"
    ))
    .bind(user_id)
    .bind(day)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Progress::from))
}

#[instrument(skip(pool))]
pub async fn create_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    day: i64,
    words: &[String],
) -> Result<Progress, AppError> {
    info!("Creating progress");
    let serialized = serde_json::to_string(words)?;

    let res = sqlx::query("INSERT INTO user_progress (user_id, day, words) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(day)
        .bind(&serialized)
        .execute(pool)
        .await?;

    Ok(Progress {
        id: res.last_insert_rowid(),
        user_id,
        day,
        words: words.to_vec(),
        completed: false,
        date_completed: None,
    })
}

/// Resumes the open progress for `day`, or creates one from `sample` when
/// there is none. `sample` only runs on the create path.
#[instrument(skip(pool, sample))]
pub async fn get_or_create_progress<F>(
    pool: &Pool<Sqlite>,
    user_id: i64,
    day: i64,
    sample: F,
) -> Result<Progress, AppError>
where
    F: FnOnce() -> Result<Vec<String>, AppError>,
{
    if let Some(progress) = find_incomplete_progress(pool, user_id, day).await? {
        return Ok(progress);
    }

    let words = sample()?;
    create_progress(pool, user_id, day, &words).await
}

/// Marks a progress row completed and advances its owner's day counter in
/// one transaction. Returns `false` when the row was already completed (or
/// does not belong to `user_id`), in which case nothing changes.
#[instrument(skip(pool))]
pub async fn complete_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    progress_id: i64,
) -> Result<bool, AppError> {
    info!("Completing progress");
    let now = Utc::now().naive_utc();

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE user_progress
         SET completed = 1, date_completed = ?
         WHERE id = ? AND user_id = ? AND completed = 0",
    )
    .bind(now)
    .bind(progress_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("UPDATE users SET current_day = current_day + 1 WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(true)
}

/// What finishing the current day amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayCompletion {
    /// `day` was open and is now completed; the user moved on to `day + 1`.
    Advanced { day: i64 },
    /// `day` had been completed before; nothing changed.
    AlreadyCompleted { day: i64 },
    /// `day` was never started, so there was nothing to complete.
    NotStarted { day: i64 },
}

/// Completes the user's open progress for their current day, if any.
#[instrument(skip(pool, user), fields(user_id = user.id, day = user.current_day))]
pub async fn complete_current_day(
    pool: &Pool<Sqlite>,
    user: &User,
) -> Result<DayCompletion, AppError> {
    let day = user.current_day;

    if let Some(progress) = find_incomplete_progress(pool, user.id, day).await? {
        return Ok(if complete_progress(pool, user.id, progress.id).await? {
            DayCompletion::Advanced { day }
        } else {
            DayCompletion::AlreadyCompleted { day }
        });
    }

    // Finishing a day moves the counter on, so a repeat lands one day late.
    if day > 1 && has_completed_progress(pool, user.id, day - 1).await? {
        info!("Previous day already completed, day counter unchanged");
        return Ok(DayCompletion::AlreadyCompleted { day: day - 1 });
    }

    info!("Current day not started, day counter unchanged");
    Ok(DayCompletion::NotStarted { day })
}

#[instrument(skip(pool))]
pub async fn has_completed_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    day: i64,
) -> Result<bool, AppError> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM user_progress WHERE user_id = ? AND day = ? AND completed = 1 LIMIT 1",
    )
    .bind(user_id)
    .bind(day)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

#[instrument]
pub async fn get_user_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<Progress>, AppError> {
    info!("Getting all progress for user");
    let rows = sqlx::query_as::<_, DbProgress>(&format!(
        "SELECT {PROGRESS_COLUMNS} FROM user_progress
         WHERE user_id = ?
         ORDER BY day DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Progress::from).collect())
}
