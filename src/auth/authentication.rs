use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::Redirect;
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::db::{get_session_by_token, get_user};

use super::{User, UserSession};

pub const SESSION_COOKIE: &str = "session_token";

#[derive(Clone)]
struct Authenticated {
    session: UserSession,
    user: User,
}

/// Resolves the session cookie once per request; both guards below read the
/// cached result.
async fn authenticate(request: &Request<'_>) -> Result<Authenticated, Status> {
    let token = request
        .cookies()
        .get_private(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(Status::Unauthorized)?;

    let Some(db) = request.rocket().state::<SqlitePool>() else {
        tracing::error!("Database pool not found in managed state");
        return Err(Status::InternalServerError);
    };

    let session = match get_session_by_token(db, &token).await {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(error = ?err, "Invalid session token");
            return Err(Status::Unauthorized);
        }
    };

    if !session.is_valid() {
        tracing::warn!(session_id = session.id, "Session token expired");
        return Err(Status::Unauthorized);
    }

    match get_user(db, session.user_id).await {
        Ok(user) => {
            tracing::info!(username = %user.username, day = user.current_day, "User authenticated via session token");
            Ok(Authenticated { session, user })
        }
        Err(err) => {
            tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch user for valid session");
            Err(Status::InternalServerError)
        }
    }
}

async fn cached_authentication<'r>(request: &'r Request<'_>) -> &'r Result<Authenticated, Status> {
    request
        .local_cache_async(authenticate(request).instrument(tracing::info_span!("user_auth_guard")))
        .await
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match cached_authentication(request).await {
            Ok(auth) => Outcome::Success(auth.user.clone()),
            Err(status) => Outcome::Error((*status, ())),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserSession {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match cached_authentication(request).await {
            Ok(auth) => Outcome::Success(auth.session.clone()),
            Err(status) => Outcome::Error((*status, ())),
        }
    }
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Redirect {
    tracing::warn!("Unauthorized access attempt");
    Redirect::to("/login")
}
