use chrono::Utc;
use rocket::State;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use validator::Validate;

use crate::config::AppConfig;
use crate::db::{self, create_user_session, invalidate_session};
use crate::error::AppError;
use crate::quiz::QuizStash;
use crate::validation::{AppErrorExt, FormValidateExt};

use super::{SESSION_COOKIE, UserSession};

/// What a form submission can come back with.
#[derive(Responder)]
pub enum FormResponse {
    Redirect(Redirect),
    Flash(Flash<Redirect>),
    Failed(AppError),
}

impl From<AppError> for FormResponse {
    fn from(err: AppError) -> Self {
        FormResponse::Failed(err)
    }
}

impl From<Flash<Redirect>> for FormResponse {
    fn from(flash: Flash<Redirect>) -> Self {
        FormResponse::Flash(flash)
    }
}

#[derive(FromForm, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(FromForm, Validate)]
pub struct SignupForm {
    #[validate(length(
        min = 3,
        max = 80,
        message = "Username must be between 3 and 80 characters"
    ))]
    username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: String,
}

async fn start_session(
    db: &Pool<Sqlite>,
    cookies: &CookieJar<'_>,
    config: &AppConfig,
    user_id: i64,
) -> Result<(), AppError> {
    let token = UserSession::generate_token();
    let lifetime = config.session_duration();
    let expires_at = Utc::now() + lifetime;

    create_user_session(db, user_id, &token, expires_at.naive_utc()).await?;

    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::seconds(lifetime.num_seconds())),
    );

    Ok(())
}

#[get("/login")]
pub fn login(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render(
        "login",
        context! {
            title: "Log in",
            error: flash.map(|f| f.message().to_string()),
            current_route: "login",
        },
    )
}

#[post("/login", data = "<form>")]
pub async fn process_login(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> FormResponse {
    if let Err(flash) = form.validate_or_flash("/login") {
        return flash.into();
    }

    tracing::info!(username = %form.username, "Login attempt");

    match db::authenticate_user(db, &form.username, &form.password).await {
        Ok(Some(user)) => {
            if let Err(err) = start_session(db, cookies, config, user.id).await {
                return err.into();
            }
            tracing::info!(username = %user.username, "Authentication successful");
            FormResponse::Redirect(Redirect::to("/"))
        }
        Ok(None) => Flash::error(Redirect::to("/login"), "Invalid username or password").into(),
        Err(err) => err.into(),
    }
}

#[get("/signup")]
pub fn signup(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render(
        "signup",
        context! {
            title: "Sign up",
            error: flash.map(|f| f.message().to_string()),
            current_route: "signup",
        },
    )
}

#[post("/signup", data = "<form>")]
pub async fn process_signup(
    form: Form<SignupForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> FormResponse {
    if let Err(flash) = form.validate_or_flash("/signup") {
        return flash.into();
    }

    let created = db::create_user(db, &form.username, &form.password)
        .await
        .map_err(|err| match err {
            AppError::Validation(_) => {
                AppError::Validation("This username is already taken".to_string())
            }
            other => other,
        })
        .flash_validation("/signup");

    let user_id = match created {
        Ok(Ok(user_id)) => user_id,
        Ok(Err(flash)) => return flash.into(),
        Err(err) => return err.into(),
    };

    tracing::info!(username = %form.username, user_id, "Signed up new user");

    match start_session(db, cookies, config, user_id).await {
        Ok(()) => FormResponse::Redirect(Redirect::to("/")),
        Err(err) => err.into(),
    }
}

#[get("/logout")]
pub async fn logout(
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    stash: &State<Arc<QuizStash>>,
) -> Redirect {
    if let Some(token) = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
    {
        if let Err(err) = invalidate_session(db, &token).await {
            err.log_and_record("Invalidating session on logout");
        }
        stash.clear(&token);
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));
    Redirect::to("/login")
}
