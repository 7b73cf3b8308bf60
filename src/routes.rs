use std::collections::HashMap;
use std::sync::Arc;

use rocket::State;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::auth::{User, UserSession};
use crate::config::AppConfig;
use crate::db::{DayCompletion, complete_current_day, get_or_create_progress, get_user_progress};
use crate::error::AppError;
use crate::generator::SharedGenerator;
use crate::lessons::{self, clean_words};
use crate::quiz::{QuizStash, grade};
use crate::words::random_words;

#[get("/")]
pub async fn index(
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Template, AppError> {
    let word_list = config.word_list_path.clone();
    let count = config.words_per_day;

    let progress = get_or_create_progress(db, user.id, user.current_day, || {
        random_words(&word_list, count)
    })
    .await?;

    Ok(Template::render(
        "day",
        context! {
            title: format!("Day {}", progress.day),
            current_user: &user,
            day: progress.day,
            words: &progress.words,
        },
    ))
}

#[get("/learn?<words>")]
pub async fn learn(
    user: User,
    words: Vec<String>,
    generator: &State<SharedGenerator>,
) -> Result<Template, AppError> {
    let words = clean_words(words);

    let mut word_details = Vec::with_capacity(words.len());
    for word in &words {
        word_details.push(lessons::word_detail(generator.inner().as_ref(), word).await?);
    }

    Ok(Template::render(
        "learn",
        context! {
            title: "Learn",
            current_user: &user,
            words: &words,
            word_details: word_details,
        },
    ))
}

#[get("/story?<words>")]
pub async fn story(
    user: User,
    words: Vec<String>,
    generator: &State<SharedGenerator>,
) -> Result<Template, AppError> {
    let words = clean_words(words);
    let story = lessons::story(generator.inner().as_ref(), &words).await?;

    Ok(Template::render(
        "story",
        context! {
            title: "Story",
            current_user: &user,
            story: story,
            words: &words,
        },
    ))
}

#[get("/summary?<words>")]
pub async fn summary(
    user: User,
    session: UserSession,
    words: Vec<String>,
    db: &State<Pool<Sqlite>>,
    generator: &State<SharedGenerator>,
    stash: &State<Arc<QuizStash>>,
) -> Result<Template, AppError> {
    let words = clean_words(words);

    let completion = complete_current_day(db, &user).await?;
    if let DayCompletion::Advanced { day } = completion {
        info!(user_id = user.id, completed_day = day, "Day completed");
    }

    let questions = lessons::quiz_questions(generator.inner().as_ref(), &words).await?;
    let question_count = questions.len();
    stash.stash(&session.token, questions, words.clone());

    Ok(Template::render(
        "summary",
        context! {
            title: "Summary",
            current_user: &user,
            words: &words,
            completion: completion,
            question_count: question_count,
        },
    ))
}

#[get("/quiz")]
pub fn quiz(
    user: User,
    session: UserSession,
    stash: &State<Arc<QuizStash>>,
) -> Result<Template, Redirect> {
    let snapshot = match stash.get(&session.token) {
        Some(snapshot) if !snapshot.questions.is_empty() && !snapshot.words.is_empty() => snapshot,
        _ => {
            info!(user_id = user.id, "No stashed quiz, back to day start");
            return Err(Redirect::to("/"));
        }
    };

    Ok(Template::render(
        "quiz",
        context! {
            title: "Quiz",
            current_user: &user,
            questions: &snapshot.questions,
            words: &snapshot.words,
        },
    ))
}

#[post("/quiz_result", data = "<answers>")]
pub fn quiz_result(
    user: User,
    session: UserSession,
    answers: Form<HashMap<String, String>>,
    stash: &State<Arc<QuizStash>>,
) -> Result<Template, Redirect> {
    let Some(snapshot) = stash
        .get(&session.token)
        .filter(|snapshot| !snapshot.questions.is_empty())
    else {
        info!(user_id = user.id, "Quiz submitted with nothing stashed");
        return Err(Redirect::to("/"));
    };

    let outcome = grade(&snapshot.questions, &answers);
    info!(
        user_id = user.id,
        correct = outcome.total_correct,
        total = outcome.total_questions,
        "Quiz graded"
    );

    Ok(Template::render(
        "quiz_result",
        context! {
            title: "Quiz results",
            current_user: &user,
            results: &outcome.results,
            total_correct: outcome.total_correct,
            total_questions: outcome.total_questions,
            score_percentage: outcome.score_percentage,
        },
    ))
}

#[get("/dashboard")]
pub async fn dashboard(user: User, db: &State<Pool<Sqlite>>) -> Result<Template, AppError> {
    let progress_list = get_user_progress(db, user.id).await?;

    Ok(Template::render(
        "dashboard",
        context! {
            title: "Dashboard",
            current_user: &user,
            progress_list: progress_list,
        },
    ))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
