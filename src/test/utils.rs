#[cfg(test)]
pub mod test_db {
    use crate::db::{complete_progress, create_progress, create_user};
    use crate::error::AppError;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;
    use tracing::log::LevelFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub fn init_test_logging() {
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .filter_level(LevelFilter::Debug)
                .is_test(true)
                .try_init();
        });
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        progress: Vec<TestProgress>,
    }

    pub struct TestUser {
        pub username: String,
        pub password: String,
    }

    pub struct TestProgress {
        pub username: String,
        pub day: i64,
        pub words: Vec<String>,
        pub completed: bool,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(self, username: &str) -> Self {
            self.user_with_password(username, STANDARD_PASSWORD)
        }

        pub fn user_with_password(mut self, username: &str, password: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                password: password.to_string(),
            });
            self
        }

        /// Adds a progress row. Completed rows also advance the owner's day,
        /// the same way finishing a day in the app does.
        pub fn progress(mut self, username: &str, day: i64, words: &[&str], completed: bool) -> Self {
            self.progress.push(TestProgress {
                username: username.to_string(),
                day,
                words: words.iter().map(|w| w.to_string()).collect(),
                completed,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            init_test_logging();

            // One long-lived connection: every new connection to
            // `sqlite::memory:` would open a separate, empty database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let user_id = create_user(&pool, &user.username, &user.password).await?;
                user_id_map.insert(user.username.clone(), user_id);
            }

            for entry in &self.progress {
                let user_id = *user_id_map.get(&entry.username).ok_or_else(|| {
                    AppError::NotFound(format!("Test user {} not declared", entry.username))
                })?;

                let progress = create_progress(&pool, user_id, entry.day, &entry.words).await?;
                if entry.completed {
                    complete_progress(&pool, user_id, progress.id).await?;
                }
            }

            Ok(TestDb { pool, user_id_map })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub async fn current_day(&self, username: &str) -> Result<i64, AppError> {
            let id = self
                .user_id(username)
                .ok_or_else(|| AppError::NotFound(username.to_string()))?;
            Ok(crate::db::get_user(&self.pool, id).await?.current_day)
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;

    use super::test_db::{STANDARD_PASSWORD, TestDb, TestDbBuilder};
    use crate::config::AppConfig;
    use crate::error::AppError;
    use crate::generator::{ContentGenerator, SharedGenerator};
    use crate::init_rocket;
    use crate::quiz::QuizStash;

    pub const FAKE_IMAGE: &str = "ZmFrZQ==";

    pub const DEFINITIONS_OUTPUT: &str = "\
1st Most Common Meaning:
A round fruit with red, yellow or green skin.
Example: She eats an apple every morning.

2nd Most Common Meaning:
The tree that this fruit grows on.
Example: There is an old apple in our garden.
";

    pub const QUIZ_OUTPUT: &str = "\
Q: Which word names something you can eat?
A) apple
B) chair
C) window
D) street
Correct: A
Explanation: An apple is a fruit.
---
Q: Where do you usually sleep?
A) in a bus
B) in a bed
C) in a river
D) in a shop
Correct: B
Explanation: People sleep in a bed.
---
Q: What do you read?
A) a cup
B) a horse
C) a book
D) a coat
Correct: C
Explanation: Books are for reading.
---
Q: Which one is a colour?
A) happy
B) cold
C) late
D) red
Correct: D
Explanation: Red is a colour.
";

    pub const STORY_OUTPUT: &str = "  Tom had an apple.\nHe ate it in bed.  ";

    /// Canned generator. Picks its reply from the kind of prompt it gets and
    /// counts calls so tests can check what was requested.
    pub struct FakeGenerator {
        pub definitions: String,
        pub quiz: String,
        pub story: String,
        pub fail: bool,
        pub text_calls: AtomicUsize,
        pub image_calls: AtomicUsize,
    }

    impl Default for FakeGenerator {
        fn default() -> Self {
            Self {
                definitions: DEFINITIONS_OUTPUT.to_string(),
                quiz: QUIZ_OUTPUT.to_string(),
                story: STORY_OUTPUT.to_string(),
                fail: false,
                text_calls: AtomicUsize::new(0),
                image_calls: AtomicUsize::new(0),
            }
        }
    }

    impl FakeGenerator {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn with_quiz(quiz: &str) -> Self {
            Self {
                quiz: quiz.to_string(),
                ..Self::default()
            }
        }

        pub fn text_calls(&self) -> usize {
            self.text_calls.load(Ordering::SeqCst)
        }

        pub fn image_calls(&self) -> usize {
            self.image_calls.load(Ordering::SeqCst)
        }
    }

    #[rocket::async_trait]
    impl ContentGenerator for FakeGenerator {
        async fn generate_text(&self, prompt: &str) -> Result<String, AppError> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::ExternalService("fake generator is down".into()));
            }

            let reply = if prompt.contains("most commonly used meanings") {
                &self.definitions
            } else if prompt.contains("multiple choice questions") {
                &self.quiz
            } else {
                &self.story
            };
            Ok(reply.clone())
        }

        async fn generate_image(&self, _prompt: &str) -> Result<String, AppError> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::ExternalService("fake generator is down".into()));
            }
            Ok(FAKE_IMAGE.to_string())
        }
    }

    /// Writes `words` to a temporary word list and returns its handle; the
    /// file lives as long as the handle.
    pub fn word_list_file(words: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create word list");
        for word in words {
            writeln!(file, "{}", word).expect("Failed to write word list");
        }
        file
    }

    pub struct TestApp {
        pub client: Client,
        pub db: TestDb,
        pub generator: Arc<FakeGenerator>,
        pub stash: Arc<QuizStash>,
        _word_list: tempfile::NamedTempFile,
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user("alice")
            .user("bob")
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn setup_test_client(db: TestDb) -> TestApp {
        setup_test_client_with(db, FakeGenerator::default()).await
    }

    pub async fn setup_test_client_with(db: TestDb, generator: FakeGenerator) -> TestApp {
        let word_list = word_list_file(&["apple", "bed", "book", "red", "tree", "milk"]);

        let config = AppConfig {
            word_list_path: word_list.path().to_path_buf(),
            ..AppConfig::default()
        };

        let generator = Arc::new(generator);
        let shared: SharedGenerator = generator.clone();
        let stash = Arc::new(QuizStash::new(config.quiz_ttl()));

        let rocket = init_rocket(db.pool.clone(), shared, stash.clone(), config);
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        TestApp {
            client,
            db,
            generator,
            stash,
            _word_list: word_list,
        }
    }

    /// Logs in through the form and returns the cookies the client now
    /// carries. The tracked client keeps them for later requests too.
    pub async fn login_test_user(client: &Client, username: &str) -> Vec<Cookie<'static>> {
        let response = client
            .post("/login")
            .header(ContentType::Form)
            .body(format!("username={}&password={}", username, STANDARD_PASSWORD))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/"));

        response.cookies().iter().map(|c| c.clone().into_owned()).collect()
    }
}
