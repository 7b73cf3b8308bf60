#[cfg(test)]
mod tests {
    use crate::{
        auth::UserSession,
        db::{
            clean_expired_sessions, create_user_session, get_session_by_token, invalidate_session,
        },
        error::AppError,
        test::test_db::TestDbBuilder,
    };
    use chrono::{Duration, NaiveDateTime, Utc};
    use rocket::tokio;
    use sqlx::{Pool, Sqlite};

    async fn create_test_session() -> (i64, String, NaiveDateTime, Pool<Sqlite>) {
        let test_db = TestDbBuilder::new()
            .user("session_user")
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("session_user").expect("User not found");
        let token = UserSession::generate_token();
        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();

        (user_id, token, expires_at, test_db.pool)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (user_id, token, expires_at, pool) = create_test_session().await;

        let session_id = create_user_session(&pool, user_id, &token, expires_at)
            .await
            .expect("Failed to create session");
        assert!(session_id > 0);

        let session = get_session_by_token(&pool, &token)
            .await
            .expect("Failed to get session");

        assert_eq!(session.user_id, user_id);
        assert_eq!(session.token, token);
        assert!(session.is_valid());

        let expires_diff =
            (session.expires_at.and_utc().timestamp() - expires_at.and_utc().timestamp()).abs();
        assert!(expires_diff <= 1);
    }

    #[tokio::test]
    async fn test_get_nonexistent_session() {
        let (_, _, _, pool) = create_test_session().await;

        match get_session_by_token(&pool, "nonexistent_token").await {
            Err(AppError::Authentication(msg)) => assert_eq!(msg, "Invalid session token"),
            other => panic!("Expected Authentication error, got {:?}", other.map(|s| s.id)),
        }
    }

    #[tokio::test]
    async fn test_invalidate_session() {
        let (user_id, token, expires_at, pool) = create_test_session().await;

        create_user_session(&pool, user_id, &token, expires_at)
            .await
            .unwrap();
        invalidate_session(&pool, &token).await.unwrap();

        assert!(get_session_by_token(&pool, &token).await.is_err());
    }

    #[tokio::test]
    async fn test_clean_expired_sessions() {
        let (user_id, token, expires_at, pool) = create_test_session().await;

        create_user_session(&pool, user_id, &token, expires_at)
            .await
            .unwrap();

        let stale = UserSession::generate_token();
        let past = (Utc::now() - Duration::hours(1)).naive_utc();
        create_user_session(&pool, user_id, &stale, past)
            .await
            .unwrap();

        let expired = get_session_by_token(&pool, &stale).await.unwrap();
        assert!(!expired.is_valid());

        let removed = clean_expired_sessions(&pool).await.unwrap();
        assert_eq!(removed, 1);

        assert!(get_session_by_token(&pool, &token).await.is_ok());
        assert!(get_session_by_token(&pool, &stale).await.is_err());
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = UserSession::generate_token();
        let b = UserSession::generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
