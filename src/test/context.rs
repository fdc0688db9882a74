#[cfg(test)]
mod tests {
    use crate::auth::UserSession;
    use crate::context::{
        resolve_active_context, switch_classroom, switch_school, switch_school_year,
    };
    use crate::db::{create_user_session, get_session_by_token};
    use crate::error::AppError;
    use crate::test::test_db::{TestDb, TestDbBuilder, date};

    use chrono::{Duration, Utc};
    use rocket::tokio;

    const TOKEN: &str = "context-session-token";

    async fn context_db() -> (TestDb, UserSession) {
        let test_db = TestDbBuilder::new()
            .direction("direction_user", None)
            .school("Lycée Alpha")
            .school("École Beta")
            .school_year("Lycée Alpha", "2024-2025", date(2024, 10, 1), true)
            .school_year("École Beta", "2024-2025 B", date(2024, 10, 1), true)
            .classroom("Lycée Alpha", "10ème A", None)
            .classroom("École Beta", "1ère Année", None)
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("direction_user").expect("User not found");
        create_user_session(
            &test_db.pool,
            user_id,
            TOKEN,
            (Utc::now() + Duration::hours(1)).naive_utc(),
        )
        .await
        .expect("Failed to create session");

        let session = reload(&test_db).await;
        (test_db, session)
    }

    async fn reload(test_db: &TestDb) -> UserSession {
        get_session_by_token(&test_db.pool, TOKEN)
            .await
            .expect("Session should exist")
    }

    #[tokio::test]
    async fn test_lowest_school_is_used_and_remembered() {
        let (test_db, session) = context_db().await;
        let alpha = test_db.school_id("Lycée Alpha");

        let context = resolve_active_context(&test_db.pool, &session).await.unwrap();

        assert_eq!(context.school_id(), Some(alpha));
        assert!(context.school_year.is_none());
        assert!(context.classroom.is_none());
        assert_eq!(reload(&test_db).await.context.active_school_id, Some(alpha));
    }

    #[tokio::test]
    async fn test_no_school_means_empty_context() {
        let test_db = TestDbBuilder::new()
            .admin("admin_user", None)
            .build()
            .await
            .unwrap();
        let user_id = test_db.user_id("admin_user").unwrap();
        create_user_session(
            &test_db.pool,
            user_id,
            TOKEN,
            (Utc::now() + Duration::hours(1)).naive_utc(),
        )
        .await
        .unwrap();

        let session = reload(&test_db).await;
        let context = resolve_active_context(&test_db.pool, &session).await.unwrap();

        assert!(context.school.is_none());
        assert_eq!(reload(&test_db).await.context.active_school_id, None);
    }

    #[tokio::test]
    async fn test_switching_year_switches_its_school() {
        let (test_db, session) = context_db().await;
        let beta = test_db.school_id("École Beta");
        let beta_year = test_db.school_year_id("2024-2025 B");

        switch_school(&test_db.pool, &session, test_db.school_id("Lycée Alpha"))
            .await
            .unwrap();

        let year = switch_school_year(&test_db.pool, &reload(&test_db).await, beta_year)
            .await
            .unwrap();
        assert_eq!(year.school_id, beta);

        let context = resolve_active_context(&test_db.pool, &reload(&test_db).await)
            .await
            .unwrap();
        assert_eq!(context.school_id(), Some(beta));
        assert_eq!(context.school_year.map(|y| y.id), Some(beta_year));
    }

    #[tokio::test]
    async fn test_switching_school_drops_stale_year_and_classroom() {
        let (test_db, session) = context_db().await;

        switch_school_year(&test_db.pool, &session, test_db.school_year_id("2024-2025"))
            .await
            .unwrap();
        switch_classroom(&test_db.pool, &reload(&test_db).await, test_db.classroom_id("10ème A"))
            .await
            .unwrap();

        switch_school(&test_db.pool, &reload(&test_db).await, test_db.school_id("École Beta"))
            .await
            .unwrap();

        let stored = reload(&test_db).await.context;
        assert_eq!(stored.active_school_id, Some(test_db.school_id("École Beta")));
        assert_eq!(stored.active_school_year_id, None);
        assert_eq!(stored.active_classroom_id, None);
    }

    #[tokio::test]
    async fn test_switching_year_to_another_school_drops_classroom() {
        let (test_db, session) = context_db().await;
        let alpha_classroom = test_db.classroom_id("10ème A");

        switch_classroom(&test_db.pool, &session, alpha_classroom).await.unwrap();
        switch_school_year(
            &test_db.pool,
            &reload(&test_db).await,
            test_db.school_year_id("2024-2025"),
        )
        .await
        .unwrap();
        assert_eq!(
            reload(&test_db).await.context.active_classroom_id,
            Some(alpha_classroom)
        );

        switch_school_year(
            &test_db.pool,
            &reload(&test_db).await,
            test_db.school_year_id("2024-2025 B"),
        )
        .await
        .unwrap();

        let stored = reload(&test_db).await.context;
        assert_eq!(stored.active_school_id, Some(test_db.school_id("École Beta")));
        assert_eq!(stored.active_classroom_id, None);

        let context = resolve_active_context(&test_db.pool, &reload(&test_db).await)
            .await
            .unwrap();
        assert!(context.classroom.is_none());
    }

    #[tokio::test]
    async fn test_switching_to_same_school_keeps_year() {
        let (test_db, session) = context_db().await;
        let year_id = test_db.school_year_id("2024-2025");

        switch_school_year(&test_db.pool, &session, year_id).await.unwrap();
        switch_school(&test_db.pool, &reload(&test_db).await, test_db.school_id("Lycée Alpha"))
            .await
            .unwrap();

        assert_eq!(reload(&test_db).await.context.active_school_year_id, Some(year_id));
    }

    #[tokio::test]
    async fn test_switching_to_unknown_records() {
        let (test_db, session) = context_db().await;

        assert!(matches!(
            switch_school(&test_db.pool, &session, 9999).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            switch_school_year(&test_db.pool, &session, 9999).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            switch_classroom(&test_db.pool, &session, 9999).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(reload(&test_db).await.context.active_school_id, None);
    }
}
