use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUserSession, UserSession};
use crate::error::AppError;

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
pub async fn get_session_by_token(pool: &Pool<Sqlite>, token: &str) -> Result<UserSession, AppError> {
    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at,
                active_school_id, active_school_year_id, active_classroom_id
         FROM user_sessions WHERE token = ?",
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

#[instrument(skip(pool))]
pub async fn set_active_school(
    pool: &Pool<Sqlite>,
    session_id: i64,
    school_id: Option<i64>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE user_sessions SET active_school_id = ? WHERE id = ?")
        .bind(school_id)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stores the year together with the school owning it.
#[instrument(skip(pool))]
pub async fn set_active_school_year(
    pool: &Pool<Sqlite>,
    session_id: i64,
    school_year_id: i64,
    school_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE user_sessions
         SET active_school_year_id = ?, active_school_id = ?
         WHERE id = ?",
    )
    .bind(school_year_id)
    .bind(school_id)
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn set_active_classroom(
    pool: &Pool<Sqlite>,
    session_id: i64,
    classroom_id: Option<i64>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE user_sessions SET active_classroom_id = ? WHERE id = ?")
        .bind(classroom_id)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn clear_active_school_year(pool: &Pool<Sqlite>, session_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE user_sessions SET active_school_year_id = NULL WHERE id = ?")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}
