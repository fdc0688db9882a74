use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, Role, User};
use crate::error::AppError;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

const USER_SELECT: &str = "SELECT u.id, u.username, u.display_name, p.role, p.phone
     FROM users u
     LEFT JOIN profiles p ON p.user_id = u.id";

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!("{} WHERE u.id = ?", USER_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(user) => User::try_from(user),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(&format!("{} WHERE u.username = ?", USER_SELECT))
        .bind(username)
        .fetch_optional(pool)
        .await?;

    row.map(User::try_from).transpose()
}

#[instrument(skip(pool))]
pub async fn get_all_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, AppError> {
    info!("Getting all users");
    let rows = sqlx::query_as::<_, DbUser>(&format!("{} ORDER BY u.username", USER_SELECT))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(User::try_from).collect()
}

/// Checks the password and returns the matching user.
#[instrument(skip_all, fields(username = %username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let row: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((id, hash)) => match bcrypt::verify(password, &hash) {
            Ok(true) => Ok(Some(get_user(pool, id).await?)),
            _ => Ok(None),
        },
        None => Ok(None),
    }
}

/// Creates the account and its profile together.
#[instrument(skip_all, fields(username = %username, role = %role))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    role: Role,
    display_name: Option<&str>,
    phone: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating new user");

    if find_user_by_username(pool, username).await?.is_some() {
        return Err(AppError::Duplicate {
            field: "username",
            message: format!("Username '{}' already exists", username),
        });
    }

    let hashed_password = bcrypt::hash(password, HASH_COST)?;

    let mut tx = pool.begin().await?;

    let res = sqlx::query("INSERT INTO users (username, password, display_name) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hashed_password)
        .bind(display_name.unwrap_or(username))
        .execute(&mut *tx)
        .await?;
    let user_id = res.last_insert_rowid();

    sqlx::query("INSERT INTO profiles (user_id, role, phone) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(role.as_str())
        .bind(phone.unwrap_or_default())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(user_id)
}

#[instrument(skip(pool))]
pub async fn user_exists(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Creates an ADMIN account unless the username is already taken. Returns
/// whether an account was created.
#[instrument(skip_all, fields(username = %username))]
pub async fn ensure_admin_account(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<bool, AppError> {
    if find_user_by_username(pool, username).await?.is_some() {
        return Ok(false);
    }

    create_user(pool, username, password, Role::Admin, None, None).await?;
    info!("Bootstrap admin account created");
    Ok(true)
}
