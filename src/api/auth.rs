use chrono::Utc;
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, Resource, Role, SESSION_COOKIE, User, UserSession};
use crate::config::Settings;
use crate::db::{
    authenticate_user, create_user, create_user_session, get_all_users, get_user,
    invalidate_session,
};
use crate::validation::{
    AppErrorExt, JsonBody, JsonValidateExt, ValidationResponse, ValidationResult,
    validate_phone,
};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub role_label: String,
    pub phone: String,
    pub permissions: Vec<String>,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        let permissions = user.permission_codenames();
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            role_label: user.role.label().to_string(),
            role: user.role,
            phone: user.phone,
            permissions,
        }
    }
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    settings: &State<Settings>,
) -> ValidationResult<Json<LoginResponse>> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let token = UserSession::generate_token();
            let ttl = settings.session_ttl();
            let expires_at = Utc::now() + ttl;

            create_user_session(db, user.id, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            let cookie = Cookie::build((SESSION_COOKIE, token))
                .same_site(SameSite::Lax)
                .http_only(true)
                .max_age(rocket::time::Duration::seconds(ttl.num_seconds()));
            cookies.add_private(cookie);

            tracing::info!(username = %user.username, "User logged in");

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
            }))
        }
        None => {
            tracing::warn!(username = %validated.username, "Failed login attempt");
            Ok(Json(LoginResponse {
                success: false,
                user: None,
                error: Some("Invalid username or password".to_string()),
            }))
        }
    }
}

/// Deleting the session row also forgets the active context.
#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Status {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(err) = invalidate_session(db, &token).await {
            err.log_and_record("Logout");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Status::NoContent
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[derive(Deserialize, Validate, Clone)]
pub struct UserRegistrationRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1 to 150 characters"))]
    username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    display_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    #[validate(length(max = 50), custom(function = "validate_phone"))]
    phone: Option<String>,
}

#[post("/users", data = "<registration>")]
pub async fn api_register_user(
    registration: JsonBody<'_, UserRegistrationRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Custom<Json<UserData>>> {
    user.require_permission(Permission::add(Resource::User))
        .validate_custom()?;

    let validated = registration.validate_custom()?;

    let role = match validated.role.as_deref() {
        Some(role) => role.parse::<Role>().map_err(|_| {
            ValidationResponse::field(
                Status::UnprocessableEntity,
                "role",
                &format!("Unknown role '{}'", role),
            )
        })?,
        None => Role::default(),
    };

    let id = create_user(
        db,
        validated.username.trim(),
        &validated.password,
        role,
        validated.display_name.as_deref(),
        validated.phone.as_deref(),
    )
    .await
    .validate_custom()?;

    let created = get_user(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(UserData::from(created))))
}

#[get("/users")]
pub async fn api_get_all_users(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Vec<UserData>>> {
    user.require_permission(Permission::view(Resource::User))
        .validate_custom()?;

    let users = get_all_users(db).await.validate_custom()?;

    Ok(Json(users.into_iter().map(UserData::from).collect()))
}
