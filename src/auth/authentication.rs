use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::db::{get_session_by_token, get_user};
use crate::validation::{ToValidationResponse, ValidationResponse};

use super::{User, UserSession};

pub const SESSION_COOKIE: &str = "session_token";

enum SessionLookup {
    Missing,
    Rejected,
    Failed,
    Found(UserSession),
}

async fn lookup_session(request: &Request<'_>) -> SessionLookup {
    let token = match request.cookies().get_private(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => return SessionLookup::Missing,
    };

    let db = match request.rocket().state::<SqlitePool>() {
        Some(pool) => pool,
        None => {
            tracing::error!("Database pool not found in managed state");
            return SessionLookup::Failed;
        }
    };

    match get_session_by_token(db, &token).await {
        Ok(session) if session.is_valid() => SessionLookup::Found(session),
        Ok(_) => {
            tracing::warn!("Session token expired");
            SessionLookup::Rejected
        }
        Err(err) => {
            tracing::warn!(error = ?err, "Invalid session token");
            SessionLookup::Rejected
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserSession {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Cached so that a handler taking both `User` and `UserSession` hits
        // the sessions table once.
        match request.local_cache_async(lookup_session(request)).await {
            SessionLookup::Found(session) => Outcome::Success(session.clone()),
            SessionLookup::Missing | SessionLookup::Rejected => {
                Outcome::Error((Status::Unauthorized, ()))
            }
            SessionLookup::Failed => Outcome::Error((Status::InternalServerError, ())),
        }
    }
}

async fn authenticate(request: &Request<'_>) -> Outcome<User, ()> {
    let session = match request.guard::<UserSession>().await {
        Outcome::Success(session) => session,
        Outcome::Error(e) => return Outcome::Error(e),
        Outcome::Forward(status) => return Outcome::Forward(status),
    };

    let db = match request.rocket().state::<SqlitePool>() {
        Some(pool) => pool,
        None => return Outcome::Error((Status::InternalServerError, ())),
    };

    match get_user(db, session.user_id).await {
        Ok(user) => {
            tracing::debug!(username = %user.username, role = %user.role, "User authenticated via session token");
            Outcome::Success(user)
        }
        Err(err) => {
            tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch user for valid session");
            Outcome::Error((Status::Unauthorized, ()))
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

#[catch(400)]
pub fn bad_request_api(_req: &Request) -> Custom<Json<ValidationResponse>> {
    Status::BadRequest.to_validation_response()
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<ValidationResponse>> {
    Status::Unauthorized.to_validation_response()
}

#[catch(403)]
pub fn forbidden_api(req: &Request) -> Custom<Json<ValidationResponse>> {
    tracing::warn!(uri = %req.uri(), "Forbidden access attempt");
    Status::Forbidden.to_validation_response()
}

#[catch(404)]
pub fn not_found_api(_req: &Request) -> Custom<Json<ValidationResponse>> {
    Status::NotFound.to_validation_response()
}

#[catch(422)]
pub fn unprocessable_api(_req: &Request) -> Custom<Json<ValidationResponse>> {
    Status::UnprocessableEntity.to_validation_response()
}
