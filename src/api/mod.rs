mod auth;
mod catalog;
mod dashboard;
mod students;

pub use auth::*;
pub use catalog::*;
pub use dashboard::*;
pub use students::*;

use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::db::{find_classroom, find_cycle, find_school, user_exists};
use crate::validation::{AppErrorExt, ValidationResponse, ValidationResult};

pub(crate) fn invalid_choice(field: &str) -> Custom<Json<ValidationResponse>> {
    ValidationResponse::field(
        Status::UnprocessableEntity,
        field,
        "Select a valid choice. That choice is not one of the available choices.",
    )
}

pub(crate) async fn ensure_school(db: &Pool<Sqlite>, school_id: i64) -> ValidationResult<()> {
    match find_school(db, school_id).await.validate_custom()? {
        Some(_) => Ok(()),
        None => Err(invalid_choice("school_id")),
    }
}

pub(crate) async fn ensure_cycle(db: &Pool<Sqlite>, cycle_id: Option<i64>) -> ValidationResult<()> {
    let Some(cycle_id) = cycle_id else {
        return Ok(());
    };
    match find_cycle(db, cycle_id).await.validate_custom()? {
        Some(_) => Ok(()),
        None => Err(invalid_choice("cycle_id")),
    }
}

pub(crate) async fn ensure_teacher(db: &Pool<Sqlite>, user_id: Option<i64>) -> ValidationResult<()> {
    let Some(user_id) = user_id else {
        return Ok(());
    };
    if user_exists(db, user_id).await.validate_custom()? {
        Ok(())
    } else {
        Err(invalid_choice("main_teacher_id"))
    }
}

pub(crate) async fn ensure_classroom(
    db: &Pool<Sqlite>,
    classroom_id: Option<i64>,
) -> ValidationResult<()> {
    let Some(classroom_id) = classroom_id else {
        return Ok(());
    };
    match find_classroom(db, classroom_id).await.validate_custom()? {
        Some(_) => Ok(()),
        None => Err(invalid_choice("classroom_id")),
    }
}
