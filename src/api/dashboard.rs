use rocket::State;
use rocket::serde::{Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::auth::{User, UserSession};
use crate::context::{
    ActiveContext, resolve_active_context, switch_classroom, switch_school, switch_school_year,
};
use crate::db::{classroom_head_counts, get_session_by_token};
use crate::models::ClassroomHeadCount;
use crate::validation::{AppErrorExt, ValidationResult};

async fn reload_context(
    db: &Pool<Sqlite>,
    session: &UserSession,
) -> ValidationResult<Json<ActiveContext>> {
    let session = get_session_by_token(db, &session.token)
        .await
        .validate_custom()?;
    let context = resolve_active_context(db, &session)
        .await
        .validate_custom()?;
    Ok(Json(context))
}

#[get("/context")]
pub async fn api_get_context(
    _user: User,
    session: UserSession,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<ActiveContext>> {
    let context = resolve_active_context(db, &session)
        .await
        .validate_custom()?;
    Ok(Json(context))
}

#[post("/context/school/<id>")]
pub async fn api_switch_school(
    id: i64,
    _user: User,
    session: UserSession,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<ActiveContext>> {
    switch_school(db, &session, id).await.validate_custom()?;
    reload_context(db, &session).await
}

#[post("/context/school-year/<id>")]
pub async fn api_switch_school_year(
    id: i64,
    _user: User,
    session: UserSession,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<ActiveContext>> {
    switch_school_year(db, &session, id)
        .await
        .validate_custom()?;
    reload_context(db, &session).await
}

#[post("/context/classroom/<id>")]
pub async fn api_switch_classroom(
    id: i64,
    _user: User,
    session: UserSession,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<ActiveContext>> {
    switch_classroom(db, &session, id)
        .await
        .validate_custom()?;
    reload_context(db, &session).await
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub context: ActiveContext,
    pub classrooms: Vec<ClassroomHeadCount>,
    pub total_students: i64,
}

/// Head counts are limited to the active school's classrooms.
#[get("/dashboard")]
pub async fn api_dashboard(
    _user: User,
    session: UserSession,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<DashboardResponse>> {
    let context = resolve_active_context(db, &session)
        .await
        .validate_custom()?;

    let classrooms = classroom_head_counts(db, context.school_id())
        .await
        .validate_custom()?;
    let total_students = classrooms.iter().map(|count| count.total).sum();

    Ok(Json(DashboardResponse {
        context,
        classrooms,
        total_students,
    }))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
