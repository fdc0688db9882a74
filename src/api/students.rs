use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, Resource, User, UserSession};
use crate::context::resolve_active_context;
use crate::db::{
    classroom_head_counts, create_student, delete_student, find_classroom, get_student,
    list_students, re_enroll_student, update_student,
};
use crate::error::AppError;
use crate::models::{ClassroomHeadCount, Page, ReEnrollInput, Student, StudentInput};
use crate::validation::{AppErrorExt, JsonBody, JsonValidateExt, ValidationResult};

use super::{ensure_classroom, invalid_choice};

#[get("/students?<q>&<classroom_id>&<page>")]
pub async fn api_list_students(
    q: Option<&str>,
    classroom_id: Option<i64>,
    page: Option<u32>,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Page<Student>>> {
    let students = list_students(db, q, classroom_id, page)
        .await
        .validate_custom()?;
    Ok(Json(students))
}

#[derive(Serialize)]
pub struct StudentStatsResponse {
    pub classrooms: Vec<ClassroomHeadCount>,
    pub total: i64,
}

#[get("/students/stats")]
pub async fn api_student_stats(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<StudentStatsResponse>> {
    let classrooms = classroom_head_counts(db, None).await.validate_custom()?;
    let total = classrooms.iter().map(|count| count.total).sum();

    Ok(Json(StudentStatsResponse { classrooms, total }))
}

#[get("/students/<id>")]
pub async fn api_get_student(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Student>> {
    let student = get_student(db, id).await.validate_custom()?;
    Ok(Json(student))
}

/// Enrolls a new student.
#[post("/students", data = "<student>")]
pub async fn api_create_student(
    student: JsonBody<'_, StudentInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Custom<Json<Student>>> {
    user.require_permission(Permission::add(Resource::Student))
        .validate_custom()?;
    let input = student.validate_custom()?;
    ensure_classroom(db, input.classroom_id).await?;

    let id = create_student(db, &input).await.validate_custom()?;
    let created = get_student(db, id).await.validate_custom()?;

    tracing::info!(student_id = id, "Student enrolled");

    Ok(Custom(Status::Created, Json(created)))
}

#[put("/students/<id>", data = "<student>")]
pub async fn api_update_student(
    id: i64,
    student: JsonBody<'_, StudentInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Student>> {
    user.require_permission(Permission::change(Resource::Student))
        .validate_custom()?;
    let input = student.validate_custom()?;
    ensure_classroom(db, input.classroom_id).await?;

    update_student(db, id, &input).await.validate_custom()?;
    let updated = get_student(db, id).await.validate_custom()?;

    Ok(Json(updated))
}

#[delete("/students/<id>")]
pub async fn api_delete_student(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Status> {
    user.require_permission(Permission::delete(Resource::Student))
        .validate_custom()?;
    delete_student(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

/// Puts a student already on file into a classroom for a new enrollment.
/// While a school is active, only its classrooms are accepted.
#[post("/students/re-enroll", data = "<enrollment>")]
pub async fn api_re_enroll_student(
    enrollment: JsonBody<'_, ReEnrollInput>,
    user: User,
    session: UserSession,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Student>> {
    user.require_permission(Permission::change(Resource::Student))
        .validate_custom()?;
    let input = enrollment.validate_custom()?;

    let context = resolve_active_context(db, &session)
        .await
        .validate_custom()?;

    let classroom = find_classroom(db, input.classroom_id)
        .await
        .validate_custom()?;

    let in_scope = match (&classroom, context.school_id()) {
        (Some(classroom), Some(school_id)) => classroom.school_id == school_id,
        (Some(_), None) => true,
        (None, _) => false,
    };

    if !in_scope {
        return Err(invalid_choice("classroom_id"));
    }

    let student = match re_enroll_student(
        db,
        input.student_id,
        input.classroom_id,
        input.enrollment_date,
        input.notes.as_deref(),
    )
    .await
    {
        Err(AppError::NotFound(_)) => return Err(invalid_choice("student_id")),
        result => result.validate_custom()?,
    };

    tracing::info!(
        student_id = student.id,
        classroom_id = input.classroom_id,
        "Student re-enrolled"
    );

    Ok(Json(student))
}
