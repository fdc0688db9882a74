use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, Resource, User};
use crate::db::{
    create_classroom, create_cycle, create_grade, create_school, create_school_year,
    create_subject, delete_classroom, delete_cycle, delete_grade, delete_school,
    delete_school_year, delete_subject, find_classroom, find_cycle, get_all_schools,
    get_classroom, get_cycle, get_grade, get_school, get_school_year, get_subject,
    list_classrooms, list_cycles, list_grades, list_school_years, list_subjects,
    update_classroom, update_cycle, update_grade, update_school, update_school_year,
    update_subject,
};
use crate::models::{
    Classroom, ClassroomInput, Cycle, CycleInput, Grade, GradeInput, Page, School, SchoolInput,
    SchoolYear, SchoolYearInput, Subject, SubjectInput,
};
use crate::presets::{
    CYCLE_NAME_PRESETS, DEFAULT_NOTATION, NOTATION_PRESETS, PresetTables, all_label_presets,
    label_presets_for_cycle,
};
use crate::validation::{
    AppErrorExt, JsonBody, JsonValidateExt, ValidationResponse, ValidationResult,
};

use super::{ensure_cycle, ensure_school, ensure_teacher};

// Schools

#[get("/schools")]
pub async fn api_list_schools(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Vec<School>>> {
    let schools = get_all_schools(db).await.validate_custom()?;
    Ok(Json(schools))
}

#[get("/schools/<id>")]
pub async fn api_get_school(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<School>> {
    let school = get_school(db, id).await.validate_custom()?;
    Ok(Json(school))
}

#[post("/schools", data = "<school>")]
pub async fn api_create_school(
    school: JsonBody<'_, SchoolInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Custom<Json<School>>> {
    user.require_permission(Permission::add(Resource::School))
        .validate_custom()?;
    let input = school.validate_custom()?;

    let id = create_school(db, &input).await.validate_custom()?;
    let created = get_school(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(created)))
}

#[put("/schools/<id>", data = "<school>")]
pub async fn api_update_school(
    id: i64,
    school: JsonBody<'_, SchoolInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<School>> {
    user.require_permission(Permission::change(Resource::School))
        .validate_custom()?;
    let input = school.validate_custom()?;

    update_school(db, id, &input).await.validate_custom()?;
    let updated = get_school(db, id).await.validate_custom()?;

    Ok(Json(updated))
}

#[delete("/schools/<id>")]
pub async fn api_delete_school(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Status> {
    user.require_permission(Permission::delete(Resource::School))
        .validate_custom()?;
    delete_school(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

// School years

fn check_year_dates(input: &SchoolYearInput) -> ValidationResult<()> {
    if input.end_date < input.start_date {
        return Err(ValidationResponse::field(
            Status::UnprocessableEntity,
            "end_date",
            "The end date must not be before the start date",
        ));
    }
    Ok(())
}

#[get("/school-years?<school_id>&<page>")]
pub async fn api_list_school_years(
    school_id: Option<i64>,
    page: Option<u32>,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Page<SchoolYear>>> {
    let years = list_school_years(db, school_id, page)
        .await
        .validate_custom()?;
    Ok(Json(years))
}

#[get("/school-years/<id>")]
pub async fn api_get_school_year(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<SchoolYear>> {
    let year = get_school_year(db, id).await.validate_custom()?;
    Ok(Json(year))
}

#[post("/school-years", data = "<year>")]
pub async fn api_create_school_year(
    year: JsonBody<'_, SchoolYearInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Custom<Json<SchoolYear>>> {
    user.require_permission(Permission::add(Resource::SchoolYear))
        .validate_custom()?;
    let input = year.validate_custom()?;
    check_year_dates(&input)?;
    ensure_school(db, input.school_id).await?;

    let id = create_school_year(db, &input).await.validate_custom()?;
    let created = get_school_year(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(created)))
}

#[put("/school-years/<id>", data = "<year>")]
pub async fn api_update_school_year(
    id: i64,
    year: JsonBody<'_, SchoolYearInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<SchoolYear>> {
    user.require_permission(Permission::change(Resource::SchoolYear))
        .validate_custom()?;
    let input = year.validate_custom()?;
    check_year_dates(&input)?;
    ensure_school(db, input.school_id).await?;

    update_school_year(db, id, &input).await.validate_custom()?;
    let updated = get_school_year(db, id).await.validate_custom()?;

    Ok(Json(updated))
}

#[delete("/school-years/<id>")]
pub async fn api_delete_school_year(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Status> {
    user.require_permission(Permission::delete(Resource::SchoolYear))
        .validate_custom()?;
    delete_school_year(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

// Grades

#[get("/grades?<school_id>")]
pub async fn api_list_grades(
    school_id: Option<i64>,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Vec<Grade>>> {
    let grades = list_grades(db, school_id).await.validate_custom()?;
    Ok(Json(grades))
}

#[get("/grades/<id>")]
pub async fn api_get_grade(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Grade>> {
    let grade = get_grade(db, id).await.validate_custom()?;
    Ok(Json(grade))
}

#[post("/grades", data = "<grade>")]
pub async fn api_create_grade(
    grade: JsonBody<'_, GradeInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Custom<Json<Grade>>> {
    user.require_permission(Permission::add(Resource::Grade))
        .validate_custom()?;
    let input = grade.validate_custom()?;
    ensure_school(db, input.school_id).await?;

    let id = create_grade(db, &input).await.validate_custom()?;
    let created = get_grade(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(created)))
}

#[put("/grades/<id>", data = "<grade>")]
pub async fn api_update_grade(
    id: i64,
    grade: JsonBody<'_, GradeInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Grade>> {
    user.require_permission(Permission::change(Resource::Grade))
        .validate_custom()?;
    let input = grade.validate_custom()?;
    ensure_school(db, input.school_id).await?;

    update_grade(db, id, &input).await.validate_custom()?;
    let updated = get_grade(db, id).await.validate_custom()?;

    Ok(Json(updated))
}

#[delete("/grades/<id>")]
pub async fn api_delete_grade(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Status> {
    user.require_permission(Permission::delete(Resource::Grade))
        .validate_custom()?;
    delete_grade(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

// Cycles

#[get("/cycles?<q>&<page>")]
pub async fn api_list_cycles(
    q: Option<&str>,
    page: Option<u32>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Page<Cycle>>> {
    user.require_permission(Permission::view(Resource::Cycle))
        .validate_custom()?;
    let cycles = list_cycles(db, q, page).await.validate_custom()?;
    Ok(Json(cycles))
}

#[derive(Serialize)]
pub struct CyclePresetsResponse {
    pub names: &'static [&'static str],
    pub notations: &'static [i64],
    pub default_notation: i64,
}

#[get("/cycles/presets")]
pub fn api_cycle_presets(_user: User) -> Json<CyclePresetsResponse> {
    Json(CyclePresetsResponse {
        names: CYCLE_NAME_PRESETS,
        notations: NOTATION_PRESETS,
        default_notation: DEFAULT_NOTATION,
    })
}

#[get("/cycles/<id>")]
pub async fn api_get_cycle(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Cycle>> {
    user.require_permission(Permission::view(Resource::Cycle))
        .validate_custom()?;
    let cycle = get_cycle(db, id).await.validate_custom()?;
    Ok(Json(cycle))
}

#[post("/cycles", data = "<cycle>")]
pub async fn api_create_cycle(
    cycle: JsonBody<'_, CycleInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Custom<Json<Cycle>>> {
    user.require_permission(Permission::add(Resource::Cycle))
        .validate_custom()?;
    let input = cycle.validate_custom()?;

    let id = create_cycle(db, &input).await.validate_custom()?;
    let created = get_cycle(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(created)))
}

#[put("/cycles/<id>", data = "<cycle>")]
pub async fn api_update_cycle(
    id: i64,
    cycle: JsonBody<'_, CycleInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Cycle>> {
    user.require_permission(Permission::change(Resource::Cycle))
        .validate_custom()?;
    let input = cycle.validate_custom()?;

    update_cycle(db, id, &input).await.validate_custom()?;
    let updated = get_cycle(db, id).await.validate_custom()?;

    Ok(Json(updated))
}

#[delete("/cycles/<id>")]
pub async fn api_delete_cycle(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Status> {
    user.require_permission(Permission::delete(Resource::Cycle))
        .validate_custom()?;
    delete_cycle(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

// Classrooms

#[get("/classrooms?<q>&<school_id>&<page>")]
pub async fn api_list_classrooms(
    q: Option<&str>,
    school_id: Option<i64>,
    page: Option<u32>,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Page<Classroom>>> {
    let classrooms = list_classrooms(db, q, school_id, page)
        .await
        .validate_custom()?;
    Ok(Json(classrooms))
}

#[derive(Serialize)]
pub struct LabelPresetsResponse {
    pub cycle: Option<Cycle>,
    pub presets: &'static [&'static str],
    pub tables: PresetTables,
}

/// Label suggestions for a cycle. When editing, pass `classroom_id` and the
/// classroom's own cycle is used.
#[get("/classrooms/label-presets?<cycle_id>&<classroom_id>")]
pub async fn api_classroom_label_presets(
    cycle_id: Option<i64>,
    classroom_id: Option<i64>,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<LabelPresetsResponse>> {
    let cycle_id = match classroom_id {
        Some(classroom_id) => find_classroom(db, classroom_id)
            .await
            .validate_custom()?
            .and_then(|classroom| classroom.cycle_id),
        None => cycle_id,
    };

    let cycle = match cycle_id {
        Some(id) => find_cycle(db, id).await.validate_custom()?,
        None => None,
    };

    let presets = label_presets_for_cycle(cycle.as_ref().map(|cycle| cycle.name.as_str()));

    Ok(Json(LabelPresetsResponse {
        cycle,
        presets,
        tables: all_label_presets(),
    }))
}

#[get("/classrooms/<id>")]
pub async fn api_get_classroom(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Classroom>> {
    let classroom = get_classroom(db, id).await.validate_custom()?;
    Ok(Json(classroom))
}

async fn check_classroom_references(
    db: &Pool<Sqlite>,
    input: &ClassroomInput,
) -> ValidationResult<()> {
    ensure_school(db, input.school_id).await?;
    ensure_cycle(db, input.cycle_id).await?;
    ensure_teacher(db, input.main_teacher_id).await
}

#[post("/classrooms", data = "<classroom>")]
pub async fn api_create_classroom(
    classroom: JsonBody<'_, ClassroomInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Custom<Json<Classroom>>> {
    user.require_permission(Permission::add(Resource::Classroom))
        .validate_custom()?;
    let input = classroom.validate_custom()?;
    check_classroom_references(db, &input).await?;

    let id = create_classroom(db, &input).await.validate_custom()?;
    let created = get_classroom(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(created)))
}

#[put("/classrooms/<id>", data = "<classroom>")]
pub async fn api_update_classroom(
    id: i64,
    classroom: JsonBody<'_, ClassroomInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Classroom>> {
    user.require_permission(Permission::change(Resource::Classroom))
        .validate_custom()?;
    let input = classroom.validate_custom()?;
    check_classroom_references(db, &input).await?;

    update_classroom(db, id, &input).await.validate_custom()?;
    let updated = get_classroom(db, id).await.validate_custom()?;

    Ok(Json(updated))
}

#[delete("/classrooms/<id>")]
pub async fn api_delete_classroom(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Status> {
    user.require_permission(Permission::delete(Resource::Classroom))
        .validate_custom()?;
    delete_classroom(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

// Subjects

#[get("/subjects?<school_id>")]
pub async fn api_list_subjects(
    school_id: Option<i64>,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Vec<Subject>>> {
    let subjects = list_subjects(db, school_id).await.validate_custom()?;
    Ok(Json(subjects))
}

#[get("/subjects/<id>")]
pub async fn api_get_subject(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Subject>> {
    let subject = get_subject(db, id).await.validate_custom()?;
    Ok(Json(subject))
}

#[post("/subjects", data = "<subject>")]
pub async fn api_create_subject(
    subject: JsonBody<'_, SubjectInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Custom<Json<Subject>>> {
    user.require_permission(Permission::add(Resource::Subject))
        .validate_custom()?;
    let input = subject.validate_custom()?;
    ensure_school(db, input.school_id).await?;

    let id = create_subject(db, &input).await.validate_custom()?;
    let created = get_subject(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(created)))
}

#[put("/subjects/<id>", data = "<subject>")]
pub async fn api_update_subject(
    id: i64,
    subject: JsonBody<'_, SubjectInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Json<Subject>> {
    user.require_permission(Permission::change(Resource::Subject))
        .validate_custom()?;
    let input = subject.validate_custom()?;
    ensure_school(db, input.school_id).await?;

    update_subject(db, id, &input).await.validate_custom()?;
    let updated = get_subject(db, id).await.validate_custom()?;

    Ok(Json(updated))
}

#[delete("/subjects/<id>")]
pub async fn api_delete_subject(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ValidationResult<Status> {
    user.require_permission(Permission::delete(Resource::Subject))
        .validate_custom()?;
    delete_subject(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}
