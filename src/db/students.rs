use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use super::{like_pattern, search_term};
use crate::error::AppError;
use crate::models::{ClassroomHeadCount, DbStudent, Page, Student, StudentInput, page_bounds};

pub const STUDENTS_PER_PAGE: u32 = 50;

const STUDENT_SELECT: &str = "SELECT st.id, st.last_name, st.first_name, st.birth_date, st.city,
            st.district, st.gender, st.photo, st.matricule, st.classroom_id,
            c.label AS classroom_label, st.enrollment_date, st.parent_name,
            st.parent_phone, st.notes, st.created_at
     FROM students st
     LEFT JOIN classrooms c ON c.id = st.classroom_id";

const STUDENT_FILTER: &str = "(?1 IS NULL OR LOWER(st.last_name) LIKE ?1 ESCAPE '\\'
            OR LOWER(st.first_name) LIKE ?1 ESCAPE '\\'
            OR LOWER(COALESCE(st.matricule, '')) LIKE ?1 ESCAPE '\\')
       AND (?2 IS NULL OR st.classroom_id = ?2)";

fn into_students(rows: Vec<DbStudent>) -> Result<Vec<Student>, AppError> {
    rows.into_iter().map(Student::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn list_students(
    pool: &Pool<Sqlite>,
    q: Option<&str>,
    classroom_id: Option<i64>,
    page: Option<u32>,
) -> Result<Page<Student>, AppError> {
    info!("Listing students");
    let (page, limit, offset) = page_bounds(page, STUDENTS_PER_PAGE);
    let pattern = search_term(q).map(like_pattern);

    let (total,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM students st WHERE {}",
        STUDENT_FILTER
    ))
    .bind(&pattern)
    .bind(classroom_id)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, DbStudent>(&format!(
        "{} WHERE {} ORDER BY st.last_name, st.first_name, st.id LIMIT ?3 OFFSET ?4",
        STUDENT_SELECT, STUDENT_FILTER
    ))
    .bind(&pattern)
    .bind(classroom_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(Page::new(into_students(rows)?, page, STUDENTS_PER_PAGE, total))
}

#[instrument(skip(pool))]
pub async fn get_student(pool: &Pool<Sqlite>, id: i64) -> Result<Student, AppError> {
    let row = sqlx::query_as::<_, DbStudent>(&format!("{} WHERE st.id = ?", STUDENT_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(student) => Student::try_from(student),
        None => Err(AppError::NotFound(format!("Student with id {} not found", id))),
    }
}

#[instrument(skip_all, fields(last_name = %input.last_name))]
pub async fn create_student(pool: &Pool<Sqlite>, input: &StudentInput) -> Result<i64, AppError> {
    info!("Enrolling new student");
    let res = sqlx::query(
        "INSERT INTO students (last_name, first_name, birth_date, city, district, gender,
                               photo, matricule, classroom_id, enrollment_date,
                               parent_name, parent_phone, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(input.last_name.trim())
    .bind(input.first_name.trim())
    .bind(input.birth_date)
    .bind(input.city.trim())
    .bind(input.district.trim())
    .bind(input.gender.as_str())
    .bind(&input.photo)
    .bind(input.normalized_matricule())
    .bind(input.classroom_id)
    .bind(input.enrollment_date)
    .bind(&input.parent_name)
    .bind(&input.parent_phone)
    .bind(&input.notes)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, input))]
pub async fn update_student(
    pool: &Pool<Sqlite>,
    id: i64,
    input: &StudentInput,
) -> Result<(), AppError> {
    info!("Updating student");
    let res = sqlx::query(
        "UPDATE students
         SET last_name = ?, first_name = ?, birth_date = ?, city = ?, district = ?,
             gender = ?, photo = ?, matricule = ?, classroom_id = ?, enrollment_date = ?,
             parent_name = ?, parent_phone = ?, notes = ?
         WHERE id = ?",
    )
    .bind(input.last_name.trim())
    .bind(input.first_name.trim())
    .bind(input.birth_date)
    .bind(input.city.trim())
    .bind(input.district.trim())
    .bind(input.gender.as_str())
    .bind(&input.photo)
    .bind(input.normalized_matricule())
    .bind(input.classroom_id)
    .bind(input.enrollment_date)
    .bind(&input.parent_name)
    .bind(&input.parent_phone)
    .bind(&input.notes)
    .bind(id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Student with id {} not found", id)));
    }
    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_student(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting student");
    let res = sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Student with id {} not found", id)));
    }
    Ok(())
}

pub fn append_note(existing: Option<&str>, note: &str) -> Option<String> {
    let existing = existing.unwrap_or("").trim_end();
    match (existing.is_empty(), note.is_empty()) {
        (true, true) => None,
        (true, false) => Some(note.to_string()),
        (false, true) => Some(existing.to_string()),
        (false, false) => Some(format!("{}\n{}", existing, note)),
    }
}

/// Moves an existing student into a classroom. A non-empty note is added on
/// its own line after the notes already on file.
#[instrument(skip(pool, notes))]
pub async fn re_enroll_student(
    pool: &Pool<Sqlite>,
    student_id: i64,
    classroom_id: i64,
    enrollment_date: NaiveDate,
    notes: Option<&str>,
) -> Result<Student, AppError> {
    info!("Re-enrolling student");
    let student = get_student(pool, student_id).await?;

    let note = notes.map(str::trim).unwrap_or("");
    let merged = append_note(student.notes.as_deref(), note);

    sqlx::query(
        "UPDATE students SET classroom_id = ?, enrollment_date = ?, notes = ? WHERE id = ?",
    )
    .bind(classroom_id)
    .bind(enrollment_date)
    .bind(merged)
    .bind(student_id)
    .execute(pool)
    .await?;

    get_student(pool, student_id).await
}

/// Head counts per classroom ordered by label. Students without a classroom
/// are grouped under an absent classroom, which sorts first. With a school,
/// only that school's classrooms are counted and the unassigned group is
/// left out.
#[instrument(skip(pool))]
pub async fn classroom_head_counts(
    pool: &Pool<Sqlite>,
    school_id: Option<i64>,
) -> Result<Vec<ClassroomHeadCount>, AppError> {
    info!("Counting students per classroom");
    let counts = sqlx::query_as::<_, ClassroomHeadCount>(
        "SELECT st.classroom_id AS classroom_id, c.label AS classroom_label, COUNT(st.id) AS total
         FROM students st
         LEFT JOIN classrooms c ON c.id = st.classroom_id
         WHERE (?1 IS NULL OR c.school_id = ?1)
         GROUP BY st.classroom_id, c.label
         ORDER BY c.label IS NOT NULL, c.label, st.classroom_id",
    )
    .bind(school_id)
    .fetch_all(pool)
    .await?;
    Ok(counts)
}
