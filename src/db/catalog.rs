use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use super::{like_pattern, search_term};
use crate::error::AppError;
use crate::models::{
    Classroom, ClassroomInput, Cycle, CycleInput, Grade, GradeInput, Page, Subject, SubjectInput,
    page_bounds,
};

pub const CYCLES_PER_PAGE: u32 = 25;
pub const CLASSROOMS_PER_PAGE: u32 = 25;

async fn name_taken(
    pool: &Pool<Sqlite>,
    table: &str,
    column: &str,
    school_id: i64,
    value: &str,
    exclude_id: Option<i64>,
) -> Result<bool, AppError> {
    let row: Option<(i64,)> = sqlx::query_as(&format!(
        "SELECT id FROM {table} WHERE school_id = ? AND {column} = ? AND (?3 IS NULL OR id != ?3)"
    ))
    .bind(school_id)
    .bind(value)
    .bind(exclude_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

// Grades

#[instrument(skip(pool))]
pub async fn list_grades(
    pool: &Pool<Sqlite>,
    school_id: Option<i64>,
) -> Result<Vec<Grade>, AppError> {
    info!("Listing grades");
    let grades = sqlx::query_as::<_, Grade>(
        "SELECT id, school_id, name, level FROM grades
         WHERE (?1 IS NULL OR school_id = ?1)
         ORDER BY level, name",
    )
    .bind(school_id)
    .fetch_all(pool)
    .await?;
    Ok(grades)
}

#[instrument(skip(pool))]
pub async fn get_grade(pool: &Pool<Sqlite>, id: i64) -> Result<Grade, AppError> {
    sqlx::query_as::<_, Grade>("SELECT id, school_id, name, level FROM grades WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Grade with id {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn create_grade(pool: &Pool<Sqlite>, input: &GradeInput) -> Result<i64, AppError> {
    info!("Creating grade");
    let name = input.name.trim();
    if name_taken(pool, "grades", "name", input.school_id, name, None).await? {
        return Err(AppError::Duplicate {
            field: "name",
            message: format!("A grade named '{}' already exists for this school", name),
        });
    }

    let res = sqlx::query("INSERT INTO grades (school_id, name, level) VALUES (?, ?, ?)")
        .bind(input.school_id)
        .bind(name)
        .bind(input.level)
        .execute(pool)
        .await?;
    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn update_grade(
    pool: &Pool<Sqlite>,
    id: i64,
    input: &GradeInput,
) -> Result<(), AppError> {
    info!("Updating grade");
    get_grade(pool, id).await?;

    let name = input.name.trim();
    if name_taken(pool, "grades", "name", input.school_id, name, Some(id)).await? {
        return Err(AppError::Duplicate {
            field: "name",
            message: format!("A grade named '{}' already exists for this school", name),
        });
    }

    sqlx::query("UPDATE grades SET school_id = ?, name = ?, level = ? WHERE id = ?")
        .bind(input.school_id)
        .bind(name)
        .bind(input.level)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_grade(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting grade");
    let res = sqlx::query("DELETE FROM grades WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Grade with id {} not found", id)));
    }
    Ok(())
}

// Cycles

/// `q` matches the name, or the notation exactly when it is all digits.
#[instrument(skip(pool))]
pub async fn list_cycles(
    pool: &Pool<Sqlite>,
    q: Option<&str>,
    page: Option<u32>,
) -> Result<Page<Cycle>, AppError> {
    info!("Listing cycles");
    let (page, limit, offset) = page_bounds(page, CYCLES_PER_PAGE);

    let q = search_term(q);
    let pattern = q.map(like_pattern);
    let notation = q
        .filter(|q| q.chars().all(|c| c.is_ascii_digit()))
        .and_then(|q| q.parse::<i64>().ok());

    const FILTER: &str = "(?1 IS NULL OR LOWER(name) LIKE ?1 ESCAPE '\\'
            OR (?2 IS NOT NULL AND notation = ?2))";

    let (total,): (i64,) =
        sqlx::query_as(&format!("SELECT COUNT(*) FROM cycles WHERE {}", FILTER))
            .bind(&pattern)
            .bind(notation)
            .fetch_one(pool)
            .await?;

    let cycles = sqlx::query_as::<_, Cycle>(&format!(
        "SELECT id, name, notation FROM cycles WHERE {} ORDER BY name, id LIMIT ?3 OFFSET ?4",
        FILTER
    ))
    .bind(&pattern)
    .bind(notation)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(Page::new(cycles, page, CYCLES_PER_PAGE, total))
}

#[instrument(skip(pool))]
pub async fn find_cycle(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Cycle>, AppError> {
    let cycle = sqlx::query_as::<_, Cycle>("SELECT id, name, notation FROM cycles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(cycle)
}

#[instrument(skip(pool))]
pub async fn get_cycle(pool: &Pool<Sqlite>, id: i64) -> Result<Cycle, AppError> {
    find_cycle(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cycle with id {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn create_cycle(pool: &Pool<Sqlite>, input: &CycleInput) -> Result<i64, AppError> {
    info!("Creating cycle");
    let res = sqlx::query("INSERT INTO cycles (name, notation) VALUES (?, ?)")
        .bind(input.name.trim())
        .bind(input.notation)
        .execute(pool)
        .await?;
    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn update_cycle(
    pool: &Pool<Sqlite>,
    id: i64,
    input: &CycleInput,
) -> Result<(), AppError> {
    info!("Updating cycle");
    let res = sqlx::query("UPDATE cycles SET name = ?, notation = ? WHERE id = ?")
        .bind(input.name.trim())
        .bind(input.notation)
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Cycle with id {} not found", id)));
    }
    Ok(())
}

/// Refused while any classroom still points at the cycle.
#[instrument(skip(pool))]
pub async fn delete_cycle(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting cycle");
    let cycle = get_cycle(pool, id).await?;

    let (in_use,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM classrooms WHERE cycle_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;

    if in_use > 0 {
        warn!(cycle_id = id, classrooms = in_use, "Cycle still referenced");
        return Err(AppError::Integrity(format!(
            "Cycle '{}' is used by {} classroom(s) and cannot be deleted",
            cycle.name, in_use
        )));
    }

    sqlx::query("DELETE FROM cycles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// Classrooms

const CLASSROOM_SELECT: &str = "SELECT c.id, c.school_id, c.cycle_id, c.label, c.capacity,
            c.main_teacher_id, s.name AS school_name, cy.name AS cycle_name
     FROM classrooms c
     JOIN schools s ON s.id = c.school_id
     LEFT JOIN cycles cy ON cy.id = c.cycle_id";

const CLASSROOM_FILTER: &str = "(?1 IS NULL OR LOWER(c.label) LIKE ?1 ESCAPE '\\'
            OR LOWER(cy.name) LIKE ?1 ESCAPE '\\' OR LOWER(s.name) LIKE ?1 ESCAPE '\\')
       AND (?2 IS NULL OR c.school_id = ?2)";

/// `q` matches label, cycle name or school name, case-insensitively.
#[instrument(skip(pool))]
pub async fn list_classrooms(
    pool: &Pool<Sqlite>,
    q: Option<&str>,
    school_id: Option<i64>,
    page: Option<u32>,
) -> Result<Page<Classroom>, AppError> {
    info!("Listing classrooms");
    let (page, limit, offset) = page_bounds(page, CLASSROOMS_PER_PAGE);
    let pattern = search_term(q).map(like_pattern);

    let (total,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*)
         FROM classrooms c
         JOIN schools s ON s.id = c.school_id
         LEFT JOIN cycles cy ON cy.id = c.cycle_id
         WHERE {}",
        CLASSROOM_FILTER
    ))
    .bind(&pattern)
    .bind(school_id)
    .fetch_one(pool)
    .await?;

    let classrooms = sqlx::query_as::<_, Classroom>(&format!(
        "{} WHERE {} ORDER BY c.label, c.id LIMIT ?3 OFFSET ?4",
        CLASSROOM_SELECT, CLASSROOM_FILTER
    ))
    .bind(&pattern)
    .bind(school_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(Page::new(classrooms, page, CLASSROOMS_PER_PAGE, total))
}

#[instrument(skip(pool))]
pub async fn find_classroom(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Classroom>, AppError> {
    let classroom =
        sqlx::query_as::<_, Classroom>(&format!("{} WHERE c.id = ?", CLASSROOM_SELECT))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(classroom)
}

#[instrument(skip(pool))]
pub async fn get_classroom(pool: &Pool<Sqlite>, id: i64) -> Result<Classroom, AppError> {
    find_classroom(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Classroom with id {} not found", id)))
}

fn duplicate_classroom(label: &str) -> AppError {
    AppError::Duplicate {
        field: "label",
        message: format!("A classroom labelled '{}' already exists for this school", label),
    }
}

#[instrument(skip(pool))]
pub async fn create_classroom(
    pool: &Pool<Sqlite>,
    input: &ClassroomInput,
) -> Result<i64, AppError> {
    info!("Creating classroom");
    let label = input.label.trim();
    if name_taken(pool, "classrooms", "label", input.school_id, label, None).await? {
        return Err(duplicate_classroom(label));
    }

    let res = sqlx::query(
        "INSERT INTO classrooms (school_id, cycle_id, label, capacity, main_teacher_id)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(input.school_id)
    .bind(input.cycle_id)
    .bind(label)
    .bind(input.capacity)
    .bind(input.main_teacher_id)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn update_classroom(
    pool: &Pool<Sqlite>,
    id: i64,
    input: &ClassroomInput,
) -> Result<(), AppError> {
    info!("Updating classroom");
    get_classroom(pool, id).await?;

    let label = input.label.trim();
    if name_taken(pool, "classrooms", "label", input.school_id, label, Some(id)).await? {
        return Err(duplicate_classroom(label));
    }

    sqlx::query(
        "UPDATE classrooms
         SET school_id = ?, cycle_id = ?, label = ?, capacity = ?, main_teacher_id = ?
         WHERE id = ?",
    )
    .bind(input.school_id)
    .bind(input.cycle_id)
    .bind(label)
    .bind(input.capacity)
    .bind(input.main_teacher_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Students of the classroom are kept with no classroom.
#[instrument(skip(pool))]
pub async fn delete_classroom(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting classroom");
    let res = sqlx::query("DELETE FROM classrooms WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Classroom with id {} not found", id)));
    }
    Ok(())
}

// Subjects

#[instrument(skip(pool))]
pub async fn list_subjects(
    pool: &Pool<Sqlite>,
    school_id: Option<i64>,
) -> Result<Vec<Subject>, AppError> {
    info!("Listing subjects");
    let subjects = sqlx::query_as::<_, Subject>(
        "SELECT id, school_id, name, coefficient FROM subjects
         WHERE (?1 IS NULL OR school_id = ?1)
         ORDER BY name, id",
    )
    .bind(school_id)
    .fetch_all(pool)
    .await?;
    Ok(subjects)
}

#[instrument(skip(pool))]
pub async fn get_subject(pool: &Pool<Sqlite>, id: i64) -> Result<Subject, AppError> {
    sqlx::query_as::<_, Subject>(
        "SELECT id, school_id, name, coefficient FROM subjects WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Subject with id {} not found", id)))
}

fn round_coefficient(coefficient: f64) -> f64 {
    (coefficient * 100.0).round() / 100.0
}

fn duplicate_subject(name: &str) -> AppError {
    AppError::Duplicate {
        field: "name",
        message: format!("A subject named '{}' already exists for this school", name),
    }
}

#[instrument(skip(pool))]
pub async fn create_subject(pool: &Pool<Sqlite>, input: &SubjectInput) -> Result<i64, AppError> {
    info!("Creating subject");
    let name = input.name.trim();
    if name_taken(pool, "subjects", "name", input.school_id, name, None).await? {
        return Err(duplicate_subject(name));
    }

    let res = sqlx::query("INSERT INTO subjects (school_id, name, coefficient) VALUES (?, ?, ?)")
        .bind(input.school_id)
        .bind(name)
        .bind(round_coefficient(input.coefficient))
        .execute(pool)
        .await?;
    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn update_subject(
    pool: &Pool<Sqlite>,
    id: i64,
    input: &SubjectInput,
) -> Result<(), AppError> {
    info!("Updating subject");
    get_subject(pool, id).await?;

    let name = input.name.trim();
    if name_taken(pool, "subjects", "name", input.school_id, name, Some(id)).await? {
        return Err(duplicate_subject(name));
    }

    sqlx::query("UPDATE subjects SET school_id = ?, name = ?, coefficient = ? WHERE id = ?")
        .bind(input.school_id)
        .bind(name)
        .bind(round_coefficient(input.coefficient))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_subject(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting subject");
    let res = sqlx::query("DELETE FROM subjects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Subject with id {} not found", id)));
    }
    Ok(())
}
