use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{Page, School, SchoolInput, SchoolYear, SchoolYearInput, page_bounds};

pub const SCHOOL_YEARS_PER_PAGE: u32 = 50;

#[instrument(skip(pool))]
pub async fn get_all_schools(pool: &Pool<Sqlite>) -> Result<Vec<School>, AppError> {
    info!("Getting all schools");
    let schools = sqlx::query_as::<_, School>(
        "SELECT id, name, address, phone FROM schools ORDER BY name, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(schools)
}

#[instrument(skip(pool))]
pub async fn find_school(pool: &Pool<Sqlite>, id: i64) -> Result<Option<School>, AppError> {
    let school =
        sqlx::query_as::<_, School>("SELECT id, name, address, phone FROM schools WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(school)
}

#[instrument(skip(pool))]
pub async fn get_school(pool: &Pool<Sqlite>, id: i64) -> Result<School, AppError> {
    find_school(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("School with id {} not found", id)))
}

/// The school used when a session has none selected: the lowest id.
#[instrument(skip(pool))]
pub async fn default_school(pool: &Pool<Sqlite>) -> Result<Option<School>, AppError> {
    let school = sqlx::query_as::<_, School>(
        "SELECT id, name, address, phone FROM schools ORDER BY id LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(school)
}

#[instrument(skip(pool))]
pub async fn create_school(pool: &Pool<Sqlite>, input: &SchoolInput) -> Result<i64, AppError> {
    info!("Creating school");
    let res = sqlx::query("INSERT INTO schools (name, address, phone) VALUES (?, ?, ?)")
        .bind(input.name.trim())
        .bind(input.address.trim())
        .bind(input.phone.trim())
        .execute(pool)
        .await?;
    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn update_school(
    pool: &Pool<Sqlite>,
    id: i64,
    input: &SchoolInput,
) -> Result<(), AppError> {
    info!("Updating school");
    let res = sqlx::query("UPDATE schools SET name = ?, address = ?, phone = ? WHERE id = ?")
        .bind(input.name.trim())
        .bind(input.address.trim())
        .bind(input.phone.trim())
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("School with id {} not found", id)));
    }
    Ok(())
}

/// Years, grades, classrooms and subjects go with the school.
#[instrument(skip(pool))]
pub async fn delete_school(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting school");
    let res = sqlx::query("DELETE FROM schools WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("School with id {} not found", id)));
    }
    Ok(())
}

const SCHOOL_YEAR_COLUMNS: &str = "id, school_id, label, start_date, end_date, is_active";

#[instrument(skip(pool))]
pub async fn list_school_years(
    pool: &Pool<Sqlite>,
    school_id: Option<i64>,
    page: Option<u32>,
) -> Result<Page<SchoolYear>, AppError> {
    info!("Listing school years");
    let (page, limit, offset) = page_bounds(page, SCHOOL_YEARS_PER_PAGE);

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM school_years WHERE (?1 IS NULL OR school_id = ?1)",
    )
    .bind(school_id)
    .fetch_one(pool)
    .await?;

    let years = sqlx::query_as::<_, SchoolYear>(&format!(
        "SELECT {} FROM school_years
         WHERE (?1 IS NULL OR school_id = ?1)
         ORDER BY is_active DESC, start_date DESC, id
         LIMIT ?2 OFFSET ?3",
        SCHOOL_YEAR_COLUMNS
    ))
    .bind(school_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(Page::new(years, page, SCHOOL_YEARS_PER_PAGE, total))
}

#[instrument(skip(pool))]
pub async fn find_school_year(
    pool: &Pool<Sqlite>,
    id: i64,
) -> Result<Option<SchoolYear>, AppError> {
    let year = sqlx::query_as::<_, SchoolYear>(&format!(
        "SELECT {} FROM school_years WHERE id = ?",
        SCHOOL_YEAR_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(year)
}

#[instrument(skip(pool))]
pub async fn get_school_year(pool: &Pool<Sqlite>, id: i64) -> Result<SchoolYear, AppError> {
    find_school_year(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("School year with id {} not found", id)))
}

async fn school_year_label_taken(
    pool: &Pool<Sqlite>,
    school_id: i64,
    label: &str,
    exclude_id: Option<i64>,
) -> Result<bool, AppError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM school_years
         WHERE school_id = ? AND label = ? AND (?3 IS NULL OR id != ?3)",
    )
    .bind(school_id)
    .bind(label)
    .bind(exclude_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

fn duplicate_school_year(label: &str) -> AppError {
    AppError::Duplicate {
        field: "label",
        message: format!("A school year labelled '{}' already exists for this school", label),
    }
}

#[instrument(skip(pool))]
pub async fn create_school_year(
    pool: &Pool<Sqlite>,
    input: &SchoolYearInput,
) -> Result<i64, AppError> {
    info!("Creating school year");
    let label = input.label.trim();
    if school_year_label_taken(pool, input.school_id, label, None).await? {
        return Err(duplicate_school_year(label));
    }

    let res = sqlx::query(
        "INSERT INTO school_years (school_id, label, start_date, end_date, is_active)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(input.school_id)
    .bind(label)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.is_active)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn update_school_year(
    pool: &Pool<Sqlite>,
    id: i64,
    input: &SchoolYearInput,
) -> Result<(), AppError> {
    info!("Updating school year");
    get_school_year(pool, id).await?;

    let label = input.label.trim();
    if school_year_label_taken(pool, input.school_id, label, Some(id)).await? {
        return Err(duplicate_school_year(label));
    }

    sqlx::query(
        "UPDATE school_years
         SET school_id = ?, label = ?, start_date = ?, end_date = ?, is_active = ?
         WHERE id = ?",
    )
    .bind(input.school_id)
    .bind(label)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.is_active)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_school_year(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting school year");
    let res = sqlx::query("DELETE FROM school_years WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("School year with id {} not found", id)));
    }
    Ok(())
}
