use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use validator::Validate;

use crate::error::AppError;
use crate::validation::{validate_not_blank, validate_phone, validate_two_decimals};

fn default_true() -> bool {
    true
}

fn default_capacity() -> i64 {
    50
}

fn default_notation() -> i64 {
    crate::presets::DEFAULT_NOTATION
}

fn default_coefficient() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct School {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct SchoolYear {
    pub id: i64,
    pub school_id: i64,
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Grade {
    pub id: i64,
    pub school_id: i64,
    pub name: String,
    pub level: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Cycle {
    pub id: i64,
    pub name: String,
    /// Maximum score of the grading scale (10, 20, 100, ...).
    pub notation: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Classroom {
    pub id: i64,
    pub school_id: i64,
    pub cycle_id: Option<i64>,
    pub label: String,
    pub capacity: i64,
    pub main_teacher_id: Option<i64>,
    // Denormalized for list views
    pub school_name: Option<String>,
    pub cycle_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Subject {
    pub id: i64,
    pub school_id: i64,
    pub name: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SchoolInput {
    #[validate(length(min = 1, max = 150), custom(function = "validate_not_blank"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub address: String,
    #[serde(default)]
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SchoolYearInput {
    pub school_id: i64,
    #[validate(length(min = 1, max = 20), custom(function = "validate_not_blank"))]
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GradeInput {
    pub school_id: i64,
    #[validate(length(min = 1, max = 50), custom(function = "validate_not_blank"))]
    pub name: String,
    #[serde(default)]
    pub level: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CycleInput {
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub name: String,
    #[serde(default = "default_notation")]
    #[validate(range(min = 1, message = "Notation must be a positive number"))]
    pub notation: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClassroomInput {
    pub school_id: i64,
    pub cycle_id: Option<i64>,
    #[validate(length(min = 1, max = 50), custom(function = "validate_not_blank"))]
    pub label: String,
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1, message = "Capacity must be a positive number"))]
    pub capacity: i64,
    pub main_teacher_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubjectInput {
    pub school_id: i64,
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub name: String,
    #[serde(default = "default_coefficient")]
    #[validate(
        range(
            exclusive_min = 0.0,
            max = 99.99,
            message = "Coefficient must be greater than 0 and at most 99.99"
        ),
        custom(function = "validate_two_decimals")
    )]
    pub coefficient: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }

    pub fn parse(code: &str) -> Result<Self, AppError> {
        match code {
            "M" => Ok(Gender::Male),
            "F" => Ok(Gender::Female),
            _ => Err(AppError::Internal(format!("Unknown gender code: {}", code))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Student {
    pub id: i64,
    pub last_name: String,
    pub first_name: String,
    pub birth_date: Option<NaiveDate>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub gender: Option<Gender>,
    pub photo: Option<String>,
    pub matricule: Option<String>,
    pub classroom_id: Option<i64>,
    pub classroom_label: Option<String>,
    pub enrollment_date: Option<NaiveDate>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

/// Enrollment form. Identity fields are mandatory, the rest is optional.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StudentInput {
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub last_name: String,
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub first_name: String,
    pub birth_date: NaiveDate,
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub city: String,
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub district: String,
    pub gender: Gender,
    #[validate(length(max = 255))]
    pub photo: Option<String>,
    #[validate(length(max = 50))]
    pub matricule: Option<String>,
    pub classroom_id: Option<i64>,
    pub enrollment_date: Option<NaiveDate>,
    #[validate(length(max = 150))]
    pub parent_name: Option<String>,
    #[validate(length(max = 50), custom(function = "validate_phone"))]
    pub parent_phone: Option<String>,
    pub notes: Option<String>,
}

impl StudentInput {
    /// A blank matricule is stored as absent.
    pub fn normalized_matricule(&self) -> Option<String> {
        self.matricule
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReEnrollInput {
    pub student_id: i64,
    pub classroom_id: i64,
    pub enrollment_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbStudent {
    pub id: i64,
    pub last_name: String,
    pub first_name: String,
    pub birth_date: Option<NaiveDate>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub gender: Option<String>,
    pub photo: Option<String>,
    pub matricule: Option<String>,
    pub classroom_id: Option<i64>,
    pub classroom_label: Option<String>,
    pub enrollment_date: Option<NaiveDate>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl TryFrom<DbStudent> for Student {
    type Error = AppError;

    fn try_from(db: DbStudent) -> Result<Self, Self::Error> {
        Ok(Self {
            id: db.id,
            last_name: db.last_name,
            first_name: db.first_name,
            birth_date: db.birth_date,
            city: db.city,
            district: db.district,
            gender: db.gender.as_deref().map(Gender::parse).transpose()?,
            photo: db.photo,
            matricule: db.matricule,
            classroom_id: db.classroom_id,
            classroom_label: db.classroom_label,
            enrollment_date: db.enrollment_date,
            parent_name: db.parent_name,
            parent_phone: db.parent_phone,
            notes: db.notes,
            created_at: db.created_at,
        })
    }
}

/// Head count for one classroom; `classroom_id` is `None` for students
/// without a classroom.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct ClassroomHeadCount {
    pub classroom_id: Option<i64>,
    pub classroom_label: Option<String>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub num_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: i64) -> Self {
        let per_page = per_page.max(1);
        let num_pages = ((total.max(0) as u64).div_ceil(per_page as u64)).max(1) as u32;
        Self {
            items,
            page,
            per_page,
            total,
            num_pages,
        }
    }
}

/// 1-based page number turned into LIMIT/OFFSET.
pub fn page_bounds(page: Option<u32>, per_page: u32) -> (u32, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let offset = (page as i64 - 1) * per_page as i64;
    (page, per_page as i64, offset)
}
