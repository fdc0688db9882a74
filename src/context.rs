//! Active school / year / classroom of a session.
//!
//! The identifiers live on the session row (`SessionContext`). Reading the
//! context turns them into records; a session without a usable school is
//! given the lowest-id school, and that choice is written back.

use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::auth::UserSession;
use crate::db::{
    clear_active_school_year, default_school, find_classroom, find_school, find_school_year,
    get_classroom, get_school, get_school_year, set_active_classroom, set_active_school,
    set_active_school_year,
};
use crate::error::AppError;
use crate::models::{Classroom, School, SchoolYear};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActiveContext {
    pub school: Option<School>,
    pub school_year: Option<SchoolYear>,
    pub classroom: Option<Classroom>,
}

impl ActiveContext {
    pub fn school_id(&self) -> Option<i64> {
        self.school.as_ref().map(|s| s.id)
    }
}

#[instrument(skip_all, fields(session_id = session.id))]
pub async fn resolve_active_context(
    pool: &Pool<Sqlite>,
    session: &UserSession,
) -> Result<ActiveContext, AppError> {
    let stored = session.context;

    let stored_school = match stored.active_school_id {
        Some(id) => find_school(pool, id).await?,
        None => None,
    };

    let school = match stored_school {
        Some(school) => Some(school),
        None => {
            let fallback = default_school(pool).await?;
            if let Some(school) = &fallback {
                info!(school_id = school.id, "No active school, defaulting to lowest id");
                set_active_school(pool, session.id, Some(school.id)).await?;
            }
            fallback
        }
    };

    let school_year = match stored.active_school_year_id {
        Some(id) => find_school_year(pool, id).await?,
        None => None,
    };

    let classroom = match stored.active_classroom_id {
        Some(id) => find_classroom(pool, id).await?,
        None => None,
    };

    Ok(ActiveContext {
        school,
        school_year,
        classroom,
    })
}

/// A stored year or classroom from another school is cleared.
#[instrument(skip_all, fields(session_id = session.id, school_id = school_id))]
pub async fn switch_school(
    pool: &Pool<Sqlite>,
    session: &UserSession,
    school_id: i64,
) -> Result<School, AppError> {
    let school = get_school(pool, school_id).await?;
    set_active_school(pool, session.id, Some(school.id)).await?;

    if let Some(year_id) = session.context.active_school_year_id {
        let stale = find_school_year(pool, year_id)
            .await?
            .is_none_or(|year| year.school_id != school.id);
        if stale {
            warn!(year_id, "Clearing active school year from another school");
            clear_active_school_year(pool, session.id).await?;
        }
    }

    clear_foreign_classroom(pool, session, school.id).await?;

    Ok(school)
}

async fn clear_foreign_classroom(
    pool: &Pool<Sqlite>,
    session: &UserSession,
    school_id: i64,
) -> Result<(), AppError> {
    if let Some(classroom_id) = session.context.active_classroom_id {
        let stale = find_classroom(pool, classroom_id)
            .await?
            .is_none_or(|classroom| classroom.school_id != school_id);
        if stale {
            warn!(classroom_id, "Clearing active classroom from another school");
            set_active_classroom(pool, session.id, None).await?;
        }
    }
    Ok(())
}

/// The year's own school becomes the active school too, and a stored
/// classroom from another school is cleared.
#[instrument(skip_all, fields(session_id = session.id, school_year_id = school_year_id))]
pub async fn switch_school_year(
    pool: &Pool<Sqlite>,
    session: &UserSession,
    school_year_id: i64,
) -> Result<SchoolYear, AppError> {
    let year = get_school_year(pool, school_year_id).await?;
    set_active_school_year(pool, session.id, year.id, year.school_id).await?;
    clear_foreign_classroom(pool, session, year.school_id).await?;
    Ok(year)
}

#[instrument(skip_all, fields(session_id = session.id, classroom_id = classroom_id))]
pub async fn switch_classroom(
    pool: &Pool<Sqlite>,
    session: &UserSession,
    classroom_id: i64,
) -> Result<Classroom, AppError> {
    let classroom = get_classroom(pool, classroom_id).await?;
    set_active_classroom(pool, session.id, Some(classroom.id)).await?;
    Ok(classroom)
}
