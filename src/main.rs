#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod config;
mod context;
mod db;
mod env;
mod error;
mod models;
mod presets;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::sync::Mutex;
use std::time::Duration;

use api::*;
use auth::{bad_request_api, forbidden_api, not_found_api, unauthorized_api, unprocessable_api};
use config::Settings;
use db::{clean_expired_sessions, ensure_admin_account};
use error::AppError;
use once_cell::sync::Lazy;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use telemetry::{OtelGuard, TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::info;

pub static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Figment(rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{0}")]
    Rocket(#[from] rocket::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::figment::Error> for Error {
    fn from(value: rocket::figment::Error) -> Self {
        Error::Figment(value)
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    env::load_environment()?;

    let guard = init_tracing()?;
    if let Ok(mut slot) = TELEMETRY_GUARD.lock() {
        *slot = guard;
    }

    let pool = SqlitePool::connect(&env::database_url()).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    let rocket = init_rocket(pool.clone()).await;
    let settings: Settings = rocket.figment().extract()?;

    if let Some((username, password)) = settings.bootstrap_admin() {
        ensure_admin_account(&pool, username, password).await?;
    }

    spawn_session_cleanup(pool, settings.session_cleanup_interval_secs);

    rocket
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async { shutdown_telemetry() })
        }))
        .launch()
        .await?;

    Ok(())
}

fn spawn_session_cleanup(pool: SqlitePool, interval_secs: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(Duration::from_secs(interval_secs.max(1))).await;
        }
    });
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting school administration service");

    rocket::build()
        .manage(pool)
        .attach(AdHoc::config::<Settings>())
        .mount(
            "/api",
            routes![
                health,
                api_login,
                api_logout,
                api_me,
                api_get_all_users,
                api_register_user,
                api_get_context,
                api_switch_school,
                api_switch_school_year,
                api_switch_classroom,
                api_dashboard,
                api_list_schools,
                api_get_school,
                api_create_school,
                api_update_school,
                api_delete_school,
                api_list_school_years,
                api_get_school_year,
                api_create_school_year,
                api_update_school_year,
                api_delete_school_year,
                api_list_grades,
                api_get_grade,
                api_create_grade,
                api_update_grade,
                api_delete_grade,
                api_list_cycles,
                api_cycle_presets,
                api_get_cycle,
                api_create_cycle,
                api_update_cycle,
                api_delete_cycle,
                api_list_classrooms,
                api_classroom_label_presets,
                api_get_classroom,
                api_create_classroom,
                api_update_classroom,
                api_delete_classroom,
                api_list_subjects,
                api_get_subject,
                api_create_subject,
                api_update_subject,
                api_delete_subject,
                api_list_students,
                api_student_stats,
                api_get_student,
                api_create_student,
                api_update_student,
                api_delete_student,
                api_re_enroll_student,
            ],
        )
        .register(
            "/api",
            catchers![
                bad_request_api,
                unauthorized_api,
                forbidden_api,
                not_found_api,
                unprocessable_api
            ],
        )
        .attach(TelemetryFairing)
}
