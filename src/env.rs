use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

pub fn load_environment() -> anyhow::Result<()> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string()) == "production";

    let env_files = if is_production {
        ["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        ["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> anyhow::Result<()> {
    if !Path::new(path).exists() {
        warn!("Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)
        .with_context(|| format!("Failed to load environment file {}", path))?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

pub fn database_url() -> String {
    dotenvy::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://school.db?mode=rwc".to_string())
}
