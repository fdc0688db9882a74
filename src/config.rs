use serde::Deserialize;

/// Application settings read from Rocket's figment (`Rocket.toml`,
/// `ROCKET_*` variables).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default = "default_cleanup_interval")]
    pub session_cleanup_interval_secs: u64,
    #[serde(default)]
    pub bootstrap_admin_username: Option<String>,
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

fn default_session_ttl_hours() -> i64 {
    8
}

fn default_cleanup_interval() -> u64 {
    3600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            session_cleanup_interval_secs: default_cleanup_interval(),
            bootstrap_admin_username: None,
            bootstrap_admin_password: None,
        }
    }
}

impl Settings {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.max(1))
    }

    /// Credentials of the admin account to create at startup, when both are set.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (
            self.bootstrap_admin_username.as_deref().map(str::trim),
            self.bootstrap_admin_password.as_deref(),
        ) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some((username, password))
            }
            _ => None,
        }
    }
}
