#[cfg(test)]
mod tests {
    use crate::config::Settings;
    use crate::env::database_url;

    use serial_test::serial;

    fn extract_settings() -> Settings {
        rocket::Config::figment()
            .extract::<Settings>()
            .expect("settings should extract")
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.session_ttl_hours, 8);
        assert_eq!(settings.session_cleanup_interval_secs, 3600);
        assert_eq!(settings.session_ttl(), chrono::Duration::hours(8));
        assert!(settings.bootstrap_admin().is_none());
    }

    #[test]
    fn test_session_ttl_is_at_least_an_hour() {
        let settings = Settings {
            session_ttl_hours: 0,
            ..Settings::default()
        };
        assert_eq!(settings.session_ttl(), chrono::Duration::hours(1));
    }

    #[test]
    fn test_bootstrap_admin_needs_both_credentials() {
        let only_username = Settings {
            bootstrap_admin_username: Some("admin".to_string()),
            ..Settings::default()
        };
        assert!(only_username.bootstrap_admin().is_none());

        let blank_username = Settings {
            bootstrap_admin_username: Some("   ".to_string()),
            bootstrap_admin_password: Some("secret".to_string()),
            ..Settings::default()
        };
        assert!(blank_username.bootstrap_admin().is_none());

        let complete = Settings {
            bootstrap_admin_username: Some(" admin ".to_string()),
            bootstrap_admin_password: Some("secret".to_string()),
            ..Settings::default()
        };
        assert_eq!(complete.bootstrap_admin(), Some(("admin", "secret")));
    }

    #[test]
    #[serial]
    fn test_settings_from_environment() {
        temp_env::with_vars(
            [
                ("ROCKET_SESSION_TTL_HOURS", Some("2")),
                ("ROCKET_SESSION_CLEANUP_INTERVAL_SECS", Some("60")),
                ("ROCKET_BOOTSTRAP_ADMIN_USERNAME", Some("root")),
                ("ROCKET_BOOTSTRAP_ADMIN_PASSWORD", Some("s3cret")),
            ],
            || {
                let settings = extract_settings();

                assert_eq!(settings.session_ttl_hours, 2);
                assert_eq!(settings.session_cleanup_interval_secs, 60);
                assert_eq!(settings.bootstrap_admin(), Some(("root", "s3cret")));
            },
        );
    }

    #[test]
    #[serial]
    fn test_release_profile_shortens_sessions() {
        temp_env::with_vars_unset(
            ["ROCKET_SESSION_TTL_HOURS", "ROCKET_SESSION_CLEANUP_INTERVAL_SECS"],
            || {
                let settings: Settings = rocket::Config::figment()
                    .select("release")
                    .extract()
                    .expect("settings should extract");

                assert_eq!(settings.session_ttl_hours, 4);
                assert_eq!(settings.session_cleanup_interval_secs, 3600);
            },
        );
    }

    #[test]
    #[serial]
    fn test_database_url_defaults_to_local_file() {
        temp_env::with_var_unset("DATABASE_URL", || {
            assert_eq!(database_url(), "sqlite://school.db?mode=rwc");
        });

        temp_env::with_var("DATABASE_URL", Some("sqlite::memory:"), || {
            assert_eq!(database_url(), "sqlite::memory:");
        });
    }
}
