//! Application configuration

use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // Team collaboration
    pub submission_save_timeout_ms: u64,
    pub evict_idle_presence: bool,

    // Standalone mode seed data (JSON)
    pub fixtures_path: Option<String>,

    // Logging
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),

            // Team collaboration
            submission_save_timeout_ms: env::var("SUBMISSION_SAVE_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .unwrap_or(10000),
            evict_idle_presence: env::var("EVICT_IDLE_PRESENCE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),

            fixtures_path: env::var("TEAMSYNC_FIXTURES").ok(),

            // Logging
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                Ok("pretty") | Err(_) => LogFormat::Pretty,
                Ok(_) => return Err(ConfigError::Invalid("LOG_FORMAT must be 'pretty' or 'json'")),
            },
        })
    }

    pub fn submission_save_timeout(&self) -> Duration {
        Duration::from_millis(self.submission_save_timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Config tests mutate shared env vars
    static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn cleanup_config() {
        for key in [
            "BIND_ADDRESS",
            "JWT_SECRET",
            "JWT_EXPIRY_HOURS",
            "SUBMISSION_SAVE_TIMEOUT_MS",
            "EVICT_IDLE_PRESENCE",
            "LOG_FORMAT",
            "TEAMSYNC_FIXTURES",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();
        cleanup_config();
        env::set_var("JWT_SECRET", "test-jwt-secret-must-be-at-least-32-characters-long");

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.submission_save_timeout(), Duration::from_secs(10));
        assert!(config.evict_idle_presence);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.fixtures_path.is_none());

        cleanup_config();
    }

    #[test]
    fn test_jwt_secret_validation() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();
        cleanup_config();

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));

        env::set_var("JWT_SECRET", "too-short");
        assert!(matches!(Config::from_env(), Err(ConfigError::WeakSecret(_))));

        cleanup_config();
    }

    #[test]
    fn test_overrides() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();
        cleanup_config();
        env::set_var("JWT_SECRET", "test-jwt-secret-must-be-at-least-32-characters-long");
        env::set_var("SUBMISSION_SAVE_TIMEOUT_MS", "250");
        env::set_var("EVICT_IDLE_PRESENCE", "false");
        env::set_var("LOG_FORMAT", "json");

        let config = Config::from_env().unwrap();
        assert_eq!(config.submission_save_timeout(), Duration::from_millis(250));
        assert!(!config.evict_idle_presence);
        assert_eq!(config.log_format, LogFormat::Json);

        env::set_var("LOG_FORMAT", "xml");
        assert!(matches!(Config::from_env(), Err(ConfigError::Invalid(_))));

        cleanup_config();
    }
}
