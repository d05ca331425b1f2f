//! Process configuration, read once at startup from the environment.
//!
//! Grounded in the reference's `utils.ReadEnv`: a `.env` file loaded
//! before the real environment is consulted, and a hard failure if a
//! required variable is absent — except here that failure is a typed
//! error instead of a panic, so the caller can log it properly before
//! exiting.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),
    #[error("environment variable {name} has an invalid value: {value}")]
    Invalid { name: String, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub listen_addr: String,
    pub bucket_path: std::path::PathBuf,
}

impl Config {
    /// Loads `.env` (or `.env.prod` when `APP_ENV=release`) if present,
    /// then reads every required variable from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if std::env::var("APP_ENV").as_deref() == Ok("release") {
            let _ = dotenvy::from_filename(".env.prod");
        } else {
            let _ = dotenvy::dotenv();
        }

        let db_user = required("DB_USER")?;
        let db_pass = required("DB_PASS")?;
        let db_host = required("DB_HOST")?;
        let db_name = required("DB_NAME")?;
        let db_port = required("DB_PORT")?;

        let database_url = format!(
            "postgres://{db_user}:{db_pass}@{db_host}:{db_port}/{db_name}"
        );

        Ok(Config {
            database_url,
            redis_url: required("CACHE_CONN")?,
            listen_addr: required("LISTEN_ADDR")?,
            bucket_path: std::path::PathBuf::from(required("BUCKET_PATH")?),
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_var_is_reported_by_name() {
        std::env::remove_var("DB_USER_TEST_SENTINEL");
        let err = required("DB_USER_TEST_SENTINEL").unwrap_err();
        assert!(matches!(err, ConfigError::Missing(name) if name == "DB_USER_TEST_SENTINEL"));
    }
}
