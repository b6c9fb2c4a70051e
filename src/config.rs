use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Credentials used to bootstrap the first owner account.
#[derive(Clone, Debug)]
pub struct OwnerSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub secret: String,
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub public_url: String,
    pub token_ttl_hours: i64,
    pub owner: Option<OwnerSeed>,
}

impl AppConfig {
    /// Reads the configuration from the process environment (and `.env`).
    pub fn from_env() -> Result<AppConfig, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let secret = required("SECRET")?;

        let bind_addr = optional("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_addr.clone(),
        })?;

        let token_ttl_hours = match optional("TOKEN_TTL_HOURS") {
            Some(value) => match value.parse::<i64>() {
                Ok(hours) if hours > 0 => hours,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "TOKEN_TTL_HOURS",
                        value,
                    })
                }
            },
            None => 24 * 7,
        };

        let owner = match (
            optional("OWNER_USERNAME"),
            optional("OWNER_EMAIL"),
            optional("OWNER_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(OwnerSeed {
                username,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => return Err(ConfigError::Missing("OWNER_USERNAME, OWNER_EMAIL and OWNER_PASSWORD")),
        };

        Ok(AppConfig {
            database_url,
            secret,
            bind_addr,
            upload_dir: optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads")),
            public_url: optional("PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            token_ttl_hours,
            owner,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
