use std::{env, path::PathBuf, str::FromStr};
use thiserror::Error;

/// Process configuration, read from the environment (and `.env` when present).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub secret: String,
    pub token_ttl_hours: i64,
    pub media_root: PathBuf,
    pub file_size_limit: usize,
    pub mail_from: String,
    pub smtp: Option<SmtpConfig>,
    pub admin: Option<AdminSeed>,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Staff account created at boot when it does not exist yet.
#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let smtp = match lookup("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(&lookup, "SMTP_PORT", 25)?,
                username: lookup("SMTP_USERNAME"),
                password: lookup("SMTP_PASSWORD"),
            }),
            None => None,
        };

        let admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminSeed {
                email: lookup("ADMIN_EMAIL").unwrap_or_else(|| format!("{username}@storefront.com")),
                username,
                password,
            }),
            _ => None,
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_owned()),
            secret: required("SECRET")?,
            token_ttl_hours: parse_or(&lookup, "TOKEN_TTL_HOURS", 24)?,
            media_root: lookup("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./media")),
            file_size_limit: parse_or(&lookup, "FILE_SIZE_LIMIT", 2 * 1024 * 1024)?,
            mail_from: lookup("MAIL_FROM").unwrap_or_else(|| "from@storefront.com".to_owned()),
            smtp,
            admin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
