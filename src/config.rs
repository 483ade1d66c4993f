// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`AppConfig`] loaded once at
//! startup and handed to every component through `AppState`.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `platform.redb` | `./data` |
//! | `MEDIA_DIR` | Root for uploaded media, served under `/storage` | `./storage` |
//! | `JWT_SECRET` | HS256 signing secret and session tag key | Required for production |
//! | `JWT_EXPIRATION_SECS` | Session token lifetime | `86400` |
//! | `JWT_REFRESH_WINDOW_SECS` | Remaining lifetime that triggers a refresh | `600` |
//! | `OTP_EXPIRATION_SECS` | Verification code lifetime | `300` |
//! | `BCRYPT_COST` | bcrypt work factor for new password hashes | `12` |
//! | `MAIL_API_URL` | Transactional mail endpoint | Unset: log-only mail |
//! | `MAIL_API_KEY` | Mail API key (`api-key` header) | Unset: log-only mail |
//! | `MAIL_SENDER` | Sender address | Unset: log-only mail |
//! | `MAIL_SENDER_NAME` | Sender display name | Optional |
//! | `SEED_ADMIN_EMAIL` | Superadmin created at startup if missing | Optional |
//! | `SEED_ADMIN_PASSWORD` | Password for the seeded superadmin | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Duration;
use ring::rand::{SecureRandom, SystemRandom};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Directory for the embedded database file.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
/// Root directory for uploaded media.
pub const MEDIA_DIR_ENV: &str = "MEDIA_DIR";

/// Signing secret for session tokens.
///
/// Also keys the session tag hash, so rotating it invalidates every token.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_EXPIRATION_ENV: &str = "JWT_EXPIRATION_SECS";
pub const JWT_REFRESH_WINDOW_ENV: &str = "JWT_REFRESH_WINDOW_SECS";
pub const OTP_EXPIRATION_ENV: &str = "OTP_EXPIRATION_SECS";
pub const BCRYPT_COST_ENV: &str = "BCRYPT_COST";

pub const MAIL_API_URL_ENV: &str = "MAIL_API_URL";
pub const MAIL_API_KEY_ENV: &str = "MAIL_API_KEY";
pub const MAIL_SENDER_ENV: &str = "MAIL_SENDER";
pub const MAIL_SENDER_NAME_ENV: &str = "MAIL_SENDER_NAME";

pub const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";

/// Environment variable name for log format.
///
/// Accepted values: `json`, `pretty`.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_MEDIA_DIR: &str = "./storage";
pub const DATABASE_FILE: &str = "platform.redb";
pub const DEFAULT_JWT_EXPIRATION_SECS: i64 = 86_400;
pub const DEFAULT_JWT_REFRESH_WINDOW_SECS: i64 = 600;
pub const DEFAULT_OTP_EXPIRATION_SECS: i64 = 300;

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected} (got '{value}')")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("system randomness unavailable for development secret")]
    Randomness,
}

/// Mail API settings. Present only when URL, key and sender are all set.
#[derive(Clone, PartialEq, Eq)]
pub struct MailApiConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
}

impl std::fmt::Debug for MailApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailApiConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("sender_email", &self.sender_email)
            .field("sender_name", &self.sender_name)
            .finish()
    }
}

/// Superadmin bootstrap credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Resolved runtime configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub media_dir: PathBuf,
    pub jwt_secret: String,
    /// True when `JWT_SECRET` was missing and a random one was generated.
    pub ephemeral_secret: bool,
    pub session_ttl: Duration,
    pub refresh_window: Duration,
    pub otp_ttl: Duration,
    pub bcrypt_cost: u32,
    pub mail: Option<MailApiConfig>,
    pub seed_admin: Option<SeedAdmin>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("media_dir", &self.media_dir)
            .field("ephemeral_secret", &self.ephemeral_secret)
            .field("session_ttl", &self.session_ttl)
            .field("refresh_window", &self.refresh_window)
            .field("otp_ttl", &self.otp_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("mail", &self.mail)
            .field("seed_admin", &self.seed_admin)
            .finish_non_exhaustive()
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: i64,
) -> Result<Duration, ConfigError> {
    match lookup(name) {
        None => Ok(Duration::seconds(default)),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::seconds)
            .ok_or(ConfigError::Invalid {
                name,
                expected: "a positive number of seconds",
                value: raw,
            }),
    }
}

fn random_secret() -> Result<String, ConfigError> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| ConfigError::Randomness)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get(PORT_ENV) {
            None => DEFAULT_PORT,
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                expected: "a port number",
                value: raw,
            })?,
        };

        let (jwt_secret, ephemeral_secret) = match get(JWT_SECRET_ENV) {
            Some(secret) => (secret, false),
            None => (random_secret()?, true),
        };

        let session_ttl = parse_secs(&get, JWT_EXPIRATION_ENV, DEFAULT_JWT_EXPIRATION_SECS)?;
        let mut refresh_window =
            parse_secs(&get, JWT_REFRESH_WINDOW_ENV, DEFAULT_JWT_REFRESH_WINDOW_SECS)?;
        if refresh_window >= session_ttl {
            // Otherwise every request would refresh
            refresh_window = session_ttl / 2;
        }

        let bcrypt_cost = match get(BCRYPT_COST_ENV) {
            None => bcrypt::DEFAULT_COST,
            Some(raw) => raw
                .trim()
                .parse()
                .ok()
                .filter(|cost| (4..=31).contains(cost))
                .ok_or(ConfigError::Invalid {
                    name: BCRYPT_COST_ENV,
                    expected: "an integer between 4 and 31",
                    value: raw,
                })?,
        };

        let mail = match (get(MAIL_API_URL_ENV), get(MAIL_API_KEY_ENV), get(MAIL_SENDER_ENV)) {
            (Some(api_url), Some(api_key), Some(sender_email)) => Some(MailApiConfig {
                api_url,
                api_key,
                sender_email,
                sender_name: get(MAIL_SENDER_NAME_ENV),
            }),
            _ => None,
        };

        let seed_admin = match (get(SEED_ADMIN_EMAIL_ENV), get(SEED_ADMIN_PASSWORD_ENV)) {
            (Some(email), Some(password)) => Some(SeedAdmin { email, password }),
            _ => None,
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.into())),
            media_dir: PathBuf::from(
                get(MEDIA_DIR_ENV).unwrap_or_else(|| DEFAULT_MEDIA_DIR.into()),
            ),
            jwt_secret,
            ephemeral_secret,
            session_ttl,
            refresh_window,
            otp_ttl: parse_secs(&get, OTP_EXPIRATION_ENV, DEFAULT_OTP_EXPIRATION_SECS)?,
            bcrypt_cost,
            mail,
            seed_admin,
        })
    }

    /// Full path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.database_path(), PathBuf::from("./data/platform.redb"));
        assert_eq!(config.media_dir, PathBuf::from("./storage"));
        assert_eq!(config.session_ttl, Duration::seconds(86_400));
        assert_eq!(config.refresh_window, Duration::minutes(10));
        assert_eq!(config.otp_ttl, Duration::minutes(5));
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.mail.is_none());
        assert!(config.seed_admin.is_none());
    }

    #[test]
    fn missing_secret_generates_ephemeral_one() {
        let a = load(&[]).unwrap();
        let b = load(&[]).unwrap();
        assert!(a.ephemeral_secret);
        assert_ne!(a.jwt_secret, b.jwt_secret);

        let c = load(&[(JWT_SECRET_ENV, "s3cret")]).unwrap();
        assert!(!c.ephemeral_secret);
        assert_eq!(c.jwt_secret, "s3cret");
    }

    #[test]
    fn mail_requires_url_key_and_sender() {
        let partial = load(&[(MAIL_API_URL_ENV, "https://mail"), (MAIL_API_KEY_ENV, "k")]).unwrap();
        assert!(partial.mail.is_none());

        let full = load(&[
            (MAIL_API_URL_ENV, "https://mail"),
            (MAIL_API_KEY_ENV, "k"),
            (MAIL_SENDER_ENV, "noreply@x.com"),
        ])
        .unwrap();
        let mail = full.mail.unwrap();
        assert_eq!(mail.sender_email, "noreply@x.com");
        assert_eq!(mail.sender_name, None);
        assert!(!format!("{mail:?}").contains("\"k\""));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert!(matches!(
            load(&[(PORT_ENV, "eighty")]),
            Err(ConfigError::Invalid { name: PORT_ENV, .. })
        ));
        assert!(load(&[(OTP_EXPIRATION_ENV, "-5")]).is_err());
        assert!(load(&[(BCRYPT_COST_ENV, "2")]).is_err());
    }

    #[test]
    fn refresh_window_is_kept_below_ttl() {
        let config = load(&[
            (JWT_EXPIRATION_ENV, "300"),
            (JWT_REFRESH_WINDOW_ENV, "600"),
        ])
        .unwrap();
        assert_eq!(config.refresh_window, Duration::seconds(150));
    }

    #[test]
    fn seed_admin_needs_both_values() {
        assert!(load(&[(SEED_ADMIN_EMAIL_ENV, "root@x.com")]).unwrap().seed_admin.is_none());
        let seeded = load(&[
            (SEED_ADMIN_EMAIL_ENV, "root@x.com"),
            (SEED_ADMIN_PASSWORD_ENV, "pw"),
        ])
        .unwrap();
        assert_eq!(seeded.seed_admin.unwrap().email, "root@x.com");
    }
}
