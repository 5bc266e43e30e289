use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// Accounts promoted to admin at startup.
    pub admin_emails: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = get("LARDER_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("LARDER_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let host = get("LARDER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("LARDER_PORT")
            .unwrap_or_else(|| "8000".into())
            .parse()
            .context("LARDER_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_path: PathBuf = get("LARDER_DB_PATH")
            .unwrap_or_else(|| "larder.db".into())
            .into();

        let ttl_hours: i64 = match get("LARDER_TOKEN_TTL_HOURS") {
            Some(raw) => raw
                .parse()
                .context("LARDER_TOKEN_TTL_HOURS must be a whole number of hours")?,
            None => 24,
        };
        if ttl_hours < 1 {
            bail!("LARDER_TOKEN_TTL_HOURS must be at least 1");
        }

        let admin_emails = get("LARDER_ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            addr,
            db_path,
            jwt_secret,
            token_ttl: chrono::Duration::hours(ttl_hours),
            admin_emails,
        })
    }
}
