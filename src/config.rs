use anyhow::{bail, Context, Result};
use chrono::Duration;

use crate::store::SweepPolicy;

/// Sweeper configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Database ────────────────────────────────────────────────────────
    pub database_url: String,
    pub max_connections: u32,

    // ── Expiry sweep ────────────────────────────────────────────────────
    pub sweep_interval_secs: u64,
    /// Idle lifetime of plain temporary sessions.
    pub session_lifetime_secs: u64,
    /// Idle lifetime of "remember me" sessions.
    pub remember_lifetime_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,

            sweep_interval_secs: parse_secs(
                "SWEEP_INTERVAL_SECS",
                &std::env::var("SWEEP_INTERVAL_SECS").unwrap_or_else(|_| "300".into()),
            )?,
            session_lifetime_secs: parse_secs(
                "SESSION_LIFETIME_SECS",
                &std::env::var("SESSION_LIFETIME_SECS").unwrap_or_else(|_| "86400".into()),
            )?,
            remember_lifetime_secs: parse_secs(
                "REMEMBER_LIFETIME_SECS",
                &std::env::var("REMEMBER_LIFETIME_SECS").unwrap_or_else(|_| "1296000".into()),
            )?,
        };

        // fail at startup rather than inside the sweep task
        config.sweep_policy()?;
        Ok(config)
    }

    pub fn sweep_policy(&self) -> Result<SweepPolicy> {
        Ok(SweepPolicy {
            session_lifetime: lifetime("SESSION_LIFETIME_SECS", self.session_lifetime_secs)?,
            remember_lifetime: lifetime("REMEMBER_LIFETIME_SECS", self.remember_lifetime_secs)?,
        })
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

/// A strictly positive number of seconds.
fn parse_secs(name: &str, raw: &str) -> Result<u64> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid {name}: expected a positive number of seconds"))?;
    if secs == 0 {
        bail!("{name} must be greater than zero");
    }
    Ok(secs)
}

/// Seconds as a duration that can still be subtracted from "now".
fn lifetime(name: &str, secs: u64) -> Result<Duration> {
    let secs = i64::try_from(secs).with_context(|| format!("{name} is out of range"))?;
    let duration = Duration::try_seconds(secs).with_context(|| format!("{name} is out of range"))?;
    if duration <= Duration::zero() {
        bail!("{name} must be greater than zero");
    }
    if chrono::Utc::now().checked_sub_signed(duration).is_none() {
        bail!("{name} is out of range");
    }
    Ok(duration)
}
