//! Background expiry sweep for temporary tokens.
//!
//! Each cycle makes two independent `invalidate_old` calls: plain sessions
//! idle longer than the session lifetime, then "remember me" sessions idle
//! longer than the remember lifetime.

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use super::mapper::TokenMapper;
use crate::error::TokenError;
use crate::token::RememberFlag;

/// Floor for the daemon's sleep so a zero interval cannot busy-loop.
pub const MIN_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Idle lifetimes after which temporary tokens are swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    pub session_lifetime: Duration,
    pub remember_lifetime: Duration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            session_lifetime: Duration::days(1),
            remember_lifetime: Duration::days(15),
        }
    }
}

/// Run one sweep relative to `now`.
pub async fn sweep_once(
    mapper: &TokenMapper,
    policy: &SweepPolicy,
    now: DateTime<Utc>,
) -> Result<(), TokenError> {
    let session_cutoff = cutoff(now, policy.session_lifetime)?;
    let remember_cutoff = cutoff(now, policy.remember_lifetime)?;

    mapper
        .invalidate_old(session_cutoff, RememberFlag::DoNotRemember)
        .await?;
    mapper
        .invalidate_old(remember_cutoff, RememberFlag::Remember)
        .await?;
    Ok(())
}

/// `now - lifetime`. The lifetime must be positive so the cutoff never lands
/// at or after `now`.
fn cutoff(now: DateTime<Utc>, lifetime: Duration) -> Result<DateTime<Utc>, TokenError> {
    if lifetime <= Duration::zero() {
        return Err(TokenError::InvalidPolicy(format!(
            "lifetime must be positive, got {}s",
            lifetime.num_seconds()
        )));
    }
    now.checked_sub_signed(lifetime).ok_or_else(|| {
        TokenError::InvalidPolicy(format!(
            "lifetime of {}s is out of range",
            lifetime.num_seconds()
        ))
    })
}

/// Start the sweep loop. Failures are logged and retried next cycle.
pub async fn sweep_daemon(mapper: TokenMapper, policy: SweepPolicy, interval: std::time::Duration) {
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    info!("Token sweep daemon started (interval: {}s)", interval.as_secs());

    loop {
        tokio::time::sleep(interval).await;
        match sweep_once(&mapper, &policy, Utc::now()).await {
            Ok(()) => info!("Token sweep cycle complete"),
            Err(e) => error!("Token sweep cycle error: {e}"),
        }
    }
}
