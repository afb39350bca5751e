//! Deadline-bounded status polling.
//!
//! Each poll function performs exactly one remote status call, advances the
//! caller's [`PollState`], and returns the status together with the
//! remaining budget. The loop (and its sleeps) belong to the caller.

use super::error::PkgError;
use super::service::{InstallRequestRecord, InstallService};
use std::time::Duration;
use tokio::time::Instant;

/// Cadence of publish/validation status polls.
pub const PUBLISH_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Cadence of install status polls.
pub const INSTALL_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Elapsed/remaining tracking for one polling phase.
#[derive(Debug, Clone, Copy)]
pub struct PollState {
    deadline: Instant,
    last_tick: Instant,
    remaining: Duration,
}

impl PollState {
    /// Start a phase with the given budget.
    #[must_use]
    pub fn start(budget: Duration) -> Self {
        Self::start_at(Instant::now(), budget)
    }

    #[must_use]
    pub fn start_at(now: Instant, budget: Duration) -> Self {
        Self {
            deadline: now + budget,
            last_tick: now,
            remaining: budget,
        }
    }

    /// Record a tick: `remaining -= now - last_tick`.
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.remaining = self.remaining.saturating_sub(elapsed);
        self.remaining
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// How long to sleep before the next poll, or `None` once the deadline
    /// has passed. Never sleeps past the deadline.
    #[must_use]
    pub fn next_delay(&self, interval: Duration) -> Option<Duration> {
        let left = self.deadline.checked_duration_since(Instant::now())?;
        if left.is_zero() {
            return None;
        }
        Some(interval.min(left))
    }
}

/// Poll the publish/validation status of a package version once.
pub async fn poll_publish_status<S: InstallService>(
    service: &S,
    version_id: &str,
    installation_key: Option<&str>,
    state: &mut PollState,
) -> Result<(String, Duration), PkgError> {
    let info = service.subscriber_version(version_id, installation_key).await?;
    let remaining = state.tick();
    Ok((info.install_validation_status, remaining))
}

/// Poll an install request once.
pub async fn poll_install_status<S: InstallService>(
    service: &S,
    request_id: &str,
    state: &mut PollState,
) -> Result<(InstallRequestRecord, Duration), PkgError> {
    let record = service.install_status(request_id).await?;
    let remaining = state.tick();
    Ok((record, remaining))
}

/// Whole minutes left, for status lines.
#[must_use]
pub fn minutes(d: Duration) -> u64 {
    d.as_secs() / 60
}
