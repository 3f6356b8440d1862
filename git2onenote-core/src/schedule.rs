//! Daily trigger: fires a full sync pass once a day at a configured local
//! time.
//!
//! The firing instant is computed with pure [`DailyTime::next_occurrence`]
//! arithmetic so the schedule is unit-testable without a runtime. The run
//! loop sleeps until the next occurrence, then *spawns* the pass as a
//! detached task and immediately re-arms: timer ticks never block on a
//! running pass, and an overlapping trigger is handled by the coordinator's
//! per-link slots like any other.

use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{error, info};

use crate::contract::{NoteSink, RepoSource};
use crate::error::SyncError;
use crate::trigger::TriggerCoordinator;

/// A wall-clock time of day in 24-hour `HH:MM` form, local timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime {
    hour: u32,
    minute: u32,
}

impl DailyTime {
    /// Parse `"HH:MM"`. Malformed or out-of-range values are configuration
    /// errors, rejected at startup.
    pub fn parse(value: &str) -> Result<Self, SyncError> {
        let (hour, minute) = value.split_once(':').ok_or_else(|| {
            SyncError::Configuration(format!("invalid daily time '{value}', expected HH:MM"))
        })?;
        let hour: u32 = hour.parse().map_err(|_| {
            SyncError::Configuration(format!("invalid hour in daily time '{value}'"))
        })?;
        let minute: u32 = minute.parse().map_err(|_| {
            SyncError::Configuration(format!("invalid minute in daily time '{value}'"))
        })?;
        if hour > 23 || minute > 59 {
            return Err(SyncError::Configuration(format!(
                "daily time '{value}' out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// The next instant this time of day occurs strictly after `now`: today
    /// if the firing time is still ahead, otherwise tomorrow.
    pub fn next_occurrence(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now
            .date()
            .and_hms_opt(self.hour, self.minute, 0)
            .expect("hour and minute validated at parse");
        if today > now {
            today
        } else {
            today + chrono::Duration::days(1)
        }
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Sleep-fire loop for the daily trigger. Runs until the task is dropped.
pub async fn run_daily<S, N>(coordinator: Arc<TriggerCoordinator<S, N>>, at: DailyTime)
where
    S: RepoSource + 'static,
    N: NoteSink + 'static,
{
    info!(at = %at, "[SYNC] Daily trigger armed");
    loop {
        let now = Local::now().naive_local();
        let next = at.next_occurrence(now);
        let wait = (next - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));
        info!(next = %next, wait_secs = wait.as_secs(), "[SYNC] Sleeping until next scheduled sync");
        tokio::time::sleep(wait).await;

        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            info!("[SYNC] Daily trigger fired, starting pass for all links");
            for (name, outcome) in coordinator.run_all().await {
                match outcome {
                    Ok(result) => info!(
                        link = %name,
                        uploaded = result.uploaded.len(),
                        skipped = result.skipped.len(),
                        failed = result.failed.len(),
                        "[SYNC] Scheduled pass finished"
                    ),
                    Err(e) => error!(link = %name, error = %e, "[SYNC] Scheduled pass failed"),
                }
            }
        });
    }
}
