//! Alarm scheduling capability
//!
//! Every per-key durable actor (Build Orchestrator, Event Store flush timer,
//! Session Metrics Aggregator) schedules a single future wake-up for itself
//! rather than polling. This generalizes the Cloudflare Durable Objects
//! `alarm.get()/alarm.set(time)` pair into a platform-neutral trait so the
//! same component logic runs whether the host is a DO-style actor runtime or
//! a plain tokio task driven by this crate's [`InProcessAlarm`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Schedules and queries a single pending wake-up time per actor instance.
#[async_trait]
pub trait Alarm: Send + Sync {
    /// The currently scheduled wake-up time, if any.
    async fn get(&self) -> Option<DateTime<Utc>>;

    /// Schedule (or reschedule) the wake-up for `at`. Setting a new time
    /// replaces any previously scheduled one.
    async fn set(&self, at: DateTime<Utc>);

    /// Cancel the pending wake-up, if any.
    async fn delete(&self);
}

/// In-process [`Alarm`] backed by a tokio sleep, used by component tests and
/// by the app binary when no host-provided alarm scheduler is wired in.
pub struct InProcessAlarm {
    scheduled: Mutex<Option<DateTime<Utc>>>,
}

impl Default for InProcessAlarm {
    fn default() -> Self {
        Self {
            scheduled: Mutex::new(None),
        }
    }
}

impl InProcessAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration until the scheduled wake-up, or `None` if nothing is
    /// scheduled or the time has already passed (fire immediately).
    pub fn delay_until_due(&self) -> Option<std::time::Duration> {
        let at = (*self.scheduled.lock().unwrap())?;
        let now = Utc::now();
        if at <= now {
            Some(std::time::Duration::ZERO)
        } else {
            (at - now).to_std().ok()
        }
    }
}

#[async_trait]
impl Alarm for InProcessAlarm {
    async fn get(&self) -> Option<DateTime<Utc>> {
        *self.scheduled.lock().unwrap()
    }

    async fn set(&self, at: DateTime<Utc>) {
        *self.scheduled.lock().unwrap() = Some(at);
    }

    async fn delete(&self) {
        *self.scheduled.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn set_then_get_returns_scheduled_time() {
        let alarm = InProcessAlarm::new();
        assert_eq!(alarm.get().await, None);

        let at = Utc::now() + Duration::seconds(30);
        alarm.set(at).await;
        assert_eq!(alarm.get().await, Some(at));
    }

    #[tokio::test]
    async fn set_replaces_prior_schedule() {
        let alarm = InProcessAlarm::new();
        let first = Utc::now() + Duration::seconds(30);
        let second = Utc::now() + Duration::seconds(60);
        alarm.set(first).await;
        alarm.set(second).await;
        assert_eq!(alarm.get().await, Some(second));
    }

    #[tokio::test]
    async fn delete_clears_schedule() {
        let alarm = InProcessAlarm::new();
        alarm.set(Utc::now() + Duration::seconds(30)).await;
        alarm.delete().await;
        assert_eq!(alarm.get().await, None);
    }

    #[test]
    fn delay_until_due_is_zero_when_overdue() {
        let alarm = InProcessAlarm::new();
        *alarm.scheduled.lock().unwrap() = Some(Utc::now() - Duration::seconds(5));
        assert_eq!(alarm.delay_until_due(), Some(std::time::Duration::ZERO));
    }
}
