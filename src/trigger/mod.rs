//! Trigger events that start an export run
//!
//! The schedule itself belongs to the host (cron, a managed timer, a
//! Kubernetes CronJob). [`IntervalTrigger`] is a small in-process stand-in
//! for running the exporter as a long-lived process.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// How late a tick may be observed before it counts as past due
const PAST_DUE_TOLERANCE: Duration = Duration::from_secs(1);

/// A single firing of the trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Run timestamp, captured once and reused for naming and logging
    pub fired_at: DateTime<Utc>,

    /// Whether the firing happened later than scheduled
    pub past_due: bool,
}

impl TriggerEvent {
    /// An on-time firing at the current instant
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// An on-time firing at a given instant
    pub fn at(fired_at: DateTime<Utc>) -> Self {
        Self {
            fired_at,
            past_due: false,
        }
    }
}

/// Fires on a fixed period, starting immediately
pub struct IntervalTrigger {
    interval: Interval,
}

impl IntervalTrigger {
    /// # Arguments
    /// * `period` - Time between firings; must be non-zero
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        // A slow run shifts the schedule instead of causing a burst of catch-up runs
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Wait for the next firing
    pub async fn next(&mut self) -> TriggerEvent {
        let scheduled = self.interval.tick().await;
        let lateness = Instant::now().saturating_duration_since(scheduled);

        TriggerEvent {
            fired_at: Utc::now(),
            past_due: lateness > PAST_DUE_TOLERANCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_at_is_on_time() {
        let fired_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let event = TriggerEvent::at(fired_at);
        assert_eq!(event.fired_at, fired_at);
        assert!(!event.past_due);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let start = Instant::now();
        let mut trigger = IntervalTrigger::new(Duration::from_secs(60));

        let event = trigger.next().await;
        assert!(!event.past_due);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_period() {
        let start = Instant::now();
        let mut trigger = IntervalTrigger::new(Duration::from_secs(60));

        trigger.next().await;
        trigger.next().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        assert_eq!(trigger.period(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_tick_is_past_due() {
        let mut trigger = IntervalTrigger::new(Duration::from_secs(10));
        trigger.next().await;

        // Simulate a run that overshoots the period
        tokio::time::advance(Duration::from_secs(15)).await;

        let event = trigger.next().await;
        assert!(event.past_due);
    }
}
