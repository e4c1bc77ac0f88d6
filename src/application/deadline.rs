//! Admission cutoff for a review run.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Local, LocalResult, NaiveTime, TimeZone, Utc};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::RunTimezone;
use crate::domain::ports::Clock;

/// Parse a `HH:MM` wall-clock time.
pub fn parse_time_of_day(raw: &str) -> DomainResult<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| {
        DomainError::ValidationFailed(format!("deadline '{raw}' is not HH:MM: {e}"))
    })
}

/// First instant strictly after `anchor` whose local wall clock reads `time`.
///
/// A cutoff at or before the anchor's time of day falls on the next day, so a
/// 06:00 cutoff for a run started at 23:30 lands the following morning. If
/// `time` does not exist on that day (a DST gap) the hour after is used.
pub fn next_occurrence<Tz: TimeZone>(time: NaiveTime, anchor: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = anchor.timezone();
    let mut day = anchor.date_naive();

    for _ in 0..3 {
        let naive = day.and_time(time);
        let candidate = match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => tz
                .from_local_datetime(&(naive + ChronoDuration::hours(1)))
                .earliest(),
        };
        if let Some(candidate) = candidate {
            if candidate > *anchor {
                return Some(candidate);
            }
        }
        day = day.succ_opt()?;
    }
    None
}

/// Blocks new admissions once the cutoff is reached. Never preempts.
#[derive(Clone)]
pub struct DeadlineEnforcer {
    cutoff: Option<DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl DeadlineEnforcer {
    pub fn new(cutoff: DateTime<Utc>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cutoff: Some(cutoff),
            clock,
        }
    }

    /// No cutoff; every repository is admissible.
    pub fn unbounded(clock: Arc<dyn Clock>) -> Self {
        Self {
            cutoff: None,
            clock,
        }
    }

    /// Cutoff at the next occurrence of `HH:MM` in `timezone` after `run_start`.
    pub fn from_time_of_day(
        raw: &str,
        run_start: DateTime<Utc>,
        timezone: RunTimezone,
        clock: Arc<dyn Clock>,
    ) -> DomainResult<Self> {
        let time = parse_time_of_day(raw)?;
        let cutoff = match timezone {
            RunTimezone::Local => next_occurrence(time, &run_start.with_timezone(&Local))
                .map(|dt| dt.with_timezone(&Utc)),
            RunTimezone::Named(tz) => next_occurrence(time, &run_start.with_timezone(&tz))
                .map(|dt| dt.with_timezone(&Utc)),
        }
        .ok_or_else(|| DomainError::ValidationFailed(format!("deadline '{raw}' cannot be placed")))?;
        Ok(Self::new(cutoff, clock))
    }

    pub fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.cutoff
    }

    /// True at or after the cutoff.
    pub fn is_past(&self) -> bool {
        self.cutoff.is_some_and(|cutoff| self.clock.now() >= cutoff)
    }

    pub fn time_remaining(&self) -> Option<ChronoDuration> {
        self.cutoff
            .map(|cutoff| (cutoff - self.clock.now()).max(ChronoDuration::zero()))
    }
}

impl std::fmt::Debug for DeadlineEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadlineEnforcer")
            .field("cutoff", &self.cutoff)
            .finish_non_exhaustive()
    }
}
