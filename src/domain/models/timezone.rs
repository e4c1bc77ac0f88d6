//! Wall-clock zone used for the admission deadline and branch timestamps.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::domain::errors::DomainError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunTimezone {
    /// Whatever zone the host is configured with.
    #[default]
    Local,
    Named(Tz),
}

impl RunTimezone {
    /// `None` means the host zone.
    pub fn from_config(raw: Option<&str>) -> Result<Self, DomainError> {
        raw.map_or(Ok(Self::Local), str::parse)
    }

    /// What a wall clock in this zone reads at `at`.
    pub fn wall_clock(&self, at: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Local => at.with_timezone(&Local).naive_local(),
            Self::Named(tz) => at.with_timezone(tz).naive_local(),
        }
    }
}

impl FromStr for RunTimezone {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| DomainError::ValidationFailed(format!("unknown timezone '{s}'")))
    }
}

impl fmt::Display for RunTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Named(tz) => f.write_str(tz.name()),
        }
    }
}
