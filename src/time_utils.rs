// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Time left on a grant, clamped at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Remaining {
    seconds: i64,
}

impl Remaining {
    pub fn until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            seconds: (expires_at - now).num_seconds().max(0),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.seconds == 0
    }

    pub fn as_secs(&self) -> i64 {
        self.seconds
    }
}

/// `Nd Nh Nm` from one day up, `Nh Nm Ns` from one hour, else `Nm Ns`.
impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_expired() {
            return write!(f, "Expired");
        }
        let days = self.seconds / 86_400;
        let hours = (self.seconds % 86_400) / 3_600;
        let minutes = (self.seconds % 3_600) / 60;
        let seconds = self.seconds % 60;

        if days > 0 {
            write!(f, "{}d {}h {}m", days, hours, minutes)
        } else if hours > 0 {
            write!(f, "{}h {}m {}s", hours, minutes, seconds)
        } else {
            write!(f, "{}m {}s", minutes, seconds)
        }
    }
}
