//! Time-of-day representation
//!
//! All grid arithmetic works on whole minutes since midnight. Text forms
//! (`"09:30"`) only appear at the edges: parsing driver output and
//! rendering responses.

use crate::error::ScheduleError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Minutes in a day; `24:00` is a valid closing time but never a slot.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Minutes since midnight, `0..=1440`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(pub(crate) u16);

impl TimeOfDay {
    /// Midnight at the start of the day
    pub const MIDNIGHT: Self = Self(0);

    /// Midnight at the end of the day (`24:00`)
    pub const END_OF_DAY: Self = Self(MINUTES_PER_DAY);

    /// Create from minutes since midnight
    ///
    /// # Errors
    /// `ScheduleError::OutOfRange` past `24:00`
    pub fn from_minutes(minutes: u32) -> Result<Self, ScheduleError> {
        match u16::try_from(minutes) {
            Ok(m) if m <= MINUTES_PER_DAY => Ok(Self(m)),
            _ => Err(ScheduleError::OutOfRange { minutes }),
        }
    }

    /// Create from hour and minute components
    ///
    /// # Errors
    /// `ScheduleError::InvalidTime` for minutes above 59 or times past `24:00`
    pub fn from_hm(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        if minute > 59 {
            return Err(ScheduleError::InvalidTime(format!("{hour}:{minute:02}")));
        }
        Self::from_minutes(hour * 60 + minute)
            .map_err(|_| ScheduleError::InvalidTime(format!("{hour}:{minute:02}")))
    }

    /// Minutes since midnight
    #[inline]
    #[must_use]
    pub fn minutes(self) -> u16 {
        self.0
    }

    /// Hour component
    #[inline]
    #[must_use]
    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    /// Minute component
    #[inline]
    #[must_use]
    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    /// Add a number of minutes
    ///
    /// # Errors
    /// `ScheduleError::OutOfRange` if the result passes `24:00`
    pub fn add_minutes(self, minutes: u32) -> Result<Self, ScheduleError> {
        Self::from_minutes(u32::from(self.0).saturating_add(minutes))
    }

    /// Absolute distance in minutes
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> u16 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleError;

    /// Accepts `H:MM` and `HH:MM`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::InvalidTime(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).map_err(|_| invalid())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
