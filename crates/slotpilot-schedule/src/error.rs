//! Error types for the schedule model
//!
//! Every error here describes malformed input. Well-formed input never fails.

use crate::time::TimeOfDay;

/// Schedule model error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Business hours or grid settings cannot produce a deterministic grid
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Occupied interval does not end after it starts
    #[error("invalid interval {start}-{end}: end must be after start")]
    InvalidInterval {
        /// Interval start
        start: TimeOfDay,
        /// Interval end
        end: TimeOfDay,
    },

    /// Time-of-day text could not be parsed
    #[error("invalid time of day: {0:?}")]
    InvalidTime(String),

    /// Arithmetic left the 00:00..=24:00 range
    #[error("time out of range: {minutes} minutes since midnight")]
    OutOfRange {
        /// Offending minute value
        minutes: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_error_mentions_bounds() {
        let err = ScheduleError::InvalidInterval {
            start: TimeOfDay::from_hm(10, 0).unwrap(),
            end: TimeOfDay::from_hm(9, 30).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "invalid interval 10:00-09:30: end must be after start"
        );
    }
}
