//! Occupied intervals and business hours

use crate::error::ScheduleError;
use crate::time::TimeOfDay;
use serde::{Deserialize, Serialize};

/// What occupies an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    /// Booked appointment
    Appointment,
    /// Blocked time (lunch, pause)
    Break,
}

/// Half-open occupied range `[start, end)`
///
/// Intervals from the same column may overlap; consumers treat a set of
/// intervals as its union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupiedInterval {
    /// First occupied minute
    pub start: TimeOfDay,
    /// First minute after the interval
    pub end: TimeOfDay,
    /// Appointment or break
    pub kind: IntervalKind,
    /// Free-form label shown by the remote calendar
    pub label: String,
}

impl OccupiedInterval {
    /// Create a new interval
    ///
    /// # Errors
    /// `ScheduleError::InvalidInterval` when `end <= start`
    pub fn new(
        start: TimeOfDay,
        end: TimeOfDay,
        kind: IntervalKind,
        label: impl Into<String>,
    ) -> Result<Self, ScheduleError> {
        let interval = Self {
            start,
            end,
            kind,
            label: label.into(),
        };
        interval.validate()?;
        Ok(interval)
    }

    /// Appointment interval shorthand
    ///
    /// # Errors
    /// Same as [`OccupiedInterval::new`]
    pub fn appointment(
        start: TimeOfDay,
        end: TimeOfDay,
        label: impl Into<String>,
    ) -> Result<Self, ScheduleError> {
        Self::new(start, end, IntervalKind::Appointment, label)
    }

    /// Check the `end > start` invariant
    ///
    /// # Errors
    /// `ScheduleError::InvalidInterval` when violated
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.end <= self.start {
            return Err(ScheduleError::InvalidInterval {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Half-open containment of a slot start
    #[inline]
    #[must_use]
    pub fn occupies(&self, slot: TimeOfDay) -> bool {
        self.start <= slot && slot < self.end
    }

    /// Length in minutes
    #[inline]
    #[must_use]
    pub fn duration_minutes(&self) -> u16 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }
}

impl<'de> Deserialize<'de> for OccupiedInterval {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            start: TimeOfDay,
            end: TimeOfDay,
            kind: IntervalKind,
            #[serde(default)]
            label: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.start, raw.end, raw.kind, raw.label).map_err(serde::de::Error::custom)
    }
}

/// Opening hours and slot grid for one professional's day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    /// First bookable slot start
    pub open: TimeOfDay,
    /// End of the day; never itself a slot
    pub close: TimeOfDay,
    /// Distance between consecutive slot starts
    pub granularity_minutes: u16,
}

impl BusinessHours {
    /// Create validated business hours
    ///
    /// # Errors
    /// `ScheduleError::InvalidConfiguration` if the grid is not well-formed
    pub fn new(
        open: TimeOfDay,
        close: TimeOfDay,
        granularity_minutes: u16,
    ) -> Result<Self, ScheduleError> {
        let hours = Self {
            open,
            close,
            granularity_minutes,
        };
        hours.validate()?;
        Ok(hours)
    }

    /// Check `open < close`, `granularity > 0` and that the granularity
    /// divides the open span evenly
    ///
    /// # Errors
    /// `ScheduleError::InvalidConfiguration` describing the first violation
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.open >= self.close {
            return Err(ScheduleError::InvalidConfiguration(format!(
                "opening time {} must be before closing time {}",
                self.open, self.close
            )));
        }
        if self.granularity_minutes == 0 {
            return Err(ScheduleError::InvalidConfiguration(
                "slot granularity must be positive".to_string(),
            ));
        }
        let span = self.close.minutes() - self.open.minutes();
        if span % self.granularity_minutes != 0 {
            return Err(ScheduleError::InvalidConfiguration(format!(
                "granularity of {} minutes does not divide {}-{} ({} minutes)",
                self.granularity_minutes, self.open, self.close, span
            )));
        }
        Ok(())
    }

    /// All candidate slot starts in `[open, close)`, ascending
    ///
    /// Assumes the hours are valid; a zero granularity yields no slots.
    #[must_use]
    pub fn candidate_slots(&self) -> Vec<TimeOfDay> {
        if self.granularity_minutes == 0 {
            return Vec::new();
        }
        (self.open.minutes()..self.close.minutes())
            .step_by(usize::from(self.granularity_minutes))
            .map(TimeOfDay)
            .collect()
    }

    /// Whether `slot` lies on the grid
    #[must_use]
    pub fn is_on_grid(&self, slot: TimeOfDay) -> bool {
        self.granularity_minutes != 0
            && slot >= self.open
            && slot < self.close
            && (slot.minutes() - self.open.minutes()) % self.granularity_minutes == 0
    }
}

impl Default for BusinessHours {
    /// 09:00-20:00 on a 30 minute grid
    fn default() -> Self {
        Self {
            open: TimeOfDay(9 * 60),
            close: TimeOfDay(20 * 60),
            granularity_minutes: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn interval_rejects_empty_and_inverted() {
        assert!(OccupiedInterval::appointment(t("10:00"), t("10:00"), "").is_err());
        assert!(OccupiedInterval::appointment(t("10:00"), t("09:00"), "").is_err());
        assert!(OccupiedInterval::appointment(t("09:00"), t("10:00"), "").is_ok());
    }

    #[test]
    fn occupancy_is_half_open() {
        let i = OccupiedInterval::appointment(t("10:00"), t("11:00"), "cut").unwrap();
        assert!(i.occupies(t("10:00")));
        assert!(i.occupies(t("10:59")));
        assert!(!i.occupies(t("11:00")));
        assert!(!i.occupies(t("09:59")));
    }

    #[test]
    fn deserialize_enforces_invariant() {
        let bad = r#"{"start":"11:00","end":"10:00","kind":"break"}"#;
        assert!(serde_json::from_str::<OccupiedInterval>(bad).is_err());

        let good = r#"{"start":"10:00","end":"11:00","kind":"break"}"#;
        let i: OccupiedInterval = serde_json::from_str(good).unwrap();
        assert_eq!(i.kind, IntervalKind::Break);
        assert!(i.label.is_empty());
    }

    #[test]
    fn hours_validation() {
        assert!(BusinessHours::new(t("09:00"), t("20:00"), 30).is_ok());
        assert!(BusinessHours::new(t("14:00"), t("20:00"), 10).is_ok());
        assert!(BusinessHours::new(t("20:00"), t("09:00"), 30).is_err());
        assert!(BusinessHours::new(t("09:00"), t("20:00"), 0).is_err());
        assert!(BusinessHours::new(t("09:00"), t("20:10"), 30).is_err());
    }

    #[test]
    fn candidate_slots_exclude_close() {
        let hours = BusinessHours::default();
        let slots = hours.candidate_slots();
        assert_eq!(slots.len(), 22);
        assert_eq!(slots.first().copied(), Some(t("09:00")));
        assert_eq!(slots.last().copied(), Some(t("19:30")));
        assert!(hours.is_on_grid(t("10:30")));
        assert!(!hours.is_on_grid(t("10:15")));
        assert!(!hours.is_on_grid(t("20:00")));
    }
}
