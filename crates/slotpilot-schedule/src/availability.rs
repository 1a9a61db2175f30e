//! Availability calculator
//!
//! Turns occupied intervals plus business hours into free slots and merged
//! free periods. Everything here is synchronous and allocation-only, so it
//! can be called from any number of tasks without coordination.
//!
//! # Semantics
//! - A candidate slot `s` is occupied iff some interval satisfies
//!   `start <= s < end`. Overlapping intervals are therefore unioned
//!   implicitly.
//! - Only grid points are tested. A short break that falls between two
//!   grid points occupies nothing.

use crate::error::ScheduleError;
use crate::interval::{BusinessHours, OccupiedInterval};
use crate::time::TimeOfDay;
use serde::{Deserialize, Serialize};

/// Maximal run of consecutive free slots
///
/// `end` is the start of the last free slot in the run, not the minute the
/// run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreePeriod {
    /// First free slot
    pub start: TimeOfDay,
    /// Last free slot
    pub end: TimeOfDay,
}

impl FreePeriod {
    /// Create a new period
    #[inline]
    #[must_use]
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }
}

/// Calculator output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Free slot starts, ascending
    pub free_slots: Vec<TimeOfDay>,
    /// Maximal free runs, ascending
    pub free_periods: Vec<FreePeriod>,
}

impl Availability {
    /// Whether `slot` is one of the free slots
    #[must_use]
    pub fn is_free(&self, slot: TimeOfDay) -> bool {
        self.free_slots.binary_search(&slot).is_ok()
    }

    /// Up to `limit` free slots closest to `requested`, ascending
    #[must_use]
    pub fn suggestions_near(&self, requested: TimeOfDay, limit: usize) -> Vec<TimeOfDay> {
        nearest_slots(&self.free_slots, requested, limit)
    }
}

/// Up to `limit` of `slots` closest to `requested`, ascending
///
/// Ties on distance prefer the earlier slot.
#[must_use]
pub fn nearest_slots(slots: &[TimeOfDay], requested: TimeOfDay, limit: usize) -> Vec<TimeOfDay> {
    let mut ranked = slots.to_vec();
    ranked.sort_by_key(|slot| (slot.distance(requested), *slot));
    ranked.truncate(limit);
    ranked.sort_unstable();
    ranked
}

/// Compute free slots and free periods
///
/// # Errors
/// - `ScheduleError::InvalidConfiguration` for malformed business hours
/// - `ScheduleError::InvalidInterval` for an interval with `end <= start`
pub fn compute(
    occupied: &[OccupiedInterval],
    hours: &BusinessHours,
) -> Result<Availability, ScheduleError> {
    hours.validate()?;
    for interval in occupied {
        interval.validate()?;
    }

    let free_slots: Vec<TimeOfDay> = hours
        .candidate_slots()
        .into_iter()
        .filter(|slot| !is_occupied(occupied, *slot))
        .collect();
    let free_periods = periods_from_slots(&free_slots, hours.granularity_minutes);

    Ok(Availability {
        free_slots,
        free_periods,
    })
}

/// Candidate slots covered by at least one interval, ascending
///
/// # Errors
/// Same as [`compute`]
pub fn occupied_slots(
    occupied: &[OccupiedInterval],
    hours: &BusinessHours,
) -> Result<Vec<TimeOfDay>, ScheduleError> {
    hours.validate()?;
    for interval in occupied {
        interval.validate()?;
    }
    Ok(hours
        .candidate_slots()
        .into_iter()
        .filter(|slot| is_occupied(occupied, *slot))
        .collect())
}

/// Coalesce periods that overlap or sit exactly one grid step apart
///
/// Input order does not matter. `merge_periods(&merge_periods(x, g), g)`
/// equals `merge_periods(x, g)`.
#[must_use]
pub fn merge_periods(periods: &[FreePeriod], granularity_minutes: u16) -> Vec<FreePeriod> {
    let mut sorted = periods.to_vec();
    sorted.sort_by_key(|p| (p.start, p.end));

    let mut merged: Vec<FreePeriod> = Vec::with_capacity(sorted.len());
    for period in sorted {
        match merged.last_mut() {
            Some(last)
                if u32::from(period.start.minutes())
                    <= u32::from(last.end.minutes()) + u32::from(granularity_minutes) =>
            {
                last.end = last.end.max(period.end);
            }
            _ => merged.push(period),
        }
    }
    merged
}

fn is_occupied(occupied: &[OccupiedInterval], slot: TimeOfDay) -> bool {
    occupied.iter().any(|interval| interval.occupies(slot))
}

fn periods_from_slots(free_slots: &[TimeOfDay], granularity_minutes: u16) -> Vec<FreePeriod> {
    let mut periods: Vec<FreePeriod> = Vec::new();
    for &slot in free_slots {
        match periods.last_mut() {
            Some(current)
                if slot.minutes() - current.end.minutes() == granularity_minutes =>
            {
                current.end = slot;
            }
            _ => periods.push(FreePeriod::new(slot, slot)),
        }
    }
    periods
}
