//! slotpilot schedule model
//!
//! Pure building blocks shared by the booking engine:
//! - `TimeOfDay` minute-resolution clock values
//! - Occupied intervals and business-hours grids
//! - The availability calculator (free slots and merged free periods)
//!
//! # Example
//!
//! ```rust
//! use slotpilot_schedule::{compute, BusinessHours, OccupiedInterval, TimeOfDay};
//!
//! let hours = BusinessHours::default();
//! let busy = OccupiedInterval::appointment(
//!     "10:00".parse::<TimeOfDay>().unwrap(),
//!     "11:00".parse::<TimeOfDay>().unwrap(),
//!     "haircut",
//! )
//! .unwrap();
//!
//! let availability = compute(&[busy], &hours).unwrap();
//! assert!(!availability.is_free("10:30".parse().unwrap()));
//! ```

#![warn(unreachable_pub)]

pub mod availability;
pub mod error;
pub mod interval;
pub mod time;

pub use availability::{
    compute, merge_periods, nearest_slots, occupied_slots, Availability, FreePeriod,
};
pub use error::ScheduleError;
pub use interval::{BusinessHours, IntervalKind, OccupiedInterval};
pub use time::{TimeOfDay, MINUTES_PER_DAY};
