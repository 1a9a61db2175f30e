//! Schedule extractor
//!
//! Reads the occupied intervals of one professional on one date out of the
//! remote calendar view and turns them into typed intervals.

use crate::config::EngineConfig;
use crate::driver::{normalize_name, RawEvent, UiDriver};
use crate::error::BookingError;
use crate::retry::RetryPolicy;
use chrono::NaiveDate;
use regex::Regex;
use slotpilot_schedule::{IntervalKind, OccupiedInterval, TimeOfDay};
use std::sync::OnceLock;
use std::time::Duration;

/// `HH:MM – HH:MM` with en dash, em dash or hyphen, anywhere in the title
const TITLE_PATTERN: &str = r"(\d{1,2}:\d{2})\s*[–—-]\s*(\d{1,2}:\d{2})";

fn title_range() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TITLE_PATTERN).expect("title pattern is a valid regex"))
}

/// Occupied time of one professional, as displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSchedule {
    /// Professional name as displayed in the column header
    pub professional: String,
    /// Column index within the roster
    pub column: usize,
    /// All displayed professionals, in display order
    pub roster: Vec<String>,
    /// Parsed intervals; unparseable events are dropped
    pub occupied: Vec<OccupiedInterval>,
}

/// Reads occupied intervals through a driver
#[derive(Debug, Clone)]
pub struct ScheduleExtractor {
    retry: RetryPolicy,
    step_timeout: Duration,
}

impl ScheduleExtractor {
    /// Create new extractor
    #[inline]
    #[must_use]
    pub fn new(retry: RetryPolicy, step_timeout: Duration) -> Self {
        Self {
            retry,
            step_timeout,
        }
    }

    /// Extractor using the engine's retry policy and step timeout
    #[inline]
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.retry.clone(), config.step_timeout())
    }

    /// Fetch the occupied intervals of `professional` on `date`
    ///
    /// # Errors
    /// - `ProfessionalNotFound` / `AmbiguousProfessional` from roster matching
    /// - `Timeout` when a driver call times out or keeps failing transiently
    /// - `ExternalSystem` for any other driver failure
    pub async fn fetch_occupied(
        &self,
        driver: &dyn UiDriver,
        date: NaiveDate,
        professional: &str,
    ) -> Result<ExtractedSchedule, BookingError> {
        let limit = self.step_timeout;

        let view = self
            .retry
            .run_step("open_schedule_view", limit, move || {
                driver.open_schedule_view(date)
            })
            .await?;

        let view_ref = &view;
        let roster = self
            .retry
            .run_step("professional_roster", limit, move || {
                driver.professional_roster(view_ref)
            })
            .await?;

        let column = match_professional(professional, &roster)?;

        let events = self
            .retry
            .run_step("column_events", limit, move || {
                driver.column_events(view_ref, column)
            })
            .await?;

        let total = events.len();
        let occupied: Vec<OccupiedInterval> = events.iter().filter_map(parse_event).collect();
        tracing::debug!(
            "Extracted {} of {} events for {} on {}",
            occupied.len(),
            total,
            roster[column],
            date
        );

        Ok(ExtractedSchedule {
            professional: roster[column].clone(),
            column,
            roster,
            occupied,
        })
    }
}

/// Resolve a professional query against the displayed roster
///
/// # Errors
/// - `ProfessionalNotFound` when no name contains the query
/// - `AmbiguousProfessional` when several do and none is an exact match
pub fn match_professional(query: &str, roster: &[String]) -> Result<usize, BookingError> {
    let wanted = normalize_name(query);
    if wanted.is_empty() {
        return Err(BookingError::InvalidRequest(
            "professional must not be blank".to_string(),
        ));
    }

    let hits: Vec<usize> = roster
        .iter()
        .enumerate()
        .filter(|(_, name)| normalize_name(name).contains(&wanted))
        .map(|(i, _)| i)
        .collect();

    match hits.as_slice() {
        [] => Err(BookingError::ProfessionalNotFound {
            query: query.to_string(),
            available: roster.to_vec(),
        }),
        [only] => Ok(*only),
        many => {
            let exact: Vec<usize> = many
                .iter()
                .copied()
                .filter(|&i| normalize_name(&roster[i]) == wanted)
                .collect();
            match exact.as_slice() {
                [single] => Ok(*single),
                _ => Err(BookingError::AmbiguousProfessional {
                    query: query.to_string(),
                    matches: many.iter().map(|&i| roster[i].clone()).collect(),
                }),
            }
        }
    }
}

/// Parse one event element into an interval
///
/// The label is the title with the time range removed. Returns `None` for
/// titles without a time range and for ranges with `end <= start`.
#[must_use]
pub fn parse_event(event: &RawEvent) -> Option<OccupiedInterval> {
    let Some(caps) = title_range().captures(&event.title) else {
        tracing::debug!("Dropping event without time range: {:?}", event.title);
        return None;
    };

    let start: TimeOfDay = caps[1].parse().ok()?;
    let end: TimeOfDay = caps[2].parse().ok()?;
    let range = caps.get(0)?;
    let before = event.title[..range.start()]
        .trim_start()
        .trim_end_matches(is_separator);
    let after = event.title[range.end()..]
        .trim_start_matches(is_separator)
        .trim_end();
    let label = [before, after]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let kind = if event.is_break {
        IntervalKind::Break
    } else {
        IntervalKind::Appointment
    };

    match OccupiedInterval::new(start, end, kind, label) {
        Ok(interval) => Some(interval),
        Err(e) => {
            tracing::debug!("Dropping event {:?}: {}", event.title, e);
            None
        }
    }
}

fn is_separator(c: char) -> bool {
    c == ':' || c == '-' || c.is_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use slotpilot_schedule::{compute, BusinessHours};

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn roster(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn parses_en_dash_title() {
        let interval = parse_event(&RawEvent::appointment("10:00 – 11:00 : Carlos")).unwrap();
        assert_eq!(interval.start, t("10:00"));
        assert_eq!(interval.end, t("11:00"));
        assert_eq!(interval.kind, IntervalKind::Appointment);
        assert_eq!(interval.label, "Carlos");
    }

    #[test]
    fn parses_hyphen_and_em_dash() {
        let hyphen = parse_event(&RawEvent::appointment("9:30-10:00 corte")).unwrap();
        assert_eq!((hyphen.start, hyphen.label.as_str()), (t("09:30"), "corte"));

        let em = parse_event(&RawEvent::blocked("12:00 — 13:00")).unwrap();
        assert_eq!(em.kind, IntervalKind::Break);
        assert_eq!(em.label, "");
    }

    #[test]
    fn finds_range_after_the_client_name() {
        let interval = parse_event(&RawEvent::appointment("Carlos Lima 10:00 – 11:00")).unwrap();
        assert_eq!((interval.start, interval.end), (t("10:00"), t("11:00")));
        assert_eq!(interval.label, "Carlos Lima");

        let framed = parse_event(&RawEvent::appointment("Maria: 14:00 - 15:30 (retorno)")).unwrap();
        assert_eq!(framed.start, t("14:00"));
        assert_eq!(framed.label, "Maria (retorno)");

        let availability = compute(&[interval], &BusinessHours::default()).unwrap();
        assert!(!availability.is_free(t("10:00")));
        assert!(!availability.is_free(t("10:30")));
        assert!(availability.is_free(t("11:00")));
    }

    #[test]
    fn drops_unparseable_and_inverted() {
        assert!(parse_event(&RawEvent::appointment("Almoço")).is_none());
        assert!(parse_event(&RawEvent::appointment("11:00 – 10:00 : oops")).is_none());
        assert!(parse_event(&RawEvent::appointment("25:00 – 26:00")).is_none());
    }

    #[test]
    fn matches_substring_case_insensitively() {
        let names = roster(&["Ana Souza", "Bruno Oliveira", "Carla Dias"]);
        assert_eq!(match_professional("bruno", &names).unwrap(), 1);
        assert_eq!(match_professional("  DIAS ", &names).unwrap(), 2);
    }

    #[test]
    fn exact_match_breaks_ties() {
        let names = roster(&["Ana", "Mariana", "Ana Paula"]);
        assert_eq!(match_professional("ana", &names).unwrap(), 0);
    }

    #[test]
    fn ambiguous_without_exact_match() {
        let names = roster(&["Ana Souza", "Ana Paula"]);
        let err = match_professional("ana", &names).unwrap_err();
        assert_eq!(
            err,
            BookingError::AmbiguousProfessional {
                query: "ana".into(),
                matches: names.clone(),
            }
        );
    }

    #[test]
    fn not_found_lists_roster() {
        let names = roster(&["Ana Souza"]);
        match match_professional("zed", &names) {
            Err(BookingError::ProfessionalNotFound { available, .. }) => {
                assert_eq!(available, names);
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
