use proptest::prelude::*;
use slotpilot_schedule::{
    compute, merge_periods, occupied_slots, BusinessHours, FreePeriod, IntervalKind,
    OccupiedInterval, TimeOfDay,
};
use std::collections::BTreeSet;

fn hours_strategy() -> impl Strategy<Value = BusinessHours> {
    (6u32..12, 1u32..10, prop_oneof![Just(10u16), Just(15), Just(30), Just(60)]).prop_map(
        |(open_hour, span_hours, granularity)| {
            let open = TimeOfDay::from_hm(open_hour, 0).unwrap();
            let close = TimeOfDay::from_hm(open_hour + span_hours, 0).unwrap();
            BusinessHours::new(open, close, granularity).unwrap()
        },
    )
}

fn intervals_strategy(hours: BusinessHours) -> impl Strategy<Value = Vec<OccupiedInterval>> {
    let open = u32::from(hours.open.minutes());
    let close = u32::from(hours.close.minutes());
    prop::collection::vec((open..close, 1u32..120, any::<bool>()), 0..8).prop_map(
        move |raw| {
            raw.into_iter()
                .map(|(start, len, is_break)| {
                    let start = TimeOfDay::from_minutes(start).unwrap();
                    let end = TimeOfDay::from_minutes((u32::from(start.minutes()) + len).min(close))
                        .unwrap();
                    let kind = if is_break {
                        IntervalKind::Break
                    } else {
                        IntervalKind::Appointment
                    };
                    OccupiedInterval::new(start, end, kind, "generated").unwrap()
                })
                .collect()
        },
    )
}

fn scenario() -> impl Strategy<Value = (BusinessHours, Vec<OccupiedInterval>)> {
    hours_strategy().prop_flat_map(|hours| (Just(hours), intervals_strategy(hours)))
}

proptest! {
    #[test]
    fn free_and_occupied_partition_the_grid((hours, occupied) in scenario()) {
        let free: BTreeSet<_> = compute(&occupied, &hours).unwrap().free_slots.into_iter().collect();
        let taken: BTreeSet<_> = occupied_slots(&occupied, &hours).unwrap().into_iter().collect();
        let all: BTreeSet<_> = hours.candidate_slots().into_iter().collect();

        prop_assert!(free.is_disjoint(&taken));
        let union: BTreeSet<_> = free.union(&taken).copied().collect();
        prop_assert_eq!(union, all);
    }

    #[test]
    fn free_slots_are_sorted_and_on_grid((hours, occupied) in scenario()) {
        let result = compute(&occupied, &hours).unwrap();
        prop_assert!(result.free_slots.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(result.free_slots.iter().all(|s| hours.is_on_grid(*s)));
    }

    #[test]
    fn merge_is_idempotent((hours, occupied) in scenario()) {
        let result = compute(&occupied, &hours).unwrap();
        let once = merge_periods(&result.free_periods, hours.granularity_minutes);
        let twice = merge_periods(&once, hours.granularity_minutes);
        prop_assert_eq!(&once, &twice);
        // Periods built by the calculator are already maximal.
        prop_assert_eq!(once, result.free_periods);
    }

    #[test]
    fn periods_cover_exactly_the_free_slots((hours, occupied) in scenario()) {
        let result = compute(&occupied, &hours).unwrap();
        let step = usize::from(hours.granularity_minutes);
        let expanded: Vec<TimeOfDay> = result
            .free_periods
            .iter()
            .flat_map(|FreePeriod { start, end }| {
                (start.minutes()..=end.minutes())
                    .step_by(step)
                    .map(|m| TimeOfDay::from_minutes(u32::from(m)).unwrap())
            })
            .collect();
        prop_assert_eq!(expanded, result.free_slots);
    }

    #[test]
    fn overlaps_behave_as_their_union((hours, occupied) in scenario()) {
        let mut doubled = occupied.clone();
        doubled.extend(occupied.iter().cloned());
        prop_assert_eq!(compute(&doubled, &hours).unwrap(), compute(&occupied, &hours).unwrap());
    }

    #[test]
    fn suggestions_come_from_free_slots((hours, occupied) in scenario(), minute in 0u32..1440) {
        let result = compute(&occupied, &hours).unwrap();
        let requested = TimeOfDay::from_minutes(minute).unwrap();
        let picks = result.suggestions_near(requested, 5);
        prop_assert!(picks.len() <= 5);
        prop_assert!(picks.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(picks.iter().all(|p| result.is_free(*p)));
    }
}

#[test]
fn ten_minute_grid_union_example() {
    let t = |s: &str| s.parse::<TimeOfDay>().unwrap();
    let hours = BusinessHours::new(t("09:00"), t("20:00"), 10).unwrap();
    let occupied = vec![
        OccupiedInterval::appointment(t("09:00"), t("09:40"), "a").unwrap(),
        OccupiedInterval::appointment(t("09:30"), t("10:00"), "b").unwrap(),
    ];
    let result = compute(&occupied, &hours).unwrap();
    let excluded: Vec<_> = hours
        .candidate_slots()
        .into_iter()
        .filter(|s| !result.is_free(*s))
        .collect();
    assert_eq!(excluded.len(), 6);
    assert!(excluded.iter().all(|s| *s >= t("09:00") && *s < t("10:00")));
}
