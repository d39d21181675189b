use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use super::{AgendaError, Slot, UnitHours};

/// Slots of `day`, stepping by the visit duration from opening until (not
/// including) closing. Times are wall-clock in `offset`.
pub fn generate_slots(
    hours: &UnitHours,
    day: NaiveDate,
    offset: FixedOffset,
) -> Result<Vec<Slot>, AgendaError> {
    let step = hours.visit_duration()?;

    let start = day.and_time(hours.opening);
    let mut end = day.and_time(hours.closing);
    if end < start {
        end += Duration::days(1);
    }

    let mut slots = Vec::new();
    let mut current = start;
    while current < end {
        slots.push(Slot::new(to_utc(current, offset), step));
        current += step;
    }
    Ok(slots)
}

/// `[00:00, 24:00)` of `day` in the clinic's wall clock.
pub fn day_bounds(day: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = to_utc(day.and_time(chrono::NaiveTime::MIN), offset);
    (start, start + Duration::days(1))
}

/// Range to load appointments for so that overnight slots are covered too.
pub fn load_window(
    day: NaiveDate,
    slots: &[Slot],
    offset: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let (mut from, mut to) = day_bounds(day, offset);
    if let Some(first) = slots.first() {
        from = from.min(first.start);
    }
    if let Some(last) = slots.last() {
        to = to.max(last.end);
    }
    (from, to)
}

pub fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

pub fn label(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant.with_timezone(&offset).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    fn hours(open: (u32, u32), close: (u32, u32), duration: i32) -> UnitHours {
        UnitHours {
            opening: NaiveTime::from_hms_opt(open.0, open.1, 0).unwrap(),
            closing: NaiveTime::from_hms_opt(close.0, close.1, 0).unwrap(),
            visit_duration_min: duration,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn business_day_in_quarter_hours() {
        let slots = generate_slots(&hours((8, 0), (18, 0), 15), day(), utc()).unwrap();
        assert_eq!(slots.len(), 40);
        assert_eq!(slots[0].start, Utc.with_ymd_and_hms(2024, 3, 11, 8, 0, 0).unwrap());
        assert_eq!(
            slots[39].start,
            Utc.with_ymd_and_hms(2024, 3, 11, 17, 45, 0).unwrap()
        );
        assert_eq!(slots[39].end, Utc.with_ymd_and_hms(2024, 3, 11, 18, 0, 0).unwrap());
        assert!(slots.windows(2).all(|w| w[0].end == w[1].start));
    }

    #[test]
    fn overnight_schedule_runs_into_next_day() {
        let slots = generate_slots(&hours((22, 0), (2, 0), 60), day(), utc()).unwrap();
        let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
        assert_eq!(
            starts,
            vec![
                Utc.with_ymd_and_hms(2024, 3, 11, 22, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 11, 23, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 12, 1, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn same_opening_and_closing_yields_nothing() {
        let slots = generate_slots(&hours((9, 0), (9, 0), 30), day(), utc()).unwrap();
        assert!(slots.is_empty());
    }

    #[test_case::test_case(0)]
    #[test_case::test_case(-15)]
    fn non_positive_duration_terminates_with_error(duration: i32) {
        let err = generate_slots(&hours((8, 0), (18, 0), duration), day(), utc()).unwrap_err();
        assert!(matches!(err, AgendaError::InvalidDuration(d) if d == duration));
    }

    #[test]
    fn last_slot_may_run_past_closing() {
        let slots = generate_slots(&hours((8, 0), (9, 0), 25), day(), utc()).unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[2].end, Utc.with_ymd_and_hms(2024, 3, 11, 9, 15, 0).unwrap());
    }

    #[test]
    fn wall_clock_is_shifted_by_clinic_offset() {
        let sao_paulo = FixedOffset::west_opt(3 * 3600).unwrap();
        let slots = generate_slots(&hours((8, 0), (9, 0), 30), day(), sao_paulo).unwrap();
        assert_eq!(slots[0].start, Utc.with_ymd_and_hms(2024, 3, 11, 11, 0, 0).unwrap());
        assert_eq!(label(slots[1].start, sao_paulo), "08:30");
    }

    #[test]
    fn load_window_covers_overnight_slots() {
        let slots = generate_slots(&hours((22, 0), (2, 0), 60), day(), utc()).unwrap();
        let (from, to) = load_window(day(), &slots, utc());
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2024, 3, 12, 2, 0, 0).unwrap());
    }
}
