use crate::domain::calendar::working_hours;
use crate::domain::models::{CalendarDay, Density};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

pub const DEFAULT_ZONE: Tz = chrono_tz::Asia::Tokyo;

#[derive(Debug, Clone)]
pub struct CalendarSlotGrid {
    days: Vec<CalendarDay>,
    density: Density,
    zone: Tz,
    raw_hours_by_day: Vec<Vec<u32>>,
    hours_by_day: Vec<Vec<Option<u32>>>,
    slots_per_day: usize,
}

impl CalendarSlotGrid {
    pub fn build(days: &[CalendarDay], density: Density, zone: Tz) -> Self {
        let raw_hours_by_day = days
            .iter()
            .map(|day| working_hours(day, density))
            .collect::<Vec<_>>();
        let slots_per_day = raw_hours_by_day.iter().map(Vec::len).max().unwrap_or(0);
        let hours_by_day = raw_hours_by_day
            .iter()
            .map(|hours| {
                let mut padded = hours.iter().copied().map(Some).collect::<Vec<_>>();
                padded.resize(slots_per_day, None);
                padded
            })
            .collect();

        Self {
            days: days.to_vec(),
            density,
            zone,
            raw_hours_by_day,
            hours_by_day,
            slots_per_day,
        }
    }

    pub fn days(&self) -> &[CalendarDay] {
        &self.days
    }

    pub fn density(&self) -> Density {
        self.density
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn raw_hours_by_day(&self) -> &[Vec<u32>] {
        &self.raw_hours_by_day
    }

    pub fn hours_by_day(&self) -> &[Vec<Option<u32>>] {
        &self.hours_by_day
    }

    pub fn slots_per_day(&self) -> usize {
        self.slots_per_day
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn slot_count(&self) -> i64 {
        (self.days.len() * self.slots_per_day) as i64
    }

    pub fn day_slot_count(&self, day_index: usize) -> Option<usize> {
        self.raw_hours_by_day.get(day_index).map(Vec::len)
    }

    pub fn day_bounds(&self, day_index: usize) -> Option<(i64, i64)> {
        let real = self.day_slot_count(day_index)?;
        let start = (day_index * self.slots_per_day) as i64;
        Some((start, start + real as i64))
    }

    pub fn day_of_slot(&self, slot_index: i64) -> Option<usize> {
        let (day_index, _) = self.split(slot_index)?;
        Some(day_index)
    }

    pub fn day_index_of(&self, date: NaiveDate) -> Option<usize> {
        let first = self.days.first()?;
        let offset = (date - first.date).num_days();
        if let Ok(index) = usize::try_from(offset) {
            if self.days.get(index).is_some_and(|day| day.date == date) {
                return Some(index);
            }
        }
        self.days.iter().position(|day| day.date == date)
    }

    pub fn hour_at(&self, slot_index: i64) -> Option<u32> {
        let (day_index, position) = self.split(slot_index)?;
        self.hours_by_day.get(day_index)?.get(position).copied().flatten()
    }

    pub fn is_valid_slot(&self, slot_index: i64) -> bool {
        self.hour_at(slot_index).is_some()
    }

    pub fn next_valid_slot(&self, from: i64) -> Option<i64> {
        (from.max(0)..self.slot_count()).find(|slot_index| self.is_valid_slot(*slot_index))
    }

    pub fn is_placeable(&self, start: i64, end: i64) -> bool {
        end > start
            && self.is_valid_slot(start)
            && self.slot_boundary_to_datetime(end).is_some()
    }

    pub fn slot_to_datetime(&self, slot_index: i64) -> Option<DateTime<Tz>> {
        let (day_index, _) = self.split(slot_index)?;
        let hour = self.hour_at(slot_index)?;
        self.local_datetime(self.days.get(day_index)?.date, hour)
    }

    // A boundary belongs to the day of slot `boundary_index - 1`.
    pub fn slot_boundary_to_datetime(&self, boundary_index: i64) -> Option<DateTime<Tz>> {
        let (day_index, last_position) = self.split(boundary_index - 1)?;
        let position = last_position + 1;
        let day = self.days.get(day_index)?;
        let hours = self.raw_hours_by_day.get(day_index)?;
        let hour = if position == hours.len() {
            day.work_end_hour
        } else {
            *hours.get(position)?
        };
        self.local_datetime(day.date, hour)
    }

    pub fn slot_index_from_datetime<Z: TimeZone>(
        &self,
        timestamp: &DateTime<Z>,
        allow_end_boundary: bool,
    ) -> Option<i64> {
        let local = timestamp.with_timezone(&self.zone);
        if local.minute() != 0 || local.second() != 0 || local.nanosecond() != 0 {
            return None;
        }
        let date = local.date_naive();
        let hour = local.hour();

        if let Some(day_index) = self.day_index_of(date) {
            let day_start = (day_index * self.slots_per_day) as i64;
            let hours = &self.raw_hours_by_day[day_index];
            if let Some(position) = hours.iter().position(|candidate| *candidate == hour) {
                return Some(day_start + position as i64);
            }
            let day = &self.days[day_index];
            if allow_end_boundary && !hours.is_empty() && hour == day.work_end_hour {
                return Some(day_start + hours.len() as i64);
            }
        }

        // Midnight may close a day whose window runs to 24:00.
        if allow_end_boundary && hour == 0 {
            let previous = self.day_index_of(date.pred_opt()?)?;
            let day = &self.days[previous];
            let real = self.raw_hours_by_day[previous].len();
            if real > 0 && day.work_end_hour == 24 {
                return Some((previous * self.slots_per_day + real) as i64);
            }
        }
        None
    }

    fn split(&self, slot_index: i64) -> Option<(usize, usize)> {
        if slot_index < 0 || self.slots_per_day == 0 {
            return None;
        }
        let index = usize::try_from(slot_index).ok()?;
        let day_index = index / self.slots_per_day;
        if day_index >= self.days.len() {
            return None;
        }
        Some((day_index, index % self.slots_per_day))
    }

    fn local_datetime(&self, date: NaiveDate, hour: u32) -> Option<DateTime<Tz>> {
        let midnight = date.and_time(NaiveTime::MIN);
        let naive = midnight.checked_add_signed(Duration::hours(i64::from(hour)))?;
        self.zone.from_local_datetime(&naive).earliest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar::DayTemplate;
    use proptest::prelude::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn local(value: &str) -> DateTime<Tz> {
        DEFAULT_ZONE
            .from_local_datetime(
                &chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
                    .expect("valid local datetime"),
            )
            .single()
            .expect("unambiguous local datetime")
    }

    fn single_day() -> Vec<CalendarDay> {
        vec![CalendarDay::working(date("2024-06-03"), 8, 18)]
    }

    fn mixed_week() -> Vec<CalendarDay> {
        vec![
            CalendarDay::working(date("2024-06-03"), 8, 18),
            CalendarDay::working(date("2024-06-04"), 9, 13),
            CalendarDay::holiday(date("2024-06-05"), 8, 18),
            CalendarDay::working(date("2024-06-06"), 13, 24),
        ]
    }

    #[test]
    fn hourly_grid_of_single_day() {
        let grid = CalendarSlotGrid::build(&single_day(), Density::Hourly, DEFAULT_ZONE);
        assert_eq!(grid.raw_hours_by_day()[0], (8..18).collect::<Vec<_>>());
        assert_eq!(grid.slots_per_day(), 10);
        assert_eq!(grid.slot_count(), 10);
    }

    #[test]
    fn slot_and_boundary_resolve_to_local_hours() {
        let grid = CalendarSlotGrid::build(&single_day(), Density::Hourly, DEFAULT_ZONE);
        assert_eq!(grid.slot_to_datetime(1), Some(local("2024-06-03T09:00")));
        assert_eq!(grid.slot_boundary_to_datetime(3), Some(local("2024-06-03T11:00")));
        assert_eq!(
            grid.slot_to_datetime(1).map(|value| value.to_rfc3339()),
            Some("2024-06-03T09:00:00+09:00".to_string())
        );
    }

    #[test]
    fn shorter_days_are_padded_and_holidays_are_empty() {
        let grid = CalendarSlotGrid::build(&mixed_week(), Density::Hourly, DEFAULT_ZONE);
        assert_eq!(grid.slots_per_day(), 11);
        assert_eq!(grid.slot_count(), 44);
        assert_eq!(grid.hours_by_day()[1][3], Some(12));
        assert_eq!(grid.hours_by_day()[1][4], None);
        assert!(grid.hours_by_day()[2].iter().all(Option::is_none));
        assert!(!grid.is_valid_slot(10));
        assert!(!grid.is_valid_slot(11 + 4));
        assert!(!grid.is_valid_slot(22));
        assert_eq!(grid.day_bounds(1), Some((11, 15)));
        assert_eq!(grid.day_bounds(2), Some((22, 22)));
    }

    #[test]
    fn unresolvable_slots_return_none() {
        let grid = CalendarSlotGrid::build(&mixed_week(), Density::Hourly, DEFAULT_ZONE);
        assert_eq!(grid.slot_to_datetime(-1), None);
        assert_eq!(grid.slot_to_datetime(15), None);
        assert_eq!(grid.slot_to_datetime(23), None);
        assert_eq!(grid.slot_to_datetime(44), None);
        assert_eq!(grid.slot_boundary_to_datetime(0), None);
        assert_eq!(grid.slot_boundary_to_datetime(23), None);
    }

    #[test]
    fn boundary_of_short_day_lands_on_close_of_day() {
        let grid = CalendarSlotGrid::build(&mixed_week(), Density::Hourly, DEFAULT_ZONE);
        assert_eq!(grid.slot_boundary_to_datetime(15), Some(local("2024-06-04T13:00")));
        assert_eq!(grid.slot_boundary_to_datetime(10), Some(local("2024-06-03T18:00")));
        assert_eq!(grid.slot_boundary_to_datetime(11), None);
        assert_eq!(grid.slot_boundary_to_datetime(44), Some(local("2024-06-07T00:00")));
    }

    #[test]
    fn datetime_lookup_requires_exact_hour() {
        let grid = CalendarSlotGrid::build(&mixed_week(), Density::Hourly, DEFAULT_ZONE);
        assert_eq!(grid.slot_index_from_datetime(&local("2024-06-04T10:00"), false), Some(12));
        assert_eq!(grid.slot_index_from_datetime(&local("2024-06-04T10:30"), false), None);
        assert_eq!(grid.slot_index_from_datetime(&local("2024-06-04T07:00"), false), None);
        assert_eq!(grid.slot_index_from_datetime(&local("2024-06-05T10:00"), false), None);
        assert_eq!(grid.slot_index_from_datetime(&local("2024-07-01T10:00"), false), None);
    }

    #[test]
    fn datetime_lookup_accepts_end_boundary_only_when_allowed() {
        let grid = CalendarSlotGrid::build(&mixed_week(), Density::Hourly, DEFAULT_ZONE);
        let close = local("2024-06-04T13:00");
        assert_eq!(grid.slot_index_from_datetime(&close, false), None);
        assert_eq!(grid.slot_index_from_datetime(&close, true), Some(15));

        let midnight = local("2024-06-07T00:00");
        assert_eq!(grid.slot_index_from_datetime(&midnight, true), Some(44));
    }

    #[test]
    fn lookup_normalizes_foreign_offsets() {
        let grid = CalendarSlotGrid::build(&single_day(), Density::Hourly, DEFAULT_ZONE);
        let utc = DateTime::parse_from_rfc3339("2024-06-03T00:00:00Z").expect("valid datetime");
        assert_eq!(grid.slot_index_from_datetime(&utc, false), Some(1));
    }

    #[test]
    fn bi_hourly_boundary_closes_odd_window() {
        let days = vec![CalendarDay::working(date("2024-06-03"), 8, 17)];
        let grid = CalendarSlotGrid::build(&days, Density::BiHourly, DEFAULT_ZONE);
        assert_eq!(grid.slots_per_day(), 5);
        assert_eq!(grid.slot_to_datetime(4), Some(local("2024-06-03T16:00")));
        assert_eq!(grid.slot_boundary_to_datetime(5), Some(local("2024-06-03T17:00")));
        assert_eq!(grid.slot_index_from_datetime(&local("2024-06-03T09:00"), false), None);
    }

    #[test]
    fn empty_calendar_has_no_slots() {
        let grid = CalendarSlotGrid::build(&[], Density::Daily, DEFAULT_ZONE);
        assert_eq!(grid.slot_count(), 0);
        assert_eq!(grid.slot_to_datetime(0), None);
        assert_eq!(grid.slot_boundary_to_datetime(1), None);
    }

    fn density_strategy() -> impl Strategy<Value = Density> {
        prop_oneof![
            Just(Density::Hourly),
            Just(Density::BiHourly),
            Just(Density::Daily)
        ]
    }

    #[test]
    fn placement_skips_padding_and_holidays() {
        let grid = CalendarSlotGrid::build(&mixed_week(), Density::Hourly, DEFAULT_ZONE);

        assert_eq!(grid.next_valid_slot(10), Some(11));
        assert_eq!(grid.next_valid_slot(15), Some(33));
        assert_eq!(grid.next_valid_slot(-4), Some(0));
        assert_eq!(grid.next_valid_slot(44), None);

        assert!(grid.is_placeable(8, 10));
        assert!(!grid.is_placeable(9, 11));
        assert!(!grid.is_placeable(15, 16));
        assert!(!grid.is_placeable(22, 23));
        assert!(grid.is_placeable(13, 34));
    }

    proptest! {
        #[test]
        fn slot_datetime_roundtrip(
            density in density_strategy(),
            start_hour in 0u32..12u32,
            span in 1u32..12u32,
            day_count in 1usize..15usize,
            offset in 0i64..400i64,
        ) {
            let template = DayTemplate {
                work_start_hour: start_hour,
                work_end_hour: start_hour + span,
                ..DayTemplate::default()
            };
            let days = template.days_from(date("2024-06-03"), day_count);
            let grid = CalendarSlotGrid::build(&days, density, DEFAULT_ZONE);
            prop_assume!(grid.slot_count() > 0);
            let slot = offset % grid.slot_count();

            if let Some(timestamp) = grid.slot_to_datetime(slot) {
                prop_assert_eq!(grid.slot_index_from_datetime(&timestamp, false), Some(slot));
            } else {
                prop_assert!(!grid.is_valid_slot(slot));
            }
        }

        #[test]
        fn day_end_boundary_is_work_end(
            density in density_strategy(),
            start_hour in 0u32..12u32,
            span in 1u32..12u32,
            day_count in 1usize..10usize,
        ) {
            let template = DayTemplate {
                work_start_hour: start_hour,
                work_end_hour: start_hour + span,
                ..DayTemplate::default()
            };
            let days = template.days_from(date("2024-06-03"), day_count);
            let grid = CalendarSlotGrid::build(&days, density, DEFAULT_ZONE);

            for (day_index, day) in days.iter().enumerate() {
                let Some((day_start, day_end)) = grid.day_bounds(day_index) else {
                    continue;
                };
                if day_end == day_start {
                    continue;
                }
                let boundary = grid.slot_boundary_to_datetime(day_end);
                let expected = DEFAULT_ZONE
                    .from_local_datetime(
                        &(day.date.and_time(NaiveTime::MIN)
                            + Duration::hours(i64::from(day.work_end_hour))),
                    )
                    .single();
                prop_assert_eq!(boundary, expected);
                prop_assert_eq!(
                    grid.slot_index_from_datetime(&boundary.expect("resolved boundary"), true),
                    Some(day_end)
                );
            }
        }
    }
}
