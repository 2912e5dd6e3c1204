use crate::domain::models::{CalendarDay, Density};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub fn working_hours(day: &CalendarDay, density: Density) -> Vec<u32> {
    if day.is_holiday || day.work_start_hour >= day.work_end_hour {
        return Vec::new();
    }
    match density {
        Density::Daily => vec![day.work_start_hour],
        Density::BiHourly => (day.work_start_hour..day.work_end_hour).step_by(2).collect(),
        Density::Hourly => (day.work_start_hour..day.work_end_hour).collect(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayTemplate {
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    #[serde(default)]
    pub holiday_weekdays: Vec<Weekday>,
    #[serde(default)]
    pub holiday_dates: BTreeSet<NaiveDate>,
}

impl Default for DayTemplate {
    fn default() -> Self {
        Self {
            work_start_hour: 8,
            work_end_hour: 18,
            holiday_weekdays: vec![Weekday::Sat, Weekday::Sun],
            holiday_dates: BTreeSet::new(),
        }
    }
}

impl DayTemplate {
    pub fn day(&self, date: NaiveDate) -> CalendarDay {
        let is_holiday = self.holiday_weekdays.contains(&date.weekday())
            || self.holiday_dates.contains(&date);
        CalendarDay {
            date,
            is_holiday,
            work_start_hour: self.work_start_hour,
            work_end_hour: self.work_end_hour,
        }
    }

    pub fn days_from(&self, first: NaiveDate, count: usize) -> Vec<CalendarDay> {
        (0..count)
            .filter_map(|offset| first.checked_add_signed(Duration::days(offset as i64)))
            .map(|date| self.day(date))
            .collect()
    }
}

pub fn missing_days_before(days: &[CalendarDay], target: NaiveDate) -> usize {
    match days.first() {
        Some(first) if target < first.date => (first.date - target).num_days() as usize,
        _ => 0,
    }
}

pub fn missing_days_after(days: &[CalendarDay], target: NaiveDate) -> usize {
    match days.last() {
        Some(last) if target > last.date => (target - last.date).num_days() as usize,
        _ => 0,
    }
}

pub fn extend_backward(days: &[CalendarDay], count: usize, template: &DayTemplate) -> Vec<CalendarDay> {
    let Some(first) = days.first() else {
        return Vec::new();
    };
    let Some(new_first) = first.date.checked_sub_signed(Duration::days(count as i64)) else {
        return days.to_vec();
    };
    let mut extended = template.days_from(new_first, count);
    extended.extend_from_slice(days);
    extended
}

pub fn extend_forward(days: &[CalendarDay], count: usize, template: &DayTemplate) -> Vec<CalendarDay> {
    let Some(last) = days.last() else {
        return Vec::new();
    };
    let mut extended = days.to_vec();
    if let Some(next) = last.date.succ_opt() {
        extended.extend(template.days_from(next, count));
    }
    extended
}

pub fn is_contiguous(days: &[CalendarDay]) -> bool {
    days.windows(2)
        .all(|pair| pair[0].date.succ_opt() == Some(pair[1].date))
}
