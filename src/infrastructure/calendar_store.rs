use crate::domain::calendar::{extend_backward, extend_forward, DayTemplate};
use crate::domain::models::CalendarDay;
use crate::infrastructure::error::InfraError;
use chrono::NaiveDate;
use std::sync::{Mutex, MutexGuard};

pub trait CalendarDayRepository: Send + Sync {
    fn list_days(&self) -> Result<Vec<CalendarDay>, InfraError>;
    fn prepend_days(&self, before: NaiveDate, count: usize) -> Result<Vec<CalendarDay>, InfraError>;
    fn append_days(&self, after: NaiveDate, count: usize) -> Result<Vec<CalendarDay>, InfraError>;
}

#[derive(Debug)]
pub struct InMemoryCalendarDayRepository {
    template: DayTemplate,
    days: Mutex<Vec<CalendarDay>>,
}

impl InMemoryCalendarDayRepository {
    pub fn new(template: DayTemplate, days: Vec<CalendarDay>) -> Self {
        Self {
            template,
            days: Mutex::new(days),
        }
    }

    pub fn seeded(template: DayTemplate, first: NaiveDate, count: usize) -> Self {
        let days = template.days_from(first, count);
        Self::new(template, days)
    }

    fn lock_days(&self) -> Result<MutexGuard<'_, Vec<CalendarDay>>, InfraError> {
        self.days
            .lock()
            .map_err(|error| InfraError::Store(format!("calendar store lock poisoned: {error}")))
    }
}

impl CalendarDayRepository for InMemoryCalendarDayRepository {
    fn list_days(&self) -> Result<Vec<CalendarDay>, InfraError> {
        Ok(self.lock_days()?.clone())
    }

    fn prepend_days(&self, before: NaiveDate, count: usize) -> Result<Vec<CalendarDay>, InfraError> {
        let mut days = self.lock_days()?;
        if days.first().map(|day| day.date) != Some(before) {
            return Err(InfraError::InvalidInput(format!(
                "can only prepend before the first known day, got {before}"
            )));
        }
        *days = extend_backward(&days, count, &self.template);
        Ok(days.clone())
    }

    fn append_days(&self, after: NaiveDate, count: usize) -> Result<Vec<CalendarDay>, InfraError> {
        let mut days = self.lock_days()?;
        if days.last().map(|day| day.date) != Some(after) {
            return Err(InfraError::InvalidInput(format!(
                "can only append after the last known day, got {after}"
            )));
        }
        *days = extend_forward(&days, count, &self.template);
        Ok(days.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar::is_contiguous;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn prepend_and_append_extend_the_stored_sequence() {
        let store = InMemoryCalendarDayRepository::seeded(DayTemplate::default(), date("2024-06-03"), 5);

        let prepended = store.prepend_days(date("2024-06-03"), 2).expect("prepend");
        assert_eq!(prepended.first().map(|day| day.date), Some(date("2024-06-01")));
        let appended = store.append_days(date("2024-06-07"), 3).expect("append");
        assert_eq!(appended.len(), 10);
        assert!(is_contiguous(&appended));
        assert_eq!(store.list_days().expect("list"), appended);
    }

    #[test]
    fn extension_must_touch_the_known_range() {
        let store = InMemoryCalendarDayRepository::seeded(DayTemplate::default(), date("2024-06-03"), 5);
        assert!(matches!(
            store.append_days(date("2024-06-05"), 1),
            Err(InfraError::InvalidInput(_))
        ));
        assert!(matches!(
            store.prepend_days(date("2024-06-04"), 1),
            Err(InfraError::InvalidInput(_))
        ));
    }
}
