use crate::domain::models::{CalendarDay, Density};
use crate::domain::slot_grid::{CalendarSlotGrid, DEFAULT_ZONE};
use serde::{Deserialize, Serialize};

const FALLBACK_BASE_SLOTS_PER_DAY: usize = 24;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    Floor,
    Ceil,
    Round,
}

impl RoundingMode {
    fn apply(self, value: f64) -> f64 {
        match self {
            Self::Floor => value.floor(),
            Self::Ceil => value.ceil(),
            Self::Round => value.round(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityScale {
    hourly: usize,
    bi_hourly: usize,
    daily: usize,
}

impl DensityScale {
    pub fn from_days(days: &[CalendarDay]) -> Self {
        let width = |density| CalendarSlotGrid::build(days, density, DEFAULT_ZONE).slots_per_day();
        Self::from_widths(
            width(Density::Hourly),
            width(Density::BiHourly),
            width(Density::Daily),
        )
    }

    pub fn from_widths(hourly: usize, bi_hourly: usize, daily: usize) -> Self {
        if hourly == 0 {
            return Self {
                hourly: FALLBACK_BASE_SLOTS_PER_DAY,
                bi_hourly: FALLBACK_BASE_SLOTS_PER_DAY / 2,
                daily: 1,
            };
        }
        Self {
            hourly,
            bi_hourly: bi_hourly.max(1),
            daily: daily.max(1),
        }
    }

    pub fn base_slots_per_day(&self) -> usize {
        self.hourly
    }

    pub fn slots_per_day(&self, density: Density) -> usize {
        match density {
            Density::Hourly => self.hourly,
            Density::BiHourly => self.bi_hourly,
            Density::Daily => self.daily,
        }
    }

    pub fn units_per_slot(&self, density: Density) -> f64 {
        self.base_slots_per_day() as f64 / self.slots_per_day(density) as f64
    }

    pub fn convert_slot_index(&self, value: i64, from: Density, to: Density, mode: RoundingMode) -> i64 {
        if from == to {
            return value;
        }
        let absolute_units = value as f64 * self.units_per_slot(from);
        mode.apply(absolute_units / self.units_per_slot(to)) as i64
    }

    pub fn convert_slot_length(&self, value: i64, from: Density, to: Density) -> i64 {
        self.convert_slot_index(value, from, to, RoundingMode::Ceil).max(1)
    }
}
