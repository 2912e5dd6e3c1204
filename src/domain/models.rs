use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_WORK_HOUR: u32 = 24;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_holiday: bool,
    pub work_start_hour: u32,
    pub work_end_hour: u32,
}

impl CalendarDay {
    pub fn working(date: NaiveDate, work_start_hour: u32, work_end_hour: u32) -> Self {
        Self {
            date,
            is_holiday: false,
            work_start_hour,
            work_end_hour,
        }
    }

    pub fn holiday(date: NaiveDate, work_start_hour: u32, work_end_hour: u32) -> Self {
        Self {
            date,
            is_holiday: true,
            work_start_hour,
            work_end_hour,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.work_end_hour > MAX_WORK_HOUR {
            return Err(format!(
                "calendar_day.work_end_hour must be <= {MAX_WORK_HOUR}"
            ));
        }
        if self.work_start_hour > self.work_end_hour {
            return Err(
                "calendar_day.work_start_hour must be <= calendar_day.work_end_hour".to_string(),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Density {
    #[serde(rename = "hourly", alias = "hour")]
    Hourly,
    #[serde(rename = "2hour", alias = "bi_hourly")]
    BiHourly,
    #[serde(rename = "daily", alias = "day")]
    Daily,
}

impl Density {
    pub const ALL: [Density; 3] = [Density::Hourly, Density::BiHourly, Density::Daily];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::BiHourly => "2hour",
            Self::Daily => "daily",
        }
    }
}

impl fmt::Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Density {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hourly" | "hour" => Ok(Self::Hourly),
            "2hour" | "bi_hourly" | "bi-hourly" => Ok(Self::BiHourly),
            "daily" | "day" => Ok(Self::Daily),
            other => Err(format!("unsupported density: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub item_id: String,
    pub start: i64,
    pub len: i64,
    pub amount: u64,
    pub memo: String,
    pub approved: bool,
    pub start_at: Option<DateTime<FixedOffset>>,
    pub end_at: Option<DateTime<FixedOffset>>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl Block {
    pub fn end(&self) -> i64 {
        self.start + self.len
    }

    pub fn overlap_with(&self, other: &Block) -> i64 {
        (self.end().min(other.end()) - self.start.max(other.start)).max(0)
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        if self.start < 0 {
            return Err("block.start must be >= 0".to_string());
        }
        if self.len < 1 {
            return Err("block.len must be >= 1".to_string());
        }
        if let (Some(start_at), Some(end_at)) = (self.start_at, self.end_at) {
            if end_at <= start_at {
                return Err("block.end_at must be after block.start_at".to_string());
            }
        }
        Ok(())
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
