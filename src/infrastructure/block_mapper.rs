use crate::domain::models::{Block, CalendarDay, MAX_WORK_HOUR};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawBlockRecord {
    pub id: Option<String>,
    #[serde(alias = "item", alias = "item_id")]
    pub item_id: Option<String>,
    pub start: Option<Value>,
    pub len: Option<Value>,
    pub amount: Option<Value>,
    pub memo: Option<String>,
    pub approved: Option<bool>,
    #[serde(alias = "start_at")]
    pub start_at: Option<String>,
    #[serde(alias = "end_at")]
    pub end_at: Option<String>,
    #[serde(alias = "created_by")]
    pub created_by: Option<String>,
    #[serde(alias = "updated_by")]
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCalendarDay {
    pub date: Option<String>,
    #[serde(alias = "is_holiday")]
    pub is_holiday: Option<bool>,
    #[serde(alias = "work_start_hour")]
    pub work_start_hour: Option<Value>,
    #[serde(alias = "work_end_hour")]
    pub work_end_hour: Option<Value>,
}

pub fn coerce_block(raw: RawBlockRecord, fallback_id: &str) -> Block {
    let id = non_empty(raw.id).unwrap_or_else(|| fallback_id.to_string());
    let item_id = non_empty(raw.item_id).unwrap_or_else(|| {
        warn!(block_id = %id, "imported block has no item reference");
        String::new()
    });
    let start = raw.start.as_ref().and_then(lenient_i64).unwrap_or(0).max(0);
    let len = raw.len.as_ref().and_then(lenient_i64).unwrap_or(1).max(1);
    let amount = raw
        .amount
        .as_ref()
        .and_then(lenient_i64)
        .unwrap_or(0)
        .max(0) as u64;

    let start_at = raw
        .start_at
        .as_deref()
        .and_then(|value| parse_timestamp(value, &id, "startAt"));
    let mut end_at = raw
        .end_at
        .as_deref()
        .and_then(|value| parse_timestamp(value, &id, "endAt"));
    if let (Some(start_at), Some(end)) = (start_at, end_at) {
        if end <= start_at {
            warn!(block_id = %id, "imported block ends before it starts; dropping endAt");
            end_at = None;
        }
    }

    Block {
        id,
        item_id,
        start,
        len,
        amount,
        memo: raw.memo.unwrap_or_default(),
        approved: raw.approved.unwrap_or(false),
        start_at,
        end_at,
        created_by: non_empty(raw.created_by),
        updated_by: non_empty(raw.updated_by),
    }
}

pub fn coerce_calendar_day(raw: RawCalendarDay) -> Option<CalendarDay> {
    let date = raw
        .date
        .as_deref()
        .map(str::trim)
        .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok());
    let Some(date) = date else {
        warn!(date = ?raw.date, "skipping calendar day without a valid date");
        return None;
    };

    let hour = |value: Option<&Value>, default: u32| {
        value
            .and_then(lenient_i64)
            .map(|hour| hour.clamp(0, i64::from(MAX_WORK_HOUR)) as u32)
            .unwrap_or(default)
    };
    let mut work_start_hour = hour(raw.work_start_hour.as_ref(), 0);
    let mut work_end_hour = hour(raw.work_end_hour.as_ref(), MAX_WORK_HOUR);
    if work_start_hour > work_end_hour {
        warn!(%date, work_start_hour, work_end_hour, "swapping inverted working window");
        std::mem::swap(&mut work_start_hour, &mut work_end_hour);
    }

    Some(CalendarDay {
        date,
        is_holiday: raw.is_holiday.unwrap_or(false),
        work_start_hour,
        work_end_hour,
    })
}

pub fn decode_blocks(value: &Value) -> Result<Vec<Block>, InfraError> {
    let entries = value
        .as_array()
        .ok_or_else(|| InfraError::InvalidInput("blocks must be a JSON array".to_string()))?;
    let mut blocks = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if !entry.is_object() {
            warn!(index, "skipping non-object block record");
            continue;
        }
        let raw: RawBlockRecord = serde_json::from_value(entry.clone())?;
        blocks.push(coerce_block(raw, &format!("imported-{index}")));
    }
    Ok(blocks)
}

pub fn decode_calendar_days(value: &Value) -> Result<Vec<CalendarDay>, InfraError> {
    let entries = value
        .as_array()
        .ok_or_else(|| InfraError::InvalidInput("calendar days must be a JSON array".to_string()))?;
    let mut days = Vec::with_capacity(entries.len());
    for entry in entries {
        let raw: RawCalendarDay = serde_json::from_value(entry.clone())?;
        days.extend(coerce_calendar_day(raw));
    }
    days.sort_by_key(|day| day.date);
    days.dedup_by_key(|day| day.date);
    Ok(days)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.floor() as i64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(|float| float.floor() as i64))
        }
        _ => None,
    }
}

fn parse_timestamp(value: &str, block_id: &str, field_name: &str) -> Option<DateTime<FixedOffset>> {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(block_id, field_name, %error, "ignoring unparsable timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_fields_are_clamped_not_rejected() {
        let blocks = decode_blocks(&json!([
            {"id": "b1", "itemId": "item-a", "start": -3, "len": 0, "amount": -5}
        ]))
        .expect("decode blocks");

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks[0].len, 1);
        assert_eq!(blocks[0].amount, 0);
        assert!(blocks[0].validate().is_ok());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let blocks = decode_blocks(&json!([{}, "garbage", {"item": "x", "start": "4", "len": "2.5"}]))
            .expect("decode blocks");

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].id, "imported-0");
        assert_eq!(blocks[0].item_id, "");
        assert!(!blocks[0].approved);
        assert_eq!(blocks[1].id, "imported-2");
        assert_eq!((blocks[1].start, blocks[1].len), (4, 2));
    }

    #[test]
    fn timestamps_are_parsed_and_inverted_ranges_dropped() {
        let blocks = decode_blocks(&json!([
            {"id": "ok", "startAt": "2024-06-03T09:00:00+09:00", "endAt": "2024-06-03T11:00:00+09:00"},
            {"id": "bad", "startAt": "not-a-time", "endAt": "2024-06-03T11:00:00+09:00"},
            {"id": "inv", "startAt": "2024-06-03T11:00:00+09:00", "end_at": "2024-06-03T09:00:00+09:00"}
        ]))
        .expect("decode blocks");

        assert!(blocks[0].start_at.is_some() && blocks[0].end_at.is_some());
        assert!(blocks[1].start_at.is_none() && blocks[1].end_at.is_some());
        assert!(blocks[2].start_at.is_some() && blocks[2].end_at.is_none());
    }

    #[test]
    fn decode_rejects_non_array_payload() {
        assert!(matches!(
            decode_blocks(&json!({"blocks": []})),
            Err(InfraError::InvalidInput(_))
        ));
    }

    #[test]
    fn calendar_days_are_sorted_clamped_and_deduplicated() {
        let days = decode_calendar_days(&json!([
            {"date": "2024-06-04", "workStartHour": 18, "workEndHour": 8},
            {"date": "2024-06-03", "isHoliday": true, "workStartHour": 8, "workEndHour": 30},
            {"date": "2024-06-03", "workStartHour": 9, "workEndHour": 17},
            {"date": "June 5th"}
        ]))
        .expect("decode days");

        assert_eq!(days.len(), 2);
        assert!(days[0].is_holiday);
        assert_eq!(days[0].work_end_hour, 24);
        assert_eq!((days[1].work_start_hour, days[1].work_end_hour), (8, 18));
        assert!(days.iter().all(|day| day.validate().is_ok()));
    }
}
