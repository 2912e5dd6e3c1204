use crate::domain::calendar::DayTemplate;
use crate::domain::models::Density;
use crate::domain::slot_grid::DEFAULT_ZONE;
use crate::infrastructure::error::InfraError;
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlannerConfig {
    pub schema: u8,
    pub app_name: String,
    pub timezone: String,
    pub plan_density: Density,
    pub view_density: Density,
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    pub holiday_weekdays: Vec<Weekday>,
    pub extend_days: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            app_name: "BlockGrid".to_string(),
            timezone: DEFAULT_ZONE.name().to_string(),
            plan_density: Density::Hourly,
            view_density: Density::Hourly,
            work_start_hour: 8,
            work_end_hour: 18,
            holiday_weekdays: vec![Weekday::Sat, Weekday::Sun],
            extend_days: 7,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<(), InfraError> {
        self.zone()?;
        if self.work_end_hour > 24 || self.work_start_hour > self.work_end_hour {
            return Err(InfraError::InvalidConfig(format!(
                "working window {}..{} is not within 0..24",
                self.work_start_hour, self.work_end_hour
            )));
        }
        if self.extend_days == 0 {
            return Err(InfraError::InvalidConfig(
                "extendDays must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn zone(&self) -> Result<Tz, InfraError> {
        self.timezone.trim().parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!("unknown timezone '{}': {error}", self.timezone))
        })
    }

    pub fn day_template(&self) -> DayTemplate {
        DayTemplate {
            work_start_hour: self.work_start_hour,
            work_end_hour: self.work_end_hour,
            holiday_weekdays: self.holiday_weekdays.clone(),
            holiday_dates: Default::default(),
        }
    }
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&PlannerConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_config(config_dir: &Path) -> Result<PlannerConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let value = read_config(&path)?;
    let config: PlannerConfig = serde_json::from_value(value)
        .map_err(|error| InfraError::InvalidConfig(format!("{}: {error}", path.display())))?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(config_dir: &Path, config: &PlannerConfig) -> Result<(), InfraError> {
    config.validate()?;
    let formatted = serde_json::to_string_pretty(config)?;
    fs::write(config_dir.join(APP_JSON), format!("{formatted}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempDir {
        path: PathBuf,
    }

    impl TempDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "blockgrid-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp dir");
            Self { path }
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_once_and_load_back() {
        let dir = TempDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let loaded = load_config(&dir.path).expect("load config");
        assert_eq!(loaded, PlannerConfig::default());
        assert_eq!(loaded.zone().expect("zone"), DEFAULT_ZONE);

        let mut changed = loaded.clone();
        changed.view_density = Density::Daily;
        save_config(&dir.path, &changed).expect("save config");
        ensure_default_configs(&dir.path).expect("keep existing");
        assert_eq!(load_config(&dir.path).expect("reload").view_density, Density::Daily);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempDir::new();
        fs::write(dir.path.join(APP_JSON), "{\"schema\": 2}").expect("write config");
        match load_config(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("unsupported schema")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_unknown_zone_and_inverted_window() {
        let mut config = PlannerConfig::default();
        config.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        let mut config = PlannerConfig::default();
        config.work_start_hour = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_uses_camel_case_and_density_wire_names() {
        let value = serde_json::to_value(PlannerConfig::default()).expect("serialize config");
        assert_eq!(value["planDensity"], "hourly");
        assert_eq!(value["timezone"], "Asia/Tokyo");
        assert_eq!(value["extendDays"], 7);
    }
}
