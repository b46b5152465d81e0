//! # Configuration
//!
//! All runtime settings in one struct, passed to component constructors.
//! Loaded from an optional JSON file; every section and key has a default, so
//! `{}` is a valid file. The CLI overrides individual keys on top.
//!
//! ```json
//! {
//!   "serial": { "port": "/dev/ttyUSB0", "parity": "even" },
//!   "store": { "url": "http://influx:8086", "database": "linky" },
//!   "fields": { "profile": "kilowatt_hours", "overrides": { "PREAVIS": "text" } },
//!   "enrich": { "aux": { "channels": [0, 1] } }
//! }
//! ```

use crate::constants::{
    NIGHT_WINDOW_END_SECS, NIGHT_WINDOW_START_SECS, TIC_FIELD_FORECAST, TIC_FORECAST_PLACEHOLDER,
    TIC_FORECAST_STANDARD_DAY,
};
use crate::enrich::{AuxConfig, ForecastSubstitution, NightWindow};
use crate::error::TeleinfoError;
use crate::store::StoreConfig;
use crate::teleinfo::field::{FieldKind, FieldProfile, FieldTable};
use crate::teleinfo::serial::SerialConfig;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Field classification settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    pub profile: FieldProfile,
    pub overrides: BTreeMap<String, FieldKind>,
}

impl FieldsConfig {
    pub fn to_table(&self) -> FieldTable {
        self.overrides
            .iter()
            .fold(FieldTable::from_profile(self.profile), |table, (name, kind)| {
                table.with(name, *kind)
            })
    }
}

fn time_of_day(secs: u32) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap_or(NaiveTime::MIN)
}

/// Enrichment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub forecast_field: String,
    pub placeholder: String,
    pub substitute: String,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub aux: Option<AuxConfig>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        EnrichConfig {
            forecast_field: TIC_FIELD_FORECAST.to_string(),
            placeholder: TIC_FORECAST_PLACEHOLDER.to_string(),
            substitute: TIC_FORECAST_STANDARD_DAY.to_string(),
            window_start: time_of_day(NIGHT_WINDOW_START_SECS),
            window_end: time_of_day(NIGHT_WINDOW_END_SECS),
            aux: None,
        }
    }
}

impl EnrichConfig {
    pub fn forecast(&self) -> ForecastSubstitution {
        ForecastSubstitution {
            field: self.forecast_field.clone(),
            placeholder: self.placeholder.clone(),
            substitute: self.substitute.clone(),
            window: NightWindow::new(self.window_start, self.window_end),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleinfoConfig {
    pub serial: SerialConfig,
    pub store: StoreConfig,
    pub fields: FieldsConfig,
    pub enrich: EnrichConfig,
}

impl TeleinfoConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TeleinfoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TeleinfoError::ConfigError(format!("{}: {e}", path.display())))?;
        let config = Self::from_json(&text)
            .map_err(|e| TeleinfoError::ConfigError(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, TeleinfoError> {
        let config: TeleinfoConfig =
            serde_json::from_str(text).map_err(|e| TeleinfoError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TeleinfoError> {
        if self.serial.port.is_empty() {
            return Err(TeleinfoError::ConfigError("serial port is empty".into()));
        }
        if self.serial.baudrate == 0 {
            return Err(TeleinfoError::ConfigError("baudrate is zero".into()));
        }
        if !matches!(self.serial.stop_bits, 1 | 2) {
            return Err(TeleinfoError::ConfigError(format!(
                "unsupported stop bits: {}",
                self.serial.stop_bits
            )));
        }
        if self.store.database.is_empty() {
            return Err(TeleinfoError::ConfigError("database name is empty".into()));
        }
        if self.store.tags.is_empty() {
            return Err(TeleinfoError::ConfigError("no identity tags".into()));
        }
        if let Some((name, _)) = self
            .fields
            .overrides
            .iter()
            .find(|(_, kind)| **kind == FieldKind::ScaledDecimal(0))
        {
            return Err(TeleinfoError::ConfigError(format!("zero scale for {name}")));
        }
        if let Some(aux) = &self.enrich.aux {
            aux.validate()?;
        }
        Ok(())
    }
}
