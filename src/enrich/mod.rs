//! # Frame Enrichment
//!
//! Corrections applied to every completed frame before it is persisted:
//!
//! - `DEMAIN` (tomorrow's Tempo colour) reads `----` until the supplier
//!   publishes it. During the nightly window the colour is known to be the
//!   standard one, so the placeholder is replaced by `BLEU`.
//! - On installations with clamp-on current transformers wired to an ADC,
//!   their instantaneous currents are appended as extra fields.

pub mod sampler;

pub use sampler::{AnalogSampler, FixedSampler};

#[cfg(feature = "raspberry-pi")]
pub use sampler::Ads1115Sampler;

use crate::constants::{
    AUX_CT_RATIO, AUX_GAIN, NIGHT_WINDOW_END_SECS, NIGHT_WINDOW_START_SECS,
    TIC_FIELD_FORECAST, TIC_FORECAST_PLACEHOLDER, TIC_FORECAST_STANDARD_DAY,
};
use crate::error::TeleinfoError;
use crate::teleinfo::field::FieldValue;
use crate::teleinfo::frame::Frame;
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A daily time window in seconds since midnight, `[start, end)`.
///
/// When `start > end` the window wraps across midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    start_secs: u32,
    end_secs: u32,
}

impl Default for NightWindow {
    fn default() -> Self {
        NightWindow {
            start_secs: NIGHT_WINDOW_START_SECS,
            end_secs: NIGHT_WINDOW_END_SECS,
        }
    }
}

impl NightWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        NightWindow {
            start_secs: start.num_seconds_from_midnight(),
            end_secs: end.num_seconds_from_midnight(),
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        let secs = time.num_seconds_from_midnight();
        if self.start_secs <= self.end_secs {
            secs >= self.start_secs && secs < self.end_secs
        } else {
            secs >= self.start_secs || secs < self.end_secs
        }
    }
}

/// Replaces a placeholder value inside a time window.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSubstitution {
    pub field: String,
    pub placeholder: String,
    pub substitute: String,
    pub window: NightWindow,
}

impl Default for ForecastSubstitution {
    fn default() -> Self {
        ForecastSubstitution {
            field: TIC_FIELD_FORECAST.to_string(),
            placeholder: TIC_FORECAST_PLACEHOLDER.to_string(),
            substitute: TIC_FORECAST_STANDARD_DAY.to_string(),
            window: NightWindow::default(),
        }
    }
}

impl ForecastSubstitution {
    /// Returns true when the field was substituted.
    pub fn apply(&self, frame: &mut Frame, now: NaiveTime) -> bool {
        let is_placeholder = frame
            .get(&self.field)
            .and_then(FieldValue::as_text)
            .is_some_and(|v| v == self.placeholder);

        if is_placeholder && self.window.contains(now) {
            frame.insert(
                self.field.clone(),
                FieldValue::Text(self.substitute.clone()),
            );
            return true;
        }
        false
    }
}

/// Auxiliary current transformer channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuxConfig {
    pub i2c_bus: u8,
    pub address: u16,
    pub channels: Vec<u8>,
    pub field_names: Vec<String>,
    pub ct_ratio: f64,
    pub gain: f64,
}

impl Default for AuxConfig {
    fn default() -> Self {
        AuxConfig {
            i2c_bus: 1,
            address: crate::constants::ADS1115_DEFAULT_ADDRESS,
            channels: vec![0, 1],
            field_names: vec!["IAUX1".to_string(), "IAUX2".to_string()],
            ct_ratio: AUX_CT_RATIO,
            gain: AUX_GAIN,
        }
    }
}

impl AuxConfig {
    /// Amps per volt at the ADC input.
    pub fn amps_per_volt(&self) -> f64 {
        self.ct_ratio * self.gain
    }

    pub fn validate(&self) -> Result<(), TeleinfoError> {
        if self.channels.len() != self.field_names.len() {
            return Err(TeleinfoError::ConfigError(format!(
                "{} aux channels but {} field names",
                self.channels.len(),
                self.field_names.len()
            )));
        }
        if let Some(ch) = self.channels.iter().find(|ch| **ch > 3) {
            return Err(TeleinfoError::ConfigError(format!(
                "aux channel {ch} out of range 0..=3"
            )));
        }
        Ok(())
    }
}

struct AuxCurrents {
    config: AuxConfig,
    sampler: Box<dyn AnalogSampler>,
}

impl AuxCurrents {
    /// Reads every channel; any failure yields no fields at all.
    fn read(&mut self) -> Result<Vec<(String, f64)>, TeleinfoError> {
        let amps_per_volt = self.config.amps_per_volt();
        self.config
            .channels
            .iter()
            .zip(&self.config.field_names)
            .map(|(ch, name)| {
                let volts = self.sampler.read_voltage(*ch)?;
                Ok((name.clone(), volts * amps_per_volt))
            })
            .collect()
    }
}

/// Applies the per-frame corrections.
#[derive(Default)]
pub struct FrameEnricher {
    forecast: ForecastSubstitution,
    aux: Option<AuxCurrents>,
}

impl FrameEnricher {
    pub fn new(forecast: ForecastSubstitution) -> Self {
        FrameEnricher {
            forecast,
            aux: None,
        }
    }

    /// Adds auxiliary current readings from `sampler`.
    pub fn with_aux(mut self, config: AuxConfig, sampler: Box<dyn AnalogSampler>) -> Self {
        self.aux = Some(AuxCurrents { config, sampler });
        self
    }

    pub fn has_aux(&self) -> bool {
        self.aux.is_some()
    }

    /// Enriches `frame` as of local time `now`. Never fails the frame.
    pub fn enrich(&mut self, mut frame: Frame, now: NaiveTime) -> Frame {
        if self.forecast.apply(&mut frame, now) {
            log::debug!(
                "{} placeholder replaced by {}",
                self.forecast.field,
                self.forecast.substitute
            );
        }

        if let Some(aux) = self.aux.as_mut() {
            match aux.read() {
                Ok(readings) => {
                    for (name, amps) in readings {
                        frame.insert(name, FieldValue::Decimal(amps));
                    }
                }
                Err(e) => log::warn!("Auxiliary currents unavailable: {e}"),
            }
        }

        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn forecast_frame() -> Frame {
        [("DEMAIN", FieldValue::from("----"))].into_iter().collect()
    }

    #[test]
    fn test_window_wraps_midnight() {
        let window = NightWindow::default();
        assert!(window.contains(at(20, 5)));
        assert!(window.contains(at(23, 59)));
        assert!(window.contains(at(0, 0)));
        assert!(window.contains(at(5, 59)));
        assert!(!window.contains(at(6, 0)));
        assert!(!window.contains(at(12, 0)));
        assert!(!window.contains(at(20, 4)));
    }

    #[test]
    fn test_window_same_day() {
        let window = NightWindow::new(at(8, 0), at(9, 0));
        assert!(window.contains(at(8, 30)));
        assert!(!window.contains(at(9, 0)));
        assert!(!window.contains(at(7, 59)));
    }

    #[test]
    fn test_substitution_at_night() {
        let mut enricher = FrameEnricher::default();
        let frame = enricher.enrich(forecast_frame(), at(21, 0));
        assert_eq!(frame.get("DEMAIN"), Some(&FieldValue::from("BLEU")));
    }

    #[test]
    fn test_no_substitution_at_noon() {
        let mut enricher = FrameEnricher::default();
        let frame = enricher.enrich(forecast_frame(), at(12, 0));
        assert_eq!(frame.get("DEMAIN"), Some(&FieldValue::from("----")));
    }

    #[test]
    fn test_known_colour_untouched() {
        let mut enricher = FrameEnricher::default();
        let frame: Frame = [("DEMAIN", FieldValue::from("ROUG"))].into_iter().collect();
        let frame = enricher.enrich(frame, at(21, 0));
        assert_eq!(frame.get("DEMAIN"), Some(&FieldValue::from("ROUG")));
    }

    #[test]
    fn test_aux_currents() {
        let mut enricher = FrameEnricher::default().with_aux(
            AuxConfig::default(),
            Box::new(FixedSampler::new(vec![0.2, 0.4])),
        );
        let frame = enricher.enrich(Frame::new(), at(12, 0));
        let i1 = frame.get("IAUX1").and_then(FieldValue::as_decimal).unwrap();
        let i2 = frame.get("IAUX2").and_then(FieldValue::as_decimal).unwrap();
        assert!((i1 - 1.5).abs() < 1e-9);
        assert!((i2 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_aux_failure_keeps_frame() {
        let mut enricher = FrameEnricher::default().with_aux(
            AuxConfig::default(),
            Box::new(FixedSampler::failing()),
        );
        let frame: Frame = [("PAPP", FieldValue::Integer(1070))].into_iter().collect();
        let frame = enricher.enrich(frame, at(12, 0));
        assert_eq!(frame.len(), 1);
        assert!(!frame.contains("IAUX1"));
    }

    #[test]
    fn test_aux_config_validation() {
        let config = AuxConfig {
            channels: vec![0],
            ..AuxConfig::default()
        };
        assert!(config.validate().is_err());
        let config = AuxConfig {
            channels: vec![0, 4],
            ..AuxConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(AuxConfig::default().validate().is_ok());
    }
}
