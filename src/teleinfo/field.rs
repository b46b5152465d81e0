//! # Teleinfo Field Typing
//!
//! Values arrive as text. A classification table decides, per label, whether
//! the text is an integer, a fixed-point index to be scaled (Wh to kWh), or
//! plain text. Labels missing from the table are text.

use crate::error::TeleinfoError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How the raw text of a field is typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    /// Raw integer text divided by the scale (1000 turns Wh into kWh).
    ScaledDecimal(u32),
    Text,
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            FieldValue::Decimal(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Decimal(v) => write!(f, "{v}"),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Decimal(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Built-in classification tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldProfile {
    /// Energy indexes stored as integer Wh.
    #[default]
    Standard,
    /// Energy indexes stored as decimal kWh.
    KilowattHours,
}

/// Energy index labels (Wh counters) across the BASE, HC, EJP and Tempo options.
const INDEX_FIELDS: &[&str] = &[
    "BASE", "HCHC", "HCHP", "EJPHN", "EJPHPM", "BBRHCJB", "BBRHPJB", "BBRHCJW", "BBRHPJW",
    "BBRHCJR", "BBRHPJR",
];

/// Current and power labels.
const MEASURE_FIELDS: &[&str] = &[
    "ISOUSC", "IINST", "IINST1", "IINST2", "IINST3", "IMAX", "IMAX1", "IMAX2", "IMAX3", "PAPP",
    "PMAX", "ADPS", "ADIR1", "ADIR2", "ADIR3",
];

static STANDARD_FIELDS: Lazy<HashMap<&'static str, FieldKind>> = Lazy::new(|| {
    INDEX_FIELDS
        .iter()
        .chain(MEASURE_FIELDS)
        .map(|name| (*name, FieldKind::Integer))
        .collect()
});

static KILOWATT_HOUR_FIELDS: Lazy<HashMap<&'static str, FieldKind>> = Lazy::new(|| {
    let mut table = STANDARD_FIELDS.clone();
    for name in INDEX_FIELDS {
        table.insert(*name, FieldKind::ScaledDecimal(1000));
    }
    table
});

/// Classification table, read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTable {
    kinds: HashMap<String, FieldKind>,
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::from_profile(FieldProfile::Standard)
    }
}

impl FieldTable {
    /// An empty table: every field is text.
    pub fn empty() -> Self {
        FieldTable {
            kinds: HashMap::new(),
        }
    }

    pub fn from_profile(profile: FieldProfile) -> Self {
        let source = match profile {
            FieldProfile::Standard => &*STANDARD_FIELDS,
            FieldProfile::KilowattHours => &*KILOWATT_HOUR_FIELDS,
        };
        FieldTable {
            kinds: source
                .iter()
                .map(|(name, kind)| (name.to_string(), *kind))
                .collect(),
        }
    }

    /// Returns the table with `name` classified as `kind`.
    pub fn with(mut self, name: &str, kind: FieldKind) -> Self {
        self.kinds.insert(name.to_string(), kind);
        self
    }

    pub fn classify(&self, name: &str) -> FieldKind {
        self.kinds.get(name).copied().unwrap_or(FieldKind::Text)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Types `raw` according to the classification of `name`.
    ///
    /// A numeric field whose text does not parse is an error, never a default.
    pub fn decode(&self, name: &str, raw: &str) -> Result<FieldValue, TeleinfoError> {
        let decode_error = |reason: String| TeleinfoError::FieldDecodeError {
            name: name.to_string(),
            value: raw.to_string(),
            reason,
        };

        match self.classify(name) {
            FieldKind::Integer => raw
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|e| decode_error(e.to_string())),
            FieldKind::ScaledDecimal(0) => Err(decode_error("scale is zero".into())),
            FieldKind::ScaledDecimal(scale) => {
                let value = raw
                    .parse::<f64>()
                    .map_err(|e| decode_error(e.to_string()))?;
                if !value.is_finite() {
                    return Err(decode_error("not a finite number".into()));
                }
                Ok(FieldValue::Decimal(value / f64::from(scale)))
            }
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_profile() {
        let table = FieldTable::default();
        assert_eq!(table.classify("PAPP"), FieldKind::Integer);
        assert_eq!(table.classify("HCHC"), FieldKind::Integer);
        assert_eq!(table.classify("ADCO"), FieldKind::Text);
        assert_eq!(table.classify("PTEC"), FieldKind::Text);
    }

    #[test]
    fn test_kilowatt_hours_profile() {
        let table = FieldTable::from_profile(FieldProfile::KilowattHours);
        assert_eq!(table.classify("BASE"), FieldKind::ScaledDecimal(1000));
        assert_eq!(table.classify("IINST"), FieldKind::Integer);
        assert_eq!(
            table.decode("BASE", "001964280").unwrap(),
            FieldValue::Decimal(1964.280)
        );
    }

    #[test]
    fn test_decode_integer_with_leading_zeros() {
        let table = FieldTable::default();
        assert_eq!(table.decode("PAPP", "01070").unwrap(), FieldValue::Integer(1070));
        assert_eq!(table.decode("IINST", "000").unwrap(), FieldValue::Integer(0));
    }

    #[test]
    fn test_decode_integer_failure_is_an_error() {
        let table = FieldTable::default();
        let err = table.decode("PAPP", "01O70").unwrap_err();
        assert!(matches!(err, TeleinfoError::FieldDecodeError { ref name, .. } if name == "PAPP"));
    }

    #[test]
    fn test_decode_text_keeps_raw() {
        let table = FieldTable::default();
        assert_eq!(table.decode("PTEC", "HP..").unwrap(), FieldValue::from("HP.."));
        assert_eq!(table.decode("UNKNOWN", "0042").unwrap(), FieldValue::from("0042"));
    }

    #[test]
    fn test_zero_scale_rejected() {
        let table = FieldTable::empty().with("X", FieldKind::ScaledDecimal(0));
        assert!(table.decode("X", "12").is_err());
    }

    #[test]
    fn test_kind_serde() {
        let kind: FieldKind = serde_json::from_str(r#"{"scaled_decimal":1000}"#).unwrap();
        assert_eq!(kind, FieldKind::ScaledDecimal(1000));
        let kind: FieldKind = serde_json::from_str(r#""integer""#).unwrap();
        assert_eq!(kind, FieldKind::Integer);
    }
}
