//! # Time-Series Store Sink
//!
//! Every completed frame becomes one batch of points, one point per field:
//!
//! ```text
//! PAPP,host=raspberry,region=linky value=1070i 1700000000
//! ```
//!
//! [`StoreSink`] owns the connection lifecycle. [`StoreSink::ensure_connected`]
//! blocks until the target database exists (creating it when needed), retrying
//! unreachable-store errors forever at a fixed delay. A failed write drops the
//! frame and marks the sink disconnected; the next write re-runs the gate first.

pub mod influx;
pub mod memory;

pub use influx::InfluxClient;
pub use memory::MemoryStore;

use crate::constants::{
    STORE_DEFAULT_DATABASE, STORE_DEFAULT_REQUEST_TIMEOUT_SECS, STORE_DEFAULT_RETRY_DELAY_SECS,
    STORE_DEFAULT_URL, STORE_TAG_HOST, STORE_TAG_REGION, STORE_VALUE_FIELD,
};
use crate::error::TeleinfoError;
use crate::teleinfo::field::FieldValue;
use crate::teleinfo::frame::Frame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub database: String,
    pub retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub tags: BTreeMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            url: STORE_DEFAULT_URL.to_string(),
            database: STORE_DEFAULT_DATABASE.to_string(),
            retry_delay_secs: STORE_DEFAULT_RETRY_DELAY_SECS,
            request_timeout_secs: STORE_DEFAULT_REQUEST_TIMEOUT_SECS,
            tags: [STORE_TAG_HOST, STORE_TAG_REGION]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl StoreConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// One time-series point: `measurement,tags value=<v> <unix seconds>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub value: FieldValue,
    pub timestamp: DateTime<Utc>,
}

fn escape_key(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

fn escape_measurement(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
}

fn field_literal(value: &FieldValue) -> String {
    match value {
        FieldValue::Integer(v) => format!("{v}i"),
        FieldValue::Decimal(v) => format!("{v}"),
        FieldValue::Text(v) => format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

impl Point {
    /// Renders the point in InfluxDB line protocol, second precision.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_measurement(&self.measurement);
        for (k, v) in &self.tags {
            line.push(',');
            line.push_str(&escape_key(k));
            line.push('=');
            line.push_str(&escape_key(v));
        }
        line.push(' ');
        line.push_str(STORE_VALUE_FIELD);
        line.push('=');
        line.push_str(&field_literal(&self.value));
        line.push(' ');
        line.push_str(&self.timestamp.timestamp().to_string());
        line
    }
}

/// The operations the sink needs from a time-series database.
#[async_trait::async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<String>, TeleinfoError>;

    async fn create_database(&self, name: &str) -> Result<(), TeleinfoError>;

    /// Writes all points in one request.
    async fn write_points(&self, database: &str, points: &[Point]) -> Result<(), TeleinfoError>;
}

/// Connectivity of the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Verifying,
    Connected,
}

/// Counters kept by the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub frames_written: u64,
    pub points_written: u64,
    pub frames_dropped: u64,
    pub connect_retries: u64,
}

/// Persists frames to a [`TimeSeriesStore`].
pub struct StoreSink<S: TimeSeriesStore> {
    store: S,
    database: String,
    tags: BTreeMap<String, String>,
    retry_delay: Duration,
    state: ConnectionState,
    stats: SinkStats,
}

impl<S: TimeSeriesStore> StoreSink<S> {
    pub fn new(store: S, config: &StoreConfig) -> Self {
        StoreSink {
            store,
            database: config.database.clone(),
            tags: config.tags.clone(),
            retry_delay: config.retry_delay(),
            state: ConnectionState::Disconnected,
            stats: SinkStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn verify(&mut self) -> Result<(), TeleinfoError> {
        self.state = ConnectionState::Verifying;
        log::info!("Database {} exists?", self.database);
        let databases = self.store.list_databases().await?;
        if !databases.iter().any(|d| *d == self.database) {
            log::info!("Database {} creation..", self.database);
            self.store.create_database(&self.database).await?;
            log::info!("Database {} created!", self.database);
        }
        Ok(())
    }

    /// Blocks until the database is verified.
    ///
    /// Unreachable-store errors are retried forever after `retry_delay`; any
    /// other error is returned.
    pub async fn ensure_connected(&mut self) -> Result<(), TeleinfoError> {
        loop {
            match self.verify().await {
                Ok(()) => {
                    self.state = ConnectionState::Connected;
                    log::info!("Connected to {}!", self.database);
                    return Ok(());
                }
                Err(TeleinfoError::StoreUnreachable(reason)) => {
                    self.state = ConnectionState::Disconnected;
                    self.stats.connect_retries += 1;
                    log::warn!(
                        "Store is not reachable ({reason}). Waiting {}s to retry.",
                        self.retry_delay.as_secs()
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    self.state = ConnectionState::Disconnected;
                    return Err(e);
                }
            }
        }
    }

    /// One point per field, all stamped with `timestamp`.
    pub fn points_for(&self, frame: &Frame, timestamp: DateTime<Utc>) -> Vec<Point> {
        frame
            .iter()
            .map(|(name, value)| Point {
                measurement: name.clone(),
                tags: self.tags.clone(),
                value: value.clone(),
                timestamp,
            })
            .collect()
    }

    /// Writes `frame` as one batch. Returns the number of points written.
    ///
    /// On failure the frame is lost and the sink goes back to `Disconnected`.
    pub async fn write(
        &mut self,
        frame: &Frame,
        timestamp: DateTime<Utc>,
    ) -> Result<usize, TeleinfoError> {
        if frame.is_empty() {
            return Ok(0);
        }
        if self.state != ConnectionState::Connected {
            self.ensure_connected().await?;
        }

        let points = self.points_for(frame, timestamp);
        match self.store.write_points(&self.database, &points).await {
            Ok(()) => {
                self.stats.frames_written += 1;
                self.stats.points_written += points.len() as u64;
                Ok(points.len())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                self.stats.frames_dropped += 1;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
    }

    fn point(value: FieldValue) -> Point {
        Point {
            measurement: "PAPP".into(),
            tags: StoreConfig::default().tags,
            value,
            timestamp: ts(),
        }
    }

    #[test]
    fn test_line_protocol_integer() {
        assert_eq!(
            point(FieldValue::Integer(1070)).to_line_protocol(),
            "PAPP,host=raspberry,region=linky value=1070i 1700000000"
        );
    }

    #[test]
    fn test_line_protocol_decimal_and_text() {
        assert_eq!(
            point(FieldValue::Decimal(1964.28)).to_line_protocol(),
            "PAPP,host=raspberry,region=linky value=1964.28 1700000000"
        );
        assert_eq!(
            point(FieldValue::from("HP \"x\"")).to_line_protocol(),
            "PAPP,host=raspberry,region=linky value=\"HP \\\"x\\\"\" 1700000000"
        );
    }

    #[test]
    fn test_escaping() {
        let mut p = point(FieldValue::Integer(1));
        p.measurement = "A B,C".into();
        p.tags = [("k=1".to_string(), "v 2".to_string())].into_iter().collect();
        assert_eq!(p.to_line_protocol(), "A\\ B\\,C,k\\=1=v\\ 2 value=1i 1700000000");
    }

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.database, "linky");
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.tags.get("host").map(String::as_str), Some("raspberry"));
        assert_eq!(config.tags.get("region").map(String::as_str), Some("linky"));
    }
}
