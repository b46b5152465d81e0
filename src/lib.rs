//! # teleinfo-rs - Linky Teleinfo (TIC) Ingestion into InfluxDB
//!
//! The teleinfo-rs crate reads the historic-mode Teleinfo stream that French
//! Linky electricity meters emit on their customer serial output, validates and
//! decodes each field, and persists every completed frame as a batch of
//! time-series points.
//!
//! ## Features
//!
//! - Read the 1200 baud, 7-bit serial link line by line with a bounded timeout
//! - Validate per-field checksums and discard corrupted groups
//! - Assemble fields into frames delimited by STX/ETX, resynchronizing on noise
//! - Type fields as integers, scaled decimals or text through a field table
//! - Substitute tomorrow's unknown Tempo colour during the nightly window
//! - Append auxiliary current transformer readings from an ADS1115 ADC
//!   (`raspberry-pi` feature)
//! - Persist frames to InfluxDB 1.x, waiting for the server and creating the
//!   database when needed
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! teleinfo-rs = "1.0.0"
//! ```
//!
//! ```rust,no_run
//! use teleinfo_rs::{build_pipeline, init_logger, TeleinfoConfig};
//!
//! # async fn run() -> Result<(), teleinfo_rs::TeleinfoError> {
//! init_logger();
//! let config = TeleinfoConfig::default();
//! let mut pipeline = build_pipeline(&config, None)?;
//! pipeline.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod enrich;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod store;
pub mod teleinfo;

pub use crate::config::TeleinfoConfig;
pub use crate::error::TeleinfoError;
pub use crate::logging::{init_logger, init_logger_with_level, log_info};

// Protocol
pub use teleinfo::{
    FieldKind, FieldProfile, FieldTable, FieldValue, Frame, FrameAssembler, LineReader,
    LineSource, SerialConfig, TeleinfoReader,
};

// Enrichment and persistence
pub use enrich::{AnalogSampler, AuxConfig, FrameEnricher};
pub use pipeline::{check_lines, CheckSummary, Clock, Pipeline, SystemClock};
pub use store::{InfluxClient, StoreConfig, StoreSink, TimeSeriesStore};

/// Serial line source used by the service.
pub type SerialLineReader = LineReader<tokio_serial::SerialStream>;

/// Opens the configured serial port.
///
/// # Returns
/// * `Ok(SerialLineReader)` - Port opened in 7-bit mode
/// * `Err(TeleinfoError)` - The port could not be opened
pub fn open(config: &SerialConfig) -> Result<SerialLineReader, TeleinfoError> {
    teleinfo::serial::open_serial(config)
}

/// Wires serial port, enricher and InfluxDB sink from one configuration.
///
/// # Arguments
/// * `config` - Validated service configuration
/// * `sampler` - ADC for the auxiliary currents; ignored unless `config.enrich.aux` is set
///
/// # Returns
/// * `Ok(Pipeline)` - Ready to [`run`](Pipeline::run)
/// * `Err(TeleinfoError)` - The port could not be opened or the HTTP client built
pub fn build_pipeline(
    config: &TeleinfoConfig,
    sampler: Option<Box<dyn AnalogSampler>>,
) -> Result<Pipeline<SerialLineReader, InfluxClient>, TeleinfoError> {
    config.validate()?;

    let reader = TeleinfoReader::new(open(&config.serial)?, config.fields.to_table());

    let mut enricher = FrameEnricher::new(config.enrich.forecast());
    match (&config.enrich.aux, sampler) {
        (Some(aux), Some(sampler)) => enricher = enricher.with_aux(aux.clone(), sampler),
        (Some(_), None) => log::warn!("Auxiliary currents configured but no sampler available"),
        _ => {}
    }

    let client = InfluxClient::new(&config.store)?;
    log::info!("Storing into {} on {}", config.store.database, client.url());
    let sink = StoreSink::new(client, &config.store);

    Ok(Pipeline::new(reader, enricher, sink))
}
