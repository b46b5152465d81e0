use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use teleinfo_rs::teleinfo::serial::Parity;
use teleinfo_rs::{
    build_pipeline, check_lines, init_logger_with_level, log_info, AnalogSampler, TeleinfoConfig,
};

#[derive(Parser)]
#[command(name = "teleinfo-cli")]
#[command(about = "Reads Linky Teleinfo frames and stores them in InfluxDB")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "TELEINFO_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Serial port device
    #[arg(short, long, env = "TELEINFO_PORT")]
    port: Option<String>,

    #[arg(short, long, env = "TELEINFO_BAUDRATE")]
    baudrate: Option<u32>,

    #[arg(long, value_enum, env = "TELEINFO_PARITY")]
    parity: Option<ParityArg>,

    /// InfluxDB base URL
    #[arg(long, env = "TELEINFO_STORE_URL")]
    store_url: Option<String>,

    #[arg(long, env = "TELEINFO_DATABASE")]
    database: Option<String>,

    /// Debug logging, including every stored frame
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ParityArg {
    None,
    Even,
    Odd,
}

impl From<ParityArg> for Parity {
    fn from(p: ParityArg) -> Self {
        match p {
            ParityArg::None => Parity::None,
            ParityArg::Even => Parity::Even,
            ParityArg::Odd => Parity::Odd,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest frames into the store (default)
    Run,
    /// Print checksum validity of incoming lines without storing anything
    Check {
        /// Stop after this many lines
        #[arg(short, long)]
        lines: Option<u64>,
    },
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<TeleinfoConfig> {
        let mut config = match &self.config {
            Some(path) => TeleinfoConfig::load(path)?,
            None => TeleinfoConfig::default(),
        };

        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baudrate) = self.baudrate {
            config.serial.baudrate = baudrate;
        }
        if let Some(parity) = self.parity {
            config.serial.parity = parity.into();
        }
        if let Some(url) = &self.store_url {
            config.store.url = url.clone();
        }
        if let Some(database) = &self.database {
            config.store.database = database.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "raspberry-pi")]
fn aux_sampler(config: &TeleinfoConfig) -> Option<Box<dyn AnalogSampler>> {
    let aux = config.enrich.aux.as_ref()?;
    match teleinfo_rs::enrich::Ads1115Sampler::new(aux.i2c_bus, aux.address) {
        Ok(sampler) => Some(Box::new(sampler)),
        Err(e) => {
            log::warn!("ADS1115 unavailable, auxiliary currents disabled: {e}");
            None
        }
    }
}

#[cfg(not(feature = "raspberry-pi"))]
fn aux_sampler(config: &TeleinfoConfig) -> Option<Box<dyn AnalogSampler>> {
    if config.enrich.aux.is_some() {
        log::warn!("Built without the raspberry-pi feature, auxiliary currents disabled");
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger_with_level(if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let config = cli.load_config().context("invalid configuration")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let mut pipeline = build_pipeline(&config, aux_sampler(&config))?;
            pipeline.run().await?;
        }
        Commands::Check { lines } => {
            let mut source = teleinfo_rs::open(&config.serial)?;
            let summary = check_lines(&mut source, lines).await?;
            log_info(&format!(
                "{} lines: {} valid, {} bad checksum, {} malformed",
                summary.lines, summary.valid, summary.invalid, summary.malformed
            ));
        }
    }

    Ok(())
}
