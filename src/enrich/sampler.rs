//! Analog samplers for the auxiliary current channels.
//!
//! The production sampler is an ADS1115 16-bit ADC on the Raspberry Pi I2C bus
//! (behind the `raspberry-pi` feature). Reads are short and blocking; they run
//! inline in the ingest loop.

use crate::error::TeleinfoError;

/// Source of instantaneous voltage readings.
pub trait AnalogSampler: Send {
    /// Reads the voltage on `channel`, in volts.
    fn read_voltage(&mut self, channel: u8) -> Result<f64, TeleinfoError>;
}

/// Sampler returning fixed voltages, indexed by channel.
#[derive(Debug, Clone, Default)]
pub struct FixedSampler {
    voltages: Vec<f64>,
    failing: bool,
}

impl FixedSampler {
    pub fn new(voltages: Vec<f64>) -> Self {
        FixedSampler {
            voltages,
            failing: false,
        }
    }

    /// A sampler whose every read fails.
    pub fn failing() -> Self {
        FixedSampler {
            voltages: Vec::new(),
            failing: true,
        }
    }
}

impl AnalogSampler for FixedSampler {
    fn read_voltage(&mut self, channel: u8) -> Result<f64, TeleinfoError> {
        if self.failing {
            return Err(TeleinfoError::SamplerError("sampler offline".into()));
        }
        self.voltages
            .get(usize::from(channel))
            .copied()
            .ok_or_else(|| TeleinfoError::SamplerError(format!("no channel {channel}")))
    }
}

#[cfg(feature = "raspberry-pi")]
mod ads1115 {
    use super::AnalogSampler;
    use crate::error::TeleinfoError;
    use rppal::i2c::I2c;
    use std::time::Duration;

    const REG_CONVERSION: u8 = 0x00;
    const REG_CONFIG: u8 = 0x01;

    // OS=1 (start), PGA=±4.096 V, MODE=single-shot, DR=128 SPS, comparator off
    const CONFIG_BASE: u16 = 0x8000 | (0b001 << 9) | 0x0100 | (0b100 << 5) | 0x0003;
    const FULL_SCALE_VOLTS: f64 = 4.096;

    /// One conversion at 128 SPS plus margin
    const CONVERSION_TIME: Duration = Duration::from_millis(9);

    /// ADS1115 in single-ended, single-shot mode.
    pub struct Ads1115Sampler {
        i2c: I2c,
    }

    impl Ads1115Sampler {
        pub fn new(bus: u8, address: u16) -> Result<Self, TeleinfoError> {
            let mut i2c =
                I2c::with_bus(bus).map_err(|e| TeleinfoError::SamplerError(e.to_string()))?;
            i2c.set_slave_address(address)
                .map_err(|e| TeleinfoError::SamplerError(e.to_string()))?;
            Ok(Ads1115Sampler { i2c })
        }
    }

    impl AnalogSampler for Ads1115Sampler {
        fn read_voltage(&mut self, channel: u8) -> Result<f64, TeleinfoError> {
            if channel > 3 {
                return Err(TeleinfoError::SamplerError(format!(
                    "no channel {channel}"
                )));
            }

            // MUX 100..111 selects AIN0..AIN3 against GND.
            let config = CONFIG_BASE | ((0b100 | u16::from(channel)) << 12);
            let [hi, lo] = config.to_be_bytes();
            self.i2c
                .write(&[REG_CONFIG, hi, lo])
                .map_err(|e| TeleinfoError::SamplerError(e.to_string()))?;

            std::thread::sleep(CONVERSION_TIME);

            let mut raw = [0u8; 2];
            self.i2c
                .write_read(&[REG_CONVERSION], &mut raw)
                .map_err(|e| TeleinfoError::SamplerError(e.to_string()))?;

            let counts = i16::from_be_bytes(raw);
            Ok(f64::from(counts) * FULL_SCALE_VOLTS / 32768.0)
        }
    }
}

#[cfg(feature = "raspberry-pi")]
pub use ads1115::Ads1115Sampler;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_sampler() {
        let mut sampler = FixedSampler::new(vec![0.1, 0.2]);
        assert_eq!(sampler.read_voltage(1).unwrap(), 0.2);
        assert!(sampler.read_voltage(2).is_err());
    }

    #[test]
    fn test_failing_sampler() {
        let mut sampler = FixedSampler::failing();
        assert!(matches!(
            sampler.read_voltage(0),
            Err(TeleinfoError::SamplerError(_))
        ));
    }
}
