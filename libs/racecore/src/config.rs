//! Race configuration and its persisted form.
//!
//! The persisted record is a postcard encoded, versioned config followed by a CRC-32 of the encoded
//! config. Erased flash or a record from another firmware fails to decode or fails the checksum.

use crc::{Crc, CRC_32_ISO_HDLC};
use serde::{Deserialize, Serialize};

/// Upper bound of the encoded record size.
pub const STORED_CONFIG_SIZE: usize = 64;

const CHECKSUM: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// the duty ceiling must be in `0.0 < max_duty < 1.0`
    DutyCeiling,
    /// a loop, PWM or bus rate is zero or out of range
    Rate,
    /// the UI loop must run slower than the control loop
    UiNotSlower,
    /// the race needs at least one lap
    TargetLaps,
    /// I2C addresses are 7 bit
    Address,
    Encode,
    Decode,
    Checksum,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RaceConfig {
    /// control loop rate in Hz
    pub control_hz: u32,
    /// UI loop rate in Hz
    pub ui_hz: u32,
    pub pwm_frequency_hz: u32,
    /// safety ceiling of the applied duty
    pub max_duty: f32,
    /// minimum time between two lap sensor edges in us
    pub debounce_us: u32,
    pub target_laps: u32,
    pub i2c_frequency_hz: u32,
    pub power_monitor_address: u8,
    pub display_address: u8,
}

impl RaceConfig {
    pub const fn new() -> Self {
        Self {
            control_hz: 200,
            ui_hz: 10,
            pwm_frequency_hz: 20_000,
            max_duty: 0.85,
            debounce_us: 3_000,
            target_laps: 10,
            i2c_frequency_hz: 400_000,
            power_monitor_address: 0x40,
            display_address: 0x3C,
        }
    }

    /// Check the values for consistency.
    ///
    /// # Errors
    ///
    /// This function will return the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_duty > 0.0 && self.max_duty < 1.0) {
            return Err(ConfigError::DutyCeiling);
        }
        if self.control_hz == 0
            || self.ui_hz == 0
            || self.pwm_frequency_hz == 0
            || self.i2c_frequency_hz == 0
            || self.i2c_frequency_hz > 1_000_000
        {
            return Err(ConfigError::Rate);
        }
        if self.ui_hz >= self.control_hz {
            return Err(ConfigError::UiNotSlower);
        }
        if self.target_laps == 0 {
            return Err(ConfigError::TargetLaps);
        }
        if self.power_monitor_address > 0x7F || self.display_address > 0x7F {
            return Err(ConfigError::Address);
        }
        Ok(())
    }

    /// Control loop period in us.
    #[must_use]
    pub const fn control_period_us(&self) -> u64 {
        1_000_000 / self.control_hz as u64
    }

    /// UI loop period in us.
    #[must_use]
    pub const fn ui_period_us(&self) -> u64 {
        1_000_000 / self.ui_hz as u64
    }

    /// Encode the config into its persisted form.
    ///
    /// # Errors
    ///
    /// This function will return an error if `buf` is too small.
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        let record = StoredConfig::new(ConfigSelection::V0(*self))?;
        postcard::to_slice(&record, buf).map_err(|_| ConfigError::Encode)
    }

    /// Decode and validate a persisted config.
    ///
    /// # Errors
    ///
    /// This function will return an error if the bytes are not a record, the checksum does not
    /// match or the stored values are invalid.
    pub fn decode(bytes: &[u8]) -> Result<Self, ConfigError> {
        let record: StoredConfig =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)?;
        if record.checksum != checksum(&record.config)? {
            return Err(ConfigError::Checksum);
        }
        let ConfigSelection::V0(config) = record.config;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize)]
enum ConfigSelection {
    V0(RaceConfig),
}

#[derive(Serialize, Deserialize)]
struct StoredConfig {
    config: ConfigSelection,
    checksum: u32,
}

impl StoredConfig {
    fn new(config: ConfigSelection) -> Result<Self, ConfigError> {
        let checksum = checksum(&config)?;
        Ok(Self { config, checksum })
    }
}

fn checksum(config: &ConfigSelection) -> Result<u32, ConfigError> {
    let mut buf = [0; STORED_CONFIG_SIZE];
    let bytes = postcard::to_slice(config, &mut buf).map_err(|_| ConfigError::Encode)?;
    Ok(CHECKSUM.checksum(bytes))
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RaceConfig, STORED_CONFIG_SIZE};

    #[test]
    fn defaults() {
        let config = RaceConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.control_period_us(), 5_000);
        assert_eq!(config.ui_period_us(), 100_000);
        assert_eq!(config.target_laps, 10);
        assert_eq!(config.max_duty, 0.85);
    }

    #[test]
    fn validate() {
        let base = RaceConfig::new();
        let cases = [
            (RaceConfig { max_duty: 1.0, ..base }, ConfigError::DutyCeiling),
            (RaceConfig { max_duty: 0.0, ..base }, ConfigError::DutyCeiling),
            (RaceConfig { max_duty: f32::NAN, ..base }, ConfigError::DutyCeiling),
            (RaceConfig { control_hz: 0, ..base }, ConfigError::Rate),
            (RaceConfig { ui_hz: 0, ..base }, ConfigError::Rate),
            (RaceConfig { i2c_frequency_hz: 2_000_000, ..base }, ConfigError::Rate),
            (RaceConfig { ui_hz: 200, ..base }, ConfigError::UiNotSlower),
            (RaceConfig { target_laps: 0, ..base }, ConfigError::TargetLaps),
            (RaceConfig { display_address: 0x80, ..base }, ConfigError::Address),
        ];
        for (config, error) in cases {
            assert_eq!(config.validate(), Err(error));
        }
    }

    #[test]
    fn persisted_record() {
        let config = RaceConfig {
            target_laps: 3,
            debounce_us: 1_000,
            ..RaceConfig::new()
        };
        let mut buf = [0xFF; STORED_CONFIG_SIZE];
        let len = config.encode(&mut buf).unwrap().len();
        assert!(len < STORED_CONFIG_SIZE);
        assert_eq!(RaceConfig::decode(&buf), Ok(config));
        assert_eq!(RaceConfig::decode(&buf[..len]), Ok(config));
    }

    #[test]
    fn rejects_corrupted_record() {
        let mut buf = [0xFF; STORED_CONFIG_SIZE];
        let len = RaceConfig::new().encode(&mut buf).unwrap().len();
        // single bit flip inside the record
        let mut corrupted = buf;
        corrupted[len - 6] ^= 0x01;
        assert!(matches!(
            RaceConfig::decode(&corrupted),
            Err(ConfigError::Checksum | ConfigError::Decode)
        ));
        // erased flash
        assert!(RaceConfig::decode(&[0xFF; STORED_CONFIG_SIZE]).is_err());
    }

    #[test]
    fn rejects_invalid_values() {
        let config = RaceConfig {
            target_laps: 0,
            ..RaceConfig::new()
        };
        let mut buf = [0; STORED_CONFIG_SIZE];
        assert_eq!(config.encode(&mut buf).map(|_| ()), Ok(()));
        assert_eq!(RaceConfig::decode(&buf), Err(ConfigError::TargetLaps));
    }

    #[test]
    fn buffer_too_small() {
        let mut buf = [0; 4];
        assert_eq!(
            RaceConfig::new().encode(&mut buf).map(|_| ()),
            Err(ConfigError::Encode)
        );
    }
}
