#![cfg_attr(not(test), no_std)]

//! Driver for the TI INA219 high side current and power monitor.
//!
//! Only the continuous shunt and bus measurement mode is supported. The calibration register is
//! programmed once on creation, current and power are read from the device registers.

mod error;

pub use error::{Err, Error, I2c, Result};

pub const DEFAULT_ADDRESS: u8 = 0x40;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
enum Register {
    Config = 0x00,
    ShuntVoltage = 0x01,
    BusVoltage = 0x02,
    Power = 0x03,
    Current = 0x04,
    Calibration = 0x05,
}

/// Calibration of the current and power registers for a given shunt.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Calibration {
    /// configuration register: bus range, PGA gain, ADC resolution and mode
    pub config: u16,
    /// calibration register
    pub calibration: u16,
    /// mA per bit of the current register
    pub current_lsb: f32,
}

impl Calibration {
    /// 32V bus range, 320mV shunt range, 12 bit continuous conversion. Up to 3.2A with 0.1 Ohm
    /// shunt, 0.1mA resolution.
    pub const RANGE_32V_2A: Self = Self {
        config: 0x399F,
        calibration: 4096,
        current_lsb: 0.1,
    };

    /// mW per bit of the power register. Fixed at 20 times the current LSB by the device.
    #[must_use]
    pub fn power_lsb(&self) -> f32 {
        self.current_lsb * 20.0
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::RANGE_32V_2A
    }
}

pub struct Ina219<I> {
    i2c: I,
    address: u8,
    calibration: Calibration,
}

impl<I: I2c> Ina219<I> {
    /// Configures the device and programs the calibration.
    ///
    /// # Errors
    ///
    /// This function will return an error if the device does not respond or does not accept the
    /// configuration.
    pub fn new(i2c: I, address: u8, calibration: Calibration) -> Result<Self, I> {
        let mut result = Self {
            i2c,
            address,
            calibration,
        };
        result.write_register(Register::Config, calibration.config)?;
        if result.read_register(Register::Config)? != calibration.config {
            return Err(Error::InvalidConfig);
        }
        result.write_register(Register::Calibration, calibration.calibration)?;
        Ok(result)
    }

    /// Bus voltage in V.
    ///
    /// # Errors
    ///
    /// This function will return an error if the bus transfer fails.
    pub fn bus_voltage(&mut self) -> Result<f32, I> {
        let raw = self.read_register(Register::BusVoltage)?;
        // bits 15..3 hold the voltage with 4mV per bit
        Ok(f32::from(raw >> 3) * 0.004)
    }

    /// Shunt voltage in mV.
    ///
    /// # Errors
    ///
    /// This function will return an error if the bus transfer fails.
    pub fn shunt_voltage(&mut self) -> Result<f32, I> {
        let raw = self.read_register(Register::ShuntVoltage)?;
        Ok(f32::from(raw as i16) * 0.01)
    }

    /// Current in mA.
    ///
    /// # Errors
    ///
    /// This function will return an error if the bus transfer fails.
    pub fn current(&mut self) -> Result<f32, I> {
        let raw = self.read_register(Register::Current)?;
        Ok(f32::from(raw as i16) * self.calibration.current_lsb)
    }

    /// Power in mW.
    ///
    /// # Errors
    ///
    /// This function will return an error if the bus transfer fails.
    pub fn power(&mut self) -> Result<f32, I> {
        let raw = self.read_register(Register::Power)?;
        Ok(f32::from(raw) * self.calibration.power_lsb())
    }

    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Give back the bus.
    pub fn release(self) -> I {
        self.i2c
    }

    fn write_register(&mut self, reg: Register, value: u16) -> Result<(), I> {
        let [high, low] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[reg as u8, high, low])
            .map_err(Error::I2c)
    }

    fn read_register(&mut self, reg: Register) -> Result<u16, I> {
        let mut buf = [0; 2];
        self.i2c
            .write_read(self.address, &[reg as u8], &mut buf)
            .map_err(Error::I2c)?;
        Ok(u16::from_be_bytes(buf))
    }
}
