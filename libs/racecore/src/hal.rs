//! Interfaces to the hardware the core talks to.

use blanket::blanket;

use crate::telemetry::{LaneTelemetry, TelemetryPacket};

/// Analog input of a lane.
#[blanket(derive(Mut))]
pub trait InputSensor {
    /// Read the input normalized to `0.0..=1.0`.
    fn read_normalized(&mut self) -> f32;
}

/// Drive stage of a lane.
#[blanket(derive(Mut))]
pub trait Actuator {
    /// Apply a duty cycle in `0.0..=1.0`. Setting the same duty twice has no additional effect.
    fn set_duty(&mut self, duty: f32);
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMonitorError {
    /// The device did not respond during initialisation.
    Absent,
    /// Communication with the device failed.
    Bus,
}

/// One reading of a power monitor.
#[derive(Debug, Default, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerReading {
    /// bus voltage in V
    pub bus_voltage: f32,
    /// current in mA
    pub current: f32,
    /// power in mW
    pub power: f32,
}

#[blanket(derive(Mut))]
pub trait PowerMonitor {
    /// Poll the monitor.
    ///
    /// # Errors
    ///
    /// This function will return an error if the device is missing or the bus transfer failed.
    fn read(&mut self) -> Result<PowerReading, PowerMonitorError>;
}

/// Per lane display. Rendering failures are the implementation's problem.
#[blanket(derive(Mut))]
pub trait LaneDisplay {
    fn render_lane(&mut self, lane: usize, telemetry: &LaneTelemetry);
}

/// Best effort sink for the enriched telemetry.
#[blanket(derive(Mut))]
pub trait TelemetryLog {
    fn log(&mut self, packet: &TelemetryPacket);
}
