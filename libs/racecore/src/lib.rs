#![cfg_attr(not(test), no_std)]

//! Hardware independent core of the race controller.
//!
//! ```text
//!  lap sensor IRQ          core 1 (200Hz)                     core 0 (10Hz)
//!        |
//!   LapCounter ---> LaneController x2 ---> ControlLoop ---> Mailbox ---> UiLoop
//!                        |      |                                        |    |
//!                      ADC    PWM                                   INA219  OLED/log
//! ```
//!
//! The lap counters are written from the edge interrupt and read by the control loop. The control
//! loop publishes one `TelemetryPacket` per cycle into a single slot mailbox. The UI loop peeks the
//! latest packet, adds the power monitor readings and hands it to the display and the log.

pub mod config;
pub mod control;
pub mod hal;
pub mod lane;
pub mod lap_counter;
pub mod telemetry;
pub mod ui;

pub use config::{ConfigError, RaceConfig};
pub use control::{ControlLoop, RaceOutcome};
pub use hal::{
    Actuator, InputSensor, LaneDisplay, PowerMonitor, PowerMonitorError, PowerReading,
    TelemetryLog,
};
pub use lane::{Lane, LaneController, LaneState};
pub use lap_counter::LapCounter;
pub use telemetry::{LaneTelemetry, TelemetryPacket};
pub use ui::{UiLoop, UiReport};

/// Number of lanes on the track.
pub const LANES: usize = 2;
