use crate::{hal::PowerReading, lane::LaneState, LANES};

/// Snapshot of one lane.
///
/// The control loop fills input, duty, laps and state. The power fields stay zero until the UI
/// loop merges in the power monitor reading.
#[derive(Debug, Default, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LaneTelemetry {
    /// normalized input `0.0..=1.0`
    pub input: f32,
    /// applied duty cycle
    pub duty: f32,
    pub laps: u32,
    pub state: LaneState,
    /// bus voltage in V
    pub bus_voltage: f32,
    /// current in mA
    pub current: f32,
    /// power in mW
    pub power: f32,
}

impl LaneTelemetry {
    pub fn apply_power(&mut self, reading: PowerReading) {
        self.bus_voltage = reading.bus_voltage;
        self.current = reading.current;
        self.power = reading.power;
    }

    #[must_use]
    pub const fn power_reading(&self) -> PowerReading {
        PowerReading {
            bus_voltage: self.bus_voltage,
            current: self.current,
            power: self.power,
        }
    }
}

/// Snapshot of all lanes of one control cycle.
///
/// The default packet has all lanes idle and zeroed. It stands in for telemetry before the control
/// loop published anything.
#[derive(Debug, Default, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryPacket {
    pub lanes: [LaneTelemetry; LANES],
    /// milliseconds since boot
    pub ms: u64,
}

impl TelemetryPacket {
    #[must_use]
    pub const fn lane(&self, lane: usize) -> Option<&LaneTelemetry> {
        if lane < LANES {
            Some(&self.lanes[lane])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LaneTelemetry, TelemetryPacket};
    use crate::{hal::PowerReading, lane::LaneState, LANES};

    #[test]
    fn default_is_zeroed() {
        let packet = TelemetryPacket::default();
        assert_eq!(packet.ms, 0);
        assert_eq!(packet.lanes.len(), LANES);
        for lane in packet.lanes {
            assert_eq!(lane.state, LaneState::Idle);
            assert_eq!(lane.duty, 0.0);
            assert_eq!(lane.laps, 0);
            assert_eq!(lane.power_reading(), PowerReading::default());
        }
        assert!(packet.lane(LANES).is_none());
    }

    #[test]
    fn apply_power() {
        let mut telemetry = LaneTelemetry {
            input: 0.5,
            duty: 0.5,
            laps: 3,
            state: LaneState::Running,
            ..Default::default()
        };
        let reading = PowerReading {
            bus_voltage: 12.0,
            current: 850.5,
            power: 10_200.0,
        };
        telemetry.apply_power(reading);
        assert_eq!(telemetry.power_reading(), reading);
        assert_eq!(telemetry.laps, 3);
        assert_eq!(telemetry.duty, 0.5);
    }
}
