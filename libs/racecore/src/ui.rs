use embassy_sync::blocking_mutex::raw::RawMutex;
use sync::mailbox::Mailbox;

use crate::{
    hal::{LaneDisplay, PowerMonitor, PowerMonitorError, PowerReading, TelemetryLog},
    telemetry::TelemetryPacket,
    LANES,
};

/// Result of one UI cycle.
#[derive(Debug, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UiReport {
    /// `false` if the mailbox was empty. The last known packet is shown instead, which is the
    /// zeroed default before the first publish.
    pub published: bool,
    /// power monitors that failed this cycle. Their lane shows zero readings.
    pub monitor_errors: [Option<PowerMonitorError>; LANES],
    /// the packet handed to the display and the log
    pub packet: TelemetryPacket,
}

/// Low rate observer of the control loop.
///
/// Takes the latest telemetry, adds the power monitor readings and forwards it to the displays and
/// the log. Never waits for fresh data: if nothing new was published the last packet is shown
/// again.
pub struct UiLoop<'a, M: RawMutex> {
    telemetry: &'a Mailbox<M, TelemetryPacket>,
    monitors: [&'a mut dyn PowerMonitor; LANES],
    displays: [&'a mut dyn LaneDisplay; LANES],
    log: &'a mut dyn TelemetryLog,
    last: TelemetryPacket,
}

impl<'a, M: RawMutex> UiLoop<'a, M> {
    pub fn new(
        telemetry: &'a Mailbox<M, TelemetryPacket>,
        monitors: [&'a mut dyn PowerMonitor; LANES],
        displays: [&'a mut dyn LaneDisplay; LANES],
        log: &'a mut dyn TelemetryLog,
    ) -> Self {
        Self {
            telemetry,
            monitors,
            displays,
            log,
            last: TelemetryPacket::default(),
        }
    }

    pub fn cycle(&mut self) -> UiReport {
        let published = match self.telemetry.peek() {
            Some(packet) => {
                self.last = packet;
                true
            }
            None => false,
        };

        let mut packet = self.last;
        let mut monitor_errors = [None; LANES];
        for ((telemetry, monitor), error) in packet
            .lanes
            .iter_mut()
            .zip(self.monitors.iter_mut())
            .zip(monitor_errors.iter_mut())
        {
            let reading = monitor.read().unwrap_or_else(|e| {
                *error = Some(e);
                PowerReading::default()
            });
            telemetry.apply_power(reading);
        }

        for (lane, (telemetry, display)) in packet
            .lanes
            .iter()
            .zip(self.displays.iter_mut())
            .enumerate()
        {
            display.render_lane(lane, telemetry);
        }
        self.log.log(&packet);

        UiReport {
            published,
            monitor_errors,
            packet,
        }
    }

    /// Last packet taken from the control loop, without power readings.
    pub const fn last(&self) -> &TelemetryPacket {
        &self.last
    }
}

#[cfg(test)]
mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use sync::mailbox::Mailbox;

    use super::UiLoop;
    use crate::{
        hal::{LaneDisplay, PowerMonitor, PowerMonitorError, PowerReading, TelemetryLog},
        lane::LaneState,
        telemetry::{LaneTelemetry, TelemetryPacket},
    };

    struct FakeMonitor(Result<PowerReading, PowerMonitorError>);

    impl PowerMonitor for FakeMonitor {
        fn read(&mut self) -> Result<PowerReading, PowerMonitorError> {
            self.0
        }
    }

    #[derive(Default)]
    struct FakeDisplay {
        frames: Vec<(usize, LaneTelemetry)>,
    }

    impl LaneDisplay for FakeDisplay {
        fn render_lane(&mut self, lane: usize, telemetry: &LaneTelemetry) {
            self.frames.push((lane, *telemetry));
        }
    }

    #[derive(Default)]
    struct FakeLog {
        packets: Vec<TelemetryPacket>,
    }

    impl TelemetryLog for FakeLog {
        fn log(&mut self, packet: &TelemetryPacket) {
            self.packets.push(*packet);
        }
    }

    const READING_A: PowerReading = PowerReading {
        bus_voltage: 12.1,
        current: 640.0,
        power: 7_740.0,
    };
    const READING_B: PowerReading = PowerReading {
        bus_voltage: 11.9,
        current: 100.0,
        power: 1_190.0,
    };

    fn running_packet(ms: u64, laps: u32) -> TelemetryPacket {
        let lane = LaneTelemetry {
            input: 0.5,
            duty: 0.5,
            laps,
            state: LaneState::Running,
            ..Default::default()
        };
        TelemetryPacket {
            lanes: [lane; 2],
            ms,
        }
    }

    #[test]
    fn zeroed_before_first_publish() {
        let telemetry = Mailbox::<NoopRawMutex, TelemetryPacket>::new();
        let mut monitor_a = FakeMonitor(Ok(READING_A));
        let mut monitor_b = FakeMonitor(Ok(READING_B));
        let mut display_a = FakeDisplay::default();
        let mut display_b = FakeDisplay::default();
        let mut log = FakeLog::default();
        let mut ui = UiLoop::new(
            &telemetry,
            [&mut monitor_a, &mut monitor_b],
            [&mut display_a, &mut display_b],
            &mut log,
        );

        let report = ui.cycle();
        assert!(!report.published);
        assert_eq!(report.packet.ms, 0);
        assert_eq!(report.packet.lanes[0].state, LaneState::Idle);
        assert_eq!(report.packet.lanes[0].power_reading(), READING_A);
        assert_eq!(report.packet.lanes[1].power_reading(), READING_B);
        assert_eq!(*ui.last(), TelemetryPacket::default());
        drop(ui);

        assert_eq!(display_a.frames.len(), 1);
        assert_eq!(display_a.frames[0].0, 0);
        assert_eq!(display_b.frames[0].0, 1);
        assert_eq!(log.packets.len(), 1);
    }

    #[test]
    fn follows_latest_and_reuses_stale() {
        let telemetry = Mailbox::<NoopRawMutex, TelemetryPacket>::new();
        let mut monitor_a = FakeMonitor(Ok(READING_A));
        let mut monitor_b = FakeMonitor(Ok(READING_B));
        let mut display_a = FakeDisplay::default();
        let mut display_b = FakeDisplay::default();
        let mut log = FakeLog::default();
        let mut ui = UiLoop::new(
            &telemetry,
            [&mut monitor_a, &mut monitor_b],
            [&mut display_a, &mut display_b],
            &mut log,
        );

        // the control loop runs faster than the UI, only the latest packet is seen
        telemetry.publish(running_packet(5, 1));
        telemetry.publish(running_packet(10, 2));
        let report = ui.cycle();
        assert!(report.published);
        assert_eq!(report.packet.ms, 10);
        assert_eq!(report.packet.lanes[0].laps, 2);

        // nothing new, same packet again
        let report = ui.cycle();
        assert_eq!(report.packet.ms, 10);
        assert_eq!(report.packet.lanes[1].power_reading(), READING_B);
        assert_eq!(ui.last().lanes[1].bus_voltage, 0.0);
        drop(ui);

        assert_eq!(log.packets.len(), 2);
        assert_eq!(log.packets[0], log.packets[1]);
        assert_eq!(display_a.frames.len(), 2);
    }

    #[test]
    fn missing_monitor_reads_zero() {
        let telemetry = Mailbox::<NoopRawMutex, TelemetryPacket>::new();
        let mut monitor_a = FakeMonitor(Err(PowerMonitorError::Absent));
        let mut monitor_b = FakeMonitor(Ok(READING_B));
        let mut display_a = FakeDisplay::default();
        let mut display_b = FakeDisplay::default();
        let mut log = FakeLog::default();
        let mut ui = UiLoop::new(
            &telemetry,
            [&mut monitor_a, &mut monitor_b],
            [&mut display_a, &mut display_b],
            &mut log,
        );

        telemetry.publish(running_packet(5, 1));
        let report = ui.cycle();
        assert_eq!(
            report.monitor_errors,
            [Some(PowerMonitorError::Absent), None]
        );
        assert_eq!(report.packet.lanes[0].power_reading(), PowerReading::default());
        assert_eq!(report.packet.lanes[0].laps, 1);
        assert_eq!(report.packet.lanes[1].power_reading(), READING_B);
        drop(ui);
        assert_eq!(display_a.frames[0].1.bus_voltage, 0.0);
        assert_eq!(display_a.frames[0].1.duty, 0.5);
    }
}
