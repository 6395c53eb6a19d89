use embassy_sync::blocking_mutex::raw::RawMutex;
use sync::mailbox::Mailbox;

use crate::{lane::Lane, telemetry::TelemetryPacket, LANES};

/// How the race ended.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RaceOutcome {
    /// lowest lane index that reached the target on the finishing cycle
    pub winner: usize,
    /// laps of the winner when the race was stopped
    pub laps: u32,
    /// timestamp of the finishing cycle
    pub ms: u64,
}

/// Fixed rate control step for all lanes.
///
/// Every cycle ticks the lanes in index order, checks whether the race is over and publishes the
/// snapshot. The race is over as soon as any lane reached the target lap count; then every lane is
/// stopped, the lanes that did not reach the target included. Once finished the condition is never
/// evaluated again.
pub struct ControlLoop<'a, M: RawMutex> {
    lanes: [&'a mut dyn Lane; LANES],
    telemetry: &'a Mailbox<M, TelemetryPacket>,
    target_laps: u32,
    outcome: Option<RaceOutcome>,
    last_ms: u64,
}

impl<'a, M: RawMutex> ControlLoop<'a, M> {
    pub fn new(
        lanes: [&'a mut dyn Lane; LANES],
        telemetry: &'a Mailbox<M, TelemetryPacket>,
        target_laps: u32,
    ) -> Self {
        Self {
            lanes,
            telemetry,
            target_laps,
            outcome: None,
            last_ms: 0,
        }
    }

    /// Move all idle lanes to running.
    pub fn start(&mut self) {
        for lane in &mut self.lanes {
            lane.start();
        }
    }

    /// Run one control cycle at `now_ms`.
    ///
    /// Returns the outcome on the cycle that ends the race. The packet published on that cycle
    /// still holds the values from before the lanes were stopped.
    pub fn cycle(&mut self, now_ms: u64) -> Option<RaceOutcome> {
        // keep the published timestamps monotonic
        let ms = now_ms.max(self.last_ms);
        self.last_ms = ms;

        let mut packet = TelemetryPacket {
            ms,
            ..Default::default()
        };
        for (telemetry, lane) in packet.lanes.iter_mut().zip(self.lanes.iter_mut()) {
            *telemetry = lane.tick();
        }

        let mut finished = None;
        if self.outcome.is_none() {
            if let Some((winner, telemetry)) = packet
                .lanes
                .iter()
                .enumerate()
                .find(|(_, telemetry)| telemetry.laps >= self.target_laps)
            {
                let outcome = RaceOutcome {
                    winner,
                    laps: telemetry.laps,
                    ms,
                };
                self.outcome = Some(outcome);
                for lane in &mut self.lanes {
                    lane.stop();
                }
                finished = Some(outcome);
            }
        }

        self.telemetry.publish(packet);
        finished
    }

    /// Trip the safety stop of a lane. Returns `false` for an unknown lane.
    pub fn declare_fault(&mut self, lane: usize) -> bool {
        self.lanes.get_mut(lane).map_or(false, |lane| {
            lane.declare_fault();
            true
        })
    }

    pub fn finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub const fn outcome(&self) -> Option<RaceOutcome> {
        self.outcome
    }

    pub const fn target_laps(&self) -> u32 {
        self.target_laps
    }
}
