use crate::{
    hal::{Actuator, InputSensor},
    lap_counter::LapCounter,
    telemetry::LaneTelemetry,
};

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LaneState {
    #[default]
    Idle,
    Running,
    /// The race is over. Terminal.
    Finished,
    /// Stopped by a safety trip. Terminal.
    Fault,
}

impl LaneState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Fault)
    }
}

/// A lane as seen by the control loop.
pub trait Lane {
    /// Leave idle and start driving.
    fn start(&mut self);
    /// Run one control step and return its snapshot.
    fn tick(&mut self) -> LaneTelemetry;
    /// End the race for this lane.
    fn stop(&mut self);
    /// Stop the lane because of a safety trip.
    fn declare_fault(&mut self);
    fn state(&self) -> LaneState;
    fn laps(&self) -> u32;
}

/// Proportional drive of one lane: the applied duty follows the input, capped at `max_duty`.
pub struct LaneController<'c, S, A> {
    sensor: S,
    actuator: A,
    laps: &'c LapCounter,
    max_duty: f32,
    state: LaneState,
}

impl<'c, S: InputSensor, A: Actuator> LaneController<'c, S, A> {
    /// Creates an idle lane. `max_duty` caps the duty and must be below 1.0.
    pub const fn new(sensor: S, actuator: A, laps: &'c LapCounter, max_duty: f32) -> Self {
        Self {
            sensor,
            actuator,
            laps,
            max_duty,
            state: LaneState::Idle,
        }
    }

    pub const fn max_duty(&self) -> f32 {
        self.max_duty
    }
}

impl<S: InputSensor, A: Actuator> Lane for LaneController<'_, S, A> {
    fn start(&mut self) {
        if self.state == LaneState::Idle {
            self.state = LaneState::Running;
        }
    }

    fn tick(&mut self) -> LaneTelemetry {
        let input = self.sensor.read_normalized();

        // zero duty was applied when entering the terminal state
        let duty = if self.state.is_terminal() {
            0.0
        } else {
            let duty = input.min(self.max_duty);
            self.actuator.set_duty(duty);
            duty
        };

        LaneTelemetry {
            input,
            duty,
            laps: self.laps.laps(),
            state: self.state,
            ..Default::default()
        }
    }

    fn stop(&mut self) {
        self.actuator.set_duty(0.0);
        if !self.state.is_terminal() {
            self.state = LaneState::Finished;
        }
    }

    fn declare_fault(&mut self) {
        self.actuator.set_duty(0.0);
        if !self.state.is_terminal() {
            self.state = LaneState::Fault;
        }
    }

    fn state(&self) -> LaneState {
        self.state
    }

    fn laps(&self) -> u32 {
        self.laps.laps()
    }
}
