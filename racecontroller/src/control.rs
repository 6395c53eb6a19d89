use core::cell::RefCell;

use az::SaturatingAs;
use defmt::{info, warn};
use embassy_executor::task;
use embassy_rp::{
    adc::{self, Adc},
    clocks::clk_sys_freq,
    gpio::Pin,
    peripherals::{ADC, PIN_16, PIN_18, PIN_26, PIN_27, PWM_CH0, PWM_CH1},
    pwm::{self, Channel, Pwm},
};
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_time::{Duration, Instant, Ticker};
use fixed::types::U12F4;
use racecore::{
    Actuator, ControlLoop, InputSensor, LaneController, LapCounter, RaceConfig, TelemetryPacket,
    LANES,
};
use sync::mailbox::Mailbox;

const ADC_MAX: u16 = 0x0fff;

/// Potentiometer of a lane on one of the ADC inputs. The ADC is shared between the lanes.
struct AdcInput<'a, 'd, P> {
    adc: &'a RefCell<Adc<'d>>,
    pin: P,
}

impl<'d, P> InputSensor for AdcInput<'_, 'd, P>
where
    P: embedded_hal::adc::Channel<Adc<'d>, ID = u8> + Pin,
{
    fn read_normalized(&mut self) -> f32 {
        let raw = self.adc.borrow_mut().blocking_read(&mut self.pin);
        (f32::from(raw) / f32::from(ADC_MAX)).clamp(0.0, 1.0)
    }
}

/// Drive stage of a lane on output A of a PWM slice.
struct PwmOutput<'d, C: Channel> {
    pwm: Pwm<'d, C>,
    config: pwm::Config,
}

impl<'d, C: Channel> PwmOutput<'d, C> {
    fn new(mut pwm: Pwm<'d, C>, frequency: u32) -> Self {
        let config = pwm_config(clk_sys_freq(), frequency);
        pwm.set_config(&config);
        Self { pwm, config }
    }
}

impl<C: Channel> Actuator for PwmOutput<'_, C> {
    fn set_duty(&mut self, duty: f32) {
        let compare = (duty.clamp(0.0, 1.0) * f32::from(self.config.top)).saturating_as::<u16>();
        if compare != self.config.compare_a {
            self.config.compare_a = compare;
            self.pwm.set_config(&self.config);
        }
    }
}

/// Slice config for `frequency` with the smallest integer divider that keeps `top` in range.
fn pwm_config(system_frequency: u32, frequency: u32) -> pwm::Config {
    let cycles = system_frequency / frequency.max(1);
    let divider = (cycles / (u32::from(u16::MAX) + 1) + 1).clamp(1, 255);
    let mut config = pwm::Config::default();
    config.divider = U12F4::from_num(divider);
    config.top = (cycles / divider).saturating_sub(1).saturating_as::<u16>();
    config.compare_a = 0;
    config
}

#[task]
#[allow(clippy::too_many_arguments)]
pub async fn control_task(
    adc: ADC,
    input_a: PIN_26,
    input_b: PIN_27,
    pwm_a: PWM_CH0,
    output_a: PIN_16,
    pwm_b: PWM_CH1,
    output_b: PIN_18,
    config: RaceConfig,
    laps: &'static [LapCounter; LANES],
    telemetry: &'static Mailbox<CriticalSectionRawMutex, TelemetryPacket>,
) {
    let adc = RefCell::new(Adc::new(adc, crate::Irqs, adc::Config::default()));
    let pwm_a = Pwm::new_output_a(pwm_a, output_a, pwm::Config::default());
    let pwm_b = Pwm::new_output_a(pwm_b, output_b, pwm::Config::default());

    let mut lane_a = LaneController::new(
        AdcInput {
            adc: &adc,
            pin: input_a,
        },
        PwmOutput::new(pwm_a, config.pwm_frequency_hz),
        &laps[0],
        config.max_duty,
    );
    let mut lane_b = LaneController::new(
        AdcInput {
            adc: &adc,
            pin: input_b,
        },
        PwmOutput::new(pwm_b, config.pwm_frequency_hz),
        &laps[1],
        config.max_duty,
    );
    let control = ControlLoop::new([&mut lane_a, &mut lane_b], telemetry, config.target_laps);

    control_loop(control, &config).await;
}

async fn control_loop(mut control: ControlLoop<'_, impl RawMutex>, config: &RaceConfig) {
    info!(
        "starting control loop at {}Hz, race to {} laps",
        config.control_hz,
        control.target_laps()
    );
    control.start();

    let mut ticker = Ticker::every(Duration::from_micros(config.control_period_us()));
    let mut overruns = 0u32;
    loop {
        let started = Instant::now();
        if let Some(outcome) = control.cycle(started.as_millis()) {
            info!(
                "race finished after {}ms: lane {} won with {} laps",
                outcome.ms, outcome.winner, outcome.laps
            );
        }
        if started.elapsed().as_micros() > config.control_period_us() {
            overruns = overruns.wrapping_add(1);
            warn!("control cycle overrun ({} total)", overruns);
        }
        ticker.next().await;
    }
}

