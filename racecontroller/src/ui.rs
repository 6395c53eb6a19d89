use core::{cell::RefCell, fmt::Write as _};

use defmt::{debug, info, warn};
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_executor::task;
use embassy_rp::{
    i2c::{self, I2c},
    peripherals::{I2C0, I2C1, PIN_0, PIN_1, PIN_2, PIN_3, PIN_4, PIN_5, UART0},
    uart::{self, Blocking, Uart},
};
use embassy_sync::blocking_mutex::{
    raw::{CriticalSectionRawMutex, NoopRawMutex, RawMutex},
    Mutex,
};
use embassy_time::{Duration, Ticker};
use embedded_graphics::{
    mono_font::{ascii::FONT_6X9, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use heapless::String;
use ina219::{Calibration, Ina219};
use racecore::{
    LaneDisplay, LaneTelemetry, PowerMonitor, PowerMonitorError, PowerReading, RaceConfig,
    TelemetryLog, TelemetryPacket, UiLoop, LANES,
};
use ssd1306::{mode::BufferedGraphicsMode, prelude::*, I2CDisplayInterface, Ssd1306};
use sync::mailbox::Mailbox;

/// INA219 of a lane. Stays absent if it did not answer during startup.
struct PowerSense<I>(Option<Ina219<I>>);

impl<I: ina219::I2c> PowerSense<I> {
    fn new(i2c: I, address: u8, lane: usize) -> Self {
        match Ina219::new(i2c, address, Calibration::default()) {
            Ok(ina) => {
                info!("power monitor of lane {} ready", lane);
                Self(Some(ina))
            }
            Err(_) => {
                warn!("power monitor of lane {} not found", lane);
                Self(None)
            }
        }
    }
}

impl<I: ina219::I2c> PowerMonitor for PowerSense<I> {
    fn read(&mut self) -> Result<PowerReading, PowerMonitorError> {
        let ina = self.0.as_mut().ok_or(PowerMonitorError::Absent)?;
        read_power(ina).map_err(|_| PowerMonitorError::Bus)
    }
}

fn read_power<I: ina219::I2c>(ina: &mut Ina219<I>) -> ina219::Result<PowerReading, I> {
    Ok(PowerReading {
        bus_voltage: ina.bus_voltage()?,
        current: ina.current()?,
        power: ina.power()?,
    })
}

type OledDisplay<I> =
    Ssd1306<I2CInterface<I>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// 128x64 OLED of a lane.
struct Oled<I>(Option<OledDisplay<I>>);

impl<I: embedded_hal::blocking::i2c::Write> Oled<I> {
    fn new(i2c: I, address: u8, lane: usize) -> Self {
        let interface = I2CDisplayInterface::new_custom_address(i2c, address);
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        if display.init().is_err() {
            warn!("display of lane {} not found", lane);
            return Self(None);
        }
        info!("display of lane {} ready", lane);
        Self(Some(display))
    }
}

impl<I: embedded_hal::blocking::i2c::Write> LaneDisplay for Oled<I> {
    fn render_lane(&mut self, lane: usize, telemetry: &LaneTelemetry) {
        const LINE_HEIGHT: i32 = 9;

        let Some(display) = self.0.as_mut() else {
            return;
        };
        let style = MonoTextStyle::new(&FONT_6X9, BinaryColor::On);
        let mut lines: [String<24>; 7] = Default::default();
        // formatting only fails if a line overflows, which cuts it short
        write!(lines[0], "Lane {} {:?}", lane, telemetry.state).ok();
        write!(lines[1], "Duty: {:.3}", telemetry.duty).ok();
        write!(lines[2], "ADC : {:.3}", telemetry.input).ok();
        write!(lines[3], "Laps: {}", telemetry.laps).ok();
        write!(lines[4], "Vbus: {:.2} V", telemetry.bus_voltage).ok();
        write!(lines[5], "I   : {:.1} mA", telemetry.current).ok();
        write!(lines[6], "P   : {:.1} mW", telemetry.power).ok();

        DrawTarget::clear(display, BinaryColor::Off).ok();
        for (y, line) in (0..).step_by(LINE_HEIGHT as usize).zip(lines.iter()) {
            Text::with_baseline(line, Point::new(0, y), style, Baseline::Top)
                .draw(display)
                .ok();
        }
        if display.flush().is_err() {
            debug!("display of lane {} did not take the frame", lane);
        }
    }
}

/// Text telemetry on the UART plus a defmt log line.
struct SerialLog<'d> {
    uart: Uart<'d, UART0, Blocking>,
}

impl TelemetryLog for SerialLog<'_> {
    fn log(&mut self, packet: &TelemetryPacket) {
        let [a, b] = &packet.lanes;
        info!("{}", packet);

        let mut line = String::<64>::new();
        if writeln!(
            line,
            "A laps={} duty={:.3} | B laps={} duty={:.3}\r",
            a.laps, a.duty, b.laps, b.duty
        )
        .is_err()
        {
            return;
        }
        if self.uart.blocking_write(line.as_bytes()).is_err() {
            debug!("uart write failed");
        }
    }
}

#[task]
#[allow(clippy::too_many_arguments)]
pub async fn ui_task(
    i2c_a: I2C0,
    sda_a: PIN_4,
    scl_a: PIN_5,
    i2c_b: I2C1,
    sda_b: PIN_2,
    scl_b: PIN_3,
    uart: UART0,
    tx: PIN_0,
    rx: PIN_1,
    config: RaceConfig,
    telemetry: &'static Mailbox<CriticalSectionRawMutex, TelemetryPacket>,
) {
    info!("Setting up UI I2C");
    let i2c_config = || {
        let mut i2c_config = i2c::Config::default();
        i2c_config.frequency = config.i2c_frequency_hz;
        i2c_config
    };
    let bus_a = Mutex::<NoopRawMutex, _>::new(RefCell::new(I2c::new_blocking(
        i2c_a,
        scl_a,
        sda_a,
        i2c_config(),
    )));
    let bus_b = Mutex::<NoopRawMutex, _>::new(RefCell::new(I2c::new_blocking(
        i2c_b,
        scl_b,
        sda_b,
        i2c_config(),
    )));

    let mut monitor_a = PowerSense::new(I2cDevice::new(&bus_a), config.power_monitor_address, 0);
    let mut monitor_b = PowerSense::new(I2cDevice::new(&bus_b), config.power_monitor_address, 1);
    let mut display_a = Oled::new(I2cDevice::new(&bus_a), config.display_address, 0);
    let mut display_b = Oled::new(I2cDevice::new(&bus_b), config.display_address, 1);
    let mut log = SerialLog {
        uart: Uart::new_blocking(uart, tx, rx, uart::Config::default()),
    };

    let ui = UiLoop::new(
        telemetry,
        [&mut monitor_a, &mut monitor_b],
        [&mut display_a, &mut display_b],
        &mut log,
    );
    ui_loop(ui, &config).await;
}

async fn ui_loop(mut ui: UiLoop<'_, impl RawMutex>, config: &RaceConfig) {
    info!("starting ui loop at {}Hz", config.ui_hz);
    let mut ticker = Ticker::every(Duration::from_micros(config.ui_period_us()));
    let mut last_errors = [None; LANES];
    let mut waiting = true;
    loop {
        let report = ui.cycle();
        if waiting && report.published {
            info!("receiving telemetry");
            waiting = false;
        }
        for (lane, (error, last)) in report
            .monitor_errors
            .iter()
            .zip(last_errors.iter_mut())
            .enumerate()
        {
            // only report changes, an absent monitor stays absent
            if *error != *last {
                if let Some(error) = error {
                    warn!("power monitor of lane {}: {}", lane, error);
                }
                *last = *error;
            }
        }
        ticker.next().await;
    }
}
