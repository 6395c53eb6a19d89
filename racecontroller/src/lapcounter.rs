use az::WrappingAs;
use defmt::{error, info, trace};
use embassy_executor::task;
use embassy_rp::gpio::{AnyPin, Input, Pull};
use embassy_time::Instant;
use embedded_hal_async::digital::Wait;
use racecore::LapCounter;

/// Low 32 bits of the embassy tick counter, the time base of the lap counters.
pub fn now_ticks() -> u32 {
    Instant::now().as_ticks().wrapping_as::<u32>()
}

#[task(pool_size = 2)]
pub async fn lapcounter_task(sensor: AnyPin, lane: usize, laps: &'static LapCounter) {
    let pin = Input::new(sensor, Pull::None);
    lapcounter(pin, lane, laps).await;
}

async fn lapcounter(mut pin: impl Wait, lane: usize, laps: &LapCounter) {
    info!("lap sensor of lane {} armed", lane);
    loop {
        while pin.wait_for_rising_edge().await.is_err() {
            error!("couldn't wait for lap sensor edge of lane {}", lane);
        }
        let now = now_ticks();
        if laps.on_edge(now) {
            info!("lane {}: lap {}", lane, laps.laps());
        } else {
            trace!("lane {}: edge at {} rejected", lane, now);
        }
    }
}
