use defmt::info;
use embassy_executor::task;
use embassy_rp::{peripherals::WATCHDOG, watchdog::Watchdog};
use embassy_time::{Duration, Ticker};

const TIMEOUT: Duration = Duration::from_millis(750);
const FEED_PERIOD: Duration = Duration::from_millis(500);

#[task]
pub async fn watchdog_task(watchdog: WATCHDOG) {
    let mut watchdog = Watchdog::new(watchdog);
    info!("starting watchdog");
    watchdog.start(TIMEOUT);

    let mut ticker = Ticker::every(FEED_PERIOD);
    loop {
        ticker.next().await;
        watchdog.feed();
    }
}
