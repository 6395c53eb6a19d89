#![no_std]
#![no_main]
#![feature(type_alias_impl_trait)]
#![allow(clippy::future_not_send)]

mod configprovider;
mod control;
mod lapcounter;
mod ui;
mod watchdog;

use cortex_m_rt::entry;
use defmt::info;
use defmt_rtt as _;
use embassy_executor::{Executor, InterruptExecutor};
use embassy_rp::{
    adc, bind_interrupts,
    gpio::Pin,
    interrupt::{self, Handler},
    multicore::{spawn_core1, Stack},
    pac::Interrupt,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::TICK_HZ;
use panic_probe as _;
use racecore::{LapCounter, TelemetryPacket, LANES};
use static_cell::StaticCell;
use sync::mailbox::Mailbox;

use crate::{
    configprovider::load_config,
    control::control_task,
    lapcounter::{lapcounter_task, now_ticks},
    ui::ui_task,
    watchdog::watchdog_task,
};

bind_interrupts!(struct Irqs {
    ADC_IRQ_FIFO => adc::InterruptHandler;
    SWI_IRQ_0 => ExecutorInterruptHandler;
});

/// Free all spinlocks, regardless of their current status
///
/// RP2040 does not release all spinlocks on reset.
/// The C SDK clears these all during entry, and so do we if you call `hal::entry!`
/// But if someone is using the default cortex-m entry they risk hitting deadlocks so provide *something* to help out
///
/// # Safety
/// Where possible, you should use the `hal::entry` macro attribute on main instead of this.
/// You should call this as soon as possible after reset - preferably as the first entry in fn main(), before *ANY* use of spinlocks, atomics, or `critical_section`
pub unsafe fn spinlock_reset() {
    // Using raw pointers to avoid taking peripherals accidently at startup
    const SIO_BASE: u32 = 0xd000_0000;
    const SPINLOCK0_PTR: *mut u32 = (SIO_BASE + 0x100) as *mut u32;
    const SPINLOCK_COUNT: usize = 32;
    for i in 0..SPINLOCK_COUNT {
        SPINLOCK0_PTR.wrapping_add(i).write_volatile(1);
    }
}

// Multicore
static mut CORE1_STACK: Stack<{ 1024 * 8 }> = Stack::new();

static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

struct ExecutorInterruptHandler;

impl<I: interrupt::Interrupt> Handler<I> for ExecutorInterruptHandler {
    unsafe fn on_interrupt() {
        EXECUTOR_HIGH.on_interrupt();
    }
}

#[entry]
fn main() -> ! {
    // Executors
    static EXECUTOR_CORE1: StaticCell<Executor> = StaticCell::new();
    static EXECUTOR_LOW: StaticCell<Executor> = StaticCell::new();

    static TELEMETRY: Mailbox<CriticalSectionRawMutex, TelemetryPacket> = Mailbox::new();
    static LAPS: [LapCounter; LANES] = [LapCounter::new(), LapCounter::new()];

    // # Safety
    // Nothing uses spinlocks yet.
    unsafe { spinlock_reset() }
    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // flash access has to happen while only this core runs
    let config = load_config(p.FLASH);
    info!("{}", config);

    let now = now_ticks();
    for laps in &LAPS {
        laps.arm(now, config.debounce_us, TICK_HZ);
    }

    let spawner = EXECUTOR_HIGH.start(Interrupt::SWI_IRQ_0);
    spawner.must_spawn(lapcounter_task(p.PIN_14.degrade(), 0, &LAPS[0]));
    spawner.must_spawn(lapcounter_task(p.PIN_15.degrade(), 1, &LAPS[1]));

    spawn_core1(p.CORE1, unsafe { &mut CORE1_STACK }, move || {
        let executor = EXECUTOR_CORE1.init(Executor::new());
        executor.run(|spawner| {
            spawner.must_spawn(control_task(
                p.ADC, p.PIN_26, p.PIN_27, p.PWM_CH0, p.PIN_16, p.PWM_CH1, p.PIN_18, config,
                &LAPS, &TELEMETRY,
            ));
        })
    });

    let executor = EXECUTOR_LOW.init(Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(watchdog_task(p.WATCHDOG));
        spawner.must_spawn(ui_task(
            p.I2C0, p.PIN_4, p.PIN_5, p.I2C1, p.PIN_2, p.PIN_3, p.UART0, p.PIN_0, p.PIN_1, config,
            &TELEMETRY,
        ));
    });
}
