//! Debounced lap counter fed by the lap sensor edge interrupt.
//!
//! Timestamps are the low 32 bits of a free running tick counter. All elapsed time calculations
//! use wrapping subtraction, so the counter overflowing between two edges is harmless. With the
//! 1MHz RP2040 timer the 32 bit counter wraps every ~71.6 minutes; two edges further apart than
//! that alias to a shorter interval, which is far beyond any lap time.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Convert a debounce interval in microseconds to ticks of a counter running at `tick_hz`.
///
/// Saturates at `u32::MAX`.
#[must_use]
pub const fn debounce_ticks(debounce_us: u32, tick_hz: u64) -> u32 {
    let ticks = debounce_us as u64 * tick_hz / 1_000_000;
    if ticks > u32::MAX as u64 {
        u32::MAX
    } else {
        ticks as u32
    }
}

/// Lap count written from interrupt context and read from tasks.
///
/// `on_edge` is the only writer while the counter is armed. The RP2040 has no atomic read modify
/// write instructions, so the state only uses plain atomic loads and stores and relies on that
/// single writer. `arm` and `reset` must not run concurrently with `on_edge` of the same counter.
pub struct LapCounter {
    laps: AtomicU32,
    last_accepted: AtomicU32,
    threshold: AtomicU32,
    armed: AtomicBool,
}

impl LapCounter {
    pub const fn new() -> Self {
        Self {
            laps: AtomicU32::new(0),
            last_accepted: AtomicU32::new(0),
            threshold: AtomicU32::new(0),
            armed: AtomicBool::new(false),
        }
    }

    /// Start counting.
    ///
    /// Resets the lap count, takes `now` as the reference for the first debounce window and
    /// precomputes the debounce threshold in ticks.
    pub fn arm(&self, now: u32, debounce_us: u32, tick_hz: u64) {
        self.armed.store(false, Ordering::Release);
        self.laps.store(0, Ordering::Relaxed);
        self.last_accepted.store(now, Ordering::Relaxed);
        self.threshold
            .store(debounce_ticks(debounce_us, tick_hz), Ordering::Relaxed);
        self.armed.store(true, Ordering::Release);
    }

    /// Handle a rising edge of the lap sensor seen at tick `now`.
    ///
    /// Returns `true` if the edge was counted as a lap. Edges closer than the debounce threshold
    /// to the last accepted edge and edges before `arm` are dropped.
    pub fn on_edge(&self, now: u32) -> bool {
        if !self.armed.load(Ordering::Acquire) {
            return false;
        }
        let last = self.last_accepted.load(Ordering::Relaxed);
        if now.wrapping_sub(last) < self.threshold.load(Ordering::Relaxed) {
            return false;
        }
        self.last_accepted.store(now, Ordering::Relaxed);
        let laps = self.laps.load(Ordering::Relaxed);
        self.laps.store(laps.saturating_add(1), Ordering::Release);
        true
    }

    /// Number of accepted laps since arming.
    pub fn laps(&self) -> u32 {
        self.laps.load(Ordering::Acquire)
    }

    /// Threshold in ticks between two accepted edges.
    pub fn threshold(&self) -> u32 {
        self.threshold.load(Ordering::Relaxed)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Zero the lap count. Only meant for restarting a race.
    pub fn reset(&self) {
        self.laps.store(0, Ordering::Release);
    }
}

impl Default for LapCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{debounce_ticks, LapCounter};

    const MHZ: u64 = 1_000_000;

    #[test]
    fn threshold_conversion() {
        assert_eq!(debounce_ticks(3_000, MHZ), 3_000);
        assert_eq!(debounce_ticks(3_000, 125_000_000), 375_000);
        assert_eq!(debounce_ticks(1, 32_768), 0);
        assert_eq!(debounce_ticks(u32::MAX, 125_000_000), u32::MAX);
    }

    #[test]
    fn ignores_edges_before_arm() {
        let counter = LapCounter::new();
        assert!(!counter.on_edge(10_000));
        assert_eq!(counter.laps(), 0);
        counter.arm(0, 1_000, MHZ);
        assert!(counter.is_armed());
        assert_eq!(counter.threshold(), 1_000);
    }

    #[test]
    fn debounce() {
        let counter = LapCounter::new();
        counter.arm(0, 1_000, MHZ);
        let edges = [0, 500, 1_100, 1_200, 2_099, 2_100, 5_000];
        let accepted: Vec<bool> = edges.iter().map(|t| counter.on_edge(*t)).collect();
        assert_eq!(
            accepted,
            [false, false, true, false, false, true, true],
            "edges are measured against the last accepted edge"
        );
        assert_eq!(counter.laps(), 3);
    }

    #[test]
    fn counts_spaced_edges() {
        let counter = LapCounter::new();
        counter.arm(100, 3_000, MHZ);
        for lap in 1..=20u32 {
            assert!(counter.on_edge(100 + lap * 3_000));
            // contact bounce right after the edge
            assert!(!counter.on_edge(100 + lap * 3_000 + 5));
            assert!(!counter.on_edge(100 + lap * 3_000 + 2_999));
            assert_eq!(counter.laps(), lap);
        }
    }

    #[test]
    fn wraparound() {
        let counter = LapCounter::new();
        counter.arm(u32::MAX - 5_000, 1_000, MHZ);
        let last = u32::MAX - 300;
        assert!(counter.on_edge(last));
        // 500 ticks after the last edge, across the wrap
        let bounce = last.wrapping_add(500);
        assert!(bounce < last);
        assert!(!counter.on_edge(bounce));
        // 1_500 ticks after the last edge, across the wrap
        assert!(counter.on_edge(last.wrapping_add(1_500)));
        assert_eq!(counter.laps(), 2);
    }

    #[test]
    fn reset_and_rearm() {
        let counter = LapCounter::new();
        counter.arm(0, 1_000, MHZ);
        counter.on_edge(1_000);
        counter.on_edge(2_000);
        assert_eq!(counter.laps(), 2);
        counter.reset();
        assert_eq!(counter.laps(), 0);
        // debounce window still measured from the last accepted edge
        assert!(!counter.on_edge(2_500));
        assert!(counter.on_edge(3_000));
        counter.arm(10_000, 1_000, MHZ);
        assert_eq!(counter.laps(), 0);
        assert!(!counter.on_edge(10_999));
        assert!(counter.on_edge(11_000));
    }

    #[test]
    fn zero_debounce_accepts_every_edge() {
        let counter = LapCounter::new();
        counter.arm(0, 0, MHZ);
        for t in [0, 0, 1, 1] {
            assert!(counter.on_edge(t));
        }
        assert_eq!(counter.laps(), 4);
    }
}
