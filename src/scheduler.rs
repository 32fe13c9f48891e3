//! Fixed-cadence sampling scheduler with drift compensation.
//!
//! Each tick measures how late it started relative to the target period
//! (slippage) and shortens the end-of-tick sleep by the tick's own work
//! time minus that slippage. Slippage is scoped to a single tick — it is
//! never accumulated across ticks. The time source is monotonic
//! (`std::time::Instant`); a wall clock that can step backwards would
//! corrupt slippage.

use std::time::{Duration, Instant};

/// Default target sampling period.
pub const DEFAULT_PERIOD: Duration = Duration::from_micros(2000);

/// Floor on the end-of-tick sleep so the loop always yields.
pub const MIN_SLEEP: Duration = Duration::from_micros(100);

/// Drives the sampling loop at a fixed target period.
pub struct SampleScheduler {
    period: Duration,
    last_tick: Option<Instant>,
}

impl SampleScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_tick: None,
        }
    }

    /// The target period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start a tick at `now`. Returns this tick's slippage: how much the
    /// gap since the previous tick overran the target period.
    pub fn begin_tick(&mut self, now: Instant) -> Duration {
        let slippage = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).saturating_sub(self.period),
            None => Duration::ZERO,
        };
        self.last_tick = Some(now);
        slippage
    }

    /// Sleep needed at the end of a tick whose work took `busy`, credited
    /// with the slippage measured at its start. Always within
    /// `[MIN_SLEEP, period]`.
    pub fn sleep_after(&self, busy: Duration, slippage: Duration) -> Duration {
        // saturating_sub already caps the result at the full period.
        let effective = busy.saturating_sub(slippage);
        self.period.saturating_sub(effective).max(MIN_SLEEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_micros(2000);

    #[test]
    fn test_first_tick_has_no_slippage() {
        let mut scheduler = SampleScheduler::new(PERIOD);
        assert_eq!(scheduler.begin_tick(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_on_time_tick_has_no_slippage() {
        let mut scheduler = SampleScheduler::new(PERIOD);
        let base = Instant::now();
        scheduler.begin_tick(base);
        assert_eq!(scheduler.begin_tick(base + PERIOD), Duration::ZERO);
    }

    #[test]
    fn test_late_tick_reports_overrun_only() {
        let mut scheduler = SampleScheduler::new(PERIOD);
        let base = Instant::now();
        scheduler.begin_tick(base);
        let slippage = scheduler.begin_tick(base + PERIOD + Duration::from_micros(700));
        assert_eq!(slippage, Duration::from_micros(700));
    }

    #[test]
    fn test_sleep_stays_within_bounds() {
        let scheduler = SampleScheduler::new(PERIOD);
        let cases = [
            (Duration::ZERO, Duration::ZERO),
            (Duration::from_micros(500), Duration::ZERO),
            (Duration::from_micros(1999), Duration::ZERO),
            (Duration::from_micros(2500), Duration::ZERO),
            (Duration::from_micros(9000), Duration::ZERO),
            (Duration::from_micros(500), Duration::from_micros(1200)),
            (Duration::from_micros(100), Duration::from_micros(5000)),
        ];
        for (busy, slippage) in cases {
            let sleep = scheduler.sleep_after(busy, slippage);
            assert!(sleep >= MIN_SLEEP, "sleep below floor for busy={busy:?}");
            assert!(sleep <= PERIOD, "sleep above period for busy={busy:?}");
        }
    }

    #[test]
    fn test_sleep_compensates_work_time() {
        let scheduler = SampleScheduler::new(PERIOD);
        let sleep = scheduler.sleep_after(Duration::from_micros(600), Duration::ZERO);
        assert_eq!(sleep, Duration::from_micros(1400));
    }

    #[test]
    fn test_overrun_clamps_to_min_sleep() {
        let scheduler = SampleScheduler::new(PERIOD);
        let sleep = scheduler.sleep_after(Duration::from_micros(3000), Duration::ZERO);
        assert_eq!(sleep, MIN_SLEEP);
    }

    #[test]
    fn test_mean_period_converges_under_jitter() {
        // Simulated clock: each tick works a jittered sub-period amount,
        // then sleeps what the scheduler asks for.
        let mut scheduler = SampleScheduler::new(PERIOD);
        let jitter_us = [300u64, 1100, 200, 1700, 900, 50, 1400, 600];

        let base = Instant::now();
        let mut now = base;
        let ticks = 4000;
        for i in 0..ticks {
            let slippage = scheduler.begin_tick(now);
            let busy = Duration::from_micros(jitter_us[i % jitter_us.len()]);
            let sleep = scheduler.sleep_after(busy, slippage);
            assert!(sleep >= MIN_SLEEP && sleep <= PERIOD);
            now += busy + sleep;
        }

        let mean = now.duration_since(base).as_secs_f64() / ticks as f64;
        let target = PERIOD.as_secs_f64();
        assert!(
            (mean - target).abs() < target * 0.01,
            "mean period {mean} drifted from target {target}"
        );
    }
}
