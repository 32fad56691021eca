//! Deterministic tick pacing.
//!
//! Runs the controller tick at a fixed rate and keeps O(1) timing
//! statistics. Three pacing modes:
//!
//! - `RealTime` with the `rt` feature: absolute-time `clock_nanosleep` on
//!   `CLOCK_MONOTONIC`, drift-free.
//! - `RealTime` without the feature: `std::thread::sleep` for the remainder
//!   of each cycle.
//! - `FreeRunning`: no sleeping, the nominal period is still passed to the
//!   tick. Used by simulation to run faster than wall clock.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` to the configured core.
//! 4. `sched_setscheduler(SCHED_FIFO, priority)`.

use std::sync::atomic::{AtomicBool, Ordering};

use foc_common::consts::DEFAULT_TICK_RATE_HZ;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ─── Configuration ──────────────────────────────────────────────────

/// How the runner waits between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Back-to-back ticks.
    FreeRunning,
    /// One tick per period of wall-clock time.
    #[default]
    RealTime,
}

/// `[cycle]` table of the binary's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Tick rate [Hz].
    pub rate_hz: f64,
    pub pacing: Pacing,
    /// CPU core to pin the cycle thread to (`rt` feature only).
    pub cpu_core: usize,
    /// SCHED_FIFO priority (`rt` feature only).
    pub rt_priority: i32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            rate_hz: f64::from(DEFAULT_TICK_RATE_HZ),
            pacing: Pacing::RealTime,
            cpu_core: 1,
            rt_priority: 80,
        }
    }
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Running sum of squares for stddev computation.
    pub sum_sq_cycle_ns: i128,
    /// Cycles that took longer than the period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns] (time between expected and actual wake).
    pub max_latency_ns: i64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            sum_sq_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
        self.sum_sq_cycle_ns += (duration_ns as i128) * (duration_ns as i128);
        if latency_ns > self.max_latency_ns {
            self.max_latency_ns = latency_ns;
        }
    }

    /// Average cycle time [ns] (returns 0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }

    /// Population standard deviation of the cycle time [ns].
    pub fn stddev_cycle_ns(&self) -> f64 {
        if self.cycle_count == 0 {
            return 0.0;
        }
        let n = self.cycle_count as f64;
        let mean = self.sum_cycle_ns as f64 / n;
        let var = self.sum_sq_cycle_ns as f64 / n - mean * mean;
        var.max(0.0).sqrt()
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum CycleError {
    /// RT system call failed.
    RtSetup(String),
    /// Tick rate is not a positive finite number.
    InvalidRate(f64),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RtSetup(msg) => write!(f, "RT setup error: {msg}"),
            Self::InvalidRate(hz) => write!(f, "invalid cycle rate: {hz} Hz"),
        }
    }
}

impl std::error::Error for CycleError {}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 1 MB of stack so the tick never takes a page fault on it.
fn prefault_stack() {
    let mut buf = [0u8; 1024 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Prepare the calling thread for the cycle loop.
///
/// Without the `rt` feature only the stack prefault does anything.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Fixed-rate driver for a tick closure.
#[derive(Debug)]
pub struct CycleRunner {
    cycle_time_ns: i64,
    pacing: Pacing,
    stats: CycleStats,
}

impl CycleRunner {
    pub fn new(rate_hz: f64, pacing: Pacing) -> Result<Self, CycleError> {
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return Err(CycleError::InvalidRate(rate_hz));
        }
        let cycle_time_ns = (1e9 / rate_hz).round() as i64;
        if cycle_time_ns <= 0 {
            return Err(CycleError::InvalidRate(rate_hz));
        }
        Ok(Self {
            cycle_time_ns,
            pacing,
            stats: CycleStats::new(),
        })
    }

    pub fn from_config(config: &CycleConfig) -> Result<Self, CycleError> {
        Self::new(config.rate_hz, config.pacing)
    }

    /// Nominal period passed to every tick [s].
    #[inline]
    pub fn period(&self) -> f64 {
        self.cycle_time_ns as f64 * 1e-9
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Call `tick(period)` once per cycle until `running` is cleared.
    ///
    /// Overruns are counted, never fatal.
    pub fn run<F: FnMut(f64)>(
        &mut self,
        running: &AtomicBool,
        mut tick: F,
    ) -> Result<CycleStats, CycleError> {
        info!(
            period_ns = self.cycle_time_ns,
            pacing = ?self.pacing,
            "cycle loop starting"
        );
        match self.pacing {
            Pacing::FreeRunning => self.run_free(running, &mut tick),
            #[cfg(feature = "rt")]
            Pacing::RealTime => self.run_rt_loop(running, &mut tick)?,
            #[cfg(not(feature = "rt"))]
            Pacing::RealTime => self.run_sleep_loop(running, &mut tick),
        }
        if self.stats.overruns > 0 {
            warn!(
                overruns = self.stats.overruns,
                max_cycle_ns = self.stats.max_cycle_ns,
                "cycle overruns detected"
            );
        }
        info!(
            cycles = self.stats.cycle_count,
            avg_cycle_ns = self.stats.avg_cycle_ns(),
            "cycle loop stopped"
        );
        Ok(self.stats.clone())
    }

    fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.stats.record(duration_ns, latency_ns);
        if duration_ns > self.cycle_time_ns {
            self.stats.overruns += 1;
        }
    }

    fn run_free<F: FnMut(f64)>(&mut self, running: &AtomicBool, tick: &mut F) {
        use std::time::Instant;

        let dt = self.period();
        while running.load(Ordering::Acquire) {
            let start = Instant::now();
            tick(dt);
            self.record(start.elapsed().as_nanos() as i64, 0);
        }
    }

    #[cfg(not(feature = "rt"))]
    fn run_sleep_loop<F: FnMut(f64)>(&mut self, running: &AtomicBool, tick: &mut F) {
        use std::time::{Duration, Instant};

        let dt = self.period();
        let cycle_duration = Duration::from_nanos(self.cycle_time_ns as u64);
        while running.load(Ordering::Acquire) {
            let start = Instant::now();
            tick(dt);
            let elapsed = start.elapsed();
            self.record(elapsed.as_nanos() as i64, 0);
            if let Some(remaining) = cycle_duration.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
    }

    #[cfg(feature = "rt")]
    fn run_rt_loop<F: FnMut(f64)>(
        &mut self,
        running: &AtomicBool,
        tick: &mut F,
    ) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let dt = self.period();
        let clock = ClockId::CLOCK_MONOTONIC;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        while running.load(Ordering::Acquire) {
            next_wake = timespec_add_ns(next_wake, self.cycle_time_ns);

            let cycle_start = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            tick(dt);
            let cycle_end = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);
            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
            let woke = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            self.record(duration_ns, timespec_diff_ns(&woke, &next_wake).abs());
        }
        Ok(())
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// (a - b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}
