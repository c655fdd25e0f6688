// src/utils/time.rs
//! Clock abstractions for sample timestamps and capture dates

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    /// Monotonic milliseconds since the provider was created
    fn monotonic_millis(&self) -> u64;

    /// Wall-clock milliseconds since the Unix epoch
    fn wall_clock_millis(&self) -> u64 {
        current_timestamp_millis()
    }
}

/// Clock backed by `Instant` and the system time
pub struct MonotonicTimeProvider {
    origin: Instant,
}

impl MonotonicTimeProvider {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for MonotonicTimeProvider {
    fn monotonic_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Mock time provider for deterministic testing
///
/// Every read advances the clock by `step_millis`, which lets a replayed
/// stream carry evenly spaced timestamps.
pub struct MockTimeProvider {
    current_millis: AtomicU64,
    step_millis: u64,
    wall_origin_millis: u64,
}

impl MockTimeProvider {
    pub fn new(initial_millis: u64) -> Self {
        Self::with_step(initial_millis, 0)
    }

    pub fn with_step(initial_millis: u64, step_millis: u64) -> Self {
        Self {
            current_millis: AtomicU64::new(initial_millis),
            step_millis,
            wall_origin_millis: 0,
        }
    }

    pub fn advance_by(&self, millis: u64) {
        self.current_millis.fetch_add(millis, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn monotonic_millis(&self) -> u64 {
        self.current_millis.fetch_add(self.step_millis, Ordering::Relaxed)
    }

    fn wall_clock_millis(&self) -> u64 {
        self.wall_origin_millis + self.current_millis.load(Ordering::Relaxed)
    }
}

pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
