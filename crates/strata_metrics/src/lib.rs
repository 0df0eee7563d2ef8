//! Strata Metrics - world counters and per-system timing
//!
//! With the `metrics` feature off every type here is zero-sized and every
//! method is an empty `#[inline]` body, so instrumented call sites in the
//! world compile away.
//!
//! Enable with the `metrics` feature (off by default; `strata_core` turns it
//! on through its own `metrics` feature).
//!
//! ```ignore
//! use strata_metrics::{Counter, SystemProfiler};
//!
//! let mut counters = Counter::new();
//! counters.increment("entities.created", 1);
//!
//! let mut profiler = SystemProfiler::new();
//! let visited = profiler.time_system("Movement", || run_movement());
//! ```

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod system_profiler;

#[cfg(feature = "metrics")]
pub use counter::Counter;
#[cfg(feature = "metrics")]
pub use system_profiler::{SystemProfiler, SystemTiming};

#[cfg(not(feature = "metrics"))]
pub use noop::{Counter, SystemProfiler, SystemTiming};

/// Stand-ins with the same API as the real collectors.
#[cfg(not(feature = "metrics"))]
mod noop {
    use std::time::Duration;

    #[derive(Debug, Default)]
    pub struct Counter;

    impl Counter {
        #[inline]
        pub fn new() -> Self {
            Self
        }

        #[inline]
        pub fn increment(&mut self, _name: &'static str, _value: u64) {}

        #[inline]
        pub fn get(&self, _name: &str) -> u64 {
            0
        }

        #[inline]
        pub fn reset_all(&mut self) {}
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SystemTiming {
        pub calls: u64,
        pub total: Duration,
    }

    #[derive(Debug, Default)]
    pub struct SystemProfiler;

    impl SystemProfiler {
        #[inline]
        pub fn new() -> Self {
            Self
        }

        #[inline]
        pub fn time_system<F, R>(&mut self, _name: &str, f: F) -> R
        where
            F: FnOnce() -> R,
        {
            f()
        }

        #[inline]
        pub fn timing(&self, _name: &str) -> SystemTiming {
            SystemTiming::default()
        }

        #[inline]
        pub fn reset(&mut self) {}
    }
}
