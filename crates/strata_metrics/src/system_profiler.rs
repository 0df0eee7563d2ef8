//! System profiler for timing named systems across ticks

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Accumulated timing for one system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemTiming {
    /// Number of timed runs.
    pub calls: u64,
    /// Wall-clock time summed over all runs.
    pub total: Duration,
}

impl SystemTiming {
    pub fn average(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total.as_nanos() / u128::from(self.calls);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }
}

#[derive(Debug, Default)]
pub struct SystemProfiler {
    timings: HashMap<String, SystemTiming>,
}

impl SystemProfiler {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
        }
    }

    pub fn time_system<F, R>(&mut self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        if let Some(timing) = self.timings.get_mut(name) {
            timing.calls += 1;
            timing.total += elapsed;
        } else {
            self.timings.insert(
                name.to_string(),
                SystemTiming {
                    calls: 1,
                    total: elapsed,
                },
            );
        }
        result
    }

    pub fn timing(&self, name: &str) -> SystemTiming {
        self.timings.get(name).copied().unwrap_or_default()
    }

    pub fn reset(&mut self) {
        self.timings.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SystemTiming)> {
        self.timings.iter()
    }
}
