//! Monotonic time sources

use std::cell::Cell;
use std::rc::Rc;

/// A monotonic clock measured in seconds
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall clock of the host
///
/// Uses `performance.now()` in the browser and [`std::time::Instant`]
/// elsewhere. Readings are relative to the clock's creation.
#[derive(Debug, Clone)]
pub struct SystemClock {
    #[cfg(not(target_arch = "wasm32"))]
    origin: std::time::Instant,
    #[cfg(target_arch = "wasm32")]
    performance: Option<web_sys::Performance>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            origin: std::time::Instant::now(),
            #[cfg(target_arch = "wasm32")]
            performance: web_sys::window().and_then(|w| w.performance()),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[cfg(not(target_arch = "wasm32"))]
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    #[cfg(target_arch = "wasm32")]
    fn now(&self) -> f64 {
        self.performance
            .as_ref()
            .map(|p| p.now() / 1000.0)
            .unwrap_or_else(|| js_sys::Date::now() / 1000.0)
    }
}

/// A clock that only moves when told to
///
/// Clones share the same time, so a test can keep one handle and pass
/// another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    time: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            time: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, time: f64) {
        self.time.set(time);
    }

    pub fn advance(&self, seconds: f64) {
        self.time.set(self.time.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.time.get()
    }
}
