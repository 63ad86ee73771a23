//! Application state for the HTTP server.

use std::sync::Arc;

use crate::engine::Engine;
use crate::model::Day;

/// Source of "today" for review eligibility.
pub type Clock = Arc<dyn Fn() -> Day + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Local::now().date_naive())
}

/// Shared state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub clock: Clock,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> Day {
        (self.clock)()
    }
}
