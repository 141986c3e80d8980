use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{level_filters::LevelFilter, Level};

/// Runtime threshold for the events emitted by a pool.
///
/// The installed `tracing` subscriber still has the final say: this can only make the pool
/// quieter than the subscriber allows.
#[derive(Debug)]
pub(crate) struct Verbosity(AtomicU8);

impl Verbosity {
    pub(crate) fn new(filter: LevelFilter) -> Self {
        Self(AtomicU8::new(encode(filter)))
    }

    pub(crate) fn set(&self, filter: LevelFilter) {
        self.0.store(encode(filter), Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> LevelFilter {
        decode(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn enabled(&self, level: Level) -> bool {
        level <= self.get()
    }
}

/// Filters from the most quiet to the most verbose.
const FILTERS: [LevelFilter; 6] = [
    LevelFilter::OFF,
    LevelFilter::ERROR,
    LevelFilter::WARN,
    LevelFilter::INFO,
    LevelFilter::DEBUG,
    LevelFilter::TRACE,
];

fn encode(filter: LevelFilter) -> u8 {
    FILTERS
        .iter()
        .position(|candidate| *candidate == filter)
        .unwrap_or(FILTERS.len() - 1) as u8
}

fn decode(value: u8) -> LevelFilter {
    FILTERS
        .get(value as usize)
        .copied()
        .unwrap_or(LevelFilter::TRACE)
}

/// Emit a `tracing` event if the pool's [`Verbosity`] lets it through.
macro_rules! pool_event {
    ($verbosity:expr, $level:ident, $($arg:tt)+) => {
        if $verbosity.enabled(::tracing::Level::$level) {
            ::tracing::event!(::tracing::Level::$level, $($arg)+);
        }
    };
}
pub(crate) use pool_event;
