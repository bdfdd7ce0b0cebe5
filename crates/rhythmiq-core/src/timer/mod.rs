mod engine;

pub use engine::{Phase, TimerEngine, TimerSettings, TimerState, TimerStatus};
