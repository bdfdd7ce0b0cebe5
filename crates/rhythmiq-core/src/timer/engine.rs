//! Timer engine implementation.
//!
//! The timer engine is a second-granular countdown state machine. It does
//! not use internal threads - the caller is responsible for calling `tick()`
//! once per second while the timer runs.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> RunningFocus -> Paused -> RunningFocus -> (complete) -> Idle(Break)
//! Idle(Break) -> RunningBreak -> (complete) -> Idle(Focus)
//! ```
//!
//! Both phase boundaries pause the timer; the user starts the next phase.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(TimerSettings::default());
//! engine.start();
//! // Once per second:
//! if let Some(event) = engine.tick() { /* dispatch */ }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Focus,
    Break,
}

/// Coarse view of the engine for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// Not running, full phase time remaining.
    Idle,
    /// Not running, part of the phase already elapsed.
    Paused,
    RunningFocus,
    RunningBreak,
}

/// Phase lengths and milestone spacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerSettings {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    /// Focus minutes between incremental XP milestones. 0 disables them.
    #[serde(default = "default_milestone_minutes")]
    pub milestone_minutes: u32,
}

fn default_focus_minutes() -> u32 {
    25
}
fn default_break_minutes() -> u32 {
    5
}
fn default_milestone_minutes() -> u32 {
    5
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            break_minutes: default_break_minutes(),
            milestone_minutes: default_milestone_minutes(),
        }
    }
}

impl TimerSettings {
    pub fn minutes_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Focus => self.focus_minutes,
            Phase::Break => self.break_minutes,
        }
    }
}

/// Observable timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub phase: Phase,
    pub minutes_remaining: u32,
    /// Always within 0..=59.
    pub seconds_remaining: u32,
    pub running: bool,
    /// Focus minutes crossed in the current focus phase.
    pub elapsed_focus_minutes: u32,
}

impl TimerState {
    fn fresh(phase: Phase, settings: &TimerSettings) -> Self {
        Self {
            phase,
            minutes_remaining: settings.minutes_for(phase),
            seconds_remaining: 0,
            running: false,
            elapsed_focus_minutes: 0,
        }
    }

    pub fn remaining_secs(&self) -> u64 {
        u64::from(self.minutes_remaining) * 60 + u64::from(self.seconds_remaining)
    }
}

/// Core timer engine.
///
/// Performs no I/O; every transition worth reacting to is returned as an
/// [`Event`] for the session coordinator to dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    settings: TimerSettings,
    state: TimerState,
}

impl TimerEngine {
    /// Create a new engine in `Idle` with a full focus phase ready.
    pub fn new(settings: TimerSettings) -> Self {
        let state = TimerState::fresh(Phase::Focus, &settings);
        Self { settings, state }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn remaining_secs(&self) -> u64 {
        self.state.remaining_secs()
    }

    pub fn total_secs(&self) -> u64 {
        u64::from(self.settings.minutes_for(self.state.phase)) * 60
    }

    pub fn status(&self) -> TimerStatus {
        match (self.state.running, self.state.phase) {
            (true, Phase::Focus) => TimerStatus::RunningFocus,
            (true, Phase::Break) => TimerStatus::RunningBreak,
            (false, _) if self.remaining_secs() == self.total_secs() => TimerStatus::Idle,
            (false, _) => TimerStatus::Paused,
        }
    }

    /// 0.0 .. 100.0 progress within the current phase.
    pub fn progress_pct(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return 0.0;
        }
        let elapsed = total.saturating_sub(self.remaining_secs());
        (elapsed as f64 / total as f64 * 100.0).min(100.0)
    }

    /// `MM:SS` rendering of the remaining time.
    pub fn display(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.state.minutes_remaining, self.state.seconds_remaining
        )
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            status: self.status(),
            phase: self.state.phase,
            minutes_remaining: self.state.minutes_remaining,
            seconds_remaining: self.state.seconds_remaining,
            running: self.state.running,
            elapsed_focus_minutes: self.state.elapsed_focus_minutes,
            progress_pct: self.progress_pct(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume whichever phase is active. `None` if already running.
    pub fn start(&mut self) -> Option<Event> {
        if self.state.running {
            return None;
        }
        self.state.running = true;
        Some(Event::TimerStarted {
            phase: self.state.phase,
            remaining_secs: self.remaining_secs(),
            at: Utc::now(),
        })
    }

    /// Pause, preserving remaining time. `None` if not running.
    pub fn pause(&mut self) -> Option<Event> {
        if !self.state.running {
            return None;
        }
        self.state.running = false;
        Some(Event::TimerPaused {
            phase: self.state.phase,
            remaining_secs: self.remaining_secs(),
            at: Utc::now(),
        })
    }

    /// Start when stopped, pause when running.
    pub fn toggle(&mut self) -> Option<Event> {
        if self.state.running {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Back to a stopped, full focus phase from any state.
    pub fn reset(&mut self) -> Event {
        self.state = TimerState::fresh(Phase::Focus, &self.settings);
        Event::TimerReset { at: Utc::now() }
    }

    /// Advance by one second. No-op unless running.
    ///
    /// Returns a milestone event when a multiple of the milestone spacing of
    /// focus minutes has been crossed, and a completion event when the phase
    /// ends.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.state.running {
            return None;
        }

        if self.state.seconds_remaining > 0 {
            self.state.seconds_remaining -= 1;
            return None;
        }

        if self.state.minutes_remaining == 0 {
            return Some(self.complete_phase());
        }

        self.state.minutes_remaining -= 1;
        self.state.seconds_remaining = 59;

        if self.state.phase != Phase::Focus {
            return None;
        }
        self.state.elapsed_focus_minutes += 1;
        let every = self.settings.milestone_minutes;
        let elapsed = self.state.elapsed_focus_minutes;
        if every > 0 && elapsed % every == 0 {
            return Some(Event::FiveMinuteMilestone {
                elapsed_focus_minutes: elapsed,
                at: Utc::now(),
            });
        }
        None
    }

    /// Replace the settings and reset.
    pub fn set_settings(&mut self, settings: TimerSettings) {
        self.settings = settings;
        self.reset();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete_phase(&mut self) -> Event {
        match self.state.phase {
            Phase::Focus => {
                let focus_minutes = self.settings.focus_minutes;
                self.state = TimerState::fresh(Phase::Break, &self.settings);
                Event::FocusSessionComplete {
                    focus_minutes,
                    at: Utc::now(),
                }
            }
            Phase::Break => {
                self.state = TimerState::fresh(Phase::Focus, &self.settings);
                Event::BreakComplete { at: Utc::now() }
            }
        }
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(TimerSettings::default())
    }
}
