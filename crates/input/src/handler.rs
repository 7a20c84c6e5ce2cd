//! DAS input handler for terminal environments.
//!
//! Left, right and soft drop fire once on press, then repeat every
//! [`DAS_REPEAT_MS`] after [`DAS_DELAY_MS`] until released. Only one
//! repeat is live: pressing another repeatable key takes it over, and
//! re-press events from the terminal's own key repeat are ignored. Gravity
//! is paused while a repeat is in flight and resumed on release.
//!
//! Terminals that never report key releases are handled with a timeout.

use arrayvec::ArrayVec;

use crate::types::{Action, DAS_DELAY_MS, DAS_REPEAT_MS};

/// What the board should do after an input update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Action(Action),
    PauseGravity,
    ResumeGravity,
}

/// Tracks the one live DAS repeat.
#[derive(Debug, Clone)]
pub struct InputHandler {
    held: Option<Action>,
    das_timer: u32,
    repeat_accumulator: u32,
    repeating: bool,
    since_key_ms: u32,
    das_delay: u32,
    repeat_rate: u32,
    key_release_timeout_ms: u32,
}

// Without key-release events a short timeout keeps a single tap from
// turning into a held key.
const DEFAULT_KEY_RELEASE_TIMEOUT_MS: u32 = 150;

impl InputHandler {
    pub fn new() -> Self {
        Self::with_config(DAS_DELAY_MS, DAS_REPEAT_MS)
    }

    pub fn with_config(das_delay: u32, repeat_rate: u32) -> Self {
        Self {
            held: None,
            das_timer: 0,
            repeat_accumulator: 0,
            repeating: false,
            since_key_ms: 0,
            das_delay,
            repeat_rate: repeat_rate.max(1),
            key_release_timeout_ms: DEFAULT_KEY_RELEASE_TIMEOUT_MS,
        }
    }

    pub fn with_key_release_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.key_release_timeout_ms = timeout_ms;
        self
    }

    pub fn key_release_timeout_ms(&self) -> u32 {
        self.key_release_timeout_ms
    }

    pub fn held(&self) -> Option<Action> {
        self.held
    }

    /// Handle a key press. Non-repeatable actions pass straight through.
    pub fn press(&mut self, action: Action) -> ArrayVec<InputEvent, 2> {
        let mut out = ArrayVec::new();
        if !action.repeats() {
            out.push(InputEvent::Action(action));
            return out;
        }

        self.since_key_ms = 0;
        if self.held == Some(action) {
            return out;
        }
        if self.repeating {
            out.push(InputEvent::ResumeGravity);
        }
        self.held = Some(action);
        self.das_timer = 0;
        self.repeat_accumulator = 0;
        self.repeating = false;
        out.push(InputEvent::Action(action));
        out
    }

    /// Handle a key release; only the live key matters.
    pub fn release(&mut self, action: Action) -> Option<InputEvent> {
        if self.held != Some(action) {
            return None;
        }
        self.stop()
    }

    fn stop(&mut self) -> Option<InputEvent> {
        let was_repeating = self.repeating;
        self.held = None;
        self.das_timer = 0;
        self.repeat_accumulator = 0;
        self.repeating = false;
        was_repeating.then_some(InputEvent::ResumeGravity)
    }

    /// Advance time and collect repeats.
    pub fn update(&mut self, elapsed_ms: u32) -> ArrayVec<InputEvent, 32> {
        let mut events = ArrayVec::<InputEvent, 32>::new();

        self.since_key_ms = self.since_key_ms.saturating_add(elapsed_ms);
        if self.held.is_some() && self.since_key_ms > self.key_release_timeout_ms {
            if let Some(event) = self.stop() {
                events.push(event);
            }
            return events;
        }

        let Some(action) = self.held else {
            return events;
        };

        let prev_das = self.das_timer;
        self.das_timer = self.das_timer.saturating_add(elapsed_ms);
        if self.das_timer < self.das_delay {
            return events;
        }

        if !self.repeating {
            self.repeating = true;
            events.push(InputEvent::PauseGravity);
        }
        let excess = if prev_das < self.das_delay {
            self.das_timer - self.das_delay
        } else {
            elapsed_ms
        };
        self.repeat_accumulator += excess;
        while self.repeat_accumulator >= self.repeat_rate {
            if events.try_push(InputEvent::Action(action)).is_err() {
                // Burst cap; drop the backlog.
                self.repeat_accumulator = 0;
                break;
            }
            self.repeat_accumulator -= self.repeat_rate;
        }
        events
    }

    /// Forget all held keys (round reset). Gravity state is not touched.
    pub fn reset(&mut self) {
        self.held = None;
        self.das_timer = 0;
        self.repeat_accumulator = 0;
        self.repeating = false;
        self.since_key_ms = 0;
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}
