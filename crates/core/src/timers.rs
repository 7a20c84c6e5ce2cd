//! Timers module - gravity and lock delay
//!
//! Both timers are plain state advanced in fixed 10 ms steps by
//! [`GameState::tick`](crate::game_state::GameState::tick). Neither touches
//! the board directly: the caller probes support and applies the outcome, so
//! every mutation stays on the board's single executor.

use std::collections::VecDeque;

use crate::types::{GRAVITY_TICKS, LOCK_DELAY_MS};

/// One-row autonomous fall roughly once per second.
///
/// The counter only runs while the piece is unsupported ("armed"). Pausing
/// freezes the counter but keeps tracking support, so releasing a DAS
/// repeat resumes from the right classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gravity {
    counter: u32,
    armed: bool,
    paused: bool,
}

impl Gravity {
    pub fn new() -> Self {
        Self {
            counter: 0,
            armed: true,
            paused: false,
        }
    }

    /// Whether this step should move the piece down.
    ///
    /// Disarmed gravity restarts its count from zero.
    pub fn due(&mut self) -> bool {
        if self.paused {
            return false;
        }
        if !self.armed {
            self.counter = 0;
            return false;
        }
        self.counter == GRAVITY_TICKS - 1
    }

    /// Re-classify after this step's movement: resting on something disarms.
    pub fn set_support(&mut self, supported: bool) {
        self.armed = !supported;
    }

    /// Finish the step.
    pub fn advance(&mut self) {
        if !self.paused {
            self.counter = (self.counter + 1) % GRAVITY_TICKS;
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// New piece: count from zero, armed. The pause flag belongs to the
    /// input layer and survives.
    pub fn reset(&mut self) {
        self.counter = 0;
        self.armed = true;
    }
}

impl Default for Gravity {
    fn default() -> Self {
        Self::new()
    }
}

/// A scheduled lock check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockCheck {
    due_ms: u64,
    touches: u32,
    piece_no: u64,
}

/// Settle-then-lock rule for the authoritative board.
///
/// Every floating-to-grounded transition and every successful rotation adds
/// a touch and schedules a check [`LOCK_DELAY_MS`] later. A check locks only
/// if nothing happened in between: still grounded, same touch count, same
/// piece. Stale checks are discarded by that guard rather than cancelled.
#[derive(Debug, Clone, Default)]
pub struct LockDelay {
    floating: bool,
    touches: u32,
    piece_no: u64,
    checks: VecDeque<LockCheck>,
}

impl LockDelay {
    pub fn new() -> Self {
        Self {
            floating: true,
            ..Self::default()
        }
    }

    /// A new piece instance is in play. Starts floating so a piece placed
    /// directly on the stack still gets its first check.
    pub fn reset(&mut self) {
        self.floating = true;
        self.touches = 0;
        self.piece_no += 1;
    }

    /// Track support at time `now_ms`.
    pub fn step(&mut self, now_ms: u64, grounded: bool) {
        if grounded && self.floating {
            self.floating = false;
            self.touch(now_ms);
        } else if !grounded && !self.floating {
            self.floating = true;
        }
    }

    /// Count a touch and schedule a check.
    pub fn touch(&mut self, now_ms: u64) {
        self.touches += 1;
        self.checks.push_back(LockCheck {
            due_ms: now_ms + u64::from(LOCK_DELAY_MS),
            touches: self.touches,
            piece_no: self.piece_no,
        });
    }

    /// Run every check due at `now_ms`; true if one of them calls for a lock.
    pub fn due(&mut self, now_ms: u64) -> bool {
        let mut lock = false;
        while let Some(check) = self.checks.front().copied() {
            if check.due_ms > now_ms {
                break;
            }
            self.checks.pop_front();
            lock |= !self.floating
                && check.touches == self.touches
                && check.piece_no == self.piece_no;
        }
        lock
    }

    pub fn touches(&self) -> u32 {
        self.touches
    }

    pub fn piece_no(&self) -> u64 {
        self.piece_no
    }

    pub fn pending_checks(&self) -> usize {
        self.checks.len()
    }

    /// Earliest pending check, if any.
    pub fn next_due(&self) -> Option<u64> {
        self.checks.front().map(|c| c.due_ms)
    }

    /// Drop every scheduled check (round reset).
    pub fn clear(&mut self) {
        self.checks.clear();
        self.floating = true;
        self.touches = 0;
    }
}
