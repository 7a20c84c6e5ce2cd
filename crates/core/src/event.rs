//! Domain events emitted by a board
//!
//! Events are queued in emission order and drained with
//! [`GameState::take_events`](crate::game_state::GameState::take_events).
//! The match controller decides what crosses the wire; the board never
//! knows about the protocol.

use crate::bag::Permutation;
use crate::types::{Action, ClearKind, Shape};

/// Everything a lock produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockReport {
    pub x: i8,
    pub y: i8,
    pub shape: Shape,
    pub lines: u32,
    pub kind: ClearKind,
    pub all_clear: bool,
    pub back_to_back: bool,
    pub combo: u32,
    /// Attack generated before cancellation
    pub attack: u32,
    /// Banner text such as `"B2B Tetris"`
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// An action changed the authoritative board and must be replicated.
    Action(Action),
    /// The authoritative bag generated a permutation.
    NewBag(Permutation),
    GravityPaused,
    GravityResumed,
    /// Attack left over after cancellation, to be sent to the opponent.
    Attack(u32),
    /// Hole columns of the garbage rows this lock will raise, bottom row
    /// first. Always precedes the matching `Locked`.
    GarbageRows(Vec<u8>),
    Locked(LockReport),
    Spawned(Shape),
    GameOver,
}

impl BoardEvent {
    /// Whether the opponent's mirror needs this event.
    pub fn is_replicated(&self) -> bool {
        !matches!(self, BoardEvent::Spawned(_) | BoardEvent::GameOver)
    }
}
