//! Core game logic - pure, deterministic, and testable
//!
//! Everything one board needs to play a battle: the shape catalog and kick
//! tables, the 7-bag, the grid, the attack ledger, tick-driven timers and the
//! per-player state machine. No I/O and no async; the engine crate wraps each
//! board in an actor and the adapter crate puts events on the wire.
//!
//! # Module Structure
//!
//! - [`pieces`]: shape masks per rotation, SRS kick tables, [`Piece`]
//! - [`bag`]: 7-bag queue with replicable permutations
//! - [`board`]: 10x40 locked-cell grid
//! - [`attack`]: combo / back-to-back / garbage cancellation
//! - [`timers`]: gravity and lock delay
//! - [`game_state`]: authoritative and mirror boards
//! - [`event`]: what a board tells the outside world
//!
//! # Example
//!
//! ```
//! use battle_tetris_core::bag::parse_bag;
//! use battle_tetris_core::{BoardEvent, GameState};
//! use battle_tetris_core::types::Action;
//!
//! let first = parse_bag("TIOJLSZ").unwrap();
//! let mut me = GameState::authoritative(first, 42);
//! let mut mirror = GameState::mirror(first);
//! me.start();
//! mirror.start();
//!
//! me.apply(Action::MoveLeft);
//! me.apply(Action::HardDrop);
//! for event in me.take_events() {
//!     match event {
//!         BoardEvent::Action(Action::HardDrop) => {}
//!         BoardEvent::Action(action) => {
//!             mirror.apply(action);
//!         }
//!         BoardEvent::NewBag(bag) => mirror.mirror_add_bag(bag).unwrap(),
//!         BoardEvent::Locked(lock) => mirror.mirror_lock(lock.x, lock.y).unwrap(),
//!         _ => {}
//!     }
//! }
//! assert_eq!(me.board(), mirror.board());
//! ```

pub mod attack;
pub mod bag;
pub mod board;
pub mod error;
pub mod event;
pub mod game_state;
pub mod pieces;
pub mod snapshot;
pub mod timers;

pub use battle_tetris_types as types;

pub use attack::{AttackLedger, AttackOutcome};
pub use bag::{Bag, BagError, Permutation};
pub use board::Board;
pub use error::EngineError;
pub use event::{BoardEvent, LockReport};
pub use game_state::{GameState, Phase, Role, Tetromino};
pub use pieces::{get_shape, try_rotate, Piece};
pub use snapshot::{ActiveSnapshot, GameSnapshot, PhaseView};
