//! Terminal input module (engine-facing).
//!
//! Maps `crossterm` key events to [`crate::types::Action`]s and runs the DAS
//! auto-repeat for left, right and soft drop, including the gravity pause
//! that goes with it, plus the lobby's roster cursor and chat prompt.
//! Independent of any UI framework.

pub mod handler;
pub mod lobby;
pub mod map;

pub use battle_tetris_types as types;

pub use handler::{InputEvent, InputHandler};
pub use lobby::{LobbyInput, LobbyRequest};
pub use map::{handle_key_event, map_action, should_quit, KeyCommand};
