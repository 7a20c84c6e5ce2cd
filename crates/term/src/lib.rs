//! Terminal rendering for battles.
//!
//! [`game_view`] turns two board snapshots and the match status into styled
//! lines without touching the terminal; [`renderer`] diffs those lines
//! against the previous frame and writes the changes through crossterm.

pub mod game_view;
pub mod renderer;

pub use battle_tetris_core as core;
pub use battle_tetris_types as types;

pub use game_view::{BattleView, BoardPane, Line, Span, StatusLines, Style, VISIBLE_ROWS};
pub use renderer::{encode_diff_into, encode_full_into, TerminalRenderer};
