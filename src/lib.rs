//! Battle Tetris (workspace facade crate).
//!
//! Re-exports the workspace crates under one name so the binaries, tests
//! and benches can use `battle_tetris::{core,adapter,engine,input,term,types}`.

pub use battle_tetris_adapter as adapter;
pub use battle_tetris_core as core;
pub use battle_tetris_engine as engine;
pub use battle_tetris_input as input;
pub use battle_tetris_term as term;
pub use battle_tetris_types as types;
