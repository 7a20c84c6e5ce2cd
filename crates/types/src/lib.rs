//! Core types module - shared data structures and constants
//!
//! This module defines the fundamental types used throughout the workspace.
//! All types are pure data structures with no external dependencies, making them
//! usable in any context (board engine, match controller, wire protocol, rendering).
//!
//! # Board Dimensions
//!
//! - **Width**: 10 columns (indexed 0-9, left to right)
//! - **Height**: 40 rows (indexed 0-39, top to bottom)
//! - **Visible**: the bottom 20.5 rows; everything above is spawn buffer
//!
//! # Timing Constants
//!
//! Timing values are in milliseconds:
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `TICK_MS` | 10 | Gravity / lock-delay step |
//! | `GRAVITY_TICKS` | 100 | Steps per gravity row (~1 s) |
//! | `LOCK_DELAY_MS` | 500 | Grounded time before a lock check fires |
//! | `LINE_CLEAR_DELAY_MS` | 600 | Spawn suspension while cleared rows fade |
//! | `DAS_DELAY_MS` | 300 | Hold time before auto-repeat starts |
//! | `DAS_REPEAT_MS` | 35 | Auto-repeat interval |
//! | `READY_MS` / `GO_MS` | 1000 / 500 | Round countdown phases |
//! | `ROUND_OVER_MS` | 5000 | Pause after a top-out |
//!
//! # Examples
//!
//! ```
//! use battle_tetris_types::{Action, Rotation, Shape, BOARD_HEIGHT, BOARD_WIDTH};
//!
//! assert_eq!(Shape::from_char('t'), Some(Shape::T));
//! assert_eq!(Rotation::Up.rotate_cw(), Rotation::Right);
//! assert_eq!(Action::from_shorthand("HD"), Some(Action::HardDrop));
//! assert_eq!(BOARD_WIDTH, 10);
//! assert_eq!(BOARD_HEIGHT, 40);
//! ```

use std::fmt;

/// Board width in cells (10 columns)
pub const BOARD_WIDTH: u8 = 10;

/// Board height in cells, spawn buffer included (40 rows)
pub const BOARD_HEIGHT: u8 = 40;

/// Rendered rows, counted from the bottom. The half row shows the top of
/// freshly spawned pieces.
pub const VISIBLE_HEIGHT: f32 = 20.5;

/// Row at which a piece's bounding box is first placed.
pub const SPAWN_ROW: i8 = 20;

/// How many rows a spawn may be lifted to avoid overlapping the stack.
pub const SPAWN_ALLOWANCE: u8 = 3;

/// Timer step in milliseconds.
pub const TICK_MS: u32 = 10;

/// Gravity counter period; the piece falls one row when it wraps.
pub const GRAVITY_TICKS: u32 = 100;

/// Delay between a piece touching down and the lock check.
pub const LOCK_DELAY_MS: u32 = 500;

/// Successful rotations allowed per piece placement.
pub const ROTATION_BUDGET: u8 = 15;

/// Spawn suspension after a line clear (30 fade frames of 20 ms).
pub const LINE_CLEAR_DELAY_MS: u32 = 600;

/// DAS (delayed auto-shift) initial delay.
pub const DAS_DELAY_MS: u32 = 300;

/// DAS auto-repeat interval.
pub const DAS_REPEAT_MS: u32 = 35;

/// Countdown: READY banner duration.
pub const READY_MS: u64 = 1000;

/// Countdown: GO banner duration.
pub const GO_MS: u64 = 500;

/// Pause between a top-out and the next round.
pub const ROUND_OVER_MS: u64 = 5000;

/// Grace delay before a kicked/banned client exits.
pub const FORCED_EXIT_GRACE_MS: u64 = 5000;

/// Round wins needed to take the match.
pub const FIRST_TO: u8 = 2;

/// Pending attack materialized per lock stops once the running total exceeds this.
pub const GARBAGE_BATCH_LIMIT: u32 = 5;

/// Probability that a garbage row moves its hole relative to the row below.
pub const GARBAGE_HOLE_SHIFT_CHANCE: f64 = 0.25;

/// Bonus attack for clearing the whole board.
pub const ALL_CLEAR_BONUS: u32 = 10;

/// Number of upcoming pieces exposed in snapshots.
pub const PREVIEW_LEN: usize = 5;

/// Default relay port.
pub const DEFAULT_PORT: u16 = 9001;

/// The seven tetromino shapes
///
/// Each shape has a distinct geometry and color:
/// - **I**: Cyan, 4-wide bar
/// - **J**: Blue
/// - **L**: Orange (mirror of J)
/// - **O**: Yellow, 2x2 square, never kicks
/// - **S**: Green
/// - **T**: Purple, the only shape that can spin
/// - **Z**: Red (mirror of S)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    I,
    J,
    L,
    O,
    S,
    T,
    Z,
}

impl Shape {
    /// All shapes in bag order before shuffling.
    pub const ALL: [Shape; 7] = [
        Shape::I,
        Shape::J,
        Shape::L,
        Shape::O,
        Shape::S,
        Shape::T,
        Shape::Z,
    ];

    /// Parse a shape letter (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use battle_tetris_types::Shape;
    ///
    /// assert_eq!(Shape::from_char('I'), Some(Shape::I));
    /// assert_eq!(Shape::from_char('z'), Some(Shape::Z));
    /// assert_eq!(Shape::from_char('Q'), None);
    /// ```
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'I' => Some(Shape::I),
            'J' => Some(Shape::J),
            'L' => Some(Shape::L),
            'O' => Some(Shape::O),
            'S' => Some(Shape::S),
            'T' => Some(Shape::T),
            'Z' => Some(Shape::Z),
            _ => None,
        }
    }

    /// Uppercase wire letter
    pub fn as_char(&self) -> char {
        match self {
            Shape::I => 'I',
            Shape::J => 'J',
            Shape::L => 'L',
            Shape::O => 'O',
            Shape::S => 'S',
            Shape::T => 'T',
            Shape::Z => 'Z',
        }
    }

    /// Display color as RGB.
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Shape::I => (26, 172, 217),
            Shape::J => (30, 70, 200),
            Shape::L => (240, 140, 20),
            Shape::O => (235, 210, 30),
            Shape::S => (60, 190, 60),
            Shape::T => (146, 23, 156),
            Shape::Z => (215, 40, 40),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Rotation states
///
/// - **Up**: Spawn orientation
/// - **Right**: Rotated 90° clockwise
/// - **Down**: Rotated 180°
/// - **Left**: Rotated 90° counter-clockwise
///
/// The clockwise cycle goes: Up → Right → Down → Left → Up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Rotation {
    /// Rotate clockwise (90°)
    ///
    /// # Examples
    ///
    /// ```
    /// use battle_tetris_types::Rotation;
    ///
    /// assert_eq!(Rotation::Up.rotate_cw(), Rotation::Right);
    /// assert_eq!(Rotation::Left.rotate_cw(), Rotation::Up);
    /// ```
    pub fn rotate_cw(&self) -> Self {
        match self {
            Rotation::Up => Rotation::Right,
            Rotation::Right => Rotation::Down,
            Rotation::Down => Rotation::Left,
            Rotation::Left => Rotation::Up,
        }
    }

    /// Rotate counter-clockwise (-90°)
    pub fn rotate_ccw(&self) -> Self {
        match self {
            Rotation::Up => Rotation::Left,
            Rotation::Left => Rotation::Down,
            Rotation::Down => Rotation::Right,
            Rotation::Right => Rotation::Up,
        }
    }

    pub fn rotate(&self, spin: Spin) -> Self {
        match spin {
            Spin::Cw => self.rotate_cw(),
            Spin::Ccw => self.rotate_ccw(),
        }
    }

    /// Table index (Up=0, Right=1, Down=2, Left=3).
    pub fn index(&self) -> usize {
        match self {
            Rotation::Up => 0,
            Rotation::Right => 1,
            Rotation::Down => 2,
            Rotation::Left => 3,
        }
    }
}

/// Rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Spin {
    /// Clockwise ("rotate right")
    Cw,
    /// Counter-clockwise ("rotate left")
    Ccw,
}

/// Discrete board actions
///
/// These come from player input on the authoritative board and from the
/// wire (`M<shorthand>`) on the mirror. `Gravity` is the autonomous
/// one-row fall, replicated like any other action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Move piece one cell left
    MoveLeft,
    /// Move piece one cell right
    MoveRight,
    /// Drop piece one cell down
    SoftDrop,
    /// Drop piece to the ghost position and lock
    HardDrop,
    /// Rotate piece 90° clockwise
    RotateCw,
    /// Rotate piece 90° counter-clockwise
    RotateCcw,
    /// Hold current piece (once per spawn)
    Hold,
    /// Gravity nudge
    Gravity,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::MoveLeft,
        Action::MoveRight,
        Action::SoftDrop,
        Action::HardDrop,
        Action::RotateCw,
        Action::RotateCcw,
        Action::Hold,
        Action::Gravity,
    ];

    /// Parse a wire shorthand (case-sensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use battle_tetris_types::Action;
    ///
    /// assert_eq!(Action::from_shorthand("L"), Some(Action::MoveLeft));
    /// assert_eq!(Action::from_shorthand("RR"), Some(Action::RotateCw));
    /// assert_eq!(Action::from_shorthand("RL"), Some(Action::RotateCcw));
    /// assert_eq!(Action::from_shorthand("?"), None);
    /// ```
    pub fn from_shorthand(s: &str) -> Option<Self> {
        match s {
            "L" => Some(Action::MoveLeft),
            "R" => Some(Action::MoveRight),
            "SD" => Some(Action::SoftDrop),
            "HD" => Some(Action::HardDrop),
            "RR" => Some(Action::RotateCw),
            "RL" => Some(Action::RotateCcw),
            "H" => Some(Action::Hold),
            "G" => Some(Action::Gravity),
            _ => None,
        }
    }

    /// Wire shorthand used in `M<shorthand>` lines
    pub fn shorthand(&self) -> &'static str {
        match self {
            Action::MoveLeft => "L",
            Action::MoveRight => "R",
            Action::SoftDrop => "SD",
            Action::HardDrop => "HD",
            Action::RotateCw => "RR",
            Action::RotateCcw => "RL",
            Action::Hold => "H",
            Action::Gravity => "G",
        }
    }

    /// Actions that support DAS auto-repeat.
    pub fn repeats(&self) -> bool {
        matches!(self, Action::MoveLeft | Action::MoveRight | Action::SoftDrop)
    }
}

/// Lock classification fed to the attack ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClearKind {
    Normal,
    TSpin,
    TSpinMini,
}

impl ClearKind {
    pub fn is_spin(&self) -> bool {
        !matches!(self, ClearKind::Normal)
    }
}

/// Contents of a filled cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Block {
    /// Locked mino of the given shape
    Mino(Shape),
    /// Garbage row filler
    Garbage,
}

/// A cell on the board
///
/// - `None`: Empty cell
/// - `Some(Block)`: Filled cell
pub type Cell = Option<Block>;
