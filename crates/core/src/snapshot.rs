use arrayvec::ArrayVec;

use crate::attack::METER_CELLS;
use crate::pieces::get_shape;
use crate::types::{Cell, Rotation, Shape, BOARD_HEIGHT, BOARD_WIDTH, PREVIEW_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActiveSnapshot {
    pub shape: Shape,
    pub rotation: Rotation,
    pub x: i8,
    pub y: i8,
}

impl ActiveSnapshot {
    /// Absolute board cells covered by the piece.
    pub fn cells(&self) -> [(i8, i8); 4] {
        get_shape(self.shape, self.rotation).map(|(mx, my)| (self.x + mx, self.y + my))
    }
}

/// Coarse board phase for views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseView {
    Idle,
    Falling,
    Clearing,
    GameOver,
}

/// Read-only copy of one board for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub board: [[Cell; BOARD_WIDTH as usize]; BOARD_HEIGHT as usize],
    pub phase: PhaseView,
    pub active: Option<ActiveSnapshot>,
    pub ghost_y: Option<i8>,
    pub hold: Option<Shape>,
    pub can_hold: bool,
    pub next: [Option<Shape>; PREVIEW_LEN],
    /// Rows fading out during a clear delay
    pub clearing_rows: ArrayVec<usize, 4>,
    pub incoming: u32,
    pub meter: Option<[u32; METER_CELLS]>,
    pub combo: u32,
    pub back_to_back: bool,
    pub lines_sent: u32,
    pub gravity_paused: bool,
    pub label: Option<String>,
}

impl GameSnapshot {
    pub fn empty() -> Self {
        Self {
            board: [[None; BOARD_WIDTH as usize]; BOARD_HEIGHT as usize],
            phase: PhaseView::Idle,
            active: None,
            ghost_y: None,
            hold: None,
            can_hold: true,
            next: [None; PREVIEW_LEN],
            clearing_rows: ArrayVec::new(),
            incoming: 0,
            meter: None,
            combo: 0,
            back_to_back: false,
            lines_sent: 0,
            gravity_paused: false,
            label: None,
        }
    }

    pub fn game_over(&self) -> bool {
        self.phase == PhaseView::GameOver
    }

    pub fn playable(&self) -> bool {
        self.phase == PhaseView::Falling && self.active.is_some()
    }
}

impl Default for GameSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
