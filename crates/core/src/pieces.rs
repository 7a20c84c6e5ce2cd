//! Shape catalog - per-rotation geometry and wall-kick tables
//!
//! Every shape lives in a square bounding box (2 for O, 4 for I, 3 for the
//! rest). Masks are mino offsets `(x, y)` inside that box with `y` growing
//! downward, the same orientation as board rows.
//!
//! Kick offsets are written with a positive `dy` meaning *up*; applying a
//! kick moves the origin to `(x + dx, y - dy)`. Each (state, direction)
//! pair has four candidates, tried after the unkicked placement fails.

use crate::types::{Rotation, Shape, Spin, ROTATION_BUDGET};

/// Offset of a single mino relative to the bounding-box origin
pub type MinoOffset = (i8, i8);

/// The four minos of a shape in one rotation state
pub type PieceShape = [MinoOffset; 4];

/// Four ordered kick candidates
pub type KickSet = [(i8, i8); 4];

/// Kick candidates indexed by `[rotation.index()][direction]` (Cw = 0, Ccw = 1)
type KickTable = [[KickSet; 2]; 4];

/// Side length of the shape's bounding box
pub fn box_size(shape: Shape) -> i8 {
    match shape {
        Shape::I => 4,
        Shape::O => 2,
        _ => 3,
    }
}

/// Get the mino offsets for a shape and rotation
pub fn get_shape(shape: Shape, rotation: Rotation) -> PieceShape {
    use Rotation::*;
    match (shape, rotation) {
        (Shape::I, Up) => [(0, 1), (1, 1), (2, 1), (3, 1)],
        (Shape::I, Right) => [(2, 0), (2, 1), (2, 2), (2, 3)],
        (Shape::I, Down) => [(0, 2), (1, 2), (2, 2), (3, 2)],
        (Shape::I, Left) => [(1, 0), (1, 1), (1, 2), (1, 3)],

        (Shape::O, _) => [(0, 0), (1, 0), (0, 1), (1, 1)],

        (Shape::T, Up) => [(1, 0), (0, 1), (1, 1), (2, 1)],
        (Shape::T, Right) => [(1, 0), (1, 1), (2, 1), (1, 2)],
        (Shape::T, Down) => [(0, 1), (1, 1), (2, 1), (1, 2)],
        (Shape::T, Left) => [(1, 0), (0, 1), (1, 1), (1, 2)],

        (Shape::J, Up) => [(0, 0), (0, 1), (1, 1), (2, 1)],
        (Shape::J, Right) => [(1, 0), (2, 0), (1, 1), (1, 2)],
        (Shape::J, Down) => [(0, 1), (1, 1), (2, 1), (2, 2)],
        (Shape::J, Left) => [(1, 0), (1, 1), (0, 2), (1, 2)],

        (Shape::L, Up) => [(2, 0), (0, 1), (1, 1), (2, 1)],
        (Shape::L, Right) => [(1, 0), (1, 1), (1, 2), (2, 2)],
        (Shape::L, Down) => [(0, 1), (1, 1), (2, 1), (0, 2)],
        (Shape::L, Left) => [(0, 0), (1, 0), (1, 1), (1, 2)],

        (Shape::S, Up) => [(1, 0), (2, 0), (0, 1), (1, 1)],
        (Shape::S, Right) => [(1, 0), (1, 1), (2, 1), (2, 2)],
        (Shape::S, Down) => [(1, 1), (2, 1), (0, 2), (1, 2)],
        (Shape::S, Left) => [(0, 0), (0, 1), (1, 1), (1, 2)],

        (Shape::Z, Up) => [(0, 0), (1, 0), (1, 1), (2, 1)],
        (Shape::Z, Right) => [(2, 0), (1, 1), (2, 1), (1, 2)],
        (Shape::Z, Down) => [(0, 1), (1, 1), (1, 2), (2, 2)],
        (Shape::Z, Left) => [(1, 0), (0, 1), (1, 1), (0, 2)],
    }
}

static JLSTZ_KICKS: KickTable = [
    // Up
    [
        [(-1, 0), (-1, 1), (0, -2), (-1, -2)],
        [(1, 0), (1, 1), (0, -2), (1, -2)],
    ],
    // Right
    [
        [(1, 0), (1, -1), (0, 2), (1, 2)],
        [(1, 0), (1, -1), (0, 2), (1, 2)],
    ],
    // Down
    [
        [(1, 0), (1, 1), (0, -2), (1, -2)],
        [(-1, 0), (-1, 1), (0, -2), (-1, -2)],
    ],
    // Left
    [
        [(-1, 0), (-1, -1), (0, 2), (-1, 2)],
        [(-1, 0), (-1, -1), (0, 2), (-1, 2)],
    ],
];

static I_KICKS: KickTable = [
    // Up
    [
        [(-2, 0), (1, 0), (-2, -1), (1, 2)],
        [(-1, 0), (2, 0), (-1, 2), (2, -1)],
    ],
    // Right
    [
        [(-1, 0), (2, 0), (-1, 2), (2, -1)],
        [(2, 0), (-1, 0), (2, 1), (-1, -2)],
    ],
    // Down
    [
        [(2, 0), (-1, 0), (2, 1), (-1, -2)],
        [(1, 0), (-2, 0), (1, -2), (-2, 1)],
    ],
    // Left
    [
        [(1, 0), (-2, 0), (1, -2), (-2, 1)],
        [(-2, 0), (1, 0), (-2, -1), (1, 2)],
    ],
];

/// Kick candidates for rotating `shape` out of `from` in direction `spin`.
///
/// O never kicks and returns an empty slice.
pub fn kick_candidates(shape: Shape, from: Rotation, spin: Spin) -> &'static [(i8, i8)] {
    let dir = match spin {
        Spin::Cw => 0,
        Spin::Ccw => 1,
    };
    match shape {
        Shape::O => &[],
        Shape::I => &I_KICKS[from.index()][dir],
        _ => &JLSTZ_KICKS[from.index()][dir],
    }
}

/// Outcome of a successful rotation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationResult {
    pub rotation: Rotation,
    pub x: i8,
    pub y: i8,
    /// A nonzero kick offset was needed
    pub kicked: bool,
}

/// Resolve a rotation: the unkicked placement first, then each kick in order.
///
/// `is_valid(x, y)` reports whether a board cell is in bounds and empty.
/// Returns `None` when every candidate overlaps; the caller must then leave
/// its state untouched.
pub fn try_rotate(
    shape: Shape,
    rotation: Rotation,
    x: i8,
    y: i8,
    spin: Spin,
    is_valid: impl Fn(i8, i8) -> bool,
) -> Option<RotationResult> {
    let new_rotation = rotation.rotate(spin);
    let minos = get_shape(shape, new_rotation);
    let fits = |ox: i8, oy: i8| minos.iter().all(|&(mx, my)| is_valid(ox + mx, oy + my));

    if fits(x, y) {
        return Some(RotationResult {
            rotation: new_rotation,
            x,
            y,
            kicked: false,
        });
    }

    kick_candidates(shape, rotation, spin)
        .iter()
        .map(|&(dx, dy)| (x + dx, y - dy))
        .find(|&(kx, ky)| fits(kx, ky))
        .map(|(kx, ky)| RotationResult {
            rotation: new_rotation,
            x: kx,
            y: ky,
            kicked: true,
        })
}

/// Spawn column for a shape: its box centered on the 10-wide board.
pub fn spawn_x(shape: Shape) -> i8 {
    (crate::types::BOARD_WIDTH as i8 - box_size(shape)) / 2
}

/// A falling piece instance
///
/// The rotation budget caps spins per placement; once spent, rotation
/// attempts are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub shape: Shape,
    pub rotation: Rotation,
    budget: u8,
}

impl Piece {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            rotation: Rotation::Up,
            budget: ROTATION_BUDGET,
        }
    }

    pub fn minos(&self) -> PieceShape {
        get_shape(self.shape, self.rotation)
    }

    pub fn rotation_budget(&self) -> u8 {
        self.budget
    }

    pub fn can_rotate(&self) -> bool {
        self.budget > 0
    }

    /// Record a successful rotation.
    pub fn spend_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
        self.budget = self.budget.saturating_sub(1);
    }

    /// Back to spawn orientation with a full budget (hold swap / respawn).
    pub fn reset(&mut self) {
        self.rotation = Rotation::Up;
        self.budget = ROTATION_BUDGET;
    }
}
