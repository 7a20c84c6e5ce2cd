//! Board module - the locked-cell grid
//!
//! A 10x40 grid stored as a flat row-major array. Rows 0..20 are the spawn
//! buffer above the visible field. Coordinates are `(x, y)` with `x` growing
//! right and `y` growing down; anything outside the grid counts as filled
//! for collision purposes.

use arrayvec::ArrayVec;

use crate::pieces::MinoOffset;
use crate::types::{Block, Cell, BOARD_HEIGHT, BOARD_WIDTH};

/// Total number of cells on the board
const BOARD_SIZE: usize = (BOARD_WIDTH as usize) * (BOARD_HEIGHT as usize);

const WIDTH: usize = BOARD_WIDTH as usize;
const HEIGHT: usize = BOARD_HEIGHT as usize;

/// The locked-cell grid
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    /// Flat array of cells, row-major order (y * WIDTH + x)
    cells: [Cell; BOARD_SIZE],
}

impl Board {
    /// Create a new empty board
    pub fn new() -> Self {
        Self {
            cells: [None; BOARD_SIZE],
        }
    }

    #[inline(always)]
    fn index(x: i8, y: i8) -> Option<usize> {
        if x < 0 || x >= BOARD_WIDTH as i8 || y < 0 || y >= BOARD_HEIGHT as i8 {
            return None;
        }
        Some((y as usize) * WIDTH + (x as usize))
    }

    pub fn width(&self) -> u8 {
        BOARD_WIDTH
    }

    pub fn height(&self) -> u8 {
        BOARD_HEIGHT
    }

    /// Get cell at position (x, y); `None` if out of bounds
    pub fn get(&self, x: i8, y: i8) -> Option<Cell> {
        Self::index(x, y).map(|idx| self.cells[idx])
    }

    /// Set cell at position (x, y); returns false if out of bounds
    pub fn set(&mut self, x: i8, y: i8, cell: Cell) -> bool {
        match Self::index(x, y) {
            Some(idx) => {
                self.cells[idx] = cell;
                true
            }
            None => false,
        }
    }

    /// In bounds and empty
    pub fn is_valid(&self, x: i8, y: i8) -> bool {
        matches!(self.get(x, y), Some(None))
    }

    /// Whether any mino of `minos` placed at origin `(x, y)` hits a wall,
    /// the floor, or a locked cell.
    pub fn overlaps(&self, minos: &[MinoOffset], x: i8, y: i8) -> bool {
        minos.iter().any(|&(mx, my)| !self.is_valid(x + mx, y + my))
    }

    /// Paint `minos` at `(x, y)` wherever the target cell is empty.
    ///
    /// Cells that are already filled or out of bounds are left alone, so a
    /// lock can never overwrite an existing mino. Returns how many cells
    /// were painted.
    pub fn paint(&mut self, minos: &[MinoOffset], x: i8, y: i8, block: Block) -> usize {
        let mut painted = 0;
        for &(mx, my) in minos {
            if self.is_valid(x + mx, y + my) {
                self.set(x + mx, y + my, Some(block));
                painted += 1;
            }
        }
        painted
    }

    pub fn is_row_full(&self, y: usize) -> bool {
        self.row(y).is_some_and(|row| row.iter().all(Option::is_some))
    }

    pub fn is_row_empty(&self, y: usize) -> bool {
        self.row(y).is_some_and(|row| row.iter().all(Option::is_none))
    }

    fn row(&self, y: usize) -> Option<&[Cell]> {
        if y >= HEIGHT {
            return None;
        }
        Some(&self.cells[y * WIDTH..(y + 1) * WIDTH])
    }

    /// Indices of full rows, top to bottom. A single lock spans at most four
    /// rows, so at most four entries are reported.
    pub fn full_rows(&self) -> ArrayVec<usize, 4> {
        let mut rows = ArrayVec::new();
        for y in (0..HEIGHT).filter(|&y| self.is_row_full(y)) {
            if rows.try_push(y).is_err() {
                break;
            }
        }
        rows
    }

    /// Every row is either completely empty or completely filled.
    pub fn is_all_clear(&self) -> bool {
        (0..HEIGHT).all(|y| self.is_row_empty(y) || self.is_row_full(y))
    }

    pub fn empty_row(&mut self, y: usize) {
        if y < HEIGHT {
            self.cells[y * WIDTH..(y + 1) * WIDTH].fill(None);
        }
    }

    /// Remove row `y`: everything above shifts down one row and the top row
    /// becomes empty.
    pub fn collapse_row(&mut self, y: usize) {
        if y >= HEIGHT {
            return;
        }
        // copy_within handles the overlapping ranges
        self.cells.copy_within(0..y * WIDTH, WIDTH);
        self.empty_row(0);
    }

    /// Raise the stack and fill the bottom rows with garbage.
    ///
    /// `holes[0]` is the hole column of the bottom row, `holes[1]` the row
    /// above it, and so on. Rows pushed past the top are discarded.
    pub fn push_garbage(&mut self, holes: &[u8]) {
        let n = holes.len().min(HEIGHT);
        if n == 0 {
            return;
        }
        self.cells.copy_within(n * WIDTH.., 0);
        for (i, &hole) in holes.iter().take(n).enumerate() {
            let y = HEIGHT - 1 - i;
            for x in 0..WIDTH {
                self.cells[y * WIDTH + x] = if x == hole as usize {
                    None
                } else {
                    Some(Block::Garbage)
                };
            }
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    /// Build a board from ASCII rows aligned to the bottom of the grid.
    ///
    /// `#` is a garbage block, a shape letter is a locked mino of that shape,
    /// anything else is empty. Used by tests and benches to stage positions.
    pub fn from_ascii(rows: &[&str]) -> Self {
        let mut board = Self::new();
        let top = HEIGHT.saturating_sub(rows.len());
        for (i, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().take(WIDTH).enumerate() {
                let cell = match c {
                    '#' => Some(Block::Garbage),
                    _ => crate::types::Shape::from_char(c)
                        .filter(|_| c.is_ascii_uppercase())
                        .map(Block::Mino),
                };
                board.set(x as i8, (top + i) as i8, cell);
            }
        }
        board
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
