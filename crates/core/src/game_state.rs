//! Game state module - one player's board state machine
//!
//! Ties together the grid, bag, attack ledger and timers. A board plays one
//! of two roles:
//!
//! - **Authoritative**: driven by local input and [`GameState::tick`]. It
//!   runs gravity and lock delay, decides locks, owns the attack ledger's
//!   incoming queue and the garbage hole randomness, and emits every event
//!   the opponent needs to replay it.
//! - **Mirror**: a pure replay target for the opponent's authoritative
//!   board. It never ticks; it applies replicated actions, locks where told
//!   to, and raises exactly the garbage rows it was sent.
//!
//! Phases: `Idle → Falling → (Clearing) → Falling → … → GameOver`. Spawning
//! is instantaneous and happens inside the transition.

use arrayvec::ArrayVec;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::attack::{clear_label, AttackLedger};
use crate::bag::{Bag, Permutation};
use crate::board::Board;
use crate::error::EngineError;
use crate::event::{BoardEvent, LockReport};
use crate::pieces::{box_size, spawn_x, try_rotate, Piece, PieceShape};
use crate::snapshot::{ActiveSnapshot, GameSnapshot, PhaseView};
use crate::timers::{Gravity, LockDelay};
use crate::types::*;

/// Seed salt separating hole rolls from bag shuffles.
const HOLE_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Authoritative,
    Mirror,
}

impl Role {
    fn name(self) -> &'static str {
        match self {
            Role::Authoritative => "authoritative",
            Role::Mirror => "mirror",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Created, not started
    Idle,
    Falling,
    /// Cleared rows are fading; spawn is suspended
    Clearing { remaining_ms: u32 },
    GameOver,
}

/// Active falling piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tetromino {
    pub piece: Piece,
    pub x: i8,
    pub y: i8,
}

impl Tetromino {
    pub fn shape(&self) -> Shape {
        self.piece.shape
    }

    pub fn minos(&self) -> PieceShape {
        self.piece.minos()
    }
}

/// Complete state of one board
#[derive(Debug, Clone)]
pub struct GameState {
    role: Role,
    phase: Phase,
    board: Board,
    bag: Bag,
    active: Option<Tetromino>,
    hold: Option<Shape>,
    hold_available: bool,
    /// Last successful action on the active piece (T-spin detection)
    last_action: Option<Action>,
    /// The last successful rotation needed a kick
    kicked: bool,
    ledger: AttackLedger,
    gravity: Gravity,
    lock_delay: LockDelay,
    /// Milliseconds of simulated time, advanced in whole steps
    clock_ms: u64,
    /// Elapsed time not yet consumed by a whole step
    carry_ms: u32,
    clearing_rows: ArrayVec<usize, 4>,
    /// Garbage waiting to be raised, bottom row first
    staged_garbage: Vec<u8>,
    hole_rng: StdRng,
    /// A spawn found the mirror bag empty; retried when a bag arrives
    starved: bool,
    label: Option<String>,
    events: Vec<BoardEvent>,
}

impl GameState {
    /// A locally driven board starting from the agreed permutation.
    pub fn authoritative(first: Permutation, seed: u64) -> Self {
        Self::with_role(Role::Authoritative, Bag::authoritative(first, seed), seed)
    }

    /// A replay target for the opponent's board.
    pub fn mirror(first: Permutation) -> Self {
        Self::with_role(Role::Mirror, Bag::suspended(first), 0)
    }

    fn with_role(role: Role, bag: Bag, seed: u64) -> Self {
        Self {
            role,
            phase: Phase::Idle,
            board: Board::new(),
            bag,
            active: None,
            hold: None,
            hold_available: true,
            last_action: None,
            kicked: false,
            ledger: AttackLedger::new(),
            gravity: Gravity::new(),
            lock_delay: LockDelay::new(),
            clock_ms: 0,
            carry_ms: 0,
            clearing_rows: ArrayVec::new(),
            staged_garbage: Vec::new(),
            hole_rng: StdRng::seed_from_u64(seed ^ HOLE_SEED_SALT),
            starved: false,
            label: None,
            events: Vec::new(),
        }
    }

    /// Spawn the first piece. No-op unless idle.
    pub fn start(&mut self) {
        if self.phase != Phase::Idle {
            return;
        }
        self.phase = Phase::Falling;
        self.spawn();
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Direct grid access for staging positions in tests and benches.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn active(&self) -> Option<Tetromino> {
        self.active
    }

    pub fn hold_piece(&self) -> Option<Shape> {
        self.hold
    }

    pub fn can_hold(&self) -> bool {
        self.hold_available
    }

    pub fn ledger(&self) -> &AttackLedger {
        &self.ledger
    }

    pub fn gravity(&self) -> &Gravity {
        &self.gravity
    }

    pub fn lock_delay(&self) -> &LockDelay {
        &self.lock_delay
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn bag(&self) -> &Bag {
        &self.bag
    }

    /// Drain queued events in emission order.
    pub fn take_events(&mut self) -> Vec<BoardEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: BoardEvent) {
        self.events.push(event);
    }

    /// Replication events only come from the authoritative board.
    fn emit_replicated(&mut self, event: BoardEvent) {
        if self.role == Role::Authoritative {
            self.events.push(event);
        }
    }

    fn require(&self, role: Role) -> Result<(), EngineError> {
        if self.role == role {
            Ok(())
        } else {
            Err(EngineError::WrongRole {
                expected: role.name(),
            })
        }
    }

    fn fits(&self, minos: &[(i8, i8)], x: i8, y: i8) -> bool {
        !self.board.overlaps(minos, x, y)
    }

    /// Resting on the stack or the floor.
    pub fn is_grounded(&self) -> bool {
        self.active
            .is_some_and(|t| !self.fits(&t.minos(), t.x, t.y + 1))
    }

    /// Deepest row the active piece can drop to.
    pub fn ghost_y(&self) -> Option<i8> {
        let active = self.active?;
        let minos = active.minos();
        let mut y = active.y;
        while self.fits(&minos, active.x, y + 1) {
            y += 1;
        }
        Some(y)
    }

    // ---------------------------------------------------------------------
    // Spawning
    // ---------------------------------------------------------------------

    fn spawn(&mut self) {
        let Some(shape) = self.bag.draw() else {
            tracing::warn!(role = self.role.name(), "bag exhausted, waiting for the next permutation");
            self.starved = true;
            return;
        };
        self.starved = false;
        for bag in self.bag.take_generated() {
            self.emit_replicated(BoardEvent::NewBag(bag));
        }
        if self.place(Piece::new(shape)) {
            self.hold_available = true;
            self.gravity.reset();
        }
    }

    /// Put a piece at the spawn position, lifting it over a high stack by up
    /// to [`SPAWN_ALLOWANCE`] rows. Returns false on top-out.
    fn place(&mut self, piece: Piece) -> bool {
        let minos = piece.minos();
        let x = spawn_x(piece.shape);
        let mut y = SPAWN_ROW;
        for _ in 0..SPAWN_ALLOWANCE {
            if !self.fits(&minos, x, y + 2) {
                y -= 1;
            }
        }

        if !self.fits(&minos, x, y) {
            self.top_out();
            return false;
        }
        if !self.fits(&minos, x, y + 1) {
            // Blocked one row down: the piece is drawn into the stack where
            // it can be before the game ends.
            self.board.paint(&minos, x, y, Block::Mino(piece.shape));
            self.top_out();
            return false;
        }

        self.active = Some(Tetromino { piece, x, y });
        self.last_action = None;
        self.kicked = false;
        self.lock_delay.reset();
        self.emit(BoardEvent::Spawned(piece.shape));
        true
    }

    fn top_out(&mut self) {
        self.active = None;
        self.phase = Phase::GameOver;
        tracing::debug!(role = self.role.name(), "top out");
        self.emit(BoardEvent::GameOver);
    }

    // ---------------------------------------------------------------------
    // Actions
    // ---------------------------------------------------------------------

    /// Apply a discrete action; returns whether the board changed.
    ///
    /// Failed moves and rotations leave every field untouched. On the
    /// authoritative board a hard drop locks immediately; the mirror only
    /// moves to the ghost row and waits for the replicated lock.
    pub fn apply(&mut self, action: Action) -> bool {
        if self.phase != Phase::Falling || self.active.is_none() {
            return false;
        }
        let changed = match action {
            Action::MoveLeft => self.try_shift(-1, 0, action),
            Action::MoveRight => self.try_shift(1, 0, action),
            Action::SoftDrop | Action::Gravity => self.try_shift(0, 1, action),
            Action::RotateCw => self.try_rotate(Spin::Cw, action),
            Action::RotateCcw => self.try_rotate(Spin::Ccw, action),
            Action::HardDrop => return self.hard_drop(),
            Action::Hold => return self.hold(),
        };
        if changed {
            self.emit_replicated(BoardEvent::Action(action));
        }
        changed
    }

    fn try_shift(&mut self, dx: i8, dy: i8, action: Action) -> bool {
        let Some(mut active) = self.active else {
            return false;
        };
        if !self.fits(&active.minos(), active.x + dx, active.y + dy) {
            return false;
        }
        active.x += dx;
        active.y += dy;
        self.active = Some(active);
        self.last_action = Some(action);
        true
    }

    fn try_rotate(&mut self, spin: Spin, action: Action) -> bool {
        let Some(mut active) = self.active else {
            return false;
        };
        if !active.piece.can_rotate() {
            return false;
        }
        let board = &self.board;
        let Some(result) = try_rotate(
            active.piece.shape,
            active.piece.rotation,
            active.x,
            active.y,
            spin,
            |x, y| board.is_valid(x, y),
        ) else {
            return false;
        };

        active.piece.spend_rotation(result.rotation);
        active.x = result.x;
        active.y = result.y;
        self.active = Some(active);
        self.kicked = result.kicked;
        self.last_action = Some(action);
        if self.role == Role::Authoritative {
            self.lock_delay.touch(self.clock_ms);
        }
        true
    }

    fn hard_drop(&mut self) -> bool {
        let (Some(mut active), Some(ghost)) = (self.active, self.ghost_y()) else {
            return false;
        };
        active.y = ghost;
        self.active = Some(active);
        if self.role == Role::Authoritative {
            self.emit(BoardEvent::Action(Action::HardDrop));
            if let Err(err) = self.lock() {
                tracing::error!(%err, "hard drop lock rejected");
            }
        }
        true
    }

    /// Stash or swap the falling piece, once per spawn.
    fn hold(&mut self) -> bool {
        if !self.hold_available {
            return false;
        }
        let Some(active) = self.active.take() else {
            return false;
        };
        self.emit_replicated(BoardEvent::Action(Action::Hold));

        match self.hold.replace(active.piece.shape) {
            None => self.spawn(),
            Some(held) => {
                self.place(Piece::new(held));
            }
        }
        self.hold_available = false;
        true
    }

    // ---------------------------------------------------------------------
    // Locking
    // ---------------------------------------------------------------------

    fn corner_filled(&self, x: i8, y: i8) -> bool {
        !self.board.is_valid(x, y)
    }

    /// T-spin candidate: a T whose last action was a rotation with at least
    /// three bounding-box corners occupied.
    fn spin_candidate(&self, active: &Tetromino) -> bool {
        if active.shape() != Shape::T
            || !matches!(self.last_action, Some(Action::RotateCw | Action::RotateCcw))
        {
            return false;
        }
        let edge = box_size(Shape::T) - 1;
        let corners = [(0, 0), (edge, 0), (0, edge), (edge, edge)];
        corners
            .iter()
            .filter(|&&(cx, cy)| self.corner_filled(active.x + cx, active.y + cy))
            .count()
            >= 3
    }

    fn immobile(&self, active: &Tetromino) -> bool {
        let minos = active.minos();
        [(1, 0), (-1, 0), (0, 1), (0, -1)]
            .iter()
            .all(|&(dx, dy)| !self.fits(&minos, active.x + dx, active.y + dy))
    }

    fn lock(&mut self) -> Result<(), EngineError> {
        let active = self.active.ok_or(EngineError::NoFallingPiece)?;

        // Classification looks at the stack before the piece is painted.
        let spin = self.spin_candidate(&active);
        let immobile = self.immobile(&active);

        let mut board = self.board.clone();
        board.paint(&active.minos(), active.x, active.y, Block::Mino(active.shape()));
        let full = board.full_rows();
        let lines = full.len() as u32;
        let all_clear = board.is_all_clear();

        let kind = if !spin {
            ClearKind::Normal
        } else if (!immobile || self.kicked) && lines < 2 {
            ClearKind::TSpinMini
        } else {
            ClearKind::TSpin
        };

        let outcome = self.ledger.record_clear(lines, kind, all_clear)?;
        self.board = board;
        self.active = None;
        self.lock_delay.reset();

        let garbage = match self.role {
            Role::Authoritative => {
                if outcome.sent > 0 {
                    self.emit(BoardEvent::Attack(outcome.sent));
                }
                let batch = self.ledger.take_batch();
                let holes = self.roll_holes(&batch);
                if !holes.is_empty() {
                    self.emit(BoardEvent::GarbageRows(holes.clone()));
                }
                holes
            }
            Role::Mirror => std::mem::take(&mut self.staged_garbage),
        };

        self.label = clear_label(lines, kind, all_clear, outcome.back_to_back);
        self.emit(BoardEvent::Locked(LockReport {
            x: active.x,
            y: active.y,
            shape: active.shape(),
            lines,
            kind,
            all_clear,
            back_to_back: outcome.back_to_back,
            combo: outcome.combo,
            attack: outcome.total,
            label: self.label.clone(),
        }));

        if lines > 0 && self.role == Role::Authoritative {
            self.clearing_rows = full;
            self.staged_garbage = garbage;
            self.phase = Phase::Clearing {
                remaining_ms: LINE_CLEAR_DELAY_MS,
            };
            return Ok(());
        }

        for &row in &full {
            self.board.collapse_row(row);
        }
        self.board.push_garbage(&garbage);
        self.spawn();
        Ok(())
    }

    /// Hole columns for a batch of attacks, bottom row first.
    ///
    /// Each attack starts from a fresh column; every row then re-rolls it
    /// with a 25% chance. Later attacks are raised after earlier ones and
    /// so end up lower on the board.
    fn roll_holes(&mut self, batch: &[u32]) -> Vec<u8> {
        let mut rows: Vec<u8> = Vec::new();
        for &lines in batch {
            let mut hole = self.hole_rng.random_range(0..BOARD_WIDTH);
            let mut attack = Vec::with_capacity(lines as usize);
            for _ in 0..lines {
                if self.hole_rng.random_bool(GARBAGE_HOLE_SHIFT_CHANCE) {
                    hole = self.hole_rng.random_range(0..BOARD_WIDTH);
                }
                attack.push(hole);
            }
            attack.extend(rows);
            rows = attack;
        }
        rows
    }

    fn finish_clear(&mut self) {
        for &row in &self.clearing_rows {
            self.board.collapse_row(row);
        }
        self.clearing_rows.clear();
        let garbage = std::mem::take(&mut self.staged_garbage);
        self.board.push_garbage(&garbage);
        self.phase = Phase::Falling;
        self.spawn();
    }

    // ---------------------------------------------------------------------
    // Timers
    // ---------------------------------------------------------------------

    /// Advance the authoritative board's timers by `elapsed_ms`.
    ///
    /// Time is consumed in whole [`TICK_MS`] steps; the remainder carries
    /// over to the next call. Each step runs gravity, then the lock-delay
    /// support probe, then due lock checks, then the clear delay. The mirror
    /// never ticks.
    pub fn tick(&mut self, elapsed_ms: u32) {
        if self.role != Role::Authoritative {
            return;
        }
        self.carry_ms += elapsed_ms;
        while self.carry_ms >= TICK_MS {
            self.carry_ms -= TICK_MS;
            self.clock_ms += u64::from(TICK_MS);
            self.step();
        }
    }

    fn step(&mut self) {
        match self.phase {
            Phase::Falling if self.active.is_some() => {
                if self.gravity.due() && self.try_shift(0, 1, Action::Gravity) {
                    self.emit(BoardEvent::Action(Action::Gravity));
                }
                let grounded = self.is_grounded();
                self.gravity.set_support(grounded);
                self.gravity.advance();

                self.lock_delay.step(self.clock_ms, grounded);
                if self.lock_delay.due(self.clock_ms) {
                    if let Err(err) = self.lock() {
                        tracing::error!(%err, "lock check rejected");
                    }
                }
            }
            Phase::Clearing { remaining_ms } => {
                let remaining_ms = remaining_ms.saturating_sub(TICK_MS);
                if remaining_ms == 0 {
                    self.finish_clear();
                } else {
                    self.phase = Phase::Clearing { remaining_ms };
                }
            }
            _ => {}
        }
    }

    /// Suspend gravity while a DAS repeat is in flight.
    pub fn pause_gravity(&mut self) {
        if !self.gravity.is_paused() {
            self.gravity.pause();
            self.emit_replicated(BoardEvent::GravityPaused);
        }
    }

    pub fn resume_gravity(&mut self) {
        if self.gravity.is_paused() {
            self.gravity.resume();
            self.emit_replicated(BoardEvent::GravityResumed);
        }
    }

    // ---------------------------------------------------------------------
    // Replication inputs
    // ---------------------------------------------------------------------

    /// Queue an opponent attack on the authoritative board.
    pub fn receive_attack(&mut self, lines: u32) -> Result<(), EngineError> {
        self.require(Role::Authoritative)?;
        self.ledger.receive(lines);
        Ok(())
    }

    /// Lock the mirror's falling piece at the replicated position.
    pub fn mirror_lock(&mut self, x: i8, y: i8) -> Result<(), EngineError> {
        self.require(Role::Mirror)?;
        let mut active = self.active.ok_or(EngineError::NoFallingPiece)?;
        if !self.fits(&active.minos(), x, y) {
            return Err(EngineError::IllegalLock { x, y });
        }
        active.x = x;
        active.y = y;
        self.active = Some(active);
        self.lock()
    }

    /// Feed a replicated permutation into the mirror bag.
    pub fn mirror_add_bag(&mut self, bag: Permutation) -> Result<(), EngineError> {
        self.require(Role::Mirror)?;
        self.bag.add_bag(bag);
        if self.starved && self.phase == Phase::Falling && self.active.is_none() {
            self.spawn();
        }
        Ok(())
    }

    /// Stage replicated garbage rows (bottom first) for the next mirror lock.
    pub fn mirror_garbage(&mut self, holes: &[u8]) -> Result<(), EngineError> {
        self.require(Role::Mirror)?;
        let mut rows = holes.to_vec();
        rows.append(&mut self.staged_garbage);
        self.staged_garbage = rows;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------------

    pub fn snapshot_into(&self, out: &mut GameSnapshot) {
        for (y, row) in out.board.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = self.board.get(x as i8, y as i8).flatten();
            }
        }
        out.phase = match self.phase {
            Phase::Idle => PhaseView::Idle,
            Phase::Falling => PhaseView::Falling,
            Phase::Clearing { .. } => PhaseView::Clearing,
            Phase::GameOver => PhaseView::GameOver,
        };
        out.active = self.active.map(|t| ActiveSnapshot {
            shape: t.piece.shape,
            rotation: t.piece.rotation,
            x: t.x,
            y: t.y,
        });
        out.ghost_y = self.ghost_y();
        out.hold = self.hold;
        out.can_hold = self.hold_available;
        for (i, slot) in out.next.iter_mut().enumerate() {
            *slot = self.bag.peek(i);
        }
        out.clearing_rows = self.clearing_rows.clone();
        out.incoming = self.ledger.incoming_total();
        out.meter = self.ledger.incoming_meter();
        out.combo = self.ledger.combo();
        out.back_to_back = self.ledger.back_to_back();
        out.lines_sent = self.ledger.lines_sent();
        out.gravity_paused = self.gravity.is_paused();
        out.label = self.label.clone();
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let mut snap = GameSnapshot::empty();
        self.snapshot_into(&mut snap);
        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAG: Permutation = [
        Shape::T,
        Shape::I,
        Shape::O,
        Shape::J,
        Shape::L,
        Shape::S,
        Shape::Z,
    ];

    fn started() -> GameState {
        let mut game = GameState::authoritative(BAG, 7);
        game.start();
        game
    }

    fn with_active(game: &mut GameState, shape: Shape, rotation: Rotation, x: i8, y: i8) {
        let mut piece = Piece::new(shape);
        piece.rotation = rotation;
        game.active = Some(Tetromino { piece, x, y });
        game.phase = Phase::Falling;
    }

    fn filled_cells(board: &Board) -> Vec<(i8, i8)> {
        let mut out = Vec::new();
        for y in 0..BOARD_HEIGHT as i8 {
            for x in 0..BOARD_WIDTH as i8 {
                if board.get(x, y).flatten().is_some() {
                    out.push((x, y));
                }
            }
        }
        out
    }

    #[test]
    fn test_start_spawns_first_piece() {
        let mut game = started();
        let active = game.active().unwrap();
        assert_eq!(active.shape(), Shape::T);
        assert_eq!((active.x, active.y), (3, 20));
        assert_eq!(game.phase(), Phase::Falling);

        let events = game.take_events();
        assert!(matches!(events[0], BoardEvent::NewBag(_)));
        assert_eq!(events[1], BoardEvent::Spawned(Shape::T));
    }

    #[test]
    fn test_spawn_lifts_over_stack() {
        let mut game = GameState::authoritative(BAG, 1);
        // Rows 22 and 23 filled except the left wall column
        for y in 22..24 {
            for x in 1..10 {
                game.board.set(x, y, Some(Block::Garbage));
            }
        }
        game.start();
        let active = game.active().unwrap();
        assert!(active.y < 20);
        assert!(!game.board.overlaps(&active.minos(), active.x, active.y));
    }

    #[test]
    fn test_spawn_overlap_is_game_over() {
        let mut game = GameState::authoritative(BAG, 1);
        for y in 14..40 {
            for x in 0..10 {
                game.board.set(x, y, Some(Block::Garbage));
            }
        }
        game.start();
        assert!(game.is_game_over());
        assert!(game.active().is_none());
        assert!(game.take_events().contains(&BoardEvent::GameOver));
    }

    #[test]
    fn test_spawn_blocked_below_paints_then_ends() {
        let mut game = GameState::authoritative(BAG, 1);
        // T at allowance-lifted y=17 fits but cannot move down one row.
        for y in 19..40 {
            for x in 0..10 {
                game.board.set(x, y, Some(Block::Garbage));
            }
        }
        let before = game.board.filled_count();
        game.start();
        assert!(game.is_game_over());
        assert_eq!(game.board.filled_count(), before + 4);
    }

    #[test]
    fn test_move_rejected_at_wall() {
        let mut game = started();
        with_active(&mut game, Shape::O, Rotation::Up, 0, 20);
        game.take_events();
        assert!(!game.apply(Action::MoveLeft));
        assert_eq!(game.active().unwrap().x, 0);
        assert!(game.take_events().is_empty());

        assert!(game.apply(Action::MoveRight));
        assert_eq!(game.take_events(), vec![BoardEvent::Action(Action::MoveRight)]);
    }

    #[test]
    fn test_failed_rotation_leaves_state_unchanged() {
        let mut game = started();
        // Box a T in so every candidate overlaps.
        for y in 30..40 {
            for x in 0..10 {
                game.board.set(x, y, Some(Block::Garbage));
            }
        }
        for x in [3, 4, 5] {
            game.board.set(x, 31, None);
        }
        game.board.set(4, 30, None);
        with_active(&mut game, Shape::T, Rotation::Up, 3, 30);
        let before_board = game.board.clone();
        let before_active = game.active();
        game.take_events();

        assert!(!game.apply(Action::RotateCw));
        assert!(!game.apply(Action::RotateCcw));
        assert_eq!(game.board, before_board);
        assert_eq!(game.active(), before_active);
        assert!(game.take_events().is_empty());
    }

    #[test]
    fn test_rotation_budget_stops_rotation() {
        let mut game = started();
        for _ in 0..ROTATION_BUDGET {
            assert!(game.apply(Action::RotateCw));
        }
        assert!(!game.apply(Action::RotateCw));
    }

    #[test]
    fn test_hold_gate() {
        let mut game = started();
        assert!(game.apply(Action::Hold));
        assert_eq!(game.hold_piece(), Some(Shape::T));
        assert_eq!(game.active().unwrap().shape(), Shape::I);

        let board = game.board.clone();
        let active = game.active();
        assert!(!game.apply(Action::Hold));
        assert_eq!(game.hold_piece(), Some(Shape::T));
        assert_eq!(game.active(), active);
        assert_eq!(game.board, board);
    }

    #[test]
    fn test_hold_swap_resets_orientation_and_budget() {
        let mut game = started();
        game.apply(Action::Hold);
        game.apply(Action::HardDrop);
        assert!(game.can_hold());
        game.apply(Action::RotateCw);
        assert!(game.apply(Action::Hold));

        let active = game.active().unwrap();
        assert_eq!(active.shape(), Shape::T);
        assert_eq!(active.piece.rotation, Rotation::Up);
        assert_eq!(active.piece.rotation_budget(), ROTATION_BUDGET);
        assert_eq!((active.x, active.y), (3, 20));
        assert_eq!(game.hold_piece(), Some(Shape::O));
    }

    #[test]
    fn test_lock_is_union_of_stack_and_piece() {
        let mut game = started();
        game.board = Board::from_ascii(&["##.#######", "#.########"]);
        with_active(&mut game, Shape::I, Rotation::Right, 0, 30);
        let before = filled_cells(&game.board);
        let piece = game.active().unwrap();
        let ghost = game.ghost_y().unwrap();
        let expected: Vec<(i8, i8)> =
            piece.minos().iter().map(|&(mx, my)| (piece.x + mx, ghost + my)).collect();

        game.apply(Action::HardDrop);

        let after = filled_cells(&game.board);
        for cell in before.iter().chain(expected.iter()) {
            assert!(after.contains(cell), "missing {cell:?}");
        }
        assert_eq!(after.len(), before.len() + 4);
    }

    #[test]
    fn test_hard_drop_clears_after_delay() {
        let mut game = started();
        game.board = Board::from_ascii(&["####...###"]);
        game.take_events();
        with_active(&mut game, Shape::T, Rotation::Up, 4, 30);
        game.apply(Action::HardDrop);

        assert!(matches!(game.phase(), Phase::Clearing { .. }));
        assert!(game.active().is_none());
        let events = game.take_events();
        let report = events
            .iter()
            .find_map(|e| match e {
                BoardEvent::Locked(r) => Some(r.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(report.lines, 1);
        assert_eq!(report.label.as_deref(), Some("Single"));

        game.tick(LINE_CLEAR_DELAY_MS - TICK_MS);
        assert!(game.active().is_none());
        game.tick(TICK_MS);
        assert_eq!(game.phase(), Phase::Falling);
        assert!(game.active().is_some());
        assert_eq!(game.board.filled_count(), 1);
    }

    #[test]
    fn test_t_spin_double() {
        let mut game = started();
        game.board = Board::from_ascii(&["...#......", "###...####", "####.#####"]);
        with_active(&mut game, Shape::T, Rotation::Down, 3, 37);
        game.last_action = Some(Action::RotateCw);
        game.take_events();

        game.apply(Action::HardDrop);
        let report = game
            .take_events()
            .into_iter()
            .find_map(|e| match e {
                BoardEvent::Locked(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(report.lines, 2);
        assert_eq!(report.kind, ClearKind::TSpin);
        assert_eq!(report.attack, 4);
        assert_eq!(report.label.as_deref(), Some("T-spin double"));
    }

    #[test]
    fn test_three_corner_spin_without_lines() {
        let mut game = started();
        // Corners (3,37), (5,37), (3,39) filled; (5,39) empty.
        game.board = Board::from_ascii(&["...#.#....", "..........", "...#......"]);
        with_active(&mut game, Shape::T, Rotation::Down, 3, 37);
        game.last_action = Some(Action::RotateCcw);
        game.take_events();

        game.apply(Action::HardDrop);
        let events = game.take_events();
        let report = events
            .iter()
            .find_map(|e| match e {
                BoardEvent::Locked(r) => Some(r.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(report.lines, 0);
        assert_ne!(report.kind, ClearKind::Normal);
        assert!(report.attack >= 1);
        assert!(events.contains(&BoardEvent::Attack(report.attack)));
    }

    fn locked_report(game: &mut GameState) -> LockReport {
        game.take_events()
            .into_iter()
            .find_map(|e| match e {
                BoardEvent::Locked(r) => Some(r),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_kicked_spin_single_is_mini() {
        let mut game = started();
        game.board = Board::from_ascii(&["..#.......", "...#######"]);
        // Right-facing T against the wall; the plain Up form and the first
        // kick both collide, the (1,-1) kick drops it into the slot.
        with_active(&mut game, Shape::T, Rotation::Right, -1, 37);
        game.take_events();

        assert!(game.apply(Action::RotateCcw));
        let active = game.active().unwrap();
        assert_eq!((active.x, active.y), (0, 38));
        assert_eq!(active.piece.rotation, Rotation::Up);
        assert!(game.kicked);

        game.apply(Action::HardDrop);
        let report = locked_report(&mut game);
        assert_eq!(report.lines, 1);
        assert_eq!(report.kind, ClearKind::TSpinMini);
        assert_eq!(report.label.as_deref(), Some("T-spin mini single"));
    }

    #[test]
    fn test_immobile_unkicked_spin_single_is_full() {
        let mut game = started();
        game.board = Board::from_ascii(&["..#.......", "...#######"]);
        // Same slot, reached without a kick: wall, floor and (2,38) pin it.
        with_active(&mut game, Shape::T, Rotation::Up, 0, 38);
        game.last_action = Some(Action::RotateCw);
        game.kicked = false;
        game.take_events();

        game.apply(Action::HardDrop);
        let report = locked_report(&mut game);
        assert_eq!(report.lines, 1);
        assert_eq!(report.kind, ClearKind::TSpin);
        assert!(report.attack > 0);
        assert_eq!(report.label.as_deref(), Some("T-spin single"));
    }

    #[test]
    fn test_no_spin_without_rotation() {
        let mut game = started();
        game.board = Board::from_ascii(&["...#.#....", "..........", "...#......"]);
        with_active(&mut game, Shape::T, Rotation::Down, 3, 37);
        game.last_action = Some(Action::MoveLeft);
        game.apply(Action::HardDrop);
        let report = game
            .take_events()
            .into_iter()
            .find_map(|e| match e {
                BoardEvent::Locked(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(report.kind, ClearKind::Normal);
        assert_eq!(report.attack, 0);
    }

    #[test]
    fn test_gravity_falls_once_per_second() {
        let mut game = started();
        let y = game.active().unwrap().y;
        game.take_events();
        game.tick(990);
        assert_eq!(game.active().unwrap().y, y);
        game.tick(10);
        assert_eq!(game.active().unwrap().y, y + 1);
        assert_eq!(game.take_events(), vec![BoardEvent::Action(Action::Gravity)]);
    }

    #[test]
    fn test_paused_gravity_holds_piece() {
        let mut game = started();
        let y = game.active().unwrap().y;
        game.take_events();
        game.pause_gravity();
        game.tick(3000);
        assert_eq!(game.active().unwrap().y, y);
        game.resume_gravity();
        assert_eq!(
            game.take_events(),
            vec![BoardEvent::GravityPaused, BoardEvent::GravityResumed]
        );
    }

    #[test]
    fn test_lock_delay_locks_grounded_piece() {
        let mut game = started();
        with_active(&mut game, Shape::O, Rotation::Up, 4, 38);
        game.lock_delay.reset();
        game.tick(TICK_MS);
        assert_eq!(game.lock_delay().touches(), 1);
        game.tick(LOCK_DELAY_MS - TICK_MS);
        assert_eq!(game.active().unwrap().shape(), Shape::O);
        game.tick(TICK_MS);
        assert_ne!(game.active().map(|a| a.shape()), Some(Shape::O));
        assert_eq!(game.board.filled_count(), 4);
    }

    #[test]
    fn test_rotation_resets_lock_delay() {
        let mut game = started();
        with_active(&mut game, Shape::T, Rotation::Up, 3, 38);
        game.lock_delay.reset();
        game.tick(400);
        assert!(game.apply(Action::RotateCw));
        game.tick(400);
        assert!(game.active().is_some());
        assert_eq!(game.board.filled_count(), 0);
    }

    #[test]
    fn test_received_attack_raises_garbage_after_lock() {
        let mut game = started();
        game.receive_attack(2).unwrap();
        game.take_events();
        game.apply(Action::HardDrop);

        let events = game.take_events();
        let holes = events
            .iter()
            .find_map(|e| match e {
                BoardEvent::GarbageRows(h) => Some(h.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(holes.len(), 2);
        let gr = events.iter().position(|e| matches!(e, BoardEvent::GarbageRows(_)));
        let lock = events.iter().position(|e| matches!(e, BoardEvent::Locked(_)));
        assert!(gr < lock);

        assert!(!game.board.is_row_empty(39));
        assert_eq!(game.board.get(holes[0] as i8, 39), Some(None));
        assert_eq!(game.ledger().incoming_total(), 0);
    }

    #[test]
    fn test_mirror_replays_lock_and_garbage() {
        let mut auth = GameState::authoritative(BAG, 3);
        let mut mirror = GameState::mirror(BAG);
        auth.receive_attack(3).unwrap();
        auth.start();
        mirror.start();

        for event in auth.take_events() {
            if let BoardEvent::NewBag(bag) = event {
                mirror.mirror_add_bag(bag).unwrap();
            }
        }

        auth.apply(Action::MoveLeft);
        auth.apply(Action::RotateCw);
        auth.apply(Action::HardDrop);
        for event in auth.take_events() {
            match event {
                BoardEvent::Action(Action::HardDrop) => {}
                BoardEvent::Action(action) => {
                    mirror.apply(action);
                }
                BoardEvent::GarbageRows(holes) => mirror.mirror_garbage(&holes).unwrap(),
                BoardEvent::Locked(report) => mirror.mirror_lock(report.x, report.y).unwrap(),
                BoardEvent::NewBag(bag) => mirror.mirror_add_bag(bag).unwrap(),
                _ => {}
            }
        }

        assert_eq!(mirror.board(), auth.board());
        assert_eq!(
            mirror.active().map(|a| a.shape()),
            auth.active().map(|a| a.shape())
        );
    }

    #[test]
    fn test_role_checks() {
        let mut auth = GameState::authoritative(BAG, 1);
        let mut mirror = GameState::mirror(BAG);
        assert!(matches!(auth.mirror_lock(0, 0), Err(EngineError::WrongRole { .. })));
        assert!(matches!(mirror.receive_attack(1), Err(EngineError::WrongRole { .. })));
        mirror.start();
        assert_eq!(
            mirror.mirror_lock(-5, 0),
            Err(EngineError::IllegalLock { x: -5, y: 0 })
        );
    }

    #[test]
    fn test_mirror_lock_rejects_overlap() {
        let mut mirror = GameState::mirror(BAG);
        mirror.board = Board::from_ascii(&["##########"]);
        mirror.start();
        let before_board = mirror.board.clone();
        let before_active = mirror.active();

        // T Up at (3, 38) puts its bottom row on the filled row 39.
        assert_eq!(
            mirror.mirror_lock(3, 38),
            Err(EngineError::IllegalLock { x: 3, y: 38 })
        );
        assert_eq!(mirror.board, before_board);
        assert_eq!(mirror.active(), before_active);
    }

    #[test]
    fn test_mirror_never_ticks() {
        let mut mirror = GameState::mirror(BAG);
        mirror.start();
        let y = mirror.active().unwrap().y;
        mirror.tick(5000);
        assert_eq!(mirror.active().unwrap().y, y);
        assert!(mirror.take_events().iter().all(|e| !e.is_replicated()));
    }

    #[test]
    fn test_snapshot_reports_preview_and_ghost() {
        let game = started();
        let snap = game.snapshot();
        assert_eq!(snap.phase, PhaseView::Falling);
        assert_eq!(snap.next[0], Some(Shape::I));
        assert_eq!(snap.ghost_y, Some(38));
        assert!(snap.playable());
    }
}
