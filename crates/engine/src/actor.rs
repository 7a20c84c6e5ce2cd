//! Board actor - one serialized executor per board
//!
//! Input, timers and network replay never touch a [`GameState`] directly.
//! They enqueue [`Intent`]s on a [`BoardHandle`]; the actor task applies
//! them strictly in arrival order, forwards the board's events and
//! publishes a fresh snapshot after every batch. Only the authoritative
//! board gets a tick source.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use battle_tetris_core::bag::Permutation;
use battle_tetris_core::{BoardEvent, GameSnapshot, GameState, Role};
use battle_tetris_types::{Action, TICK_MS};

/// Which of the two boards of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Mine,
    Theirs,
}

/// A request to mutate one board
#[derive(Debug, Clone)]
pub enum Intent {
    /// Advance the board's timers.
    Tick(u32),
    Apply(Action),
    PauseGravity,
    ResumeGravity,
    ReceiveAttack(u32),
    MirrorLock { x: i8, y: i8 },
    MirrorBag(Permutation),
    MirrorGarbage(Vec<u8>),
    /// Start the current board (spawn its first piece).
    Start,
    /// Freeze the board until the next reset; replication still applies.
    Halt,
    /// Discard the board and all its timers for a new round.
    Reset(Box<GameState>),
}

// Reset carries a whole board and never compares equal.
impl PartialEq for Intent {
    fn eq(&self, other: &Self) -> bool {
        use Intent::*;
        match (self, other) {
            (Tick(a), Tick(b)) => a == b,
            (Apply(a), Apply(b)) => a == b,
            (PauseGravity, PauseGravity) | (ResumeGravity, ResumeGravity) => true,
            (ReceiveAttack(a), ReceiveAttack(b)) => a == b,
            (MirrorLock { x: ax, y: ay }, MirrorLock { x: bx, y: by }) => ax == bx && ay == by,
            (MirrorBag(a), MirrorBag(b)) => a == b,
            (MirrorGarbage(a), MirrorGarbage(b)) => a == b,
            (Start, Start) | (Halt, Halt) => true,
            _ => false,
        }
    }
}

/// Cheap cloneable sender into one board actor
#[derive(Debug, Clone)]
pub struct BoardHandle {
    side: Side,
    tx: mpsc::UnboundedSender<Intent>,
    snapshot: watch::Receiver<GameSnapshot>,
}

impl BoardHandle {
    /// Spawn an actor owning `state`; its events go to `events` tagged
    /// with `side`.
    pub fn spawn(
        side: Side,
        state: GameState,
        events: mpsc::UnboundedSender<(Side, BoardEvent)>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snap_tx, snap_rx) = watch::channel(state.snapshot());
        let actor = BoardActor {
            side,
            state,
            halted: false,
            events,
            snapshot: snap_tx,
        };
        let task = tokio::spawn(actor.run(rx));
        (
            Self {
                side,
                tx,
                snapshot: snap_rx,
            },
            task,
        )
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Enqueue an intent; false once the actor has stopped.
    pub fn send(&self, intent: Intent) -> bool {
        self.tx.send(intent).is_ok()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> GameSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GameSnapshot> {
        self.snapshot.clone()
    }
}

struct BoardActor {
    side: Side,
    state: GameState,
    halted: bool,
    events: mpsc::UnboundedSender<(Side, BoardEvent)>,
    snapshot: watch::Sender<GameSnapshot>,
}

impl BoardActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Intent>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(u64::from(TICK_MS)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                intent = rx.recv() => {
                    let Some(intent) = intent else { break };
                    self.handle(intent);
                    while let Ok(intent) = rx.try_recv() {
                        self.handle(intent);
                    }
                }
                _ = ticker.tick(), if self.ticking() => {
                    self.state.tick(TICK_MS);
                }
            }
            self.flush();
        }
        tracing::debug!(side = ?self.side, "board actor stopped");
    }

    fn ticking(&self) -> bool {
        !self.halted && self.state.role() == Role::Authoritative
    }

    fn handle(&mut self, intent: Intent) {
        if self.halted && matches!(intent, Intent::Tick(_) | Intent::Apply(_) | Intent::Start) {
            return;
        }
        let result = match intent {
            Intent::Tick(ms) => {
                self.state.tick(ms);
                Ok(())
            }
            Intent::Apply(action) => {
                self.state.apply(action);
                Ok(())
            }
            Intent::PauseGravity => {
                self.state.pause_gravity();
                Ok(())
            }
            Intent::ResumeGravity => {
                self.state.resume_gravity();
                Ok(())
            }
            Intent::ReceiveAttack(lines) => self.state.receive_attack(lines),
            Intent::MirrorLock { x, y } => self.state.mirror_lock(x, y),
            Intent::MirrorBag(bag) => self.state.mirror_add_bag(bag),
            Intent::MirrorGarbage(holes) => self.state.mirror_garbage(&holes),
            Intent::Start => {
                self.state.start();
                Ok(())
            }
            Intent::Halt => {
                self.halted = true;
                Ok(())
            }
            Intent::Reset(state) => {
                self.state = *state;
                self.halted = false;
                Ok(())
            }
        };
        if let Err(err) = result {
            tracing::warn!(side = ?self.side, %err, "intent rejected");
        }
    }

    fn flush(&mut self) {
        for event in self.state.take_events() {
            let _ = self.events.send((self.side, event));
        }
        let state = &self.state;
        self.snapshot.send_modify(|snap| state.snapshot_into(snap));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_tetris_core::bag::parse_bag;
    use battle_tetris_core::PhaseView;

    fn bag() -> Permutation {
        parse_bag("TIOJLSZ").unwrap()
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<(Side, BoardEvent)>) -> Vec<BoardEvent> {
        let mut out = Vec::new();
        while let Ok(Some((_, event))) =
            tokio::time::timeout(Duration::from_millis(50), rx.recv()).await
        {
            out.push(event);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_intents_apply_in_order() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (handle, _task) = BoardHandle::spawn(Side::Mine, GameState::authoritative(bag(), 1), events_tx);

        handle.send(Intent::Start);
        handle.send(Intent::Apply(Action::MoveLeft));
        handle.send(Intent::Apply(Action::MoveLeft));
        let events = drain(&mut events_rx).await;

        let moves: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, BoardEvent::Action(_)))
            .collect();
        assert_eq!(
            moves[..2],
            [
                &BoardEvent::Action(Action::MoveLeft),
                &BoardEvent::Action(Action::MoveLeft)
            ]
        );
        assert_eq!(handle.snapshot().phase, PhaseView::Falling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authoritative_board_falls_on_its_own() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (handle, _task) = BoardHandle::spawn(Side::Mine, GameState::authoritative(bag(), 1), events_tx);
        handle.send(Intent::Start);
        let start_y = {
            drain(&mut events_rx).await;
            handle.snapshot().active.map(|a| a.y)
        };

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let events = drain(&mut events_rx).await;
        assert!(events.contains(&BoardEvent::Action(Action::Gravity)));
        assert!(handle.snapshot().active.map(|a| a.y) > start_y);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mirror_never_ticks() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (handle, _task) = BoardHandle::spawn(Side::Theirs, GameState::mirror(bag()), events_tx);
        handle.send(Intent::Start);
        drain(&mut events_rx).await;
        let before = handle.snapshot();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(drain(&mut events_rx).await.is_empty());
        assert_eq!(handle.snapshot().active, before.active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_replaces_board() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (handle, _task) = BoardHandle::spawn(Side::Mine, GameState::authoritative(bag(), 1), events_tx);
        handle.send(Intent::Start);
        handle.send(Intent::Apply(Action::HardDrop));
        drain(&mut events_rx).await;

        handle.send(Intent::Reset(Box::new(GameState::authoritative(bag(), 2))));
        drain(&mut events_rx).await;
        let snap = handle.snapshot();
        assert_eq!(snap.phase, PhaseView::Idle);
        assert!(snap.board.iter().flatten().all(|cell| cell.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_freezes_board() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (handle, _task) = BoardHandle::spawn(Side::Mine, GameState::authoritative(bag(), 1), events_tx);
        handle.send(Intent::Start);
        handle.send(Intent::Halt);
        handle.send(Intent::Apply(Action::MoveLeft));
        drain(&mut events_rx).await;
        let before = handle.snapshot();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(drain(&mut events_rx).await.is_empty());
        assert_eq!(handle.snapshot().active, before.active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_role_intent_is_ignored() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (handle, _task) = BoardHandle::spawn(Side::Theirs, GameState::mirror(bag()), events_tx);
        handle.send(Intent::Start);
        handle.send(Intent::ReceiveAttack(3));
        drain(&mut events_rx).await;
        assert_eq!(handle.snapshot().incoming, 0);
        assert!(handle.send(Intent::Apply(Action::MoveRight)));
    }
}
