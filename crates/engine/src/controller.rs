//! Match controller - the session state machine
//!
//! Pure and synchronous: every input (relay message, board event, local
//! intent, expired timer) returns the list of [`Effect`]s the session must
//! carry out, in order. The controller never owns a socket, a board or a
//! clock, which keeps every transition unit-testable.
//!
//! ```text
//! Lobby -> Challenging/Challenged -> Barrier -> Countdown -> InRound
//!       -> RoundOver -> (Barrier | MatchOver)
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use battle_tetris_adapter::Message;
use battle_tetris_core::bag::Permutation;
use battle_tetris_core::BoardEvent;
use battle_tetris_types::{FIRST_TO, FORCED_EXIT_GRACE_MS, GO_MS, READY_MS, ROUND_OVER_MS};

use crate::actor::{Intent, Side};

const CHAT_HISTORY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPhase {
    Lobby,
    /// Challenge sent, waiting for the answer
    Challenging(String),
    /// Challenge received, waiting for the local answer
    Challenged(String),
    /// `SB` sent, waiting for bags and `ST`
    Barrier,
    Ready,
    Go,
    InRound,
    RoundOver,
    MatchOver,
    /// Kicked or banned; the session quits after a grace period
    Terminated,
}

impl MatchPhase {
    /// Phases in which the opponent's replication traffic is applied.
    fn replicates(&self) -> bool {
        matches!(
            self,
            MatchPhase::Ready | MatchPhase::Go | MatchPhase::InRound | MatchPhase::RoundOver
        )
    }

    fn in_match(&self) -> bool {
        self.replicates() || *self == MatchPhase::Barrier
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Countdown,
    RoundOver,
    Exit,
}

/// A scheduled callback; stale epochs are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timer {
    pub kind: TimerKind,
    pub epoch: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(Message),
    Board(Side, Intent),
    /// Replace both boards: `mine` drives the authoritative board and
    /// `theirs` the mirror.
    NewRound { mine: Permutation, theirs: Permutation },
    Schedule { timer: Timer, after: Duration },
    /// Banner text for the view
    Notice(String),
    Quit,
}

/// What the view shows besides the two boards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStatus {
    pub me: String,
    pub opponent: Option<String>,
    pub phase: Option<MatchPhase>,
    pub my_wins: u8,
    pub their_wins: u8,
    pub banner: Option<String>,
    /// Name and busy flag of every other client
    pub roster: Vec<(String, bool)>,
    pub chat: Vec<String>,
}

#[derive(Debug)]
pub struct MatchController {
    me: String,
    phase: MatchPhase,
    opponent: Option<String>,
    auto_accept: bool,
    bags_loaded: bool,
    my_wins: u8,
    their_wins: u8,
    epoch: u32,
    banner: Option<String>,
    roster: BTreeMap<String, bool>,
    chat: VecDeque<String>,
}

impl MatchController {
    pub fn new(me: impl Into<String>, auto_accept: bool) -> Self {
        Self {
            me: me.into(),
            phase: MatchPhase::Lobby,
            opponent: None,
            auto_accept,
            bags_loaded: false,
            my_wins: 0,
            their_wins: 0,
            epoch: 0,
            banner: None,
            roster: BTreeMap::new(),
            chat: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> &MatchPhase {
        &self.phase
    }

    pub fn opponent(&self) -> Option<&str> {
        self.opponent.as_deref()
    }

    pub fn score(&self) -> (u8, u8) {
        (self.my_wins, self.their_wins)
    }

    pub fn status(&self) -> MatchStatus {
        MatchStatus {
            me: self.me.clone(),
            opponent: self.opponent.clone(),
            phase: Some(self.phase.clone()),
            my_wins: self.my_wins,
            their_wins: self.their_wins,
            banner: self.banner.clone(),
            roster: self.roster.iter().map(|(n, b)| (n.clone(), *b)).collect(),
            chat: self.chat.iter().cloned().collect(),
        }
    }

    fn notice(&mut self, text: impl Into<String>, out: &mut Vec<Effect>) {
        let text = text.into();
        self.banner = Some(text.clone());
        out.push(Effect::Notice(text));
    }

    fn schedule(&mut self, kind: TimerKind, after_ms: u64, out: &mut Vec<Effect>) {
        self.epoch += 1;
        out.push(Effect::Schedule {
            timer: Timer {
                kind,
                epoch: self.epoch,
            },
            after: Duration::from_millis(after_ms),
        });
    }

    fn halt_boards(out: &mut Vec<Effect>) {
        out.push(Effect::Board(Side::Mine, Intent::Halt));
        out.push(Effect::Board(Side::Theirs, Intent::Halt));
    }

    fn enter_match(&mut self, opponent: String, out: &mut Vec<Effect>) {
        self.opponent = Some(opponent.clone());
        self.my_wins = 0;
        self.their_wins = 0;
        self.notice(format!("Match against {opponent}"), out);
        self.request_round(out);
    }

    fn request_round(&mut self, out: &mut Vec<Effect>) {
        self.phase = MatchPhase::Barrier;
        self.bags_loaded = false;
        out.push(Effect::Send(Message::StartBag(None)));
    }

    fn leave_match(&mut self, out: &mut Vec<Effect>) {
        self.epoch += 1;
        self.phase = MatchPhase::Lobby;
        self.opponent = None;
        self.bags_loaded = false;
        Self::halt_boards(out);
    }

    fn can_accept_challenge(&self) -> bool {
        matches!(self.phase, MatchPhase::Lobby | MatchPhase::MatchOver)
    }

    /// Issue a challenge from the lobby.
    pub fn challenge(&mut self, target: &str) -> Vec<Effect> {
        let mut out = Vec::new();
        if !self.can_accept_challenge() {
            tracing::debug!(%target, phase = ?self.phase, "cannot challenge now");
            return out;
        }
        self.phase = MatchPhase::Challenging(target.to_string());
        out.push(Effect::Send(Message::Challenge(target.to_string())));
        self.notice(format!("Challenging {target}..."), &mut out);
        out
    }

    /// Answer a pending challenge.
    pub fn respond(&mut self, accept: bool) -> Vec<Effect> {
        let mut out = Vec::new();
        let MatchPhase::Challenged(by) = self.phase.clone() else {
            return out;
        };
        out.push(Effect::Send(Message::ChallengeResponse {
            name: by.clone(),
            accept,
        }));
        if accept {
            self.enter_match(by, &mut out);
        } else {
            self.phase = MatchPhase::Lobby;
        }
        out
    }

    /// Leave the current match voluntarily.
    pub fn quit(&mut self) -> Vec<Effect> {
        let mut out = Vec::new();
        if self.phase.in_match() {
            out.push(Effect::Send(Message::Exit));
            self.leave_match(&mut out);
        }
        out.push(Effect::Quit);
        out
    }

    /// Send a lobby chat line; the relay echoes it back to everyone.
    pub fn chat(&mut self, text: &str) -> Vec<Effect> {
        let text = text.trim();
        if text.is_empty() || self.phase == MatchPhase::Terminated {
            return Vec::new();
        }
        vec![Effect::Send(Message::Chat(text.to_string()))]
    }

    /// A local player intent for my board.
    pub fn on_local(&mut self, intent: Intent) -> Vec<Effect> {
        if self.phase != MatchPhase::InRound {
            return Vec::new();
        }
        match intent {
            Intent::Apply(_) | Intent::PauseGravity | Intent::ResumeGravity => {
                vec![Effect::Board(Side::Mine, intent)]
            }
            other => {
                tracing::debug!(intent = ?other, "not a player intent");
                Vec::new()
            }
        }
    }

    /// An event from one of the two boards.
    pub fn on_board_event(&mut self, side: Side, event: BoardEvent) -> Vec<Effect> {
        let mut out = Vec::new();
        match (side, event) {
            (Side::Mine, BoardEvent::GameOver) if self.phase == MatchPhase::InRound => {
                self.their_wins += 1;
                self.finish_round(false, &mut out);
            }
            (Side::Theirs, BoardEvent::GameOver) if self.phase == MatchPhase::InRound => {
                self.my_wins += 1;
                self.finish_round(true, &mut out);
            }
            (Side::Mine, event) if self.phase.replicates() => {
                if let Some(message) = Message::from_event(&event) {
                    out.push(Effect::Send(message));
                }
                if let BoardEvent::Locked(report) = event {
                    if let Some(label) = report.label {
                        self.banner = Some(label);
                    }
                }
            }
            _ => {}
        }
        out
    }

    fn finish_round(&mut self, won: bool, out: &mut Vec<Effect>) {
        self.phase = MatchPhase::RoundOver;
        Self::halt_boards(out);
        let text = if won { "You win the round" } else { "You lose the round" };
        self.notice(format!("{text} ({}-{})", self.my_wins, self.their_wins), out);
        self.schedule(TimerKind::RoundOver, ROUND_OVER_MS, out);
        tracing::info!(won, mine = self.my_wins, theirs = self.their_wins, "round over");
    }

    fn match_decided(&self) -> bool {
        self.my_wins >= FIRST_TO || self.their_wins >= FIRST_TO
    }

    fn finish_match(&mut self, out: &mut Vec<Effect>) {
        self.epoch += 1;
        self.phase = MatchPhase::MatchOver;
        self.opponent = None;
        let text = if self.my_wins > self.their_wins {
            "You win the match"
        } else {
            "You lose the match"
        };
        self.notice(format!("{text} ({}-{})", self.my_wins, self.their_wins), out);
        tracing::info!(mine = self.my_wins, theirs = self.their_wins, "match over");
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Effect> {
        let mut out = Vec::new();
        if timer.epoch != self.epoch {
            return out;
        }
        match (timer.kind, &self.phase) {
            (TimerKind::Countdown, MatchPhase::Ready) => {
                self.phase = MatchPhase::Go;
                self.notice("GO", &mut out);
                self.schedule(TimerKind::Countdown, GO_MS, &mut out);
            }
            (TimerKind::Countdown, MatchPhase::Go) => {
                self.phase = MatchPhase::InRound;
                self.banner = None;
                out.push(Effect::Board(Side::Mine, Intent::Start));
            }
            (TimerKind::RoundOver, MatchPhase::RoundOver) => {
                if self.match_decided() {
                    out.push(Effect::Send(Message::Exit));
                    self.finish_match(&mut out);
                } else {
                    self.request_round(&mut out);
                }
            }
            (TimerKind::Exit, MatchPhase::Terminated) => out.push(Effect::Quit),
            (kind, phase) => tracing::debug!(?kind, ?phase, "timer ignored"),
        }
        out
    }

    /// A message from the relay.
    pub fn on_message(&mut self, message: Message) -> Vec<Effect> {
        let mut out = Vec::new();
        match message {
            Message::NewClient { name, .. } => {
                self.roster.insert(name, false);
            }
            Message::RemoveClient(name) => {
                self.roster.remove(&name);
                if self.phase == MatchPhase::Challenging(name.clone()) {
                    self.phase = MatchPhase::Lobby;
                    self.notice(format!("{name} left"), &mut out);
                }
            }
            Message::Busy(name) => {
                self.roster.insert(name, true);
            }
            Message::Free(name) => {
                self.roster.insert(name, false);
            }
            Message::Chat(text) => {
                if self.chat.len() == CHAT_HISTORY {
                    self.chat.pop_front();
                }
                self.chat.push_back(text);
            }
            Message::Challenge(by) => {
                if !self.can_accept_challenge() {
                    out.push(Effect::Send(Message::ChallengeResponse { name: by, accept: false }));
                } else {
                    self.phase = MatchPhase::Challenged(by.clone());
                    if self.auto_accept {
                        return self.respond(true);
                    }
                    self.notice(format!("{by} challenges you"), &mut out);
                }
            }
            Message::ChallengeResponse { name, accept } => {
                if self.phase != MatchPhase::Challenging(name.clone()) {
                    tracing::debug!(%name, "unsolicited challenge response");
                } else if accept {
                    self.enter_match(name, &mut out);
                } else {
                    self.phase = MatchPhase::Lobby;
                    self.notice(format!("{name} declined"), &mut out);
                }
            }
            Message::StartBag(Some((mine, theirs))) if self.phase == MatchPhase::Barrier => {
                self.bags_loaded = true;
                out.push(Effect::NewRound { mine, theirs });
            }
            Message::Start if self.phase == MatchPhase::Barrier => {
                if !self.bags_loaded {
                    tracing::warn!("start before bags, ignoring");
                } else {
                    self.phase = MatchPhase::Ready;
                    self.notice("READY", &mut out);
                    self.schedule(TimerKind::Countdown, READY_MS, &mut out);
                }
            }
            // The opponent's round-over timer fired first.
            Message::Exit if self.phase == MatchPhase::RoundOver && self.match_decided() => {
                self.finish_match(&mut out);
            }
            Message::Exit if self.phase.in_match() => {
                let who = self.opponent.clone().unwrap_or_default();
                self.leave_match(&mut out);
                self.notice(format!("{who} left the match"), &mut out);
            }
            Message::Kick(reason) | Message::Ban(reason) => {
                self.phase = MatchPhase::Terminated;
                Self::halt_boards(&mut out);
                let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                self.notice(format!("Disconnected by server: {reason}"), &mut out);
                self.schedule(TimerKind::Exit, FORCED_EXIT_GRACE_MS, &mut out);
            }
            message if message.is_replication() => {
                if self.phase.replicates() {
                    self.replicate(message, &mut out);
                } else {
                    tracing::debug!(%message, "replication outside a round");
                }
            }
            Message::Ping | Message::NameAccepted => {}
            other => tracing::debug!(message = %other, phase = ?self.phase, "ignored"),
        }
        out
    }

    fn replicate(&mut self, message: Message, out: &mut Vec<Effect>) {
        let mirror = |intent| Effect::Board(Side::Theirs, intent);
        match message {
            Message::Move(action) => out.push(mirror(Intent::Apply(action))),
            Message::Lock { x, y } => out.push(mirror(Intent::MirrorLock { x, y })),
            Message::NewBag(bag) => out.push(mirror(Intent::MirrorBag(bag))),
            Message::GarbageRows(holes) => out.push(mirror(Intent::MirrorGarbage(holes))),
            Message::GravityControl { paused: true } => out.push(mirror(Intent::PauseGravity)),
            Message::GravityControl { paused: false } => out.push(mirror(Intent::ResumeGravity)),
            Message::Garbage(lines) => out.extend(
                lines
                    .into_iter()
                    .filter(|&n| n > 0)
                    .map(|n| Effect::Board(Side::Mine, Intent::ReceiveAttack(n))),
            ),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_tetris_core::bag::parse_bag;
    use battle_tetris_core::LockReport;
    use battle_tetris_types::{Action, ClearKind, Shape};

    fn sends(effects: &[Effect]) -> Vec<Message> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    fn timer(effects: &[Effect]) -> Timer {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::Schedule { timer, .. } => Some(*timer),
                _ => None,
            })
            .expect("a scheduled timer")
    }

    fn bags() -> (Permutation, Permutation) {
        (parse_bag("TIOJLSZ").unwrap(), parse_bag("ZSLJOIT").unwrap())
    }

    /// Controller that has accepted a match and is in round one.
    fn in_round() -> MatchController {
        let mut c = MatchController::new("alice", true);
        c.on_message(Message::Challenge("bob".into()));
        c.on_message(Message::StartBag(Some(bags())));
        let t = timer(&c.on_message(Message::Start));
        let t = timer(&c.on_timer(t));
        c.on_timer(t);
        assert_eq!(*c.phase(), MatchPhase::InRound);
        c
    }

    #[test]
    fn test_challenger_flow() {
        let mut c = MatchController::new("alice", false);
        let out = c.challenge("bob");
        assert_eq!(sends(&out), vec![Message::Challenge("bob".into())]);
        assert_eq!(*c.phase(), MatchPhase::Challenging("bob".into()));

        let out = c.on_message(Message::ChallengeResponse {
            name: "bob".into(),
            accept: true,
        });
        assert_eq!(sends(&out), vec![Message::StartBag(None)]);
        assert_eq!(*c.phase(), MatchPhase::Barrier);
        assert_eq!(c.opponent(), Some("bob"));
    }

    #[test]
    fn test_declined_challenge_returns_to_lobby() {
        let mut c = MatchController::new("alice", false);
        c.challenge("bob");
        c.on_message(Message::ChallengeResponse {
            name: "bob".into(),
            accept: false,
        });
        assert_eq!(*c.phase(), MatchPhase::Lobby);
        assert_eq!(c.status().banner.as_deref(), Some("bob declined"));
    }

    #[test]
    fn test_auto_accept() {
        let mut c = MatchController::new("bob", true);
        let out = c.on_message(Message::Challenge("alice".into()));
        assert_eq!(
            sends(&out),
            vec![
                Message::ChallengeResponse {
                    name: "alice".into(),
                    accept: true
                },
                Message::StartBag(None),
            ]
        );
    }

    #[test]
    fn test_manual_accept() {
        let mut c = MatchController::new("bob", false);
        c.on_message(Message::Challenge("alice".into()));
        assert_eq!(*c.phase(), MatchPhase::Challenged("alice".into()));
        let out = c.respond(false);
        assert_eq!(
            sends(&out),
            vec![Message::ChallengeResponse {
                name: "alice".into(),
                accept: false
            }]
        );
        assert_eq!(*c.phase(), MatchPhase::Lobby);
    }

    #[test]
    fn test_round_waits_for_barrier() {
        let mut c = MatchController::new("alice", true);
        c.on_message(Message::Challenge("bob".into()));

        // ST without bags is a protocol violation and is ignored.
        assert!(c.on_message(Message::Start).is_empty());
        assert_eq!(*c.phase(), MatchPhase::Barrier);

        let (mine, theirs) = bags();
        let out = c.on_message(Message::StartBag(Some((mine, theirs))));
        assert_eq!(out, vec![Effect::NewRound { mine, theirs }]);

        let out = c.on_message(Message::Start);
        assert_eq!(*c.phase(), MatchPhase::Ready);
        let Effect::Schedule { after, .. } = out[1] else {
            panic!("expected countdown timer");
        };
        assert_eq!(after, Duration::from_millis(READY_MS));
    }

    #[test]
    fn test_countdown_starts_my_board() {
        let mut c = MatchController::new("alice", true);
        c.on_message(Message::Challenge("bob".into()));
        c.on_message(Message::StartBag(Some(bags())));
        let ready = timer(&c.on_message(Message::Start));
        let out = c.on_timer(ready);
        assert_eq!(*c.phase(), MatchPhase::Go);
        let go = timer(&out);

        // Stale timers do nothing.
        assert!(c.on_timer(ready).is_empty());

        let out = c.on_timer(go);
        assert_eq!(out, vec![Effect::Board(Side::Mine, Intent::Start)]);
    }

    #[test]
    fn test_local_input_only_in_round() {
        let mut c = MatchController::new("alice", true);
        assert!(c.on_local(Intent::Apply(Action::MoveLeft)).is_empty());

        let mut c = in_round();
        assert_eq!(
            c.on_local(Intent::Apply(Action::MoveLeft)),
            vec![Effect::Board(Side::Mine, Intent::Apply(Action::MoveLeft))]
        );
        assert!(c.on_local(Intent::Start).is_empty());
    }

    #[test]
    fn test_board_events_are_replicated() {
        let mut c = in_round();
        let out = c.on_board_event(Side::Mine, BoardEvent::Action(Action::RotateCw));
        assert_eq!(sends(&out), vec![Message::Move(Action::RotateCw)]);

        let report = LockReport {
            x: 3,
            y: 37,
            shape: Shape::T,
            lines: 2,
            kind: ClearKind::TSpin,
            all_clear: false,
            back_to_back: false,
            combo: 1,
            attack: 4,
            label: Some("T-spin double".into()),
        };
        let out = c.on_board_event(Side::Mine, BoardEvent::Locked(report));
        assert_eq!(sends(&out), vec![Message::Lock { x: 3, y: 37 }]);
        assert_eq!(c.status().banner.as_deref(), Some("T-spin double"));

        assert!(c.on_board_event(Side::Mine, BoardEvent::Spawned(Shape::I)).is_empty());
        assert!(c.on_board_event(Side::Theirs, BoardEvent::Action(Action::MoveLeft)).is_empty());
    }

    #[test]
    fn test_opponent_traffic_drives_mirror() {
        let mut c = in_round();
        assert_eq!(
            c.on_message(Message::Lock { x: 1, y: 38 }),
            vec![Effect::Board(Side::Theirs, Intent::MirrorLock { x: 1, y: 38 })]
        );
        assert_eq!(
            c.on_message(Message::Garbage(vec![2, 0, 1])),
            vec![
                Effect::Board(Side::Mine, Intent::ReceiveAttack(2)),
                Effect::Board(Side::Mine, Intent::ReceiveAttack(1)),
            ]
        );
        assert_eq!(
            c.on_message(Message::GravityControl { paused: true }),
            vec![Effect::Board(Side::Theirs, Intent::PauseGravity)]
        );
    }

    #[test]
    fn test_replication_ignored_in_lobby() {
        let mut c = MatchController::new("alice", true);
        assert!(c.on_message(Message::Move(Action::MoveLeft)).is_empty());
    }

    #[test]
    fn test_rounds_until_first_to_two() {
        let mut c = in_round();

        let out = c.on_board_event(Side::Theirs, BoardEvent::GameOver);
        assert_eq!(*c.phase(), MatchPhase::RoundOver);
        assert_eq!(c.score(), (1, 0));
        assert!(out.contains(&Effect::Board(Side::Mine, Intent::Halt)));
        let Effect::Schedule { timer: t, after } = out[3].clone() else {
            panic!("expected round-over timer, got {:?}", out[3]);
        };
        assert_eq!(after, Duration::from_millis(ROUND_OVER_MS));

        // A second top-out in the same round does not count.
        assert!(c.on_board_event(Side::Mine, BoardEvent::GameOver).is_empty());

        // Next round goes through the barrier again.
        let out = c.on_timer(t);
        assert_eq!(sends(&out), vec![Message::StartBag(None)]);
        assert_eq!(*c.phase(), MatchPhase::Barrier);

        c.on_message(Message::StartBag(Some(bags())));
        let t = timer(&c.on_message(Message::Start));
        let t = timer(&c.on_timer(t));
        c.on_timer(t);
        let out = c.on_board_event(Side::Theirs, BoardEvent::GameOver);
        assert_eq!(c.score(), (2, 0));

        let out = c.on_timer(timer(&out));
        assert_eq!(*c.phase(), MatchPhase::MatchOver);
        assert_eq!(sends(&out), vec![Message::Exit]);
        assert_eq!(c.status().banner.as_deref(), Some("You win the match (2-0)"));
    }

    #[test]
    fn test_exit_after_deciding_round_ends_match() {
        let mut c = in_round();
        let t = timer(&c.on_board_event(Side::Mine, BoardEvent::GameOver));
        c.on_timer(t);
        c.on_message(Message::StartBag(Some(bags())));
        let t = timer(&c.on_message(Message::Start));
        let t = timer(&c.on_timer(t));
        c.on_timer(t);
        c.on_board_event(Side::Mine, BoardEvent::GameOver);
        assert_eq!(c.score(), (0, 2));

        // The opponent's EXIT beats our own round-over timer.
        let out = c.on_message(Message::Exit);
        assert!(sends(&out).is_empty());
        assert_eq!(*c.phase(), MatchPhase::MatchOver);
        assert_eq!(c.status().banner.as_deref(), Some("You lose the match (0-2)"));
    }

    #[test]
    fn test_opponent_exit_aborts_round() {
        let mut c = in_round();
        let out = c.on_message(Message::Exit);
        assert_eq!(*c.phase(), MatchPhase::Lobby);
        assert!(out.contains(&Effect::Board(Side::Theirs, Intent::Halt)));
        assert_eq!(c.opponent(), None);
        assert_eq!(c.status().banner.as_deref(), Some("bob left the match"));
    }

    #[test]
    fn test_quit_sends_exit() {
        let mut c = in_round();
        let out = c.quit();
        assert_eq!(sends(&out), vec![Message::Exit]);
        assert_eq!(out.last(), Some(&Effect::Quit));

        let mut c = MatchController::new("alice", true);
        assert_eq!(c.quit(), vec![Effect::Quit]);
    }

    #[test]
    fn test_kick_quits_after_grace() {
        let mut c = in_round();
        let out = c.on_message(Message::Kick(Some("spam".into())));
        assert_eq!(*c.phase(), MatchPhase::Terminated);
        assert!(out.contains(&Effect::Board(Side::Mine, Intent::Halt)));
        assert!(out.contains(&Effect::Board(Side::Theirs, Intent::Halt)));
        assert_eq!(
            c.status().banner.as_deref(),
            Some("Disconnected by server: spam")
        );

        // Frozen boards: no more input or replication during the grace.
        assert!(c.on_local(Intent::Apply(Action::MoveLeft)).is_empty());
        assert!(c.on_message(Message::Move(Action::MoveLeft)).is_empty());

        let t = timer(&out);
        assert_eq!(c.on_timer(t), vec![Effect::Quit]);
    }

    #[test]
    fn test_ban_halts_boards() {
        let mut c = in_round();
        let out = c.on_message(Message::Ban(None));
        assert_eq!(out[0], Effect::Board(Side::Mine, Intent::Halt));
        assert_eq!(out[1], Effect::Board(Side::Theirs, Intent::Halt));
        assert_eq!(
            c.status().banner.as_deref(),
            Some("Disconnected by server: no reason given")
        );
    }

    #[test]
    fn test_chat_is_sent_to_relay() {
        let mut c = MatchController::new("alice", false);
        assert_eq!(
            c.chat("  gl hf "),
            vec![Effect::Send(Message::Chat("gl hf".into()))]
        );
        assert!(c.chat("   ").is_empty());

        // Chat also works mid-match.
        let mut c = in_round();
        assert_eq!(sends(&c.chat("nice")), vec![Message::Chat("nice".into())]);
    }

    #[test]
    fn test_new_challenge_after_match_over() {
        let mut c = in_round();
        c.on_board_event(Side::Theirs, BoardEvent::GameOver);
        c.my_wins = FIRST_TO;
        c.on_message(Message::Exit);
        assert_eq!(*c.phase(), MatchPhase::MatchOver);

        let out = c.challenge("carol");
        assert_eq!(sends(&out), vec![Message::Challenge("carol".into())]);
        assert_eq!(*c.phase(), MatchPhase::Challenging("carol".into()));
    }

    #[test]
    fn test_busy_player_declines() {
        let mut c = in_round();
        let out = c.on_message(Message::Challenge("carol".into()));
        assert_eq!(
            sends(&out),
            vec![Message::ChallengeResponse {
                name: "carol".into(),
                accept: false
            }]
        );
        assert_eq!(*c.phase(), MatchPhase::InRound);
    }

    #[test]
    fn test_roster_and_chat() {
        let mut c = MatchController::new("alice", true);
        c.on_message(Message::NewClient {
            announce: false,
            name: "bob".into(),
        });
        c.on_message(Message::Busy("bob".into()));
        c.on_message(Message::NewClient {
            announce: true,
            name: "carol".into(),
        });
        c.on_message(Message::RemoveClient("carol".into()));
        c.on_message(Message::Chat("bob: hi".into()));

        let status = c.status();
        assert_eq!(status.roster, vec![("bob".to_string(), true)]);
        assert_eq!(status.chat, vec!["bob: hi".to_string()]);
    }
}
