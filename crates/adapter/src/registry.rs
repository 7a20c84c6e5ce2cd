//! Match registry - the relay's only mutable state
//!
//! Maps display names to their lobby/match status, pairs challengers and
//! runs the per-round start-bag barrier. The registry never touches a
//! socket: every operation returns the [`Delivery`] list the server must
//! write, in order. The server owns it behind one mutex, so there is a
//! single mutation path.

use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use battle_tetris_core::bag::{random_permutation, Permutation};

use crate::protocol::Message;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid name {0:?}")]
    InvalidName(String),

    #[error("name {0:?} is already taken")]
    NameTaken(String),

    #[error("unknown peer {0:?}")]
    UnknownPeer(String),

    #[error("cannot challenge yourself")]
    SelfChallenge,

    #[error("no pending challenge from {0:?}")]
    NoChallenge(String),

    #[error("{0:?} is not in a match")]
    NotInMatch(String),

    #[error("unexpected {line:?} from {from:?}")]
    Unexpected { from: String, line: String },

    #[error("start barrier diverged for {name:?}: {mine} vs {theirs}")]
    BarrierDiverged { name: String, mine: u32, theirs: u32 },
}

/// A message addressed to one registered client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: String,
    pub message: Message,
}

impl Delivery {
    pub fn new(to: impl Into<String>, message: Message) -> Self {
        Self {
            to: to.into(),
            message,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Client {
    opponent: Option<String>,
    /// Start-bag requests this match
    ready: u32,
    /// Bags generated by the opponent's request, as (mine, theirs)
    loaded: Option<(Permutation, Permutation)>,
}

/// Lobby and match bookkeeping
#[derive(Debug)]
pub struct Registry {
    clients: BTreeMap<String, Client>,
    /// (challenger, target) pairs awaiting an answer
    challenges: HashSet<(String, String)>,
    rng: StdRng,
}

/// Names are space-delimited in payloads, so whitespace is never allowed.
pub fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() || name == "null" || name.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Registry {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic bag generation for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            clients: BTreeMap::new(),
            challenges: HashSet::new(),
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    pub fn opponent_of(&self, name: &str) -> Option<&str> {
        self.clients.get(name)?.opponent.as_deref()
    }

    pub fn is_busy(&self, name: &str) -> bool {
        self.opponent_of(name).is_some()
    }

    fn broadcast(&self, message: Message, out: &mut Vec<Delivery>) {
        for name in self.clients.keys() {
            out.push(Delivery::new(name.clone(), message.clone()));
        }
    }

    /// Add a client under `name`.
    ///
    /// Existing clients hear `NEWCLIENTtrue`; the newcomer receives the
    /// current roster (with busy markers) and then `NAMEACCEPTED`.
    pub fn register(&mut self, name: &str) -> Result<Vec<Delivery>, RegistryError> {
        validate_name(name)?;
        if self.clients.contains_key(name) {
            return Err(RegistryError::NameTaken(name.to_string()));
        }

        let mut out = Vec::new();
        self.broadcast(
            Message::NewClient {
                announce: true,
                name: name.to_string(),
            },
            &mut out,
        );
        for (other, client) in &self.clients {
            out.push(Delivery::new(
                name,
                Message::NewClient {
                    announce: false,
                    name: other.clone(),
                },
            ));
            if client.opponent.is_some() {
                out.push(Delivery::new(name, Message::Busy(other.clone())));
            }
        }
        out.push(Delivery::new(name, Message::NameAccepted));

        self.clients.insert(name.to_string(), Client::default());
        tracing::info!(%name, clients = self.clients.len(), "client registered");
        Ok(out)
    }

    /// Drop a client; its opponent is told to exit and freed.
    pub fn remove(&mut self, name: &str) -> Vec<Delivery> {
        let mut out = Vec::new();
        let Some(client) = self.clients.remove(name) else {
            return out;
        };
        self.challenges.retain(|(a, b)| a != name && b != name);

        if let Some(opponent) = client.opponent {
            self.release(&opponent);
            out.push(Delivery::new(opponent.clone(), Message::Exit));
            self.broadcast(Message::Free(opponent), &mut out);
        }
        self.broadcast(Message::RemoveClient(name.to_string()), &mut out);
        tracing::info!(%name, clients = self.clients.len(), "client removed");
        out
    }

    fn release(&mut self, name: &str) {
        if let Some(client) = self.clients.get_mut(name) {
            *client = Client::default();
        }
    }

    /// End `name`'s match: both sides are freed and told to exit.
    ///
    /// Used for an explicit `EXIT` (the sender gets no `EXIT` back) and for
    /// session-fatal errors (`notify_self`).
    pub fn end_match(&mut self, name: &str, notify_self: bool) -> Vec<Delivery> {
        let mut out = Vec::new();
        let Some(opponent) = self.opponent_of(name).map(str::to_string) else {
            return out;
        };
        self.release(name);
        self.release(&opponent);

        if notify_self {
            out.push(Delivery::new(name, Message::Exit));
        }
        out.push(Delivery::new(opponent.clone(), Message::Exit));
        self.broadcast(Message::Free(name.to_string()), &mut out);
        self.broadcast(Message::Free(opponent.clone()), &mut out);
        tracing::info!(%name, %opponent, "match ended");
        out
    }

    /// Route one message from a registered client.
    pub fn handle(&mut self, from: &str, message: Message) -> Result<Vec<Delivery>, RegistryError> {
        if !self.clients.contains_key(from) {
            return Err(RegistryError::UnknownPeer(from.to_string()));
        }

        match message {
            Message::Ping => return Ok(vec![Delivery::new(from, Message::Ping)]),
            Message::Chat(text) => {
                let mut out = Vec::new();
                self.broadcast(Message::Chat(format!("{from}: {text}")), &mut out);
                return Ok(out);
            }
            _ => {}
        }

        match (self.opponent_of(from).map(str::to_string), message) {
            (Some(_), Message::Exit) => Ok(self.end_match(from, false)),
            (Some(opponent), Message::StartBag(None)) => self.start_bag(from, &opponent),
            (Some(opponent), message) if message.is_replication() => {
                Ok(vec![Delivery::new(opponent, message)])
            }
            (None, Message::Challenge(target)) => self.challenge(from, &target),
            (None, Message::ChallengeResponse { name, accept }) => self.respond(from, &name, accept),
            (None, message) if message.is_replication() || message == Message::Exit => {
                Err(RegistryError::NotInMatch(from.to_string()))
            }
            (_, message) => Err(RegistryError::Unexpected {
                from: from.to_string(),
                line: message.to_string(),
            }),
        }
    }

    fn challenge(&mut self, from: &str, target: &str) -> Result<Vec<Delivery>, RegistryError> {
        if from == target {
            return Err(RegistryError::SelfChallenge);
        }
        if !self.clients.contains_key(target) {
            return Err(RegistryError::UnknownPeer(target.to_string()));
        }
        if self.is_busy(target) {
            return Ok(vec![Delivery::new(
                from,
                Message::ChallengeResponse {
                    name: target.to_string(),
                    accept: false,
                },
            )]);
        }
        self.challenges.insert((from.to_string(), target.to_string()));
        tracing::debug!(%from, %target, "challenge relayed");
        Ok(vec![Delivery::new(target, Message::Challenge(from.to_string()))])
    }

    fn respond(&mut self, from: &str, challenger: &str, accept: bool) -> Result<Vec<Delivery>, RegistryError> {
        if !self.clients.contains_key(challenger) {
            return Err(RegistryError::UnknownPeer(challenger.to_string()));
        }
        let key = (challenger.to_string(), from.to_string());
        if !self.challenges.remove(&key) {
            return Err(RegistryError::NoChallenge(challenger.to_string()));
        }

        let reply = |accept| {
            Delivery::new(
                challenger,
                Message::ChallengeResponse {
                    name: from.to_string(),
                    accept,
                },
            )
        };
        if !accept || self.is_busy(challenger) {
            return Ok(vec![reply(false)]);
        }

        // Stale challenges involving either player are void now.
        self.challenges
            .retain(|(a, b)| a != from && b != from && a != challenger && b != challenger);
        for (name, opponent) in [(from, challenger), (challenger, from)] {
            if let Some(client) = self.clients.get_mut(name) {
                *client = Client {
                    opponent: Some(opponent.to_string()),
                    ..Client::default()
                };
            }
        }

        let mut out = vec![reply(true)];
        self.broadcast(Message::Busy(from.to_string()), &mut out);
        self.broadcast(Message::Busy(challenger.to_string()), &mut out);
        tracing::info!(%challenger, target = %from, "match started");
        Ok(out)
    }

    /// Start-bag barrier.
    ///
    /// The first request of a round generates both permutations and answers
    /// `SB<P1> <P2>`; the opponent's request is answered with the mirrored
    /// `SB<P2> <P1>`. `ST` goes to both once their counts match. Counts
    /// drifting more than one round apart is fatal for the match.
    fn start_bag(&mut self, from: &str, opponent: &str) -> Result<Vec<Delivery>, RegistryError> {
        let theirs_ready = self.clients.get(opponent).map_or(0, |c| c.ready);
        let Some(me) = self.clients.get_mut(from) else {
            return Err(RegistryError::UnknownPeer(from.to_string()));
        };
        me.ready += 1;
        let mine_ready = me.ready;
        if mine_ready > theirs_ready + 1 {
            return Err(RegistryError::BarrierDiverged {
                name: from.to_string(),
                mine: mine_ready,
                theirs: theirs_ready,
            });
        }

        let bags = match me.loaded.take() {
            Some(bags) => bags,
            None => {
                let mine = random_permutation(&mut self.rng);
                let theirs = random_permutation(&mut self.rng);
                if let Some(other) = self.clients.get_mut(opponent) {
                    other.loaded = Some((theirs, mine));
                }
                (mine, theirs)
            }
        };

        let mut out = vec![Delivery::new(from, Message::StartBag(Some(bags)))];
        if mine_ready == theirs_ready {
            out.push(Delivery::new(from, Message::Start));
            out.push(Delivery::new(opponent, Message::Start));
            tracing::debug!(%from, %opponent, round = mine_ready, "round start");
        }
        Ok(out)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
