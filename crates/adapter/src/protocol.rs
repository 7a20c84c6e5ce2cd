//! Line protocol - one `<TAG><payload>` message per newline-terminated line
//!
//! The same codec is used by the relay and the client. Parsing never panics:
//! anything unrecognized comes back as a [`ProtocolError`] that callers log
//! and skip.
//!
//! | Tag | Payload |
//! |-----|---------|
//! | `SUBMITNAME`, `NAMEACCEPTED`, `ST`, `EXIT`, `PING` | none |
//! | `NEWCLIENT` | `<bool> <name>` |
//! | `REMOVECLIENT`, `BUSY`, `FREE`, `CHALLENGE_C` | `<name>` |
//! | `CHALLENGE_R` | `<name> <bool>` |
//! | `SB` | none (request) or `<mine> <theirs>` (two 7-letter bags) |
//! | `NB` | 7-letter bag |
//! | `LOCK` | `<x> <y>` |
//! | `M` | action shorthand |
//! | `GL` | attack magnitudes |
//! | `GR` | garbage hole columns, bottom row first |
//! | `GC` | `P` (pause) or `R` (resume) |
//! | `NLM` | chat text |
//! | `KICK`, `BAN` | optional reason |

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use battle_tetris_core::bag::{format_bag, parse_bag, BagError, Permutation};
use battle_tetris_core::BoardEvent;
use battle_tetris_types::Action;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,

    #[error("unknown message {0:?}")]
    Unknown(String),

    #[error("malformed {tag} payload {payload:?}")]
    Malformed { tag: &'static str, payload: String },

    #[error(transparent)]
    Bag(#[from] BagError),
}

/// A protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    SubmitName,
    NameAccepted,
    /// Roster add; `announce` is true for a fresh arrival
    NewClient { announce: bool, name: String },
    RemoveClient(String),
    /// Challenge naming the target (client to relay) or the challenger
    /// (relay to client)
    Challenge(String),
    /// Answer to a challenge naming the other party
    ChallengeResponse { name: String, accept: bool },
    Busy(String),
    Free(String),
    /// Bag request (`None`) or the agreed pair for the next round
    StartBag(Option<(Permutation, Permutation)>),
    Start,
    NewBag(Permutation),
    Lock { x: i8, y: i8 },
    Move(Action),
    Garbage(Vec<u32>),
    GarbageRows(Vec<u8>),
    GravityControl { paused: bool },
    Chat(String),
    Kick(Option<String>),
    Ban(Option<String>),
    Exit,
    Ping,
}

fn malformed(tag: &'static str, payload: &str) -> ProtocolError {
    ProtocolError::Malformed {
        tag,
        payload: payload.to_string(),
    }
}

fn parse_bool(tag: &'static str, s: &str) -> Result<bool, ProtocolError> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(malformed(tag, s)),
    }
}

fn parse_name(tag: &'static str, s: &str) -> Result<String, ProtocolError> {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        return Err(malformed(tag, s));
    }
    Ok(s.to_string())
}

fn parse_list<T: FromStr>(tag: &'static str, s: &str) -> Result<Vec<T>, ProtocolError> {
    let items = s
        .split_whitespace()
        .map(|n| n.parse::<T>().map_err(|_| malformed(tag, s)))
        .collect::<Result<Vec<_>, _>>()?;
    if items.is_empty() {
        return Err(malformed(tag, s));
    }
    Ok(items)
}

fn reason(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

impl Message {
    /// Parse one line; trailing `\r`/`\n` are ignored.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        match line {
            "SUBMITNAME" => return Ok(Message::SubmitName),
            "NAMEACCEPTED" => return Ok(Message::NameAccepted),
            "ST" => return Ok(Message::Start),
            "SB" => return Ok(Message::StartBag(None)),
            "EXIT" => return Ok(Message::Exit),
            "PING" => return Ok(Message::Ping),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("NEWCLIENT") {
            let (flag, name) = rest
                .split_once(' ')
                .ok_or_else(|| malformed("NEWCLIENT", rest))?;
            return Ok(Message::NewClient {
                announce: parse_bool("NEWCLIENT", flag)?,
                name: parse_name("NEWCLIENT", name)?,
            });
        }
        if let Some(rest) = line.strip_prefix("REMOVECLIENT") {
            return Ok(Message::RemoveClient(parse_name("REMOVECLIENT", rest)?));
        }
        if let Some(rest) = line.strip_prefix("CHALLENGE_C") {
            return Ok(Message::Challenge(parse_name("CHALLENGE_C", rest)?));
        }
        if let Some(rest) = line.strip_prefix("CHALLENGE_R") {
            let (name, flag) = rest
                .split_once(' ')
                .ok_or_else(|| malformed("CHALLENGE_R", rest))?;
            return Ok(Message::ChallengeResponse {
                name: parse_name("CHALLENGE_R", name)?,
                accept: parse_bool("CHALLENGE_R", flag)?,
            });
        }
        if let Some(rest) = line.strip_prefix("BUSY") {
            return Ok(Message::Busy(parse_name("BUSY", rest)?));
        }
        if let Some(rest) = line.strip_prefix("BAN") {
            return Ok(Message::Ban(reason(rest)));
        }
        if let Some(rest) = line.strip_prefix("FREE") {
            return Ok(Message::Free(parse_name("FREE", rest)?));
        }
        if let Some(rest) = line.strip_prefix("KICK") {
            return Ok(Message::Kick(reason(rest)));
        }
        if let Some(rest) = line.strip_prefix("NLM") {
            return Ok(Message::Chat(rest.to_string()));
        }
        if let Some(rest) = line.strip_prefix("NB") {
            return Ok(Message::NewBag(parse_bag(rest)?));
        }
        if let Some(rest) = line.strip_prefix("SB") {
            let (mine, theirs) = rest
                .split_once(' ')
                .ok_or_else(|| malformed("SB", rest))?;
            return Ok(Message::StartBag(Some((parse_bag(mine)?, parse_bag(theirs)?))));
        }
        if let Some(rest) = line.strip_prefix("LOCK") {
            let coords: Vec<i8> = parse_list("LOCK", rest)?;
            let &[x, y] = &coords[..] else {
                return Err(malformed("LOCK", rest));
            };
            return Ok(Message::Lock { x, y });
        }
        if let Some(rest) = line.strip_prefix("GL") {
            return Ok(Message::Garbage(parse_list("GL", rest)?));
        }
        if let Some(rest) = line.strip_prefix("GR") {
            let holes: Vec<u8> = parse_list("GR", rest)?;
            if holes.iter().any(|&h| h >= battle_tetris_types::BOARD_WIDTH) {
                return Err(malformed("GR", rest));
            }
            return Ok(Message::GarbageRows(holes));
        }
        if let Some(rest) = line.strip_prefix("GC") {
            return match rest {
                "P" => Ok(Message::GravityControl { paused: true }),
                "R" => Ok(Message::GravityControl { paused: false }),
                _ => Err(malformed("GC", rest)),
            };
        }
        if let Some(rest) = line.strip_prefix('M') {
            return Action::from_shorthand(rest)
                .map(Message::Move)
                .ok_or_else(|| malformed("M", rest));
        }

        Err(ProtocolError::Unknown(line.to_string()))
    }

    /// Messages a peer replays onto the opponent's boards.
    pub fn is_replication(&self) -> bool {
        matches!(
            self,
            Message::NewBag(_)
                | Message::Lock { .. }
                | Message::Move(_)
                | Message::Garbage(_)
                | Message::GarbageRows(_)
                | Message::GravityControl { .. }
        )
    }
}

impl Message {
    /// Wire form of a replicated board event, if it has one.
    pub fn from_event(event: &BoardEvent) -> Option<Self> {
        Some(match event {
            BoardEvent::Action(action) => Message::Move(*action),
            BoardEvent::NewBag(bag) => Message::NewBag(*bag),
            BoardEvent::GravityPaused => Message::GravityControl { paused: true },
            BoardEvent::GravityResumed => Message::GravityControl { paused: false },
            BoardEvent::Attack(lines) => Message::Garbage(vec![*lines]),
            BoardEvent::GarbageRows(holes) => Message::GarbageRows(holes.clone()),
            BoardEvent::Locked(lock) => Message::Lock { x: lock.x, y: lock.y },
            BoardEvent::Spawned(_) | BoardEvent::GameOver => return None,
        })
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::SubmitName => write!(f, "SUBMITNAME"),
            Message::NameAccepted => write!(f, "NAMEACCEPTED"),
            Message::NewClient { announce, name } => write!(f, "NEWCLIENT{announce} {name}"),
            Message::RemoveClient(name) => write!(f, "REMOVECLIENT{name}"),
            Message::Challenge(name) => write!(f, "CHALLENGE_C{name}"),
            Message::ChallengeResponse { name, accept } => write!(f, "CHALLENGE_R{name} {accept}"),
            Message::Busy(name) => write!(f, "BUSY{name}"),
            Message::Free(name) => write!(f, "FREE{name}"),
            Message::StartBag(None) => write!(f, "SB"),
            Message::StartBag(Some((mine, theirs))) => {
                write!(f, "SB{} {}", format_bag(mine), format_bag(theirs))
            }
            Message::Start => write!(f, "ST"),
            Message::NewBag(bag) => write!(f, "NB{}", format_bag(bag)),
            Message::Lock { x, y } => write!(f, "LOCK{x} {y}"),
            Message::Move(action) => write!(f, "M{}", action.shorthand()),
            Message::Garbage(lines) => write!(f, "GL{}", join(lines)),
            Message::GarbageRows(holes) => write!(f, "GR{}", join(holes)),
            Message::GravityControl { paused: true } => write!(f, "GCP"),
            Message::GravityControl { paused: false } => write!(f, "GCR"),
            Message::Chat(text) => write!(f, "NLM{text}"),
            Message::Kick(reason) => write!(f, "KICK{}", reason.as_deref().unwrap_or("")),
            Message::Ban(reason) => write!(f, "BAN{}", reason.as_deref().unwrap_or("")),
            Message::Exit => write!(f, "EXIT"),
            Message::Ping => write!(f, "PING"),
        }
    }
}
