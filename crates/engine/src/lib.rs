//! Match engine - actors, controller and the client session
//!
//! - [`actor`]: one serialized executor per board ([`BoardHandle`])
//! - [`controller`]: pure match state machine ([`MatchController`])
//! - [`session`]: async glue between relay, controller and boards

pub mod actor;
pub mod controller;
pub mod session;

pub use actor::{BoardHandle, Intent, Side};
pub use controller::{Effect, MatchController, MatchPhase, MatchStatus, Timer, TimerKind};
pub use session::{start_session, Command, Session};
