//! Adapter module - the line protocol and the relay around it
//!
//! Two peers never talk directly. Each connects to the relay over TCP,
//! registers a display name, and from then on exchanges newline-terminated
//! `<TAG><payload>` lines. The relay keeps the roster, pairs challengers,
//! runs the per-round start-bag barrier and forwards in-match replication
//! traffic to the opponent untouched.
//!
//! # Protocol Flow
//!
//! ```text
//! relay  -> alice: SUBMITNAME
//! alice  -> relay: alice
//! relay  -> alice: NAMEACCEPTED
//! alice  -> relay: CHALLENGE_Cbob
//! relay  -> bob:   CHALLENGE_Calice
//! bob    -> relay: CHALLENGE_Ralice true
//! relay  -> alice: CHALLENGE_Rbob true
//! alice  -> relay: SB
//! relay  -> alice: SBTIOJLSZ ZSLJOIT
//! bob    -> relay: SB
//! relay  -> bob:   SBZSLJOIT TIOJLSZ
//! relay  -> both:  ST
//! alice  -> relay: ML            (forwarded to bob)
//! ```
//!
//! # Modules
//!
//! - [`protocol`]: [`Message`] codec
//! - [`registry`]: roster, challenges and the start barrier
//! - [`server`]: TCP relay ([`run_server`])
//! - [`client`]: handshake and split reader/writer
//! - [`config`]: env / JSON configuration
//! - [`wire_log`]: JSON-lines traffic log
//!
//! # Environment Variables
//!
//! - `BATTLE_TETRIS_HOST`, `BATTLE_TETRIS_PORT`: relay address (default 127.0.0.1:9001)
//! - `BATTLE_TETRIS_WIRE_LOG`: relay traffic log path
//! - `BATTLE_TETRIS_CONFIG`: JSON file read before the variables above
//!
//! # Testing
//!
//! ```bash
//! nc 127.0.0.1 9001
//! ```

pub mod client;
pub mod config;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod wire_log;

pub use battle_tetris_core as core;
pub use battle_tetris_types as types;

pub use client::{ClientError, Connection, MessageReader, MessageWriter};
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use protocol::{Message, ProtocolError};
pub use registry::{Delivery, Registry, RegistryError};
pub use server::{run_server, serve, ServerState};
pub use wire_log::{Direction, WireLog, WireRecord};
