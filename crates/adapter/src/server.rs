//! TCP relay server
//!
//! One task per connection reads lines, a second one writes them. All
//! routing decisions go through the shared [`Registry`] under a single
//! mutex; the per-connection writer channels live next to it so a routing
//! decision and its delivery happen atomically.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::config::ServerConfig;
use crate::protocol::Message;
use crate::registry::{Delivery, Registry, RegistryError};
use crate::wire_log::{Direction, WireLog};

struct Hub {
    registry: Registry,
    outboxes: HashMap<String, mpsc::UnboundedSender<String>>,
    wire_log: Option<WireLog>,
}

impl Hub {
    fn dispatch(&self, deliveries: Vec<Delivery>) {
        for Delivery { to, message } in deliveries {
            let Some(tx) = self.outboxes.get(&to) else {
                tracing::debug!(%to, %message, "recipient gone, dropping");
                continue;
            };
            let line = message.to_string();
            if let Some(log) = &self.wire_log {
                log.record(&to, Direction::Out, &line);
            }
            let _ = tx.send(line);
        }
    }
}

/// Shared relay state
pub struct ServerState {
    hub: Mutex<Hub>,
    wire_log: Option<WireLog>,
}

impl ServerState {
    pub fn new(registry: Registry, wire_log: Option<WireLog>) -> Self {
        Self {
            hub: Mutex::new(Hub {
                registry,
                outboxes: HashMap::new(),
                wire_log: wire_log.clone(),
            }),
            wire_log,
        }
    }

    fn log_in(&self, peer: &str, line: &str) {
        if let Some(log) = &self.wire_log {
            log.record(peer, Direction::In, line);
        }
    }

    /// Number of registered clients.
    pub async fn client_count(&self) -> usize {
        self.hub.lock().await.registry.len()
    }
}

/// Run the relay until the listener fails.
///
/// The bound address is reported on `ready_tx`, which lets tests bind
/// port 0.
pub async fn run_server(
    config: ServerConfig,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    let wire_log = config.wire_log.clone().map(WireLog::spawn);
    let state = Arc::new(ServerState::new(Registry::new(), wire_log));

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    tracing::info!(%bound, "relay listening");
    if let Some(tx) = ready_tx {
        let _ = tx.send(bound);
    }

    serve(listener, state).await
}

/// Accept loop over an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> anyhow::Result<()> {
    loop {
        let (socket, addr) = listener.accept().await?;
        tracing::debug!(%addr, "connection accepted");

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(err) = handle_client(socket, addr, state).await {
                tracing::warn!(%addr, %err, "connection error");
            }
            tracing::debug!(%addr, "connection closed");
        });
    }
}

async fn handle_client(socket: TcpStream, addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let (reader, mut writer) = tokio::io::split(socket);
    let mut reader = BufReader::new(reader);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let write_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if writer.write_all(b"\n").await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });

    let peer = addr.to_string();
    let name = match register(&mut reader, &peer, &tx, &state).await {
        Ok(Some(name)) => name,
        Ok(None) => {
            drop(tx);
            let _ = write_task.await;
            return Ok(());
        }
        Err(err) => {
            write_task.abort();
            return Err(err);
        }
    };

    let result = relay(&mut reader, &name, &state).await;

    {
        let mut hub = state.hub.lock().await;
        hub.outboxes.remove(&name);
        let out = hub.registry.remove(&name);
        hub.dispatch(out);
    }
    drop(tx);
    let _ = write_task.await;
    result
}

/// Prompt for names until one is accepted; `None` on disconnect.
async fn register<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    peer: &str,
    tx: &mpsc::UnboundedSender<String>,
    state: &ServerState,
) -> anyhow::Result<Option<String>> {
    let mut line = String::new();
    loop {
        let prompt = Message::SubmitName.to_string();
        if let Some(log) = &state.wire_log {
            log.record(peer, Direction::Out, &prompt);
        }
        let _ = tx.send(prompt);

        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let candidate = line.trim_end_matches(['\r', '\n']);
        state.log_in(peer, candidate);

        let mut hub = state.hub.lock().await;
        match hub.registry.register(candidate) {
            Ok(out) => {
                hub.outboxes.insert(candidate.to_string(), tx.clone());
                hub.dispatch(out);
                return Ok(Some(candidate.to_string()));
            }
            Err(err) => tracing::warn!(%peer, %err, "name rejected"),
        }
    }
}

async fn relay<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    name: &str,
    state: &ServerState,
) -> anyhow::Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let raw = line.trim_end_matches(['\r', '\n']);
        if raw.is_empty() {
            continue;
        }
        state.log_in(name, raw);

        let message = match Message::parse(raw) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(%name, %err, "ignoring line");
                continue;
            }
        };

        let mut hub = state.hub.lock().await;
        match hub.registry.handle(name, message) {
            Ok(out) => hub.dispatch(out),
            Err(err @ RegistryError::BarrierDiverged { .. }) => {
                tracing::error!(%name, %err, "aborting match");
                let out = hub.registry.end_match(name, true);
                hub.dispatch(out);
            }
            Err(err @ (RegistryError::NotInMatch(_) | RegistryError::Unexpected { .. })) => {
                tracing::debug!(%name, %err, "ignoring message");
            }
            Err(err) => tracing::warn!(%name, %err, "rejected message"),
        }
    }
}
