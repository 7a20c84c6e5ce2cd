//! Client side of the line protocol
//!
//! [`Connection::connect`] performs the name handshake and returns the
//! roster the relay sent along with `NAMEACCEPTED`. After that the
//! connection is split into an owned reader and writer so receiving and
//! sending can live on different tasks.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::protocol::Message;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by relay")]
    Closed,

    #[error("name {0:?} was rejected")]
    NameRejected(String),

    #[error("unexpected handshake message {0:?}")]
    Handshake(String),
}

/// Receiving half; invalid lines are logged and skipped.
#[derive(Debug)]
pub struct MessageReader {
    reader: BufReader<OwnedReadHalf>,
    line: String,
}

impl MessageReader {
    /// Next valid message, or `None` once the relay hangs up.
    pub async fn recv(&mut self) -> Result<Option<Message>, ClientError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }
            match Message::parse(&self.line) {
                Ok(message) => {
                    tracing::trace!(%message, "recv");
                    return Ok(Some(message));
                }
                Err(err) => tracing::warn!(%err, "ignoring line from relay"),
            }
        }
    }
}

/// Sending half
#[derive(Debug)]
pub struct MessageWriter {
    writer: OwnedWriteHalf,
}

impl MessageWriter {
    pub async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        tracing::trace!(%message, "send");
        self.send_line(&message.to_string()).await
    }

    async fn send_line(&mut self, line: &str) -> Result<(), ClientError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// A registered connection to the relay
#[derive(Debug)]
pub struct Connection {
    pub name: String,
    /// Roster announcements received before `NAMEACCEPTED`
    pub roster: Vec<Message>,
    reader: MessageReader,
    writer: MessageWriter,
}

impl Connection {
    /// Connect and register as `name`.
    pub async fn connect(addr: SocketAddr, name: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        let mut reader = MessageReader {
            reader: BufReader::new(read),
            line: String::new(),
        };
        let mut writer = MessageWriter { writer: write };

        match reader.recv().await? {
            Some(Message::SubmitName) => {}
            Some(other) => return Err(ClientError::Handshake(other.to_string())),
            None => return Err(ClientError::Closed),
        }
        writer.send_line(name).await?;

        let mut roster = Vec::new();
        loop {
            match reader.recv().await? {
                Some(Message::NameAccepted) => break,
                Some(Message::SubmitName) => return Err(ClientError::NameRejected(name.to_string())),
                Some(message @ (Message::NewClient { .. } | Message::Busy(_))) => roster.push(message),
                Some(other) => tracing::debug!(message = %other, "skipping during handshake"),
                None => return Err(ClientError::Closed),
            }
        }
        tracing::info!(%name, peers = roster.len(), "registered with relay");

        Ok(Self {
            name: name.to_string(),
            roster,
            reader,
            writer,
        })
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        self.writer.send(message).await
    }

    pub async fn recv(&mut self) -> Result<Option<Message>, ClientError> {
        self.reader.recv().await
    }

    pub fn into_split(self) -> (MessageReader, MessageWriter) {
        (self.reader, self.writer)
    }
}
