//! JSON-lines record of relayed traffic
//!
//! Writes happen on a background task so a slow disk never stalls a
//! connection; records are dropped if the file cannot be opened.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    pub ts_ms: u64,
    pub peer: String,
    pub dir: Direction,
    pub line: String,
}

/// Cloneable sender side of the log task
#[derive(Debug, Clone)]
pub struct WireLog {
    tx: mpsc::UnboundedSender<WireRecord>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl WireLog {
    /// Spawn the writer task appending to `path`.
    pub fn spawn(path: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WireRecord>();
        tokio::spawn(async move {
            let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
                Ok(f) => f,
                Err(err) => {
                    tracing::warn!(%path, %err, "wire log disabled");
                    return;
                }
            };

            let mut buf: Vec<u8> = Vec::with_capacity(256);
            while let Some(record) = rx.recv().await {
                buf.clear();
                if serde_json::to_writer(&mut buf, &record).is_err() {
                    continue;
                }
                buf.push(b'\n');
                if file.write_all(&buf).await.is_err() || file.flush().await.is_err() {
                    break;
                }
            }
        });
        Self { tx }
    }

    pub fn record(&self, peer: &str, dir: Direction, line: &str) {
        let _ = self.tx.send(WireRecord {
            ts_ms: now_ms(),
            peer: peer.to_string(),
            dir,
            line: line.to_string(),
        });
    }
}
