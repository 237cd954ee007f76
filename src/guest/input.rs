//! Writes into the guest's stdin.
//!
//! A single task owns the stdin handle; both the supervisor (marker
//! injection, post-ready sends) and the optional raw-stdin passthrough
//! write through its channel. Writes are best-effort: a failure is
//! swallowed because the guest may already have exited, and readiness
//! detection must not die with it.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::ChildStdin;
use tokio::sync::mpsc;

/// Cloneable handle for writing to the guest's stdin.
#[derive(Debug, Clone)]
pub struct InputWriter {
    tx: mpsc::Sender<Vec<u8>>,
}

impl InputWriter {
    /// Spawn the writer task owning `stdin` and return a handle to it.
    #[must_use]
    pub fn spawn(mut stdin: ChildStdin) -> Self {
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(32);
        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                if let Err(e) = stdin.write_all(&bytes).await {
                    tracing::debug!(error = %e, "guest stdin write failed");
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::debug!(error = %e, "guest stdin flush failed");
                    break;
                }
            }
        });
        Self { tx }
    }

    /// Queue bytes for the guest's stdin. Best-effort; if the writer
    /// task has stopped the bytes are dropped silently.
    pub async fn send(&self, bytes: impl Into<Vec<u8>>) {
        if self.tx.send(bytes.into()).await.is_err() {
            tracing::debug!("guest stdin writer closed, dropping write");
        }
    }
}

/// Forward the supervisor's own stdin to the guest, line by line.
///
/// Runs until EOF on stdin or until the guest side goes away. Only
/// started when raw-stdin passthrough is enabled.
pub fn spawn_stdin_pump(writer: InputWriter) {
    tokio::spawn(async move {
        let mut stdin = BufReader::new(tokio::io::stdin());
        loop {
            let mut bytes = Vec::new();
            match stdin.read_until(b'\n', &mut bytes).await {
                Ok(0) => break,
                Ok(_) => writer.send(bytes).await,
                Err(e) => {
                    tracing::debug!(error = %e, "stdin passthrough read failed");
                    break;
                }
            }
        }
    });
}
