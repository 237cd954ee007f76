//! Combined output stream for the guest process.
//!
//! Stdout and stderr are funneled into a single channel of raw
//! newline-delimited chunks so the supervisor sees one merged stream,
//! the way QEMU's `-serial stdio` output is consumed. Bytes are
//! preserved exactly as read; decoding to text is lossy and happens
//! only on the consumer side.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc::{self, Receiver, Sender};

/// Default buffer size for the output channel.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// One newline-delimited chunk of raw guest output.
///
/// The bytes include the trailing newline when one was read; the final
/// chunk before EOF may lack it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub bytes: Vec<u8>,
}

impl OutputChunk {
    /// Decode to text for line processing, dropping only the trailing
    /// newline. A carriage return stays: frame content must byte-match
    /// what a CRLF serial guest emitted. Invalid UTF-8 is replaced,
    /// never dropped from the raw log.
    #[must_use]
    pub fn text(&self) -> String {
        let text = String::from_utf8_lossy(&self.bytes);
        text.trim_end_matches('\n').to_string()
    }
}

/// Merge the guest's stdout and stderr into one chunk channel.
///
/// The channel closes once both pipes reach EOF, which is the
/// supervisor's signal that the guest has exited.
#[must_use]
pub fn merge_output(
    stdout: ChildStdout,
    stderr: ChildStderr,
    buffer: usize,
) -> Receiver<OutputChunk> {
    let (tx, rx) = mpsc::channel(buffer);
    tokio::spawn(read_chunks(stdout, tx.clone()));
    tokio::spawn(read_chunks(stderr, tx));
    rx
}

async fn read_chunks<R>(reader: R, tx: Sender<OutputChunk>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    loop {
        let mut bytes = Vec::new();
        match reader.read_until(b'\n', &mut bytes).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(OutputChunk { bytes }).await.is_err() {
                    // Receiver gone; the run is over.
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "guest output read failed");
                break;
            }
        }
    }
}
