//! Bridge from the guest's surface-protocol lines to durable state.
//!
//! The bridge consumes one decoded output line at a time, mutates the
//! in-memory registry, reassembles frame content, and makes every
//! mutation durable immediately: each frame flush writes its artifact
//! and every registry mutation fully rewrites the snapshot file, so an
//! external observer polling the output directory always sees a
//! consistent state.

mod event;
mod frame;
mod registry;
mod snapshot;

pub use event::*;
pub use frame::*;
pub use registry::*;
pub use snapshot::*;

use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// Error type for bridge persistence operations.
///
/// These are fatal to the bridge only; protocol-level problems (malformed
/// lines, mismatched frame ends) are recovered locally and never surface
/// here.
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    /// Could not create the output directory tree.
    #[error("failed to create bridge directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Could not write a frame artifact.
    #[error("failed to write frame artifact {path}: {source}")]
    WriteFrame {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Could not write the registry snapshot.
    #[error("failed to write registry snapshot {path}: {source}")]
    WriteRegistry {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Could not encode the registry snapshot.
    #[error("failed to encode registry snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// How to close an in-progress frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushPolicy {
    /// Drop the frame silently if it accumulated no content lines.
    NonPartial,
    /// Always write the artifact, even for an empty frame. Used only
    /// when the bridge itself is closed.
    Partial,
}

/// Incremental, line-based surface bridge.
pub struct SurfaceBridge {
    out_dir: PathBuf,
    frames_dir: PathBuf,
    registry: SurfaceRegistry,
    /// The one frame that may be in progress. Owned here so the close
    /// path can flush it; frames are never interleaved.
    current: Option<FrameBuffer>,
}

impl SurfaceBridge {
    /// Open a bridge writing under `out_dir`, creating the directory
    /// tree as needed.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::CreateDir` if the output tree cannot be created.
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self, BridgeError> {
        let out_dir = out_dir.into();
        let frames_dir = out_dir.join("frames");
        std::fs::create_dir_all(&frames_dir).map_err(|source| BridgeError::CreateDir {
            path: frames_dir.clone(),
            source,
        })?;
        Ok(Self {
            out_dir,
            frames_dir,
            registry: SurfaceRegistry::new(),
            current: None,
        })
    }

    /// The current in-memory registry.
    #[must_use]
    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    /// Path of the persisted registry snapshot.
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.out_dir.join("registry.json")
    }

    /// Feed one output line.
    ///
    /// Protocol lines mutate the registry or frame state; malformed tag
    /// lines are consumed and ignored; anything else is frame content
    /// while a frame is open and noise otherwise. Only the newline is
    /// stripped from content, so CRLF guests byte-match their artifacts.
    ///
    /// # Errors
    ///
    /// Returns a `BridgeError` only for artifact/snapshot I/O failures.
    pub fn on_line(&mut self, line: &str) -> Result<(), BridgeError> {
        let line = line.trim_end_matches('\n');
        match SurfaceEvent::decode(line) {
            DecodedLine::Event(event) => self.apply(event),
            DecodedLine::Malformed { tag } => {
                // A begin tag always interrupts the open frame, even when
                // its own id is unusable.
                if tag == ProtocolTag::FrameBegin {
                    self.flush_current(FlushPolicy::NonPartial)?;
                }
                tracing::debug!(?tag, "ignoring malformed protocol line");
                Ok(())
            }
            DecodedLine::Noise => {
                if let Some(frame) = &mut self.current {
                    frame.push_line(line);
                }
                Ok(())
            }
        }
    }

    fn apply(&mut self, event: SurfaceEvent) -> Result<(), BridgeError> {
        match event {
            SurfaceEvent::FrameBegin { id, seq } => {
                // An interrupting begin force-flushes whatever is open.
                self.flush_current(FlushPolicy::NonPartial)?;
                self.current = Some(FrameBuffer::new(FrameKey {
                    surface_id: id,
                    seq,
                }));
                Ok(())
            }
            SurfaceEvent::FrameEnd { id, seq } => {
                let matches = self.current.as_ref().is_some_and(|frame| {
                    frame.key().seq == seq
                        && id
                            .as_deref()
                            .map_or(true, |end_id| end_id == frame.key().surface_id)
                });
                if matches {
                    self.flush_current(FlushPolicy::NonPartial)?;
                } else if self.current.is_some() {
                    tracing::debug!(?id, seq, "ignoring mismatched FRAME_END");
                }
                Ok(())
            }
            SurfaceEvent::Destroy { ref id } => {
                // Discard any in-flight frame for this surface; no artifact.
                if self
                    .current
                    .as_ref()
                    .is_some_and(|frame| frame.key().surface_id == *id)
                {
                    tracing::debug!(surface_id = %id, "discarding open frame of destroyed surface");
                    self.current = None;
                }
                self.registry.apply(&event);
                self.write_registry()
            }
            _ => {
                self.registry.apply(&event);
                self.write_registry()
            }
        }
    }

    /// Shut the bridge down: flush any open frame with the partial policy
    /// and write a final snapshot.
    ///
    /// # Errors
    ///
    /// Returns a `BridgeError` if the final artifact or snapshot write fails.
    pub fn close(&mut self) -> Result<(), BridgeError> {
        self.flush_current(FlushPolicy::Partial)?;
        self.write_registry()
    }

    fn flush_current(&mut self, policy: FlushPolicy) -> Result<(), BridgeError> {
        let Some(frame) = self.current.take() else {
            return Ok(());
        };
        if frame.is_empty() && policy == FlushPolicy::NonPartial {
            tracing::debug!(
                surface_id = %frame.key().surface_id,
                seq = frame.key().seq,
                "dropping empty frame"
            );
            return Ok(());
        }

        let content = frame.render();
        let sha256 = hex::encode(Sha256::digest(content.as_bytes()));
        let file_name = format!(
            "surface-{}-seq-{}.ppm",
            frame.key().surface_id,
            frame.key().seq
        );
        let path = self.frames_dir.join(&file_name);
        std::fs::write(&path, &content).map_err(|source| BridgeError::WriteFrame {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(
            surface_id = %frame.key().surface_id,
            seq = frame.key().seq,
            %sha256,
            "flushed frame artifact"
        );
        let relative = format!("frames/{file_name}");
        self.registry
            .record_frame(&frame.key().surface_id, frame.key().seq, &sha256, &relative);
        self.write_registry()
    }

    fn write_registry(&self) -> Result<(), BridgeError> {
        let snapshot = RegistrySnapshot::render(&self.registry);
        let path = self.registry_path();
        let mut json = serde_json::to_string_pretty(&snapshot)?;
        json.push('\n');
        std::fs::write(&path, json).map_err(|source| BridgeError::WriteRegistry {
            path: path.clone(),
            source,
        })
    }
}

impl std::fmt::Debug for SurfaceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceBridge")
            .field("out_dir", &self.out_dir)
            .field("open_frame", &self.current.as_ref().map(FrameBuffer::key))
            .finish_non_exhaustive()
    }
}

/// Hash artifact bytes the way the bridge does.
#[must_use]
pub fn content_sha256(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
