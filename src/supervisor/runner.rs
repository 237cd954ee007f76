//! Supervisor runner for orchestrating the guest run.
//!
//! This is the single sequential loop that drives all protocol-state
//! mutation: each output line is fully processed (durable log, readiness,
//! bridge decode) before the next is read. The only concurrency is the
//! stdin plumbing, which shares nothing with the loop but the guest's
//! pipes.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::Receiver;

use crate::bridge::{BridgeError, SurfaceBridge};
use crate::config::GuestConfig;
use crate::guest::{
    merge_output, spawn_stdin_pump, GuestCommand, GuestProcess, InputWriter, OutputChunk,
    SpawnError, DEFAULT_CHANNEL_BUFFER,
};
use crate::supervisor::{ReadinessController, ReadinessState, RunLog, RunLogError};

/// Default timeout for graceful guest termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// The guest could not be spawned.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// The guest's stdio pipes were not available.
    #[error("guest stdio not available")]
    NoStdio,
    /// The durable output log could not be written.
    #[error(transparent)]
    Log(#[from] RunLogError),
    /// The surface bridge could not be opened.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    /// Waiting on or reaping the guest failed.
    #[error("guest process error: {0}")]
    Process(#[source] std::io::Error),
    /// The deadline passed before the success condition was met.
    /// Reported distinctly so callers can name the expected marker and
    /// point at the captured log.
    #[error("timed out after {elapsed:?} waiting for {waiting_for:?} (log: {})", log_path.display())]
    Timeout {
        waiting_for: String,
        elapsed: Duration,
        log_path: PathBuf,
    },
}

/// How a supervised run ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The ready marker was observed and no post-ready step is configured.
    Ready,
    /// The post-ready expectation was observed.
    PostReadyObserved,
    /// The guest exited on its own before the success condition.
    GuestExited { code: i32 },
}

impl RunOutcome {
    /// The process exit code this outcome maps to.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Ready | Self::PostReadyObserved => 0,
            Self::GuestExited { code } => *code,
        }
    }
}

/// Per-run mutable state, bundled so the shutdown path can always reach
/// the process and the bridge no matter how the loop ended.
struct RunState {
    process: GuestProcess,
    output: Receiver<OutputChunk>,
    input: InputWriter,
    readiness: ReadinessController,
    log: RunLog,
    bridge: Option<SurfaceBridge>,
}

/// Supervisor for one guest run.
pub struct GuestSupervisor {
    config: GuestConfig,
}

impl GuestSupervisor {
    #[must_use]
    pub fn new(config: GuestConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GuestConfig {
        &self.config
    }

    /// Run the guest to one of: success condition met, guest exit,
    /// deadline exceeded, or fatal transport error.
    ///
    /// Whatever happens, the shutdown sequence runs before returning:
    /// the bridge is flushed and closed (partial policy for any open
    /// frame) and the guest is terminated gracefully, then forcibly.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError` for spawn/log/bridge-setup failures,
    /// pipe errors, and deadline expiry.
    pub async fn run(&self) -> Result<RunOutcome, SupervisorError> {
        let started = Instant::now();

        let log = RunLog::create(&self.config.log_file)?;
        let bridge = match &self.config.bridge_dir {
            Some(dir) => Some(SurfaceBridge::new(dir)?),
            None => None,
        };

        let mut process = GuestCommand::new(&self.config.program)
            .args(self.config.args.iter().cloned())
            .spawn()?;
        tracing::info!(
            program = %self.config.program,
            pid = process.id(),
            "guest spawned"
        );

        let stdout = process.take_stdout().ok_or(SupervisorError::NoStdio)?;
        let stderr = process.take_stderr().ok_or(SupervisorError::NoStdio)?;
        let stdin = process.take_stdin().ok_or(SupervisorError::NoStdio)?;

        let output = merge_output(stdout, stderr, DEFAULT_CHANNEL_BUFFER);
        let input = InputWriter::spawn(stdin);
        if self.config.pass_stdin {
            spawn_stdin_pump(input.clone());
        }

        let readiness = ReadinessController::new(
            self.config.ready_marker.clone(),
            self.config.post_ready_send.is_some(),
            self.config.post_ready_expect.clone(),
        );

        let mut state = RunState {
            process,
            output,
            input,
            readiness,
            log,
            bridge,
        };

        let deadline = self
            .config
            .timeout()
            .map(|timeout| tokio::time::Instant::now() + timeout);

        let result = self.drive(&mut state, deadline, started).await;

        // Shutdown sequence, success or failure: flush the bridge, then
        // terminate the guest gracefully with a forced fallback.
        if let Some(bridge) = state.bridge.as_mut() {
            if let Err(e) = bridge.close() {
                tracing::error!(error = %e, "failed to close surface bridge");
            }
        }
        if let Err(e) = state
            .process
            .graceful_terminate(DEFAULT_TERMINATE_TIMEOUT)
            .await
        {
            tracing::warn!(error = %e, "guest termination failed");
        }

        result
    }

    async fn drive(
        &self,
        state: &mut RunState,
        deadline: Option<tokio::time::Instant>,
        started: Instant,
    ) -> Result<RunOutcome, SupervisorError> {
        loop {
            let chunk = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, state.output.recv()).await {
                        Ok(chunk) => chunk,
                        Err(_) => {
                            return Err(SupervisorError::Timeout {
                                waiting_for: state.readiness.waiting_for(),
                                elapsed: started.elapsed(),
                                log_path: state.log.path().to_path_buf(),
                            });
                        }
                    }
                }
                None => state.output.recv().await,
            };

            let Some(chunk) = chunk else {
                // Both pipes hit EOF. Usually the guest exited, but a
                // guest that closed its stdio and kept running must not
                // stall past the deadline, so the reap is bounded too.
                let status = match deadline {
                    Some(deadline) => {
                        match tokio::time::timeout_at(deadline, state.process.wait()).await {
                            Ok(status) => status,
                            Err(_) => {
                                return Err(SupervisorError::Timeout {
                                    waiting_for: state.readiness.waiting_for(),
                                    elapsed: started.elapsed(),
                                    log_path: state.log.path().to_path_buf(),
                                });
                            }
                        }
                    }
                    None => state.process.wait().await,
                }
                .map_err(SupervisorError::Process)?;
                let code = status.code().unwrap_or(1);
                tracing::info!(code, "guest exited before readiness");
                return Ok(RunOutcome::GuestExited { code });
            };

            // Durable log first; the raw bytes are never dropped.
            state.log.append(&chunk.bytes)?;
            let line = chunk.text();

            if self.config.mirror_output {
                println!("{line}");
            }

            state.readiness.observe(&line);

            let mut bridge_failed = false;
            if let Some(bridge) = state.bridge.as_mut() {
                if let Err(e) = bridge.on_line(&line) {
                    // Fatal to the bridge only; readiness detection must
                    // keep running without it.
                    tracing::error!(error = %e, "surface bridge failed, continuing without it");
                    bridge_failed = true;
                }
            }
            if bridge_failed {
                state.bridge = None;
            }

            if state.readiness.is_complete() {
                let outcome = if state.readiness.state() == ReadinessState::PostReadyObserved {
                    RunOutcome::PostReadyObserved
                } else {
                    RunOutcome::Ready
                };
                tracing::info!(?outcome, elapsed = ?started.elapsed(), "success condition met");
                return Ok(outcome);
            }

            if self.config.inject_marker() && state.readiness.should_inject() {
                let command = format!("echo {}\n", self.config.ready_marker);
                state.input.send(command.into_bytes()).await;
                state.readiness.mark_injected();
                tracing::info!(marker = %self.config.ready_marker, "injected readiness marker command");
            }

            if state.readiness.should_send_post_ready() {
                if let Some(send) = &self.config.post_ready_send {
                    state.input.send(send.clone().into_bytes()).await;
                }
                state.readiness.mark_post_ready_sent();
                tracing::info!("sent post-ready command");
            }
        }
    }
}
