//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::supervisor::DEFAULT_READY_MARKER;

/// Configuration for one supervised guest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestConfig {
    /// Guest executable (e.g. `qemu-system-x86_64`).
    pub program: String,
    /// Arguments for the guest executable.
    pub args: Vec<String>,
    /// Absolute run deadline in seconds; 0 disables the deadline.
    pub timeout_secs: u64,
    /// Where the combined output log is captured.
    pub log_file: PathBuf,
    /// Marker whose appearance in the output signals readiness.
    pub ready_marker: String,
    /// Whether to inject `echo <marker>` after the first shell hint.
    /// Unset means "only when the marker is the built-in default".
    pub inject_marker: Option<bool>,
    /// Command written to the guest once, after readiness. Sent verbatim;
    /// include a trailing newline if the guest shell needs one.
    pub post_ready_send: Option<String>,
    /// Substring awaited in the output after the post-ready send.
    pub post_ready_expect: Option<String>,
    /// Mirror decoded output lines to the supervisor's stdout.
    pub mirror_output: bool,
    /// Forward the supervisor's own stdin to the guest.
    pub pass_stdin: bool,
    /// Output directory for the surface bridge. Absence disables the
    /// surface/window pipeline entirely; readiness handling still runs.
    pub bridge_dir: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    45
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            log_file: PathBuf::from("guest-run.log"),
            ready_marker: DEFAULT_READY_MARKER.to_string(),
            inject_marker: None,
            post_ready_send: None,
            post_ready_expect: None,
            mirror_output: false,
            pass_stdin: false,
            bridge_dir: None,
        }
    }
}

impl GuestConfig {
    /// The run deadline, if one is configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Whether the marker-echo command should be injected.
    ///
    /// Defaults to enabled only for the built-in marker; a custom marker
    /// is assumed to be printed by the guest itself unless overridden.
    #[must_use]
    pub fn inject_marker(&self) -> bool {
        self.inject_marker
            .unwrap_or(self.ready_marker == DEFAULT_READY_MARKER)
    }
}
