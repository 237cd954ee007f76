//! Readiness handshake state machine.
//!
//! Detects that the guest has reached an interactive shell, asks the
//! supervisor to inject a marker-echo command once, and recognizes the
//! marker (and optionally a post-ready expectation) in the output. The
//! machine is linear and idempotent: there is no rollback, and
//! re-observing the marker after `Ready` has no effect.

/// Marker the default guest setup echoes once its shell is live.
pub const DEFAULT_READY_MARKER: &str = "GUEST_READY";

/// Substrings that indicate an interactive shell is (probably) running.
/// These cover the common busybox ash variants seen in initramfs boots.
const SHELL_HINTS: &[&str] = &["job control turned off", "can't access tty"];

/// Current state of the readiness handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadinessState {
    /// No shell hint seen yet.
    #[default]
    WaitingForHint,
    /// A shell hint was observed; the marker command should be injected.
    HintSeen,
    /// The marker command has been injected exactly once.
    MarkerInjected,
    /// The ready marker was observed in the output.
    Ready,
    /// The post-ready command has been sent exactly once.
    PostReadySent,
    /// The post-ready expectation was observed. Terminal.
    PostReadyObserved,
}

/// State machine over the guest's output lines.
#[derive(Debug, Clone)]
pub struct ReadinessController {
    state: ReadinessState,
    ready_marker: String,
    /// Whether a post-ready send step is configured at all.
    has_post_step: bool,
    post_ready_expect: Option<String>,
}

impl ReadinessController {
    #[must_use]
    pub fn new(
        ready_marker: impl Into<String>,
        has_post_step: bool,
        post_ready_expect: Option<String>,
    ) -> Self {
        Self {
            state: ReadinessState::default(),
            ready_marker: ready_marker.into(),
            has_post_step,
            post_ready_expect,
        }
    }

    #[must_use]
    pub fn state(&self) -> ReadinessState {
        self.state
    }

    #[must_use]
    pub fn ready_marker(&self) -> &str {
        &self.ready_marker
    }

    /// Feed one output line and return the resulting state.
    pub fn observe(&mut self, line: &str) -> ReadinessState {
        match self.state {
            ReadinessState::WaitingForHint
            | ReadinessState::HintSeen
            | ReadinessState::MarkerInjected => {
                // The marker can appear from any state, e.g. when a prior
                // run already printed it; it wins over a hint on the same
                // line.
                if line.contains(&self.ready_marker) {
                    self.transition(ReadinessState::Ready);
                } else if self.state == ReadinessState::WaitingForHint
                    && SHELL_HINTS.iter().any(|hint| line.contains(hint))
                {
                    self.transition(ReadinessState::HintSeen);
                }
            }
            ReadinessState::Ready => {}
            ReadinessState::PostReadySent => {
                if self
                    .post_ready_expect
                    .as_deref()
                    .is_some_and(|expect| line.contains(expect))
                {
                    self.transition(ReadinessState::PostReadyObserved);
                }
            }
            ReadinessState::PostReadyObserved => {}
        }
        self.state
    }

    /// Whether the supervisor should inject the marker command now.
    #[must_use]
    pub fn should_inject(&self) -> bool {
        self.state == ReadinessState::HintSeen
    }

    /// Record that the marker command was injected. Idempotent: only
    /// meaningful from `HintSeen`.
    pub fn mark_injected(&mut self) {
        if self.state == ReadinessState::HintSeen {
            self.transition(ReadinessState::MarkerInjected);
        }
    }

    /// Whether the supervisor should send the post-ready command now.
    #[must_use]
    pub fn should_send_post_ready(&self) -> bool {
        self.state == ReadinessState::Ready && self.has_post_step
    }

    /// Record that the post-ready command was sent.
    pub fn mark_post_ready_sent(&mut self) {
        if self.state == ReadinessState::Ready && self.has_post_step {
            self.transition(ReadinessState::PostReadySent);
        }
    }

    /// Whether the run has reached its success condition.
    ///
    /// `Ready` alone is terminal success when no post-ready step is
    /// configured; otherwise the expectation must be observed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self.state {
            ReadinessState::Ready => !self.has_post_step,
            ReadinessState::PostReadyObserved => true,
            _ => false,
        }
    }

    /// Human-readable description of what the controller is waiting for,
    /// used in timeout reports.
    #[must_use]
    pub fn waiting_for(&self) -> String {
        match self.state {
            ReadinessState::PostReadySent => self
                .post_ready_expect
                .clone()
                .unwrap_or_else(|| "post-ready response".to_string()),
            _ => self.ready_marker.clone(),
        }
    }

    fn transition(&mut self, new_state: ReadinessState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "readiness transition");
        self.state = new_state;
    }
}
