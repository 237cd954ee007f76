//! Supervisor module tests.

mod run_test;

/// Verify all public supervisor types are exported from the library.
#[test]
fn test_all_supervisor_types_exported() {
    use guest_bridge::supervisor::{
        GuestSupervisor, ReadinessController, ReadinessState, RunLog, RunLogError, RunOutcome,
        SupervisorError, DEFAULT_READY_MARKER, DEFAULT_TERMINATE_TIMEOUT,
    };

    let _ = ReadinessController::new(DEFAULT_READY_MARKER, false, None);
    let _ = ReadinessState::default();
    let _ = GuestSupervisor::new(guest_bridge::config::GuestConfig::default());
    assert!(DEFAULT_TERMINATE_TIMEOUT.as_secs() >= 1);

    let _ = RunOutcome::Ready;
    let _: fn() -> SupervisorError = || SupervisorError::NoStdio;
    let _: fn() -> Result<RunLog, RunLogError> = || RunLog::create("/tmp/guest-bridge-test.log");
}
