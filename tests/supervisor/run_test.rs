//! End-to-end supervisor runs against a shell standing in for the guest.

#![cfg(unix)]

use std::time::Duration;

use guest_bridge::config::GuestConfig;
use guest_bridge::supervisor::{GuestSupervisor, RunOutcome, SupervisorError};
use tempfile::TempDir;

fn sh_config(dir: &TempDir, script: &str) -> GuestConfig {
    GuestConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        log_file: dir.path().join("run.log"),
        timeout_secs: 20,
        ..GuestConfig::default()
    }
}

#[tokio::test]
async fn marker_in_output_is_success() {
    let dir = tempfile::tempdir().unwrap();
    let config = sh_config(&dir, "echo booting; echo GUEST_READY; sleep 10");
    let outcome = GuestSupervisor::new(config).run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Ready);

    let log = std::fs::read_to_string(dir.path().join("run.log")).unwrap();
    assert!(log.contains("booting"));
    assert!(log.contains("GUEST_READY"));
}

#[tokio::test]
async fn shell_hint_triggers_exactly_one_injection() {
    let dir = tempfile::tempdir().unwrap();
    // The fake guest prints the hint, then executes whatever the
    // supervisor injects, which echoes the marker back at us.
    let script = r#"echo "sh: can't access tty; job control turned off"; read line; eval "$line"; sleep 10"#;
    let mut config = sh_config(&dir, script);
    config.ready_marker = "RAYOS_READY".to_string();
    config.inject_marker = Some(true);

    let outcome = GuestSupervisor::new(config).run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Ready);

    let log = std::fs::read_to_string(dir.path().join("run.log")).unwrap();
    assert_eq!(log.matches("RAYOS_READY").count(), 1);
}

#[tokio::test]
async fn guest_exit_code_is_passed_through() {
    let dir = tempfile::tempdir().unwrap();
    let config = sh_config(&dir, "echo no marker here; exit 7");
    let outcome = GuestSupervisor::new(config).run().await.unwrap();
    assert_eq!(outcome, RunOutcome::GuestExited { code: 7 });
    assert_eq!(outcome.exit_code(), 7);
}

#[tokio::test]
async fn deadline_expiry_reports_a_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = sh_config(&dir, "sleep 30");
    config.timeout_secs = 1;

    let err = GuestSupervisor::new(config).run().await.unwrap_err();
    match err {
        SupervisorError::Timeout {
            waiting_for,
            elapsed,
            log_path,
        } => {
            assert_eq!(waiting_for, "GUEST_READY");
            assert!(elapsed >= Duration::from_secs(1));
            assert_eq!(log_path, dir.path().join("run.log"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn deadline_holds_when_guest_closes_its_pipes_but_lives() {
    let dir = tempfile::tempdir().unwrap();
    // Stdout and stderr hit EOF immediately while the guest keeps
    // running; the run must still end at its own deadline.
    let mut config = sh_config(&dir, "exec >/dev/null 2>&1; sleep 30");
    config.timeout_secs = 1;

    let supervisor = GuestSupervisor::new(config);
    let run = supervisor.run();
    let err = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run must end at its own deadline")
        .unwrap_err();
    assert!(matches!(err, SupervisorError::Timeout { .. }));
}

#[tokio::test]
async fn post_ready_exchange_completes() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"echo BOOT_OK; read line; echo "reply:$line"; sleep 10"#;
    let mut config = sh_config(&dir, script);
    config.ready_marker = "BOOT_OK".to_string();
    config.post_ready_send = Some("ping\n".to_string());
    config.post_ready_expect = Some("reply:ping".to_string());

    let outcome = GuestSupervisor::new(config).run().await.unwrap();
    assert_eq!(outcome, RunOutcome::PostReadyObserved);
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn stderr_is_part_of_the_combined_stream() {
    let dir = tempfile::tempdir().unwrap();
    let config = sh_config(&dir, "echo GUEST_READY 1>&2; sleep 10");
    let outcome = GuestSupervisor::new(config).run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Ready);
}

#[tokio::test]
async fn bridge_decodes_protocol_lines_during_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let script = concat!(
        "printf 'CREATE id=1 role=toplevel w=64 h=32\\n",
        "FOCUS id=1 focused=true\\n",
        "FRAME_BEGIN id=1 seq=0\\npixels\\nFRAME_END id=1 seq=0\\n",
        "GUEST_READY\\n'; sleep 10"
    );
    let mut config = sh_config(&dir, script);
    config.bridge_dir = Some(dir.path().join("surfaces"));

    let outcome = GuestSupervisor::new(config).run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Ready);

    let registry: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("surfaces").join("registry.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(registry["focused_window_id"], "win-1");
    assert_eq!(registry["surfaces"]["1"]["latest_seq"], 0);
    assert!(dir
        .path()
        .join("surfaces")
        .join("frames")
        .join("surface-1-seq-0.ppm")
        .exists());
}

#[tokio::test]
async fn missing_guest_binary_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = sh_config(&dir, "true");
    config.program = "definitely-not-a-real-guest-binary".to_string();

    let err = GuestSupervisor::new(config).run().await.unwrap_err();
    assert!(matches!(err, SupervisorError::Spawn(_)));
}
