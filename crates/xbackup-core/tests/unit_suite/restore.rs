//! Restore tests.
//!
//! Restores from an ineligible state must leave the server alone: no stop,
//! no wipe, no copy-back.

use xbackup_core::record::RECORD_FILE;
use xbackup_core::{BackupRecord, BackupStatus, DatabaseServer, Error, PrepareMode};

use super::helpers::{FakeServer, Harness};

async fn prepared_backup(h: &Harness, mode: PrepareMode) -> BackupRecord {
    let mut backup = h.manager.backup_full(&h.server).await.unwrap();
    h.manager.prepare(&mut backup, mode).await.unwrap();
    backup
}

#[tokio::test]
async fn ineligible_states_short_circuit() {
    for status in [
        BackupStatus::FullBackup,
        BackupStatus::IncBackup,
        BackupStatus::Merged,
        BackupStatus::PrepareFailed,
        BackupStatus::Unknown,
    ] {
        let h = Harness::new().await;
        let mut backup = h.manager.backup_full(&h.server).await.unwrap();
        backup.status = status;
        let events_before = h.journal.events();

        let err = h.manager.restore(&mut backup, &h.server).await.unwrap_err();

        match err {
            Error::IneligibleRestoreState {
                status: ref reported,
                ..
            } => assert_eq!(reported, status.as_str()),
            other => panic!("{status}: unexpected error {other:?}"),
        }
        assert_eq!(h.server.data_entries(), 2, "{status}: data dir was touched");
        assert_eq!(h.journal.events(), events_before, "{status}: side effects ran");
        assert!(h.runner.calls().iter().all(|c| !c.has_arg("--copy-back")));
    }
}

#[tokio::test]
async fn unrecognised_persisted_status_is_refused() {
    let h = Harness::new().await;
    h.manager.backup_full(&h.server).await.unwrap();

    let path = h.backup_root().join("backup0").join(RECORD_FILE);
    let stored = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, stored.replace("\"full-backup\"", "\"half-restored\"")).unwrap();

    let mut backup = h.manager.load("backup0").await.unwrap();
    assert_eq!(backup.status, BackupStatus::Unknown);

    let err = h.manager.restore(&mut backup, &h.server).await.unwrap_err();
    assert!(matches!(err, Error::IneligibleRestoreState { .. }));
    assert_eq!(h.server.data_entries(), 2);
}

#[tokio::test]
async fn restore_brackets_copy_back_with_stop_and_start() {
    for mode in [PrepareMode::RedoOnly, PrepareMode::Finalize] {
        let h = Harness::new().await;
        let mut backup = prepared_backup(&h, mode).await;

        let output = h.manager.restore(&mut backup, &h.server).await.unwrap();

        assert!(output.success());
        assert_eq!(
            output.log_path,
            h.backup_root().join("backup0").join("restore0")
        );
        assert_eq!(h.server.data_entries(), 0);

        let events = h.journal.events();
        assert_eq!(
            &events[events.len() - 3..],
            ["stop", "run --copy-back", "start"]
        );

        let copy_back = h.runner.calls().pop().unwrap();
        assert!(copy_back.has_arg("--copy-back"));
        assert!(copy_back.has_arg(&format!(
            "--defaults-file={}",
            h.server.config_file().display()
        )));
    }
}

#[tokio::test]
async fn failed_copy_back_reports_output_and_restarts_server() {
    let h = Harness::new().await;
    let mut backup = prepared_backup(&h, PrepareMode::Finalize).await;
    h.runner.exit_next(1);

    let err = h.manager.restore(&mut backup, &h.server).await.unwrap_err();

    assert!(matches!(err, Error::NonZeroExit { code: Some(1), .. }));
    assert!(err.output().unwrap().contains("--copy-back"));
    assert!(err.log_path().unwrap().exists());
    assert_eq!(h.journal.events().last().unwrap(), "start");
    assert_eq!(backup.last_exit_code, Some(1));
    // Still prepared, the restore can be retried
    assert_eq!(backup.status, BackupStatus::Prepared);
}

#[tokio::test]
async fn restart_failure_is_reported_after_successful_copy_back() {
    let mut h = Harness::new().await;
    let mut backup = prepared_backup(&h, PrepareMode::Finalize).await;
    h.server = FakeServer::new(h.temp_dir.path(), h.journal.clone()).failing_start();

    let err = h.manager.restore(&mut backup, &h.server).await.unwrap_err();

    assert!(matches!(err, Error::Server(_)));
    assert_eq!(backup.last_exit_code, Some(0));
}

#[tokio::test]
async fn copy_back_failure_wins_over_restart_failure() {
    let mut h = Harness::new().await;
    let mut backup = prepared_backup(&h, PrepareMode::Finalize).await;
    h.server = FakeServer::new(h.temp_dir.path(), h.journal.clone()).failing_start();
    h.runner.exit_next(1);

    let err = h.manager.restore(&mut backup, &h.server).await.unwrap_err();

    assert!(matches!(err, Error::NonZeroExit { code: Some(1), .. }));
    let events = h.journal.events();
    assert_eq!(
        &events[events.len() - 3..],
        ["stop", "run --copy-back", "start"]
    );
}

#[tokio::test]
async fn unsaved_record_does_not_hide_copy_back_failure() {
    let h = Harness::new().await;
    let mut backup = prepared_backup(&h, PrepareMode::Finalize).await;
    // A directory in place of the record makes every save fail
    let record_path = h.backup_root().join("backup0").join(RECORD_FILE);
    std::fs::remove_file(&record_path).unwrap();
    std::fs::create_dir(&record_path).unwrap();
    h.runner.exit_next(1);

    let err = h.manager.restore(&mut backup, &h.server).await.unwrap_err();

    assert!(matches!(err, Error::NonZeroExit { code: Some(1), .. }));
    assert!(err.output().unwrap().contains("--copy-back"));
    assert_eq!(h.journal.events().last().unwrap(), "start");
}

#[tokio::test]
async fn repeated_restores_get_separate_logs() {
    let h = Harness::new().await;
    let mut backup = prepared_backup(&h, PrepareMode::Finalize).await;

    h.manager.restore(&mut backup, &h.server).await.unwrap();
    let second = h.manager.restore(&mut backup, &h.server).await.unwrap();

    assert_eq!(
        second.log_path,
        h.backup_root().join("backup0").join("restore1")
    );
}
