use logger::{Error, Severity};
use std::fs;
use tempfile::TempDir;

// Global installation is once per process, so this binary holds one test.
#[test]
fn install_global_routes_tracing_and_refuses_a_second_install() {
    let tmp = TempDir::new().unwrap();
    let loggers = logger::init(tmp.path(), "info.log", "err.log", 10, 5, 30, Severity::Info);
    loggers.install_global().unwrap();

    tracing::info!(job = "compaction", "job finished");
    tracing::error!("job crashed");

    let again = logger::init(tmp.path(), "other.log", "other-err.log", 10, 5, 30, Severity::Debug);
    assert!(matches!(again.install_global(), Err(Error::LogBridgeAlreadySet)));

    let info = fs::read_to_string(tmp.path().join("info.log")).unwrap();
    let err = fs::read_to_string(tmp.path().join("err.log")).unwrap();
    assert_eq!(info.lines().count(), 1);
    assert!(info.contains("\"job\":\"compaction\""));
    assert_eq!(err.lines().count(), 1);
    assert!(err.contains("\"stacktrace\""));
}
