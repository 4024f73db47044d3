//! Unit tests for log.rs
//!
//! Tests Logger trait, LogEntry, LogSeverity, DefaultLogger and the global
//! logger dispatch used by the engine_* macros.
//!
//! IMPORTANT: the global logger is shared across all tests. Tests that
//! replace it are marked #[serial] to run sequentially.

use crate::log::{log, set_logger, DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::{engine_info, engine_warn};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn install_capture() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    set_logger(Box::new(CaptureLogger {
        entries: Arc::clone(&entries),
    }));
    entries
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_equality() {
    assert_eq!(LogSeverity::Info, LogSeverity::Info);
    assert_ne!(LogSeverity::Info, LogSeverity::Warn);
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_clone_preserves_fields() {
    let entry = LogEntry {
        severity: LogSeverity::Error,
        timestamp: SystemTime::now(),
        source: "meridian3d::test".to_string(),
        message: "something failed".to_string(),
        file: Some("lib.rs"),
        line: Some(42),
    };
    let clone = entry.clone();
    assert_eq!(clone.severity, LogSeverity::Error);
    assert_eq!(clone.source, "meridian3d::test");
    assert_eq!(clone.message, "something failed");
    assert_eq!(clone.file, Some("lib.rs"));
    assert_eq!(clone.line, Some(42));
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_does_not_panic() {
    let logger = DefaultLogger;
    logger.log(&LogEntry {
        severity: LogSeverity::Info,
        timestamp: SystemTime::now(),
        source: "meridian3d::test".to_string(),
        message: "plain message".to_string(),
        file: None,
        line: None,
    });
    logger.log(&LogEntry {
        severity: LogSeverity::Error,
        timestamp: SystemTime::now(),
        source: "meridian3d::test".to_string(),
        message: "detailed message".to_string(),
        file: Some("log_tests.rs"),
        line: Some(1),
    });
}

// ============================================================================
// GLOBAL DISPATCH TESTS
// ============================================================================

#[test]
#[serial]
fn test_set_logger_routes_entries() {
    let entries = install_capture();

    log(LogSeverity::Info, "meridian3d::test", "captured".to_string());

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "captured");
    assert_eq!(captured[0].source, "meridian3d::test");
    assert!(captured[0].file.is_none());

    drop(captured);
    set_logger(Box::new(DefaultLogger));
}

#[test]
#[serial]
fn test_macros_carry_severity_and_formatting() {
    let entries = install_capture();

    engine_info!("meridian3d::test", "frame {} presented", 7);
    engine_warn!("meridian3d::test", "surface suboptimal");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].message, "frame 7 presented");
    assert_eq!(captured[1].severity, LogSeverity::Warn);

    drop(captured);
    set_logger(Box::new(DefaultLogger));
}

#[test]
#[serial]
fn test_engine_error_macro_attaches_location() {
    let entries = install_capture();

    crate::engine_error!("meridian3d::test", "device lost");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert!(captured[0].file.is_some());
    assert!(captured[0].line.is_some());

    drop(captured);
    set_logger(Box::new(DefaultLogger));
}

#[test]
#[serial]
fn test_engine_err_macro_logs_and_returns_error() {
    let entries = install_capture();

    let err = crate::engine_err!("meridian3d::test", "submit failed: {}", "timeout");
    assert_eq!(err.to_string(), "Backend error: submit failed: timeout");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "submit failed: timeout");

    drop(captured);
    set_logger(Box::new(DefaultLogger));
}
