use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {}",
            self.timestamp.to_rfc3339(),
            self.severity,
            self.message
        )
    }
}

enum Sink {
    File(Mutex<File>),
    Memory(Mutex<Vec<AuditRecord>>),
}

/// Append-only audit trail of every magnet write, rejection and zeroing outcome.
///
/// Cheap to clone; all clones share one sink. Every record is mirrored to the
/// `log` facade.
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<Sink>,
}

impl AuditLog {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Arc::new(Sink::File(Mutex::new(file))),
        })
    }

    /// Keeps records in memory; used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            sink: Arc::new(Sink::Memory(Mutex::new(Vec::new()))),
        }
    }

    pub fn record(&self, severity: Severity, message: impl Into<String>) {
        let record = AuditRecord {
            timestamp: Local::now(),
            severity,
            message: message.into(),
        };

        match severity {
            Severity::Debug => debug!("{}", record.message),
            Severity::Info => info!("{}", record.message),
            Severity::Warning => warn!("{}", record.message),
            Severity::Error | Severity::Critical => error!("{}", record.message),
        }

        match self.sink.as_ref() {
            Sink::File(file) => {
                if let Ok(mut file) = file.lock() {
                    if let Err(err) = writeln!(file, "{}", record).and_then(|_| file.flush()) {
                        error!("audit log write failed: {}", err);
                    }
                }
            }
            Sink::Memory(records) => {
                if let Ok(mut records) = records.lock() {
                    records.push(record);
                }
            }
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(Severity::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.record(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(Severity::Error, message);
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.record(Severity::Critical, message);
    }

    /// Records held by an in-memory log; empty for file-backed logs.
    pub fn records(&self) -> Vec<AuditRecord> {
        match self.sink.as_ref() {
            Sink::Memory(records) => records.lock().map(|r| r.clone()).unwrap_or_default(),
            Sink::File(_) => Vec::new(),
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.records()
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sink.as_ref() {
            Sink::File(_) => "file",
            Sink::Memory(_) => "memory",
        };
        f.debug_struct("AuditLog").field("sink", &kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_log_keeps_severity_and_order() {
        let log = AuditLog::in_memory();
        let shared = log.clone();
        log.info("first");
        shared.critical("second");
        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "first");
        assert_eq!(records[1].severity, Severity::Critical);
        assert_eq!(log.count(Severity::Critical), 1);
    }

    #[test]
    fn file_log_appends_across_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("magnet.log");
        AuditLog::open(&path).unwrap().warning("zeroed");
        AuditLog::open(&path).unwrap().info("applied");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("| WARNING | zeroed"));
        assert!(lines[1].ends_with("| INFO | applied"));
    }
}
