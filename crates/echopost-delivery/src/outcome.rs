//! Append-only success and failure logs for one agent session.

use echopost_core::{AgentPaths, LogRecord};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::error;

/// Success and failure NDJSON logs.
///
/// Each line is `{"log_data": <record>, "context": {...}}` and is flushed as
/// soon as it is written. A failed write is logged and otherwise ignored so
/// that a full disk cannot wedge a replay pass.
pub struct OutcomeLogs {
    success_path: PathBuf,
    failure_path: PathBuf,
    success: Mutex<BufWriter<File>>,
    failure: Mutex<BufWriter<File>>,
}

impl OutcomeLogs {
    /// Open (creating if needed) both logs inside `session_dir`.
    pub fn open(session_dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(session_dir)?;
        let success_path = AgentPaths::success_log_file(session_dir);
        let failure_path = AgentPaths::failure_log_file(session_dir);

        Ok(Self {
            success: Mutex::new(BufWriter::new(open_append(&success_path)?)),
            failure: Mutex::new(BufWriter::new(open_append(&failure_path)?)),
            success_path,
            failure_path,
        })
    }

    pub fn success_path(&self) -> &Path {
        &self.success_path
    }

    pub fn failure_path(&self) -> &Path {
        &self.failure_path
    }

    pub fn record_success(&self, record: &LogRecord) {
        self.append(&self.success, "success", record_line(record, json!({})));
    }

    /// Log a permanent failure with the remote's response.
    pub fn record_failure(&self, record: &LogRecord, status: u16, body: &str) {
        let context = json!({ "response": body, "responseCode": status });
        self.append(&self.failure, "failure", record_line(record, context));
    }

    /// Log a stored entry that could not be decoded back into a record.
    pub fn record_undecodable(&self, raw: &str, reason: &str) {
        let line = json!({
            "log_data": Value::Null,
            "context": { "error": reason, "raw": raw },
        });
        self.append(&self.failure, "failure", line);
    }

    /// Flush both logs.
    pub fn flush(&self) -> io::Result<()> {
        self.success.lock().flush()?;
        self.failure.lock().flush()
    }

    fn append(&self, log: &Mutex<BufWriter<File>>, kind: &'static str, line: Value) {
        let mut text = line.to_string();
        text.push('\n');

        let mut writer = log.lock();
        let written = writer
            .write_all(text.as_bytes())
            .and_then(|()| writer.flush());
        if let Err(e) = written {
            error!(log = kind, error = %e, "outcome_log_write_error");
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn record_line(record: &LogRecord, context: Value) -> Value {
    json!({ "log_data": record, "context": context })
}
