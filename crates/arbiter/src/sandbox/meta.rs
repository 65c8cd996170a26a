//! Parsing of isolate's meta file.
//!
//! After every run isolate writes `key:value` lines describing what
//! happened: time and memory used, exit code or signal, status code, and a
//! free-text message. This is the judge's only trusted source of resource
//! figures; nothing self-reported by the program is used.

use std::collections::HashMap;
use std::path::Path;

use crate::sandbox::SandboxError;
use crate::types::{ExecutionOutcome, LimitBreach, RunStatus};

/// Parsed meta file.
#[derive(Debug, Clone, Default)]
pub struct MetaFile {
    entries: HashMap<String, String>,
}

impl MetaFile {
    /// Parse meta file content.
    ///
    /// Lenient: malformed lines are skipped. Values keep any colons after
    /// the first separator (messages and timestamps contain them).
    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                if !key.is_empty() {
                    entries.insert(key.to_string(), value.trim().to_string());
                }
            }
        }
        Self { entries }
    }

    /// Read and parse a meta file from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Ok(Self::parse(&content))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Status code; a missing `status` entry means the run completed.
    pub fn status(&self) -> RunStatus {
        self.get("status")
            .map(RunStatus::from_code)
            .unwrap_or(RunStatus::Ok)
    }

    /// CPU time in seconds.
    pub fn time(&self) -> f64 {
        self.get_f64("time").unwrap_or(0.0)
    }

    /// Wall-clock time in seconds.
    pub fn wall_time(&self) -> f64 {
        self.get_f64("time-wall").unwrap_or(0.0)
    }

    /// Peak memory in kilobytes. The cgroup figure (`cg-mem`) covers the
    /// whole box and is preferred; `max-rss` covers only the main process.
    pub fn memory_kb(&self) -> u64 {
        self.get_u64("cg-mem")
            .or_else(|| self.get_u64("max-rss"))
            .unwrap_or(0)
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.get_i32("exitcode")
    }

    pub fn signal(&self) -> Option<i32> {
        self.get_i32("exitsig")
    }

    pub fn message(&self) -> Option<String> {
        self.get("message").map(String::from)
    }

    /// Which ceiling was breached, inferred from the message with the
    /// status code as fallback.
    pub fn limit_breach(&self) -> LimitBreach {
        let from_message = LimitBreach::from_message(self.message().as_deref());
        if from_message.breached() {
            return from_message;
        }
        if self.status() == RunStatus::TimedOut {
            return LimitBreach::CpuTime;
        }
        LimitBreach::None
    }

    /// Assemble the outcome. stdout/stderr are filled in by the caller,
    /// which knows where the run redirected them.
    pub fn to_outcome(&self) -> ExecutionOutcome {
        ExecutionOutcome {
            status: self.status(),
            limit: self.limit_breach(),
            time: self.time(),
            wall_time: self.wall_time(),
            memory_kb: self.memory_kb(),
            exit_code: self.exit_code(),
            signal: self.signal(),
            message: self.message(),
            stdout: None,
            stderr: None,
        }
    }
}
