//! Core types shared between the sandbox layer and the judge.

use serde::{Deserialize, Serialize};

/// Resource ceilings applied to one sandboxed execution.
///
/// Units follow isolate's command line: seconds for time, kilobytes for
/// memory. `None` means "no flag passed", letting lower-priority defaults
/// apply; see [`ResourceLimits::with_overrides`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU time ceiling in seconds
    #[serde(default)]
    pub time_limit: Option<f64>,

    /// Wall-clock ceiling in seconds
    #[serde(default)]
    pub wall_time_limit: Option<f64>,

    /// Memory ceiling in kilobytes
    #[serde(default)]
    pub memory_limit: Option<u64>,

    /// Stack size ceiling in kilobytes
    #[serde(default)]
    pub stack_limit: Option<u64>,

    /// Maximum number of processes/threads
    #[serde(default)]
    pub max_processes: Option<u32>,

    /// Maximum size of any written file in kilobytes
    #[serde(default)]
    pub max_output: Option<u64>,

    /// Maximum open file descriptors
    #[serde(default)]
    pub max_open_files: Option<u32>,

    /// Grace period in seconds between a limit firing and the hard kill
    #[serde(default)]
    pub extra_time: Option<f64>,
}

impl ResourceLimits {
    /// 1 megabyte in kilobytes
    pub const MB: u64 = 1024;
    /// 1 gigabyte in kilobytes
    pub const GB: u64 = 1024 * 1024;

    /// Limits with every field unset.
    pub fn none() -> Self {
        Self {
            time_limit: None,
            wall_time_limit: None,
            memory_limit: None,
            stack_limit: None,
            max_processes: None,
            max_output: None,
            max_open_files: None,
            extra_time: None,
        }
    }

    /// Build limits from the wire units of a judge request: milliseconds of
    /// wall-clock budget and bytes of memory.
    ///
    /// The CPU ceiling is set to the same value as the wall-clock ceiling so
    /// a busy-looping program and a sleeping one are cut off at the same
    /// point. Bytes round up to whole kilobytes. Fields the request does not
    /// control stay `None` and fall through to configured defaults.
    pub fn from_request(time_limit_ms: u64, memory_limit_bytes: u64) -> Self {
        let seconds = time_limit_ms as f64 / 1000.0;
        Self {
            time_limit: Some(seconds),
            wall_time_limit: Some(seconds),
            memory_limit: Some(memory_limit_bytes.div_ceil(1024)),
            ..Self::none()
        }
    }

    /// Set the CPU time ceiling in seconds
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    /// Set the wall-clock ceiling in seconds
    pub fn with_wall_time_limit(mut self, seconds: f64) -> Self {
        self.wall_time_limit = Some(seconds);
        self
    }

    /// Set the memory ceiling in kilobytes
    pub fn with_memory_limit(mut self, kb: u64) -> Self {
        self.memory_limit = Some(kb);
        self
    }

    /// Set the maximum number of processes
    pub fn with_max_processes(mut self, count: u32) -> Self {
        self.max_processes = Some(count);
        self
    }

    /// Merge with another set of limits, preferring present fields of
    /// `overrides` over fields of `self`.
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            time_limit: overrides.time_limit.or(self.time_limit),
            wall_time_limit: overrides.wall_time_limit.or(self.wall_time_limit),
            memory_limit: overrides.memory_limit.or(self.memory_limit),
            stack_limit: overrides.stack_limit.or(self.stack_limit),
            max_processes: overrides.max_processes.or(self.max_processes),
            max_output: overrides.max_output.or(self.max_output),
            max_open_files: overrides.max_open_files.or(self.max_open_files),
            extra_time: overrides.extra_time.or(self.extra_time),
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit: Some(5.0),
            wall_time_limit: Some(5.0),
            memory_limit: Some(256 * Self::MB),
            stack_limit: Some(256 * Self::MB),
            max_processes: Some(1),
            max_output: Some(64 * Self::MB),
            max_open_files: Some(64),
            extra_time: Some(0.5),
        }
    }
}

/// Raw result of running one program once inside the sandbox.
///
/// This is what the judge's classifier consumes. Timing and memory figures
/// come from isolate's meta file, never from the program itself.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    /// Terminal state of the process
    pub status: RunStatus,

    /// Which resource ceiling was hit, if any
    pub limit: LimitBreach,

    /// CPU time used in seconds
    pub time: f64,

    /// Wall-clock time used in seconds
    pub wall_time: f64,

    /// Peak memory in kilobytes (cgroup figure when available, else max RSS)
    pub memory_kb: u64,

    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,

    /// Signal number if the process was killed by a signal
    pub signal: Option<i32>,

    /// Diagnostic message from isolate
    pub message: Option<String>,

    /// Captured standard output
    pub stdout: Option<Vec<u8>>,

    /// Captured standard error
    pub stderr: Option<Vec<u8>>,
}

impl ExecutionOutcome {
    /// True when the process ran to completion with exit code 0 and no
    /// ceiling was breached.
    #[must_use]
    pub fn completed(&self) -> bool {
        matches!(self.status, RunStatus::Ok) && self.exit_code == Some(0) && !self.limit.breached()
    }

    /// Captured stdout as a string, lossily decoded.
    pub fn stdout_lossy(&self) -> String {
        self.stdout
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// Captured stderr as a string, lossily decoded.
    pub fn stderr_lossy(&self) -> String {
        self.stderr
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// Wall-clock time in whole milliseconds, rounded to nearest.
    pub fn wall_time_ms(&self) -> u64 {
        (self.wall_time * 1000.0).round() as u64
    }

    /// Peak memory in bytes.
    pub fn memory_bytes(&self) -> u64 {
        self.memory_kb * 1024
    }

    /// Reinterpret an abnormal termination as a memory kill when the peak
    /// usage was at or near the ceiling.
    ///
    /// Under cgroup limiting the OOM killer fires exactly at the ceiling;
    /// under RLIMIT_AS the failed allocation aborts the program with the
    /// peak a little below it. Both arrive from isolate as generic
    /// failures, so anything abnormal that peaked within 90% of the
    /// ceiling is attributed to it.
    pub fn detect_memory_kill(&mut self, limit_kb: u64) {
        if self.limit.breached() || limit_kb == 0 {
            return;
        }
        let abnormal = !matches!(self.status, RunStatus::Ok) || self.exit_code != Some(0);
        if abnormal && self.memory_kb * 10 >= limit_kb * 9 {
            self.limit = LimitBreach::Memory;
        }
    }
}

/// Terminal state of a sandboxed process, mapped from isolate's two-letter
/// status codes. Absence of a status code means the process exited normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunStatus {
    /// Ran to completion (exit code may still be non-zero)
    #[default]
    #[serde(rename = "OK")]
    Ok,

    /// Exited with a non-zero code
    #[serde(rename = "RE")]
    RuntimeError,

    /// Killed after exceeding a time ceiling
    #[serde(rename = "TO")]
    TimedOut,

    /// Killed by a signal
    #[serde(rename = "SG")]
    Signaled,

    /// Sandbox-internal failure, not attributable to the program
    #[serde(rename = "XX")]
    InternalError,
}

impl RunStatus {
    /// Map an isolate status code. Unknown codes are treated as internal
    /// errors rather than silently passing.
    pub fn from_code(code: &str) -> Self {
        match code {
            "OK" => RunStatus::Ok,
            "RE" => RunStatus::RuntimeError,
            "TO" => RunStatus::TimedOut,
            "SG" => RunStatus::Signaled,
            "XX" => RunStatus::InternalError,
            _ => RunStatus::InternalError,
        }
    }
}

/// Which resource ceiling an execution ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitBreach {
    /// No ceiling was hit
    #[default]
    None,

    /// CPU time ceiling
    CpuTime,

    /// Wall-clock ceiling
    WallTime,

    /// Memory ceiling
    Memory,

    /// Output size ceiling
    Output,
}

impl LimitBreach {
    /// Infer the breached ceiling from isolate's free-text message.
    pub fn from_message(message: Option<&str>) -> Self {
        let Some(msg) = message else {
            return LimitBreach::None;
        };
        let msg = msg.to_lowercase();

        if msg.contains("time limit") {
            if msg.contains("wall") {
                LimitBreach::WallTime
            } else {
                LimitBreach::CpuTime
            }
        } else if msg.contains("memory") || msg.contains("out of memory") {
            LimitBreach::Memory
        } else if msg.contains("output") {
            LimitBreach::Output
        } else {
            LimitBreach::None
        }
    }

    /// True when any ceiling was hit.
    #[must_use]
    pub fn breached(&self) -> bool {
        !matches!(self, LimitBreach::None)
    }

    /// True for either flavor of time ceiling.
    #[must_use]
    pub fn is_time(&self) -> bool {
        matches!(self, LimitBreach::CpuTime | LimitBreach::WallTime)
    }
}

/// A host directory made visible inside the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    /// Host path
    pub source: String,

    /// Path inside the sandbox
    pub target: String,

    /// Mount read-write instead of the default read-only
    #[serde(default)]
    pub writable: bool,

    /// Skip silently when the host path does not exist
    #[serde(default)]
    pub optional: bool,
}
