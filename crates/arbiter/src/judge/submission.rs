//! The judging request.

use serde::{Deserialize, Serialize};

use crate::judge::JudgeError;
use crate::types::ResourceLimits;

/// Wall-clock budget applied when a request does not set one.
pub const DEFAULT_TIME_LIMIT_MS: u64 = 5000;

/// Memory ceiling applied when a request does not set one.
pub const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 256 * 1024 * 1024;

/// One judging request: source code, a language key, and the test cases to
/// run it against. Immutable once accepted; consumed by a single judging
/// pass and discarded.
///
/// Deserializes from the camelCase JSON wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Submitted source code
    pub code: String,

    /// Language key, matched against the configured languages
    pub language: String,

    /// Test cases, judged in order
    pub test_cases: Vec<TestCase>,

    /// Wall-clock budget per test case in milliseconds
    #[serde(default)]
    pub time_limit_ms: Option<u64>,

    /// Memory ceiling per test case in bytes
    #[serde(default)]
    pub memory_limit_bytes: Option<u64>,
}

/// One (input, expected output) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Fed to the program's stdin, byte for byte
    pub input: String,

    /// Compared against the program's stdout after trimming
    pub expected_output: String,

    /// Display hint for the caller; judging is identical either way
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl Submission {
    /// Reject structurally broken requests before any sandbox exists.
    ///
    /// Empty code is deliberately not rejected: for interpreted languages
    /// it is a program that prints nothing, and for compiled ones the
    /// compiler reports it.
    pub fn validate(&self) -> Result<(), JudgeError> {
        if self.language.trim().is_empty() {
            return Err(JudgeError::InvalidRequest("language is empty".to_string()));
        }
        if self.time_limit_ms == Some(0) {
            return Err(JudgeError::InvalidRequest(
                "timeLimitMs must be positive".to_string(),
            ));
        }
        if self.memory_limit_bytes == Some(0) {
            return Err(JudgeError::InvalidRequest(
                "memoryLimitBytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-test resource limits from the request, with defaults filled in.
    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits::from_request(
            self.time_limit_ms.unwrap_or(DEFAULT_TIME_LIMIT_MS),
            self.memory_limit_bytes.unwrap_or(DEFAULT_MEMORY_LIMIT_BYTES),
        )
    }
}
