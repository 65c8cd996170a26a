//! The judging result.

use serde::{Deserialize, Serialize};

use crate::judge::classify::TestClassification;
use crate::judge::submission::TestCase;

/// Overall status of a judged submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Every test case passed
    Accepted,

    /// All test cases ran; at least one produced different output
    WrongAnswer,

    /// A test case exceeded the time ceiling
    TimeLimitExceeded,

    /// A test case exceeded the memory ceiling
    MemoryLimitExceeded,

    /// A test case crashed
    RuntimeError,

    /// The compile step failed; nothing was executed
    CompilationError,
}

/// The outcome of one test case, reported in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub passed: bool,
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl TestResult {
    /// Build the reportable result for one classified test case.
    ///
    /// Only classifications that leave results attached occur here;
    /// execution failures under the early-exit policy never reach a
    /// `TestResult`, and under run-all they record an empty output plus the
    /// failure text.
    pub fn from_classification(case: &TestCase, classification: &TestClassification) -> Self {
        let (passed, actual_output, error) = match classification {
            TestClassification::Passed { actual } => (true, actual.clone(), None),
            TestClassification::WrongAnswer { actual } => (false, actual.clone(), None),
            TestClassification::TimeLimit => {
                (false, String::new(), Some("Time limit exceeded".to_string()))
            }
            TestClassification::MemoryLimit => (
                false,
                String::new(),
                Some("Memory limit exceeded".to_string()),
            ),
            TestClassification::RuntimeError { error } => {
                (false, String::new(), Some(error.clone()))
            }
            TestClassification::Infrastructure { error } => {
                (false, String::new(), Some(error.clone()))
            }
        };
        Self {
            passed,
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            actual_output,
            error,
            hidden: case.hidden,
        }
    }
}

/// Aggregated result of judging one submission.
///
/// Serializes to the camelCase JSON wire format with snake_case status
/// strings, e.g. `{"status":"wrong_answer","executionTimeMs":12,...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub status: VerdictStatus,

    /// Failure detail: compiler diagnostics, crash text, or the limit hit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Sum of per-test wall-clock times, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,

    /// Maximum per-test peak memory, in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_used_bytes: Option<u64>,

    /// Per-test results; empty when an execution failure aborted the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_results: Vec<TestResult>,
}

impl Verdict {
    /// Verdict for a submission whose compile step failed. Nothing ran, so
    /// no results and no usage figures.
    pub fn compilation_error(diagnostics: String) -> Self {
        Self {
            status: VerdictStatus::CompilationError,
            error: Some(diagnostics),
            execution_time_ms: None,
            memory_used_bytes: None,
            test_results: Vec::new(),
        }
    }

    /// Verdict for a run that completed classification on every test case.
    pub fn completed(
        status: VerdictStatus,
        test_results: Vec<TestResult>,
        execution_time_ms: u64,
        memory_used_bytes: u64,
    ) -> Self {
        Self {
            status,
            error: None,
            execution_time_ms: Some(execution_time_ms),
            memory_used_bytes: Some(memory_used_bytes),
            test_results,
        }
    }

    /// Verdict for a run aborted by an execution failure. Results are
    /// withheld; the usage figures cover the runs that happened.
    pub fn halted(
        status: VerdictStatus,
        error: String,
        execution_time_ms: u64,
        memory_used_bytes: u64,
    ) -> Self {
        Self {
            status,
            error: Some(error),
            execution_time_ms: Some(execution_time_ms),
            memory_used_bytes: Some(memory_used_bytes),
            test_results: Vec::new(),
        }
    }

    /// Whether every test passed.
    pub fn is_accepted(&self) -> bool {
        self.status == VerdictStatus::Accepted
    }
}

impl TestClassification {
    /// The submission-level status this classification forces, or `None`
    /// for a pass. Infrastructure failures have no verdict status; they
    /// surface as errors instead.
    pub fn verdict_status(&self) -> Option<VerdictStatus> {
        match self {
            TestClassification::Passed { .. } => None,
            TestClassification::WrongAnswer { .. } => Some(VerdictStatus::WrongAnswer),
            TestClassification::TimeLimit => Some(VerdictStatus::TimeLimitExceeded),
            TestClassification::MemoryLimit => Some(VerdictStatus::MemoryLimitExceeded),
            TestClassification::RuntimeError { .. } => Some(VerdictStatus::RuntimeError),
            TestClassification::Infrastructure { .. } => None,
        }
    }

    /// Failure text attached to halted verdicts.
    pub fn error_text(&self) -> String {
        match self {
            TestClassification::TimeLimit => "Time limit exceeded".to_string(),
            TestClassification::MemoryLimit => "Memory limit exceeded".to_string(),
            TestClassification::RuntimeError { error }
            | TestClassification::Infrastructure { error } => error.clone(),
            TestClassification::Passed { .. } | TestClassification::WrongAnswer { .. } => {
                String::new()
            }
        }
    }
}
