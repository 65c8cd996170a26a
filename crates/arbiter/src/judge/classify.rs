//! Classification of raw execution outcomes.
//!
//! Pure functions from an [`ExecutionOutcome`] and the expected output to a
//! per-test classification. Kept free of I/O so the policy is unit-testable
//! without a sandbox.

use crate::types::{ExecutionOutcome, LimitBreach, RunStatus};

/// What one test-case execution amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestClassification {
    /// Ran to completion and produced the expected output
    Passed { actual: String },

    /// Ran to completion but produced different output
    WrongAnswer { actual: String },

    /// Killed at the time ceiling
    TimeLimit,

    /// Killed at the memory ceiling
    MemoryLimit,

    /// Crashed: non-zero exit or a signal unrelated to any ceiling
    RuntimeError { error: String },

    /// The sandbox itself failed; not attributable to the program
    Infrastructure { error: String },
}

impl TestClassification {
    /// True for outcomes where the program did not run to completion.
    /// These abort the submission under the early-exit policy; a wrong
    /// answer does not.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            TestClassification::TimeLimit
                | TestClassification::MemoryLimit
                | TestClassification::RuntimeError { .. }
                | TestClassification::Infrastructure { .. }
        )
    }
}

/// Map a raw outcome to its classification.
///
/// Precedence mirrors how definitive each signal is: a sandbox-internal
/// failure first, then breached ceilings, then crashes, and only for a
/// clean exit the output comparison.
pub fn classify(outcome: &ExecutionOutcome, expected: &str) -> TestClassification {
    if outcome.status == RunStatus::InternalError {
        return TestClassification::Infrastructure {
            error: outcome
                .message
                .clone()
                .unwrap_or_else(|| "sandbox internal error".to_string()),
        };
    }

    if outcome.limit.is_time() || outcome.status == RunStatus::TimedOut {
        return TestClassification::TimeLimit;
    }
    if outcome.limit == LimitBreach::Memory {
        return TestClassification::MemoryLimit;
    }

    if !outcome.completed() {
        return TestClassification::RuntimeError {
            error: runtime_error_text(outcome),
        };
    }

    let actual = outcome.stdout_lossy();
    if outputs_match(&actual, expected) {
        TestClassification::Passed { actual }
    } else {
        TestClassification::WrongAnswer { actual }
    }
}

/// Exact comparison after trimming leading and trailing whitespace.
/// No numeric tolerance; interior whitespace is significant.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}

/// Human-readable crash description: the program's stderr when it said
/// anything, otherwise the exit state.
fn runtime_error_text(outcome: &ExecutionOutcome) -> String {
    let stderr = outcome.stderr_lossy();
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    if let Some(signal) = outcome.signal {
        return format!("killed by signal {signal}");
    }
    if let Some(code) = outcome.exit_code {
        return format!("exited with code {code}");
    }
    outcome
        .message
        .clone()
        .unwrap_or_else(|| "abnormal termination".to_string())
}
