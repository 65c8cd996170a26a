//! The judge orchestrator.
//!
//! One call to [`Judge::judge`] takes a [`Submission`] through the whole
//! pipeline: validate, resolve the language, acquire a sandbox from the
//! bounded pool, compile once, then run and classify each test case in
//! order, and finally aggregate a [`Verdict`]. The sandbox is torn down on
//! every exit path.

use std::future::Future;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

pub use crate::judge::classify::{TestClassification, classify, outputs_match};
pub use crate::judge::submission::{
    DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_TIME_LIMIT_MS, Submission, TestCase,
};
pub use crate::judge::verdict::{TestResult, Verdict, VerdictStatus};

pub mod classify;
pub mod submission;
pub mod verdict;

use crate::config::{Config, Language};
use crate::runner::{CompileError, ExecuteError, Runner};
use crate::sandbox::{Sandbox, SandboxError, SandboxPool};
use crate::types::ExecutionOutcome;

/// Ways a judging request can fail without producing a verdict.
///
/// The verdict statuses (compile error, limits, crashes, wrong answers) are
/// not errors; the caller gets a well-formed [`Verdict`] for those. These
/// are either caller mistakes, backpressure, or judge-side infrastructure
/// faults. None of them are retried here: submitted code is assumed buggy
/// or adversarial rather than transiently unlucky.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// The request is structurally broken; rejected before any sandbox
    /// exists.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The declared language has no configured runner; rejected before any
    /// sandbox exists.
    #[error("unsupported language '{0}'")]
    UnsupportedLanguage(String),

    /// All judging slots are busy and the caller asked not to queue.
    #[error("judge at capacity")]
    Overloaded,

    /// The caller canceled the run; the active sandbox was killed and
    /// reclaimed before this was returned.
    #[error("judging canceled")]
    Canceled,

    /// The sandbox reported an internal failure mid-run.
    #[error("sandbox failure: {0}")]
    Infrastructure(String),

    /// Sandbox setup or teardown failed.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

impl JudgeError {
    /// True for judge-side faults that need operator attention, as opposed
    /// to caller mistakes and backpressure.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            JudgeError::Infrastructure(_)
                | JudgeError::Sandbox(_)
                | JudgeError::Compile(_)
                | JudgeError::Execute(_)
        )
    }
}

/// How to behave when every judging slot is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Queue,
    Reject,
}

/// Aggregate resource usage across the runs of one submission.
#[derive(Debug, Default, Clone, Copy)]
struct Usage {
    total_ms: u64,
    peak_bytes: u64,
}

impl Usage {
    fn record(&mut self, outcome: &ExecutionOutcome) {
        self.total_ms += outcome.wall_time_ms();
        self.peak_bytes = self.peak_bytes.max(outcome.memory_bytes());
    }
}

/// Decide whether a classification aborts the submission.
///
/// Under the default early-exit policy every execution failure halts the
/// run and withholds test results; with `run_all` set only the
/// classification is recorded and judging continues. A wrong answer never
/// halts.
fn halt_status(
    classification: &TestClassification,
    run_all: bool,
) -> Option<VerdictStatus> {
    if run_all || !classification.is_execution_failure() {
        return None;
    }
    classification.verdict_status()
}

/// The judging engine.
///
/// Holds the sandbox pool that bounds concurrent judging; cheap to share
/// behind an `Arc`. Each call owns its submission for the duration of one
/// pass and keeps no state afterwards.
#[derive(Debug)]
pub struct Judge {
    runner: Runner,
    pool: SandboxPool,
    run_all_tests: bool,
}

impl Judge {
    pub fn new(config: Config) -> Self {
        let pool = SandboxPool::new(
            config.judge.box_start_id,
            config.judge.max_sandboxes,
            config.isolate_binary(),
            config.cgroup,
        );
        let run_all_tests = config.judge.run_all_tests;
        Self {
            runner: Runner::new(config),
            pool,
            run_all_tests,
        }
    }

    pub fn config(&self) -> &Config {
        self.runner.config()
    }

    /// Number of currently free judging slots.
    pub fn available_slots(&self) -> usize {
        self.pool.available()
    }

    /// Judge a submission, waiting for a free slot if necessary.
    pub async fn judge(&self, submission: &Submission) -> Result<Verdict, JudgeError> {
        self.admit(submission, Admission::Queue, None).await
    }

    /// Judge a submission, failing fast with [`JudgeError::Overloaded`]
    /// when every slot is busy.
    pub async fn try_judge(&self, submission: &Submission) -> Result<Verdict, JudgeError> {
        self.admit(submission, Admission::Reject, None).await
    }

    /// Judge a submission with a cancellation signal.
    ///
    /// When `cancel` flips to `true` (or its sender is dropped), the
    /// current test run is killed, the sandbox reclaimed, and
    /// [`JudgeError::Canceled`] returned. No sandboxed process survives
    /// this call returning.
    pub async fn judge_with_cancel(
        &self,
        submission: &Submission,
        cancel: watch::Receiver<bool>,
    ) -> Result<Verdict, JudgeError> {
        self.admit(submission, Admission::Queue, Some(cancel)).await
    }

    #[instrument(skip(self, submission, cancel), fields(language = %submission.language))]
    async fn admit(
        &self,
        submission: &Submission,
        admission: Admission,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<Verdict, JudgeError> {
        submission.validate()?;
        let language = self
            .config()
            .language(&submission.language)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(submission.language.clone()))?;

        let mut sandbox = match admission {
            Admission::Queue => race(cancel.as_mut(), self.pool.acquire()).await??,
            Admission::Reject => match self.pool.try_acquire().await {
                Err(SandboxError::PoolBusy) => return Err(JudgeError::Overloaded),
                other => other?,
            },
        };

        let result = self
            .judge_in(&sandbox, submission, language, &mut cancel)
            .await;

        // Teardown happens regardless of how judging went; a teardown
        // failure trumps any verdict because leaked sandbox state is an
        // infrastructure fault.
        let teardown = sandbox.teardown().await;
        let verdict = result?;
        teardown?;
        Ok(verdict)
    }

    async fn judge_in(
        &self,
        sandbox: &Sandbox,
        submission: &Submission,
        language: &Language,
        cancel: &mut Option<watch::Receiver<bool>>,
    ) -> Result<Verdict, JudgeError> {
        let limits = submission.limits();
        let code = submission.code.as_bytes();

        // Compile once per submission; every test case reuses the artifact.
        if language.is_compiled() {
            let compiled = race(
                cancel.as_mut(),
                self.runner.compile(sandbox, code, language, None),
            )
            .await??;
            if !compiled.success {
                info!(language = %language.name, "compilation failed");
                return Ok(Verdict::compilation_error(compiled.diagnostics));
            }
        } else {
            self.runner.stage_source(sandbox, language, code).await?;
        }

        // Language-level support files (e.g. an entry-point driver) are
        // staged once and shared by every test run.
        for file in &language.run.extra_files {
            sandbox
                .write_file(&file.name, file.content.as_bytes())
                .await
                .map_err(JudgeError::Sandbox)?;
        }

        let mut usage = Usage::default();
        let mut results = Vec::with_capacity(submission.test_cases.len());
        let mut first_failure: Option<VerdictStatus> = None;

        for (index, case) in submission.test_cases.iter().enumerate() {
            let outcome = race(
                cancel.as_mut(),
                self.runner
                    .run(sandbox, language, case.input.as_bytes(), Some(&limits)),
            )
            .await??;
            usage.record(&outcome);

            let classification = classify(&outcome, &case.expected_output);
            debug!(test = index, classification = ?classification, "test case classified");

            if let TestClassification::Infrastructure { error } = &classification {
                error!(test = index, %error, "sandbox failed while judging");
                return Err(JudgeError::Infrastructure(error.clone()));
            }

            if let Some(status) = halt_status(&classification, self.run_all_tests) {
                return Ok(Verdict::halted(
                    status,
                    classification.error_text(),
                    usage.total_ms,
                    usage.peak_bytes,
                ));
            }

            if let Some(status) = classification.verdict_status() {
                first_failure.get_or_insert(status);
            }
            results.push(TestResult::from_classification(case, &classification));
        }

        let status = first_failure.unwrap_or(VerdictStatus::Accepted);
        Ok(Verdict::completed(
            status,
            results,
            usage.total_ms,
            usage.peak_bytes,
        ))
    }
}

/// Resolve when the cancel flag flips true or its sender goes away.
async fn canceled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

/// Race a judging step against cancellation.
///
/// Dropping the losing future is enough to start reclaiming it: sandboxed
/// runs spawn isolate with kill-on-drop, and the caller always tears the
/// box down afterwards.
async fn race<T>(
    cancel: Option<&mut watch::Receiver<bool>>,
    step: impl Future<Output = T>,
) -> Result<T, JudgeError> {
    match cancel {
        None => Ok(step.await),
        Some(rx) => {
            tokio::select! {
                biased;
                _ = canceled(rx) => Err(JudgeError::Canceled),
                out = step => Ok(out),
            }
        }
    }
}
