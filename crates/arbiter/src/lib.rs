//! A sandboxed code-judging engine.
//!
//! Arbiter takes a submission (source code, a language, and a list of
//! input/expected-output test cases), compiles it once, runs it once per
//! test case inside an IOI-isolate sandbox under strict time and memory
//! ceilings, and aggregates the classified results into a single verdict.
//!
//! # Design points
//!
//! - **Out-of-process isolation** — submitted code never shares a process,
//!   filesystem view, or network with the judge; every run goes through
//!   isolate into its own box.
//! - **Declarative languages** — each language is a TOML entry (compile
//!   command, run command, limits); compiled and interpreted languages
//!   share one code path.
//! - **Bounded concurrency** — a sandbox pool admits at most N submissions
//!   at once, with queueing or fail-fast backpressure.
//! - **Deterministic verdicts** — classification is a pure function of the
//!   raw execution outcome; resource figures come from isolate's meta
//!   file, never from the submitted program.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, JudgeSettings, Language};
pub use judge::{
    Judge, JudgeError, Submission, TestCase, TestResult, Verdict, VerdictStatus,
};
pub use runner::{CompileError, CompileResult, ExecuteError, Runner};
pub use sandbox::{Sandbox, SandboxError, SandboxPool, prepare_cgroup};
pub use types::{ExecutionOutcome, LimitBreach, MountConfig, ResourceLimits, RunStatus};

pub mod config;
pub mod judge;
pub mod runner;
pub mod sandbox;
pub mod types;
