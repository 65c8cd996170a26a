//! Language runners: compiling and executing programs in a sandbox.
//!
//! A runner is driven entirely by its [`Language`] configuration: the same
//! code path serves every language, compiled or interpreted, selected by
//! the submission's language key.

use thiserror::Error;

pub use crate::runner::compile::{CompileResult, compile};
pub use crate::runner::execute::execute;

mod compile;
mod execute;

use crate::{
    config::{Config, Language},
    sandbox::{Sandbox, SandboxError},
    types::{ExecutionOutcome, ResourceLimits},
};

/// Errors from the compile step.
///
/// A program that fails to compile is not an error here; that is a
/// [`CompileResult`] with `success == false`. These are judge-side faults.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("language '{0}' has no compile step")]
    NotCompiled(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Errors from the run step.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("nothing to run: {0}")]
    NotStaged(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Compiles and runs programs according to a [`Config`].
#[derive(Debug, Clone)]
pub struct Runner {
    config: Config,
}

impl Runner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write the source file into the sandbox under the language's source
    /// name. For interpreted languages this is the whole "prepare" step;
    /// for compiled ones [`compile`](Self::compile) does it implicitly.
    pub async fn stage_source(
        &self,
        sandbox: &Sandbox,
        language: &Language,
        source: &[u8],
    ) -> Result<(), SandboxError> {
        sandbox.write_file(&language.source_name(), source).await
    }

    /// Compile staged-or-given source once. Subsequent
    /// [`run`](Self::run) calls reuse the produced binary.
    pub async fn compile(
        &self,
        sandbox: &Sandbox,
        source: &[u8],
        language: &Language,
        limits: Option<&ResourceLimits>,
    ) -> Result<CompileResult, CompileError> {
        compile::compile(sandbox, &self.config, language, source, limits).await
    }

    /// Run the prepared program against one input.
    pub async fn run(
        &self,
        sandbox: &Sandbox,
        language: &Language,
        input: &[u8],
        limits: Option<&ResourceLimits>,
    ) -> Result<ExecutionOutcome, ExecuteError> {
        execute::execute(sandbox, &self.config, language, input, limits).await
    }
}
