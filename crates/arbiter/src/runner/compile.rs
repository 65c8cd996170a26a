//! The compile step.

use tracing::{debug, instrument};

use crate::config::language::DEFAULT_SANDBOX_PATH;
use crate::config::{Config, Language};
use crate::runner::CompileError;
use crate::sandbox::{IsolateAction, IsolateCommand, Sandbox, resolve_program, run_compiler};
use crate::types::{ExecutionOutcome, ResourceLimits};

/// What the compile step produced.
#[derive(Debug, Clone)]
pub struct CompileResult {
    /// Whether the compiler exited cleanly
    pub success: bool,

    /// Resource usage and exit state of the compiler process
    pub outcome: ExecutionOutcome,

    /// Combined compiler stdout/stderr (the error text on failure)
    pub diagnostics: String,
}

/// Compilers get looser ceilings than submitted programs: they fork
/// assemblers and linkers, and template-heavy code needs real memory.
fn compile_limits() -> ResourceLimits {
    ResourceLimits {
        time_limit: Some(30.0),
        wall_time_limit: Some(60.0),
        memory_limit: Some(512 * ResourceLimits::MB),
        max_processes: Some(10),
        max_output: Some(64 * ResourceLimits::MB),
        ..ResourceLimits::none()
    }
}

/// Stage the source and run the language's compiler over it once.
///
/// Limit precedence, lowest first: the compile baseline above, the
/// language's `compile.limits`, then caller overrides.
#[instrument(skip(sandbox, config, source))]
pub async fn compile(
    sandbox: &Sandbox,
    config: &Config,
    language: &Language,
    source: &[u8],
    limits: Option<&ResourceLimits>,
) -> Result<CompileResult, CompileError> {
    let compile_config = language
        .compile
        .as_ref()
        .ok_or_else(|| CompileError::NotCompiled(language.name.clone()))?;

    sandbox
        .write_file(&compile_config.source_name, source)
        .await?;
    debug!(source_name = %compile_config.source_name, "staged source for compilation");

    let mut effective = compile_limits();
    if let Some(ref lang_limits) = compile_config.limits {
        effective = effective.with_overrides(lang_limits);
    }
    if let Some(user_limits) = limits {
        effective = effective.with_overrides(user_limits);
    }

    let mut compiler_cmd = Language::expand_command(
        &compile_config.command,
        &compile_config.source_name,
        &compile_config.output_name,
    );
    // isolate execs the command directly, so "g++" must become "/usr/bin/g++"
    resolve_program(&mut compiler_cmd)?;

    let mut command = IsolateCommand::new(config.isolate_binary(), sandbox.id())
        .action(IsolateAction::Run)
        .cgroup(config.cgroup)
        .limits(effective)
        .working_dir("/box")
        .env("PATH", DEFAULT_SANDBOX_PATH)
        .mounts(config.sandbox_mounts.iter().cloned())
        .command(compiler_cmd);
    for (key, value) in &compile_config.env {
        command = command.env(key, value);
    }

    let (outcome, diagnostics) = run_compiler(sandbox, command).await?;
    let success = outcome.completed();

    debug!(
        success,
        exit_code = ?outcome.exit_code,
        status = ?outcome.status,
        "compile step finished"
    );

    Ok(CompileResult {
        success,
        outcome,
        diagnostics,
    })
}
