//! The run step.

use tracing::{debug, instrument};

use crate::config::{Config, Language};
use crate::runner::ExecuteError;
use crate::sandbox::{
    IsolateAction, IsolateCommand, Sandbox, resolve_program, run_program, validate_mounts,
};
use crate::types::{ExecutionOutcome, ResourceLimits};

/// Run the prepared program against one input.
///
/// For compiled languages the binary from an earlier compile step is
/// executed; for interpreted ones the staged source is. Input always
/// arrives on the program's stdin, never inside the source text.
///
/// Limit precedence, lowest first: configured defaults, the language's
/// `run.limits`, then caller overrides.
#[instrument(skip(sandbox, config, input))]
pub async fn execute(
    sandbox: &Sandbox,
    config: &Config,
    language: &Language,
    input: &[u8],
    limits: Option<&ResourceLimits>,
) -> Result<ExecutionOutcome, ExecuteError> {
    let mut effective = config.default_limits.clone();
    if let Some(ref lang_limits) = language.run.limits {
        effective = effective.with_overrides(lang_limits);
    }
    if let Some(user_limits) = limits {
        effective = effective.with_overrides(user_limits);
    }

    let mut run_cmd = match language.compile {
        Some(ref compile_config) => {
            let binary = &compile_config.output_name;
            if !sandbox.file_exists(binary).await? {
                return Err(ExecuteError::NotStaged(format!(
                    "binary '{binary}' not found in sandbox; compile first"
                )));
            }
            Language::expand_command(&language.run.command, &compile_config.source_name, binary)
        }
        None => {
            let source_name = language.source_name();
            if !sandbox.file_exists(&source_name).await? {
                return Err(ExecuteError::NotStaged(format!(
                    "source '{source_name}' not found in sandbox; stage it first"
                )));
            }
            Language::expand_command(&language.run.command, &source_name, &source_name)
        }
    };
    resolve_program(&mut run_cmd)?;
    debug!(?run_cmd, "executing program");

    validate_mounts(&language.run.mounts)?;

    let memory_limit = effective.memory_limit;

    let mut command = IsolateCommand::new(config.isolate_binary(), sandbox.id())
        .action(IsolateAction::Run)
        .cgroup(config.cgroup)
        .limits(effective)
        .working_dir("/box")
        .env("PATH", &language.run.path)
        .mounts(config.sandbox_mounts.iter().cloned())
        .mounts(language.run.mounts.iter().cloned())
        .command(run_cmd);
    for (key, value) in &language.run.env {
        command = command.env(key, value);
    }

    let mut outcome = run_program(sandbox, command, input).await?;

    // isolate reports OOM kills as plain signals; attribute them to the
    // memory ceiling when the peak reading supports it
    if let Some(limit_kb) = memory_limit {
        outcome.detect_memory_kill(limit_kb);
    }

    debug!(
        status = ?outcome.status,
        limit = ?outcome.limit,
        time = outcome.time,
        memory_kb = outcome.memory_kb,
        exit_code = ?outcome.exit_code,
        "run step finished"
    );

    Ok(outcome)
}
