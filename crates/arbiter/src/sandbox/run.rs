//! Running commands inside a sandbox and collecting their results.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, instrument};

use crate::sandbox::cell::Sandbox;
use crate::sandbox::command::IsolateCommand;
use crate::sandbox::meta::MetaFile;
use crate::sandbox::SandboxError;
use crate::types::ExecutionOutcome;

/// Spawn an isolate invocation and parse the meta file it leaves behind.
///
/// A missing meta file means isolate itself failed before the sandboxed
/// program ran; isolate's stderr is the only diagnostic in that case.
async fn run_isolate(args: Vec<String>, sandbox: &Sandbox) -> Result<MetaFile, SandboxError> {
    let meta_path = sandbox.host_path("meta.txt")?;

    let output = Command::new(&args[0])
        .args(&args[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // If the judge is cancelled mid-run, the isolate child must not
        // outlive it; isolate forwards the kill to the boxed program.
        .kill_on_drop(true)
        .output()
        .await
        .map_err(SandboxError::SpawnFailed)?;

    if !meta_path.exists() {
        return Err(SandboxError::NoMetaFile(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    MetaFile::load(&meta_path).await
}

/// Run a program once with batch I/O.
///
/// `stdin_data` is staged into the box and fed through isolate's `--stdin`
/// redirection; stdout and stderr are captured into separate box files and
/// read back after the run. Isolate refuses `--stdin` without a file, so an
/// empty one is always staged.
#[instrument(skip(sandbox, command, stdin_data))]
pub async fn run_program(
    sandbox: &Sandbox,
    command: IsolateCommand,
    stdin_data: &[u8],
) -> Result<ExecutionOutcome, SandboxError> {
    sandbox.write_file("stdin.txt", stdin_data).await?;

    let command = command
        .meta_file(sandbox.host_path("meta.txt")?)
        .stdin(sandbox.inner_path("stdin.txt")?)
        .stdout(sandbox.inner_path("stdout.txt")?)
        .stderr(sandbox.inner_path("stderr.txt")?);

    let args = command.build();
    debug!(?args, "running program in sandbox");

    let meta = run_isolate(args, sandbox).await?;
    let mut outcome = meta.to_outcome();

    if sandbox.file_exists("stdout.txt").await? {
        outcome.stdout = Some(sandbox.read_file("stdout.txt").await?);
    }
    if sandbox.file_exists("stderr.txt").await? {
        outcome.stderr = Some(sandbox.read_file("stderr.txt").await?);
    }

    debug!(
        status = ?outcome.status,
        time = outcome.time,
        memory_kb = outcome.memory_kb,
        exit_code = ?outcome.exit_code,
        "program run complete"
    );

    Ok(outcome)
}

/// Run a compiler invocation, returning the outcome and the combined
/// compiler output.
///
/// Compiler diagnostics land on stdout or stderr depending on the
/// toolchain, so both are collected. When the compiler produced nothing but
/// isolate has a message (e.g. it was killed at a ceiling), the message
/// stands in as the output.
#[instrument(skip(sandbox, command))]
pub async fn run_compiler(
    sandbox: &Sandbox,
    command: IsolateCommand,
) -> Result<(ExecutionOutcome, String), SandboxError> {
    sandbox.write_file("compile_stdin.txt", b"").await?;

    let command = command
        .meta_file(sandbox.host_path("meta.txt")?)
        .stdin(sandbox.inner_path("compile_stdin.txt")?)
        .stdout(sandbox.inner_path("compile_stdout.txt")?)
        .stderr(sandbox.inner_path("compile_stderr.txt")?);

    let args = command.build();
    debug!(?args, "running compiler in sandbox");

    let meta = run_isolate(args, sandbox).await?;
    let outcome = meta.to_outcome();

    let mut diagnostics = String::new();
    if sandbox.file_exists("compile_stdout.txt").await? {
        diagnostics.push_str(&String::from_utf8_lossy(
            &sandbox.read_file("compile_stdout.txt").await?,
        ));
    }
    if sandbox.file_exists("compile_stderr.txt").await? {
        let stderr = sandbox.read_file("compile_stderr.txt").await?;
        let stderr = String::from_utf8_lossy(&stderr);
        if !diagnostics.is_empty() && !stderr.is_empty() {
            diagnostics.push('\n');
        }
        diagnostics.push_str(&stderr);
    }
    if diagnostics.is_empty()
        && let Some(ref msg) = outcome.message
    {
        diagnostics = msg.clone();
    }

    debug!(
        exit_code = ?outcome.exit_code,
        status = ?outcome.status,
        "compiler run complete"
    );

    Ok((outcome, diagnostics))
}
