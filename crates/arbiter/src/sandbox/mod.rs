//! Isolation boundary around submitted code.
//!
//! Wraps IOI isolate: every execution of untrusted code goes through the
//! isolate binary into a box with its own process tree, a private writable
//! `/box` directory, read-only system mounts, and no network. The judge
//! never loads or evaluates submitted code in its own process.
//!
//! References for isolate's CLI arguments and meta files:
//! - https://www.ucw.cz/isolate/isolate.1.html
//! - https://github.com/ioi/isolate

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use crate::sandbox::cell::{Sandbox, SandboxPool};
pub use crate::sandbox::command::{IsolateAction, IsolateCommand};
pub use crate::sandbox::meta::MetaFile;
pub use crate::sandbox::run::{run_compiler, run_program};
use crate::types::MountConfig;

mod cell;
mod command;
mod meta;
mod run;

/// Errors raised by the sandbox layer.
///
/// All of these are judge-side infrastructure failures: they indicate a
/// broken host setup or a bug in the judge, never a property of the
/// submitted program.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to initialize box {id}: {message}")]
    InitFailed { id: u32, message: String },

    #[error("failed to tear down box {id}: {message}")]
    TeardownFailed { id: u32, message: String },

    #[error("isolate produced no meta file: {0}")]
    NoMetaFile(String),

    #[error("failed to spawn isolate: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("pool closed")]
    PoolClosed,

    #[error("all sandboxes busy")]
    PoolBusy,

    #[error("invalid sandbox path: {0}")]
    InvalidPath(String),

    #[error("mount source does not exist: {0}")]
    MountSourceNotFound(String),

    #[error("command '{0}' not found in PATH")]
    ProgramNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Set up isolate's cgroup-v2 hierarchy for memory limiting.
///
/// In containers the systemd service that normally manages isolate's cgroup
/// (`isolate-cg-keeper`) is absent. This replicates its work: create the
/// directory at `cg_root` and enable the memory and pids controllers so
/// per-box child cgroups can be created.
///
/// Returns `Ok(false)` when cgroup v2 or the memory controller is
/// unavailable; the caller should fall back to RLIMIT_AS limiting.
pub fn prepare_cgroup(cg_root: &Path) -> Result<bool, SandboxError> {
    let cg_base = Path::new("/sys/fs/cgroup");

    let controllers_path = cg_base.join("cgroup.controllers");
    if !controllers_path.exists() {
        return Ok(false);
    }
    let controllers = fs::read_to_string(&controllers_path)?;
    if !controllers.split_whitespace().any(|c| c == "memory") {
        return Ok(false);
    }

    // Already set up by a previous run.
    if cg_root.exists() {
        let subtree = cg_root.join("cgroup.subtree_control");
        if let Ok(content) = fs::read_to_string(&subtree)
            && content.split_whitespace().any(|c| c == "memory")
        {
            return Ok(true);
        }
    }

    // cgroup v2 forbids enabling controllers in a cgroup that holds
    // processes, so move ourselves into a leaf first.
    let init_cg = cg_base.join("init");
    if !init_cg.exists() {
        fs::create_dir(&init_cg)?;
    }
    fs::write(init_cg.join("cgroup.procs"), std::process::id().to_string())?;

    fs::write(cg_base.join("cgroup.subtree_control"), "+memory +pids")?;

    if !cg_root.exists() {
        fs::create_dir(cg_root)?;
    }
    fs::write(cg_root.join("cgroup.subtree_control"), "+memory +pids")?;

    Ok(true)
}

/// Check that every required mount source exists on the host.
///
/// Optional mounts are skipped; a missing required mount is an error before
/// any process is spawned.
pub fn validate_mounts(mounts: &[MountConfig]) -> Result<(), SandboxError> {
    for mount in mounts {
        if mount.optional {
            continue;
        }
        if !Path::new(&mount.source).exists() {
            return Err(SandboxError::MountSourceNotFound(mount.source.clone()));
        }
    }
    Ok(())
}

/// Resolve a bare program name to an absolute host path.
///
/// Isolate launches the command with `execve`, which does not search PATH,
/// so `g++` or `node` must become `/usr/bin/g++` before crossing into the
/// box. Commands already containing a `/` are left alone. The result is
/// canonicalized so bind-mounted toolchains behind symlinks stay reachable
/// inside the sandbox.
pub fn resolve_program(command: &mut [String]) -> Result<(), SandboxError> {
    let Some(first) = command.first_mut() else {
        return Ok(());
    };
    if first.contains('/') {
        return Ok(());
    }

    let path_var = std::env::var("PATH").unwrap_or_default();
    for dir in path_var.split(':') {
        let candidate = PathBuf::from(dir).join(&*first);
        if candidate.exists() {
            *first = fs::canonicalize(&candidate)
                .unwrap_or(candidate)
                .to_string_lossy()
                .into_owned();
            return Ok(());
        }
    }

    Err(SandboxError::ProgramNotFound(first.clone()))
}
