//! Sandbox lifecycle: init, file staging, teardown, and the bounded pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::process::Command;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, instrument, warn};

use crate::sandbox::SandboxError;
use crate::sandbox::command::{IsolateAction, IsolateCommand};

/// One initialized isolate box.
///
/// The box directory on the host holds the program's files; inside the
/// sandbox it is mounted at `/box`. Always call
/// [`teardown()`](Self::teardown) before dropping: isolate keeps kernel and
/// filesystem state per box that only `--cleanup` reclaims. The `Drop`
/// implementation makes a best-effort attempt from a spawned thread and
/// logs a warning, but may not complete before process exit.
#[derive(Debug)]
pub struct Sandbox {
    id: u32,
    box_dir: PathBuf,
    isolate_path: PathBuf,
    alive: bool,
    cgroup: bool,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Sandbox {
    /// Run `isolate --init` and wrap the resulting box.
    #[instrument(skip(isolate_path))]
    pub async fn init(
        id: u32,
        isolate_path: impl Into<PathBuf>,
        cgroup: bool,
    ) -> Result<Self, SandboxError> {
        let isolate_path = isolate_path.into();

        let args = IsolateCommand::new(&isolate_path, id)
            .action(IsolateAction::Init)
            .cgroup(cgroup)
            .build();
        debug!(?args, "initializing sandbox");

        let output = Command::new(&args[0])
            .args(&args[1..])
            .output()
            .await
            .map_err(SandboxError::SpawnFailed)?;

        if !output.status.success() {
            return Err(SandboxError::InitFailed {
                id,
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        // --init prints the box directory
        let box_dir = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        if !box_dir.exists() {
            return Err(SandboxError::InitFailed {
                id,
                message: format!("box directory missing: {}", box_dir.display()),
            });
        }

        debug!(?box_dir, "sandbox ready");

        Ok(Self {
            id,
            box_dir,
            isolate_path,
            alive: true,
            cgroup,
            _permit: None,
        })
    }

    /// Box ID.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Path to the isolate binary this box was created with.
    pub fn isolate_path(&self) -> &Path {
        &self.isolate_path
    }

    /// Host path of a file inside the box.
    ///
    /// Rejects absolute names and `..` components.
    pub fn host_path(&self, name: &str) -> Result<PathBuf, SandboxError> {
        check_box_relative(name)?;
        Ok(self.box_dir.join("box").join(name))
    }

    /// Path of a file as seen from inside the sandbox, where the box
    /// directory is mounted at `/box`. This is what isolate's `--stdin`,
    /// `--stdout` and `--stderr` flags expect.
    pub fn inner_path(&self, name: &str) -> Result<PathBuf, SandboxError> {
        check_box_relative(name)?;
        Ok(PathBuf::from("/box").join(name))
    }

    /// Stage a file into the box.
    #[instrument(skip(self, content))]
    pub async fn write_file(&self, name: &str, content: &[u8]) -> Result<(), SandboxError> {
        let path = self.host_path(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!(?path, len = content.len(), "staged file");
        Ok(())
    }

    /// Read a file back out of the box.
    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>, SandboxError> {
        let path = self.host_path(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// Whether a file exists in the box.
    pub async fn file_exists(&self, name: &str) -> Result<bool, SandboxError> {
        let path = self.host_path(name)?;
        Ok(tokio::fs::metadata(&path).await.is_ok())
    }

    /// Run `isolate --cleanup`, killing everything left in the box and
    /// reclaiming its files and cgroup.
    ///
    /// Safe to call twice; the second call is a no-op.
    #[must_use = "teardown failures are infrastructure errors and must be reported"]
    #[instrument(skip(self))]
    pub async fn teardown(&mut self) -> Result<(), SandboxError> {
        if !self.alive {
            return Ok(());
        }

        let args = IsolateCommand::new(&self.isolate_path, self.id)
            .action(IsolateAction::Cleanup)
            .cgroup(self.cgroup)
            .build();
        debug!(?args, "tearing down sandbox");

        let output = Command::new(&args[0])
            .args(&args[1..])
            .output()
            .await
            .map_err(SandboxError::SpawnFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(id = self.id, %stderr, "sandbox teardown failed");
            return Err(SandboxError::TeardownFailed {
                id: self.id,
                message: stderr.into_owned(),
            });
        }

        self.alive = false;
        debug!("sandbox torn down");
        Ok(())
    }

    /// Whether the box has not been torn down yet.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub(crate) fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self._permit = Some(permit);
        self
    }
}

fn check_box_relative(name: &str) -> Result<(), SandboxError> {
    if name.starts_with('/') || name.split('/').any(|part| part == "..") {
        return Err(SandboxError::InvalidPath(name.to_string()));
    }
    Ok(())
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if !self.alive {
            return;
        }
        warn!(
            box_id = self.id,
            "Sandbox dropped without teardown; attempting best-effort cleanup from a thread"
        );

        let isolate_path = self.isolate_path.clone();
        let id = self.id;
        let cgroup = self.cgroup;
        std::thread::spawn(move || {
            let args = IsolateCommand::new(&isolate_path, id)
                .action(IsolateAction::Cleanup)
                .cgroup(cgroup)
                .build();
            match std::process::Command::new(&args[0]).args(&args[1..]).output() {
                Ok(output) if output.status.success() => {
                    debug!(box_id = id, "best-effort cleanup succeeded");
                }
                Ok(output) => {
                    warn!(
                        box_id = id,
                        stderr = %String::from_utf8_lossy(&output.stderr),
                        "best-effort cleanup failed"
                    );
                }
                Err(e) => {
                    warn!(box_id = id, error = %e, "best-effort cleanup spawn failed");
                }
            }
        });
    }
}

/// Bounded pool of isolate boxes.
///
/// This is the system-wide admission control for judging: at most
/// `capacity` boxes (and therefore submissions) run at once. Box IDs are
/// handed out round-robin from `start_id`.
#[derive(Debug)]
pub struct SandboxPool {
    start_id: u32,
    count: u32,
    isolate_path: PathBuf,
    cgroup: bool,
    semaphore: Arc<Semaphore>,
    next_id: AtomicU32,
}

impl SandboxPool {
    /// Create a pool of `count` boxes starting at `start_id`.
    pub fn new(start_id: u32, count: u32, isolate_path: impl Into<PathBuf>, cgroup: bool) -> Self {
        Self {
            start_id,
            count,
            isolate_path: isolate_path.into(),
            cgroup,
            semaphore: Arc::new(Semaphore::new(count as usize)),
            next_id: AtomicU32::new(start_id),
        }
    }

    /// Acquire a box, waiting until one is free.
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<Sandbox, SandboxError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SandboxError::PoolClosed)?;
        self.init_with_permit(permit).await
    }

    /// Acquire a box without waiting.
    ///
    /// Returns [`SandboxError::PoolBusy`] when all boxes are in use; this is
    /// the backpressure signal for callers that must not queue.
    #[instrument(skip(self))]
    pub async fn try_acquire(&self) -> Result<Sandbox, SandboxError> {
        let permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => SandboxError::PoolBusy,
                TryAcquireError::Closed => SandboxError::PoolClosed,
            })?;
        self.init_with_permit(permit).await
    }

    async fn init_with_permit(&self, permit: OwnedSemaphorePermit) -> Result<Sandbox, SandboxError> {
        let raw = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = self.start_id + (raw - self.start_id) % self.count;
        debug!(id, "acquired sandbox slot");

        let sandbox = Sandbox::init(id, &self.isolate_path, self.cgroup).await?;
        Ok(sandbox.with_permit(permit))
    }

    /// Number of currently free slots.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Total number of slots.
    pub fn capacity(&self) -> u32 {
        self.count
    }
}
