//! Persisted undo stack.
//!
//! The log is a JSON array of [`Action`]s in `undo_stack.json`. Every
//! operation takes an exclusive lock on a sibling lock file for its whole
//! read-modify-write cycle, so concurrent processes never interleave
//! mutations. New contents are written to a temporary file and renamed over
//! the log, so a crash leaves either the old or the new stack on disk.

use crate::boot::{BootStatus, BootTracker, UptimeSource};
use crate::config::LockPolicy;
use crate::error::ActionLogError;
use crate::mover::Action;
use crate::paths::StatePaths;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

pub type LogResult<T> = Result<T, ActionLogError>;

/// Process-wide handle on the persisted undo stack. Construct once and pass
/// by reference to whatever needs to record or undo work.
#[derive(Debug, Clone)]
pub struct ActionLog {
    path: PathBuf,
    lock_path: PathBuf,
    policy: LockPolicy,
}

/// Held for the duration of one read-modify-write cycle.
struct LogLock {
    file: File,
}

impl Drop for LogLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl ActionLog {
    pub fn new(paths: &StatePaths, policy: LockPolicy) -> Self {
        Self {
            path: paths.undo_stack.clone(),
            lock_path: paths.undo_lock.clone(),
            policy,
        }
    }

    /// Appends an action as the newest entry.
    pub fn push(&self, action: Action) -> LogResult<()> {
        self.mutate(|stack| {
            stack.push(action);
            (true, ())
        })?;
        debug!(path = %self.path.display(), "pushed action");
        Ok(())
    }

    /// Removes and returns the newest action.
    pub fn pop_last(&self) -> LogResult<Option<Action>> {
        self.mutate(|stack| {
            let popped = stack.pop();
            (popped.is_some(), popped)
        })
    }

    /// Removes every action and returns them newest first.
    pub fn drain_all(&self) -> LogResult<Vec<Action>> {
        self.mutate(|stack| {
            let drained: Vec<Action> = stack.drain(..).rev().collect();
            (!drained.is_empty(), drained)
        })
    }

    /// Runs `replay` on the newest action while holding the lock, then removes
    /// it. If the process dies during `replay` the action stays on the log.
    pub fn consume_last<T>(&self, replay: impl FnOnce(&Action) -> T) -> LogResult<Option<T>> {
        self.mutate(|stack| match stack.last() {
            Some(action) => {
                let outcome = replay(action);
                stack.pop();
                (true, Some(outcome))
            }
            None => (false, None),
        })
    }

    /// Like [`consume_last`](Self::consume_last) for every action, newest
    /// first. The log is rewritten after each action.
    pub fn consume_all<T>(&self, mut replay: impl FnMut(&Action) -> T) -> LogResult<Vec<T>> {
        let _lock = self.acquire()?;
        let mut stack = self.read_stack()?;
        let mut outcomes = Vec::with_capacity(stack.len());
        while let Some(action) = stack.last() {
            outcomes.push(replay(action));
            stack.pop();
            self.write_stack(&stack)?;
        }
        Ok(outcomes)
    }

    /// Empties the log.
    pub fn reset(&self) -> LogResult<()> {
        self.mutate(|stack| {
            stack.clear();
            (true, ())
        })
    }

    /// Current actions, oldest first, without modifying the log.
    pub fn snapshot(&self) -> LogResult<Vec<Action>> {
        let _lock = self.acquire()?;
        self.read_stack()
    }

    pub fn len(&self) -> LogResult<usize> {
        Ok(self.snapshot()?.len())
    }

    pub fn is_empty(&self) -> LogResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Clears the log if the machine rebooted since the last observation.
    /// Must run before any other operation in a new process.
    pub fn reconcile_boot<S: UptimeSource>(&self, tracker: &BootTracker<S>) -> LogResult<BootStatus> {
        let status = tracker.observe();
        if status == BootStatus::Rebooted {
            info!(path = %self.path.display(), "reboot detected, discarding undo history");
            self.reset()?;
        }
        Ok(status)
    }

    /// Runs `f` on the decoded stack under the lock. `f` returns whether the
    /// stack changed and must be written back.
    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<Action>) -> (bool, T)) -> LogResult<T> {
        let _lock = self.acquire()?;
        let mut stack = self.read_stack()?;
        let (changed, value) = f(&mut stack);
        if changed {
            self.write_stack(&stack)?;
        }
        Ok(value)
    }

    fn acquire(&self) -> LogResult<LogLock> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ActionLogError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| ActionLogError::io(&self.lock_path, e))?;

        let started = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(LogLock { file }),
                Err(e) if started.elapsed() >= self.policy.timeout() => {
                    warn!(path = %self.lock_path.display(), error = %e, "giving up on action log lock");
                    return Err(ActionLogError::LockTimeout {
                        path: self.lock_path.clone(),
                        waited: started.elapsed(),
                    });
                }
                Err(_) => thread::sleep(self.policy.retry_interval()),
            }
        }
    }

    fn read_stack(&self) -> LogResult<Vec<Action>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ActionLogError::io(&self.path, e)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        match serde_json::from_slice::<Vec<Action>>(&raw) {
            Ok(stack) => Ok(stack),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "undo log unreadable, starting empty");
                Ok(Vec::new())
            }
        }
    }

    fn write_stack(&self, stack: &[Action]) -> LogResult<()> {
        let data = serde_json::to_vec_pretty(stack)?;
        let tmp = self.path.with_extension("json.tmp");

        let mut file = File::create(&tmp).map_err(|e| ActionLogError::io(&tmp, e))?;
        file.write_all(&data)
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.sync_all())
            .map_err(|e| ActionLogError::io(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| ActionLogError::io(&self.path, e))
    }
}
