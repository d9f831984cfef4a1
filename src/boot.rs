//! Reboot detection.
//!
//! The system uptime only grows while the machine stays up, so observing a
//! smaller uptime than the one persisted on the previous run means the machine
//! was restarted in between.

use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Source of a coarse, monotonically increasing uptime counter.
pub trait UptimeSource {
    /// Seconds since boot, or `None` when the platform cannot tell.
    fn uptime_bucket(&self) -> Option<u64>;
}

/// Reads the uptime of the running machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemUptime;

impl UptimeSource for SystemUptime {
    #[cfg(target_os = "linux")]
    fn uptime_bucket(&self) -> Option<u64> {
        let raw = fs::read_to_string("/proc/uptime").ok()?;
        let seconds: f64 = raw.split_whitespace().next()?.parse().ok()?;
        Some(seconds as u64)
    }

    #[cfg(not(target_os = "linux"))]
    fn uptime_bucket(&self) -> Option<u64> {
        None
    }
}

/// Outcome of comparing the current uptime with the persisted boot epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStatus {
    /// No previous epoch was on record.
    FirstObservation,
    /// Same boot session as the previous run.
    SameSession,
    /// Uptime went backwards: the machine was restarted.
    Rebooted,
    /// The uptime counter is not available on this platform.
    Unavailable,
}

/// Persists the last observed boot epoch in `boot_id.txt`.
pub struct BootTracker<S = SystemUptime> {
    path: PathBuf,
    source: S,
}

impl BootTracker<SystemUptime> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_source(path, SystemUptime)
    }
}

impl<S: UptimeSource> BootTracker<S> {
    pub fn with_source(path: impl Into<PathBuf>, source: S) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    /// Compares the fresh uptime bucket with the persisted one and records the
    /// fresh value. Call once per process start.
    pub fn observe(&self) -> BootStatus {
        let Some(current) = self.source.uptime_bucket() else {
            return BootStatus::Unavailable;
        };

        let previous = fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok());

        let status = match previous {
            None => BootStatus::FirstObservation,
            Some(old) if current < old => BootStatus::Rebooted,
            Some(_) => BootStatus::SameSession,
        };

        if let Err(e) = fs::write(&self.path, current.to_string()) {
            warn!(path = %self.path.display(), error = %e, "could not persist boot epoch");
        }

        match status {
            BootStatus::Rebooted => info!(current, previous = ?previous, "reboot detected"),
            _ => debug!(current, ?status, "boot epoch observed"),
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct FixedUptime(Cell<Option<u64>>);

    impl UptimeSource for FixedUptime {
        fn uptime_bucket(&self) -> Option<u64> {
            self.0.get()
        }
    }

    #[test]
    fn test_detects_uptime_decrease() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let tracker = BootTracker::with_source(
            temp_dir.path().join("boot_id.txt"),
            FixedUptime(Cell::new(Some(500))),
        );

        assert_eq!(tracker.observe(), BootStatus::FirstObservation);
        tracker.source.0.set(Some(900));
        assert_eq!(tracker.observe(), BootStatus::SameSession);
        tracker.source.0.set(Some(30));
        assert_eq!(tracker.observe(), BootStatus::Rebooted);
        tracker.source.0.set(Some(31));
        assert_eq!(tracker.observe(), BootStatus::SameSession);
    }

    #[test]
    fn test_corrupt_epoch_counts_as_first_observation() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("boot_id.txt");
        fs::write(&path, "not a number").unwrap();

        let tracker = BootTracker::with_source(&path, FixedUptime(Cell::new(Some(10))));
        assert_eq!(tracker.observe(), BootStatus::FirstObservation);
        assert_eq!(fs::read_to_string(&path).unwrap(), "10");
    }

    #[test]
    fn test_unavailable_uptime_leaves_file_untouched() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("boot_id.txt");
        fs::write(&path, "42").unwrap();

        let tracker = BootTracker::with_source(&path, FixedUptime(Cell::new(None)));
        assert_eq!(tracker.observe(), BootStatus::Unavailable);
        assert_eq!(fs::read_to_string(&path).unwrap(), "42");
    }
}
