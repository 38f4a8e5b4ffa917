//! Schedtune knob backends.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-group schedtune knobs.
///
/// Implementations must be total: errors are logged, never returned.
pub trait TuneBackend: Send + Sync + 'static {
    /// Bias migration of the group's tasks toward big cores.
    fn set_boost(&self, group: &str, enable: bool);

    /// Prefer idle cores when placing the group's tasks.
    fn set_prefer_idle(&self, group: &str, enable: bool);

    /// Place the group's tasks on idle cores with the highest original
    /// capacity.
    fn set_crucial(&self, group: &str, enable: bool);
}

/// Backend that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBackend;

impl TuneBackend for TracingBackend {
    fn set_boost(&self, group: &str, enable: bool) {
        info!(group, enable, "schedtune boost");
    }

    fn set_prefer_idle(&self, group: &str, enable: bool) {
        info!(group, enable, "schedtune prefer_idle");
    }

    fn set_crucial(&self, group: &str, enable: bool) {
        info!(group, enable, "schedtune crucial");
    }
}

/// Knob values of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupTune {
    pub boost: bool,
    pub prefer_idle: bool,
    pub crucial: bool,
}

/// In-memory knob table, for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    groups: RwLock<BTreeMap<String, GroupTune>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current knobs of `group` (all off if never touched).
    pub fn group(&self, group: &str) -> GroupTune {
        self.groups.read().get(group).copied().unwrap_or_default()
    }

    /// Snapshot of every touched group.
    pub fn snapshot(&self) -> BTreeMap<String, GroupTune> {
        self.groups.read().clone()
    }

    fn update(&self, group: &str, f: impl FnOnce(&mut GroupTune)) {
        let mut groups = self.groups.write();
        f(groups.entry(group.to_string()).or_default());
    }
}

impl TuneBackend for InMemoryBackend {
    fn set_boost(&self, group: &str, enable: bool) {
        self.update(group, |g| g.boost = enable);
    }

    fn set_prefer_idle(&self, group: &str, enable: bool) {
        self.update(group, |g| g.prefer_idle = enable);
    }

    fn set_crucial(&self, group: &str, enable: bool) {
        self.update(group, |g| g.crucial = enable);
    }
}

/// Backend writing the schedtune cgroup files, e.g.
/// `/dev/stune/top-app/schedtune.boost`.
#[derive(Debug, Clone)]
pub struct StuneFsBackend {
    root: PathBuf,
    boost_value: u8,
}

impl StuneFsBackend {
    /// Default schedtune mount point.
    pub const DEFAULT_ROOT: &'static str = "/dev/stune";

    /// `boost_value` is written to `schedtune.boost` when boosting.
    pub fn new(root: impl Into<PathBuf>, boost_value: u8) -> Self {
        Self {
            root: root.into(),
            boost_value,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn knob_path(&self, group: &str, knob: &str) -> PathBuf {
        self.root.join(group).join(format!("schedtune.{}", knob))
    }

    fn write_knob(&self, group: &str, knob: &str, value: u8) {
        let path = self.knob_path(group, knob);
        if let Err(e) = write_value(&path, value) {
            warn!(path = %path.display(), value, error = %e, "Failed to write schedtune knob");
        }
    }
}

fn write_value(path: &Path, value: u8) -> io::Result<()> {
    fs::write(path, format!("{}\n", value))
}

impl TuneBackend for StuneFsBackend {
    fn set_boost(&self, group: &str, enable: bool) {
        let value = if enable { self.boost_value } else { 0 };
        self.write_knob(group, "boost", value);
    }

    fn set_prefer_idle(&self, group: &str, enable: bool) {
        self.write_knob(group, "prefer_idle", u8::from(enable));
    }

    fn set_crucial(&self, group: &str, enable: bool) {
        self.write_knob(group, "crucial", u8::from(enable));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_tracks_groups() {
        let backend = InMemoryBackend::new();
        backend.set_boost("top-app", true);
        backend.set_prefer_idle("foreground", true);

        assert_eq!(
            backend.group("top-app"),
            GroupTune {
                boost: true,
                ..Default::default()
            }
        );
        assert!(backend.group("foreground").prefer_idle);
        assert_eq!(backend.group("background"), GroupTune::default());
        assert_eq!(backend.snapshot().len(), 2);
    }

    #[test]
    fn test_fs_backend_writes_knobs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("top-app")).unwrap();
        let backend = StuneFsBackend::new(dir.path(), 15);

        backend.set_boost("top-app", true);
        backend.set_prefer_idle("top-app", true);
        let read = |knob: &str| {
            fs::read_to_string(dir.path().join("top-app").join(knob)).unwrap()
        };
        assert_eq!(read("schedtune.boost"), "15\n");
        assert_eq!(read("schedtune.prefer_idle"), "1\n");

        backend.set_boost("top-app", false);
        assert_eq!(read("schedtune.boost"), "0\n");
    }

    #[test]
    fn test_fs_backend_missing_group_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StuneFsBackend::new(dir.path(), 10);

        // Logged and ignored
        backend.set_crucial("does-not-exist", true);
        assert!(!dir.path().join("does-not-exist").exists());
    }
}
