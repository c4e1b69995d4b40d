use notify::event::EventKind;
use notify::{Event, PollWatcher, RecursiveMode, Watcher};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::debug;

use crate::config::WatchOptions;
use crate::errors::{HotError, Result};
use crate::module_id::ModuleId;

/// File watcher collaborator: observes the files behind tracked modules.
pub trait ModuleWatcher {
    fn watch(&mut self, id: &ModuleId) -> Result<()>;
    fn unwatch(&mut self, id: &ModuleId) -> Result<()>;
}

/// Watcher that observes nothing, for sessions driven by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWatcher;

impl ModuleWatcher for NullWatcher {
    fn watch(&mut self, _id: &ModuleId) -> Result<()> {
        Ok(())
    }

    fn unwatch(&mut self, _id: &ModuleId) -> Result<()> {
        Ok(())
    }
}

/// `notify`-backed watcher.
///
/// Watches the parent directory of every tracked module rather than the file
/// itself, so editors that save by replacing the file keep being observed.
/// Directories are reference counted by the modules that live in them.
pub struct NotifyWatcher {
    inner: Box<dyn Watcher + Send>,
    modules: FxHashSet<ModuleId>,
    directories: FxHashMap<PathBuf, usize>,
}

/// Receiving end of a [`NotifyWatcher`].
pub struct ChangeEvents {
    rx: Receiver<notify::Result<Event>>,
}

impl NotifyWatcher {
    pub fn new(options: &WatchOptions) -> Result<(Self, ChangeEvents)> {
        let (tx, rx) = channel();

        let inner: Box<dyn Watcher + Send> = if options.use_polling {
            let config = notify::Config::default().with_poll_interval(options.poll_interval());
            Box::new(PollWatcher::new(tx, config)?)
        } else {
            Box::new(notify::recommended_watcher(tx)?)
        };

        let watcher = Self {
            inner,
            modules: FxHashSet::default(),
            directories: FxHashMap::default(),
        };
        Ok((watcher, ChangeEvents { rx }))
    }

    pub fn is_watching(&self, id: &ModuleId) -> bool {
        self.modules.contains(id)
    }

    fn directory_of(id: &ModuleId) -> PathBuf {
        id.as_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| id.as_path().to_path_buf())
    }
}

impl ModuleWatcher for NotifyWatcher {
    fn watch(&mut self, id: &ModuleId) -> Result<()> {
        if self.modules.contains(id) {
            return Ok(());
        }

        let dir = Self::directory_of(id);
        let count = self.directories.get(&dir).copied().unwrap_or(0);
        if count == 0 {
            self.inner.watch(&dir, RecursiveMode::NonRecursive)?;
            debug!("Watching directory {:?}", dir);
        }
        self.directories.insert(dir, count + 1);
        self.modules.insert(id.clone());
        Ok(())
    }

    fn unwatch(&mut self, id: &ModuleId) -> Result<()> {
        if !self.modules.remove(id) {
            return Ok(());
        }

        let dir = Self::directory_of(id);
        match self.directories.get(&dir).copied() {
            Some(count) if count > 1 => {
                self.directories.insert(dir, count - 1);
            }
            Some(_) => {
                self.directories.remove(&dir);
                self.inner.unwatch(&dir)?;
                debug!("Stopped watching directory {:?}", dir);
            }
            None => {}
        }
        Ok(())
    }
}

impl ChangeEvents {
    /// Events fed by something other than a [`NotifyWatcher`].
    pub fn from_receiver(rx: Receiver<notify::Result<Event>>) -> Self {
        Self { rx }
    }

    /// Wait up to `timeout` for file events and return the changed paths.
    ///
    /// Returns an empty list on timeout; errors once the watcher is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<PathBuf>> {
        let mut changed = Vec::new();

        match self.rx.recv_timeout(timeout) {
            Ok(event) => collect_changes(event, &mut changed),
            Err(RecvTimeoutError::Timeout) => return Ok(changed),
            Err(RecvTimeoutError::Disconnected) => return Err(HotError::WatcherDisconnected),
        }
        // Drain whatever else arrived with it.
        while let Ok(event) = self.rx.try_recv() {
            collect_changes(event, &mut changed);
        }

        Ok(changed)
    }
}

fn collect_changes(event: notify::Result<Event>, changed: &mut Vec<PathBuf>) {
    match event {
        Ok(event) if is_content_change(&event.kind) => {
            for path in event.paths {
                if !changed.contains(&path) {
                    changed.push(path);
                }
            }
        }
        Ok(_) => {}
        Err(e) => debug!("Ignoring watcher error: {}", e),
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};

    #[test]
    fn test_content_change_kinds() {
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Any)));
        assert!(!is_content_change(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn test_collect_changes_deduplicates_paths() {
        let mut changed = Vec::new();
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/app/a.hot"))
            .add_path(PathBuf::from("/app/a.hot"));
        collect_changes(Ok(event), &mut changed);

        assert_eq!(changed, vec![PathBuf::from("/app/a.hot")]);
    }

    #[test]
    fn test_notify_watcher_reference_counts_directories() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.hot");
        let b = dir.path().join("b.hot");
        std::fs::write(&a, "").unwrap();
        std::fs::write(&b, "").unwrap();

        let (mut watcher, _events) = NotifyWatcher::new(&WatchOptions::default()).unwrap();
        let a = ModuleId::from(a);
        let b = ModuleId::from(b);

        watcher.watch(&a).unwrap();
        watcher.watch(&b).unwrap();
        watcher.watch(&a).unwrap();
        assert_eq!(watcher.directories.len(), 1);
        assert_eq!(watcher.directories.values().copied().next(), Some(2));

        watcher.unwatch(&a).unwrap();
        assert!(!watcher.is_watching(&a));
        assert!(watcher.is_watching(&b));
        assert_eq!(watcher.directories.len(), 1);

        watcher.unwatch(&b).unwrap();
        watcher.unwatch(&b).unwrap();
        assert!(watcher.directories.is_empty());
    }
}
