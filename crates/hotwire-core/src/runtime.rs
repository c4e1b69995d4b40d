use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use crate::config::WatchOptions;
use crate::errors::{HotError, Result};
use crate::fingerprint::Fingerprints;
use crate::fs::FileSystem;
use crate::loader::ModuleLoader;
use crate::module_id::ModuleId;
use crate::reload::ReloadReport;
use crate::session::Session;
use crate::watcher::ChangeEvents;

const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Drives a [`Session`] from file watcher events.
pub struct HotRuntime<L: ModuleLoader> {
    session: Session<L>,
    events: ChangeEvents,
    debounce: Duration,
    last_seen: FxHashMap<ModuleId, Instant>,
    /// Changes that arrived inside the debounce window, reloaded once it ends
    pending: Vec<ModuleId>,
    fingerprints: Option<Fingerprints>,
}

impl<L: ModuleLoader> HotRuntime<L> {
    /// Wrap a session whose entry is already loaded.
    pub fn new(
        session: Session<L>,
        events: ChangeEvents,
        options: &WatchOptions,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let fingerprints = options.skip_unchanged.then(|| Fingerprints::new(fs));
        let mut runtime = Self {
            session,
            events,
            debounce: options.debounce(),
            last_seen: FxHashMap::default(),
            pending: Vec::new(),
            fingerprints,
        };
        runtime.record_known_modules();
        runtime
    }

    pub fn session(&self) -> &Session<L> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<L> {
        &mut self.session
    }

    /// Wait up to `timeout` for one batch of events and handle it, then
    /// reload debounced changes whose window has passed.
    pub fn poll(&mut self, timeout: Duration) -> Result<Vec<ReloadReport>> {
        let paths = self.events.recv_timeout(timeout)?;
        let mut reports = self.dispatch(paths);
        reports.extend(self.flush_pending());
        Ok(reports)
    }

    /// Handle events until the watcher goes away.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let timeout = if self.pending.is_empty() {
                POLL_TIMEOUT
            } else {
                self.debounce.min(POLL_TIMEOUT)
            };
            match self.poll(timeout) {
                Ok(_) => {}
                Err(HotError::WatcherDisconnected) => {
                    debug!("Watcher disconnected, stopping");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Handle changed paths, skipping untracked and unchanged ones.
    ///
    /// With content fingerprints a real change reloads at once. Without
    /// them, repeated events inside the debounce window are deferred to
    /// [`HotRuntime::poll`] instead of being dropped.
    pub fn dispatch(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> Vec<ReloadReport> {
        let mut reports = Vec::new();

        for path in paths {
            let id = ModuleId::from(path);
            if !self.session.is_tracked(&id) {
                trace!("Ignoring event for untracked {}", id);
                continue;
            }

            match self.fingerprints.as_mut().map(|f| f.has_changed(&id)) {
                Some(false) => {
                    debug!("Content of {} unchanged, skipping", id);
                    continue;
                }
                Some(true) => {}
                None if self.is_debounced(&id) => {
                    trace!("Debounced {}", id);
                    if !self.pending.contains(&id) {
                        self.pending.push(id);
                    }
                    continue;
                }
                None => {}
            }

            self.pending.retain(|pending| pending != &id);
            reports.extend(self.reload(&id));
        }

        reports
    }

    /// Reload deferred changes whose debounce window has passed.
    fn flush_pending(&mut self) -> Vec<ReloadReport> {
        let mut reports = Vec::new();
        for id in std::mem::take(&mut self.pending) {
            if !self.session.is_tracked(&id) {
                continue;
            }
            if self.is_debounced(&id) {
                self.pending.push(id);
                continue;
            }
            reports.extend(self.reload(&id));
        }
        reports
    }

    fn reload(&mut self, id: &ModuleId) -> Option<ReloadReport> {
        info!("Change detected: {}", id);
        let safety_net = self.session.safety_net();
        let session = &mut self.session;
        match safety_net.guard(|| session.handle_change(id)) {
            Ok(report) => {
                info!("{}: {}", id, report);
                self.record_report(&report);
                Some(report)
            }
            Err(panic) => {
                let failure = format!("reload of {} panicked: {}", id, panic);
                self.session.report_uncaught_failure(&failure);
                None
            }
        }
    }

    fn is_debounced(&mut self, id: &ModuleId) -> bool {
        let now = Instant::now();
        if let Some(previous) = self.last_seen.get(id) {
            if now.duration_since(*previous) < self.debounce {
                return true;
            }
        }
        self.last_seen.insert(id.clone(), now);
        false
    }

    fn record_known_modules(&mut self) {
        let Some(fingerprints) = self.fingerprints.as_mut() else {
            return;
        };
        let graph = self.session.graph();
        for id in graph.modules().chain(self.session.entry()) {
            fingerprints.record(id);
        }
    }

    /// Refresh fingerprints of evicted modules; drop state kept for modules
    /// the reload left untracked.
    fn record_report(&mut self, report: &ReloadReport) {
        for id in &report.evicted {
            let tracked = self.session.is_tracked(id);
            if !tracked {
                self.last_seen.remove(id);
            }
            if let Some(fingerprints) = self.fingerprints.as_mut() {
                if tracked {
                    fingerprints.record(id);
                } else {
                    fingerprints.forget(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HotOptions;
    use crate::diagnostics::CollectingDiagnosticHandler;
    use crate::eligibility::EligibilityFilter;
    use crate::fs::MockFileSystem;
    use crate::host::DirectiveLoader;
    use crate::watcher::NullWatcher;
    use notify::event::{EventKind, ModifyKind};
    use notify::Event;
    use std::path::Path;
    use std::sync::mpsc::{channel, Sender};

    type Events = Sender<notify::Result<Event>>;

    fn setup(fs: &Arc<MockFileSystem>, options: WatchOptions) -> (HotRuntime<DirectiveLoader>, Events) {
        let mut session = Session::new(
            DirectiveLoader::new(fs.clone()),
            Box::new(NullWatcher),
            &HotOptions::default(),
            EligibilityFilter::default(),
            Arc::new(CollectingDiagnosticHandler::new()),
        );
        session.load_entry("./entry.hot").unwrap();

        let (tx, rx) = channel();
        let runtime = HotRuntime::new(session, ChangeEvents::from_receiver(rx), &options, fs.clone());
        (runtime, tx)
    }

    fn app() -> Arc<MockFileSystem> {
        let fs = Arc::new(MockFileSystem::with_cwd("/app"));
        fs.add_file("/app/entry.hot", "require ./a.hot\n");
        fs.add_file("/app/a.hot", "accept\n");
        fs
    }

    fn no_debounce() -> WatchOptions {
        WatchOptions {
            debounce_ms: 0,
            ..WatchOptions::default()
        }
    }

    fn modify(tx: &Events, path: &str) {
        let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from(path));
        tx.send(Ok(event)).unwrap();
    }

    #[test]
    fn test_unchanged_content_is_skipped() {
        let fs = app();
        let (mut runtime, tx) = setup(&fs, no_debounce());

        modify(&tx, "/app/a.hot");
        let reports = runtime.poll(Duration::from_millis(10)).unwrap();
        assert!(reports.is_empty());
        assert_eq!(runtime.session().loader().journal().evaluations("/app/a.hot"), 1);

        fs.write_file(Path::new("/app/a.hot"), "accept\nprint edited\n").unwrap();
        modify(&tx, "/app/a.hot");
        let reports = runtime.poll(Duration::from_millis(10)).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reloaded, vec![ModuleId::new("/app/a.hot")]);
        assert_eq!(runtime.session().loader().journal().output(), vec!["edited"]);
    }

    #[test]
    fn test_untracked_paths_are_ignored() {
        let fs = app();
        fs.add_file("/app/other.hot", "print other\n");
        let (mut runtime, _tx) = setup(&fs, no_debounce());

        let reports = runtime.dispatch(vec![PathBuf::from("/app/other.hot")]);
        assert!(reports.is_empty());
    }

    #[test]
    fn test_repeated_events_are_debounced() {
        let fs = app();
        let options = WatchOptions {
            debounce_ms: 60_000,
            skip_unchanged: false,
            ..WatchOptions::default()
        };
        let (mut runtime, _tx) = setup(&fs, options);

        let path = PathBuf::from("/app/a.hot");
        assert_eq!(runtime.dispatch(vec![path.clone()]).len(), 1);
        assert!(runtime.dispatch(vec![path]).is_empty());
        assert_eq!(runtime.session().loader().journal().evaluations("/app/a.hot"), 2);
    }

    #[test]
    fn test_successive_edits_inside_debounce_window_all_reload() {
        let fs = app();
        let options = WatchOptions {
            debounce_ms: 60_000,
            ..WatchOptions::default()
        };
        let (mut runtime, _tx) = setup(&fs, options);
        let path = PathBuf::from("/app/a.hot");

        fs.write_file(Path::new("/app/a.hot"), "accept\nprint v2\n").unwrap();
        assert_eq!(runtime.dispatch(vec![path.clone()]).len(), 1);

        fs.write_file(Path::new("/app/a.hot"), "accept\nprint v3\n").unwrap();
        assert_eq!(runtime.dispatch(vec![path]).len(), 1);

        assert_eq!(runtime.session().loader().journal().output(), vec!["v2", "v3"]);
    }

    #[test]
    fn test_debounced_change_reloads_after_window() {
        let fs = app();
        let options = WatchOptions {
            debounce_ms: 30,
            skip_unchanged: false,
            ..WatchOptions::default()
        };
        let (mut runtime, _tx) = setup(&fs, options);
        let path = PathBuf::from("/app/a.hot");

        assert_eq!(runtime.dispatch(vec![path.clone()]).len(), 1);
        fs.write_file(Path::new("/app/a.hot"), "accept\nprint late\n").unwrap();
        assert!(runtime.dispatch(vec![path]).is_empty());

        std::thread::sleep(Duration::from_millis(60));
        let reports = runtime.poll(Duration::from_millis(1)).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reloaded, vec![ModuleId::new("/app/a.hot")]);
        assert_eq!(runtime.session().loader().journal().output(), vec!["late"]);
        assert!(runtime.pending.is_empty());
    }

    #[test]
    fn test_fingerprint_dropped_when_module_leaves_the_session() {
        let fs = app();
        fs.add_file("/app/tool.hot", "print tool\n");
        let (mut runtime, _tx) = setup(&fs, no_debounce());
        let tool = runtime.session_mut().require("./tool.hot").unwrap();

        fs.write_file(Path::new("/app/tool.hot"), "print tool v2\n").unwrap();
        let reports = runtime.dispatch(vec![PathBuf::from("/app/tool.hot")]);

        // Nothing depends on the tool, so the entry restarts without it
        assert_eq!(reports.len(), 1);
        assert!(reports[0].fell_back_to_entry);
        assert!(!runtime.session().is_tracked(&tool));

        let fingerprints = runtime.fingerprints.as_ref().unwrap();
        assert_eq!(fingerprints.len(), 2);
        assert!(!runtime.last_seen.contains_key(&tool));
    }

    #[test]
    fn test_timeout_yields_no_reports() {
        let fs = app();
        let (mut runtime, _tx) = setup(&fs, no_debounce());
        assert!(runtime.poll(Duration::from_millis(1)).unwrap().is_empty());
    }

    #[test]
    fn test_run_stops_when_watcher_disconnects() {
        let fs = app();
        let (mut runtime, tx) = setup(&fs, no_debounce());
        drop(tx);
        assert!(runtime.run().is_ok());
    }
}
