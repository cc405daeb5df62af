use crate::coordinator::{ReindexReport, ReindexScope, ReindexStatus};
use crate::error::{IndexerError, Result};
use crate::filter::PathFilter;
use crate::project::ProjectIndex;
use crate::scanner::relativize;
use log::{info, warn};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const COMMAND_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    Idle,
    /// Changes recorded, waiting for the debounce deadline
    Pending,
    Reindexing,
    Stopped,
}

/// Snapshot of one project watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherStatus {
    pub project: PathBuf,
    pub provider: String,
    pub state: WatcherState,
    pub debounce_ms: u64,
    /// Paths waiting for the next pass, carry-over included
    pub pending_paths: usize,
    pub passes_completed: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_report: Option<ReindexReport>,
}

#[derive(Debug)]
enum WatcherCommand {
    /// Changed paths reported by the host instead of the OS
    Paths(Vec<PathBuf>),
    /// Run now with whatever is pending (the whole project if nothing is)
    Trigger,
    Stop,
}

/// Trailing-edge debounce over a set of changed paths
#[derive(Debug)]
struct DebounceState {
    debounce: Duration,
    pending: BTreeSet<String>,
    /// Paths from failed or partial passes; ride along with the next batch
    carry_over: BTreeSet<String>,
    /// The OS reported lost events; the next pass covers the whole project
    full_rescan: bool,
    deadline: Option<Instant>,
}

impl DebounceState {
    const fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: BTreeSet::new(),
            carry_over: BTreeSet::new(),
            full_rescan: false,
            deadline: None,
        }
    }

    /// Every qualifying event pushes the deadline out again
    fn record_event(&mut self, paths: impl IntoIterator<Item = String>) {
        let mut any = false;
        for path in paths {
            self.pending.insert(path);
            any = true;
        }
        if any {
            self.deadline = Some(Instant::now() + self.debounce);
        }
    }

    fn carry(&mut self, paths: impl IntoIterator<Item = String>) {
        self.carry_over.extend(paths);
    }

    fn request_rescan(&mut self) {
        self.full_rescan = true;
        self.deadline = Some(Instant::now() + self.debounce);
    }

    fn take_rescan(&mut self) -> bool {
        std::mem::take(&mut self.full_rescan)
    }

    fn force_run(&mut self) {
        self.deadline = Some(Instant::now());
    }

    fn take_batch(&mut self) -> BTreeSet<String> {
        self.deadline = None;
        let mut batch = std::mem::take(&mut self.pending);
        batch.append(&mut self.carry_over);
        batch
    }

    fn pending_len(&self) -> usize {
        self.pending.union(&self.carry_over).count()
    }

    const fn state(&self) -> WatcherState {
        if self.deadline.is_some() {
            WatcherState::Pending
        } else {
            WatcherState::Idle
        }
    }

    /// Cancel a deadline that has not fired yet
    fn cancel(&mut self) {
        self.deadline = None;
        self.full_rescan = false;
        self.pending.clear();
    }
}

/// Maps raw paths to project-relative paths worth reindexing
#[derive(Debug, Clone)]
struct EventFilter {
    root: PathBuf,
    store_root: PathBuf,
    filter: PathFilter,
}

impl EventFilter {
    fn qualify(&self, path: &Path) -> Option<String> {
        if path.starts_with(&self.store_root) {
            return None;
        }
        let relative = relativize(&self.root, path)?;
        if relative.is_empty() {
            return None;
        }
        let rel_path = Path::new(&relative);
        if self.filter.is_excluded(rel_path) {
            return None;
        }
        if self.filter.is_relevant(rel_path) {
            return Some(relative);
        }

        // Directories (created, removed or renamed) stand for everything under them
        let name_excluded = rel_path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.filter.is_excluded_dir(n));
        let absolute = self.root.join(&relative);
        let maybe_dir =
            absolute.is_dir() || (!absolute.exists() && rel_path.extension().is_none());
        (maybe_dir && !name_excluded).then_some(relative)
    }

    fn qualify_event(&self, event: &Event) -> Vec<String> {
        if matches!(event.kind, EventKind::Access(_)) {
            return Vec::new();
        }
        // Renames carry both the old and the new path
        event.paths.iter().filter_map(|p| self.qualify(p)).collect()
    }
}

/// Cloneable sender half of a running watcher.
///
/// Sending never needs the registry lock, so a full command queue only stalls
/// callers of the same project.
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    command_tx: mpsc::Sender<WatcherCommand>,
}

impl WatcherHandle {
    /// Report changed paths from an external change feed.
    ///
    /// They go through the same filter and debounce as OS events.
    pub async fn notify_paths(&self, paths: Vec<PathBuf>) -> Result<()> {
        self.send(WatcherCommand::Paths(paths)).await
    }

    /// Reindex now instead of waiting for the deadline
    pub async fn trigger(&self) -> Result<()> {
        self.send(WatcherCommand::Trigger).await
    }

    async fn send(&self, command: WatcherCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| IndexerError::Watcher("watcher is not running".to_string()))
    }
}

/// Debounced file watcher driving reindex passes for one project
pub struct ProjectWatcher {
    project: Arc<ProjectIndex>,
    command_tx: mpsc::Sender<WatcherCommand>,
    status_rx: watch::Receiver<WatcherStatus>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for ProjectWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectWatcher")
            .field("project", &self.project.root())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ProjectWatcher {
    /// Subscribe to OS notifications under the project root and start the
    /// background loop. Must be called inside a tokio runtime.
    pub fn start(project: Arc<ProjectIndex>, debounce: Duration) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let fs_watcher = create_fs_watcher(project.root(), event_tx)?;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        #[allow(clippy::cast_possible_truncation)]
        let status = WatcherStatus {
            project: project.root().to_path_buf(),
            provider: project.provider().to_string(),
            state: WatcherState::Idle,
            debounce_ms: debounce.as_millis() as u64,
            pending_paths: 0,
            passes_completed: 0,
            consecutive_failures: 0,
            last_error: None,
            last_report: None,
        };
        let (status_tx, status_rx) = watch::channel(status);

        let events = EventFilter {
            root: project.root().to_path_buf(),
            store_root: project.store().layout().root().to_path_buf(),
            filter: project.filter().clone(),
        };
        let task = WatcherTask {
            project: Arc::clone(&project),
            events,
            debounce: DebounceState::new(debounce),
            status_tx,
            _fs_watcher: fs_watcher,
        };
        let task = tokio::spawn(task.run(event_rx, command_rx));

        info!(
            "Watching {} (debounce {}ms, provider {})",
            project.root().display(),
            debounce.as_millis(),
            project.provider()
        );
        Ok(Self {
            project,
            command_tx,
            status_rx,
            task,
        })
    }

    #[must_use]
    pub const fn project(&self) -> &Arc<ProjectIndex> {
        &self.project
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    #[must_use]
    pub fn status(&self) -> WatcherStatus {
        let mut status = self.status_rx.borrow().clone();
        if !self.is_running() {
            status.state = WatcherState::Stopped;
        }
        status
    }

    /// Receiver that sees every status change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WatcherStatus> {
        self.status_rx.clone()
    }

    #[must_use]
    pub fn handle(&self) -> WatcherHandle {
        WatcherHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// See [`WatcherHandle::notify_paths`]
    pub async fn notify_paths(&self, paths: Vec<PathBuf>) -> Result<()> {
        self.handle().notify_paths(paths).await
    }

    pub async fn trigger(&self) -> Result<()> {
        self.handle().trigger().await
    }

    /// Cancel any pending deadline and wait for the loop to exit.
    ///
    /// A pass that is already running finishes first.
    pub async fn stop(self) -> WatcherStatus {
        let _ = self.command_tx.send(WatcherCommand::Stop).await;
        let status_rx = self.status_rx;
        if let Err(err) = self.task.await {
            warn!("Watcher task for {} ended abnormally: {err}", self.project.root().display());
        }
        let mut status = status_rx.borrow().clone();
        status.state = WatcherState::Stopped;
        status
    }
}

struct WatcherTask {
    project: Arc<ProjectIndex>,
    events: EventFilter,
    debounce: DebounceState,
    status_tx: watch::Sender<WatcherStatus>,
    _fs_watcher: RecommendedWatcher,
}

impl WatcherTask {
    async fn run(
        mut self,
        mut event_rx: mpsc::Receiver<notify::Result<Event>>,
        mut command_rx: mpsc::Receiver<WatcherCommand>,
    ) {
        loop {
            let next_deadline = self.debounce.deadline;
            tokio::select! {
                biased;
                command = command_rx.recv() => match command {
                    Some(WatcherCommand::Paths(paths)) => {
                        let qualified: Vec<String> =
                            paths.iter().filter_map(|p| self.events.qualify(p)).collect();
                        self.debounce.record_event(qualified);
                        self.publish();
                    }
                    Some(WatcherCommand::Trigger) => {
                        self.debounce.force_run();
                        self.publish();
                    }
                    Some(WatcherCommand::Stop) | None => break,
                },
                Some(event) = event_rx.recv() => self.handle_event(event),
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if next_deadline.is_some() => self.run_pass().await,
            }
        }

        self.debounce.cancel();
        self.status_tx.send_modify(|status| {
            status.state = WatcherState::Stopped;
            status.pending_paths = 0;
        });
        info!("Stopped watching {}", self.project.root().display());
    }

    fn handle_event(&mut self, event: notify::Result<Event>) {
        match event {
            Ok(event) => {
                if event.need_rescan() {
                    info!(
                        "Event queue overflowed for {}; scheduling a full pass",
                        self.project.root().display()
                    );
                    self.debounce.request_rescan();
                    self.publish();
                }
                let paths = self.events.qualify_event(&event);
                if !paths.is_empty() {
                    log::trace!("{:?}: {paths:?}", event.kind);
                    self.debounce.record_event(paths);
                    self.publish();
                }
            }
            Err(err) => {
                let paths: Vec<String> =
                    err.paths.iter().filter_map(|p| self.events.qualify(p)).collect();
                let err = IndexerError::from(err);
                warn!("Watcher error in {}: {err}", self.project.root().display());
                self.debounce.record_event(paths);
                self.status_tx.send_modify(|status| {
                    status.last_error = Some(err.to_string());
                });
                self.publish();
            }
        }
    }

    async fn run_pass(&mut self) {
        let rescan = self.debounce.take_rescan();
        let batch = self.debounce.take_batch();
        let scope = if rescan || batch.is_empty() {
            ReindexScope::All
        } else {
            ReindexScope::Paths(batch.iter().map(PathBuf::from).collect())
        };
        self.status_tx.send_modify(|status| {
            status.state = WatcherState::Reindexing;
            status.pending_paths = 0;
        });
        log::debug!(
            "Debounce window closed for {}: {} path(s)",
            self.project.root().display(),
            batch.len()
        );

        match self.project.reindex(scope, false).await {
            Ok(report) if report.status == ReindexStatus::Coalesced => {
                // Another caller's pass owns these paths now
                log::debug!("Watcher pass coalesced into a running reindex");
            }
            Ok(report) => {
                self.debounce.carry(report.retry_paths.iter().cloned());
                self.status_tx.send_modify(|status| {
                    status.passes_completed += 1;
                    if report.status == ReindexStatus::Completed {
                        status.consecutive_failures = 0;
                        status.last_error = None;
                    } else {
                        status.consecutive_failures += 1;
                        status.last_error = report.errors.first().cloned();
                    }
                    status.last_report = Some(report);
                });
            }
            Err(err) => {
                warn!(
                    "Reindex of {} failed: {err}; {} path(s) carried over",
                    self.project.root().display(),
                    batch.len()
                );
                self.debounce.carry(batch);
                if rescan {
                    self.debounce.full_rescan = true;
                }
                self.status_tx.send_modify(|status| {
                    status.consecutive_failures += 1;
                    status.last_error = Some(err.to_string());
                });
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let state = self.debounce.state();
        let pending = self.debounce.pending_len();
        self.status_tx.send_modify(|status| {
            status.state = state;
            status.pending_paths = pending;
        });
    }
}

fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| match sender.try_send(res) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(res)) => {
                log::debug!("Watcher event queue full, waiting for the loop");
                if sender.blocking_send(res).is_err() {
                    log::debug!("Watcher loop gone, dropping event");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("Watcher loop gone, dropping event");
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|e| IndexerError::Watcher(format!("watcher init failed: {e}")))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| IndexerError::Watcher(format!("failed to watch {}: {e}", root.display())))?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(batch: BTreeSet<String>) -> Vec<String> {
        batch.into_iter().collect()
    }

    #[tokio::test(start_paused = true)]
    async fn every_event_resets_the_deadline() {
        let mut state = DebounceState::new(Duration::from_secs(2));
        state.record_event(["a.py".to_string()]);
        let first = state.deadline.unwrap();

        time::advance(Duration::from_millis(500)).await;
        state.record_event(["a.py".to_string()]);
        let second = state.deadline.unwrap();

        assert_eq!(second - first, Duration::from_millis(500));
        assert_eq!(state.state(), WatcherState::Pending);
        assert_eq!(state.pending_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn force_run_sets_immediate_deadline() {
        let mut state = DebounceState::new(Duration::from_secs(2));
        state.record_event(["a.py".to_string()]);
        state.force_run();
        assert!(state.deadline.unwrap() <= Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn carry_over_waits_for_the_next_window() {
        let mut state = DebounceState::new(Duration::from_secs(1));
        state.carry(["failed.py".to_string()]);
        assert_eq!(state.deadline, None);
        assert_eq!(state.state(), WatcherState::Idle);
        assert_eq!(state.pending_len(), 1);

        state.record_event(["new.py".to_string(), "failed.py".to_string()]);
        assert_eq!(state.pending_len(), 2);
        assert_eq!(
            names(state.take_batch()),
            vec!["failed.py".to_string(), "new.py".to_string()]
        );
        assert_eq!(state.deadline, None);
        assert_eq!(state.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_but_keeps_carry_over() {
        let mut state = DebounceState::new(Duration::from_secs(1));
        state.record_event(["a.py".to_string()]);
        state.carry(["b.py".to_string()]);
        state.cancel();
        assert_eq!(state.deadline, None);
        assert_eq!(names(state.take_batch()), vec!["b.py".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn rescan_request_is_consumed_once_and_cleared_by_cancel() {
        let mut state = DebounceState::new(Duration::from_secs(1));
        state.request_rescan();
        assert_eq!(state.state(), WatcherState::Pending);
        assert!(state.take_rescan());
        assert!(!state.take_rescan());

        state.request_rescan();
        state.cancel();
        assert!(!state.take_rescan());
    }

    #[test]
    fn overflow_flag_is_visible_on_the_event() {
        let lost = Event::new(EventKind::Other).set_flag(notify::event::Flag::Rescan);
        assert!(lost.need_rescan());
        assert!(!Event::new(EventKind::Other).need_rescan());
    }

    #[test]
    fn status_serializes_state_in_snake_case() {
        let status = WatcherStatus {
            project: PathBuf::from("/work/app"),
            provider: "ollama".to_string(),
            state: WatcherState::Reindexing,
            debounce_ms: 2000,
            pending_paths: 0,
            passes_completed: 3,
            consecutive_failures: 0,
            last_error: None,
            last_report: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "reindexing");
        assert_eq!(json["passes_completed"], 3);
    }

    #[test]
    fn event_filter_keeps_sources_and_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("src/nested")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("logo.png"), b"png").unwrap();

        let events = EventFilter {
            root: root.clone(),
            store_root: root.join(".semindex-store"),
            filter: PathFilter::default(),
        };
        assert_eq!(events.qualify(&root.join("src/a.py")).as_deref(), Some("src/a.py"));
        assert_eq!(events.qualify(&root.join("src/nested")).as_deref(), Some("src/nested"));
        // removed directory
        assert_eq!(events.qualify(&root.join("old_pkg")).as_deref(), Some("old_pkg"));
        assert_eq!(events.qualify(&root.join("logo.png")), None);
        assert_eq!(events.qualify(&root.join("gone.swp")), None);
        assert_eq!(events.qualify(&root.join("node_modules")), None);
        assert_eq!(events.qualify(&root.join("node_modules/pkg/index.js")), None);
        assert_eq!(events.qualify(&root.join(".semindex-store/manifest.json")), None);
        assert_eq!(events.qualify(Path::new("/elsewhere/file.py")), None);
        assert_eq!(events.qualify(&root), None);
    }

    #[test]
    fn access_events_are_ignored() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let events = EventFilter {
            root: root.clone(),
            store_root: root.join(".store"),
            filter: PathFilter::default(),
        };
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(root.join("a.py"));
        assert!(events.qualify_event(&access).is_empty());

        let rename = Event::new(EventKind::Modify(notify::event::ModifyKind::Name(
            notify::event::RenameMode::Both,
        )))
        .add_path(root.join("old.py"))
        .add_path(root.join("new.py"));
        assert_eq!(
            events.qualify_event(&rename),
            vec!["old.py".to_string(), "new.py".to_string()]
        );
    }
}
