use crate::error::Result;
use crate::project::ProjectIndex;
use crate::watcher::{ProjectWatcher, WatcherHandle, WatcherStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Running watchers, one per canonical project root.
///
/// Owned by the host; dropping it stops every watcher.
#[derive(Debug, Default)]
pub struct WatcherRegistry {
    watchers: Mutex<HashMap<PathBuf, ProjectWatcher>>,
}

impl WatcherRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching `project`.
    ///
    /// Idempotent: when a watcher is already running for the project its status
    /// is returned and nothing else changes.
    pub async fn start(
        &self,
        project: Arc<ProjectIndex>,
        debounce: Duration,
    ) -> Result<WatcherStatus> {
        let mut watchers = self.watchers.lock().await;
        if let Some(existing) = watchers.get(project.root()) {
            if existing.is_running() {
                log::debug!("Watcher for {} already running", project.root().display());
                return Ok(existing.status());
            }
        }
        let key = project.root().to_path_buf();
        let watcher = ProjectWatcher::start(project, debounce)?;
        let status = watcher.status();
        watchers.insert(key, watcher);
        Ok(status)
    }

    /// Stop the watcher for `root`; false when none was registered
    pub async fn stop(&self, root: &Path) -> bool {
        let watcher = self.watchers.lock().await.remove(root);
        match watcher {
            Some(watcher) => {
                watcher.stop().await;
                true
            }
            None => false,
        }
    }

    pub async fn status(&self, root: &Path) -> Option<WatcherStatus> {
        self.watchers.lock().await.get(root).map(ProjectWatcher::status)
    }

    pub async fn subscribe(&self, root: &Path) -> Option<watch::Receiver<WatcherStatus>> {
        self.watchers
            .lock()
            .await
            .get(root)
            .map(ProjectWatcher::subscribe)
    }

    /// Forward externally observed changes to the project's watcher
    pub async fn notify_paths(&self, root: &Path, paths: Vec<PathBuf>) -> Result<bool> {
        match self.handle(root).await {
            Some(handle) => {
                handle.notify_paths(paths).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn trigger(&self, root: &Path) -> Result<bool> {
        match self.handle(root).await {
            Some(handle) => {
                handle.trigger().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Sender for `root`, cloned so the map lock is released before sending
    pub async fn handle(&self, root: &Path) -> Option<WatcherHandle> {
        self.watchers.lock().await.get(root).map(ProjectWatcher::handle)
    }

    /// Status of every running watcher, ordered by project path
    pub async fn list_active(&self) -> Vec<WatcherStatus> {
        let watchers = self.watchers.lock().await;
        let mut active: Vec<WatcherStatus> = watchers
            .values()
            .filter(|w| w.is_running())
            .map(ProjectWatcher::status)
            .collect();
        active.sort_by(|a, b| a.project.cmp(&b.project));
        active
    }

    /// Stop everything; returns how many watchers were stopped
    pub async fn stop_all(&self) -> usize {
        let drained: Vec<ProjectWatcher> = {
            let mut watchers = self.watchers.lock().await;
            watchers.drain().map(|(_, watcher)| watcher).collect()
        };
        let count = drained.len();
        for watcher in drained {
            watcher.stop().await;
        }
        if count > 0 {
            log::info!("Stopped {count} watcher(s)");
        }
        count
    }
}
