//! File watcher that re-runs tasks when their inputs change.
//!
//! Each [`WatchBinding`] pairs a project-relative glob with a task. The
//! watcher subscribes to the literal directory prefix of every pattern and,
//! for each create/modify/remove event whose path matches, asks the binding's
//! worker to re-run its task.
//!
//! Workers hold a single pending slot: re-runs of one binding never overlap,
//! and any number of events that arrive while a run is in progress collapse
//! into one follow-up run.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::core::{Task, TaskFuture};
use crate::error::Result;
use crate::{tlog, tlog_debug, tlog_error, tlog_trace, tlog_warn};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A glob pattern and the task to re-run when a matching file changes.
#[derive(Clone, Debug)]
pub struct WatchBinding {
    pattern: Pattern,
    task: Arc<dyn Task>,
}

impl WatchBinding {
    pub fn new(pattern: &str, task: Arc<dyn Task>) -> Result<Self> {
        Ok(Self {
            pattern: Pattern::new(pattern)?,
            task,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    /// Whether a project-relative path matches this binding.
    pub fn matches(&self, relative: &Path) -> bool {
        self.pattern.matches_path_with(relative, MATCH_OPTIONS)
    }

    /// The directory to subscribe to: the pattern's components before the
    /// first one containing a glob metacharacter.
    pub fn base_dir(&self) -> PathBuf {
        Path::new(self.pattern.as_str())
            .components()
            .take_while(|c| match c {
                Component::Normal(part) => !part
                    .to_string_lossy()
                    .contains(['*', '?', '[', ']', '{', '}']),
                _ => true,
            })
            .collect()
    }
}

/// Whether a notify event kind should trigger a re-run.
fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Watches the project and re-runs bound tasks until cancelled.
pub struct Watcher {
    root: PathBuf,
    bindings: Vec<WatchBinding>,
    cancel: CancellationToken,
}

impl Watcher {
    pub const NAME: &'static str = "watch";

    pub fn new(root: PathBuf, bindings: Vec<WatchBinding>, cancel: CancellationToken) -> Self {
        Self {
            root,
            bindings,
            cancel,
        }
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    /// Indices of the bindings matching an absolute event path.
    pub fn matching_bindings(&self, path: &Path) -> Vec<usize> {
        let relative = match path.strip_prefix(&self.root) {
            Ok(relative) => relative,
            Err(_) => return Vec::new(),
        };
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, binding)| binding.matches(relative))
            .map(|(i, _)| i)
            .collect()
    }

    /// Install the watches and dispatch events until the token is cancelled.
    pub async fn watch(&self) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(e) => tlog_error!("Watch error: {}", e),
            },
            Config::default(),
        )?;

        let mut watched: Vec<PathBuf> = Vec::new();
        for binding in &self.bindings {
            let dir = self.root.join(binding.base_dir());
            if watched.contains(&dir) {
                continue;
            }
            if !dir.exists() {
                tlog_warn!(
                    "Not watching {}: {} does not exist",
                    binding.pattern(),
                    dir.display()
                );
                continue;
            }
            watcher.watch(&dir, RecursiveMode::Recursive)?;
            tlog_debug!("Watching {} for {}", dir.display(), binding.pattern());
            watched.push(dir);
        }

        let triggers: Vec<mpsc::Sender<()>> = self
            .bindings
            .iter()
            .map(|binding| spawn_worker(binding.task.clone(), self.cancel.clone()))
            .collect();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    tlog_trace!("Watch event: {:?}", event);
                    if !is_change(&event.kind) {
                        continue;
                    }
                    let mut hit: Vec<usize> = event
                        .paths
                        .iter()
                        .flat_map(|path| self.matching_bindings(path))
                        .collect();
                    hit.sort_unstable();
                    hit.dedup();
                    for index in hit {
                        trigger(&triggers[index], &self.bindings[index]);
                    }
                }
            }
        }

        drop(watcher);
        tlog_debug!("Watcher stopped");
        Ok(())
    }
}

fn trigger(tx: &mpsc::Sender<()>, binding: &WatchBinding) {
    match tx.try_send(()) {
        Ok(()) => tlog_debug!("Change matched {}", binding.pattern()),
        Err(TrySendError::Full(())) => tlog_trace!(
            "Re-run of '{}' already pending",
            binding.task.name()
        ),
        Err(TrySendError::Closed(())) => {}
    }
}

/// Serialize re-runs of one task. The channel's single slot is the pending
/// request; it is freed as soon as a run starts.
fn spawn_worker(task: Arc<dyn Task>, cancel: CancellationToken) -> mpsc::Sender<()> {
    let (tx, mut rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                request = rx.recv() => {
                    if request.is_none() {
                        break;
                    }
                    tlog!("Change detected, running '{}'", task.name());
                    if let Err(e) = task.run().await {
                        tlog_error!("'{}' failed: {}", task.name(), e);
                    }
                }
            }
        }
    });
    tx
}

impl Task for Watcher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin(self.watch())
    }
}
