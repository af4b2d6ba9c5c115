//! Upload directory watcher.
//!
//! `notify` delivers events on its own thread; they are forwarded into an
//! unbounded tokio channel and consumed by [`DirectoryWatcher::run`], which
//! processes files one at a time in arrival order until the shutdown token
//! fires.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WatcherConfig;
use crate::error::AppError;
use crate::parser;
use crate::pipeline::{Pipeline, ProcessOutcome};

/// Per-run counters, returned when the watcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub analyzed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

pub struct DirectoryWatcher {
    pipeline: Pipeline,
    uploads_dir: PathBuf,
    settle: Duration,
    scan_existing: bool,
}

impl DirectoryWatcher {
    pub fn new(pipeline: Pipeline, config: &WatcherConfig) -> Self {
        Self {
            pipeline,
            uploads_dir: config.uploads_dir.clone(),
            settle: Duration::from_millis(config.settle_ms),
            scan_existing: config.scan_existing,
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Watch until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<WatchStats, AppError> {
        fs::create_dir_all(&self.uploads_dir).map_err(|e| {
            AppError::Watch(format!("cannot create {}: {e}", self.uploads_dir.display()))
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| AppError::Watch(format!("failed to create file watcher: {e}")))?;
        watcher
            .watch(&self.uploads_dir, RecursiveMode::NonRecursive)
            .map_err(|e| AppError::Watch(format!("failed to watch {}: {e}", self.uploads_dir.display())))?;

        info!(dir = %self.uploads_dir.display(), "watching for new contracts");

        let mut queue: VecDeque<PathBuf> = VecDeque::new();
        if self.scan_existing {
            for path in existing_candidates(&self.uploads_dir)? {
                enqueue(&mut queue, path);
            }
            info!(queued = queue.len(), "queued existing uploads");
        }

        let mut stats = WatchStats::default();
        loop {
            if let Some(path) = queue.pop_front() {
                // Drain whatever arrived meanwhile so arrival order is kept.
                while let Ok(res) = rx.try_recv() {
                    on_event(res, &mut queue);
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = self.handle(&path, &mut stats) => {}
                }
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                res = rx.recv() => match res {
                    Some(res) => on_event(res, &mut queue),
                    None => return Err(AppError::Watch("file watcher stopped unexpectedly".into())),
                },
            }
        }

        info!(
            analyzed = stats.analyzed,
            unchanged = stats.unchanged,
            failed = stats.failed,
            "watcher stopped"
        );
        Ok(stats)
    }

    async fn handle(&self, path: &Path, stats: &mut WatchStats) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        if !path.is_file() {
            debug!(path = %path.display(), "not a regular file, skipped");
            return;
        }

        info!(path = %path.display(), "new contract detected");
        match self.pipeline.process_file(path).await {
            Ok(ProcessOutcome::Analyzed { output, chunks }) => {
                stats.analyzed += 1;
                info!(path = %path.display(), output = %output.display(), chunks, "contract analysed");
            }
            Ok(ProcessOutcome::Unchanged { .. }) => {
                stats.unchanged += 1;
            }
            Err(AppError::Agent(e)) => {
                stats.failed += 1;
                error!(
                    path = %path.display(),
                    stage = e.stage(),
                    clause = e.clause().unwrap_or("-"),
                    "failed to process: {e}"
                );
            }
            Err(e) => {
                stats.failed += 1;
                error!(path = %path.display(), "failed to process: {e}");
            }
        }
    }
}

fn on_event(res: notify::Result<Event>, queue: &mut VecDeque<PathBuf>) {
    match res {
        Ok(event) => {
            for path in candidate_paths(&event) {
                enqueue(queue, path);
            }
        }
        Err(e) => warn!("watch error: {e}"),
    }
}

fn enqueue(queue: &mut VecDeque<PathBuf>, path: PathBuf) {
    if !queue.contains(&path) {
        queue.push_back(path);
    }
}

/// Paths in `event` that should be processed: creations and renames into
/// the directory, filtered to visible files with a supported extension.
pub fn candidate_paths(event: &Event) -> Vec<PathBuf> {
    let paths: Vec<&PathBuf> = match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.iter().collect(),
        // `Both` carries [from, to].
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.last().into_iter().collect(),
        // Direction unknown; existence is checked before processing.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event.paths.iter().collect(),
        _ => Vec::new(),
    };
    paths.into_iter().filter(|p| is_candidate(p)).cloned().collect()
}

fn is_candidate(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(true);
    !hidden && parser::is_supported(path)
}

/// Supported files already in `dir`, sorted by name.
fn existing_candidates(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::Watch(format!("cannot list {}: {e}", dir.display())))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_candidate(p))
        .collect();
    paths.sort();
    Ok(paths)
}
