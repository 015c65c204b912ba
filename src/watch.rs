//! File system subscriptions feeding the runtime's dispatch channel.
//!
//! Two watchers exist while serving:
//!
//! - [`ManifestWatcher`]: the manifest's parent directory, non-recursive,
//!   alive for the whole session
//! - [`AssetWatcher`]: the source tree, recursive, replaced on every manifest
//!   reload and tagged with a generation number
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Dispatch Thread                         │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│  Runtime::flush()      │  │
//! │  │ events   │    │ (300ms)  │    │                        │  │
//! │  └──────────┘    └──────────┘    │  manifest → reload     │  │
//! │   (tagged by                     │  sources  → classify   │  │
//! │    generation)                   │             + apply    │  │
//! │                                  └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::{
    config::SiteConfig,
    log,
    utils::category::{WatchEvent, WatchKind, is_hidden},
};
use anyhow::{Context, Result};
use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use rustc_hash::FxHashMap;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::Sender,
    time::{Duration, Instant},
};
use walkdir::WalkDir;

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;

/// Idle wait when nothing is pending.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Messages
// =============================================================================

/// Everything the dispatch thread receives.
#[derive(Debug)]
pub enum Message {
    /// Raw event from the manifest watcher.
    Manifest(notify::Result<Event>),
    /// Raw event from the asset watcher of `generation`.
    Source {
        generation: u64,
        event: notify::Result<Event>,
    },
}

// =============================================================================
// Event Conversion
// =============================================================================

/// Convert a raw notify event into add/change/unlink events.
///
/// Renames are reported per path: a path that still exists was added, a
/// path that is gone was unlinked. Directory events and access events are
/// dropped.
pub fn convert(event: &Event) -> Vec<WatchEvent> {
    let fixed = match event.kind {
        EventKind::Create(_) => Some(WatchKind::Add),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(WatchKind::Add),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(WatchKind::Unlink),
        EventKind::Modify(ModifyKind::Name(_)) => None,
        EventKind::Modify(_) => Some(WatchKind::Change),
        EventKind::Remove(_) => Some(WatchKind::Unlink),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter_map(|path| {
            let kind = fixed.unwrap_or(if path.exists() {
                WatchKind::Add
            } else {
                WatchKind::Unlink
            });
            (kind == WatchKind::Unlink || !path.is_dir()).then(|| WatchEvent::new(kind, path))
        })
        .collect()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events; the latest kind per path wins.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: FxHashMap<PathBuf, WatchKind>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, events: impl IntoIterator<Item = WatchEvent>) {
        let mut added = false;
        for event in events {
            self.pending.insert(event.path, event.kind);
            added = true;
        }
        if added {
            self.last_event = Some(Instant::now());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn ready(&self) -> bool {
        !self.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    /// Drain the batch, sorted by path for a stable processing order.
    pub fn take(&mut self) -> Vec<WatchEvent> {
        self.last_event = None;
        let mut events: Vec<_> = self
            .pending
            .drain()
            .map(|(path, kind)| WatchEvent::new(kind, path))
            .collect();
        events.sort_by(|a, b| a.path.cmp(&b.path));
        events
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_event = None;
    }

    pub fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            IDLE_TIMEOUT
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

// =============================================================================
// Initial Scan
// =============================================================================

/// An `Add` event for every non-hidden file under `[build.src]`.
pub fn initial_scan(config: &SiteConfig) -> Vec<WatchEvent> {
    let src = &config.build.src;
    let mut events: Vec<_> = WalkDir::new(src)
        .into_iter()
        .filter_entry(|e| e.path() == src || !is_hidden(e.path(), src))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| WatchEvent::new(WatchKind::Add, e.into_path()))
        .collect();
    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}

// =============================================================================
// Watchers
// =============================================================================

/// Recursive subscription to the source tree. Dropping it closes the watch.
pub struct AssetWatcher {
    _watcher: RecommendedWatcher,
}

impl AssetWatcher {
    pub fn start(config: &SiteConfig, generation: u64, tx: Sender<Message>) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            // the receiver is gone only during shutdown
            let _ = tx.send(Message::Source { generation, event });
        })
        .context("Failed to create file watcher")?;

        let src = &config.build.src;
        watcher
            .watch(src, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", src.display()))?;

        log!("watch"; "{}/", rel_path(src, &config.root));
        Ok(Self { _watcher: watcher })
    }
}

/// Subscription to the manifest file, via its parent directory so the file
/// can be deleted and recreated.
pub struct ManifestWatcher {
    _watcher: RecommendedWatcher,
}

impl ManifestWatcher {
    pub fn start(config: &SiteConfig, tx: Sender<Message>) -> Result<Self> {
        let manifest = &config.build.manifest;
        let parent = manifest.parent().unwrap_or(Path::new("."));

        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let _ = tx.send(Message::Manifest(event));
        })
        .context("Failed to create manifest watcher")?;
        watcher
            .watch(parent, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", parent.display()))?;

        log!("watch"; "{}", rel_path(manifest, &config.root));
        Ok(Self { _watcher: watcher })
    }
}

/// `/proj/src/css` → `src/css`
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
