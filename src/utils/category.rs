//! File classification for the asset sync engine.
//!
//! Decides, for one filesystem event under the source tree, which class of
//! work keeps the output tree consistent with the source tree.
//!
//! # File Categories
//!
//! | Category   | add / change                         | unlink              |
//! |------------|--------------------------------------|---------------------|
//! | Static     | copy to mirrored path                | delete mirrored     |
//! | SourceMap  | like Static, debug mode only         | like Static, debug only |
//! | Template   | add: nothing, change: recompile all  | recompile all       |
//! | Script     | debug: copy, otherwise minify        | delete mirrored     |
//! | Unknown    | ignored                              | ignored             |
//!
//! Templates are only ever compiled as a whole; every other file is synced
//! individually so a single change never recopies the whole tree.

use crate::config::SiteConfig;
use std::path::{Component, Path, PathBuf};

/// Extensions copied verbatim.
const STATIC_EXTENSIONS: &[&str] = &[
    "css", "xml", "txt", "jpg", "jpeg", "png", "svg", "pdf", "ico",
];

/// Extensions treated as page templates.
const TEMPLATE_EXTENSIONS: &[&str] = &["ejs", "jinja", "j2"];

/// Kind of a filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    Add,
    Change,
    Unlink,
}

/// A single change under the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: WatchKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Category of a source file, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// Stylesheets, images, documents, xml/txt - copied individually
    Static,
    /// Stylesheet source maps (`.map`) - synced in debug mode only
    SourceMap,
    /// Page templates - any edit recompiles every page
    Template,
    /// Scripts (`.js`) - copied in debug mode, minified otherwise
    Script,
    /// Anything else
    Unknown,
}

impl FileCategory {
    /// Categorize a path by its (case-insensitive) extension.
    pub fn of(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Self::Unknown;
        };
        let ext = ext.to_ascii_lowercase();
        let ext = ext.as_str();

        if ext == "map" {
            Self::SourceMap
        } else if ext == "js" {
            Self::Script
        } else if STATIC_EXTENSIONS.contains(&ext) {
            Self::Static
        } else if TEMPLATE_EXTENSIONS.contains(&ext) {
            Self::Template
        } else {
            Self::Unknown
        }
    }
}

/// Work required to apply one event to the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Copy `src` to `dest` byte-for-byte.
    Copy { src: PathBuf, dest: PathBuf },
    /// Minify the script at `src` into `dest`.
    Minify { src: PathBuf, dest: PathBuf },
    /// Remove `dest`.
    Delete { dest: PathBuf },
    /// Re-render every manifest page.
    Recompile,
    /// Nothing to do.
    Ignore,
}

/// Classify an event under `[build.src]`.
///
/// Paths outside the source tree and dotfiles (any hidden path component)
/// are ignored.
pub fn classify(event: &WatchEvent, config: &SiteConfig, debug: bool) -> SyncAction {
    let Some(dest) = config.build.mirror(&event.path) else {
        return SyncAction::Ignore;
    };
    if is_hidden(&event.path, &config.build.src) {
        return SyncAction::Ignore;
    }

    let src = event.path.clone();
    let sync = |src: PathBuf, dest: PathBuf| match event.kind {
        WatchKind::Unlink => SyncAction::Delete { dest },
        WatchKind::Add | WatchKind::Change => SyncAction::Copy { src, dest },
    };

    match FileCategory::of(&event.path) {
        FileCategory::Static => sync(src, dest),
        FileCategory::SourceMap if debug => sync(src, dest),
        FileCategory::SourceMap => SyncAction::Ignore,
        FileCategory::Template => match event.kind {
            // the initial scan reports every template as added
            WatchKind::Add => SyncAction::Ignore,
            WatchKind::Change | WatchKind::Unlink => SyncAction::Recompile,
        },
        FileCategory::Script => match event.kind {
            WatchKind::Unlink => SyncAction::Delete { dest },
            _ if debug => SyncAction::Copy { src, dest },
            _ => SyncAction::Minify { src, dest },
        },
        FileCategory::Unknown => SyncAction::Ignore,
    }
}

/// Whether any component of `path` below `root` starts with a dot.
pub fn is_hidden(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name.to_string_lossy().starts_with('.')))
}
