//! Error types for page compilation and asset syncing.
//!
//! Both families are scoped: a [`PageError`] skips one page, a [`SyncError`]
//! fails one asset operation. Neither stops a build.

use std::path::PathBuf;
use thiserror::Error;

/// Failure compiling a single manifest page.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("page `{id}` is missing required field `{field}`")]
    MissingField { id: String, field: &'static str },

    #[error("page `{id}` has priority {priority}, expected a value in [0, 1]")]
    InvalidPriority { id: String, priority: f64 },

    #[error("failed to read template `{}`", .0.display())]
    TemplateRead(PathBuf, #[source] std::io::Error),

    #[error("failed to render template `{}`", .0.display())]
    Render(PathBuf, #[source] minijinja::Error),

    #[error("failed to write `{}`", .0.display())]
    Write(PathBuf, #[source] std::io::Error),
}

/// Failure applying a single asset sync action.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to copy `{}` to `{}`", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read `{}`", .0.display())]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to minify `{}`: {reason}", .path.display())]
    Minify { path: PathBuf, reason: String },

    #[error("failed to write `{}`", .0.display())]
    Write(PathBuf, #[source] std::io::Error),

    #[error("failed to remove `{}`", .0.display())]
    Remove(PathBuf, #[source] std::io::Error),
}
