//! Single-asset operations applied by the sync engine.
//!
//! Each function handles exactly one file and creates parent directories of
//! the destination as needed.

use crate::error::SyncError;
use crate::log;
use crate::utils::category::SyncAction;
use crate::utils::minify::minify_script;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Apply one classified action to the output tree.
///
/// `Recompile` and `Ignore` carry no file work and succeed immediately; the
/// caller decides when to recompile.
pub fn apply(action: &SyncAction) -> Result<(), SyncError> {
    match action {
        SyncAction::Copy { src, dest } => copy_asset(src, dest),
        SyncAction::Minify { src, dest } => minify_asset(src, dest),
        SyncAction::Delete { dest } => delete_asset(dest),
        SyncAction::Recompile | SyncAction::Ignore => Ok(()),
    }
}

/// Copy `src` to `dest` byte-for-byte.
pub fn copy_asset(src: &Path, dest: &Path) -> Result<(), SyncError> {
    ensure_parent(dest)?;
    fs::copy(src, dest).map_err(|source| SyncError::Copy {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source,
    })?;
    log!("created"; "{}", dest.display());
    Ok(())
}

/// Minify the script at `src` and write the result to `dest`.
pub fn minify_asset(src: &Path, dest: &Path) -> Result<(), SyncError> {
    let source = fs::read_to_string(src).map_err(|err| SyncError::Read(src.to_path_buf(), err))?;
    let minified = minify_script(&source).map_err(|reason| SyncError::Minify {
        path: src.to_path_buf(),
        reason,
    })?;

    ensure_parent(dest)?;
    fs::write(dest, minified).map_err(|err| SyncError::Write(dest.to_path_buf(), err))?;
    log!("created"; "{}", dest.display());
    Ok(())
}

/// Remove `dest`. A file that is already gone is not an error.
pub fn delete_asset(dest: &Path) -> Result<(), SyncError> {
    let result = if dest.is_dir() {
        fs::remove_dir_all(dest)
    } else {
        fs::remove_file(dest)
    };

    match result {
        Ok(()) => {
            log!("deleted"; "{}", dest.display());
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SyncError::Remove(dest.to_path_buf(), err)),
    }
}

fn ensure_parent(dest: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|err| SyncError::Write(parent.to_path_buf(), err))?;
    }
    Ok(())
}
