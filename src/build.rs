//! Site building.
//!
//! # Architecture
//!
//! ```text
//! build_once()
//!     │
//!     ├── Manifest::load()
//!     ├── empty_dir(dest)
//!     ├── run_preprocessor()  ──► compiled stylesheets in [build.css]
//!     ├── build_pages()
//!     │       ├── compile_all() ──► HTML files (parallel)
//!     │       └── sitemap::write()
//!     └── sync_assets(initial_scan())
//! ```
//!
//! The serve runtime reuses the same pieces step by step.

use crate::{
    compiler::{apply, compile_all},
    config::SiteConfig,
    generator::sitemap,
    log,
    manifest::Manifest,
    utils::{
        category::{SyncAction, WatchEvent, WatchKind, classify},
        exec,
    },
    watch::initial_scan,
};
use anyhow::{Context, Result};
use std::{fs, path::Path};

/// One complete build for the `build` command.
pub fn build_once(config: &SiteConfig, debug: bool) -> Result<()> {
    let manifest = Manifest::load(&config.build.manifest)?;

    empty_dir(&config.build.dest)?;

    if config.build.preprocessor.enable
        && let Err(e) = exec::run_once(&exec::ProcessSpec::preprocessor(config, false))
    {
        log!("error"; "{:#}", e);
    }

    build_pages(&manifest, config, debug);
    sync_assets(&initial_scan(config), config, debug);

    log_build_result(&config.build.dest)
}

/// Compile every page and write the sitemap. Page and sitemap failures are
/// logged, never returned.
pub fn build_pages(manifest: &Manifest, config: &SiteConfig, debug: bool) {
    log!("compile"; "{} pages", manifest.pages.len());
    let entries = compile_all(manifest, config, debug);

    if let Err(e) = sitemap::write(&config.build.dest, &config.base.url, &entries) {
        log!("error"; "{:#}", e);
    }
}

/// Apply a batch of source events to the output tree.
///
/// Returns true when the batch contains a template change, in which case the
/// caller recompiles every page once.
pub fn sync_assets(events: &[WatchEvent], config: &SiteConfig, debug: bool) -> bool {
    let mut recompile = false;

    for event in events {
        match classify(event, config, debug) {
            SyncAction::Ignore => {}
            SyncAction::Recompile => {
                log!("changed"; "{}", event.path.display());
                recompile = true;
            }
            action => {
                if event.kind == WatchKind::Change {
                    log!("changed"; "{}", event.path.display());
                }
                if let Err(e) = apply(&action) {
                    log!("error"; "{:#}", anyhow::Error::from(e));
                }
            }
        }
    }

    recompile
}

/// Remove everything inside `dir`, keeping (or creating) the directory itself.
pub fn empty_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let result = if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.with_context(|| format!("Failed to remove {}", path.display()))?;
    }

    log!("emptied"; "{}", dir.display());
    Ok(())
}

/// Log build result based on output directory contents
fn log_build_result(output: &Path) -> Result<()> {
    let file_count = fs::read_dir(output)?.filter_map(Result::ok).count();

    if file_count == 0 {
        log!("warn"; "output is empty, check the manifest pages");
    } else {
        log!("build"; "done");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site(dir: &TempDir) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        config.base.url = "http://example.com".into();
        config.build.src = dir.path().join("src");
        config.build.dest = dir.path().join("dist");
        config.build.css = dir.path().join("src/css");
        config.build.manifest = dir.path().join("manifest.toml");
        config.build.preprocessor.enable = false;

        fs::create_dir_all(config.build.src.join("templates")).unwrap();
        fs::create_dir_all(config.build.src.join("img")).unwrap();
        fs::write(
            config.build.src.join("templates/page.ejs"),
            "<html><body><h1>{{ title }}</h1></body></html>",
        )
        .unwrap();
        fs::write(config.build.src.join("img/logo.svg"), "<svg></svg>").unwrap();
        fs::write(
            &config.build.manifest,
            "[pages.index]\noutput = \"index.html\"\ntemplate = \"templates/page.ejs\"\npriority = 1.0\ntitle = \"Home\"\n\
             [pages.error]\noutput = \"error.html\"\ntemplate = \"templates/page.ejs\"\npriority = 0\ntitle = \"Error\"\n",
        )
        .unwrap();
        config
    }

    #[test]
    fn test_empty_dir_keeps_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("dist");
        fs::create_dir_all(out.join("nested")).unwrap();
        fs::write(out.join("stale.html"), "").unwrap();
        fs::write(out.join("nested/a.css"), "").unwrap();

        empty_dir(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_dir_creates_missing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a/b");
        empty_dir(&out).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn test_build_once_full_site() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        fs::create_dir_all(&config.build.dest).unwrap();
        fs::write(config.build.dest.join("stale.html"), "old").unwrap();

        build_once(&config, false).unwrap();

        let dest = &config.build.dest;
        assert!(!dest.join("stale.html").exists());
        assert!(dest.join("index.html").exists());
        assert!(dest.join("error.html").exists());
        assert!(dest.join("img/logo.svg").exists());
        // templates are never mirrored
        assert!(!dest.join("templates/page.ejs").exists());

        let xml = fs::read_to_string(dest.join("sitemap.xml")).unwrap();
        assert!(xml.contains("<loc>http://example.com/index.html</loc><priority>1</priority>"));
        assert!(xml.contains("<loc>http://example.com/error.html</loc><priority>0</priority>"));
    }

    #[test]
    fn test_build_once_missing_manifest_fails() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        fs::remove_file(&config.build.manifest).unwrap();
        assert!(build_once(&config, false).is_err());
    }

    #[test]
    fn test_sync_assets_reports_recompile() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        let template = config.build.src.join("templates/page.ejs");
        let logo = config.build.src.join("img/logo.svg");

        let recompile = sync_assets(
            &[
                WatchEvent::new(WatchKind::Change, &template),
                WatchEvent::new(WatchKind::Add, &logo),
            ],
            &config,
            false,
        );
        assert!(recompile);
        assert!(config.build.dest.join("img/logo.svg").exists());

        assert!(!sync_assets(&[WatchEvent::new(WatchKind::Unlink, &logo)], &config, false));
        assert!(!config.build.dest.join("img/logo.svg").exists());
    }
}
