//! Serve-mode build runtime.
//!
//! Owns the manifest, the asset subscription and the build state, and is
//! driven by one dispatch thread.
//!
//! # States
//!
//! ```text
//!              manifest ok                 pages + sitemap written
//!   ┌──────┐ ─────────────▶ ┌──────────┐ ──────────────────────▶ ┌──────────┐
//!   │ Idle │                │ Building │                         │ Watching │
//!   └──────┘ ◀───────────── └──────────┘                         └──────────┘
//!      ▲      load failure                                            │
//!      └──────────────────── manifest deleted / reload failure ◀──────┘
//! ```
//!
//! Every reload drops the current [`AssetWatcher`] before anything else, and
//! bumps the generation so events still queued from it are discarded.

use crate::{
    build::{build_pages, empty_dir, sync_assets},
    config::SiteConfig,
    log,
    manifest::Manifest,
    utils::category::WatchEvent,
    watch::{self, AssetWatcher, Debouncer, Message},
};
use arc_swap::ArcSwapOption;
use std::sync::{
    Arc,
    mpsc::{Receiver, RecvTimeoutError, Sender},
};

/// Where the runtime is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// No usable manifest; nothing is watched.
    Idle,
    /// Pages are being compiled.
    Building,
    /// The output tree follows the source tree.
    Watching,
}

pub struct Runtime {
    config: &'static SiteConfig,
    debug: bool,
    tx: Sender<Message>,
    /// Last successfully loaded manifest; a failed load never replaces it.
    manifest: ArcSwapOption<Manifest>,
    watcher: Option<AssetWatcher>,
    state: BuildState,
    generation: u64,
    debouncer: Debouncer,
}

impl Runtime {
    pub fn new(config: &'static SiteConfig, debug: bool, tx: Sender<Message>) -> Self {
        Self {
            config,
            debug,
            tx,
            manifest: ArcSwapOption::empty(),
            watcher: None,
            state: BuildState::Idle,
            generation: 0,
            debouncer: Debouncer::new(),
        }
    }

    pub const fn state(&self) -> BuildState {
        self.state
    }

    #[cfg(test)]
    fn manifest(&self) -> Option<Arc<Manifest>> {
        self.manifest.load_full()
    }

    #[cfg(test)]
    const fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    const fn is_watching_sources(&self) -> bool {
        self.watcher.is_some()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Load the manifest and rebuild everything from scratch.
    pub fn reload(&mut self) {
        self.close_watcher();

        let manifest = match Manifest::load(&self.config.build.manifest) {
            Ok(manifest) => Arc::new(manifest),
            Err(e) => {
                log!("error"; "{:#}", anyhow::Error::from(e));
                self.state = BuildState::Idle;
                return;
            }
        };

        self.manifest.store(Some(Arc::clone(&manifest)));

        if let Err(e) = empty_dir(&self.config.build.dest) {
            log!("error"; "{:#}", e);
            self.state = BuildState::Idle;
            return;
        }

        self.state = BuildState::Building;
        build_pages(&manifest, self.config, self.debug);

        match AssetWatcher::start(self.config, self.generation, self.tx.clone()) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => {
                log!("error"; "{:#}", e);
                self.state = BuildState::Idle;
                return;
            }
        }

        sync_assets(&watch::initial_scan(self.config), self.config, self.debug);
        self.state = BuildState::Watching;
    }

    /// The manifest is gone: stop following the source tree until it returns.
    pub fn on_manifest_removed(&mut self) {
        log!("warn"; "{} removed, waiting for it to return", self.config.build.manifest.display());
        self.close_watcher();
        self.state = BuildState::Idle;
    }

    fn close_watcher(&mut self) {
        self.watcher = None;
        self.generation += 1;
        self.debouncer.clear();
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Queue one message. Events from a closed watcher generation are dropped.
    pub fn accept(&mut self, message: Message) {
        match message {
            Message::Manifest(Ok(event)) => {
                let config = self.config;
                let manifest = &config.build.manifest;
                self.debouncer.add(
                    watch::convert(&event)
                        .into_iter()
                        .filter(|e| e.path == *manifest),
                );
            }
            Message::Source {
                generation,
                event: Ok(event),
            } if generation == self.generation && self.watcher.is_some() => {
                self.debouncer.add(watch::convert(&event));
            }
            Message::Source { .. } => {}
            Message::Manifest(Err(e)) => log!("watch"; "error: {e}"),
        }
    }

    /// Handle one settled batch of events.
    pub fn flush(&mut self, events: &[WatchEvent]) {
        let config = self.config;
        let manifest = &config.build.manifest;

        // a manifest change rebuilds everything, so the rest of the batch is moot
        if events.iter().any(|e| e.path == *manifest) {
            if manifest.exists() {
                log!("changed"; "{}", manifest.display());
                self.reload();
            } else {
                self.on_manifest_removed();
            }
            return;
        }

        if self.state != BuildState::Watching {
            return;
        }

        if sync_assets(events, config, self.debug)
            && let Some(manifest) = self.manifest.load_full()
        {
            build_pages(&manifest, config, self.debug);
        }
    }

    /// Dispatch loop for the rest of the process.
    pub fn run(mut self, rx: &Receiver<Message>) {
        loop {
            match rx.recv_timeout(self.debouncer.timeout()) {
                Ok(message) => self.accept(message),
                Err(RecvTimeoutError::Timeout) if self.debouncer.ready() => {
                    let events = self.debouncer.take();
                    self.flush(&events);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    #[cfg(test)]
    fn pending_is_empty(&self) -> bool {
        self.debouncer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::category::WatchKind;
    use notify::{
        Event, EventKind,
        event::{CreateKind, DataChange, ModifyKind},
    };
    use std::{fs, sync::mpsc};
    use tempfile::TempDir;

    const MANIFEST: &str = "[globals]\nsiteName = \"Website\"\n\
        [pages.index]\noutput = \"index.html\"\ntemplate = \"templates/page.ejs\"\npriority = 1.0\ntitle = \"Home\"\n";

    fn site(dir: &TempDir) -> &'static SiteConfig {
        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        config.build.src = dir.path().join("src");
        config.build.dest = dir.path().join("dist");
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
        fs::write(&config.build.manifest, MANIFEST).unwrap();
        Box::leak(Box::new(config))
    }

    fn runtime(config: &'static SiteConfig) -> (Runtime, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel();
        (Runtime::new(config, false, tx), rx)
    }

    #[test]
    fn test_reload_builds_and_watches() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        fs::create_dir_all(&config.build.dest).unwrap();
        fs::write(config.build.dest.join("stale.txt"), "old").unwrap();

        let (mut rt, _rx) = runtime(config);
        rt.reload();

        assert_eq!(rt.state(), BuildState::Watching);
        assert!(rt.is_watching_sources());
        assert!(!config.build.dest.join("stale.txt").exists());
        assert!(config.build.dest.join("index.html").exists());
        assert!(config.build.dest.join("sitemap.xml").exists());
        assert!(config.build.dest.join("img/logo.svg").exists());
    }

    #[test]
    fn test_failed_load_goes_idle() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        let (mut rt, _rx) = runtime(config);

        rt.reload();
        assert_eq!(rt.state(), BuildState::Watching);

        fs::write(&config.build.manifest, "[pages.index").unwrap();
        rt.reload();
        assert_eq!(rt.state(), BuildState::Idle);
        assert!(!rt.is_watching_sources());
        // the previous manifest is kept
        assert_eq!(rt.manifest().unwrap().pages.len(), 1);
    }

    #[test]
    fn test_manifest_removed_goes_idle() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        let (mut rt, _rx) = runtime(config);
        rt.reload();

        fs::remove_file(&config.build.manifest).unwrap();
        rt.flush(&[WatchEvent::new(WatchKind::Unlink, &config.build.manifest)]);
        assert_eq!(rt.state(), BuildState::Idle);
        assert!(!rt.is_watching_sources());

        // source events are ignored while idle
        fs::write(config.build.src.join("img/new.png"), "png").unwrap();
        rt.flush(&[WatchEvent::new(WatchKind::Add, config.build.src.join("img/new.png"))]);
        assert!(!config.build.dest.join("img/new.png").exists());

        // and the manifest coming back restarts the build
        fs::write(&config.build.manifest, MANIFEST).unwrap();
        rt.flush(&[WatchEvent::new(WatchKind::Add, &config.build.manifest)]);
        assert_eq!(rt.state(), BuildState::Watching);
        assert!(config.build.dest.join("img/new.png").exists());
    }

    #[test]
    fn test_stale_generation_dropped() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        let (mut rt, _rx) = runtime(config);
        rt.reload();
        let old = rt.generation();
        rt.reload();
        assert!(rt.generation() > old);

        let path = config.build.src.join("img/logo.svg");
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path.clone());
        rt.accept(Message::Source {
            generation: old,
            event: Ok(event.clone()),
        });
        assert!(rt.pending_is_empty());

        rt.accept(Message::Source {
            generation: rt.generation(),
            event: Ok(event),
        });
        assert!(!rt.pending_is_empty());
    }

    #[test]
    fn test_manifest_events_filtered_by_path() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        let (mut rt, _rx) = runtime(config);

        let other = Event::new(EventKind::Create(CreateKind::File)).add_path(dir.path().join("notes.txt"));
        rt.accept(Message::Manifest(Ok(other)));
        assert!(rt.pending_is_empty());

        let ours = Event::new(EventKind::Create(CreateKind::File)).add_path(config.build.manifest.clone());
        rt.accept(Message::Manifest(Ok(ours)));
        assert!(!rt.pending_is_empty());
    }

    #[test]
    fn test_template_change_recompiles() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        let (mut rt, _rx) = runtime(config);
        rt.reload();

        let template = config.build.src.join("templates/page.ejs");
        fs::write(&template, "<html><body><h2>{{ title }} v2</h2></body></html>").unwrap();
        rt.flush(&[WatchEvent::new(WatchKind::Change, &template)]);

        let html = fs::read_to_string(config.build.dest.join("index.html")).unwrap();
        assert!(html.contains("Home v2"));
    }

    #[test]
    fn test_reload_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = site(&dir);
        let (mut rt, _rx) = runtime(config);

        rt.reload();
        let first = fs::read(config.build.dest.join("index.html")).unwrap();
        let sitemap = fs::read(config.build.dest.join("sitemap.xml")).unwrap();
        rt.reload();
        assert_eq!(fs::read(config.build.dest.join("index.html")).unwrap(), first);
        assert_eq!(fs::read(config.build.dest.join("sitemap.xml")).unwrap(), sitemap);
    }
}
