//! pagewright - a manifest-driven static site builder with a live dev server.

mod build;
mod cli;
mod compiler;
mod config;
mod error;
mod generator;
mod logger;
mod manifest;
mod reload;
mod runtime;
mod serve;
mod utils;
mod watch;

use anyhow::Result;
use build::build_once;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use reload::ReloadNotifier;
use runtime::{BuildState, Runtime};
use serve::serve_site;
use std::{fs, net::IpAddr, sync::mpsc, thread};
use utils::exec::{self, ProcessSpec, Supervisor};
use watch::ManifestWatcher;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static SiteConfig = Box::leak(Box::new(SiteConfig::load(cli)?));

    if cli.debug {
        log!("debug"; "debug mode enabled, scripts and source maps are copied as-is");
    }

    match &cli.command {
        Commands::Build => build_once(config, cli.debug),
        Commands::Serve { .. } => serve_all(config, cli.debug),
    }
}

/// Build, then keep the output in sync with the sources while serving it.
fn serve_all(config: &'static SiteConfig, debug: bool) -> Result<()> {
    let preprocessor = start_preprocessor(config);

    let (tx, rx) = mpsc::channel();
    let _manifest_watcher = ManifestWatcher::start(config, tx.clone())?;

    let mut runtime = Runtime::new(config, debug, tx);
    runtime.reload();
    if runtime.state() == BuildState::Idle {
        log!("warn"; "no build yet, fix the manifest to start one");
    }
    thread::spawn(move || runtime.run(&rx));

    // kept alive for the whole session
    let _reload = if config.serve.livereload {
        fs::create_dir_all(&config.build.dest)?;
        let interface: IpAddr = config.serve.interface.parse()?;
        let notifier = ReloadNotifier::bind(interface, config.serve.reload_port)?;
        let watcher = notifier.watch(&config.build.dest)?;
        Some((notifier, watcher))
    } else {
        None
    };

    let result = serve_site(config);
    if let Some(supervisor) = preprocessor {
        supervisor.stop();
    }
    result
}

/// Run the preprocessor once, then supervise it in watch mode.
fn start_preprocessor(config: &SiteConfig) -> Option<Supervisor> {
    if !config.build.preprocessor.enable {
        return None;
    }

    if let Err(e) = exec::run_once(&ProcessSpec::preprocessor(config, false)) {
        log!("error"; "{:#}", e);
    }
    Some(Supervisor::spawn(ProcessSpec::preprocessor(config, true)))
}
