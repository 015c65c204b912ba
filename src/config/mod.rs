//! Site configuration management for `site.toml`.
//!
//! # Sections
//!
//! | Section                | Purpose                                        |
//! |------------------------|------------------------------------------------|
//! | `[base]`               | Public site information (url)                  |
//! | `[build]`              | Source/output trees, manifest path             |
//! | `[build.preprocessor]` | External stylesheet compiler                   |
//! | `[serve]`              | Development server and live reload             |
//!
//! # Example
//!
//! ```toml
//! [base]
//! url = "https://www.example.com"
//!
//! [build]
//! src = "src"
//! dest = "dist"
//! css = "src/css"
//! manifest = "manifest.toml"
//!
//! [serve]
//! port = 8081
//! ```
//!
//! The loaded config is read-only for the rest of the process; `main` leaks
//! it to `&'static SiteConfig`.

mod base;
mod build;
pub mod defaults;
mod error;
mod serve;

pub use error::ConfigError;

use base::BaseConfig;
use build::BuildConfig;
use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use crate::log;
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing site.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Absolute project root (set after loading)
    #[serde(skip)]
    pub root: PathBuf,

    /// Public site information
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load, resolve and validate the configuration for a CLI invocation.
    ///
    /// A missing config file falls back to defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            log!("warn"; "{} not found, using defaults", config_path.display());
            Self::default()
        };

        config.update_with_cli(cli, root);
        config.validate()?;

        let serve = &config.serve;
        if cli.is_serve() && serve.livereload && serve.port == serve.reload_port {
            bail!(ConfigError::Validation(
                "[serve.reload_port] must differ from [serve.port]".into()
            ));
        }
        Ok(config)
    }

    /// Update configuration with CLI arguments and resolve every path against `root`.
    pub fn update_with_cli(&mut self, cli: &Cli, root: &Path) {
        if let Commands::Serve {
            interface,
            port,
            reload_port,
            livereload,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.reload_port, reload_port.as_ref());
            Self::update_option(&mut self.serve.livereload, livereload.as_ref());
        }

        self.update_path_with_root(root, &cli.config);
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Update all paths relative to root directory and normalize to absolute paths
    fn update_path_with_root(&mut self, root: &Path, config_name: &Path) {
        let root = Self::normalize_path(root);

        self.config_path = Self::normalize_path(&root.join(config_name));
        self.build.src = Self::resolve(&root, &self.build.src);
        self.build.dest = Self::resolve(&root, &self.build.dest);
        self.build.css = Self::resolve(&root, &self.build.css);
        self.build.manifest = Self::resolve(&root, &self.build.manifest);
        self.root = root;
    }

    /// Expand `~` and join relative paths onto `root`.
    fn resolve(root: &Path, path: &Path) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
        if expanded.is_relative() {
            Self::normalize_path(&root.join(expanded))
        } else {
            Self::normalize_path(&expanded)
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.base.url.starts_with("http") {
            bail!(ConfigError::Validation(
                "[base.url] must start with http:// or https://".into()
            ));
        }

        if !self.build.src.is_dir() {
            bail!(ConfigError::Validation(format!(
                "[build.src] `{}` is not a directory",
                self.build.src.display()
            )));
        }

        if self.build.src.starts_with(&self.build.dest) {
            bail!(ConfigError::Validation(
                "[build.dest] must not contain [build.src], it is emptied on every build".into()
            ));
        }

        if self.build.dest.starts_with(&self.build.src) {
            bail!(ConfigError::Validation(
                "[build.dest] must not be inside [build.src], output would be mirrored into itself".into()
            ));
        }

        if self.build.preprocessor.enable && self.build.preprocessor.command.is_empty() {
            bail!(ConfigError::Validation(
                "[build.preprocessor.command] must have at least one element".into()
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
