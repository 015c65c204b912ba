//! `[build]` section configuration.
//!
//! Contains the source/output tree locations, the manifest path, and the
//! stylesheet preprocessor settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `[build]` section in site.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// src = "src"                # Source tree (templates, assets)
/// dest = "dist"              # Output tree, emptied on every full build
/// css = "src/css"            # Stylesheet working directory
/// manifest = "manifest.toml" # Page/global declarations
///
/// [build.preprocessor]
/// command = ["sass"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Source directory mirrored into `dest`.
    #[serde(default = "defaults::build::src")]
    #[educe(Default = defaults::build::src())]
    pub src: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::dest")]
    #[educe(Default = defaults::build::dest())]
    pub dest: PathBuf,

    /// Stylesheet working directory handed to the preprocessor.
    #[serde(default = "defaults::build::css")]
    #[educe(Default = defaults::build::css())]
    pub css: PathBuf,

    /// Manifest file declaring globals and pages.
    #[serde(default = "defaults::build::manifest")]
    #[educe(Default = defaults::build::manifest())]
    pub manifest: PathBuf,

    /// Stylesheet preprocessor integration.
    #[serde(default)]
    pub preprocessor: PreprocessorConfig,
}

impl BuildConfig {
    /// Destination path mirroring `path` under `src`.
    ///
    /// `src/img/a.png` → `dest/img/a.png`. Returns `None` for paths outside `src`.
    pub fn mirror(&self, path: &Path) -> Option<PathBuf> {
        let rel = path.strip_prefix(&self.src).ok()?;
        if rel.as_os_str().is_empty() {
            return None;
        }
        Some(self.dest.join(rel))
    }
}

/// `[build.preprocessor]` section - external stylesheet compiler.
///
/// Runs once as a compressed one-shot build, then again in watch mode
/// (`args` followed by `watch_args`). `{css}` in arguments expands to the
/// stylesheet working directory.
///
/// # Example
/// ```toml
/// [build.preprocessor]
/// enable = true
/// command = ["sass"]
/// args = ["--style=compressed", "--source-map", "{css}:{css}"]
/// watch_args = ["--watch"]
/// restart = true
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessorConfig {
    /// Launch the preprocessor at all.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    /// Command and leading arguments (e.g., `["npx", "sass"]`).
    #[serde(default = "defaults::build::preprocessor::command")]
    #[educe(Default = defaults::build::preprocessor::command())]
    pub command: Vec<String>,

    /// Arguments for the one-shot build.
    #[serde(default = "defaults::build::preprocessor::args")]
    #[educe(Default = defaults::build::preprocessor::args())]
    pub args: Vec<String>,

    /// Extra arguments appended for watch mode.
    #[serde(default = "defaults::build::preprocessor::watch_args")]
    #[educe(Default = defaults::build::preprocessor::watch_args())]
    pub watch_args: Vec<String>,

    /// Restart the watch process when it exits.
    #[serde(default)]
    pub restart: bool,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use super::*;

    #[test]
    fn test_build_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.src, PathBuf::from("src"));
        assert_eq!(config.build.dest, PathBuf::from("dist"));
        assert_eq!(config.build.css, PathBuf::from("src/css"));
        assert_eq!(config.build.manifest, PathBuf::from("manifest.toml"));
        assert!(config.build.preprocessor.enable);
        assert_eq!(config.build.preprocessor.command, vec!["sass"]);
        assert!(!config.build.preprocessor.restart);
    }

    #[test]
    fn test_build_config_custom() {
        let config = r#"
            [build]
            src = "site/"
            dest = "public"
            manifest = "pages.toml"

            [build.preprocessor]
            enable = false
            command = ["npx", "sass"]
            restart = true
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.build.src, PathBuf::from("site/"));
        assert_eq!(config.build.dest, PathBuf::from("public"));
        assert_eq!(config.build.manifest, PathBuf::from("pages.toml"));
        assert!(!config.build.preprocessor.enable);
        assert_eq!(config.build.preprocessor.command, vec!["npx", "sass"]);
        assert!(config.build.preprocessor.restart);
        // untouched fields keep defaults
        assert_eq!(config.build.preprocessor.watch_args, vec!["--watch"]);
    }

    #[test]
    fn test_build_unknown_field_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[build]\noutput = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_mirror_path() {
        let build = BuildConfig {
            src: PathBuf::from("/proj/src"),
            dest: PathBuf::from("/proj/dist"),
            ..Default::default()
        };

        assert_eq!(
            build.mirror(Path::new("/proj/src/img/logo.svg")),
            Some(PathBuf::from("/proj/dist/img/logo.svg"))
        );
        assert_eq!(build.mirror(Path::new("/elsewhere/a.css")), None);
        assert_eq!(build.mirror(Path::new("/proj/src")), None);
    }
}
