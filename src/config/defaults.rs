//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

// ============================================================================
// [base] Section Defaults
// ============================================================================

pub mod base {
    pub fn url() -> String {
        "http://localhost".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn src() -> PathBuf {
        "src".into()
    }

    pub fn dest() -> PathBuf {
        "dist".into()
    }

    pub fn css() -> PathBuf {
        "src/css".into()
    }

    pub fn manifest() -> PathBuf {
        "manifest.toml".into()
    }

    pub mod preprocessor {
        pub fn command() -> Vec<String> {
            vec!["sass".into()]
        }

        /// `{css}` is replaced with the stylesheet working directory.
        pub fn args() -> Vec<String> {
            vec![
                "--style=compressed".into(),
                "--source-map".into(),
                "{css}:{css}".into(),
            ]
        }

        pub fn watch_args() -> Vec<String> {
            vec!["--watch".into()]
        }
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8081
    }

    pub fn reload_port() -> u16 {
        35729
    }
}
