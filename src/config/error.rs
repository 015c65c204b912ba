//! Errors raised while loading `site.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read site config `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("site config is not valid TOML")]
    Toml(#[from] toml::de::Error),

    #[error("invalid site config: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_messages_name_the_file_and_problem() {
        let io = ConfigError::Io(PathBuf::from("site.toml"), Error::new(ErrorKind::NotFound, "gone"));
        assert_eq!(io.to_string(), "cannot read site config `site.toml`");

        let invalid = ConfigError::Validation("[serve.reload_port] equals [serve.port]".into());
        assert!(invalid.to_string().ends_with("[serve.reload_port] equals [serve.port]"));
    }
}
