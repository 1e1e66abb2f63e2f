use std::path::PathBuf;
use thiserror::Error;

/// Core error type for modmap operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read settings at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid regular expression /{pattern}/: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },
}
