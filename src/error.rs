use std::path::PathBuf;

use thiserror::Error;

/// Failure to load the startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failure to extract the target value from the watched XML file.
///
/// `NotFound` is displayed differently from the rest: it names the configured
/// target node instead of describing a read failure.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Parse(#[from] XmlError),
    #[error("{0}")]
    Path(#[from] PathError),
    #[error("{target_node} not found in XML")]
    NotFound { target_node: String },
}

/// Malformed document. `position` is the byte offset reported by the reader.
#[derive(Debug, Error)]
#[error("{message} (at byte {position})")]
pub struct XmlError {
    pub message: String,
    pub position: usize,
}

/// Path expression that cannot be compiled.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path expression")]
    Empty,
    #[error("cannot use absolute path on element")]
    Absolute,
    #[error("invalid path step '{0}'")]
    InvalidStep(String),
    #[error("unsupported predicate '[{0}]'")]
    InvalidPredicate(String),
}
