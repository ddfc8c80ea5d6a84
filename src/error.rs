//! Error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to load the rules file at startup.
///
/// Any of these is fatal: the process must not begin serving with a
/// partial or unparseable rule set.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The rules file could not be read.
    #[error("failed to read rules file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The rules file did not parse as JSON.
    #[error("failed to parse {} as JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The rules file did not parse as YAML.
    #[error("failed to parse {} as YAML: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The rules file parsed but failed validation.
    #[error("invalid rules file {}: {reason}", path.display())]
    Validation { path: PathBuf, reason: String },
}

/// Failure to serve the payload behind a winning response identifier.
///
/// Both variants are per-request: they are reported to the caller and
/// leave every cache untouched for other requests.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// No readable payload exists for the identifier.
    #[error("no payload for response {id:?}: {source}")]
    NotFound {
        id: String,
        #[source]
        source: io::Error,
    },

    /// The payload bytes are not valid JSON.
    ///
    /// The raw bytes stay cached; only the decode step fails, and it
    /// will fail the same way until the file behind the identifier is
    /// fixed and the process restarted.
    #[error("payload for response {id:?} is not valid JSON: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}
