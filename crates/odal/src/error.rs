//! Result and Error types for the crate.
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result containing an error variant from this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration error variants
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// The configuration file could not be read.
    #[error("failed to read config file `{path}`")]
    #[diagnostic(help("make sure the file exists and is readable"))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be written.
    #[error("failed to write config file `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML, or it doesn't match the configuration type.
    #[error("failed to parse config file `{path}`")]
    #[diagnostic(help("check the file for missing or misspelled fields"))]
    Deserialize {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configuration could not be converted back into TOML.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}
