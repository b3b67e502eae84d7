//! Startup error taxonomy. Every variant is fatal: the bot logs it and exits.

use std::path::PathBuf;

/// Failure to load a fact file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to read fact file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed fact file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown extension {extension:?} (not .json or .txt)")]
    UnsupportedFormat { extension: String },
    #[error("no facts available")]
    Empty,
}

/// Failure to build the runtime configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bad config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("malformed server address {0:?} (expected host:port)")]
    ServerAddress(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to read facts from {}: {source}", path.display())]
    Load { path: PathBuf, source: LoadError },
    #[error("unable to connect: {0}")]
    Connect(anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
