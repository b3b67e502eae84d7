//! Runtime configuration.
//!
//! Read once at startup from a TOML file (default `config.toml`):
//!
//! ```toml
//! [irc]
//! server = "irc.libera.chat:6697"
//! ssl = true
//! nick = "carrotfacts"
//! channel = "#carrotfacts-test"
//!
//! [facts]
//! carrots = "carrots.json"
//! turnips = "turnips.txt"
//! ```
//!
//! Every key is optional. A missing file means all defaults.

use std::path::{Path, PathBuf};

use carrotfacts_sdk::client::{self, ConnectConfig};
use clap::Parser;
use serde::Deserialize;

use crate::error::ConfigError;

/// Default IRC server.
pub const DEFAULT_SERVER: &str = "irc.libera.chat:6697";
/// Default channel to join.
pub const DEFAULT_CHANNEL: &str = "#carrotfacts-test";
pub const DEFAULT_NICK: &str = "carrotfacts";

/// Log filter used when `RUST_LOG` is unset. Covers the `carrotfacts`
/// binary as well as both library crates.
pub const DEFAULT_LOG_FILTER: &str = "carrotfacts=info,carrotfacts_bot=info,carrotfacts_sdk=info";

#[derive(Parser, Debug)]
#[command(name = "carrotfacts", about = "IRC bot that knows a lot about carrots")]
pub struct Args {
    /// Config file
    #[arg(long, env = "CARROTFACTS_CONFIG", default_value = "config.toml")]
    pub config: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub irc: IrcConfig,
    pub facts: FactsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IrcConfig {
    /// Server address (host:port).
    pub server: String,
    /// Use TLS.
    pub ssl: bool,
    /// Skip TLS certificate verification.
    pub tls_insecure: bool,
    pub nick: String,
    /// Real name. Empty means use the nick.
    pub name: String,
    pub user: String,
    /// Server password. Empty means none.
    pub password: String,
    pub channel: String,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            ssl: true,
            tls_insecure: false,
            nick: DEFAULT_NICK.to_string(),
            name: String::new(),
            user: DEFAULT_NICK.to_string(),
            password: String::new(),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FactsConfig {
    /// Carrot facts, picked at random.
    pub carrots: PathBuf,
    /// Turnip facts, cycled in order.
    pub turnips: PathBuf,
}

impl Default for FactsConfig {
    fn default() -> Self {
        Self {
            carrots: PathBuf::from("carrots.json"),
            turnips: PathBuf::from("turnips.txt"),
        }
    }
}

impl Config {
    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(s) => toml::from_str(&s).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        client::split_server_addr(&self.server_addr())
            .map(|_| ())
            .ok_or_else(|| ConfigError::ServerAddress(self.irc.server.clone()))
    }

    /// Server address with the conventional port filled in when omitted.
    pub fn server_addr(&self) -> String {
        client::with_default_port(&self.irc.server, self.irc.ssl)
    }

    /// Connection parameters for the IRC client.
    pub fn connect_config(&self) -> ConnectConfig {
        let irc = &self.irc;
        ConnectConfig {
            server_addr: self.server_addr(),
            nick: irc.nick.clone(),
            user: irc.user.clone(),
            realname: if irc.name.is_empty() { irc.nick.clone() } else { irc.name.clone() },
            password: (!irc.password.is_empty()).then(|| irc.password.clone()),
            tls: irc.ssl,
            tls_insecure: irc.tls_insecure,
        }
    }
}
