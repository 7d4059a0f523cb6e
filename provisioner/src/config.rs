// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces for parsing configuration files for the provisioner.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the provisioner.
///
/// All sections are optional; command-line flags take precedence over values
/// read from the file.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub display: DisplayConfig,
    pub log: LogConfig,
    pub errors: ErrorsConfig,
    pub simulation: SimulationConfig,
}

impl Config {
    /// Load a `Config` from the given TOML file.
    pub fn from_file(path: &Utf8Path) -> Result<Config, LoadError> {
        let file_contents = std::fs::read_to_string(path)
            .map_err(|err| LoadError::Io { path: path.into(), err })?;
        let config_parsed: Config = toml::from_str(&file_contents)
            .map_err(|err| LoadError::Parse { path: path.into(), err })?;
        Ok(config_parsed)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Whether to colorize progress output.
    pub color: ColorChoice,
    /// A prefix printed at the start of every progress line.
    pub prefix: String,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Colorize if stdout is a terminal.
    #[default]
    Auto,
    /// Always colorize.
    Always,
    /// Never colorize.
    Never,
}

impl ColorChoice {
    /// Resolves this choice against whether the output is a terminal.
    pub fn should_colorize(self, is_terminal: bool) -> bool {
        match self {
            ColorChoice::Auto => is_terminal,
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// The file that the full log is written to.
    pub path: Utf8PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { path: "/tmp/provisioner.log".into() }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorsConfig {
    /// The number of rendering errors that can be queued before the progress
    /// display waits for them to be printed.
    pub buffer: usize,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self { buffer: 16 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// The delay between two simulated installer updates, in milliseconds.
    pub event_interval_ms: u64,
    /// The components deployed by the simulated installer.
    pub components: Vec<String>,
}

impl SimulationConfig {
    pub fn event_interval(&self) -> Duration {
        Duration::from_millis(self.event_interval_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            event_interval_ms: 50,
            components: vec![
                "cluster-essentials".to_owned(),
                "istio".to_owned(),
                "serverless".to_owned(),
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error reading \"{path}\"")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error parsing \"{path}\"")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
}
