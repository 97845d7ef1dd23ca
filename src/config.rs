//! Application configuration
//!
//! Settings live in `config.toml` under the platform config directory and
//! can be overridden from the command line.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Error;

pub const DEFAULT_PROJECT: &str = "tic-tac-toe";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project title reported to the visit tracker
    pub project: String,
    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,
    pub tracker: TrackerConfig,
    pub preferences: PreferencesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: DEFAULT_PROJECT.to_string(),
            log_level: "info".to_string(),
            tracker: TrackerConfig::default(),
            preferences: PreferencesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:3000/api/visits".to_string(),
            timeout_secs: 10,
        }
    }
}

impl TrackerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// Overrides the default `preferences.toml` location
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Parser)]
#[command(version, about = "Tic-tac-toe in the terminal")]
pub struct Args {
    /// Path to the config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Visit tracking endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Project title reported to the tracker
    #[arg(long)]
    pub project: Option<String>,

    /// Skip the visit report
    #[arg(long)]
    pub no_track: bool,

    /// Write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

fn project_dirs() -> Result<ProjectDirs, Error> {
    ProjectDirs::from("", "", "tictactoe")
        .ok_or_else(|| Error::Config("could not determine home directory".to_string()))
}

pub fn config_dir() -> Result<PathBuf, Error> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

pub fn data_dir() -> Result<PathBuf, Error> {
    let dir = project_dirs()?.data_dir().to_path_buf();
    fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
    Ok(dir)
}

impl Config {
    /// Loads the config at `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Config, Error> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path).map_err(|e| Error::Config(e.to_string()))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn default_path() -> Result<PathBuf, Error> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Loads from `--config` or the default location, then applies the
    /// remaining flags.
    pub fn from_args(args: &Args) -> Result<Config, Error> {
        let path = match &args.config {
            Some(path) => path.clone(),
            None => Config::default_path()?,
        };
        Ok(Config::load(&path)?.apply_args(args))
    }

    pub fn apply_args(mut self, args: &Args) -> Config {
        if let Some(endpoint) = &args.endpoint {
            self.tracker.endpoint = endpoint.clone();
        }
        if let Some(project) = &args.project {
            self.project = project.clone();
        }
        if args.no_track {
            self.tracker.enabled = false;
        }
        self
    }

    pub fn preferences_path(&self) -> Result<PathBuf, Error> {
        match &self.preferences.path {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("preferences.toml")),
        }
    }
}
