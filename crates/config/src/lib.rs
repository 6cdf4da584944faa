//! Layered configuration for shelf.
//!
//! Sources, later ones winning:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. `config.toml`, `config.yaml` or `config.json` in the user's config
//!    directory (`$XDG_CONFIG_HOME/shelf` on Linux).
//! 3. A file given explicitly (`--config`), whose extension picks the format.
//! 4. `SHELF_`-prefixed environment variables, with `__` separating nested
//!    keys: `SHELF_RETRY__MAX_RETRIES=5`, `SHELF_CLASSIFIER__MIN_LENGTH=4`.

mod error;

pub use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use shelf_scan::ScannerOptions;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "SHELF_";
const USER_CONFIG_FILES: [&str; 3] = ["config.toml", "config.yaml", "config.json"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackOptions {
    /// Ring the terminal bell on every successful scan.
    pub bell: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `classifier`, `cache`, `retry` and `lookup` tables, at the top level.
    #[serde(flatten)]
    pub scanner: ScannerOptions,
    pub feedback: FeedbackOptions,
}
impl Config {
    /// Load from every default source, plus `file` if given.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(file) = file {
            loader = loader.file(file);
        }
        loader.load()
    }

    pub fn validate(&self) -> Result<()> {
        self.scanner.validate().or_raise(|| ErrorKind::Invalid)
    }
}

/// Where shelf looks for its user config file, if the platform has such a
/// place.
pub fn user_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "shelf").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Assembles the configuration sources. [`Config::load`] covers the usual
/// case; this exists so the sources can be pointed elsewhere.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: Option<PathBuf>,
    file: Option<PathBuf>,
    env_prefix: String,
}
impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_dir: user_config_dir(), file: None, env_prefix: ENV_PREFIX.to_string() }
    }

    /// Directory searched for `config.{toml,yaml,json}`; `None` to skip it.
    pub fn config_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config_dir = dir;
        self
    }

    /// An explicit config file. Unlike the user config, it must exist.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn figment(&self) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dir) = &self.config_dir {
            for name in USER_CONFIG_FILES {
                let path = dir.join(name);
                if path.is_file() {
                    figment = merge_file(figment, &path)?;
                }
            }
        }
        if let Some(path) = &self.file {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.clone()));
            }
            figment = merge_file(figment, path)?;
        }
        Ok(figment.merge(Env::prefixed(&self.env_prefix).split("__")))
    }

    pub fn load(&self) -> Result<Config> {
        let config: Config = self.figment()?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    tracing::debug!(path = %path.display(), "Reading config file");
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    let figment = match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    };
    Ok(figment)
}
