use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::{
    concurrency::ConcurrencyConfig, gateway::GatewayConfig, model::ModelConfig,
    probe::ProbeConfig, upload::UploadConfig,
};

pub mod concurrency;
pub mod gateway;
pub mod model;
pub mod probe;
pub mod upload;

/// The name of the configuration file looked up in the user's configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Invalid value for a field.
    #[error("Invalid value for field {0}: {1}")]
    InvalidValue(String, String),

    /// Invalid configuration for various reason.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Error merging configurations.
    #[error("Error merging configurations: {0}")]
    Error(String),
}

#[derive(Error, Debug)]
pub enum LoadError {
    /// Error loading configuration.
    #[error("Error merging configuration files: {0} ({1})")]
    MergeError(MergeError, PathBuf),

    /// IO error while reading configuration file.
    #[error("IO error while reading configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing configuration file.
    #[error("Error parsing configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Error validating configuration.
    #[error("Error validating configuration: {0}")]
    ValidationError(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigBase<T> {
    /// The language model that generates the artifacts.
    #[serde(default)]
    #[serde(skip_serializing_if = "ModelConfig::is_default")]
    pub model: ModelConfig,

    /// The gateway and store endpoint of the content-addressed store.
    #[serde(default)]
    #[serde(skip_serializing_if = "GatewayConfig::is_default")]
    pub gateway: GatewayConfig,

    /// Existence checks against the gateway.
    #[serde(default)]
    #[serde(skip_serializing_if = "ProbeConfig::is_default")]
    pub probe: ProbeConfig,

    /// Batching of block uploads.
    #[serde(default)]
    #[serde(skip_serializing_if = "UploadConfig::is_default")]
    pub upload: UploadConfig,

    /// Configuration for the concurrency of sitesmith.
    #[serde(default)]
    #[serde(skip_serializing_if = "ConcurrencyConfig::is_default")]
    pub concurrency: ConcurrencyConfig,

    #[serde(flatten)]
    pub extensions: T,

    #[serde(skip)]
    pub loaded_from: Vec<PathBuf>,
}

impl<T> Default for ConfigBase<T>
where
    T: Config + DeserializeOwned,
{
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            gateway: GatewayConfig::default(),
            probe: ProbeConfig::default(),
            upload: UploadConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            extensions: T::default(),
            loaded_from: Vec::new(),
        }
    }
}

/// An empty dummy configuration extension that we can use when no extension is needed.
impl Config for () {
    fn get_extension_name(&self) -> String {
        "__NONE__".to_string()
    }

    fn merge_config(self, _other: &Self) -> Result<Self, MergeError> {
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        vec![]
    }
}

pub trait Config:
    Serialize + for<'de> Deserialize<'de> + std::fmt::Debug + Clone + PartialEq + Eq + Default
{
    /// Get the name of the extension.
    fn get_extension_name(&self) -> String;

    /// Merge another configuration (file) into this one.
    /// Note: the "other" configuration should take priority over the current one.
    fn merge_config(self, other: &Self) -> Result<Self, MergeError>;

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ValidationError>;

    fn is_default(&self) -> bool {
        self == &Self::default()
    }

    /// Get the valid keys of the configuration.
    fn keys(&self) -> Vec<String>;
}

/// Picks `other` unless it still has its default value, in which case `current` is kept.
pub(crate) fn merge_value<V: PartialEq + Clone>(current: V, other: &V, default: &V) -> V {
    if other == default {
        current
    } else {
        other.clone()
    }
}

/// Checks that `url` can be used as an HTTP endpoint.
pub(crate) fn validate_http_url(field: &str, url: &Url) -> Result<(), ValidationError> {
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(()),
        scheme => Err(ValidationError::InvalidValue(
            field.to_string(),
            format!("'{url}' is not an http(s) URL (scheme '{scheme}')"),
        )),
    }
}

/// Checks that a count or limit is not zero.
pub(crate) fn validate_non_zero(field: &str, value: u64) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidValue(
            field.to_string(),
            "the value must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

impl<T> ConfigBase<T>
where
    T: Config + DeserializeOwned,
{
    /// Loads and merges the given files in order. Later files take priority over earlier ones.
    pub fn load_from_files<I, P>(paths: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut config = ConfigBase::<T>::default();

        for path in paths {
            let content = fs_err::read_to_string(path.as_ref())?;
            let mut other: ConfigBase<T> = toml::from_str(&content)?;
            other.loaded_from.push(path.as_ref().to_path_buf());
            config = config
                .merge_config(&other)
                .map_err(|e| LoadError::MergeError(e, path.as_ref().to_path_buf()))?;
            tracing::debug!("loaded configuration from {}", path.as_ref().display());
        }

        config.validate()?;
        Ok(config)
    }
}

impl<T> Config for ConfigBase<T>
where
    T: Config + Default,
{
    fn get_extension_name(&self) -> String {
        "base".to_string()
    }

    /// Merge another configuration (file) into this one.
    /// Note: the "other" configuration should take priority over the current one.
    fn merge_config(self, other: &Self) -> Result<Self, MergeError> {
        Ok(Self {
            model: self.model.merge_config(&other.model)?,
            gateway: self.gateway.merge_config(&other.gateway)?,
            probe: self.probe.merge_config(&other.probe)?,
            upload: self.upload.merge_config(&other.upload)?,
            concurrency: self.concurrency.merge_config(&other.concurrency)?,
            extensions: self.extensions.merge_config(&other.extensions)?,
            loaded_from: self
                .loaded_from
                .iter()
                .chain(&other.loaded_from)
                .cloned()
                .collect(),
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.model.validate()?;
        self.gateway.validate()?;
        self.probe.validate()?;
        self.upload.validate()?;
        self.concurrency.validate()?;
        self.extensions.validate()
    }

    /// Gather all the keys of the configuration.
    fn keys(&self) -> Vec<String> {
        fn get_keys(config: &impl Config) -> Vec<String> {
            config
                .keys()
                .iter()
                .map(|s| format!("{}.{}", config.get_extension_name(), s))
                .collect()
        }

        let mut keys = Vec::new();

        keys.extend(get_keys(&self.model));
        keys.extend(get_keys(&self.gateway));
        keys.extend(get_keys(&self.probe));
        keys.extend(get_keys(&self.upload));
        keys.extend(get_keys(&self.concurrency));
        keys.extend(get_keys(&self.extensions));

        keys
    }
}

/// Returns the configuration file in the user's configuration directory
/// (`$XDG_CONFIG_HOME/sitesmith/config.toml` on Linux) if it exists.
pub fn default_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("sitesmith").join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}
