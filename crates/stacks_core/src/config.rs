//! Configuration loading.
//!
//! Configuration is a flat mapping of template variables assembled from a
//! config file, an optional directory of YAML files, the selected
//! environment's overlay and `key=value` properties, in that order.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{CoreError, CoreResult};

/// File read when no config file is given and it exists.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Key holding per-environment overlays.
pub const ENVIRONMENTS_KEY: &str = "environments";

pub const ENV_KEY: &str = "env";
pub const REGION_KEY: &str = "region";
pub const BUCKET_KEY: &str = "templates_bucket_name";

/// Output format for printing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Where configuration is read from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Config file; `config.yaml` in the working directory is used if unset.
    pub file: Option<PathBuf>,
    /// Directory of `*.yaml`/`*.yml` files merged in file name order.
    pub dir: Option<PathBuf>,
    /// Environment to select.
    pub env: Option<String>,
}

/// Merged configuration, read-only once handed to the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StacksConfig {
    values: Mapping,
}

impl StacksConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(values: Mapping) -> Self {
        Self { values }
    }

    /// Load and merge configuration, then apply the environment overlay.
    pub fn load(source: &ConfigSource) -> CoreResult<Self> {
        let mut values = Mapping::new();

        match &source.file {
            Some(path) => {
                if !path.is_file() {
                    return Err(CoreError::Config(format!(
                        "Config file {} does not exist",
                        path.display()
                    )));
                }
                merge_mapping(&mut values, read_mapping(path)?);
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    merge_mapping(&mut values, read_mapping(default)?);
                }
            }
        }

        if let Some(dir) = &source.dir {
            for path in config_dir_files(dir)? {
                merge_mapping(&mut values, read_mapping(&path)?);
            }
        }

        let mut config = Self { values };
        config.select_environment(source.env.as_deref());
        Ok(config)
    }

    /// Overlay the selected environment's section and record it as `env`.
    ///
    /// `env` falls back to the `env` key already in the configuration.
    pub fn select_environment(&mut self, env: Option<&str>) {
        let env = env.map(str::to_string).or_else(|| self.get_str(ENV_KEY));
        let environments = self.values.remove(ENVIRONMENTS_KEY);

        if let Some(env) = env {
            if let Some(Value::Mapping(overlay)) = environments
                .as_ref()
                .and_then(|all| all.get(env.as_str()))
                .cloned()
            {
                debug!("Applying configuration for environment {}", env);
                merge_mapping(&mut self.values, overlay);
            }
            self.set(ENV_KEY, env);
        }
    }

    /// Apply `key=value` properties. Values are kept as strings.
    pub fn apply_properties<S: AsRef<str>>(&mut self, properties: &[S]) -> CoreResult<()> {
        for (key, value) in parse_properties(properties)? {
            self.set(&key, value);
        }
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(Value::String(key.to_string()), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Scalar value as a string; `None` for missing, null and collection values.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn env(&self) -> Option<String> {
        self.get_str(ENV_KEY).filter(|s| !s.is_empty())
    }

    pub fn region(&self) -> Option<String> {
        self.get_str(REGION_KEY).filter(|s| !s.is_empty())
    }

    /// The environment, required for deployments.
    pub fn require_env(&self) -> CoreResult<String> {
        self.env().ok_or(CoreError::MissingEnvironment)
    }

    pub fn templates_bucket_name(&self) -> Option<String> {
        self.get_str(BUCKET_KEY)
    }

    pub fn mapping(&self) -> &Mapping {
        &self.values
    }

    /// Render the whole configuration, or a single property, for display.
    pub fn display(&self, property: Option<&str>, format: OutputFormat) -> CoreResult<String> {
        let value = match property {
            Some(name) => match self.values.get(name) {
                Some(value) => value.clone(),
                None => {
                    return Err(CoreError::Config(format!("Property {} is not set", name)));
                }
            },
            None => Value::Mapping(self.values.clone()),
        };

        if let (Some(_), Some(scalar)) = (property, scalar_string(&value)) {
            return Ok(scalar);
        }

        Ok(match format {
            OutputFormat::Yaml => serde_yaml::to_string(&value)?.trim_end().to_string(),
            OutputFormat::Json => serde_json::to_string_pretty(&value)?,
        })
    }
}

/// Split `key=value` properties at the first `=`.
pub fn parse_properties<S: AsRef<str>>(properties: &[S]) -> CoreResult<Vec<(String, String)>> {
    properties
        .iter()
        .map(|property| {
            let property = property.as_ref();
            match property.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    Ok((key.trim().to_string(), value.to_string()))
                }
                _ => Err(CoreError::Config(format!(
                    "Invalid property '{}', expected key=value",
                    property
                ))),
            }
        })
        .collect()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn read_mapping(path: &Path) -> CoreResult<Mapping> {
    debug!("Reading config from {:?}", path);
    let content = fs::read_to_string(path)?;
    match serde_yaml::from_str::<Value>(&content)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(CoreError::Config(format!(
            "{} must contain a mapping",
            path.display()
        ))),
    }
}

fn config_dir_files(dir: &Path) -> CoreResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CoreError::Config(format!(
            "Config directory {} does not exist",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| {
            p.is_file() && p.extension().map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Merge `overlay` into `base`; nested mappings merge, everything else is replaced.
fn merge_mapping(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                merge_mapping(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
