//! Error types for the stack engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while deploying or inspecting stacks.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Stack name must be specified via command line argument or stack metadata.")]
    MissingStackName,

    #[error("Environment is not set. Use --env or set 'env' in the config.")]
    MissingEnvironment,

    #[error("Region is not set. Use --region or set 'region' in the config.")]
    MissingRegion,

    #[error("Stack {0} not found")]
    StackNotFound(String),

    #[error("Output {output} not found in stack {stack}")]
    OutputNotFound { stack: String, output: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rendering task failed: {0}")]
    Task(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Template(#[from] stacks_templates::TemplateError),

    #[error(transparent)]
    Cloud(#[from] stacks_cloud::CloudError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// The remote error behind this one, if any.
    pub fn cloud(&self) -> Option<&stacks_cloud::CloudError> {
        match self {
            CoreError::Cloud(err) => Some(err),
            _ => None,
        }
    }
}
