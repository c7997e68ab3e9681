//! Error types for templates.

use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur during template operations.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template syntax error: {0}")]
    Syntax(String),

    #[error("Required properties not set: {}", .names.join(","))]
    MissingVariables { names: Vec<String> },

    #[error("Template rendering failed: {0}")]
    RenderingFailed(String),

    #[error("Template function {name} failed: {message}")]
    FunctionFailed { name: String, message: String },

    #[error("{0}")]
    Parse(String),

    #[error("Invalid metadata document: {0}")]
    InvalidMetadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TemplateError {
    /// Names reported by a failed variable check, sorted.
    pub fn missing_variables(&self) -> Option<&[String]> {
        match self {
            TemplateError::MissingVariables { names } => Some(names),
            _ => None,
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        // A failing template function travels through the engine as the source.
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            if let Some(TemplateError::FunctionFailed { name, message }) =
                cause.downcast_ref::<TemplateError>()
            {
                return TemplateError::FunctionFailed {
                    name: name.clone(),
                    message: message.clone(),
                };
            }
            source = cause.source();
        }

        match err.kind() {
            minijinja::ErrorKind::TemplateNotFound => {
                TemplateError::NotFound(
                err.detail()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string()),
            )
            }
            minijinja::ErrorKind::SyntaxError => TemplateError::Syntax(err.to_string()),
            _ => TemplateError::RenderingFailed(err.to_string()),
        }
    }
}
