//! Template rendering.
//!
//! Templates are Jinja2 text rendered by `minijinja`. Registered functions
//! are exposed as globals and receive their arguments as YAML values.

use std::collections::BTreeSet;
use std::sync::Arc;

use minijinja::value::Rest;
use minijinja::{Environment, ErrorKind, Value as JinjaValue};
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::document::{split_documents, RenderedTemplate};
use crate::error::{TemplateError, TemplateResult};
use crate::loader::TemplateLoader;
use crate::validator::VariableValidator;

/// A function callable from templates, e.g. `{{ get_vpc_id("main") }}`.
pub type TemplateFunction = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Template renderer.
///
/// Rendering is a pure function of the template sources and the
/// configuration mapping, plus whatever registered functions return.
pub struct TemplateRenderer {
    loader: TemplateLoader,
    env: Environment<'static>,
    functions: BTreeSet<String>,
}

impl TemplateRenderer {
    /// Create a renderer resolving templates and includes through `loader`.
    pub fn new(loader: TemplateLoader) -> Self {
        let mut env = loader.environment();
        env.add_filter("format", format_filter);
        Self {
            loader,
            env,
            functions: BTreeSet::new(),
        }
    }

    /// Register a template function.
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(function));
        self
    }

    /// Register an already shared template function.
    pub fn register(&mut self, name: impl Into<String>, function: TemplateFunction) {
        let name = name.into();
        let label = name.clone();
        self.env.add_function(name.clone(), move |args: Rest<JinjaValue>| {
            call_function(&label, &function, &args)
        });
        self.functions.insert(name);
    }

    pub fn loader(&self) -> &TemplateLoader {
        &self.loader
    }

    /// Names of registered functions.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(String::as_str)
    }

    /// Validate and render a template by name.
    ///
    /// The variable check runs on the parsed template first; nothing is
    /// evaluated when a referenced name is missing from `config`.
    pub fn render(&self, name: &str, config: &Mapping) -> TemplateResult<String> {
        self.loader.ensure_exists(name)?;
        let template = self.env.get_template(name)?;

        VariableValidator::new()
            .with_builtins(self.function_names())
            .check(&template, config)?;

        info!("Rendering template {}", name);
        Ok(template.render(config)?)
    }

    /// Render a template and split the result into metadata and canonical body.
    pub fn render_document(&self, name: &str, config: &Mapping) -> TemplateResult<RenderedTemplate> {
        let rendered = self.render(name, config)?;
        split_documents(&rendered)
    }
}

fn call_function(
    name: &str,
    function: &TemplateFunction,
    args: &[JinjaValue],
) -> Result<JinjaValue, minijinja::Error> {
    let args = args
        .iter()
        .map(serde_yaml::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| function_error(name, e.to_string()))?;
    let value = function(&args).map_err(|message| function_error(name, message))?;
    Ok(JinjaValue::from_serialize(&value))
}

fn function_error(name: &str, message: String) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, format!("{} failed", name)).with_source(
        TemplateError::FunctionFailed {
            name: name.to_string(),
            message,
        },
    )
}

/// `'%s-web' | format(env)`: printf-style `%s`, `%d` and `%%`.
fn format_filter(format: String, args: Rest<JinjaValue>) -> Result<String, minijinja::Error> {
    let mut out = String::with_capacity(format.len());
    let mut values = args.iter();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') | Some('d') => {
                let value = values.next().ok_or_else(|| {
                    minijinja::Error::new(
                        ErrorKind::MissingArgument,
                        "not enough arguments for format string",
                    )
                })?;
                out.push_str(&value.to_string());
            }
            other => {
                return Err(minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("unsupported format character {:?}", other.unwrap_or(' ')),
                ))
            }
        }
    }
    Ok(out)
}
