//! Static variable validation.
//!
//! Collects every name the entry template reads before declaring it, without
//! evaluating anything. The check runs before rendering so no template
//! function is ever called against an incomplete configuration. Included
//! templates are not analysed.

use std::collections::BTreeSet;

use minijinja::Template;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};

/// Globals every template environment provides without configuration.
pub const BUILTIN_NAMES: &[&str] = &["range", "dict", "namespace", "debug", "loop"];

/// Checks a template against a configuration before it is rendered.
pub struct VariableValidator {
    builtins: BTreeSet<String>,
}

impl Default for VariableValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableValidator {
    pub fn new() -> Self {
        Self {
            builtins: BUILTIN_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add names (typically registered functions) that need no configuration.
    pub fn with_builtins<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builtins.extend(names.into_iter().map(Into::into));
        self
    }

    /// Names referenced by the template that neither the configuration nor the builtins provide.
    pub fn missing(&self, template: &Template<'_, '_>, config: &Mapping) -> Vec<String> {
        let referenced: BTreeSet<String> =
            template.undeclared_variables(false).into_iter().collect();
        referenced
            .into_iter()
            .filter(|name| !self.builtins.contains(name))
            .filter(|name| !config.contains_key(Value::String(name.clone())))
            .collect()
    }

    /// Fail with [`TemplateError::MissingVariables`] when any referenced name is unset.
    pub fn check(&self, template: &Template<'_, '_>, config: &Mapping) -> TemplateResult<()> {
        let missing = self.missing(template, config);
        if missing.is_empty() {
            debug!("All variables of {} are set", template.name());
            return Ok(());
        }
        Err(TemplateError::MissingVariables { names: missing })
    }
}
