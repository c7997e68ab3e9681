//! # stacks_templates
//!
//! Template rendering for stacks.
//!
//! A stack template is a Jinja2 text template that renders to a YAML
//! document stream. Rendering is done by `minijinja`; this crate handles:
//!
//! - Static detection of variables the configuration does not provide
//! - Exposing lookup functions to templates
//! - Splitting the optional metadata document from the template body
//! - Canonical, key-sorted serialization of the body with intrinsic tags kept opaque
//!
//! ## Example
//!
//! ```rust,no_run
//! use stacks_templates::{TemplateLoader, TemplateRenderer};
//! use std::path::Path;
//!
//! let (loader, name) = TemplateLoader::for_file(Path::new("stacks/vpc.yaml")).unwrap();
//! let renderer = TemplateRenderer::new(loader);
//!
//! let config: serde_yaml::Mapping = serde_yaml::from_str("env: dev").unwrap();
//! let template = renderer.render_document(&name, &config).unwrap();
//! println!("{}", template.body);
//! ```

pub mod document;
pub mod error;
pub mod loader;
pub mod renderer;
pub mod validator;

pub use document::{split_documents, Metadata, MetadataTag, RenderedTemplate, TemplateNode};
pub use error::{TemplateError, TemplateResult};
pub use loader::TemplateLoader;
pub use renderer::{TemplateFunction, TemplateRenderer};
pub use validator::{VariableValidator, BUILTIN_NAMES};
