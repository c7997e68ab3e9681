//! Create, update and delete decisions.
//!
//! The driver renders the template, resolves name and tags, picks the
//! transport and then issues exactly one mutating call. Remote errors that
//! only say the desired state is already in place are reported as benign
//! outcomes instead of errors.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use stacks_cloud::{CloudError, ErrorKind, StackRequest};
use stacks_templates::{Metadata, RenderedTemplate, TemplateLoader, TemplateRenderer};
use tracing::{debug, info};

use crate::client::StackClient;
use crate::config::StacksConfig;
use crate::error::{CoreError, CoreResult};
use crate::lookups::LookupFunctions;
use crate::tags::{resolve_tags, TagSet};
use crate::transport::{ArtifactTransport, OffloadSettings};

/// Capabilities acknowledged on every create and update.
pub const CAPABILITIES: [&str; 1] = ["CAPABILITY_IAM"];

/// Answers accepted as confirmation for a delete.
pub const YES: [&str; 5] = ["y", "Y", "yes", "YES", "Yes"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeMode {
    Create,
    Update,
}

/// What to deploy and how.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub template: PathBuf,
    /// Stack name given by the caller; wins over the metadata name.
    pub name: Option<String>,
    pub mode: ChangeMode,
    /// Create the stack when an update finds it missing.
    pub create_on_update: bool,
    pub dry_run: bool,
}

impl DeployRequest {
    pub fn new(template: impl Into<PathBuf>, mode: ChangeMode) -> Self {
        Self {
            template: template.into(),
            name: None,
            mode,
            create_on_update: false,
            dry_run: false,
        }
    }

    pub fn name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn create_on_update(mut self, enabled: bool) -> Self {
        self.create_on_update = enabled;
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }
}

/// A fully resolved change, ready to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct StackChange {
    pub name: String,
    pub body: String,
    pub tags: TagSet,
    pub disable_rollback: bool,
}

impl StackChange {
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// The remote call the driver issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeployOutcome {
    /// A create or update was accepted.
    Submitted { name: String, action: ChangeAction },
    /// The service reported the change as unnecessary.
    Benign { name: String, message: String },
    /// Nothing was submitted.
    DryRun(StackChange),
}

impl DeployOutcome {
    pub fn stack_name(&self) -> &str {
        match self {
            DeployOutcome::Submitted { name, .. } | DeployOutcome::Benign { name, .. } => name,
            DeployOutcome::DryRun(change) => &change.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The stack did not exist; carries the service's message.
    NotFound(String),
}

/// Drives stack changes against the stack service.
pub struct StackDriver {
    client: StackClient,
    transport: ArtifactTransport,
    lookups: Option<LookupFunctions>,
}

impl StackDriver {
    pub fn new(client: StackClient, transport: ArtifactTransport) -> Self {
        Self {
            client,
            transport,
            lookups: None,
        }
    }

    /// Make remote lookup functions available to templates.
    pub fn with_lookups(mut self, lookups: LookupFunctions) -> Self {
        self.lookups = Some(lookups);
        self
    }

    /// Render a template file against `config`.
    pub fn render(&self, template: &Path, config: &StacksConfig) -> CoreResult<RenderedTemplate> {
        render_template(self.lookups.as_ref(), template, config)
    }

    /// Render and resolve everything a change needs, without remote mutation.
    pub fn plan(&self, request: &DeployRequest, config: &StacksConfig) -> CoreResult<StackChange> {
        plan_change(self.lookups.as_ref(), request, config)
    }

    /// [`StackDriver::plan`] on the blocking pool.
    ///
    /// Lookup functions call the service and sleep synchronously while
    /// rendering, which must not stall the async executor.
    pub async fn plan_blocking(
        &self,
        request: &DeployRequest,
        config: &StacksConfig,
    ) -> CoreResult<StackChange> {
        let lookups = self.lookups.clone();
        let request = request.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || plan_change(lookups.as_ref(), &request, &config))
            .await
            .map_err(|e| CoreError::Task(e.to_string()))?
    }

    /// Create or update a stack from a template.
    pub async fn deploy(
        &self,
        request: &DeployRequest,
        config: &StacksConfig,
    ) -> CoreResult<DeployOutcome> {
        let change = self.plan_blocking(request, config).await?;
        if request.dry_run {
            return Ok(DeployOutcome::DryRun(change));
        }

        let action = match request.mode {
            ChangeMode::Create => ChangeAction::Created,
            ChangeMode::Update => {
                if request.create_on_update && !self.client.exists(&change.name).await? {
                    info!("Stack {} does not exist, creating it", change.name);
                    ChangeAction::Created
                } else {
                    ChangeAction::Updated
                }
            }
        };

        let settings = OffloadSettings::from_config(config)?;
        let template = self
            .transport
            .prepare(&change.name, &change.body, &settings)
            .await?;

        let stack_request = StackRequest {
            name: change.name.clone(),
            template,
            tags: change.tags.to_tags(),
            capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            disable_rollback: change.disable_rollback,
        };

        debug!("Submitting {:?} for stack {}", action, change.name);
        let result = match action {
            ChangeAction::Created => self.client.create(&stack_request).await,
            ChangeAction::Updated => self.client.update(&stack_request).await,
        };

        match result {
            Ok(()) => Ok(DeployOutcome::Submitted {
                name: change.name,
                action,
            }),
            Err(err) if is_benign_change_error(&err) => Ok(DeployOutcome::Benign {
                name: change.name,
                message: err.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete a stack. A stack that does not exist is a benign outcome.
    pub async fn delete(&self, name: &str) -> CoreResult<DeleteOutcome> {
        info!("Deleting stack {}", name);
        match self.client.delete(name).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Ok(DeleteOutcome::NotFound(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn render_template(
    lookups: Option<&LookupFunctions>,
    template: &Path,
    config: &StacksConfig,
) -> CoreResult<RenderedTemplate> {
    let (loader, name) = TemplateLoader::for_file(template)?;
    let mut renderer = TemplateRenderer::new(loader);
    if let Some(lookups) = lookups {
        lookups.register(&mut renderer);
    }
    Ok(renderer.render_document(&name, config.mapping())?)
}

fn plan_change(
    lookups: Option<&LookupFunctions>,
    request: &DeployRequest,
    config: &StacksConfig,
) -> CoreResult<StackChange> {
    let env = config.require_env()?;
    let rendered = render_template(lookups, &request.template, config)?;
    let metadata = rendered.metadata.unwrap_or_default();

    let name = resolve_name(request.name.as_deref(), &metadata)?;
    let tags = resolve_tags(&metadata.tags, &env, &rendered.body);

    Ok(StackChange {
        name,
        body: rendered.body,
        tags,
        disable_rollback: metadata.disable_rollback,
    })
}

/// Pick the explicit name, then the metadata name.
pub fn resolve_name(explicit: Option<&str>, metadata: &Metadata) -> CoreResult<String> {
    explicit
        .filter(|n| !n.is_empty())
        .or(metadata.name.as_deref().filter(|n| !n.is_empty()))
        .map(str::to_string)
        .ok_or(CoreError::MissingStackName)
}

/// Create and update errors that mean the stack is already as requested.
pub fn is_benign_change_error(err: &CloudError) -> bool {
    matches!(err.kind(), ErrorKind::NoUpdates | ErrorKind::AlreadyExists)
}

/// Ask the operator to confirm a delete.
pub fn confirm_delete<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    name: &str,
    region: Option<&str>,
    profile: Option<&str>,
) -> io::Result<bool> {
    writeln!(output, "You are about to delete the following stack:")?;
    writeln!(output, "Name: {}", name)?;
    writeln!(output, "Region: {}", region.unwrap_or("None"))?;
    writeln!(output, "Profile: {}", profile.unwrap_or("None"))?;
    writeln!(output)?;
    write!(output, "Are you sure? [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(YES.contains(&answer.trim()))
}
