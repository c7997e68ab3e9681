//! CLI command definitions.
//!
//! Each subcommand maps to one stack operation. Options shared by every
//! command live in [`GlobalArgs`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use stacks_cloud::{AwsCli, AwsCliOptions, StackEvent, StackStatus};
use stacks_core::config::REGION_KEY;
use stacks_core::{
    ConfigSource, CoreError, EventSink, EventTailer, StackClient, StacksConfig, TailMode,
    TailOutcome,
};

use crate::table;

pub mod config;
pub mod delete;
pub mod deploy;
pub mod events;
pub mod list;
pub mod outputs;
pub mod resources;

/// stacks - render templates and manage infrastructure stacks
#[derive(Parser)]
#[command(name = "stacks")]
#[command(version, about = "Render templates and manage infrastructure stacks")]
#[command(long_about = r#"
stacks renders templates into stack definitions and creates, updates,
deletes and inspects stacks on the remote stack service.

COMMANDS:
  create     → Render a template and create a stack
  update     → Render a template and update a stack
  delete     → Delete a stack
  events     → Show or follow stack events
  list       → List stacks
  outputs    → Show stack outputs
  resources  → Show stack resources
  config     → Print the merged configuration

EXIT CODES:
  0 - Success, or nothing to do
  1 - Error, or a followed change ended failed or rolled back
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Environment to deploy to
    #[arg(short, long, global = true, env = "STACKS_ENV")]
    pub env: Option<String>,

    /// Region of the stack service
    #[arg(short, long, global = true, env = "AWS_DEFAULT_REGION")]
    pub region: Option<String>,

    /// Credentials profile
    #[arg(long, global = true, env = "AWS_DEFAULT_PROFILE")]
    pub profile: Option<String>,

    /// Config file (defaults to config.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory of additional config files
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a stack from a template
    Create(deploy::CreateArgs),

    /// Update a stack from a template
    Update(deploy::UpdateArgs),

    /// Delete a stack
    Delete(delete::DeleteArgs),

    /// Show stack events
    Events(events::EventsArgs),

    /// List stacks
    List(list::ListArgs),

    /// Show stack outputs
    Outputs(outputs::OutputsArgs),

    /// Show stack resources
    Resources(resources::ResourcesArgs),

    /// Print configuration
    Config(config::ConfigArgs),
}

impl GlobalArgs {
    /// Load configuration for the selected environment and apply `properties`.
    ///
    /// The region from `--region` wins over the `region` key and is stored
    /// back into the configuration.
    pub fn load_config<S: AsRef<str>>(&self, properties: &[S]) -> Result<StacksConfig> {
        let source = ConfigSource {
            file: self.config.clone(),
            dir: self.config_dir.clone(),
            env: self.env.clone(),
        };
        let mut config = StacksConfig::load(&source).context("Failed to load configuration")?;
        config.apply_properties(properties)?;

        if let Some(region) = self.region.clone() {
            config.set(REGION_KEY, region);
        }
        Ok(config)
    }

    /// The `aws` CLI backend for `region`.
    ///
    /// With `check` set, fails early when the CLI cannot be run.
    pub fn backend(&self, region: Option<String>, check: bool) -> Result<Arc<AwsCli>> {
        let options = AwsCliOptions::new()
            .region(region)
            .profile(self.profile.clone());
        let backend = if check {
            AwsCli::new(options)?
        } else {
            AwsCli::with_options(options)
        };
        Ok(Arc::new(backend))
    }

    /// Configuration, region and stack client for commands that talk to the service.
    pub fn session(&self) -> Result<Session> {
        let config = self.load_config::<&str>(&[])?;
        let region = config.region().ok_or(CoreError::MissingRegion)?;
        let backend = self.backend(Some(region.clone()), true)?;
        debug!("Using region {}", region);
        Ok(Session {
            client: StackClient::new(backend.clone()),
            backend,
            config,
            region,
        })
    }
}

/// Everything a remote command needs.
pub struct Session {
    pub config: StacksConfig,
    pub region: String,
    pub backend: Arc<AwsCli>,
    pub client: StackClient,
}

/// Follow a stack's events from `since`, printing them as they arrive.
///
/// Returns the last observed status, or `None` when the stack is gone.
pub async fn follow_events(
    client: &StackClient,
    name: &str,
    since: DateTime<Utc>,
) -> Result<Option<StackStatus>> {
    let mut sink = EventPrinter;
    let outcome = EventTailer::new(client.clone())
        .tail(name, TailMode::Follow { since }, &mut sink)
        .await?;
    Ok(match outcome {
        TailOutcome::Finished(status) => status,
        TailOutcome::StackNotFound(message) => {
            println!("{}", message);
            None
        }
    })
}

/// Prints event batches as plain tables.
pub struct EventPrinter;

impl EventSink for EventPrinter {
    fn emit(&mut self, events: &[StackEvent]) {
        if events.is_empty() {
            return;
        }
        let rows: Vec<Vec<String>> = events
            .iter()
            .map(|event| {
                vec![
                    event.timestamp.to_rfc3339(),
                    event.status.clone(),
                    event.resource_type.clone(),
                    event.logical_id.clone(),
                    event.status_reason.clone().unwrap_or_default(),
                ]
            })
            .collect();
        println!("{}", table::plain(&rows));
    }
}
