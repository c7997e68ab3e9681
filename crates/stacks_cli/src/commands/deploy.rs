//! Create and update commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use tracing::info;

use stacks_cloud::AwsCli;
use stacks_core::{
    ArtifactTransport, ChangeMode, CoreError, DeployOutcome, DeployRequest, LookupFunctions,
    StackChange, StackClient, StackDriver,
};

use super::{follow_events, GlobalArgs};
use crate::ExitCodes;

/// Options shared by create and update.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Template file to render
    #[arg(short, long)]
    template: PathBuf,

    /// Stack name (defaults to the template metadata name)
    name: Option<String>,

    /// Override a config property (key=value), repeatable
    #[arg(short, long = "property")]
    property: Vec<String>,

    /// Render and print the stack without changing anything
    #[arg(short, long)]
    dry_run: bool,

    /// Follow stack events until the change finishes
    #[arg(short = 'f', long)]
    events_follow: bool,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    deploy: DeployArgs,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    deploy: DeployArgs,

    /// Create the stack if it does not exist
    #[arg(long)]
    create_on_update: bool,
}

pub async fn execute_create(args: CreateArgs, global: &GlobalArgs) -> Result<u8> {
    deploy(args.deploy, ChangeMode::Create, false, global).await
}

pub async fn execute_update(args: UpdateArgs, global: &GlobalArgs) -> Result<u8> {
    deploy(args.deploy, ChangeMode::Update, args.create_on_update, global).await
}

async fn deploy(
    args: DeployArgs,
    mode: ChangeMode,
    create_on_update: bool,
    global: &GlobalArgs,
) -> Result<u8> {
    let config = global.load_config(&args.property)?;
    let region = config.region();
    if region.is_none() && !args.dry_run {
        return Err(CoreError::MissingRegion.into());
    }

    let backend = global.backend(region, !args.dry_run)?;
    let client = StackClient::new(backend.clone());
    let driver = driver(&client, backend);

    let request = DeployRequest::new(&args.template, mode)
        .name(args.name)
        .create_on_update(create_on_update)
        .dry_run(args.dry_run);

    // Events of an update are followed from before the change was sent.
    let since = match mode {
        ChangeMode::Create => DateTime::<Utc>::MIN_UTC,
        ChangeMode::Update => Utc::now(),
    };

    let name = match driver.deploy(&request, &config).await? {
        DeployOutcome::DryRun(change) => {
            print_dry_run(&change);
            return Ok(ExitCodes::SUCCESS);
        }
        DeployOutcome::Benign { message, .. } => {
            println!("{}", message);
            return Ok(ExitCodes::SUCCESS);
        }
        DeployOutcome::Submitted { name, action } => {
            info!("{:?} stack {}", action, name);
            name
        }
    };

    if !args.events_follow {
        return Ok(ExitCodes::SUCCESS);
    }

    let status = follow_events(&client, &name, since).await?;
    match status {
        Some(status) if status.is_failed() || status.is_rollback() => {
            Ok(ExitCodes::FAILURE)
        }
        _ => Ok(ExitCodes::SUCCESS),
    }
}

fn driver(client: &StackClient, backend: Arc<AwsCli>) -> StackDriver {
    let transport = ArtifactTransport::new(backend.clone(), client.sleeper())
        .with_policy(client.policy());
    StackDriver::new(client.clone(), transport).with_lookups(LookupFunctions::new(backend))
}

/// Body to stdout, the rest to stderr so the body can be piped.
fn print_dry_run(change: &StackChange) {
    println!("{}", change.body);
    eprintln!("Name: {}", change.name);
    eprintln!("Tags: {}", change.tags);
    eprintln!("Template size: {}", change.size());
}
