//! Delete command.

use std::io;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use stacks_core::{confirm_delete, ArtifactTransport, DeleteOutcome, StackDriver};

use super::{follow_events, GlobalArgs};
use crate::ExitCodes;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Stack name
    name: String,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Follow stack events until the delete finishes
    #[arg(short = 'f', long)]
    events_follow: bool,
}

pub async fn execute(args: DeleteArgs, global: &GlobalArgs) -> Result<u8> {
    let session = global.session()?;

    if !args.yes {
        let confirmed = confirm_delete(
            &mut io::stdin().lock(),
            &mut io::stdout(),
            &args.name,
            Some(&session.region),
            global.profile.as_deref(),
        )
        .context("Failed to read confirmation")?;
        if !confirmed {
            return Ok(ExitCodes::SUCCESS);
        }
    }

    let since = Utc::now();
    let transport = ArtifactTransport::new(session.backend.clone(), session.client.sleeper());
    let driver = StackDriver::new(session.client.clone(), transport);

    match driver.delete(&args.name).await? {
        DeleteOutcome::NotFound(message) => {
            println!("{}", message);
            return Ok(ExitCodes::SUCCESS);
        }
        DeleteOutcome::Deleted => {}
    }

    if !args.events_follow {
        return Ok(ExitCodes::SUCCESS);
    }

    match follow_events(&session.client, &args.name, since).await? {
        Some(status) if status.is_failed() => Ok(ExitCodes::FAILURE),
        _ => Ok(ExitCodes::SUCCESS),
    }
}
