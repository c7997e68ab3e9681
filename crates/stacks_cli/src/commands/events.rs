//! Events command.

use anyhow::Result;
use clap::Args;

use stacks_core::{EventTailer, TailMode, TailOutcome, DEFAULT_LINES};

use super::{EventPrinter, GlobalArgs};
use crate::ExitCodes;

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Stack name
    name: String,

    /// Keep printing events until the stack settles
    #[arg(short, long)]
    follow: bool,

    /// Number of most recent events to show
    #[arg(short = 'n', long, default_value_t = DEFAULT_LINES)]
    lines: usize,
}

pub async fn execute(args: EventsArgs, global: &GlobalArgs) -> Result<u8> {
    let session = global.session()?;
    let mode = if args.follow {
        TailMode::follow_all()
    } else {
        TailMode::Bounded { lines: args.lines }
    };

    let outcome = EventTailer::new(session.client)
        .tail(&args.name, mode, &mut EventPrinter)
        .await?;
    if let TailOutcome::StackNotFound(message) = outcome {
        println!("{}", message);
    }
    Ok(ExitCodes::SUCCESS)
}
