//! Resources command.

use anyhow::Result;
use clap::Args;

use stacks_core::StackQueries;

use super::GlobalArgs;
use crate::table;
use crate::ExitCodes;

#[derive(Args, Debug)]
pub struct ResourcesArgs {
    /// Stack name
    name: String,

    /// Print only the physical id of this logical resource
    logical_id: Option<String>,
}

pub async fn execute(args: ResourcesArgs, global: &GlobalArgs) -> Result<u8> {
    let session = global.session()?;
    let resources = StackQueries::new(session.client)
        .resources(&args.name, args.logical_id.as_deref())
        .await?;

    let rows: Vec<Vec<String>> = resources
        .into_iter()
        .map(|r| {
            let physical_id = r.physical_id.unwrap_or_default();
            if args.logical_id.is_some() {
                vec![physical_id]
            } else {
                vec![r.logical_id, physical_id, r.resource_type, r.status]
            }
        })
        .collect();
    if !rows.is_empty() {
        println!("{}", table::plain(&rows));
    }
    Ok(ExitCodes::SUCCESS)
}
