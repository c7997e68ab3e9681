//! List command.

use anyhow::Result;
use clap::Args;

use stacks_core::StackQueries;

use super::GlobalArgs;
use crate::table;
use crate::ExitCodes;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Glob matched against stack names
    #[arg(default_value = "*")]
    pattern: String,

    /// Also show the Env tag and template description
    #[arg(short, long)]
    verbose: bool,
}

pub async fn execute(args: ListArgs, global: &GlobalArgs) -> Result<u8> {
    let session = global.session()?;
    let listings = StackQueries::new(session.client)
        .list(&args.pattern, args.verbose)
        .await?;

    let rows: Vec<Vec<String>> = listings
        .into_iter()
        .map(|listing| {
            let mut row = vec![listing.name, listing.status.to_string()];
            row.extend(listing.env);
            row.extend(listing.description);
            row
        })
        .collect();

    if !rows.is_empty() {
        println!("{}", table::plain(&rows));
    }
    Ok(ExitCodes::SUCCESS)
}
