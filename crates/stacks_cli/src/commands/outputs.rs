//! Outputs command.

use anyhow::Result;
use clap::Args;

use stacks_core::StackQueries;

use super::GlobalArgs;
use crate::table;
use crate::ExitCodes;

#[derive(Args, Debug)]
pub struct OutputsArgs {
    /// Stack name
    name: String,

    /// Print only the value of this output
    output: Option<String>,
}

pub async fn execute(args: OutputsArgs, global: &GlobalArgs) -> Result<u8> {
    let session = global.session()?;
    let outputs = StackQueries::new(session.client)
        .outputs(&args.name, args.output.as_deref())
        .await?;

    let rows: Vec<Vec<String>> = match args.output {
        Some(_) => outputs.into_iter().map(|o| vec![o.value]).collect(),
        None => outputs.into_iter().map(|o| vec![o.key, o.value]).collect(),
    };
    if !rows.is_empty() {
        println!("{}", table::plain(&rows));
    }
    Ok(ExitCodes::SUCCESS)
}
