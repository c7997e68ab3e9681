//! Config command.

use anyhow::Result;
use clap::{Args, ValueEnum};

use stacks_core::OutputFormat;

use super::GlobalArgs;
use crate::ExitCodes;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Yaml,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Yaml => OutputFormat::Yaml,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print only this property
    property: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "yaml")]
    output: Format,

    /// Override a config property (key=value), repeatable
    #[arg(short, long = "property")]
    property_override: Vec<String>,
}

pub fn execute(args: ConfigArgs, global: &GlobalArgs) -> Result<u8> {
    let config = global.load_config(&args.property_override)?;
    println!("{}", config.display(args.property.as_deref(), args.output.into())?);
    Ok(ExitCodes::SUCCESS)
}
