//! Render command - print the declarations a run would submit
//!
//! Runs the full orchestration against the in-memory backend, so every
//! validation a real install performs applies here too.

use std::sync::Arc;

use clap::Args;

use certchain_core::{Orchestrator, ProvisioningDefaults, RecordingBackend};

use super::{OutputFormat, RequestArgs};
use crate::Result;

/// Print the ordered declarations without contacting a cluster
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,
}

/// Run the chain in memory and serialize what was submitted
pub async fn render(args: &RenderArgs, defaults: ProvisioningDefaults) -> Result<String> {
    let backend = Arc::new(RecordingBackend::new());
    let orchestrator = Orchestrator::new(&args.request.name, defaults, backend.clone());
    orchestrator.run(&args.request.to_request()).await?;

    let declarations = backend.submitted();
    Ok(match args.output {
        OutputFormat::Yaml => serde_yaml::to_string(&declarations)?,
        OutputFormat::Json => serde_json::to_string_pretty(&declarations)?,
    })
}

pub async fn run(args: RenderArgs, defaults: ProvisioningDefaults) -> Result<()> {
    let output = render(&args, defaults).await?;
    println!("{}", output);
    Ok(())
}
