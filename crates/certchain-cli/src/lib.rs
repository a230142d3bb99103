//! certchain CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

use certchain_core::ProvisioningDefaults;

/// certchain - cert-manager and ACME ClusterIssuer provisioning
#[derive(Parser, Debug)]
#[command(name = "certchain")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision cert-manager and the ClusterIssuer on a cluster
    Install(commands::install::InstallArgs),
    /// Print the declarations a run would submit, without touching a cluster
    Render(commands::render::RenderArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let defaults = ProvisioningDefaults::from_env();
        match self.command {
            Commands::Install(args) => commands::install::run(args, defaults).await,
            Commands::Render(args) => commands::render::run(args, defaults).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::OutputFormat;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_render_with_bare_staging_flag() {
        let cli = Cli::try_parse_from([
            "certchain",
            "render",
            "--project",
            "proj",
            "--email",
            "ops@example.com",
            "--staging",
            "--output",
            "json",
        ])
        .unwrap();
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.request.staging, Some(true));
        assert_eq!(args.output, OutputFormat::Json);
        assert_eq!(args.request.name, "cert-manager");
    }

    #[test]
    fn parses_install_with_explicit_overrides() {
        let cli = Cli::try_parse_from([
            "certchain",
            "install",
            "--name",
            "materya",
            "--project",
            "proj",
            "--email",
            "ops@example.com",
            "--staging=false",
            "--controller-version",
            "v1.2.3",
            "--repository",
            "https://mirror.example",
            "--kubeconfig",
            "/tmp/kubeconfig",
        ])
        .unwrap();
        let Commands::Install(args) = cli.command else {
            panic!("expected install");
        };
        assert_eq!(args.request.name, "materya");
        assert_eq!(args.request.staging, Some(false));
        assert_eq!(args.request.controller_version.as_deref(), Some("v1.2.3"));
        assert_eq!(
            args.kubeconfig.as_deref(),
            Some(std::path::Path::new("/tmp/kubeconfig"))
        );
    }

    #[test]
    fn staging_defaults_to_unset() {
        let cli =
            Cli::try_parse_from(["certchain", "render", "--project", "p", "--email", "e"]).unwrap();
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.request.staging, None);
        assert_eq!(args.output, OutputFormat::Yaml);
    }
}
