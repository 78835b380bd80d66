// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries manifests and SBOMs
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Go(args)) => commands::cmd_collect("go", &args),
        Some(Commands::Mvn(args)) => commands::cmd_collect("mvn", &args),
        Some(Commands::Gradle(args)) => commands::cmd_collect("gradle", &args),
        Some(Commands::Npm(args)) => commands::cmd_collect("npm", &args),
        Some(Commands::Nuget(args)) => commands::cmd_collect("nuget", &args),
        Some(Commands::Dotnet(args)) => commands::cmd_collect("dotnet", &args),
        Some(Commands::Yarn(args)) => commands::cmd_collect("yarn", &args),
        Some(Commands::Pip(args)) => commands::cmd_collect("pip", &args),
        Some(Commands::Pipenv(args)) => commands::cmd_collect("pipenv", &args),
        Some(Commands::Twine(args)) => commands::cmd_collect("twine", &args),
        Some(Commands::Merge { manifests, output }) => {
            commands::cmd_merge(manifests.as_slice(), output.as_deref())
        }
        Some(Commands::Verify { actual, expected }) => commands::cmd_verify(&actual, &expected),
        Some(Commands::Export {
            manifest,
            format,
            output,
        }) => commands::cmd_export(&manifest, &format, output.as_deref()),
        None => {
            // No command provided, show help
            println!("buildinfo v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'buildinfo --help' for usage information");
            Ok(())
        }
    }
}
