use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use vectorq_cli::{
    cli::{Cli, Commands},
    commands, config,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the rendered output
    let level = cli.level();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vectorq={level},vectorq_cli={level}")));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();

    let config = config::load(cli.config)?;
    debug!(policy = ?config.render.operator_policy, "configuration loaded");

    let output = match cli.command {
        Commands::Render {
            dialect,
            query,
            raw,
            pretty,
        } => {
            let query = commands::read_query(&query)?;
            commands::render(&config, dialect, &query, raw, pretty)?
        }
        Commands::Validate { query } => {
            let query = commands::read_query(&query)?;
            commands::validate(&config, &query)?
        }
        Commands::Capabilities { dialect } => commands::capabilities(&config, dialect)?,
        Commands::Config => config::display_as_toml(&config)?,
    };

    println!("{}", output.trim_end());
    Ok(())
}
