//! Rule Router - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use rule_router::{RouterConfig, RuleEngine};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "rule-router",
    about = "Header-rule matching server - routes requests to canned JSON responses",
    version
)]
struct Args {
    /// Path to the rules file (JSON or YAML)
    #[arg(short, long, default_value = "rules.json")]
    config: PathBuf,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8081")]
    listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print an example rules file and exit
    #[arg(long)]
    print_config: bool,

    /// Validate the rules file and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print example rules if requested
    if args.print_config {
        let example = include_str!("../demos/rules.yaml");
        println!("{}", example);
        return Ok(());
    }

    // Load the rules file; any failure here is fatal
    info!(path = ?args.config, "Loading rules");
    let config = RouterConfig::from_file(&args.config)?;

    if args.validate {
        println!("Rules file is valid ({} rules defined)", config.rules.len());
        return Ok(());
    }

    let settings = config.settings.clone();
    let engine = Arc::new(RuleEngine::new(config));

    let listener = TcpListener::bind(args.listen).await?;
    rule_router::server::serve(engine, settings, listener).await?;

    Ok(())
}
