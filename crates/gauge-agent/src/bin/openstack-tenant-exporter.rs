//! Main binary for the OpenStack tenant exporter

use clap::{Parser, Subcommand};
use gauge_agent::{init_logging, Agent, AgentConfig, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "openstack-tenant-exporter")]
#[command(about = "Prometheus exporter for OpenStack tenant quotas and inventory")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Address to serve metrics on
    #[arg(long, value_name = "ADDR", global = true)]
    bind: Option<SocketAddr>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve metrics, collecting on every scrape (default)
    Run,
    /// Run one collection pass and print the metrics
    Once,
    /// Generate default configuration
    Config {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { ref output }) => generate_config(output.clone()),
        Some(Commands::Validate) => validate_config(&cli),
        Some(Commands::Once) => collect_once(&cli).await,
        Some(Commands::Run) | None => run_exporter(&cli).await,
    }
}

fn load_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = AgentConfig::load(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    if let Some(bind) = cli.bind {
        config.core.server.bind_addr = bind;
    }

    config.validate()?;
    Ok(config)
}

async fn connect(config: AgentConfig) -> Agent {
    match Agent::connect(config).await {
        Ok(agent) => agent,
        Err(e) => {
            error!("Failed to connect to OpenStack: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_exporter(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    init_logging(&config.logging)?;

    info!("Starting OpenStack tenant exporter");
    let agent = connect(config).await;

    if let Err(e) = agent.run().await {
        error!("Exporter failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn collect_once(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    init_logging(&config.logging)?;

    let agent = connect(config).await;
    let text = agent.collect_once().await?;
    print!("{}", text);

    if let Some(report) = agent.registry().last_report() {
        for failed in report.failed() {
            error!(
                "{} failed: {}",
                failed.subsystem,
                failed.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn generate_config(output: Option<PathBuf>) -> Result<()> {
    let config = AgentConfig::default();

    if let Some(output_path) = output {
        config.to_file(&output_path)?;
        println!("Generated configuration file: {}", output_path.display());
    } else {
        println!("{}", config.to_yaml()?);
    }

    Ok(())
}

fn validate_config(cli: &Cli) -> Result<()> {
    if let Some(ref path) = cli.config {
        println!("Validating configuration: {}", path.display());
    }

    let config = load_config(cli)?;

    println!("Configuration is valid");
    match config.core.openstack.cloud {
        Some(ref cloud) => println!("Cloud: {}", cloud),
        None if config.core.openstack.auth.is_some() => println!("Cloud: inline credentials"),
        None => println!("Cloud: from OS_CLOUD"),
    }
    println!(
        "Metrics: http://{}{}",
        config.core.server.bind_addr, config.core.server.metrics_path
    );
    println!("Collector timeout: {}s", config.core.collector.timeout_seconds);

    Ok(())
}
