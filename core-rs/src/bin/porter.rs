//! Porter CLI
//!
//! Command-line interface for allocating local port blocks

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use porter_core::{
    Config, EphemeralRange, EphemeralRangeProvider, FixedRangeProvider, Porter,
    SysctlRangeProvider,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "porter")]
#[command(version)]
#[command(about = "Allocate blocks of locally-free TCP ports", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the host ephemeral port range
    Range {
        /// OS whose query to use (linux, darwin); defaults to this host
        #[arg(long)]
        os: Option<String>,
    },
    /// Allocate a block and print N free ports
    Take {
        /// Number of ports
        n: usize,
        #[command(flatten)]
        alloc: AllocArgs,
    },
    /// Allocate a block, print N free ports and hold the block until Ctrl+C
    Hold {
        /// Number of ports
        n: usize,
        #[command(flatten)]
        alloc: AllocArgs,
    },
}

#[derive(Args)]
struct AllocArgs {
    /// YAML config file (flags below override its values)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ports per block, anchor included
    #[arg(long)]
    block_size: Option<u32>,
    /// Maximum number of candidate blocks
    #[arg(long)]
    max_blocks: Option<u32>,
    /// Lowest port to allocate
    #[arg(long)]
    lower_bound: Option<u16>,
    /// OS whose ephemeral range query to use
    #[arg(long)]
    os: Option<String>,
    /// Skip the host query and use this ephemeral range (e.g. 32768-60999)
    #[arg(long)]
    ephemeral: Option<EphemeralRange>,
    /// Seed for block selection
    #[arg(long)]
    seed: Option<u64>,
    /// Print JSON instead of one port per line
    #[arg(long)]
    json: bool,
}

impl AllocArgs {
    fn to_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if let Some(max_blocks) = self.max_blocks {
            config.max_blocks = max_blocks;
        }
        if let Some(lower_bound) = self.lower_bound {
            config.lower_bound = lower_bound;
        }
        if let Some(os) = &self.os {
            config.os = Some(os.clone());
        }

        Ok(config)
    }

    fn allocate(&self) -> anyhow::Result<Porter> {
        let mut builder = Porter::builder(self.to_config()?);
        if let Some(range) = self.ephemeral {
            builder = builder.range_provider(FixedRangeProvider(range));
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder.build().context("Failed to allocate port block")
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_ports(porter: &Porter, ports: &[u16], json: bool) -> anyhow::Result<()> {
    if json {
        let output = serde_json::json!({
            "block": porter.block(),
            "firstPort": porter.first_port(),
            "blockSize": porter.block_size(),
            "ports": ports,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for port in ports {
            println!("{}", port);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Range { os } => {
            let os = os.unwrap_or_else(|| std::env::consts::OS.to_string());
            let range = SysctlRangeProvider::new().ephemeral_range(&os)?;
            println!("{}", range);
        }

        Commands::Take { n, alloc } => {
            let porter = alloc.allocate()?;
            let ports = porter.take(n)?;
            print_ports(&porter, &ports, alloc.json)?;
            porter.close();
        }

        Commands::Hold { n, alloc } => {
            let porter = alloc.allocate()?;
            let ports = porter.take(n)?;
            print_ports(&porter, &ports, alloc.json)?;

            // Create shutdown flag
            let shutdown = Arc::new(AtomicBool::new(false));
            let shutdown_clone = shutdown.clone();

            // Set up SIGTERM/SIGINT handler
            ctrlc::set_handler(move || {
                shutdown_clone.store(true, Ordering::SeqCst);
            })?;

            tracing::info!(
                first_port = porter.first_port(),
                "Holding port block, press Ctrl+C to release"
            );
            while !shutdown.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }

            porter.close();
        }
    }

    Ok(())
}
