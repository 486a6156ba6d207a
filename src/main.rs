//! vwgen - VXLAN-over-WireGuard mesh configuration generator
//!
//! Reads `<network>.conf` from the configuration directory and prints the
//! WireGuard configuration of one node.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vwgen::config::Network;
use vwgen::error::Result;
use vwgen::{keys, showconf, NetworkModel};

/// vwgen - VXLAN-over-WireGuard mesh configuration generator
#[derive(Parser)]
#[command(name = "vwgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding `<network>.conf` files
    #[arg(short, long, env = "VWGEN_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the WireGuard configuration of a node
    Showconf {
        /// Network name
        network: String,

        /// Node name
        node: String,
    },

    /// Print the public key of a node
    Pubkey {
        /// Network name
        network: String,

        /// Node name
        node: String,
    },
}

fn main() {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let result = match &cli.command {
        Commands::Showconf { network, node } => run_showconf(&cli.config_dir, network, node),
        Commands::Pubkey { network, node } => run_pubkey(&cli.config_dir, network, node),
    };

    if let Err(e) = result {
        eprintln!("vwgen: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Initialize logging; stdout is reserved for generated output
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Compile and print a node configuration
fn run_showconf(config_dir: &Path, network_name: &str, node_name: &str) -> Result<()> {
    let network = Network::load(config_dir, network_name)?;
    let compiled = showconf::compile(&network, node_name)?;

    if !compiled.warnings.is_empty() {
        tracing::info!(
            "Compiled node '{}' with {} warning(s)",
            node_name,
            compiled.warnings.len()
        );
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(compiled.render().as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Print the public key derived from a node's private key
fn run_pubkey(config_dir: &Path, network_name: &str, node_name: &str) -> Result<()> {
    let network = Network::load(config_dir, network_name)?;
    let node = network.nodes().get(node_name).ok_or_else(|| vwgen::Error::NodeNotFound {
        network: network.network_id().to_string(),
        node: node_name.to_string(),
    })?;

    let private_key = node.private_key().ok_or_else(|| {
        vwgen::Error::Config(format!("Node '{}' has no PrivateKey", node_name))
    })?;
    let public_key = keys::public_key_base64(private_key).map_err(|e| {
        vwgen::Error::Config(format!("Node '{}' has incorrect PrivateKey: {}", node_name, e))
    })?;

    println!("{}", public_key);
    Ok(())
}
