use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nsxt_dhcp::config::{self, DriverConfig};
use nsxt_dhcp::{Ensurer, HttpNsxClient};

#[derive(Parser)]
#[command(name = "nsxt-dhcp")]
#[command(about = "Provision the NSX-T DHCP topology of a worker subnet", long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "nsxt-dhcp.json")]
    config: PathBuf,

    /// Path to the JSON state file
    #[arg(short, long, default_value = "nsxt-dhcp.state.json")]
    state: PathBuf,

    /// NSX-T password, overrides the config file
    #[arg(long, env = "NSXT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the DHCP objects
    Ensure {
        /// Policy path of the worker segment, stored in the state
        #[arg(long)]
        segment_path: Option<String>,
    },

    /// Delete all owned DHCP objects
    Delete,

    /// Print the task order and the current state
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nsxt_dhcp=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut driver = DriverConfig::load(&cli.config).await?;
    if let Some(password) = cli.password {
        driver.nsx.password = password;
    }
    let spec = driver.infra.to_spec();
    let mut state = config::load_state(&cli.state).await?;

    let client = HttpNsxClient::new(&driver.nsx).context("Failed to build NSX-T client")?;
    info!(manager = client.base_url(), cluster = %spec.full_cluster_name(), "Using NSX-T Manager");
    let ensurer = Ensurer::new(Arc::new(client));

    let result = match cli.command {
        Commands::Ensure { segment_path } => {
            if segment_path.is_some() {
                state.segment_path = segment_path;
            }
            ensurer.ensure_all(&spec, &mut state).await.map(|()| {
                info!("DHCP topology is up to date");
            })
        }
        Commands::Delete => ensurer
            .ensure_all_deleted(&spec, &mut state)
            .await
            .map(|deleted| {
                if deleted {
                    info!("DHCP objects deleted");
                } else {
                    info!("Nothing to delete");
                }
            }),
        Commands::Show => {
            println!("Tasks: {}", ensurer.task_labels().join(" -> "));
            println!("{}", serde_json::to_string_pretty(&state)?);
            return Ok(());
        }
    };

    // Progress made before a failure must survive for the next pass.
    config::save_state(&cli.state, &state).await?;

    if let Err(e) = result {
        if e.is_retryable() {
            error!("{}, retry later", e);
        } else {
            error!("{}", e);
        }
        return Err(e.into());
    }
    Ok(())
}
