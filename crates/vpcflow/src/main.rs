mod commands;
mod output;
mod session;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use vpcflow_cloud::Mode;

#[derive(Parser)]
#[command(name = "vpcflow")]
#[command(about = "Provision and tear down VPC topologies from YAML", long_about = None)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (endpoints, API version, wait limits)
    #[arg(long, global = true, env = "VPCFLOW_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create every resource of the topology that does not exist yet
    Provision {
        /// Topology file
        #[arg(short = 'y', long = "yaml")]
        yaml: Option<PathBuf>,
        /// Credentials file holding [API] apikey
        #[arg(short = 'k', long = "apikey")]
        apikey: Option<PathBuf>,
    },
    /// Delete every resource of the topology that still exists
    Destroy {
        /// Topology file
        #[arg(short = 'y', long = "yaml")]
        yaml: Option<PathBuf>,
        /// Credentials file holding [API] apikey
        #[arg(short = 'k', long = "apikey")]
        apikey: Option<PathBuf>,
    },
    /// Print the ordered operations without calling the provider
    Plan {
        /// Direction of the run
        #[arg(value_enum)]
        mode: PlanMode,
        /// Topology file
        #[arg(short = 'y', long = "yaml")]
        yaml: Option<PathBuf>,
    },
    /// Manage custom routes of an existing VPC
    Route {
        #[command(subcommand)]
        action: RouteAction,
    },
    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlanMode {
    Create,
    Destroy,
}

impl From<PlanMode> for Mode {
    fn from(mode: PlanMode) -> Self {
        match mode {
            PlanMode::Create => Mode::Create,
            PlanMode::Destroy => Mode::Destroy,
        }
    }
}

#[derive(clap::Args, Clone)]
struct RouteTarget {
    /// VPC name
    #[arg(long)]
    vpc: String,
    /// Region the VPC lives in
    #[arg(short, long, env = "IC_REGION")]
    region: String,
    /// API generation (1 or 2)
    #[arg(short, long, env = "IC_GENERATION", default_value = "2")]
    generation: u8,
    /// API key
    #[arg(short = 'k', long, env = "IC_API_KEY", hide_env_values = true)]
    apikey: String,
}

#[derive(Subcommand)]
enum RouteAction {
    /// List the custom routes of the VPC
    List {
        #[command(flatten)]
        target: RouteTarget,
    },
    /// Add a route (no-op when it already exists)
    Add {
        #[command(flatten)]
        target: RouteTarget,
        #[arg(short, long, default_value = "us-south-1")]
        zone: String,
        #[arg(short, long)]
        destination: String,
        #[arg(short = 'n', long = "next-hop")]
        next_hop: String,
    },
    /// Delete a route (no-op when it is already gone)
    Delete {
        #[command(flatten)]
        target: RouteTarget,
        #[arg(short, long, default_value = "us-south-1")]
        zone: String,
        #[arg(short, long)]
        destination: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings.as_deref();
    match cli.command {
        Commands::Provision { yaml, apikey } => {
            commands::run::handle(Mode::Create, yaml.as_deref(), apikey.as_deref(), settings).await
        }
        Commands::Destroy { yaml, apikey } => {
            commands::run::handle(Mode::Destroy, yaml.as_deref(), apikey.as_deref(), settings)
                .await
        }
        Commands::Plan { mode, yaml } => commands::plan::handle(mode.into(), yaml.as_deref()),
        Commands::Route { action } => commands::route::handle(action, settings).await,
        Commands::Version => {
            println!("vpcflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = dispatch(cli).await {
        eprintln!();
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
