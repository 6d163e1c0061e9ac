use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use intent_config::{ConfigLoader, EngineConfig};
use intent_types::{AssetDeployment, BridgeKind};
use intent_withdrawal::RouteSelector;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "intent-engine")]
#[command(about = "Intent orchestration engine tools", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Path to configuration file
	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	/// Log level override (trace, debug, info, warn, error)
	#[arg(long, env = "INTENT_LOG_LEVEL")]
	log_level: Option<String>,

	/// Emit logs as JSON
	#[arg(long)]
	json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Validate the configuration file
	Validate,
	/// Show the withdrawal route the configuration selects for a chain
	Routes {
		#[arg(long)]
		chain: String,
		/// Bridge of the destination deployment, used for external chains
		#[arg(long, value_enum, default_value_t = BridgeArg::Poa)]
		bridge: BridgeArg,
	},
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BridgeArg {
	Direct,
	Poa,
	Omni,
	Hot,
}

impl From<BridgeArg> for BridgeKind {
	fn from(arg: BridgeArg) -> Self {
		match arg {
			BridgeArg::Direct => BridgeKind::Direct,
			BridgeArg::Poa => BridgeKind::Poa,
			BridgeArg::Omni => BridgeKind::Omni,
			BridgeArg::Hot => BridgeKind::Hot,
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

	let log_level = cli
		.log_level
		.clone()
		.unwrap_or_else(|| config.engine.log_level.clone());
	setup_tracing(&log_level, cli.json_logs)?;

	match cli.command {
		Commands::Validate => validate_config(&cli.config, &config),
		Commands::Routes { chain, bridge } => show_route(&config, &chain, bridge.into()),
	}
}

fn validate_config(path: &Path, config: &EngineConfig) -> Result<()> {
	info!("Configuration {:?} is valid", path);
	info!("Engine name: {}", config.engine.name);
	info!(
		"Quotes: wait budget {:?}, min deadline {:?}, app fee {} bps, throttle {:?}",
		config.quote.wait_budget(),
		config.quote.min_deadline(),
		config.quote.app_fee_bps,
		config.quote.throttle_interval()
	);
	info!(
		"Routes: internal {}, native {}, virtual [{}]",
		config.routes.internal_chain,
		config.routes.native_chain,
		config
			.routes
			.virtual_chains
			.iter()
			.map(|chain| chain.to_string())
			.collect::<Vec<_>>()
			.join(", ")
	);
	for (deployment, minimum) in config.bridge.parsed_min_withdrawals() {
		info!("  Minimum withdrawal for {}: {}", deployment, minimum);
	}
	Ok(())
}

fn show_route(config: &EngineConfig, chain: &str, bridge: BridgeKind) -> Result<()> {
	let selector = RouteSelector::new(
		config.routes.internal_chain.clone(),
		config.routes.native_chain.clone(),
		config.routes.virtual_chains.iter().cloned(),
	);
	let destination = AssetDeployment::new("cli-destination", "ANY", 0, chain, bridge);
	let route = selector.select(&destination);

	info!(%chain, %bridge, "Selected route");
	println!(
		"{}",
		serde_json::to_string_pretty(&route).context("Failed to render route")?
	);
	Ok(())
}

fn setup_tracing(log_level: &str, json: bool) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	let registry = tracing_subscriber::registry().with(env_filter);
	if json {
		registry
			.with(tracing_subscriber::fmt::layer().json())
			.try_init()
			.context("Failed to install JSON log subscriber")?;
	} else {
		registry
			.with(tracing_subscriber::fmt::layer())
			.try_init()
			.context("Failed to install log subscriber")?;
	}

	Ok(())
}
