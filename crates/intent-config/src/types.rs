//! Configuration types for the intent engine.

use intent_types::{ChainId, DeploymentId, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
	/// Engine identity and logging
	#[serde(default)]
	pub engine: EngineSettings,
	/// Quote aggregation settings
	#[serde(default)]
	pub quote: QuoteConfig,
	/// Chain classification used for withdrawal routing
	#[serde(default)]
	pub routes: RouteConfig,
	/// One-click swap defaults
	#[serde(default)]
	pub intent: IntentConfig,
	/// Bridge metadata known ahead of time
	#[serde(default)]
	pub bridge: BridgeConfig,
}

/// Engine identity and logging
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
	pub name: String,
	pub log_level: String,
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self {
			name: "intent-engine".to_string(),
			log_level: "info".to_string(),
		}
	}
}

/// Quote aggregation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuoteConfig {
	/// How long solvers may take to answer a quote request
	pub wait_budget_ms: u64,
	/// Minimum validity requested for each quote
	pub min_deadline_ms: u64,
	/// Application fee charged on swaps, in basis points
	pub app_fee_bps: u16,
	/// Cooldown between throttled quote requests
	pub throttle_interval_ms: u64,
}

impl Default for QuoteConfig {
	fn default() -> Self {
		Self {
			wait_budget_ms: 3_000,
			min_deadline_ms: 60_000,
			app_fee_bps: 0,
			throttle_interval_ms: 500,
		}
	}
}

impl QuoteConfig {
	pub fn wait_budget(&self) -> Duration {
		Duration::from_millis(self.wait_budget_ms)
	}

	pub fn min_deadline(&self) -> Duration {
		Duration::from_millis(self.min_deadline_ms)
	}

	pub fn throttle_interval(&self) -> Duration {
		Duration::from_millis(self.throttle_interval_ms)
	}
}

/// Chain classification used for withdrawal routing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
	/// The engine's own network; payouts here are plain transfers
	pub internal_chain: ChainId,
	/// The chain the engine settles on
	pub native_chain: ChainId,
	/// Chains hosted on the native chain that use a dedicated route
	pub virtual_chains: Vec<ChainId>,
}

impl Default for RouteConfig {
	fn default() -> Self {
		Self {
			internal_chain: ChainId::new("intents"),
			native_chain: ChainId::new("near"),
			virtual_chains: vec![ChainId::new("aurora")],
		}
	}
}

/// One-click swap defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntentConfig {
	pub slippage_bps: u16,
	/// Deadline requested for one-click swaps, from submission
	pub deadline_secs: u64,
}

impl Default for IntentConfig {
	fn default() -> Self {
		Self {
			slippage_bps: 100,
			deadline_secs: 600,
		}
	}
}

impl IntentConfig {
	pub fn deadline(&self) -> Duration {
		Duration::from_secs(self.deadline_secs)
	}
}

/// Bridge metadata known ahead of time
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BridgeConfig {
	/// Published minimum withdrawal per deployment, as integer strings in the
	/// deployment's smallest unit
	#[serde(default)]
	pub min_withdrawals: HashMap<DeploymentId, String>,
}

impl BridgeConfig {
	/// Parsed minimum withdrawals; entries that are not integers are skipped
	/// (the loader rejects them before this is reachable).
	pub fn parsed_min_withdrawals(&self) -> HashMap<DeploymentId, U256> {
		self.min_withdrawals
			.iter()
			.filter_map(|(id, value)| {
				U256::from_str_radix(value, 10)
					.ok()
					.map(|amount| (id.clone(), amount))
			})
			.collect()
	}
}
