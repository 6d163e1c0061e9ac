//! Bridge metadata: published minimum withdrawals.

use async_trait::async_trait;
use intent_types::{DeploymentId, U256};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeInfoError {
	#[error("Bridge info unavailable: {0}")]
	Unavailable(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BridgeInfoInterface: Send + Sync {
	/// Published minimum withdrawal for a deployment, in its smallest unit.
	/// `None` while unknown.
	fn min_withdrawal(&self, asset: &DeploymentId) -> Option<U256>;

	/// Asks the owning service to (re)load bridge metadata.
	fn request_fetch(&self);

	/// Resolves once the last requested fetch finished.
	async fn wait_ready(&self) -> Result<(), BridgeInfoError>;
}

/// Bridge metadata fixed at startup, usually from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticBridgeInfo {
	minimums: HashMap<DeploymentId, U256>,
}

impl StaticBridgeInfo {
	pub fn new(minimums: HashMap<DeploymentId, U256>) -> Self {
		Self { minimums }
	}
}

#[async_trait]
impl BridgeInfoInterface for StaticBridgeInfo {
	fn min_withdrawal(&self, asset: &DeploymentId) -> Option<U256> {
		self.minimums.get(asset).copied()
	}

	fn request_fetch(&self) {
		debug!("Static bridge info has nothing to fetch");
	}

	async fn wait_ready(&self) -> Result<(), BridgeInfoError> {
		Ok(())
	}
}
