//! Asset deployment and asset family types.
//!
//! A deployment is one chain-specific representation of an asset. A family
//! groups the deployments a user sees as a single asset (for example USDC on
//! several chains).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a single asset deployment, e.g. `nep141:usdc.near`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(pub String);

impl DeploymentId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for DeploymentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for DeploymentId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

/// Chain identifier as used in configuration, e.g. `eth:1` or `near`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl ChainId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ChainId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for ChainId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

/// Bridge through which a deployment reaches its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeKind {
	/// Asset lives natively on the engine's own chain.
	Direct,
	/// Proof-of-authority bridge; publishes a minimum withdrawal per asset.
	Poa,
	/// Omni bridge.
	Omni,
	/// HOT bridge.
	Hot,
}

impl BridgeKind {
	/// Whether the bridge publishes a minimum withdrawal amount.
	pub fn has_published_minimum(&self) -> bool {
		matches!(self, BridgeKind::Poa)
	}
}

impl fmt::Display for BridgeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Direct => write!(f, "direct"),
			Self::Poa => write!(f, "poa"),
			Self::Omni => write!(f, "omni"),
			Self::Hot => write!(f, "hot"),
		}
	}
}

/// A single on-chain representation of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDeployment {
	pub id: DeploymentId,
	pub symbol: String,
	/// Fixed per deployment; never inferred from amounts.
	pub decimals: u8,
	pub chain: ChainId,
	pub bridge: BridgeKind,
}

impl AssetDeployment {
	pub fn new(
		id: impl Into<DeploymentId>,
		symbol: impl Into<String>,
		decimals: u8,
		chain: impl Into<ChainId>,
		bridge: BridgeKind,
	) -> Self {
		Self {
			id: id.into(),
			symbol: symbol.into(),
			decimals,
			chain: chain.into(),
			bridge,
		}
	}
}

/// A user-facing asset resolving to one or many deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetFamily {
	/// Exactly one deployment.
	Base(AssetDeployment),
	/// Deployments sharing an identity across chains, in preference order.
	Unified {
		symbol: String,
		deployments: Vec<AssetDeployment>,
	},
}

impl AssetFamily {
	/// Builds a unified family, dropping repeated deployment ids while keeping
	/// the first occurrence.
	pub fn unified(symbol: impl Into<String>, deployments: Vec<AssetDeployment>) -> Self {
		let mut unique: Vec<AssetDeployment> = Vec::with_capacity(deployments.len());
		for deployment in deployments {
			if !unique.iter().any(|d| d.id == deployment.id) {
				unique.push(deployment);
			}
		}
		AssetFamily::Unified {
			symbol: symbol.into(),
			deployments: unique,
		}
	}

	pub fn symbol(&self) -> &str {
		match self {
			AssetFamily::Base(deployment) => &deployment.symbol,
			AssetFamily::Unified { symbol, .. } => symbol,
		}
	}

	/// Underlying deployments in preference order.
	pub fn deployments(&self) -> &[AssetDeployment] {
		match self {
			AssetFamily::Base(deployment) => std::slice::from_ref(deployment),
			AssetFamily::Unified { deployments, .. } => deployments,
		}
	}

	pub fn contains(&self, id: &DeploymentId) -> bool {
		self.deployments().iter().any(|d| &d.id == id)
	}

	pub fn deployment_on(&self, chain: &ChainId) -> Option<&AssetDeployment> {
		self.deployments().iter().find(|d| &d.chain == chain)
	}
}

impl From<AssetDeployment> for AssetFamily {
	fn from(deployment: AssetDeployment) -> Self {
		AssetFamily::Base(deployment)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn usdc(chain: &str, decimals: u8) -> AssetDeployment {
		AssetDeployment::new(
			format!("usdc-{}", chain).as_str(),
			"USDC",
			decimals,
			chain,
			BridgeKind::Poa,
		)
	}

	#[test]
	fn test_unified_family_deduplicates() {
		let family = AssetFamily::unified(
			"USDC",
			vec![usdc("eth", 6), usdc("sol", 6), usdc("eth", 6)],
		);
		assert_eq!(family.deployments().len(), 2);
		assert_eq!(family.symbol(), "USDC");
		assert!(family.contains(&DeploymentId::new("usdc-sol")));
		assert_eq!(
			family.deployment_on(&ChainId::new("sol")).map(|d| d.decimals),
			Some(6)
		);
	}

	#[test]
	fn test_base_family_has_single_deployment() {
		let family: AssetFamily = usdc("eth", 6).into();
		assert_eq!(family.deployments().len(), 1);
		assert!(family.deployment_on(&ChainId::new("sol")).is_none());
	}

	#[test]
	fn test_only_poa_publishes_minimum() {
		assert!(BridgeKind::Poa.has_published_minimum());
		assert!(!BridgeKind::Omni.has_published_minimum());
		assert!(!BridgeKind::Hot.has_published_minimum());
		assert!(!BridgeKind::Direct.has_published_minimum());
	}
}
