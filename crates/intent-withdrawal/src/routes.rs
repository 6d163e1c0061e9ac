//! Destination chain classification.

use intent_types::{AssetDeployment, ChainId, WithdrawalRoute};
use std::collections::HashSet;

/// Maps a destination deployment to the route its payout takes.
#[derive(Debug, Clone)]
pub struct RouteSelector {
	internal_chain: ChainId,
	native_chain: ChainId,
	virtual_chains: HashSet<ChainId>,
}

impl RouteSelector {
	pub fn new(
		internal_chain: ChainId,
		native_chain: ChainId,
		virtual_chains: impl IntoIterator<Item = ChainId>,
	) -> Self {
		Self {
			internal_chain,
			native_chain,
			virtual_chains: virtual_chains.into_iter().collect(),
		}
	}

	pub fn is_internal(&self, chain: &ChainId) -> bool {
		chain == &self.internal_chain
	}

	/// Route for a chain, with `bridge` taken from the destination deployment
	/// when the chain is external.
	pub fn select(&self, destination: &AssetDeployment) -> WithdrawalRoute {
		let chain = &destination.chain;
		if self.is_internal(chain) {
			WithdrawalRoute::InternalTransfer
		} else if chain == &self.native_chain {
			WithdrawalRoute::NativeChain
		} else if self.virtual_chains.contains(chain) {
			WithdrawalRoute::VirtualChain {
				chain: chain.clone(),
			}
		} else {
			WithdrawalRoute::Bridge {
				chain: chain.clone(),
				bridge: destination.bridge,
			}
		}
	}
}
