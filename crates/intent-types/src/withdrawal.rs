//! Withdrawal preparation types.

use crate::{AggregatedQuote, AssetDeployment, AssetFamily, BridgeKind, ChainId, DeploymentId, TokenValue};
use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// A payout request as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRequest {
	/// Asset the payout is funded from.
	pub asset: AssetFamily,
	/// Requested payout, in the precision the caller entered it.
	pub amount: TokenValue,
	/// Deployment the recipient receives.
	pub destination: AssetDeployment,
	pub recipient: String,
	pub memo: Option<String>,
	/// Caller-supplied minimum received amount, if any.
	pub min_received: Option<TokenValue>,
}

/// How the payout leaves the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WithdrawalRoute {
	/// Transfer inside the engine's own network; no bridging, no fee.
	InternalTransfer,
	/// Withdrawal to the engine's native chain.
	NativeChain,
	/// Withdrawal to a virtual chain hosted on the native chain.
	VirtualChain { chain: ChainId },
	/// Withdrawal through an external bridge.
	Bridge { chain: ChainId, bridge: BridgeKind },
}

/// Fee quoted by the withdrawal builder, denominated in the payout asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
	pub amount: TokenValue,
	/// Route-specific data the builder needs back when assembling instructions.
	#[serde(default)]
	pub details: serde_json::Value,
}

impl FeeEstimate {
	pub fn zero(decimals: u8) -> Self {
		Self {
			amount: TokenValue::zero(decimals),
			details: serde_json::Value::Null,
		}
	}
}

/// Portion of a payout that must be converted from other deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequirement {
	/// Amount that had to be sourced elsewhere, at the requested precision.
	pub amount_needed: TokenValue,
	pub sources: Vec<DeploymentId>,
	pub destination: DeploymentId,
	pub quote: AggregatedQuote,
	/// Credited amount at the destination precision.
	pub amount_out: TokenValue,
}

/// An unsigned instruction ready to be wrapped in an intent and signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
	/// Transfer within the engine's network.
	Transfer {
		asset: DeploymentId,
		#[serde(with = "crate::serde_helpers::u256_decimal")]
		amount: U256,
		recipient: String,
		memo: Option<String>,
	},
	/// Withdrawal out of the engine's network.
	Withdraw {
		route: WithdrawalRoute,
		asset: DeploymentId,
		#[serde(with = "crate::serde_helpers::u256_decimal")]
		amount: U256,
		recipient: String,
		memo: Option<String>,
		#[serde(with = "crate::serde_helpers::u256_decimal")]
		fee: U256,
		#[serde(default)]
		payload: serde_json::Value,
	},
}

/// Outcome of a successful withdrawal preparation. Immutable; a new attempt
/// produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedWithdrawal {
	/// Amount paid from the destination deployment's own balance.
	pub direct_amount: TokenValue,
	/// `None` when no conversion was needed.
	pub swap: Option<SwapRequirement>,
	pub fee: FeeEstimate,
	/// Amount the recipient ends up with after fees.
	pub received_amount: TokenValue,
	pub route: WithdrawalRoute,
	pub instructions: Vec<Instruction>,
}
