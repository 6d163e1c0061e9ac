//! Fee estimation and instruction assembly collaborator.

use async_trait::async_trait;
use intent_types::{
	AssetDeployment, FeeEstimate, Instruction, SwapRequirement, TokenValue, WithdrawalRoute,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeError {
	/// The fee is larger than the payout. The estimator still reports the
	/// fee it would charge.
	#[error("Fee exceeds withdrawal amount")]
	FeeExceedsAmount { capped: FeeEstimate },
	#[error("Fee estimation failed: {0}")]
	Failed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
	#[error("Instruction assembly failed: {0}")]
	Failed(String),
}

/// Everything decided about a cross-chain payout before instructions exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalPlan {
	pub route: WithdrawalRoute,
	pub destination: AssetDeployment,
	pub recipient: String,
	pub memo: Option<String>,
	/// Direct amount plus swap output, at the destination precision.
	pub total: TokenValue,
	pub fee: FeeEstimate,
	/// What the recipient gets: `total` less the fee.
	pub received: TokenValue,
	pub swap: Option<SwapRequirement>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WithdrawalBuilderInterface: Send + Sync {
	async fn estimate_fee(
		&self,
		route: &WithdrawalRoute,
		asset: &AssetDeployment,
		amount: &TokenValue,
		recipient: &str,
	) -> Result<FeeEstimate, FeeError>;

	async fn build_instructions(&self, plan: &WithdrawalPlan) -> Result<Vec<Instruction>, BuildError>;
}
