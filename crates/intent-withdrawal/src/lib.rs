//! Withdrawal preparation.
//!
//! Given a requested payout, the [`WithdrawalPreparer`] decides how much can
//! be paid straight from the destination deployment, sources the rest through
//! a quote, applies fees and minimum payout rules, and asks the builder
//! collaborator for the final instructions.

use intent_quote::QuoteError;
use intent_types::{AmountError, DeploymentId, ErrorCode, TokenValue};
use thiserror::Error;

pub mod balance;
pub mod bridge;
pub mod builder;
pub mod preparer;
pub mod routes;

pub use balance::{BalanceCache, BalanceError, BalanceInterface, BalanceSource};
pub use bridge::{BridgeInfoError, BridgeInfoInterface, StaticBridgeInfo};
pub use builder::{BuildError, FeeError, WithdrawalBuilderInterface, WithdrawalPlan};
pub use preparer::{QuoteSettings, WithdrawalPreparer};
pub use routes::RouteSelector;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WithdrawalError {
	#[error("Failed to fetch balances: {0}")]
	BalanceFetch(String),

	#[error("Balance unknown for {unknown:?}; known total {available} below {requested}")]
	BalanceMissing {
		unknown: Vec<DeploymentId>,
		requested: TokenValue,
		available: TokenValue,
	},

	#[error("Insufficient balance: requested {requested}, available {available}")]
	BalanceInsufficient {
		requested: TokenValue,
		available: TokenValue,
	},

	#[error("Failed to estimate withdrawal fee: {0}")]
	FeeFetch(String),

	#[error("Amount too low: receiving {received} of {asset}, minimum {minimum} (short by {shortfall})")]
	AmountTooLow {
		shortfall: TokenValue,
		received: TokenValue,
		minimum: TokenValue,
		asset: DeploymentId,
	},

	#[error("Failed to fetch bridge info: {0}")]
	BridgeInfoFetch(String),

	#[error("Failed to build withdrawal: {0}")]
	Build(String),

	#[error("Withdrawal preparation cancelled")]
	Cancelled,

	#[error(transparent)]
	Quote(#[from] QuoteError),

	#[error("Amount error: {0}")]
	Amount(#[from] AmountError),
}

impl WithdrawalError {
	pub fn code(&self) -> ErrorCode {
		match self {
			WithdrawalError::BalanceFetch(_) => ErrorCode::BalanceFetch,
			WithdrawalError::BalanceMissing { .. } => ErrorCode::BalanceMissing,
			WithdrawalError::BalanceInsufficient { .. } => ErrorCode::BalanceInsufficient,
			WithdrawalError::FeeFetch(_) => ErrorCode::WithdrawalFeeFetch,
			WithdrawalError::AmountTooLow { .. } => ErrorCode::AmountTooLow,
			WithdrawalError::BridgeInfoFetch(_) => ErrorCode::BridgeInfoFetch,
			WithdrawalError::Build(_) | WithdrawalError::Amount(_) => ErrorCode::WithdrawalBuild,
			WithdrawalError::Cancelled => ErrorCode::Cancelled,
			WithdrawalError::Quote(e) => e.code(),
		}
	}

	pub fn retryable(&self) -> bool {
		self.code().retryable()
	}
}
