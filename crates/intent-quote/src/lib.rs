//! Quote aggregation for the intent engine.
//!
//! The [`QuoteAggregator`] splits a desired amount across candidate source
//! deployments and prices each allocation against the solver network. The
//! [`QuoteStream`] wraps any [`QuoteProvider`] in a long-lived, throttled
//! background task so that rapidly changing inputs do not flood the pricing
//! service.

use async_trait::async_trait;
use intent_types::{
	AmountError, AssetDeployment, DeploymentId, ErrorCode, OneClickQuoteRequest,
	OneClickQuoteResult, QuoteLeg, QuoteRequest, TokenValue,
};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod aggregator;
pub mod stream;

pub use aggregator::QuoteAggregator;
pub use stream::{QuoteKey, QuoteStream, QuoteStreamHandle, QuoteStreamUpdate};

pub use intent_types::AggregatedQuote;

/// Failure of the pricing collaborator itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
	#[error("Pricing transport error: {0}")]
	Transport(String),
	#[error("Pricing request rejected: {0}")]
	Rejected(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuoteError {
	/// Not a single allocation could be priced.
	#[error("No quotes available")]
	NoQuotes,
	#[error("Quote request cancelled")]
	Cancelled,
	#[error("Quote stream closed")]
	StreamClosed,
	/// A newer request for a different input took over the stream.
	#[error("Quote request superseded by a newer input")]
	Superseded,
	#[error("Amount error: {0}")]
	Amount(#[from] AmountError),
}

impl QuoteError {
	pub fn code(&self) -> ErrorCode {
		match self {
			QuoteError::Cancelled => ErrorCode::Cancelled,
			QuoteError::NoQuotes
			| QuoteError::StreamClosed
			| QuoteError::Superseded
			| QuoteError::Amount(_) => ErrorCode::NoQuotes,
		}
	}

	pub fn retryable(&self) -> bool {
		self.code().retryable()
	}
}

/// The solver network's pricing service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingInterface: Send + Sync {
	/// Prices one allocation. `Ok(None)` and an empty list both mean no solver
	/// answered.
	async fn quote(&self, request: &QuoteRequest) -> Result<Option<Vec<QuoteLeg>>, PricingError>;

	/// Requests a single combined quote with a deposit address.
	async fn quote_one_click(
		&self,
		request: &OneClickQuoteRequest,
	) -> Result<OneClickQuoteResult, PricingError>;
}

/// Everything the aggregator needs to price a split conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuoteInput {
	/// Desired input amount, in any reference precision.
	pub amount: TokenValue,
	/// Source deployments in preference order.
	pub candidates: Vec<AssetDeployment>,
	pub destination: AssetDeployment,
	/// Known balances per source deployment. Missing entries count as zero.
	pub balances: HashMap<DeploymentId, TokenValue>,
	pub wait_budget: Duration,
	pub min_deadline: Duration,
	pub app_fee_bps: u16,
}

/// Anything able to turn an [`AggregateQuoteInput`] into an aggregated quote.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
	async fn quote(
		&self,
		input: AggregateQuoteInput,
		cancel: CancellationToken,
	) -> Result<AggregatedQuote, QuoteError>;
}
