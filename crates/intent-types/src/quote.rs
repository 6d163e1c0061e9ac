//! Price quotation types.
//!
//! A [`QuoteLeg`] is one priced source-to-destination conversion returned by
//! the solver network. An [`AggregatedQuote`] is the union of the legs that
//! together cover a split request.

use crate::{AssetDeployment, DeploymentId};
use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request for executable prices on a single allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
	pub asset_in: DeploymentId,
	pub asset_out: DeploymentId,
	/// Exact amount in, in the smallest unit of `asset_in`.
	pub exact_amount_in: U256,
	/// Minimum validity the returned quotes must offer.
	pub min_deadline: Duration,
	/// How long the pricing service may wait for solver responses.
	pub wait_budget: Duration,
	pub app_fee_bps: u16,
}

/// One priced conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLeg {
	pub quote_hash: String,
	pub asset_in: DeploymentId,
	pub asset_out: DeploymentId,
	#[serde(with = "crate::serde_helpers::u256_decimal")]
	pub amount_in: U256,
	#[serde(with = "crate::serde_helpers::u256_decimal")]
	pub amount_out: U256,
	pub expiration: DateTime<Utc>,
}

/// Signed change of a deployment balance implied by a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "side", content = "amount", rename_all = "snake_case")]
pub enum Delta {
	Debit(#[serde(with = "crate::serde_helpers::u256_decimal")] U256),
	Credit(#[serde(with = "crate::serde_helpers::u256_decimal")] U256),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDelta {
	pub asset: DeploymentId,
	pub delta: Delta,
}

/// Union of successful quote legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedQuote {
	pub legs: Vec<QuoteLeg>,
	/// Leg quote hashes in leg order.
	pub quote_hashes: Vec<String>,
	/// Earliest expiration among the legs.
	pub expiration: DateTime<Utc>,
	/// `(source, debit)` then `(destination, credit)` for each leg, in leg order.
	pub token_deltas: Vec<TokenDelta>,
}

impl AggregatedQuote {
	/// Combines legs into an aggregated quote.
	///
	/// Returns `None` for an empty leg list: zero legs is never a valid quote.
	pub fn from_legs(legs: Vec<QuoteLeg>) -> Option<Self> {
		let expiration = legs.iter().map(|leg| leg.expiration).min()?;

		let quote_hashes = legs.iter().map(|leg| leg.quote_hash.clone()).collect();
		let token_deltas = legs
			.iter()
			.flat_map(|leg| {
				[
					TokenDelta {
						asset: leg.asset_in.clone(),
						delta: Delta::Debit(leg.amount_in),
					},
					TokenDelta {
						asset: leg.asset_out.clone(),
						delta: Delta::Credit(leg.amount_out),
					},
				]
			})
			.collect();

		Some(Self {
			legs,
			quote_hashes,
			expiration,
			token_deltas,
		})
	}

	/// Total debited from `asset` across all legs.
	pub fn amount_in(&self, asset: &DeploymentId) -> U256 {
		self.token_deltas
			.iter()
			.filter(|d| &d.asset == asset)
			.fold(U256::ZERO, |acc, d| match d.delta {
				Delta::Debit(amount) => acc.saturating_add(amount),
				Delta::Credit(_) => acc,
			})
	}

	/// Total credited to `asset` across all legs.
	pub fn amount_out(&self, asset: &DeploymentId) -> U256 {
		self.token_deltas
			.iter()
			.filter(|d| &d.asset == asset)
			.fold(U256::ZERO, |acc, d| match d.delta {
				Delta::Credit(amount) => acc.saturating_add(amount),
				Delta::Debit(_) => acc,
			})
	}
}

/// Request for a single combined quote covering a whole swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneClickQuoteRequest {
	pub asset_in: AssetDeployment,
	pub asset_out: AssetDeployment,
	pub amount_in: U256,
	pub slippage_bps: u16,
	/// Where funds go if the swap cannot be completed.
	pub refund_to: String,
	pub recipient: String,
	pub deadline: DateTime<Utc>,
}

/// A successful one-click quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneClickQuote {
	#[serde(with = "crate::serde_helpers::u256_decimal")]
	pub amount_in: U256,
	#[serde(with = "crate::serde_helpers::u256_decimal")]
	pub amount_out: U256,
	/// Address the input must be transferred to. Absent on dry quotes.
	pub deposit_address: Option<String>,
	pub deadline: DateTime<Utc>,
}

/// Outcome reported by the pricing service for a one-click request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneClickQuoteResult {
	Ok(OneClickQuote),
	Err { reason: String },
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn leg(hash: &str, asset_in: &str, amount_in: u64, amount_out: u64, exp: i64) -> QuoteLeg {
		QuoteLeg {
			quote_hash: hash.to_string(),
			asset_in: DeploymentId::new(asset_in),
			asset_out: DeploymentId::new("out"),
			amount_in: U256::from(amount_in),
			amount_out: U256::from(amount_out),
			expiration: Utc.timestamp_opt(exp, 0).unwrap(),
		}
	}

	#[test]
	fn test_empty_legs_is_not_a_quote() {
		assert!(AggregatedQuote::from_legs(vec![]).is_none());
	}

	#[test]
	fn test_from_legs_collects_in_order() {
		let quote = AggregatedQuote::from_legs(vec![
			leg("q1", "a", 100, 99, 2_000),
			leg("q2", "b", 50, 49, 1_000),
		])
		.unwrap();

		assert_eq!(quote.quote_hashes, vec!["q1", "q2"]);
		assert_eq!(quote.expiration, Utc.timestamp_opt(1_000, 0).unwrap());
		assert_eq!(quote.token_deltas.len(), 4);
		assert_eq!(quote.token_deltas[0].asset, DeploymentId::new("a"));
		assert_eq!(quote.token_deltas[0].delta, Delta::Debit(U256::from(100u64)));
		assert_eq!(quote.token_deltas[1].delta, Delta::Credit(U256::from(99u64)));
		assert_eq!(quote.token_deltas[2].asset, DeploymentId::new("b"));

		assert_eq!(quote.amount_out(&DeploymentId::new("out")), U256::from(148u64));
		assert_eq!(quote.amount_in(&DeploymentId::new("a")), U256::from(100u64));
		assert_eq!(quote.amount_in(&DeploymentId::new("out")), U256::ZERO);
	}
}
