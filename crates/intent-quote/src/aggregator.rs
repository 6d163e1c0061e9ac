//! Amount splitting and sequential leg pricing.

use crate::{AggregateQuoteInput, PricingInterface, QuoteError, QuoteProvider};
use async_trait::async_trait;
use intent_types::{AggregatedQuote, AssetDeployment, QuoteLeg, QuoteRequest, TokenValue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// One slice of the desired amount assigned to a source deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
	pub source: AssetDeployment,
	/// Amount at the source's precision.
	pub amount: TokenValue,
}

/// Splits amounts across candidates and prices each slice.
pub struct QuoteAggregator {
	pricing: Arc<dyn PricingInterface>,
}

impl QuoteAggregator {
	pub fn new(pricing: Arc<dyn PricingInterface>) -> Self {
		Self { pricing }
	}

	/// Prices the allocations of `input` one after another and combines the
	/// successful legs.
	///
	/// A failing allocation is skipped; the result is a partial fill as long
	/// as one leg succeeded.
	#[instrument(skip(self, input), fields(destination = %input.destination.id, candidates = input.candidates.len()))]
	pub async fn aggregate(&self, input: &AggregateQuoteInput) -> Result<AggregatedQuote, QuoteError> {
		let allocations = plan_allocations(input)?;
		let mut legs = Vec::with_capacity(allocations.len());

		for allocation in &allocations {
			let request = QuoteRequest {
				asset_in: allocation.source.id.clone(),
				asset_out: input.destination.id.clone(),
				exact_amount_in: allocation.amount.amount,
				min_deadline: input.min_deadline,
				wait_budget: input.wait_budget,
				app_fee_bps: input.app_fee_bps,
			};

			match self.pricing.quote(&request).await {
				Ok(Some(quotes)) => match best_quote(quotes) {
					Some(leg) => {
						debug!(source = %allocation.source.id, amount_out = %leg.amount_out, "Priced allocation");
						legs.push(leg);
					}
					None => debug!(source = %allocation.source.id, "Empty quote list"),
				},
				Ok(None) => debug!(source = %allocation.source.id, "No quote returned"),
				Err(e) => warn!(source = %allocation.source.id, error = %e, "Pricing failed"),
			}
		}

		let priced = legs.len();
		match AggregatedQuote::from_legs(legs) {
			Some(quote) => {
				info!("Aggregated {} of {} allocations", priced, allocations.len());
				Ok(quote)
			}
			None => {
				warn!("No allocation could be priced");
				Err(QuoteError::NoQuotes)
			}
		}
	}
}

#[async_trait]
impl QuoteProvider for QuoteAggregator {
	async fn quote(
		&self,
		input: AggregateQuoteInput,
		cancel: CancellationToken,
	) -> Result<AggregatedQuote, QuoteError> {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(QuoteError::Cancelled),
			result = self.aggregate(&input) => result,
		}
	}
}

/// Decides how much to draw from each candidate.
///
/// Every candidate but the last is capped at its known balance (unknown
/// counts as zero). The last takes whatever remains, even beyond its known
/// balance, so a quote is still produced when balances are stale.
pub fn plan_allocations(input: &AggregateQuoteInput) -> Result<Vec<Allocation>, QuoteError> {
	let mut candidates: Vec<&AssetDeployment> = Vec::with_capacity(input.candidates.len());
	for candidate in &input.candidates {
		if !candidates.iter().any(|c| c.id == candidate.id) {
			candidates.push(candidate);
		}
	}

	let Some(first) = candidates.first() else {
		return Ok(Vec::new());
	};

	let mut remaining = input.amount.convert(first.decimals)?;
	let mut allocations = Vec::new();
	let last = candidates.len() - 1;

	for (index, candidate) in candidates.iter().enumerate() {
		if remaining.is_zero() {
			break;
		}

		let amount = if index == last {
			remaining.convert(candidate.decimals)?
		} else {
			let balance = input
				.balances
				.get(&candidate.id)
				.copied()
				.unwrap_or_else(|| TokenValue::zero(candidate.decimals));
			std::cmp::min(remaining, balance).convert(candidate.decimals)?
		};

		if amount.is_zero() {
			continue;
		}

		remaining = remaining.saturating_sub(&amount)?;
		allocations.push(Allocation {
			source: (*candidate).clone(),
			amount,
		});
	}

	Ok(allocations)
}

/// Highest output wins; the first of equal outputs is kept.
fn best_quote(quotes: Vec<QuoteLeg>) -> Option<QuoteLeg> {
	quotes.into_iter().fold(None, |best, quote| match best {
		Some(current) if quote.amount_out <= current.amount_out => Some(current),
		_ => Some(quote),
	})
}
