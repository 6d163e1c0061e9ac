//! Payout planning: direct share, swap share, fee and minimum checks.

use crate::balance::BalanceInterface;
use crate::bridge::BridgeInfoInterface;
use crate::builder::{FeeError, WithdrawalBuilderInterface, WithdrawalPlan};
use crate::routes::RouteSelector;
use crate::WithdrawalError;
use intent_quote::{AggregateQuoteInput, QuoteError, QuoteProvider};
use intent_types::{
	AmountError, AssetDeployment, DeploymentId, FeeEstimate, Instruction, PreparedWithdrawal,
	SwapRequirement, TokenValue, WithdrawalRequest, WithdrawalRoute, U256,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Parameters forwarded with every swap quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSettings {
	pub wait_budget: Duration,
	pub min_deadline: Duration,
	pub app_fee_bps: u16,
}

impl Default for QuoteSettings {
	fn default() -> Self {
		Self {
			wait_budget: Duration::from_secs(3),
			min_deadline: Duration::from_secs(60),
			app_fee_bps: 0,
		}
	}
}

pub struct WithdrawalPreparer {
	balances: Arc<dyn BalanceInterface>,
	bridge_info: Arc<dyn BridgeInfoInterface>,
	builder: Arc<dyn WithdrawalBuilderInterface>,
	quotes: Arc<dyn QuoteProvider>,
	routes: RouteSelector,
	settings: QuoteSettings,
}

impl WithdrawalPreparer {
	pub fn new(
		balances: Arc<dyn BalanceInterface>,
		bridge_info: Arc<dyn BridgeInfoInterface>,
		builder: Arc<dyn WithdrawalBuilderInterface>,
		quotes: Arc<dyn QuoteProvider>,
		routes: RouteSelector,
		settings: QuoteSettings,
	) -> Self {
		Self {
			balances,
			bridge_info,
			builder,
			quotes,
			routes,
			settings,
		}
	}

	pub fn routes(&self) -> &RouteSelector {
		&self.routes
	}

	/// Prepares a payout. Nothing partial is returned when `cancel` fires.
	#[instrument(skip_all, fields(asset = %request.asset.symbol(), destination = %request.destination.id, amount = %request.amount))]
	pub async fn prepare(
		&self,
		request: &WithdrawalRequest,
		cancel: CancellationToken,
	) -> Result<PreparedWithdrawal, WithdrawalError> {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				info!("Withdrawal preparation cancelled");
				Err(WithdrawalError::Cancelled)
			}
			result = self.prepare_inner(request, &cancel) => result,
		}
	}

	async fn prepare_inner(
		&self,
		request: &WithdrawalRequest,
		cancel: &CancellationToken,
	) -> Result<PreparedWithdrawal, WithdrawalError> {
		let known = self.resolve_balances(request.asset.deployments()).await?;
		check_coverage(request, &known)?;

		if self.routes.is_internal(&request.destination.chain) {
			return self.prepare_internal(request, &known);
		}
		self.prepare_cross_chain(request, &known, cancel).await
	}

	/// Known balances, refreshed first when any deployment is missing.
	async fn resolve_balances(
		&self,
		deployments: &[AssetDeployment],
	) -> Result<HashMap<DeploymentId, TokenValue>, WithdrawalError> {
		let known = self.balances.balances();
		let unknown: Vec<DeploymentId> = deployments
			.iter()
			.filter(|d| !known.contains_key(&d.id))
			.map(|d| d.id.clone())
			.collect();
		if unknown.is_empty() {
			return Ok(known);
		}

		debug!("Refreshing {} unknown balances", unknown.len());
		self.balances.request_refresh(&unknown);
		self.balances
			.wait_ready()
			.await
			.map_err(|e| WithdrawalError::BalanceFetch(e.to_string()))?;

		Ok(self.balances.balances())
	}

	fn prepare_internal(
		&self,
		request: &WithdrawalRequest,
		known: &HashMap<DeploymentId, TokenValue>,
	) -> Result<PreparedWithdrawal, WithdrawalError> {
		let shares = split_proportionally(&request.amount, request.asset.deployments(), known)?;
		let paid = TokenValue::sum(shares.iter().map(|(_, amount)| amount), request.amount.decimals)?;

		let instructions = shares
			.iter()
			.map(|(deployment, amount)| Instruction::Transfer {
				asset: deployment.id.clone(),
				amount: amount.amount,
				recipient: request.recipient.clone(),
				memo: request.memo.clone(),
			})
			.collect::<Vec<_>>();

		info!("Prepared internal transfer from {} deployments", instructions.len());

		Ok(PreparedWithdrawal {
			direct_amount: paid,
			swap: None,
			fee: FeeEstimate::zero(request.destination.decimals),
			received_amount: paid,
			route: WithdrawalRoute::InternalTransfer,
			instructions,
		})
	}

	async fn prepare_cross_chain(
		&self,
		request: &WithdrawalRequest,
		known: &HashMap<DeploymentId, TokenValue>,
		cancel: &CancellationToken,
	) -> Result<PreparedWithdrawal, WithdrawalError> {
		let destination = &request.destination;

		let held = request
			.asset
			.contains(&destination.id)
			.then(|| known.get(&destination.id).copied())
			.flatten()
			.unwrap_or_else(|| TokenValue::zero(destination.decimals));
		let direct = std::cmp::min(request.amount, held).convert(destination.decimals)?;

		let mut swap_needed = request
			.amount
			.saturating_sub(&direct)?
			.convert(request.amount.decimals)?;
		if swap_needed.is_zero_at(destination.decimals) {
			swap_needed = TokenValue::zero(request.amount.decimals);
		}

		let swap = if swap_needed.is_zero() {
			None
		} else {
			Some(self.source_swap(request, swap_needed, known, cancel).await?)
		};

		let swap_out = swap
			.as_ref()
			.map(|s| s.amount_out)
			.unwrap_or_else(|| TokenValue::zero(destination.decimals));
		let total = direct.checked_add(&swap_out)?.convert(destination.decimals)?;

		let route = self.routes.select(destination);
		let fee = self
			.estimate_fee(&route, destination, &total, &request.recipient)
			.await?;
		let minimum = self.minimum_threshold(request).await?;

		let received = total
			.saturating_sub(&fee.amount)?
			.convert(destination.decimals)?;
		if received < minimum {
			let shortfall = minimum.saturating_sub(&received)?;
			warn!(%received, %minimum, "Withdrawal below minimum");
			return Err(WithdrawalError::AmountTooLow {
				shortfall,
				received,
				minimum,
				asset: destination.id.clone(),
			});
		}

		let plan = WithdrawalPlan {
			route,
			destination: destination.clone(),
			recipient: request.recipient.clone(),
			memo: request.memo.clone(),
			total,
			fee,
			received,
			swap,
		};
		let instructions = self
			.builder
			.build_instructions(&plan)
			.await
			.map_err(|e| WithdrawalError::Build(e.to_string()))?;

		info!(
			direct = %direct,
			swapped = %swap_out,
			fee = %plan.fee.amount,
			"Prepared withdrawal with {} instructions",
			instructions.len()
		);

		Ok(PreparedWithdrawal {
			direct_amount: direct,
			swap: plan.swap,
			fee: plan.fee,
			received_amount: received,
			route: plan.route,
			instructions,
		})
	}

	/// Quotes the part of the payout the destination deployment cannot cover,
	/// drawing on the family's other deployments.
	async fn source_swap(
		&self,
		request: &WithdrawalRequest,
		amount_needed: TokenValue,
		known: &HashMap<DeploymentId, TokenValue>,
		cancel: &CancellationToken,
	) -> Result<SwapRequirement, WithdrawalError> {
		let destination = &request.destination;
		let candidates: Vec<AssetDeployment> = request
			.asset
			.deployments()
			.iter()
			.filter(|d| d.id != destination.id)
			.cloned()
			.collect();
		let balances = candidates
			.iter()
			.filter_map(|d| known.get(&d.id).map(|balance| (d.id.clone(), *balance)))
			.collect();

		debug!(%amount_needed, "Sourcing swap from {} deployments", candidates.len());

		let input = AggregateQuoteInput {
			amount: amount_needed,
			candidates,
			destination: destination.clone(),
			balances,
			wait_budget: self.settings.wait_budget,
			min_deadline: self.settings.min_deadline,
			app_fee_bps: self.settings.app_fee_bps,
		};
		let quote = self.quotes.quote(input, cancel.child_token()).await?;

		// Every leg must draw on another deployment and pay into the destination.
		let misdirected = quote
			.legs
			.iter()
			.any(|leg| leg.asset_out != destination.id || leg.asset_in == destination.id);
		if misdirected {
			warn!(quote_hashes = ?quote.quote_hashes, "Quote does not match the requested swap");
			return Err(WithdrawalError::Quote(QuoteError::Superseded));
		}

		let amount_out = TokenValue::new(quote.amount_out(&destination.id), destination.decimals);
		let mut sources: Vec<DeploymentId> = Vec::new();
		for leg in &quote.legs {
			if !sources.contains(&leg.asset_in) {
				sources.push(leg.asset_in.clone());
			}
		}

		Ok(SwapRequirement {
			amount_needed,
			sources,
			destination: destination.id.clone(),
			quote,
			amount_out,
		})
	}

	async fn estimate_fee(
		&self,
		route: &WithdrawalRoute,
		destination: &AssetDeployment,
		total: &TokenValue,
		recipient: &str,
	) -> Result<FeeEstimate, WithdrawalError> {
		match self
			.builder
			.estimate_fee(route, destination, total, recipient)
			.await
		{
			Ok(fee) => Ok(fee),
			Err(FeeError::FeeExceedsAmount { capped }) => {
				debug!(fee = %capped.amount, "Fee exceeds amount, using capped estimate");
				Ok(capped)
			}
			Err(e) => Err(WithdrawalError::FeeFetch(e.to_string())),
		}
	}

	/// Smallest acceptable received amount.
	async fn minimum_threshold(
		&self,
		request: &WithdrawalRequest,
	) -> Result<TokenValue, WithdrawalError> {
		let destination = &request.destination;
		let caller_minimum = request
			.min_received
			.unwrap_or_else(|| TokenValue::zero(destination.decimals));

		let floor = if destination.bridge.has_published_minimum() {
			TokenValue::new(
				self.published_minimum(&destination.id).await?,
				destination.decimals,
			)
		} else {
			TokenValue::one_unit(destination.decimals)
		};

		Ok(std::cmp::max(caller_minimum, floor))
	}

	async fn published_minimum(&self, asset: &DeploymentId) -> Result<U256, WithdrawalError> {
		if let Some(minimum) = self.bridge_info.min_withdrawal(asset) {
			return Ok(minimum);
		}

		self.bridge_info.request_fetch();
		self.bridge_info
			.wait_ready()
			.await
			.map_err(|e| WithdrawalError::BridgeInfoFetch(e.to_string()))?;

		self.bridge_info.min_withdrawal(asset).ok_or_else(|| {
			WithdrawalError::BridgeInfoFetch(format!("No minimum withdrawal published for {}", asset))
		})
	}
}

/// Fails unless the known balances cover the requested amount.
fn check_coverage(
	request: &WithdrawalRequest,
	known: &HashMap<DeploymentId, TokenValue>,
) -> Result<(), WithdrawalError> {
	let deployments = request.asset.deployments();
	let held: Vec<TokenValue> = deployments
		.iter()
		.filter_map(|d| known.get(&d.id).copied())
		.collect();
	let available = TokenValue::sum(held.iter(), request.amount.decimals)?;
	if available >= request.amount {
		return Ok(());
	}

	let unknown: Vec<DeploymentId> = deployments
		.iter()
		.filter(|d| !known.contains_key(&d.id))
		.map(|d| d.id.clone())
		.collect();

	if unknown.is_empty() {
		Err(WithdrawalError::BalanceInsufficient {
			requested: request.amount,
			available,
		})
	} else {
		Err(WithdrawalError::BalanceMissing {
			unknown,
			requested: request.amount,
			available,
		})
	}
}

/// Splits `requested` across deployments in proportion to their balances.
///
/// Shares are computed at the finest precision involved and truncated to each
/// deployment's own unit. What truncation leaves over is handed out in
/// deployment order up to each balance; a remainder smaller than every
/// deployment's unit is dropped.
pub fn split_proportionally(
	requested: &TokenValue,
	deployments: &[AssetDeployment],
	known: &HashMap<DeploymentId, TokenValue>,
) -> Result<Vec<(AssetDeployment, TokenValue)>, AmountError> {
	let precision = deployments
		.iter()
		.map(|d| d.decimals)
		.fold(requested.decimals, u8::max);
	let overflow = AmountError::Overflow {
		decimals: precision,
	};

	let target = requested.convert(precision)?.amount;
	let mut held: Vec<(&AssetDeployment, U256)> = Vec::new();
	for deployment in deployments {
		if let Some(balance) = known.get(&deployment.id) {
			held.push((deployment, balance.convert(precision)?.amount));
		}
	}

	let total = held
		.iter()
		.try_fold(U256::ZERO, |acc, (_, balance)| acc.checked_add(*balance))
		.ok_or_else(|| overflow.clone())?;
	if total.is_zero() {
		return Ok(Vec::new());
	}

	let mut shares: Vec<TokenValue> = Vec::with_capacity(held.len());
	let mut allocated = U256::ZERO;
	for (deployment, balance) in &held {
		let exact = target
			.checked_mul(*balance)
			.ok_or_else(|| overflow.clone())?
			/ total;
		let share = TokenValue::new(exact, precision).convert(deployment.decimals)?;
		allocated += share.convert(precision)?.amount;
		shares.push(share);
	}

	let mut leftover = target.saturating_sub(allocated);
	for ((deployment, balance), share) in held.iter().zip(shares.iter_mut()) {
		if leftover.is_zero() {
			break;
		}
		let room = balance.saturating_sub(share.convert(precision)?.amount);
		let extra = TokenValue::new(leftover.min(room), precision).convert(deployment.decimals)?;
		if extra.is_zero() {
			continue;
		}
		leftover -= extra.convert(precision)?.amount;
		*share = share.checked_add(&extra)?;
	}

	Ok(held
		.into_iter()
		.zip(shares)
		.filter(|(_, share)| !share.is_zero())
		.map(|((deployment, _), share)| (deployment.clone(), share))
		.collect())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::balance::BalanceError;
	use crate::bridge::{BridgeInfoError, MockBridgeInfoInterface, StaticBridgeInfo};
	use crate::builder::MockWithdrawalBuilderInterface;
	use async_trait::async_trait;
	use chrono::{TimeZone, Utc};
	use intent_types::{
		AggregatedQuote, AssetFamily, BridgeKind, ChainId, ErrorCode, QuoteLeg,
	};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	struct FakeBalances {
		known: Mutex<HashMap<DeploymentId, TokenValue>>,
		after_refresh: HashMap<DeploymentId, TokenValue>,
		fail: bool,
		refreshes: AtomicUsize,
	}

	impl FakeBalances {
		fn with(known: &[(&str, TokenValue)]) -> Self {
			Self {
				known: Mutex::new(
					known
						.iter()
						.map(|(id, value)| (DeploymentId::new(*id), *value))
						.collect(),
				),
				after_refresh: HashMap::new(),
				fail: false,
				refreshes: AtomicUsize::new(0),
			}
		}
	}

	#[async_trait]
	impl BalanceInterface for FakeBalances {
		fn balances(&self) -> HashMap<DeploymentId, TokenValue> {
			self.known.lock().unwrap().clone()
		}

		fn request_refresh(&self, _ids: &[DeploymentId]) {
			self.refreshes.fetch_add(1, Ordering::SeqCst);
			if !self.fail {
				self.known
					.lock()
					.unwrap()
					.extend(self.after_refresh.clone());
			}
		}

		async fn wait_ready(&self) -> Result<(), BalanceError> {
			if self.fail {
				Err(BalanceError::Fetch("indexer down".to_string()))
			} else {
				Ok(())
			}
		}
	}

	/// Quotes every swap from the first candidate, losing `haircut` raw units
	/// of the destination asset.
	struct FakeQuotes {
		haircut: u64,
		error: Option<QuoteError>,
		inputs: Mutex<Vec<AggregateQuoteInput>>,
	}

	impl FakeQuotes {
		fn new(haircut: u64) -> Arc<Self> {
			Arc::new(Self {
				haircut,
				error: None,
				inputs: Mutex::new(Vec::new()),
			})
		}

		fn failing(error: QuoteError) -> Arc<Self> {
			Arc::new(Self {
				haircut: 0,
				error: Some(error),
				inputs: Mutex::new(Vec::new()),
			})
		}

		fn calls(&self) -> usize {
			self.inputs.lock().unwrap().len()
		}
	}

	#[async_trait]
	impl QuoteProvider for FakeQuotes {
		async fn quote(
			&self,
			input: AggregateQuoteInput,
			_cancel: CancellationToken,
		) -> Result<AggregatedQuote, QuoteError> {
			self.inputs.lock().unwrap().push(input.clone());
			if let Some(error) = &self.error {
				return Err(error.clone());
			}

			let source = &input.candidates[0];
			let amount_out = input.amount.convert(input.destination.decimals)?.amount
				- U256::from(self.haircut);
			AggregatedQuote::from_legs(vec![QuoteLeg {
				quote_hash: "q1".to_string(),
				asset_in: source.id.clone(),
				asset_out: input.destination.id.clone(),
				amount_in: input.amount.convert(source.decimals)?.amount,
				amount_out,
				expiration: Utc.timestamp_opt(2_000_000_000, 0).unwrap(),
			}])
			.ok_or(QuoteError::NoQuotes)
		}
	}

	fn usdc_eth() -> AssetDeployment {
		AssetDeployment::new("usdc-eth", "USDC", 6, "eth", BridgeKind::Omni)
	}

	fn usdc_sol() -> AssetDeployment {
		AssetDeployment::new("usdc-sol", "USDC", 9, "sol", BridgeKind::Hot)
	}

	fn usdc_poa() -> AssetDeployment {
		AssetDeployment::new("usdc-arb", "USDC", 6, "arb", BridgeKind::Poa)
	}

	fn usdc(amount: u64) -> TokenValue {
		TokenValue::new(U256::from(amount) * U256::from(1_000_000u64), 6)
	}

	fn usdc_9(amount: u64) -> TokenValue {
		TokenValue::new(U256::from(amount) * U256::from(1_000_000_000u64), 9)
	}

	fn family() -> AssetFamily {
		AssetFamily::unified("USDC", vec![usdc_eth(), usdc_sol(), usdc_poa()])
	}

	fn request(amount: TokenValue, destination: AssetDeployment) -> WithdrawalRequest {
		WithdrawalRequest {
			asset: family(),
			amount,
			destination,
			recipient: "0xrecipient".to_string(),
			memo: None,
			min_received: None,
		}
	}

	fn routes() -> RouteSelector {
		RouteSelector::new(
			ChainId::new("intents"),
			ChainId::new("near"),
			vec![ChainId::new("aurora")],
		)
	}

	fn fee(raw: u64) -> FeeEstimate {
		FeeEstimate {
			amount: TokenValue::new(U256::from(raw), 6),
			details: serde_json::Value::Null,
		}
	}

	fn withdraw_for(plan: &WithdrawalPlan) -> Instruction {
		Instruction::Withdraw {
			route: plan.route.clone(),
			asset: plan.destination.id.clone(),
			amount: plan.received.amount,
			recipient: plan.recipient.clone(),
			memo: plan.memo.clone(),
			fee: plan.fee.amount.amount,
			payload: serde_json::Value::Null,
		}
	}

	fn builder(fee: Result<FeeEstimate, FeeError>) -> Arc<MockWithdrawalBuilderInterface> {
		let mut builder = MockWithdrawalBuilderInterface::new();
		builder
			.expect_estimate_fee()
			.returning(move |_, _, _, _| fee.clone());
		builder
			.expect_build_instructions()
			.returning(|plan| Ok(vec![withdraw_for(plan)]));
		Arc::new(builder)
	}

	fn all_known(eth: TokenValue, sol: TokenValue, arb: TokenValue) -> Arc<FakeBalances> {
		Arc::new(FakeBalances::with(&[
			("usdc-eth", eth),
			("usdc-sol", sol),
			("usdc-arb", arb),
		]))
	}

	fn preparer(
		balances: Arc<dyn BalanceInterface>,
		quotes: Arc<dyn QuoteProvider>,
		builder: Arc<dyn WithdrawalBuilderInterface>,
		bridge_info: Arc<dyn BridgeInfoInterface>,
	) -> WithdrawalPreparer {
		WithdrawalPreparer::new(
			balances,
			bridge_info,
			builder,
			quotes,
			routes(),
			QuoteSettings::default(),
		)
	}

	fn no_floors() -> Arc<StaticBridgeInfo> {
		Arc::new(StaticBridgeInfo::default())
	}

	#[tokio::test]
	async fn test_destination_fully_held_needs_no_swap() {
		let quotes = FakeQuotes::new(0);
		let preparer = preparer(
			all_known(usdc(100), usdc_9(50), usdc(0)),
			quotes.clone(),
			builder(Ok(fee(100_000))),
			no_floors(),
		);

		let prepared = preparer
			.prepare(&request(usdc(40), usdc_eth()), CancellationToken::new())
			.await
			.unwrap();

		assert!(prepared.swap.is_none());
		assert_eq!(quotes.calls(), 0);
		assert_eq!(prepared.direct_amount, usdc(40));
		assert_eq!(prepared.received_amount, TokenValue::new(U256::from(39_900_000u64), 6));
		assert_eq!(
			prepared.route,
			WithdrawalRoute::Bridge {
				chain: ChainId::new("eth"),
				bridge: BridgeKind::Omni
			}
		);
		assert_eq!(prepared.instructions.len(), 1);
	}

	#[tokio::test]
	async fn test_shortfall_is_sourced_from_other_deployments() {
		let quotes = FakeQuotes::new(1_000);
		let preparer = preparer(
			all_known(usdc(10), usdc_9(100), usdc(0)),
			quotes.clone(),
			builder(Ok(fee(0))),
			no_floors(),
		);

		let prepared = preparer
			.prepare(&request(usdc(40), usdc_eth()), CancellationToken::new())
			.await
			.unwrap();

		assert_eq!(prepared.direct_amount, usdc(10));
		let swap = prepared.swap.as_ref().unwrap();
		assert_eq!(swap.amount_needed, usdc(30));
		assert_eq!(swap.sources, vec![DeploymentId::new("usdc-sol")]);
		assert_eq!(swap.amount_out, TokenValue::new(U256::from(29_999_000u64), 6));
		assert_eq!(
			prepared.received_amount,
			TokenValue::new(U256::from(39_999_000u64), 6)
		);

		let inputs = quotes.inputs.lock().unwrap();
		let ids: Vec<_> = inputs[0].candidates.iter().map(|d| d.id.as_str()).collect();
		assert_eq!(ids, vec!["usdc-sol", "usdc-arb"]);
		assert!(!inputs[0].balances.contains_key(&DeploymentId::new("usdc-eth")));
	}

	#[tokio::test]
	async fn test_instructions_carry_received_amount() {
		let mut builder = MockWithdrawalBuilderInterface::new();
		builder
			.expect_estimate_fee()
			.returning(|_, _, _, _| Ok(fee(250_000)));
		builder
			.expect_build_instructions()
			.withf(|plan| {
				plan.total == usdc(40)
					&& plan.received == TokenValue::new(U256::from(39_750_000u64), 6)
			})
			.times(1)
			.returning(|plan| Ok(vec![withdraw_for(plan)]));

		let preparer = preparer(
			all_known(usdc(100), usdc_9(0), usdc(0)),
			FakeQuotes::new(0),
			Arc::new(builder),
			no_floors(),
		);
		let prepared = preparer
			.prepare(&request(usdc(40), usdc_eth()), CancellationToken::new())
			.await
			.unwrap();

		assert_eq!(prepared.received_amount, TokenValue::new(U256::from(39_750_000u64), 6));
		match &prepared.instructions[0] {
			Instruction::Withdraw { amount, fee, .. } => {
				assert_eq!(*amount, U256::from(39_750_000u64));
				assert_eq!(*fee, U256::from(250_000u64));
			}
			other => panic!("unexpected instruction: {:?}", other),
		}
	}

	/// Answers every request with a quote priced into `usdc-sol`.
	struct MisdirectedQuotes;

	#[async_trait]
	impl QuoteProvider for MisdirectedQuotes {
		async fn quote(
			&self,
			input: AggregateQuoteInput,
			_cancel: CancellationToken,
		) -> Result<AggregatedQuote, QuoteError> {
			AggregatedQuote::from_legs(vec![QuoteLeg {
				quote_hash: "other".to_string(),
				asset_in: DeploymentId::new("usdc-eth"),
				asset_out: DeploymentId::new("usdc-sol"),
				amount_in: input.amount.amount,
				amount_out: U256::from(999u64),
				expiration: Utc.timestamp_opt(2_000_000_000, 0).unwrap(),
			}])
			.ok_or(QuoteError::NoQuotes)
		}
	}

	#[tokio::test]
	async fn test_quote_for_another_swap_is_rejected() {
		let mut builder = MockWithdrawalBuilderInterface::new();
		builder.expect_estimate_fee().never();
		builder.expect_build_instructions().never();

		let preparer = preparer(
			all_known(usdc(10), usdc_9(100), usdc(0)),
			Arc::new(MisdirectedQuotes),
			Arc::new(builder),
			no_floors(),
		);
		let err = preparer
			.prepare(&request(usdc(40), usdc_eth()), CancellationToken::new())
			.await
			.unwrap_err();

		assert_eq!(err, WithdrawalError::Quote(QuoteError::Superseded));
		assert_eq!(err.code(), ErrorCode::NoQuotes);
	}

	#[tokio::test]
	async fn test_dust_remainder_is_not_swapped() {
		let quotes = FakeQuotes::new(0);
		let preparer = preparer(
			all_known(usdc(20), usdc_9(0), usdc(0)),
			quotes.clone(),
			builder(Ok(fee(0))),
			no_floors(),
		);

		// 10.000000001 at 9 decimals; the last digit cannot exist at 6.
		let amount = TokenValue::new(U256::from(10_000_000_001u64), 9);
		let prepared = preparer
			.prepare(&request(amount, usdc_eth()), CancellationToken::new())
			.await
			.unwrap();

		assert!(prepared.swap.is_none());
		assert_eq!(quotes.calls(), 0);
		assert_eq!(prepared.direct_amount, usdc(10));
	}

	#[tokio::test]
	async fn test_amount_too_low_reports_shortfall() {
		let preparer = preparer(
			all_known(usdc(100), usdc_9(0), usdc(0)),
			FakeQuotes::new(0),
			builder(Ok(fee(100_000))),
			no_floors(),
		);

		let mut req = request(usdc(40), usdc_eth());
		req.min_received = Some(TokenValue::new(U256::from(39_950_000u64), 6));
		let err = preparer
			.prepare(&req, CancellationToken::new())
			.await
			.unwrap_err();

		assert_eq!(err.code(), ErrorCode::AmountTooLow);
		match err {
			WithdrawalError::AmountTooLow {
				shortfall,
				received,
				minimum,
				asset,
			} => {
				assert_eq!(shortfall, TokenValue::new(U256::from(50_000u64), 6));
				assert_eq!(received, TokenValue::new(U256::from(39_900_000u64), 6));
				assert_eq!(minimum, TokenValue::new(U256::from(39_950_000u64), 6));
				assert_eq!(asset, DeploymentId::new("usdc-eth"));
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_capped_fee_is_used() {
		let preparer = preparer(
			all_known(usdc(100), usdc_9(0), usdc(0)),
			FakeQuotes::new(0),
			builder(Err(FeeError::FeeExceedsAmount {
				capped: fee(2_000_000),
			})),
			no_floors(),
		);

		let err = preparer
			.prepare(&request(usdc(1), usdc_eth()), CancellationToken::new())
			.await
			.unwrap_err();

		// Nothing left after the fee; one raw unit is the floor.
		assert!(matches!(
			err,
			WithdrawalError::AmountTooLow { shortfall, .. } if shortfall == TokenValue::one_unit(6)
		));
	}

	#[tokio::test]
	async fn test_fee_failure() {
		let preparer = preparer(
			all_known(usdc(100), usdc_9(0), usdc(0)),
			FakeQuotes::new(0),
			builder(Err(FeeError::Failed("relayer offline".to_string()))),
			no_floors(),
		);

		let err = preparer
			.prepare(&request(usdc(1), usdc_eth()), CancellationToken::new())
			.await
			.unwrap_err();
		assert_eq!(err.code(), ErrorCode::WithdrawalFeeFetch);
	}

	#[tokio::test]
	async fn test_balance_failures() {
		let preparer_for = |balances: Arc<FakeBalances>| {
			preparer(balances, FakeQuotes::new(0), builder(Ok(fee(0))), no_floors())
		};

		let insufficient = preparer_for(all_known(usdc(1), usdc_9(1), usdc(1)));
		let err = insufficient
			.prepare(&request(usdc(40), usdc_eth()), CancellationToken::new())
			.await
			.unwrap_err();
		assert_eq!(err.code(), ErrorCode::BalanceInsufficient);

		let balances = Arc::new(FakeBalances::with(&[("usdc-eth", usdc(1))]));
		let missing = preparer_for(balances.clone());
		let err = missing
			.prepare(&request(usdc(40), usdc_eth()), CancellationToken::new())
			.await
			.unwrap_err();
		assert_eq!(err.code(), ErrorCode::BalanceMissing);
		assert_eq!(balances.refreshes.load(Ordering::SeqCst), 1);

		let mut failing = FakeBalances::with(&[]);
		failing.fail = true;
		let err = preparer_for(Arc::new(failing))
			.prepare(&request(usdc(40), usdc_eth()), CancellationToken::new())
			.await
			.unwrap_err();
		assert_eq!(err.code(), ErrorCode::BalanceFetch);
	}

	#[tokio::test]
	async fn test_refresh_fills_unknown_balances() {
		let mut balances = FakeBalances::with(&[("usdc-eth", usdc(50))]);
		balances.after_refresh = HashMap::from([
			(DeploymentId::new("usdc-sol"), usdc_9(0)),
			(DeploymentId::new("usdc-arb"), usdc(0)),
		]);
		let balances = Arc::new(balances);
		let preparer = preparer(
			balances.clone(),
			FakeQuotes::new(0),
			builder(Ok(fee(0))),
			no_floors(),
		);

		let prepared = preparer
			.prepare(&request(usdc(40), usdc_eth()), CancellationToken::new())
			.await
			.unwrap();
		assert_eq!(prepared.received_amount, usdc(40));
		assert_eq!(balances.refreshes.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_internal_transfer_splits_proportionally() {
		let a = AssetDeployment::new("usdc-intents-a", "USDC", 6, "intents", BridgeKind::Direct);
		let b = AssetDeployment::new("usdc-intents-b", "USDC", 18, "intents", BridgeKind::Direct);
		let wei = |amount: u64| {
			TokenValue::new(
				U256::from(amount) * U256::from(10u64).pow(U256::from(18u64)),
				18,
			)
		};
		let balances = Arc::new(FakeBalances::with(&[
			("usdc-intents-a", usdc(100)),
			("usdc-intents-b", wei(300)),
		]));

		let mut builder = MockWithdrawalBuilderInterface::new();
		builder.expect_estimate_fee().never();
		builder.expect_build_instructions().never();

		let preparer = preparer(balances, FakeQuotes::new(0), Arc::new(builder), no_floors());
		let req = WithdrawalRequest {
			asset: AssetFamily::unified("USDC", vec![a.clone(), b.clone()]),
			amount: usdc(200),
			destination: a,
			recipient: "bob.near".to_string(),
			memo: Some("rent".to_string()),
			min_received: None,
		};

		let prepared = preparer.prepare(&req, CancellationToken::new()).await.unwrap();
		assert_eq!(prepared.route, WithdrawalRoute::InternalTransfer);
		assert!(prepared.fee.amount.is_zero());
		assert_eq!(prepared.received_amount, usdc(200));
		assert_eq!(
			prepared.instructions,
			vec![
				Instruction::Transfer {
					asset: DeploymentId::new("usdc-intents-a"),
					amount: U256::from(50_000_000u64),
					recipient: "bob.near".to_string(),
					memo: Some("rent".to_string()),
				},
				Instruction::Transfer {
					asset: DeploymentId::new("usdc-intents-b"),
					amount: wei(150).amount,
					recipient: "bob.near".to_string(),
					memo: Some("rent".to_string()),
				},
			]
		);
	}

	#[test]
	fn test_split_hands_out_truncation_leftover() {
		let a = AssetDeployment::new("a", "X", 0, "intents", BridgeKind::Direct);
		let b = AssetDeployment::new("b", "X", 0, "intents", BridgeKind::Direct);
		let known = HashMap::from([
			(DeploymentId::new("a"), TokenValue::new(U256::from(1u64), 0)),
			(DeploymentId::new("b"), TokenValue::new(U256::from(2u64), 0)),
		]);

		let shares = split_proportionally(
			&TokenValue::new(U256::from(2u64), 0),
			&[a, b],
			&known,
		)
		.unwrap();
		let amounts: Vec<_> = shares.iter().map(|(_, v)| v.amount.to::<u64>()).collect();
		assert_eq!(amounts, vec![1, 1]);
	}

	#[tokio::test]
	async fn test_published_floor_applies() {
		let floors = Arc::new(StaticBridgeInfo::new(HashMap::from([(
			DeploymentId::new("usdc-arb"),
			U256::from(5_000_000u64),
		)])));
		let preparer = preparer(
			all_known(usdc(0), usdc_9(0), usdc(100)),
			FakeQuotes::new(0),
			builder(Ok(fee(0))),
			floors,
		);

		let err = preparer
			.prepare(&request(usdc(4), usdc_poa()), CancellationToken::new())
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			WithdrawalError::AmountTooLow { shortfall, .. } if shortfall == usdc(1)
		));

		let prepared = preparer
			.prepare(&request(usdc(5), usdc_poa()), CancellationToken::new())
			.await
			.unwrap();
		assert_eq!(prepared.received_amount, usdc(5));
	}

	#[tokio::test]
	async fn test_unknown_floor_is_fetched() {
		let mut bridge_info = MockBridgeInfoInterface::new();
		bridge_info.expect_min_withdrawal().returning(|_| None);
		bridge_info.expect_request_fetch().times(1).return_const(());
		bridge_info
			.expect_wait_ready()
			.times(1)
			.returning(|| Err(BridgeInfoError::Unavailable("timeout".to_string())));

		let preparer = preparer(
			all_known(usdc(0), usdc_9(0), usdc(100)),
			FakeQuotes::new(0),
			builder(Ok(fee(0))),
			Arc::new(bridge_info),
		);
		let err = preparer
			.prepare(&request(usdc(4), usdc_poa()), CancellationToken::new())
			.await
			.unwrap_err();
		assert_eq!(err.code(), ErrorCode::BridgeInfoFetch);

		let preparer = preparer_with_static_floorless();
		let err = preparer
			.prepare(&request(usdc(4), usdc_poa()), CancellationToken::new())
			.await
			.unwrap_err();
		assert_eq!(err.code(), ErrorCode::BridgeInfoFetch);
	}

	fn preparer_with_static_floorless() -> WithdrawalPreparer {
		preparer(
			all_known(usdc(0), usdc_9(0), usdc(100)),
			FakeQuotes::new(0),
			builder(Ok(fee(0))),
			no_floors(),
		)
	}

	#[tokio::test]
	async fn test_quote_errors_propagate() {
		let preparer = preparer(
			all_known(usdc(10), usdc_9(100), usdc(0)),
			FakeQuotes::failing(QuoteError::NoQuotes),
			builder(Ok(fee(0))),
			no_floors(),
		);

		let err = preparer
			.prepare(&request(usdc(40), usdc_eth()), CancellationToken::new())
			.await
			.unwrap_err();
		assert_eq!(err, WithdrawalError::Quote(QuoteError::NoQuotes));
		assert!(err.retryable());
	}

	#[tokio::test]
	async fn test_cancelled_preparation() {
		let preparer = preparer(
			all_known(usdc(100), usdc_9(0), usdc(0)),
			FakeQuotes::new(0),
			builder(Ok(fee(0))),
			no_floors(),
		);
		let cancel = CancellationToken::new();
		cancel.cancel();

		let err = preparer
			.prepare(&request(usdc(40), usdc_eth()), cancel)
			.await
			.unwrap_err();
		assert_eq!(err, WithdrawalError::Cancelled);
	}
}
