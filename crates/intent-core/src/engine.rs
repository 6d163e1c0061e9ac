// intent-core/src/engine.rs

use crate::error::CoreError;
use crate::lifecycle::{LifecycleManager, LifecycleState};
use crate::quotes::SessionQuotes;
use chrono::Utc;
use intent_config::{validate_config, ConfigError, EngineConfig};
use intent_execution::{
	BroadcastInterface, DefaultWalletErrorExtractor, Erc191Verifier, IntentCollaborators,
	IntentExecutor, IntentHandle, KeyRegistryInterface, SignerInterface, VerifierInterface,
	WalletErrorExtractor,
};
use intent_quote::{
	AggregateQuoteInput, AggregatedQuote, PricingInterface, QuoteAggregator, QuoteProvider,
	QuoteStream, QuoteStreamUpdate,
};
use intent_types::{
	AssetDeployment, IntentOutcome, PreparedWithdrawal, SwapIntentInput, TokenValue, UserInfo,
	WithdrawalRequest, U256,
};
use intent_withdrawal::{
	BalanceCache, BalanceInterface, BalanceSource, BridgeInfoInterface, QuoteSettings,
	RouteSelector, StaticBridgeInfo, WithdrawalBuilderInterface, WithdrawalPreparer,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

pub struct IntentEngine {
	config: EngineConfig,
	lifecycle: LifecycleManager,
	aggregator: Arc<QuoteAggregator>,
	quotes: Arc<SessionQuotes>,
	/// Present when the engine owns its balance cache.
	balance_cache: Option<Arc<BalanceCache>>,
	balances: Arc<dyn BalanceInterface>,
	preparer: WithdrawalPreparer,
	executor: IntentExecutor,
}

impl IntentEngine {
	pub fn builder(config: EngineConfig) -> IntentEngineBuilder {
		IntentEngineBuilder::new(config)
	}

	/// Starts the balance cache and the quote stream.
	pub async fn start(&self) -> Result<(), CoreError> {
		self.lifecycle.initialize().await?;

		if let Some(cache) = &self.balance_cache {
			cache.start();
		}
		let stream = QuoteStream::spawn(
			Arc::clone(&self.aggregator) as Arc<dyn QuoteProvider>,
			self.config.quote.throttle_interval(),
		);
		self.quotes.install(stream);

		self.lifecycle.start().await?;
		info!(engine = %self.config.engine.name, "Intent engine started");
		Ok(())
	}

	/// Cancels outstanding operations and stops the session services.
	pub async fn shutdown(&self) -> Result<(), CoreError> {
		self.lifecycle.begin_shutdown().await?;

		if let Some(stream) = self.quotes.take() {
			stream.stop().await;
		}
		if let Some(cache) = &self.balance_cache {
			cache.stop().await;
		}

		self.lifecycle.finish_shutdown().await?;
		info!(engine = %self.config.engine.name, "Intent engine stopped");
		Ok(())
	}

	pub async fn state(&self) -> LifecycleState {
		self.lifecycle.get_state().await
	}

	/// A token cancelled at shutdown, for callers to derive operation tokens
	/// from.
	pub fn cancellation_token(&self) -> CancellationToken {
		self.lifecycle.shutdown_token().child_token()
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn routes(&self) -> &RouteSelector {
		self.preparer.routes()
	}

	/// The engine-owned balance cache, if balances are not supplied from
	/// outside.
	pub fn balance_cache(&self) -> Option<&Arc<BalanceCache>> {
		self.balance_cache.as_ref()
	}

	pub async fn prepare_withdrawal(
		&self,
		request: &WithdrawalRequest,
		cancel: CancellationToken,
	) -> Result<PreparedWithdrawal, CoreError> {
		self.lifecycle.ensure_running().await?;
		Ok(self.preparer.prepare(request, cancel).await?)
	}

	/// Prices `amount` of the candidates into `destination` through the
	/// throttled stream, using the current known balances.
	#[instrument(skip_all, fields(destination = %destination.id))]
	pub async fn aggregate_quote(
		&self,
		amount: TokenValue,
		candidates: Vec<AssetDeployment>,
		destination: AssetDeployment,
		cancel: CancellationToken,
	) -> Result<AggregatedQuote, CoreError> {
		self.lifecycle.ensure_running().await?;

		let input = AggregateQuoteInput {
			amount,
			candidates,
			destination,
			balances: self.balances.balances(),
			wait_budget: self.config.quote.wait_budget(),
			min_deadline: self.config.quote.min_deadline(),
			app_fee_bps: self.config.quote.app_fee_bps,
		};
		Ok(self.quotes.quote(input, cancel).await?)
	}

	/// Results of every quote produced by the stream.
	pub async fn quote_updates(&self) -> Result<broadcast::Receiver<QuoteStreamUpdate>, CoreError> {
		self.lifecycle.ensure_running().await?;
		let stream = self
			.quotes
			.current()
			.ok_or(CoreError::NotRunning(LifecycleState::Stopping))?;
		Ok(stream.subscribe())
	}

	/// Drops pending quote work without stopping the stream.
	pub async fn pause_quotes(&self) -> Result<(), CoreError> {
		self.lifecycle.ensure_running().await?;
		if let Some(stream) = self.quotes.current() {
			stream.pause()?;
		}
		Ok(())
	}

	/// Swap input with slippage and deadline taken from the configuration.
	pub fn swap_input(
		&self,
		user: UserInfo,
		asset_in: AssetDeployment,
		asset_out: AssetDeployment,
		amount_in: U256,
		recipient: Option<String>,
	) -> Result<SwapIntentInput, CoreError> {
		let deadline = chrono::Duration::from_std(self.config.intent.deadline())
			.ok()
			.and_then(|ttl| Utc::now().checked_add_signed(ttl))
			.ok_or_else(|| {
				ConfigError::ValidationError(format!(
					"Swap deadline of {}s is out of range",
					self.config.intent.deadline_secs
				))
			})?;

		Ok(SwapIntentInput {
			user,
			asset_in,
			asset_out,
			amount_in,
			slippage_bps: self.config.intent.slippage_bps,
			recipient,
			deadline,
		})
	}

	pub async fn execute_swap(&self, input: SwapIntentInput) -> Result<IntentOutcome, CoreError> {
		self.lifecycle.ensure_running().await?;
		Ok(self.executor.run(input).await?)
	}

	/// Runs a swap attempt in the background.
	pub async fn spawn_swap(&self, input: SwapIntentInput) -> Result<IntentHandle, CoreError> {
		self.lifecycle.ensure_running().await?;
		Ok(self.executor.spawn(input))
	}
}

/// Assembles an [`IntentEngine`] from configuration and collaborators.
pub struct IntentEngineBuilder {
	config: EngineConfig,
	pricing: Option<Arc<dyn PricingInterface>>,
	balance_source: Option<Arc<dyn BalanceSource>>,
	balance_service: Option<Arc<dyn BalanceInterface>>,
	bridge_info: Option<Arc<dyn BridgeInfoInterface>>,
	withdrawal_builder: Option<Arc<dyn WithdrawalBuilderInterface>>,
	signer: Option<Arc<dyn SignerInterface>>,
	verifier: Option<Arc<dyn VerifierInterface>>,
	key_registry: Option<Arc<dyn KeyRegistryInterface>>,
	broadcaster: Option<Arc<dyn BroadcastInterface>>,
	wallet_errors: Option<Arc<dyn WalletErrorExtractor>>,
}

impl IntentEngineBuilder {
	pub fn new(config: EngineConfig) -> Self {
		Self {
			config,
			pricing: None,
			balance_source: None,
			balance_service: None,
			bridge_info: None,
			withdrawal_builder: None,
			signer: None,
			verifier: None,
			key_registry: None,
			broadcaster: None,
			wallet_errors: None,
		}
	}

	pub fn with_pricing(mut self, pricing: Arc<dyn PricingInterface>) -> Self {
		self.pricing = Some(pricing);
		self
	}

	/// Balances are cached by the engine and fetched from `source`.
	pub fn with_balance_source(mut self, source: Arc<dyn BalanceSource>) -> Self {
		self.balance_source = Some(source);
		self
	}

	/// Balances come from a service managed elsewhere. Takes precedence over
	/// a balance source.
	pub fn with_balance_service(mut self, service: Arc<dyn BalanceInterface>) -> Self {
		self.balance_service = Some(service);
		self
	}

	/// Replaces the static bridge minimums from the configuration.
	pub fn with_bridge_info(mut self, bridge_info: Arc<dyn BridgeInfoInterface>) -> Self {
		self.bridge_info = Some(bridge_info);
		self
	}

	pub fn with_withdrawal_builder(mut self, builder: Arc<dyn WithdrawalBuilderInterface>) -> Self {
		self.withdrawal_builder = Some(builder);
		self
	}

	pub fn with_signer(mut self, signer: Arc<dyn SignerInterface>) -> Self {
		self.signer = Some(signer);
		self
	}

	/// Defaults to EIP-191 recovery.
	pub fn with_verifier(mut self, verifier: Arc<dyn VerifierInterface>) -> Self {
		self.verifier = Some(verifier);
		self
	}

	pub fn with_key_registry(mut self, key_registry: Arc<dyn KeyRegistryInterface>) -> Self {
		self.key_registry = Some(key_registry);
		self
	}

	pub fn with_broadcaster(mut self, broadcaster: Arc<dyn BroadcastInterface>) -> Self {
		self.broadcaster = Some(broadcaster);
		self
	}

	pub fn with_wallet_errors(mut self, wallet_errors: Arc<dyn WalletErrorExtractor>) -> Self {
		self.wallet_errors = Some(wallet_errors);
		self
	}

	pub fn build(self) -> Result<IntentEngine, CoreError> {
		validate_config(&self.config)?;
		let config = self.config;

		let pricing = self.pricing.ok_or(CoreError::MissingComponent("pricing"))?;
		let withdrawal_builder = self
			.withdrawal_builder
			.ok_or(CoreError::MissingComponent("withdrawal builder"))?;
		let signer = self.signer.ok_or(CoreError::MissingComponent("signer"))?;
		let key_registry = self
			.key_registry
			.ok_or(CoreError::MissingComponent("key registry"))?;
		let broadcaster = self
			.broadcaster
			.ok_or(CoreError::MissingComponent("broadcaster"))?;

		let (balance_cache, balances): (Option<Arc<BalanceCache>>, Arc<dyn BalanceInterface>) =
			match (self.balance_service, self.balance_source) {
				(Some(service), _) => (None, service),
				(None, Some(source)) => {
					let cache = Arc::new(BalanceCache::new(source));
					(Some(Arc::clone(&cache)), cache as Arc<dyn BalanceInterface>)
				}
				(None, None) => return Err(CoreError::MissingComponent("balances")),
			};

		let bridge_info: Arc<dyn BridgeInfoInterface> = match self.bridge_info {
			Some(bridge_info) => bridge_info,
			None => Arc::new(StaticBridgeInfo::new(config.bridge.parsed_min_withdrawals())),
		};
		let verifier: Arc<dyn VerifierInterface> = match self.verifier {
			Some(verifier) => verifier,
			None => Arc::new(Erc191Verifier),
		};
		let wallet_errors: Arc<dyn WalletErrorExtractor> = match self.wallet_errors {
			Some(wallet_errors) => wallet_errors,
			None => Arc::new(DefaultWalletErrorExtractor),
		};

		let routes = RouteSelector::new(
			config.routes.internal_chain.clone(),
			config.routes.native_chain.clone(),
			config.routes.virtual_chains.iter().cloned(),
		);
		// Preparations price on their own; the session stream only serves
		// `aggregate_quote`.
		let aggregator = Arc::new(QuoteAggregator::new(Arc::clone(&pricing)));
		let preparer = WithdrawalPreparer::new(
			Arc::clone(&balances),
			bridge_info,
			withdrawal_builder,
			Arc::clone(&aggregator) as Arc<dyn QuoteProvider>,
			routes,
			QuoteSettings {
				wait_budget: config.quote.wait_budget(),
				min_deadline: config.quote.min_deadline(),
				app_fee_bps: config.quote.app_fee_bps,
			},
		);

		let executor = IntentExecutor::new(IntentCollaborators {
			pricing,
			signer,
			verifier,
			key_registry,
			broadcaster,
			wallet_errors,
		});

		Ok(IntentEngine {
			aggregator,
			config,
			lifecycle: LifecycleManager::new(),
			quotes: Arc::new(SessionQuotes::new()),
			balance_cache,
			balances,
			preparer,
			executor,
		})
	}
}
