//! Async driver of the intent state machine.

use crate::state::{IntentState, StepOutcome};
use crate::wallet::WalletErrorExtractor;
use crate::{
	BroadcastInterface, IntentError, KeyRegistryInterface, PublishOutcome, SignerInterface,
	VerifierInterface,
};
use alloy::primitives::keccak256;
use chrono::Utc;
use intent_quote::PricingInterface;
use intent_types::{
	IntentHash, IntentOutcome, OneClickQuote, OneClickQuoteRequest, OneClickQuoteResult,
	SignatureResult, SwapIntentInput, TransferMessage,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// External services an attempt talks to.
#[derive(Clone)]
pub struct IntentCollaborators {
	pub pricing: Arc<dyn PricingInterface>,
	pub signer: Arc<dyn SignerInterface>,
	pub verifier: Arc<dyn VerifierInterface>,
	pub key_registry: Arc<dyn KeyRegistryInterface>,
	pub broadcaster: Arc<dyn BroadcastInterface>,
	pub wallet_errors: Arc<dyn WalletErrorExtractor>,
}

/// Everything recorded during one attempt. Never reused by another attempt.
#[derive(Debug, Clone)]
pub struct IntentExecutionContext {
	pub attempt_id: Uuid,
	pub input: SwapIntentInput,
	pub quote_result: Option<OneClickQuoteResult>,
	pub quote: Option<OneClickQuote>,
	pub deposit_address: Option<String>,
	pub message: Option<TransferMessage>,
	pub signature: Option<SignatureResult>,
	pub intent_hash: Option<IntentHash>,
	pub error: Option<IntentError>,
	/// Visited states in order, starting with the initial state.
	pub history: Vec<IntentState>,
}

impl IntentExecutionContext {
	pub fn new(input: SwapIntentInput) -> Self {
		Self {
			attempt_id: Uuid::new_v4(),
			input,
			quote_result: None,
			quote: None,
			deposit_address: None,
			message: None,
			signature: None,
			intent_hash: None,
			error: None,
			history: vec![IntentState::INITIAL],
		}
	}

	pub fn state(&self) -> IntentState {
		self.history
			.last()
			.copied()
			.unwrap_or(IntentState::INITIAL)
	}

	/// Terminal result of the attempt.
	pub fn outcome(&self) -> Result<IntentOutcome, IntentError> {
		if let Some(error) = &self.error {
			return Err(error.clone());
		}
		match (&self.intent_hash, &self.deposit_address) {
			(Some(intent_hash), Some(deposit_address)) if self.state() == IntentState::Completed => {
				Ok(IntentOutcome {
					intent_hash: intent_hash.clone(),
					deposit_address: deposit_address.clone(),
				})
			}
			_ => Err(IntentError::Publish(format!(
				"Attempt stopped in state {}",
				self.state()
			))),
		}
	}
}

/// A spawned attempt.
pub struct IntentHandle {
	pub attempt_id: Uuid,
	/// Current state, updated on every transition.
	pub state: watch::Receiver<IntentState>,
	pub task: JoinHandle<IntentExecutionContext>,
}

impl IntentHandle {
	pub async fn wait(self) -> Result<IntentExecutionContext, JoinError> {
		self.task.await
	}
}

#[derive(Clone)]
pub struct IntentExecutor {
	collaborators: IntentCollaborators,
}

impl IntentExecutor {
	pub fn new(collaborators: IntentCollaborators) -> Self {
		Self { collaborators }
	}

	/// Runs one attempt to completion.
	pub async fn run(&self, input: SwapIntentInput) -> Result<IntentOutcome, IntentError> {
		self.execute(input).await.outcome()
	}

	/// Runs one attempt and returns its full record.
	pub async fn execute(&self, input: SwapIntentInput) -> IntentExecutionContext {
		self.drive(IntentExecutionContext::new(input), None).await
	}

	/// Runs one attempt as its own task.
	pub fn spawn(&self, input: SwapIntentInput) -> IntentHandle {
		let context = IntentExecutionContext::new(input);
		let attempt_id = context.attempt_id;
		let (state_tx, state_rx) = watch::channel(IntentState::INITIAL);

		let executor = self.clone();
		let task = tokio::spawn(async move { executor.drive(context, Some(state_tx)).await });

		IntentHandle {
			attempt_id,
			state: state_rx,
			task,
		}
	}

	#[instrument(skip_all, fields(attempt = %context.attempt_id))]
	async fn drive(
		&self,
		mut context: IntentExecutionContext,
		observer: Option<watch::Sender<IntentState>>,
	) -> IntentExecutionContext {
		info!(
			asset_in = %context.input.asset_in.id,
			asset_out = %context.input.asset_out.id,
			"Starting intent execution"
		);

		loop {
			let state = context.state();
			if let Some(observer) = &observer {
				observer.send_replace(state);
			}
			if state.is_terminal() {
				break;
			}

			let outcome = match self.enter(state, &mut context).await {
				Ok(()) => StepOutcome::Succeeded,
				Err(e) => {
					warn!(%state, code = %e.code(), "Intent step failed: {}", e);
					context.error = Some(e);
					StepOutcome::Failed
				}
			};

			match state.next(outcome) {
				Ok(next) => {
					debug!("Intent state {} -> {}", state, next);
					context.history.push(next);
				}
				Err(e) => {
					error!("{}", e);
					break;
				}
			}
		}

		match &context.intent_hash {
			Some(hash) if context.error.is_none() => info!(intent_hash = %hash, "Intent published"),
			_ => info!(state = %context.state(), "Intent execution ended without publishing"),
		}
		context
	}

	/// Entry action of a state.
	async fn enter(
		&self,
		state: IntentState,
		context: &mut IntentExecutionContext,
	) -> Result<(), IntentError> {
		match state {
			IntentState::FetchingQuote => self.fetch_quote(context).await,
			IntentState::ValidatingQuote => validate_quote(context),
			IntentState::CreatingTransferMessage => create_transfer_message(context),
			IntentState::Signing => self.sign(context).await,
			IntentState::VerifyingSignature => self.verify_signature(context).await,
			IntentState::VerifyingPublicKeyPresence => self.verify_public_key(context).await,
			IntentState::BroadcastingIntent => self.broadcast(context).await,
			IntentState::Completed | IntentState::Error => Ok(()),
		}
	}

	async fn fetch_quote(&self, context: &mut IntentExecutionContext) -> Result<(), IntentError> {
		let input = &context.input;
		let request = OneClickQuoteRequest {
			asset_in: input.asset_in.clone(),
			asset_out: input.asset_out.clone(),
			amount_in: input.amount_in,
			slippage_bps: input.slippage_bps,
			refund_to: input.user.address.clone(),
			recipient: input
				.recipient
				.clone()
				.unwrap_or_else(|| input.user.address.clone()),
			deadline: input.deadline,
		};

		let result = self
			.collaborators
			.pricing
			.quote_one_click(&request)
			.await
			.map_err(|e| IntentError::QuoteFailed(e.to_string()))?;
		context.quote_result = Some(result);
		Ok(())
	}

	async fn sign(&self, context: &mut IntentExecutionContext) -> Result<(), IntentError> {
		let message = context
			.message
			.as_ref()
			.ok_or_else(|| IntentError::TransferMessage("No transfer message".to_string()))?;

		let signature = self
			.collaborators
			.signer
			.sign(message)
			.await
			.map_err(|e| IntentError::Signing {
				code: self.collaborators.wallet_errors.extract(&e),
				reason: e.to_string(),
			})?;
		context.signature = Some(signature);
		Ok(())
	}

	async fn verify_signature(&self, context: &mut IntentExecutionContext) -> Result<(), IntentError> {
		let signature = context
			.signature
			.as_ref()
			.ok_or_else(|| IntentError::CannotVerifySignature("No signature".to_string()))?;
		let expected = &context.input.user.address;

		match self.collaborators.verifier.verify(signature, expected).await {
			Ok(true) => Ok(()),
			Ok(false) => Err(IntentError::SignedDifferentAccount {
				expected: expected.clone(),
			}),
			Err(e) => Err(IntentError::CannotVerifySignature(e.to_string())),
		}
	}

	async fn verify_public_key(&self, context: &mut IntentExecutionContext) -> Result<(), IntentError> {
		let user = &context.input.user;
		if !user.scheme.requires_key_registration() {
			debug!(scheme = ?user.scheme, "Key registration not required");
			return Ok(());
		}

		let signature = context
			.signature
			.as_ref()
			.ok_or_else(|| IntentError::CannotVerifySignature("No signature".to_string()))?;
		self.collaborators
			.key_registry
			.verify_key_registered(signature, user)
			.await
			.map_err(IntentError::from)
	}

	async fn broadcast(&self, context: &mut IntentExecutionContext) -> Result<(), IntentError> {
		let signature = context
			.signature
			.as_ref()
			.ok_or_else(|| IntentError::Publish("No signature".to_string()))?;

		match self
			.collaborators
			.broadcaster
			.publish(signature, &context.input.user)
			.await
		{
			Ok(PublishOutcome::Accepted(hash)) => {
				context.intent_hash = Some(hash);
				Ok(())
			}
			Ok(PublishOutcome::Rejected { reason }) => Err(IntentError::Publish(reason)),
			Err(e) => Err(IntentError::Publish(e.to_string())),
		}
	}
}

fn validate_quote(context: &mut IntentExecutionContext) -> Result<(), IntentError> {
	match &context.quote_result {
		Some(OneClickQuoteResult::Ok(quote)) => {
			let deposit_address = quote
				.deposit_address
				.clone()
				.filter(|address| !address.is_empty())
				.ok_or(IntentError::NoDepositAddress)?;
			context.quote = Some(quote.clone());
			context.deposit_address = Some(deposit_address);
			Ok(())
		}
		Some(OneClickQuoteResult::Err { reason }) => Err(IntentError::QuoteFailed(reason.clone())),
		None => Err(IntentError::QuoteFailed("No quote received".to_string())),
	}
}

fn create_transfer_message(context: &mut IntentExecutionContext) -> Result<(), IntentError> {
	let (Some(quote), Some(deposit_address)) = (&context.quote, &context.deposit_address) else {
		return Err(IntentError::TransferMessage("Quote was not validated".to_string()));
	};
	if context.input.amount_in.is_zero() {
		return Err(IntentError::TransferMessage("Amount must be positive".to_string()));
	}
	if quote.deadline <= Utc::now() {
		return Err(IntentError::TransferMessage(format!(
			"Quote deadline {} already passed",
			quote.deadline
		)));
	}

	let message = TransferMessage {
		signer_id: context.input.user.address.clone(),
		receiver_id: deposit_address.clone(),
		token: context.input.asset_in.id.clone(),
		amount: context.input.amount_in,
		deadline: quote.deadline,
		nonce: keccak256(Uuid::new_v4().as_bytes()),
	};
	// The signer receives the payload form; make sure it exists.
	message
		.payload()
		.map_err(|e| IntentError::TransferMessage(e.to_string()))?;

	context.message = Some(message);
	Ok(())
}
