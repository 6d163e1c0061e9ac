//! Intent execution for one-click swaps.
//!
//! An attempt walks a fixed sequence of states: fetch a quote, validate it,
//! build the transfer message, have the user sign it, verify the signature,
//! confirm the signing key is registered where needed, and publish the
//! signed intent. Every step has exactly one failure code; nothing is retried
//! automatically.

use async_trait::async_trait;
use intent_types::{
	ErrorCode, IntentHash, SignatureResult, SignatureScheme, TransferMessage, UserInfo,
};
use thiserror::Error;

pub mod executor;
pub mod state;
pub mod verifier;
pub mod wallet;

pub use executor::{IntentCollaborators, IntentExecutionContext, IntentExecutor, IntentHandle};
pub use state::{IntentState, StepOutcome, TransitionError};
pub use verifier::Erc191Verifier;
pub use wallet::{DefaultWalletErrorExtractor, WalletErrorExtractor};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
	#[error("User rejected the signature request: {0}")]
	Rejected(String),
	#[error("Wallet error: {message}")]
	Wallet {
		/// Machine-readable code reported by the wallet, if any.
		code: Option<String>,
		message: String,
	},
	#[error("Signer unavailable: {0}")]
	Unavailable(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifierError {
	#[error("Malformed signature: {0}")]
	InvalidSignature(String),
	#[error("Invalid signer address: {0}")]
	InvalidAddress(String),
	#[error("Unsupported signature scheme: {0:?}")]
	Unsupported(SignatureScheme),
}

/// Failures of the key registration check, one code each.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyRegistryError {
	#[error("Public key check failed: {0}")]
	CheckFailed(String),
	#[error("User declined adding the public key: {0}")]
	AddingDeclined(String),
	#[error("Adding the public key failed: {0}")]
	AddingFailed(String),
	#[error("Unexpected key registry failure: {0}")]
	Exception(String),
}

impl KeyRegistryError {
	pub fn code(&self) -> ErrorCode {
		match self {
			KeyRegistryError::CheckFailed(_) => ErrorCode::PubkeyCheckFailed,
			KeyRegistryError::AddingDeclined(_) => ErrorCode::PubkeyAddingDeclined,
			KeyRegistryError::AddingFailed(_) => ErrorCode::PubkeyAddingFailed,
			KeyRegistryError::Exception(_) => ErrorCode::PubkeyException,
		}
	}
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BroadcastError {
	#[error("Relay transport error: {0}")]
	Transport(String),
}

/// Answer of the settlement relay to a publish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
	Accepted(IntentHash),
	Rejected { reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntentError {
	#[error("One-click quote failed: {0}")]
	QuoteFailed(String),
	#[error("Quote has no deposit address")]
	NoDepositAddress,
	#[error("Failed to create transfer message: {0}")]
	TransferMessage(String),
	#[error("Signing failed ({code}): {reason}")]
	Signing { code: ErrorCode, reason: String },
	#[error("Cannot verify signature: {0}")]
	CannotVerifySignature(String),
	#[error("Message was signed by an account other than {expected}")]
	SignedDifferentAccount { expected: String },
	#[error("Public key verification failed ({code}): {reason}")]
	PublicKey { code: ErrorCode, reason: String },
	#[error("Cannot publish intent: {0}")]
	Publish(String),
}

impl IntentError {
	pub fn code(&self) -> ErrorCode {
		match self {
			IntentError::QuoteFailed(_) => ErrorCode::OneClickQuoteFailed,
			IntentError::NoDepositAddress => ErrorCode::NoDepositAddress,
			IntentError::TransferMessage(_) => ErrorCode::TransferMessageFailed,
			IntentError::Signing { code, .. } | IntentError::PublicKey { code, .. } => *code,
			IntentError::CannotVerifySignature(_) => ErrorCode::CannotVerifySignature,
			IntentError::SignedDifferentAccount { .. } => ErrorCode::SignedDifferentAccount,
			IntentError::Publish(_) => ErrorCode::CannotPublishIntent,
		}
	}

	/// Quote failures may be re-run right away; anything from signing on
	/// needs the user.
	pub fn retryable(&self) -> bool {
		self.code().retryable()
	}
}

impl From<KeyRegistryError> for IntentError {
	fn from(error: KeyRegistryError) -> Self {
		IntentError::PublicKey {
			code: error.code(),
			reason: error.to_string(),
		}
	}
}

/// The user's wallet.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignerInterface: Send + Sync {
	async fn sign(&self, message: &TransferMessage) -> Result<SignatureResult, SignerError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerifierInterface: Send + Sync {
	/// `Ok(false)` when the signature is valid but belongs to someone other
	/// than `expected_signer`.
	async fn verify(
		&self,
		signature: &SignatureResult,
		expected_signer: &str,
	) -> Result<bool, VerifierError>;
}

/// Confirms the signing key is registered for the account, adding it if the
/// user agrees.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyRegistryInterface: Send + Sync {
	async fn verify_key_registered(
		&self,
		signature: &SignatureResult,
		user: &UserInfo,
	) -> Result<(), KeyRegistryError>;
}

/// The settlement relay.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BroadcastInterface: Send + Sync {
	async fn publish(
		&self,
		signature: &SignatureResult,
		user: &UserInfo,
	) -> Result<PublishOutcome, BroadcastError>;
}
