// intent-core/src/error.rs

use crate::lifecycle::LifecycleState;
use intent_config::ConfigError;
use intent_execution::IntentError;
use intent_quote::QuoteError;
use intent_types::ErrorCode;
use intent_withdrawal::WithdrawalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("Missing component: {0}")]
	MissingComponent(&'static str),

	#[error("Lifecycle error: {0}")]
	Lifecycle(String),

	#[error("Engine is not running (state: {0})")]
	NotRunning(LifecycleState),

	#[error(transparent)]
	Quote(#[from] QuoteError),

	#[error(transparent)]
	Withdrawal(#[from] WithdrawalError),

	#[error(transparent)]
	Intent(#[from] IntentError),
}

impl CoreError {
	/// Stable code for failures that originate in an operation. Engine
	/// misuse has none.
	pub fn code(&self) -> Option<ErrorCode> {
		match self {
			CoreError::Quote(e) => Some(e.code()),
			CoreError::Withdrawal(e) => Some(e.code()),
			CoreError::Intent(e) => Some(e.code()),
			_ => None,
		}
	}
}
