// intent-execution/src/state.rs

use thiserror::Error;

/// Step of an intent execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentState {
	FetchingQuote,
	ValidatingQuote,
	CreatingTransferMessage,
	Signing,
	VerifyingSignature,
	VerifyingPublicKeyPresence,
	BroadcastingIntent,
	Completed,
	Error,
}

impl std::fmt::Display for IntentState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::FetchingQuote => write!(f, "FetchingQuote"),
			Self::ValidatingQuote => write!(f, "ValidatingQuote"),
			Self::CreatingTransferMessage => write!(f, "CreatingTransferMessage"),
			Self::Signing => write!(f, "Signing"),
			Self::VerifyingSignature => write!(f, "VerifyingSignature"),
			Self::VerifyingPublicKeyPresence => write!(f, "VerifyingPublicKeyPresence"),
			Self::BroadcastingIntent => write!(f, "BroadcastingIntent"),
			Self::Completed => write!(f, "Completed"),
			Self::Error => write!(f, "Error"),
		}
	}
}

/// Result of a state's entry action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
	Succeeded,
	Failed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid intent state transition from {from} to {to}")]
pub struct TransitionError {
	pub from: IntentState,
	pub to: IntentState,
}

impl IntentState {
	pub const INITIAL: IntentState = IntentState::FetchingQuote;

	pub fn is_terminal(&self) -> bool {
		matches!(self, IntentState::Completed | IntentState::Error)
	}

	/// The state reached when this one succeeds.
	fn on_success(&self) -> Option<IntentState> {
		use IntentState::*;
		match self {
			FetchingQuote => Some(ValidatingQuote),
			ValidatingQuote => Some(CreatingTransferMessage),
			CreatingTransferMessage => Some(Signing),
			Signing => Some(VerifyingSignature),
			VerifyingSignature => Some(VerifyingPublicKeyPresence),
			VerifyingPublicKeyPresence => Some(BroadcastingIntent),
			BroadcastingIntent => Some(Completed),
			Completed | Error => None,
		}
	}

	/// Whether `to` directly follows this state: its success successor, or
	/// `Error` from any non-terminal state.
	pub fn can_transition_to(&self, to: IntentState) -> bool {
		if self.is_terminal() {
			return false;
		}
		to == IntentState::Error || self.on_success() == Some(to)
	}

	/// The single transition function of the machine.
	pub fn next(self, outcome: StepOutcome) -> Result<IntentState, TransitionError> {
		let to = match outcome {
			StepOutcome::Succeeded => self.on_success().unwrap_or(self),
			StepOutcome::Failed => IntentState::Error,
		};

		if self.can_transition_to(to) {
			Ok(to)
		} else {
			Err(TransitionError { from: self, to })
		}
	}

	/// Position along the success path; `Error` has none.
	pub fn ordinal(&self) -> Option<usize> {
		use IntentState::*;
		[
			FetchingQuote,
			ValidatingQuote,
			CreatingTransferMessage,
			Signing,
			VerifyingSignature,
			VerifyingPublicKeyPresence,
			BroadcastingIntent,
			Completed,
		]
		.iter()
		.position(|state| state == self)
	}
}
