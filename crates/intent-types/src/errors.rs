//! Stable error codes surfaced to callers.
//!
//! Each crate defines its own `thiserror` enum; every variant maps to one of
//! these codes so that callers can react without matching on crate-specific
//! types.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Broad class of a failure, deciding how a caller may react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
	/// Balance could not be read or does not cover the request.
	Balance,
	/// No usable price. Safe to retry, no funds moved.
	Quoting,
	/// Fee could not be estimated or the payout is below the minimum.
	FeeThreshold,
	/// Signature missing, invalid or from another account. Needs the user.
	Signing,
	/// Relay refused or could not be reached.
	Broadcast,
	/// Instruction assembly failed.
	Building,
	/// Caller abandoned the attempt.
	Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
	BalanceFetch,
	BalanceMissing,
	BalanceInsufficient,
	NoQuotes,
	OneClickQuoteFailed,
	NoDepositAddress,
	WithdrawalFeeFetch,
	AmountTooLow,
	BridgeInfoFetch,
	WithdrawalBuild,
	TransferMessageFailed,
	UserDidntSign,
	CannotVerifySignature,
	SignedDifferentAccount,
	PubkeyException,
	PubkeyCheckFailed,
	PubkeyAddingDeclined,
	PubkeyAddingFailed,
	CannotPublishIntent,
	Cancelled,
}

impl ErrorCode {
	pub const ALL: [ErrorCode; 20] = [
		Self::BalanceFetch,
		Self::BalanceMissing,
		Self::BalanceInsufficient,
		Self::NoQuotes,
		Self::OneClickQuoteFailed,
		Self::NoDepositAddress,
		Self::WithdrawalFeeFetch,
		Self::AmountTooLow,
		Self::BridgeInfoFetch,
		Self::WithdrawalBuild,
		Self::TransferMessageFailed,
		Self::UserDidntSign,
		Self::CannotVerifySignature,
		Self::SignedDifferentAccount,
		Self::PubkeyException,
		Self::PubkeyCheckFailed,
		Self::PubkeyAddingDeclined,
		Self::PubkeyAddingFailed,
		Self::CannotPublishIntent,
		Self::Cancelled,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::BalanceFetch => "ERR_BALANCE_FETCH",
			Self::BalanceMissing => "ERR_BALANCE_MISSING",
			Self::BalanceInsufficient => "ERR_BALANCE_INSUFFICIENT",
			Self::NoQuotes => "ERR_NO_QUOTES",
			Self::OneClickQuoteFailed => "ERR_1CS_QUOTE_FAILED",
			Self::NoDepositAddress => "ERR_NO_DEPOSIT_ADDRESS",
			Self::WithdrawalFeeFetch => "ERR_WITHDRAWAL_FEE_FETCH",
			Self::AmountTooLow => "ERR_AMOUNT_TOO_LOW",
			Self::BridgeInfoFetch => "ERR_BRIDGE_INFO_FETCH",
			Self::WithdrawalBuild => "ERR_WITHDRAWAL_BUILD",
			Self::TransferMessageFailed => "ERR_TRANSFER_MESSAGE_FAILED",
			Self::UserDidntSign => "ERR_USER_DIDNT_SIGN",
			Self::CannotVerifySignature => "ERR_CANNOT_VERIFY_SIGNATURE",
			Self::SignedDifferentAccount => "ERR_SIGNED_DIFFERENT_ACCOUNT",
			Self::PubkeyException => "ERR_PUBKEY_EXCEPTION",
			Self::PubkeyCheckFailed => "ERR_PUBKEY_CHECK_FAILED",
			Self::PubkeyAddingDeclined => "ERR_PUBKEY_ADDING_DECLINED",
			Self::PubkeyAddingFailed => "ERR_PUBKEY_ADDING_FAILED",
			Self::CannotPublishIntent => "ERR_CANNOT_PUBLISH_INTENT",
			Self::Cancelled => "ERR_CANCELLED",
		}
	}

	pub fn category(&self) -> ErrorCategory {
		match self {
			Self::BalanceFetch | Self::BalanceMissing | Self::BalanceInsufficient => {
				ErrorCategory::Balance
			}
			Self::NoQuotes | Self::OneClickQuoteFailed | Self::NoDepositAddress => {
				ErrorCategory::Quoting
			}
			Self::WithdrawalFeeFetch | Self::AmountTooLow | Self::BridgeInfoFetch => {
				ErrorCategory::FeeThreshold
			}
			Self::TransferMessageFailed | Self::WithdrawalBuild => ErrorCategory::Building,
			Self::UserDidntSign
			| Self::CannotVerifySignature
			| Self::SignedDifferentAccount
			| Self::PubkeyException
			| Self::PubkeyCheckFailed
			| Self::PubkeyAddingDeclined
			| Self::PubkeyAddingFailed => ErrorCategory::Signing,
			Self::CannotPublishIntent => ErrorCategory::Broadcast,
			Self::Cancelled => ErrorCategory::Cancelled,
		}
	}

	/// Whether the caller may re-run the attempt immediately without user
	/// action.
	pub fn retryable(&self) -> bool {
		self.category() == ErrorCategory::Quoting
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ErrorCode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.iter()
			.copied()
			.find(|code| code.as_str() == s)
			.ok_or_else(|| format!("Unknown error code: {}", s))
	}
}

impl Serialize for ErrorCode {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}
