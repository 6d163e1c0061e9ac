//! Intent messages, signatures and execution inputs.

use crate::AssetDeployment;
use alloy::primitives::{keccak256, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signature scheme a user's wallet produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureScheme {
	/// EIP-191 personal message signed by an EVM account.
	Erc191,
	/// NEP-413 message signed by a key registered on a NEAR-style account.
	Nep413,
	/// Raw ed25519 signature over the message bytes.
	RawEd25519,
}

impl SignatureScheme {
	/// Whether the signing key must be registered on-chain for the account
	/// before the relay accepts the intent.
	pub fn requires_key_registration(&self) -> bool {
		matches!(self, SignatureScheme::Nep413)
	}
}

/// The user an intent is executed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	/// Address or account id in the wallet's native format.
	pub address: String,
	pub scheme: SignatureScheme,
}

/// Unsigned message moving an amount to a deposit address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMessage {
	pub signer_id: String,
	pub receiver_id: String,
	pub token: crate::DeploymentId,
	#[serde(with = "crate::serde_helpers::u256_decimal")]
	pub amount: U256,
	pub deadline: DateTime<Utc>,
	#[serde(with = "crate::serde_helpers::b256_hex")]
	pub nonce: B256,
}

impl TransferMessage {
	/// Canonical JSON payload presented to the signer.
	pub fn payload(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	/// Keccak-256 of the canonical payload.
	pub fn hash(&self) -> Result<B256, serde_json::Error> {
		Ok(keccak256(self.payload()?.as_bytes()))
	}
}

/// What a wallet returned after signing a [`TransferMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResult {
	pub scheme: SignatureScheme,
	/// The exact payload the wallet signed.
	pub payload: String,
	#[serde(with = "crate::serde_helpers::hex_bytes")]
	pub signature: Vec<u8>,
	/// Public key reported by the wallet, for schemes that expose one.
	pub public_key: Option<String>,
}

/// Identifier assigned by the settlement relay to a published intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentHash(pub String);

impl fmt::Display for IntentHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Input of a one-click swap attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapIntentInput {
	pub user: UserInfo,
	pub asset_in: AssetDeployment,
	pub asset_out: AssetDeployment,
	pub amount_in: U256,
	pub slippage_bps: u16,
	/// Recipient of the output; defaults to the user when `None`.
	pub recipient: Option<String>,
	/// Latest acceptable settlement time requested from the pricing service.
	pub deadline: DateTime<Utc>,
}

/// Terminal success of an intent execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentOutcome {
	pub intent_hash: IntentHash,
	pub deposit_address: String,
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_payload_is_stable() {
		let message = TransferMessage {
			signer_id: "alice.near".to_string(),
			receiver_id: "deposit.near".to_string(),
			token: "nep141:usdc.near".into(),
			amount: U256::from(1_500_000u64),
			deadline: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
			nonce: B256::ZERO,
		};

		let payload = message.payload().unwrap();
		assert!(payload.contains(r#""amount":"1500000""#));
		assert!(payload.contains(r#""receiver_id":"deposit.near""#));
		assert_eq!(message.hash().unwrap(), keccak256(payload.as_bytes()));
	}

	#[test]
	fn test_only_nep413_requires_registration() {
		assert!(SignatureScheme::Nep413.requires_key_registration());
		assert!(!SignatureScheme::Erc191.requires_key_registration());
		assert!(!SignatureScheme::RawEd25519.requires_key_registration());
	}
}
