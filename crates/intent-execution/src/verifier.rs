//! EIP-191 signature verification.

use crate::{VerifierError, VerifierInterface};
use alloy::primitives::{Address, Signature};
use async_trait::async_trait;
use intent_types::{SignatureResult, SignatureScheme};
use tracing::debug;

/// Recovers the signer of an EIP-191 personal message and compares it with
/// the expected EVM address.
#[derive(Debug, Clone, Copy, Default)]
pub struct Erc191Verifier;

#[async_trait]
impl VerifierInterface for Erc191Verifier {
	async fn verify(
		&self,
		signature: &SignatureResult,
		expected_signer: &str,
	) -> Result<bool, VerifierError> {
		if signature.scheme != SignatureScheme::Erc191 {
			return Err(VerifierError::Unsupported(signature.scheme));
		}

		let expected: Address = expected_signer
			.parse()
			.map_err(|e| VerifierError::InvalidAddress(format!("{}: {}", expected_signer, e)))?;

		let parsed = Signature::try_from(signature.signature.as_slice())
			.map_err(|e| VerifierError::InvalidSignature(e.to_string()))?;
		let recovered = parsed
			.recover_address_from_msg(signature.payload.as_bytes())
			.map_err(|e| VerifierError::InvalidSignature(e.to_string()))?;

		debug!(%recovered, %expected, "Recovered EIP-191 signer");
		Ok(recovered == expected)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::signers::local::PrivateKeySigner;
	use alloy::signers::Signer;

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const OTHER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

	async fn signed(key: &str, payload: &str) -> (SignatureResult, String) {
		let signer: PrivateKeySigner = key.parse().unwrap();
		let signature = signer.sign_message(payload.as_bytes()).await.unwrap();
		(
			SignatureResult {
				scheme: SignatureScheme::Erc191,
				payload: payload.to_string(),
				signature: signature.as_bytes().to_vec(),
				public_key: None,
			},
			signer.address().to_string(),
		)
	}

	#[tokio::test]
	async fn test_matching_signer() {
		let (signature, address) = signed(KEY, r#"{"amount":"1"}"#).await;
		assert!(Erc191Verifier.verify(&signature, &address).await.unwrap());
		// Address comparison is case-insensitive.
		assert!(Erc191Verifier
			.verify(&signature, &address.to_lowercase())
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn test_different_signer() {
		let (signature, _) = signed(OTHER_KEY, "payload").await;
		let (_, expected) = signed(KEY, "payload").await;
		assert!(!Erc191Verifier.verify(&signature, &expected).await.unwrap());
	}

	#[tokio::test]
	async fn test_tampered_payload_does_not_match() {
		let (mut signature, address) = signed(KEY, "payload").await;
		signature.payload = "other payload".to_string();
		assert!(!Erc191Verifier.verify(&signature, &address).await.unwrap());
	}

	#[tokio::test]
	async fn test_malformed_inputs() {
		let (mut signature, address) = signed(KEY, "payload").await;

		assert!(matches!(
			Erc191Verifier.verify(&signature, "not-an-address").await,
			Err(VerifierError::InvalidAddress(_))
		));

		signature.signature.truncate(10);
		assert!(matches!(
			Erc191Verifier.verify(&signature, &address).await,
			Err(VerifierError::InvalidSignature(_))
		));

		signature.scheme = SignatureScheme::Nep413;
		assert_eq!(
			Erc191Verifier.verify(&signature, &address).await,
			Err(VerifierError::Unsupported(SignatureScheme::Nep413))
		);
	}
}
