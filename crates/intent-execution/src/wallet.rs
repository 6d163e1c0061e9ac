//! Classification of wallet signing failures.

use crate::SignerError;
use intent_types::{ErrorCategory, ErrorCode};

/// Maps a signer failure to the code reported to the caller.
pub trait WalletErrorExtractor: Send + Sync {
	fn extract(&self, error: &SignerError) -> ErrorCode;
}

/// Honours an explicit signing-category code from the wallet and otherwise
/// reports that the user did not sign.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWalletErrorExtractor;

impl WalletErrorExtractor for DefaultWalletErrorExtractor {
	fn extract(&self, error: &SignerError) -> ErrorCode {
		match error {
			SignerError::Wallet {
				code: Some(code), ..
			} => code
				.parse::<ErrorCode>()
				.ok()
				.filter(|code| code.category() == ErrorCategory::Signing)
				.unwrap_or(ErrorCode::UserDidntSign),
			_ => ErrorCode::UserDidntSign,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_extraction() {
		let extractor = DefaultWalletErrorExtractor;

		assert_eq!(
			extractor.extract(&SignerError::Rejected("closed popup".to_string())),
			ErrorCode::UserDidntSign
		);
		assert_eq!(
			extractor.extract(&SignerError::Wallet {
				code: Some("ERR_PUBKEY_ADDING_DECLINED".to_string()),
				message: "declined".to_string(),
			}),
			ErrorCode::PubkeyAddingDeclined
		);
		// Known code outside the signing category is not trusted.
		assert_eq!(
			extractor.extract(&SignerError::Wallet {
				code: Some("ERR_NO_QUOTES".to_string()),
				message: "?".to_string(),
			}),
			ErrorCode::UserDidntSign
		);
		assert_eq!(
			extractor.extract(&SignerError::Wallet {
				code: Some("4001".to_string()),
				message: "User rejected".to_string(),
			}),
			ErrorCode::UserDidntSign
		);
	}
}
