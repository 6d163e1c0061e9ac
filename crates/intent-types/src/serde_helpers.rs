//! Serde helpers for types whose wire form differs from their Rust form.

/// Serializes a `U256` as a base-10 string so amounts survive JSON consumers
/// that cannot represent 256-bit integers.
pub mod u256_decimal {
	use alloy::primitives::U256;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&value.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		U256::from_str_radix(&s, 10).map_err(serde::de::Error::custom)
	}
}

/// Serializes raw bytes as a `0x`-prefixed hex string.
pub mod hex_bytes {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&format!("0x{}", hex::encode(value)))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		let s = s.strip_prefix("0x").unwrap_or(&s);
		hex::decode(s).map_err(serde::de::Error::custom)
	}
}

/// Serializes a 32-byte word as a `0x`-prefixed hex string.
pub mod b256_hex {
	use alloy::primitives::B256;
	use serde::{Deserializer, Serializer};

	pub fn serialize<S>(value: &B256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		super::hex_bytes::serialize(value.as_slice(), serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<B256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let bytes = super::hex_bytes::deserialize(deserializer)?;
		if bytes.len() != 32 {
			return Err(serde::de::Error::custom(format!(
				"expected 32 bytes, got {}",
				bytes.len()
			)));
		}
		Ok(B256::from_slice(&bytes))
	}
}

#[cfg(test)]
mod tests {
	use alloy::primitives::U256;
	use serde::{Deserialize, Serialize};

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Wrapper {
		#[serde(with = "super::u256_decimal")]
		amount: U256,
		#[serde(with = "super::hex_bytes")]
		bytes: Vec<u8>,
	}

	#[test]
	fn test_roundtrip_wire_forms() {
		let value = Wrapper {
			amount: U256::from(1_000_000_000_000_000_000u128),
			bytes: vec![0xde, 0xad],
		};
		let json = serde_json::to_string(&value).unwrap();
		assert_eq!(json, r#"{"amount":"1000000000000000000","bytes":"0xdead"}"#);
		assert_eq!(serde_json::from_str::<Wrapper>(&json).unwrap(), value);
	}

	#[test]
	fn test_rejects_non_decimal_amount() {
		let result = serde_json::from_str::<Wrapper>(r#"{"amount":"12ab","bytes":"0x"}"#);
		assert!(result.is_err());
	}
}
