//! Precision-aware token amounts.
//!
//! Every amount handled by the engine is a [`TokenValue`]: a raw on-chain
//! integer paired with the decimal precision of the deployment it is
//! denominated in. Comparison and arithmetic always align both operands to
//! the larger of the two precisions first, so `1.0` at 6 decimals equals
//! `1.000` at 9 decimals.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors produced by token amount arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
	/// Scaling or addition exceeded the 256-bit range.
	#[error("Amount overflow at {decimals} decimals")]
	Overflow { decimals: u8 },
	/// Subtraction would produce a negative amount.
	#[error("Amount underflow: {minuend} - {subtrahend}")]
	Underflow { minuend: String, subtrahend: String },
	/// A decimal string could not be parsed.
	#[error("Invalid amount: {0}")]
	InvalidFormat(String),
}

/// An unsigned integer amount tagged with its decimal precision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenValue {
	/// Raw amount in the smallest unit of the deployment.
	#[serde(with = "crate::serde_helpers::u256_decimal")]
	pub amount: U256,
	/// Number of decimals the raw amount is expressed in.
	pub decimals: u8,
}

/// Returns `10^exp`, or `None` when it does not fit in 256 bits.
fn pow10(exp: u8) -> Option<U256> {
	U256::from(10u64).checked_pow(U256::from(exp))
}

impl TokenValue {
	pub fn new(amount: U256, decimals: u8) -> Self {
		Self { amount, decimals }
	}

	pub fn zero(decimals: u8) -> Self {
		Self::new(U256::ZERO, decimals)
	}

	/// The smallest representable non-zero amount at this precision.
	pub fn one_unit(decimals: u8) -> Self {
		Self::new(U256::from(1u64), decimals)
	}

	pub fn is_zero(&self) -> bool {
		self.amount.is_zero()
	}

	/// Re-expresses the value at another precision.
	///
	/// Scaling up is exact and fails only on overflow. Scaling down truncates
	/// toward zero.
	pub fn convert(&self, decimals: u8) -> Result<TokenValue, AmountError> {
		let amount = match decimals.cmp(&self.decimals) {
			Ordering::Equal => self.amount,
			Ordering::Greater => {
				let factor =
					pow10(decimals - self.decimals).ok_or(AmountError::Overflow { decimals })?;
				self.amount
					.checked_mul(factor)
					.ok_or(AmountError::Overflow { decimals })?
			}
			Ordering::Less => self.truncated_amount(decimals),
		};
		Ok(TokenValue { amount, decimals })
	}

	/// Raw amount after truncating to a lower precision.
	fn truncated_amount(&self, decimals: u8) -> U256 {
		if decimals >= self.decimals {
			return self.amount;
		}
		match pow10(self.decimals - decimals) {
			Some(factor) => self.amount / factor,
			None => U256::ZERO,
		}
	}

	/// True when the value has no representable part at `decimals`.
	///
	/// Used for dust suppression: an amount that truncates to zero at the
	/// destination precision cannot be paid out there.
	pub fn is_zero_at(&self, decimals: u8) -> bool {
		self.truncated_amount(decimals).is_zero()
	}

	/// The value with any digits below `decimals` dropped, kept at its own
	/// precision.
	pub fn truncate_to(&self, decimals: u8) -> Result<TokenValue, AmountError> {
		if decimals >= self.decimals {
			return Ok(*self);
		}
		TokenValue::new(self.truncated_amount(decimals), decimals).convert(self.decimals)
	}

	/// Aligns both operands to the larger precision.
	fn align(&self, other: &TokenValue) -> Result<(U256, U256, u8), AmountError> {
		let decimals = self.decimals.max(other.decimals);
		let lhs = self.convert(decimals)?;
		let rhs = other.convert(decimals)?;
		Ok((lhs.amount, rhs.amount, decimals))
	}

	pub fn checked_add(&self, other: &TokenValue) -> Result<TokenValue, AmountError> {
		let (lhs, rhs, decimals) = self.align(other)?;
		let amount = lhs
			.checked_add(rhs)
			.ok_or(AmountError::Overflow { decimals })?;
		Ok(TokenValue { amount, decimals })
	}

	pub fn checked_sub(&self, other: &TokenValue) -> Result<TokenValue, AmountError> {
		let (lhs, rhs, decimals) = self.align(other)?;
		let amount = lhs.checked_sub(rhs).ok_or_else(|| AmountError::Underflow {
			minuend: self.to_string(),
			subtrahend: other.to_string(),
		})?;
		Ok(TokenValue { amount, decimals })
	}

	/// Subtraction clamped at zero.
	pub fn saturating_sub(&self, other: &TokenValue) -> Result<TokenValue, AmountError> {
		let (lhs, rhs, decimals) = self.align(other)?;
		Ok(TokenValue {
			amount: lhs.saturating_sub(rhs),
			decimals,
		})
	}

	/// Sums values at the largest precision among them (and `decimals`).
	pub fn sum<'a, I>(values: I, decimals: u8) -> Result<TokenValue, AmountError>
	where
		I: IntoIterator<Item = &'a TokenValue>,
	{
		values
			.into_iter()
			.try_fold(TokenValue::zero(decimals), |acc, value| acc.checked_add(value))
	}

	/// Parses a human-readable decimal string such as `"12.5"`.
	pub fn parse(input: &str, decimals: u8) -> Result<TokenValue, AmountError> {
		let input = input.trim();
		let (integer, fraction) = match input.split_once('.') {
			Some((integer, fraction)) => (integer, fraction),
			None => (input, ""),
		};

		let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
		if (integer.is_empty() && fraction.is_empty()) || !is_digits(integer) || !is_digits(fraction)
		{
			return Err(AmountError::InvalidFormat(input.to_string()));
		}
		if fraction.len() > decimals as usize {
			return Err(AmountError::InvalidFormat(format!(
				"{} has more than {} decimals",
				input, decimals
			)));
		}

		let parse_part = |s: &str| -> Result<U256, AmountError> {
			if s.is_empty() {
				return Ok(U256::ZERO);
			}
			U256::from_str_radix(s, 10).map_err(|_| AmountError::InvalidFormat(input.to_string()))
		};

		let scale = pow10(decimals).ok_or(AmountError::Overflow { decimals })?;
		let fraction_scale =
			pow10(decimals - fraction.len() as u8).ok_or(AmountError::Overflow { decimals })?;

		let amount = parse_part(integer)?
			.checked_mul(scale)
			.and_then(|whole| {
				parse_part(fraction)
					.ok()
					.and_then(|f| f.checked_mul(fraction_scale))
					.and_then(|f| whole.checked_add(f))
			})
			.ok_or(AmountError::Overflow { decimals })?;

		Ok(TokenValue { amount, decimals })
	}
}

impl PartialEq for TokenValue {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for TokenValue {}

impl PartialOrd for TokenValue {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for TokenValue {
	fn cmp(&self, other: &Self) -> Ordering {
		// Only the lower-precision side is scaled up; if that overflows it is
		// necessarily the larger value.
		match (
			self.convert(other.decimals.max(self.decimals)),
			other.convert(self.decimals.max(other.decimals)),
		) {
			(Ok(lhs), Ok(rhs)) => lhs.amount.cmp(&rhs.amount),
			(Err(_), _) => Ordering::Greater,
			(_, Err(_)) => Ordering::Less,
		}
	}
}

impl fmt::Display for TokenValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.decimals == 0 {
			return write!(f, "{}", self.amount);
		}

		let (integer, fraction) = match pow10(self.decimals) {
			Some(scale) => (self.amount / scale, self.amount % scale),
			None => (U256::ZERO, self.amount),
		};

		let fraction = format!(
			"{:0>width$}",
			fraction.to_string(),
			width = self.decimals as usize
		);
		let fraction = fraction.trim_end_matches('0');
		if fraction.is_empty() {
			write!(f, "{}", integer)
		} else {
			write!(f, "{}.{}", integer, fraction)
		}
	}
}
