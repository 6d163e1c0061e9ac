//! Shared types for the intent orchestration engine.
//!
//! This crate defines the data model used by every other crate in the
//! workspace: precision-aware token amounts, asset deployments and families,
//! price quotations, withdrawal instructions, intent messages and the stable
//! error codes surfaced to callers.

pub mod amount;
pub mod asset;
pub mod errors;
pub mod intent;
pub mod quote;
pub mod serde_helpers;
pub mod withdrawal;

pub use amount::*;
pub use asset::*;
pub use errors::*;
pub use intent::*;
pub use quote::*;
pub use withdrawal::*;

/// Re-export of the integer type used for raw on-chain amounts.
pub use alloy::primitives::U256;
