//! Engine facade for the intent orchestration workspace.
//!
//! [`IntentEngine`] owns the session-scoped services (balance cache, quote
//! stream) and exposes withdrawal preparation, quote aggregation and one-click
//! swap execution behind a single start/shutdown lifecycle.

pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod quotes;

pub use engine::{IntentEngine, IntentEngineBuilder};
pub use error::CoreError;
pub use lifecycle::{LifecycleManager, LifecycleState};
pub use quotes::SessionQuotes;
