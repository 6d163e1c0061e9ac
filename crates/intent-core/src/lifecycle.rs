// intent-core/src/lifecycle.rs

use crate::error::CoreError;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Uninitialized,
	Initializing,
	Running,
	Stopping,
	Stopped,
	Failed,
}

impl std::fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Uninitialized => write!(f, "Uninitialized"),
			Self::Initializing => write!(f, "Initializing"),
			Self::Running => write!(f, "Running"),
			Self::Stopping => write!(f, "Stopping"),
			Self::Stopped => write!(f, "Stopped"),
			Self::Failed => write!(f, "Failed"),
		}
	}
}

impl LifecycleState {
	fn can_transition_to(self, to: LifecycleState) -> bool {
		use LifecycleState::*;

		match (self, to) {
			(Uninitialized, Initializing) => true,
			(Initializing, Running) => true,
			(Running, Stopping) => true,
			(Stopping, Stopped) => true,
			(Failed, Failed) => false,
			(_, Failed) => true,
			_ => false,
		}
	}
}

/// Engine lifecycle: one start, one shutdown.
pub struct LifecycleManager {
	state: RwLock<LifecycleState>,
	shutdown: CancellationToken,
}

impl LifecycleManager {
	pub fn new() -> Self {
		Self {
			state: RwLock::new(LifecycleState::Uninitialized),
			shutdown: CancellationToken::new(),
		}
	}

	pub async fn get_state(&self) -> LifecycleState {
		*self.state.read().await
	}

	pub async fn set_state(&self, new_state: LifecycleState) -> Result<(), CoreError> {
		let mut state = self.state.write().await;
		let old_state = *state;

		if !old_state.can_transition_to(new_state) {
			return Err(CoreError::Lifecycle(format!(
				"Invalid state transition from {} to {}",
				old_state, new_state
			)));
		}

		*state = new_state;
		info!("Lifecycle state changed: {} -> {}", old_state, new_state);
		Ok(())
	}

	pub async fn initialize(&self) -> Result<(), CoreError> {
		self.set_state(LifecycleState::Initializing).await
	}

	pub async fn start(&self) -> Result<(), CoreError> {
		self.set_state(LifecycleState::Running).await
	}

	/// Moves to `Stopping` and fires the shutdown token.
	pub async fn begin_shutdown(&self) -> Result<(), CoreError> {
		self.set_state(LifecycleState::Stopping).await?;
		self.shutdown.cancel();
		Ok(())
	}

	pub async fn finish_shutdown(&self) -> Result<(), CoreError> {
		self.set_state(LifecycleState::Stopped).await
	}

	pub async fn fail(&self) -> Result<(), CoreError> {
		self.set_state(LifecycleState::Failed).await
	}

	/// Cancelled once shutdown begins. Child tokens of it are handed to
	/// long-running operations.
	pub fn shutdown_token(&self) -> CancellationToken {
		self.shutdown.clone()
	}

	pub async fn is_running(&self) -> bool {
		*self.state.read().await == LifecycleState::Running
	}

	pub async fn ensure_running(&self) -> Result<(), CoreError> {
		match self.get_state().await {
			LifecycleState::Running => Ok(()),
			other => Err(CoreError::NotRunning(other)),
		}
	}

	pub async fn is_stopped(&self) -> bool {
		matches!(
			*self.state.read().await,
			LifecycleState::Stopped | LifecycleState::Failed
		)
	}
}

impl Default for LifecycleManager {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_full_lifecycle() {
		let lifecycle = LifecycleManager::new();
		assert!(matches!(
			lifecycle.ensure_running().await,
			Err(CoreError::NotRunning(LifecycleState::Uninitialized))
		));

		lifecycle.initialize().await.unwrap();
		lifecycle.start().await.unwrap();
		lifecycle.ensure_running().await.unwrap();

		let token = lifecycle.shutdown_token();
		lifecycle.begin_shutdown().await.unwrap();
		assert!(token.is_cancelled());
		lifecycle.finish_shutdown().await.unwrap();
		assert!(lifecycle.is_stopped().await);
	}

	#[tokio::test]
	async fn test_invalid_transitions() {
		let lifecycle = LifecycleManager::new();
		assert!(lifecycle.start().await.is_err());
		assert!(lifecycle.begin_shutdown().await.is_err());

		lifecycle.initialize().await.unwrap();
		lifecycle.fail().await.unwrap();
		assert!(lifecycle.fail().await.is_err());
		assert!(lifecycle.initialize().await.is_err());
		assert!(lifecycle.is_stopped().await);
	}
}
