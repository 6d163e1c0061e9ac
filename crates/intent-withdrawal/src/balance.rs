//! Known balances per deployment.
//!
//! [`BalanceCache`] is the session-owned balance service. It keeps the last
//! fetched balance per deployment, runs a refresh worker between explicit
//! `start`/`stop` calls, and publishes readiness through a watch channel so
//! callers can await an outstanding refresh.

use async_trait::async_trait;
use dashmap::DashMap;
use intent_types::{DeploymentId, TokenValue};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalanceError {
	#[error("Balance fetch failed: {0}")]
	Fetch(String),
	#[error("Balance service not running")]
	NotRunning,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceInterface: Send + Sync {
	/// Snapshot of every balance known so far.
	fn balances(&self) -> HashMap<DeploymentId, TokenValue>;

	/// Asks for the given deployments to be (re)fetched.
	fn request_refresh(&self, ids: &[DeploymentId]);

	/// Resolves once no refresh is outstanding. Fails when the last refresh
	/// failed.
	async fn wait_ready(&self) -> Result<(), BalanceError>;
}

/// Reads balances from wherever they live (RPC, indexer, ...).
#[async_trait]
pub trait BalanceSource: Send + Sync {
	async fn fetch(
		&self,
		ids: &[DeploymentId],
	) -> Result<HashMap<DeploymentId, TokenValue>, BalanceError>;
}

#[derive(Debug, Clone, Default)]
struct Readiness {
	/// Refresh requests accepted but not yet completed.
	pending: usize,
	last_error: Option<BalanceError>,
}

struct Worker {
	requests: mpsc::UnboundedSender<Vec<DeploymentId>>,
	shutdown: CancellationToken,
	task: JoinHandle<()>,
}

pub struct BalanceCache {
	source: Arc<dyn BalanceSource>,
	balances: Arc<DashMap<DeploymentId, TokenValue>>,
	readiness: watch::Sender<Readiness>,
	worker: Mutex<Option<Worker>>,
}

impl BalanceCache {
	pub fn new(source: Arc<dyn BalanceSource>) -> Self {
		let (readiness, _) = watch::channel(Readiness::default());
		Self {
			source,
			balances: Arc::new(DashMap::new()),
			readiness,
			worker: Mutex::new(None),
		}
	}

	/// Starts the refresh worker. Starting twice is a no-op.
	pub fn start(&self) {
		let Ok(mut worker) = self.worker.lock() else {
			warn!("Balance cache lock poisoned");
			return;
		};
		if worker.is_some() {
			return;
		}

		let (requests, receiver) = mpsc::unbounded_channel();
		let shutdown = CancellationToken::new();
		let task = tokio::spawn(refresh_loop(
			Arc::clone(&self.source),
			Arc::clone(&self.balances),
			self.readiness.clone(),
			receiver,
			shutdown.clone(),
		));

		*worker = Some(Worker {
			requests,
			shutdown,
			task,
		});
		info!("Balance cache started");
	}

	/// Stops the worker; outstanding refreshes fail with `NotRunning`.
	pub async fn stop(&self) {
		let worker = self.worker.lock().ok().and_then(|mut worker| worker.take());
		if let Some(worker) = worker {
			worker.shutdown.cancel();
			if let Err(e) = worker.task.await {
				warn!("Balance refresh worker ended abnormally: {}", e);
			}
			self.readiness.send_modify(|state| {
				if state.pending > 0 {
					state.pending = 0;
					state.last_error = Some(BalanceError::NotRunning);
				}
			});
			info!("Balance cache stopped");
		}
	}

	pub fn is_running(&self) -> bool {
		self.worker
			.lock()
			.map(|worker| worker.is_some())
			.unwrap_or(false)
	}

	/// Records a balance observed elsewhere, e.g. after a settled transfer.
	pub fn set_balance(&self, id: DeploymentId, value: TokenValue) {
		self.balances.insert(id, value);
	}
}

#[async_trait]
impl BalanceInterface for BalanceCache {
	fn balances(&self) -> HashMap<DeploymentId, TokenValue> {
		self.balances
			.iter()
			.map(|entry| (entry.key().clone(), *entry.value()))
			.collect()
	}

	fn request_refresh(&self, ids: &[DeploymentId]) {
		let sender = self
			.worker
			.lock()
			.ok()
			.and_then(|worker| worker.as_ref().map(|w| w.requests.clone()));

		let Some(sender) = sender else {
			warn!("Balance refresh requested while cache is stopped");
			self.readiness
				.send_modify(|state| state.last_error = Some(BalanceError::NotRunning));
			return;
		};

		// Counted before sending so a waiter never sees a stale ready state.
		self.readiness.send_modify(|state| state.pending += 1);
		if sender.send(ids.to_vec()).is_err() {
			self.readiness.send_modify(|state| {
				state.pending = state.pending.saturating_sub(1);
				state.last_error = Some(BalanceError::NotRunning);
			});
		}
	}

	async fn wait_ready(&self) -> Result<(), BalanceError> {
		let mut receiver = self.readiness.subscribe();
		let last_error = receiver
			.wait_for(|state| state.pending == 0)
			.await
			.map_err(|_| BalanceError::NotRunning)?
			.last_error
			.clone();

		match last_error {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}

async fn refresh_loop(
	source: Arc<dyn BalanceSource>,
	balances: Arc<DashMap<DeploymentId, TokenValue>>,
	readiness: watch::Sender<Readiness>,
	mut requests: mpsc::UnboundedReceiver<Vec<DeploymentId>>,
	shutdown: CancellationToken,
) {
	loop {
		let first = tokio::select! {
			biased;
			_ = shutdown.cancelled() => break,
			request = requests.recv() => match request {
				Some(ids) => ids,
				None => break,
			},
		};

		// Coalesce everything queued behind the first request.
		let mut ids: BTreeSet<DeploymentId> = first.into_iter().collect();
		let mut batches = 1;
		while let Ok(more) = requests.try_recv() {
			ids.extend(more);
			batches += 1;
		}
		let ids: Vec<DeploymentId> = ids.into_iter().collect();
		debug!("Refreshing {} balances from {} requests", ids.len(), batches);

		let result = tokio::select! {
			biased;
			_ = shutdown.cancelled() => break,
			result = source.fetch(&ids) => result,
		};

		let last_error = match result {
			Ok(fetched) => {
				for (id, value) in fetched {
					balances.insert(id, value);
				}
				None
			}
			Err(e) => {
				warn!("Balance refresh failed: {}", e);
				Some(e)
			}
		};

		readiness.send_modify(|state| {
			state.pending = state.pending.saturating_sub(batches);
			state.last_error = last_error;
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use intent_types::U256;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct CountingSource {
		calls: AtomicUsize,
		fail: bool,
	}

	#[async_trait]
	impl BalanceSource for CountingSource {
		async fn fetch(
			&self,
			ids: &[DeploymentId],
		) -> Result<HashMap<DeploymentId, TokenValue>, BalanceError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			if self.fail {
				return Err(BalanceError::Fetch("rpc down".to_string()));
			}
			Ok(ids
				.iter()
				.map(|id| (id.clone(), TokenValue::new(U256::from(100u64), 6)))
				.collect())
		}
	}

	fn source(fail: bool) -> Arc<CountingSource> {
		Arc::new(CountingSource {
			calls: AtomicUsize::new(0),
			fail,
		})
	}

	#[tokio::test]
	async fn test_refresh_and_wait() {
		let source = source(false);
		let cache = BalanceCache::new(source.clone());
		cache.start();
		assert!(cache.is_running());

		// Queued before the worker runs, so both are served by one fetch.
		cache.request_refresh(&[DeploymentId::new("a")]);
		cache.request_refresh(&[DeploymentId::new("b")]);
		cache.wait_ready().await.unwrap();

		let balances = cache.balances();
		assert_eq!(balances.len(), 2);
		assert_eq!(
			balances.get(&DeploymentId::new("b")),
			Some(&TokenValue::new(U256::from(100u64), 6))
		);
		assert_eq!(source.calls.load(Ordering::SeqCst), 1);

		cache.stop().await;
		assert!(!cache.is_running());
	}

	#[tokio::test]
	async fn test_failed_refresh_is_reported() {
		let cache = BalanceCache::new(source(true));
		cache.start();

		cache.request_refresh(&[DeploymentId::new("a")]);
		assert_eq!(
			cache.wait_ready().await,
			Err(BalanceError::Fetch("rpc down".to_string()))
		);
		assert!(cache.balances().is_empty());

		cache.stop().await;
	}

	#[tokio::test]
	async fn test_refresh_while_stopped() {
		let cache = BalanceCache::new(source(false));
		cache.request_refresh(&[DeploymentId::new("a")]);
		assert_eq!(cache.wait_ready().await, Err(BalanceError::NotRunning));

		cache.set_balance(DeploymentId::new("a"), TokenValue::one_unit(6));
		assert_eq!(cache.balances().len(), 1);
	}
}
