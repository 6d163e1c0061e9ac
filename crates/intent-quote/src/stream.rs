//! Throttled background quoting.
//!
//! A [`QuoteStream`] owns one logical quote subscription. Inputs submitted
//! through the [`QuoteStreamHandle`] are throttled on both edges: the first
//! input after a quiet period fires at once, further inputs inside the
//! cooldown collapse into a single trailing fire carrying the latest input.
//! A newer fire aborts whatever request is still in flight. A waiter whose
//! ticket was overtaken only accepts the newer result when it was priced for
//! the same [`QuoteKey`]; otherwise it fails with `Superseded`.

use crate::{AggregateQuoteInput, AggregatedQuote, QuoteError, QuoteProvider};
use async_trait::async_trait;
use intent_types::{DeploymentId, TokenValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a quote was priced for: source candidates, destination and amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteKey {
	pub candidates: Vec<DeploymentId>,
	pub destination: DeploymentId,
	pub amount: TokenValue,
}

impl QuoteKey {
	pub fn of(input: &AggregateQuoteInput) -> Self {
		Self {
			candidates: input.candidates.iter().map(|d| d.id.clone()).collect(),
			destination: input.destination.id.clone(),
			amount: input.amount,
		}
	}
}

/// Result of one completed (or abandoned) quote request.
#[derive(Debug, Clone)]
pub struct QuoteStreamUpdate {
	/// Ticket of the input that produced this result. Superseded tickets never
	/// get their own update.
	pub request_id: u64,
	pub key: QuoteKey,
	pub result: Result<AggregatedQuote, QuoteError>,
}

impl QuoteStreamUpdate {
	/// The answer this update gives the waiter holding `ticket` for `key`, or
	/// `None` when the update is older than the ticket.
	fn answer_for(&self, ticket: u64, key: &QuoteKey) -> Option<Result<AggregatedQuote, QuoteError>> {
		if self.request_id < ticket {
			return None;
		}
		if self.request_id == ticket || self.key == *key {
			return Some(self.result.clone());
		}
		// A pause cancels every outstanding ticket.
		if matches!(self.result, Err(QuoteError::Cancelled)) {
			return Some(Err(QuoteError::Cancelled));
		}
		Some(Err(QuoteError::Superseded))
	}
}

enum Command {
	Request { id: u64, input: AggregateQuoteInput },
	Pause,
	Stop,
}

pub struct QuoteStream;

impl QuoteStream {
	/// Starts the background task and returns its handle.
	pub fn spawn(provider: Arc<dyn QuoteProvider>, interval: Duration) -> QuoteStreamHandle {
		let (command_tx, command_rx) = mpsc::unbounded_channel();
		let (updates, _) = broadcast::channel(64);

		let worker = Worker {
			provider,
			interval,
			updates: updates.clone(),
			last_fired: None,
			pending: None,
			in_flight: None,
		};
		let task = tokio::spawn(worker.run(command_rx));
		info!("Quote stream started with {:?} throttle", interval);

		QuoteStreamHandle {
			commands: command_tx,
			updates,
			next_id: AtomicU64::new(1),
			task: Mutex::new(Some(task)),
		}
	}
}

/// Client side of a running [`QuoteStream`].
pub struct QuoteStreamHandle {
	commands: mpsc::UnboundedSender<Command>,
	updates: broadcast::Sender<QuoteStreamUpdate>,
	next_id: AtomicU64,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl QuoteStreamHandle {
	/// Submits the latest input and returns its ticket.
	pub fn request(&self, input: AggregateQuoteInput) -> Result<u64, QuoteError> {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		self.commands
			.send(Command::Request { id, input })
			.map_err(|_| QuoteError::StreamClosed)?;
		Ok(id)
	}

	/// Drops any scheduled trailing fire and aborts the in-flight request. The
	/// stream keeps running.
	pub fn pause(&self) -> Result<(), QuoteError> {
		self.commands
			.send(Command::Pause)
			.map_err(|_| QuoteError::StreamClosed)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<QuoteStreamUpdate> {
		self.updates.subscribe()
	}

	/// Tears the background task down and waits for it to exit.
	pub async fn stop(&self) {
		let _ = self.commands.send(Command::Stop);
		let task = self.task.lock().ok().and_then(|mut task| task.take());
		if let Some(task) = task {
			if let Err(e) = task.await {
				warn!("Quote stream task ended abnormally: {}", e);
			}
			info!("Quote stream stopped");
		}
	}

	pub fn is_running(&self) -> bool {
		!self.commands.is_closed()
	}
}

#[async_trait]
impl QuoteProvider for QuoteStreamHandle {
	/// Submits `input` and waits for its result, or the result of a newer
	/// input with the same key that superseded it.
	async fn quote(
		&self,
		input: AggregateQuoteInput,
		cancel: CancellationToken,
	) -> Result<AggregatedQuote, QuoteError> {
		let key = QuoteKey::of(&input);
		// Subscribe first so the update cannot be missed.
		let mut updates = self.subscribe();
		let ticket = self.request(input)?;

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(QuoteError::Cancelled),
				update = updates.recv() => match update {
					Ok(update) => match update.answer_for(ticket, &key) {
						Some(result) => return result,
						None => continue,
					},
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						debug!("Quote waiter lagged by {} updates", skipped);
						continue;
					}
					Err(broadcast::error::RecvError::Closed) => return Err(QuoteError::StreamClosed),
				},
			}
		}
	}
}

struct InFlight {
	id: u64,
	key: QuoteKey,
	task: JoinHandle<()>,
	cancel: CancellationToken,
}

impl InFlight {
	fn abort(self) {
		self.cancel.cancel();
		self.task.abort();
	}
}

struct Worker {
	provider: Arc<dyn QuoteProvider>,
	interval: Duration,
	updates: broadcast::Sender<QuoteStreamUpdate>,
	last_fired: Option<Instant>,
	pending: Option<(u64, AggregateQuoteInput)>,
	in_flight: Option<InFlight>,
}

impl Worker {
	async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
		loop {
			let trailing_at = match (&self.pending, self.last_fired) {
				(Some(_), Some(last)) => Some(last + self.interval),
				_ => None,
			};

			tokio::select! {
				command = commands.recv() => match command {
					Some(Command::Request { id, input }) => self.submit(id, input),
					Some(Command::Pause) => {
						debug!("Quote stream paused");
						self.cancel_outstanding();
					}
					Some(Command::Stop) | None => {
						self.cancel_outstanding();
						break;
					}
				},
				_ = sleep_until(trailing_at) => {
					if let Some((id, input)) = self.pending.take() {
						debug!(request_id = id, "Trailing quote fire");
						self.fire(id, input);
					}
				}
			}
		}
	}

	fn submit(&mut self, id: u64, input: AggregateQuoteInput) {
		let cooled_down = self
			.last_fired
			.map_or(true, |last| Instant::now() >= last + self.interval);

		if cooled_down {
			self.fire(id, input);
		} else {
			// Only the latest input inside the window survives.
			self.pending = Some((id, input));
		}
	}

	fn fire(&mut self, id: u64, input: AggregateQuoteInput) {
		if let Some(previous) = self.in_flight.take() {
			debug!(superseded = previous.id, request_id = id, "Aborting in-flight quote");
			previous.abort();
		}
		self.last_fired = Some(Instant::now());

		let key = QuoteKey::of(&input);
		let provider = Arc::clone(&self.provider);
		let updates = self.updates.clone();
		let cancel = CancellationToken::new();
		let child = cancel.clone();
		let published = key.clone();
		let task = tokio::spawn(async move {
			let result = provider.quote(input, child).await;
			let _ = updates.send(QuoteStreamUpdate {
				request_id: id,
				key: published,
				result,
			});
		});

		self.in_flight = Some(InFlight {
			id,
			key,
			task,
			cancel,
		});
	}

	/// Drops the pending input and aborts the in-flight request, telling
	/// waiters that their tickets were cancelled.
	fn cancel_outstanding(&mut self) {
		let mut latest: Option<(u64, QuoteKey)> = self
			.pending
			.take()
			.map(|(id, input)| (id, QuoteKey::of(&input)));
		if let Some(in_flight) = self.in_flight.take() {
			// A finished request already published its own update.
			if !in_flight.task.is_finished() {
				if latest.as_ref().map_or(true, |(id, _)| in_flight.id > *id) {
					latest = Some((in_flight.id, in_flight.key.clone()));
				}
				in_flight.abort();
			}
		}

		if let Some((id, key)) = latest {
			let _ = self.updates.send(QuoteStreamUpdate {
				request_id: id,
				key,
				result: Err(QuoteError::Cancelled),
			});
		}
	}
}

async fn sleep_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}
