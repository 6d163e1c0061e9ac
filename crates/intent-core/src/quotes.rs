//! Session-scoped quote stream slot.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use intent_quote::{AggregateQuoteInput, AggregatedQuote, QuoteError, QuoteProvider, QuoteStreamHandle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Holds the quote stream of the running engine. Empty before start and
/// after shutdown, in which case quoting fails with `StreamClosed`.
pub struct SessionQuotes {
	stream: ArcSwapOption<QuoteStreamHandle>,
}

impl SessionQuotes {
	pub fn new() -> Self {
		Self {
			stream: ArcSwapOption::empty(),
		}
	}

	pub fn install(&self, stream: QuoteStreamHandle) {
		self.stream.store(Some(Arc::new(stream)));
	}

	pub fn take(&self) -> Option<Arc<QuoteStreamHandle>> {
		self.stream.swap(None)
	}

	pub fn current(&self) -> Option<Arc<QuoteStreamHandle>> {
		self.stream.load_full()
	}
}

impl Default for SessionQuotes {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl QuoteProvider for SessionQuotes {
	async fn quote(
		&self,
		input: AggregateQuoteInput,
		cancel: CancellationToken,
	) -> Result<AggregatedQuote, QuoteError> {
		let stream = self.current().ok_or(QuoteError::StreamClosed)?;
		stream.quote(input, cancel).await
	}
}
