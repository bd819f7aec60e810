use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};

use crate::action::Action;
use crate::sink::{ActionSink, SinkError};

pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Batches actions for one account sweep.
///
/// Once more than `threshold` actions are pending, the whole batch is detached
/// and flushed on a background task while pushes carry on. `drain` waits for
/// every in-flight flush and then delivers whatever is left, so every pushed
/// action is delivered exactly once per sweep.
pub struct ActionBuffer {
    hub_id: String,
    threshold: usize,
    sink: Arc<dyn ActionSink>,
    pending: Vec<Action>,
    in_flight: JoinSet<Result<usize, SinkError>>,
    pushed: usize,
    delivered: usize,
    flush_failures: usize,
}

impl ActionBuffer {
    pub fn new(hub_id: impl Into<String>, sink: Arc<dyn ActionSink>, threshold: usize) -> Self {
        Self {
            hub_id: hub_id.into(),
            threshold: threshold.max(1),
            sink,
            pending: Vec::new(),
            in_flight: JoinSet::new(),
            pushed: 0,
            delivered: 0,
            flush_failures: 0,
        }
    }

    /// Queue one action, detaching a background flush once over the threshold.
    ///
    /// Errors from flushes that finished since the last push surface here.
    pub fn push(&mut self, action: Action) -> Result<(), SinkError> {
        let finished = self.reap_finished();

        self.pending.push(action);
        self.pushed += 1;

        if self.pending.len() > self.threshold {
            let batch = std::mem::take(&mut self.pending);
            tracing::info!(hub_id = %self.hub_id, count = batch.len(), "inserting actions to sink");

            let sink = Arc::clone(&self.sink);
            self.in_flight.spawn(async move {
                let count = batch.len();
                sink.deliver(batch).await.map(|()| count)
            });
        }

        finished
    }

    /// Wait for in-flight flushes, then deliver the remainder.
    ///
    /// The remainder is delivered even if an earlier flush failed; the first
    /// failure is returned. On success, returns the number of actions
    /// delivered over the lifetime of the buffer.
    pub async fn drain(&mut self) -> Result<usize, SinkError> {
        let mut first_error = None;

        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = self.record(joined) {
                first_error.get_or_insert(e);
            }
        }

        if !self.pending.is_empty() {
            let batch = std::mem::take(&mut self.pending);
            let count = batch.len();
            match self.sink.deliver(batch).await {
                Ok(()) => self.delivered += count,
                Err(e) => {
                    self.flush_failures += 1;
                    tracing::error!(hub_id = %self.hub_id, count, error = %e, "final flush failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(self.delivered),
        }
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pushed(&self) -> usize {
        self.pushed
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Number of batches the sink rejected, including ones already reported.
    pub fn flush_failures(&self) -> usize {
        self.flush_failures
    }

    fn reap_finished(&mut self) -> Result<(), SinkError> {
        let mut first_error = None;
        while let Some(joined) = self.in_flight.try_join_next() {
            if let Err(e) = self.record(joined) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn record(&mut self, joined: Result<Result<usize, SinkError>, JoinError>) -> Result<(), SinkError> {
        let result = joined.unwrap_or_else(|e| Err(SinkError::Worker(e.to_string())));
        match result {
            Ok(count) => {
                self.delivered += count;
                Ok(())
            }
            Err(e) => {
                self.flush_failures += 1;
                tracing::error!(hub_id = %self.hub_id, error = %e, "background flush failed");
                Err(e)
            }
        }
    }
}
