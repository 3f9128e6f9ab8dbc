// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Swap Status Poller
//!
//! Cancellable task that fetches the active swap on a fixed interval and
//! hands each result back to the controller tagged with a logical sequence
//! number.
//!
//! ## Shutdown
//!
//! Runs until its `CancellationToken` fires. A result that arrives after
//! cancellation is dropped here; one already queued is dropped by the
//! controller through its sequence floor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::controller::Event;
use crate::backend::{BackendError, SwapBackend};

pub(crate) struct StatusPoller {
    backend: Arc<dyn SwapBackend>,
    swap_id: Uuid,
    interval: Duration,
    call_timeout: Duration,
    sequence: Arc<AtomicU64>,
    events: UnboundedSender<Event>,
}

impl StatusPoller {
    pub(crate) fn new(
        backend: Arc<dyn SwapBackend>,
        swap_id: Uuid,
        interval: Duration,
        call_timeout: Duration,
        sequence: Arc<AtomicU64>,
        events: UnboundedSender<Event>,
    ) -> Self {
        Self {
            backend,
            swap_id,
            interval,
            call_timeout,
            sequence,
            events,
        }
    }

    /// Run the poll loop until `shutdown` is triggered. The first poll is
    /// immediate.
    pub(crate) async fn run(self, shutdown: CancellationToken) {
        info!(
            swap_id = %self.swap_id,
            interval_ms = self.interval.as_millis() as u64,
            "Swap status poller starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if !self.poll_step(&shutdown).await {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => break,
            }
        }

        info!(swap_id = %self.swap_id, "Swap status poller stopped");
    }

    /// One fetch. Returns false once the controller is gone or polling was
    /// cancelled mid-request.
    async fn poll_step(&self, shutdown: &CancellationToken) -> bool {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let result = tokio::select! {
            r = timeout(self.call_timeout, self.backend.get_swap(self.swap_id)) => {
                r.unwrap_or(Err(BackendError::Timeout))
            }
            _ = shutdown.cancelled() => return false,
        };

        if shutdown.is_cancelled() {
            debug!(swap_id = %self.swap_id, seq, "Discarding poll result after cancellation");
            return false;
        }

        self.events.send(Event::PollCompleted { seq, result }).is_ok()
    }
}
