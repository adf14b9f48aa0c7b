// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-poll loop feeding bus events to a handler.
//!
//! One request at a time: poll, then hand every event of the batch to the
//! handler sequentially in feed order, then poll again from `next_batch`.
//! Failed polls back off exponentially; a success resets the delay.
//! Cancellation is observed while polling and while backing off.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tianshu_core::event::{SyncBatch, SyncRequest};
use tianshu_core::{EventBus, EventHandler};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Exponential delay between failed polls.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    /// The delay to wait now; the following one doubles, up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

/// Timing of a [`SyncLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Long-poll timeout sent to the server.
    pub timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(60),
        }
    }
}

/// Observable phase of a running loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    /// Waiting this long before the next poll.
    Backoff(Duration),
    Stopped,
}

/// A poll loop bound to one bus identity and one handler.
pub struct SyncLoop {
    name: String,
    bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    settings: SyncSettings,
}

impl SyncLoop {
    pub fn new(bus: Arc<dyn EventBus>, handler: Arc<dyn EventHandler>, settings: SyncSettings) -> Self {
        Self {
            name: bus.user_id().to_string(),
            bus,
            handler,
            settings,
        }
    }

    /// Names the loop in logs. Defaults to the bus user id.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Starts the loop on the runtime.
    ///
    /// The loop stops when `cancel` (or the handle's own child token) is cancelled.
    pub fn spawn(self, cancel: CancellationToken) -> SyncHandle {
        let cancel = cancel.child_token();
        let (state_tx, state_rx) = watch::channel(SyncState::Idle);
        let task = tokio::spawn(self.run(cancel.clone(), state_tx));
        SyncHandle {
            cancel,
            task,
            state: state_rx,
        }
    }

    async fn run(self, cancel: CancellationToken, state: watch::Sender<SyncState>) {
        info!(sync = %self.name, "sync loop started");
        let mut backoff = Backoff::new(self.settings.backoff_base, self.settings.backoff_max);
        let mut since: Option<String> = None;

        loop {
            state.send_replace(SyncState::Syncing);
            let request = SyncRequest {
                since: since.clone(),
                timeout: self.settings.timeout,
                full_state: since.is_none(),
            };
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.bus.sync(request) => result,
            };

            match result {
                Ok(batch) => {
                    backoff.reset();
                    let initial = since.is_none();
                    if !batch.next_batch.is_empty() {
                        since = Some(batch.next_batch.clone());
                    }
                    if initial {
                        // The full-state snapshot is history; only live events are handled.
                        debug!(
                            sync = %self.name,
                            skipped = batch.event_count(),
                            next_batch = %batch.next_batch,
                            "initial sync stored, not dispatched"
                        );
                        continue;
                    }
                    self.dispatch(batch).await;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(sync = %self.name, error = %e, delay_secs = delay.as_secs_f64(), "sync failed, backing off");
                    state.send_replace(SyncState::Backoff(delay));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        state.send_replace(SyncState::Stopped);
        info!(sync = %self.name, "sync loop stopped");
    }

    async fn dispatch(&self, batch: SyncBatch) {
        if batch.event_count() > 0 {
            debug!(sync = %self.name, events = batch.event_count(), next_batch = %batch.next_batch, "sync batch");
        }
        for room in &batch.rooms {
            for event in &room.events {
                let handled = AssertUnwindSafe(self.handler.handle(&room.room_id, event))
                    .catch_unwind()
                    .await;
                match handled {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(
                        sync = %self.name,
                        room_id = %room.room_id,
                        event_id = %event.event_id,
                        error = %e,
                        "event handler failed"
                    ),
                    Err(_) => warn!(
                        sync = %self.name,
                        room_id = %room.room_id,
                        event_id = %event.event_id,
                        "event handler panicked"
                    ),
                }
            }
        }
    }
}

/// Control over a spawned [`SyncLoop`].
pub struct SyncHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    state: watch::Receiver<SyncState>,
}

impl SyncHandle {
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the loop and waits for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        self.join().await;
    }

    /// Waits for the loop to exit on its own cancellation.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "sync task ended abnormally");
        }
    }
}
