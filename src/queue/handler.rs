// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Queue handler: a framed queue plus the dedicated consumer thread that
//! delivers messages to a [`Delivery`] implementation.
//!
//! The delivery side typically lives in an external execution context that
//! must be entered and left explicitly (a managed runtime, a foreign event
//! loop). The handler drives that protocol: the context is acquired on the
//! consumer thread before the first message and released after the last,
//! with status notifications around both edges.

use crate::config::{HandlerConfig, RECOMMENDED_QUEUE_CAPACITY};
use crate::error::{ContextError, HandlerError, PushError};
use crate::message::MessageRef;
use crate::queue::framed::FrameQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One wait slice of the consumer loop; the stop flag is rechecked at least
/// this often even if no push ever wakes the thread.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lifecycle states of a [`QueueHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandlerState {
    /// Built, consumer thread not spawned yet.
    Created,
    /// Consumer thread spawned, waiting for it to acquire the context.
    Starting,
    /// Context acquired; about to enter the delivery loop.
    Ready,
    /// Delivering messages.
    Running,
    /// Stop observed; no new messages are accepted.
    Stopping,
    /// Consumer thread finished; context released.
    Stopped,
}

impl HandlerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Starting,
            2 => Self::Ready,
            3 => Self::Running,
            4 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Status notifications handed to the [`Delivery`] implementation so the
/// external side can synchronize its own resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    /// The consumer thread is about to start invoking
    /// [`Delivery::deliver`].
    ReadyToGo,
    /// The consumer thread is about to release the execution context.
    AboutToStop,
}

/// The delivery capability moved into the consumer thread at spawn time.
///
/// `deliver` returns 0 to keep the loop running; any other value is a fatal
/// signal from the delivery side and the handler stops without draining the
/// backlog (fail fast).
pub trait Delivery: Send + 'static {
    /// Enter the external execution context. Called exactly once, on the
    /// consumer thread, before anything else. Failure aborts startup.
    fn acquire_context(&mut self) -> Result<(), ContextError> {
        Ok(())
    }

    /// Leave the external execution context. Called exactly once, on the
    /// consumer thread, after the last delivery.
    fn release_context(&mut self) {}

    /// Lifecycle notification; see [`HandlerStatus`].
    fn on_status(&mut self, _status: HandlerStatus) {}

    /// Handle one message. The payload borrow ends with the call; copy it
    /// out to keep it.
    fn deliver(&mut self, msg: MessageRef<'_>) -> i32;
}

/// Plain closures work as a delivery target when there is no context to
/// manage.
impl<F> Delivery for F
where
    F: FnMut(MessageRef<'_>) -> i32 + Send + 'static,
{
    fn deliver(&mut self, msg: MessageRef<'_>) -> i32 {
        self(msg)
    }
}

/// Bounded fixed-interval retry budget for pushes that found the queue
/// full.
struct Backoff {
    remaining: u32,
    interval: Duration,
}

impl Backoff {
    fn new(budget: u32, interval: Duration) -> Self {
        Self {
            remaining: budget,
            interval,
        }
    }

    /// Sleep one interval. Returns `false` once the budget is spent.
    fn wait(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        thread::sleep(self.interval);
        true
    }
}

#[derive(Debug)]
struct Shared {
    queue: FrameQueue,
    state: AtomicU8,
    /// Set by shutdown; the consumer drains and exits once the queue is
    /// empty.
    stop: AtomicBool,
    /// Effective payload limit. Read lock-free on every push; raised at
    /// most once under `grow`.
    max_payload: AtomicUsize,
    /// Whether the one-time limit growth has been spent.
    grow: Mutex<bool>,
    hard_ceiling: usize,
}

impl Shared {
    fn state(&self) -> HandlerState {
        HandlerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: HandlerState) {
        self.state.store(state as u8, Ordering::Release);
        debug!(?state, "handler state");
    }

    fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
            || matches!(self.state(), HandlerState::Stopping | HandlerState::Stopped)
    }
}

/// Owns a [`FrameQueue`] and the consumer thread delivering from it.
///
/// Producer threads call [`push`](Self::push); the consumer thread pops
/// frames in FIFO order and hands them to the [`Delivery`] implementation.
/// Dropping the handler requests a graceful stop and joins the thread.
#[derive(Debug)]
pub struct QueueHandler {
    shared: Arc<Shared>,
    config: HandlerConfig,
    worker: Option<JoinHandle<()>>,
}

impl QueueHandler {
    /// Validate `config`, spawn the consumer thread and block until it has
    /// acquired the delivery context.
    ///
    /// On any failure the thread is joined and the error returned; a
    /// partially started handler never escapes.
    pub fn spawn<D: Delivery>(config: HandlerConfig, delivery: D) -> Result<Self, HandlerError> {
        config.validate()?;
        if config.capacity < RECOMMENDED_QUEUE_CAPACITY {
            warn!(
                capacity = config.capacity,
                "queue capacity is small, expect backpressure under load"
            );
        }

        let shared = Arc::new(Shared {
            queue: FrameQueue::with_capacity(config.capacity)
                .map_err(|e| HandlerError::Config(e.to_string()))?,
            state: AtomicU8::new(HandlerState::Created as u8),
            stop: AtomicBool::new(false),
            max_payload: AtomicUsize::new(config.max_payload),
            grow: Mutex::new(false),
            hard_ceiling: config.hard_payload_ceiling(),
        });

        let (ready_tx, ready_rx) = mpsc::channel();
        shared.set_state(HandlerState::Starting);
        let worker = thread::Builder::new().name("msgring-delivery".to_string()).spawn({
            let shared = Arc::clone(&shared);
            move || consumer_loop(shared, delivery, ready_tx)
        })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(capacity = config.capacity, "delivery thread ready");
                Ok(Self {
                    shared,
                    config,
                    worker: Some(worker),
                })
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                error!("context acquire failed: {e}");
                Err(HandlerError::ContextAcquire(e))
            }
            Err(_) => {
                // The thread died before reporting either way.
                let _ = worker.join();
                Err(HandlerError::ContextAcquire(ContextError::new(
                    "delivery thread exited during startup",
                )))
            }
        }
    }

    /// Enqueue a message for delivery.
    ///
    /// A full queue is retried through the configured backoff budget before
    /// [`PushError::Full`] is surfaced; the condition is expected to be
    /// transient while the consumer catches up. Once shutdown has begun the
    /// push is rejected with [`PushError::ShuttingDown`] instead.
    ///
    /// Payloads above the configured `max_payload` trigger a one-time
    /// growth of the limit (up to the hard ceiling); beyond that they are
    /// rejected as [`PushError::Oversized`].
    pub fn push(&self, what: i32, arg1: i32, arg2: i32, payload: &[u8]) -> Result<(), PushError> {
        if self.shared.is_stopping() {
            return Err(PushError::ShuttingDown);
        }
        self.admit_payload(payload.len())?;

        let mut backoff = Backoff::new(self.config.push_retries, self.config.retry_backoff());
        loop {
            match self.shared.queue.push(what, arg1, arg2, payload) {
                Err(PushError::Full) => {
                    if self.shared.is_stopping() {
                        return Err(PushError::ShuttingDown);
                    }
                    if !backoff.wait() {
                        warn!(
                            retries = self.config.push_retries,
                            "queue still full after retry budget"
                        );
                        return Err(PushError::Full);
                    }
                }
                other => return other,
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HandlerState {
        self.shared.state()
    }

    /// Number of queued, undelivered messages.
    pub fn queued_frames(&self) -> usize {
        self.shared.queue.queued_frames()
    }

    /// Queue capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// The configuration the handler was created with.
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Request a graceful stop and wait for the consumer thread.
    ///
    /// Messages queued before the request are drained and delivered;
    /// concurrent pushes race the stop flag and may be rejected.
    pub fn shutdown(mut self) {
        self.request_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn request_stop(&self) {
        if !self.shared.stop.swap(true, Ordering::AcqRel) {
            info!("shutdown requested");
            if matches!(
                self.shared.state(),
                HandlerState::Ready | HandlerState::Running
            ) {
                self.shared.set_state(HandlerState::Stopping);
            }
        }
        self.shared.queue.wake();
    }

    /// Check `len` against the effective limit, spending the one-time
    /// growth if this payload justifies it.
    fn admit_payload(&self, len: usize) -> Result<(), PushError> {
        if len <= self.shared.max_payload.load(Ordering::Acquire) {
            return Ok(());
        }
        if len > self.shared.hard_ceiling {
            return Err(PushError::Oversized {
                len,
                max: self.shared.hard_ceiling,
            });
        }

        let mut grown = self.shared.grow.lock();
        // Re-check under the lock; another producer may have grown the
        // limit while we waited.
        let max = self.shared.max_payload.load(Ordering::Acquire);
        if len <= max {
            return Ok(());
        }
        if *grown {
            return Err(PushError::Oversized { len, max });
        }
        let new_max = len.saturating_mul(2).min(self.shared.hard_ceiling);
        self.shared.max_payload.store(new_max, Ordering::Release);
        *grown = true;
        info!(new_max, "raised payload limit for oversized message");
        Ok(())
    }
}

impl Drop for QueueHandler {
    fn drop(&mut self) {
        self.request_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn consumer_loop<D: Delivery>(
    shared: Arc<Shared>,
    mut delivery: D,
    ready_tx: mpsc::Sender<Result<(), ContextError>>,
) {
    if let Err(e) = delivery.acquire_context() {
        shared.set_state(HandlerState::Stopped);
        let _ = ready_tx.send(Err(e));
        return;
    }
    shared.set_state(HandlerState::Ready);
    let _ = ready_tx.send(Ok(()));

    delivery.on_status(HandlerStatus::ReadyToGo);
    shared.set_state(HandlerState::Running);
    debug!("delivery loop running");

    let mut scratch: Vec<u8> = Vec::new();
    let mut delivered: u64 = 0;
    loop {
        match shared.queue.wait_pop_into(&mut scratch, POLL_INTERVAL) {
            Some(info) => {
                let code = delivery.deliver(MessageRef {
                    what: info.what,
                    arg1: info.arg1,
                    arg2: info.arg2,
                    payload: &scratch,
                });
                delivered += 1;
                if code != 0 {
                    let dropped = shared.queue.queued_frames();
                    warn!(code, dropped, "delivery failed, stopping without draining");
                    shared.set_state(HandlerState::Stopping);
                    break;
                }
            }
            // An empty pop means the queue was drained at that instant, so
            // a set stop flag cannot have undelivered frames behind it:
            // pushes are rejected once the flag is up.
            None => {
                if shared.stop.load(Ordering::Acquire) {
                    break;
                }
            }
        }
    }

    debug!(delivered, "delivery loop exiting");
    delivery.on_status(HandlerStatus::AboutToStop);
    delivery.release_context();
    shared.set_state(HandlerState::Stopped);
}
