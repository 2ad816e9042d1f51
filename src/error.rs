// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error types for buffers, queues and the delivery handler.

use thiserror::Error;

/// Errors raised when constructing a ring buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// A ring needs at least two bytes of storage to distinguish empty
    /// from full.
    #[error("buffer capacity must be at least 2, got {0}")]
    CapacityTooSmall(usize),
}

/// Why a push was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError {
    /// Transient: the queue has no room for the frame right now. Worth
    /// retrying once the consumer has drained some frames.
    #[error("queue is full")]
    Full,
    /// The payload exceeds the accepted limit and will never fit. Not
    /// retryable; this is a caller bug.
    #[error("payload of {len} bytes exceeds the limit of {max} bytes")]
    Oversized {
        /// Rejected payload length.
        len: usize,
        /// Largest payload the queue accepts.
        max: usize,
    },
    /// The handler has begun shutting down and rejects new messages.
    #[error("handler is shutting down")]
    ShuttingDown,
}

/// Failure reported by [`Delivery::acquire_context`].
///
/// [`Delivery::acquire_context`]: crate::queue::handler::Delivery::acquire_context
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ContextError(pub String);

impl ContextError {
    /// Build a context error from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Errors surfaced while creating a [`QueueHandler`].
///
/// Creation either returns a fully running handler or one of these; a
/// partially initialized handler is never handed back.
///
/// [`QueueHandler`]: crate::queue::handler::QueueHandler
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The delivery thread could not be spawned.
    #[error("failed to spawn delivery thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// The delivery side refused to enter its execution context. Startup
    /// was unwound and the thread joined.
    #[error("failed to acquire delivery context: {0}")]
    ContextAcquire(ContextError),
}
