// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bounded multi-producer/single-consumer message queue over a circular
//! byte buffer.
//!
//! Producer threads push `(what, arg1, arg2, payload)` messages; one
//! dedicated consumer thread delivers them in FIFO order to a [`Delivery`]
//! implementation, entering and leaving an external execution context
//! around the delivery loop. Backpressure is bounded retry, shutdown is
//! graceful drain, and a failing callback stops the handler fail-fast.
//!
//! # Example
//!
//! ```ignore
//! use msgring::{HandlerConfig, MessageRef, QueueHandler};
//!
//! let handler = QueueHandler::spawn(HandlerConfig::default(), |msg: MessageRef<'_>| {
//!     println!("what={} len={}", msg.what, msg.payload.len());
//!     0 // non-zero stops the handler
//! })?;
//!
//! handler.push(1, 0, 0, b"hello")?;
//! handler.shutdown(); // drains queued messages, then joins
//! ```
//!
//! The rings are usable on their own: [`ByteRing`] rejects writes that do
//! not fit, [`OverwriteRing`] evicts the oldest unread bytes so live
//! producers never stall.

pub mod config;
pub mod error;
pub mod message;
pub mod queue;
pub mod ring;

pub use config::{HandlerConfig, HARD_MAX_PAYLOAD, MIN_QUEUE_CAPACITY, RECOMMENDED_QUEUE_CAPACITY};
pub use error::{BufferError, ContextError, HandlerError, PushError};
pub use message::{FrameInfo, Message, MessageRef, FRAME_HEADER_LEN};
pub use queue::framed::FrameQueue;
pub use queue::handler::{Delivery, HandlerState, HandlerStatus, QueueHandler};
pub use ring::byte_ring::ByteRing;
pub use ring::overwrite::OverwriteRing;
