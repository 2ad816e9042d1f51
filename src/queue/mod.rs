// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Framed message queue and its delivery handler.
//!
//! [`FrameQueue`] turns a byte ring into an atomic whole-message exchange;
//! [`QueueHandler`] adds the dedicated consumer thread, lifecycle state
//! machine and push backpressure.

pub mod framed;
pub mod handler;

pub use framed::FrameQueue;
pub use handler::{Delivery, HandlerState, HandlerStatus, QueueHandler};
