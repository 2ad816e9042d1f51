// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Handler configuration.

use crate::error::HandlerError;
use crate::message::{frame_len, max_payload_for};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest accepted queue capacity in bytes.
pub const MIN_QUEUE_CAPACITY: usize = 64;

/// Below this capacity the handler still works but logs a warning; a queue
/// this small fills up under any realistic producer load.
pub const RECOMMENDED_QUEUE_CAPACITY: usize = 2048;

/// Absolute payload ceiling. The one-time limit growth (see
/// [`QueueHandler::push`]) never goes past this, so a runaway producer
/// cannot balloon the scratch memory.
///
/// [`QueueHandler::push`]: crate::queue::handler::QueueHandler::push
pub const HARD_MAX_PAYLOAD: usize = 4 * 1024 * 1024;

/// Configuration for a [`QueueHandler`], fixed at creation.
///
/// All fields have serde defaults, so a partial TOML/JSON table
/// deserializes into a working configuration.
///
/// [`QueueHandler`]: crate::queue::handler::QueueHandler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Queue capacity in bytes.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Largest payload accepted without triggering the one-time growth.
    #[serde(default = "default_max_payload")]
    pub max_payload: usize,
    /// How many times a push retries after finding the queue full.
    #[serde(default = "default_push_retries")]
    pub push_retries: u32,
    /// Sleep between push retries, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_capacity() -> usize {
    8192
}

fn default_max_payload() -> usize {
    1024
}

fn default_push_retries() -> u32 {
    4
}

fn default_retry_backoff_ms() -> u64 {
    10
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_payload: default_max_payload(),
            push_retries: default_push_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl HandlerConfig {
    /// Default configuration with a specific queue capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Sleep between push retries.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Largest payload this queue can ever accept: bounded by the buffer
    /// capacity (a frame must fit whole) and by [`HARD_MAX_PAYLOAD`].
    pub fn hard_payload_ceiling(&self) -> usize {
        max_payload_for(self.capacity).min(HARD_MAX_PAYLOAD)
    }

    /// Check the configuration against the queue's structural limits.
    pub fn validate(&self) -> Result<(), HandlerError> {
        if self.capacity < MIN_QUEUE_CAPACITY {
            return Err(HandlerError::Config(format!(
                "queue capacity {} is below the minimum of {MIN_QUEUE_CAPACITY} bytes",
                self.capacity
            )));
        }
        if self.max_payload == 0 {
            return Err(HandlerError::Config(
                "max_payload must be at least 1 byte".to_string(),
            ));
        }
        if frame_len(self.max_payload) > self.capacity {
            return Err(HandlerError::Config(format!(
                "max_payload {} does not fit a queue of {} bytes (largest is {})",
                self.max_payload,
                self.capacity,
                self.hard_payload_ceiling()
            )));
        }
        Ok(())
    }
}
