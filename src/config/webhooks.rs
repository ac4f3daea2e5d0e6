//! Webhook dispatcher configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::resilience::RetryPolicy;
use crate::application::DispatcherSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhooksConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Milliseconds `enqueue` waits for queue room before dropping
    #[serde(default = "default_enqueue_timeout")]
    pub enqueue_timeout_ms: u64,

    /// Delivery attempts per event, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl WebhooksConfig {
    /// Dispatcher settings; the delay curve comes from the shared retry
    /// policy, the attempt count from this section.
    pub fn dispatcher_settings(&self, retry: &RetryPolicy) -> DispatcherSettings {
        DispatcherSettings {
            queue_capacity: self.queue_capacity,
            worker_count: self.worker_count,
            enqueue_timeout: Duration::from_millis(self.enqueue_timeout_ms),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                ..retry.clone()
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.queue_capacity == 0 {
            return Err(ValidationError::MustBePositive {
                field: "webhooks.queue_capacity",
            });
        }
        if self.worker_count == 0 || self.worker_count > 64 {
            return Err(ValidationError::OutOfRange {
                field: "webhooks.worker_count",
                min: 1,
                max: 64,
            });
        }
        if self.max_attempts == 0 {
            return Err(ValidationError::MustBePositive {
                field: "webhooks.max_attempts",
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::MustBePositive {
                field: "webhooks.request_timeout_secs",
            });
        }
        Ok(())
    }
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            worker_count: default_worker_count(),
            enqueue_timeout_ms: default_enqueue_timeout(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_worker_count() -> usize {
    4
}

fn default_enqueue_timeout() -> u64 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    10
}
