//! Webhook dispatcher - bounded queue drained by a fixed worker pool.
//!
//! ```text
//! publish(event) ──► list_subscribed ──► enqueue (timeout) ──► [queue] ──► worker 1..N
//!                                             │                              │
//!                                          dropped                 sign, POST, retry,
//!                                                                  record every attempt
//! ```
//!
//! Delivery is best effort. A full queue drops the job, and a job that
//! exhausts its attempts is given up on. Every attempt is recorded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adapters::resilience::{CircuitBreakerRegistry, RetryError, RetryPolicy};
use crate::domain::foundation::{DeliveryAttemptId, WebhookId};
use crate::domain::webhook::signature::{DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
use crate::domain::webhook::{
    signature_header_value, EventEnvelope, Webhook, WebhookDeliveryAttempt, WebhookError,
};
use crate::ports::{EventSink, WebhookRequest, WebhookResponse, WebhookSender, WebhookStore};

#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherSettings {
    pub queue_capacity: usize,
    pub worker_count: usize,
    /// How long `enqueue` waits for room before dropping a job.
    pub enqueue_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            worker_count: 4,
            enqueue_timeout: Duration::from_millis(100),
            retry: RetryPolicy::default(),
        }
    }
}

/// Counters since the dispatcher started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
struct DeliveryJob {
    webhook_id: WebhookId,
    event: EventEnvelope,
}

/// Everything a worker needs, shared by all workers.
struct Delivery {
    store: Arc<dyn WebhookStore>,
    sender: Arc<dyn WebhookSender>,
    breakers: Arc<CircuitBreakerRegistry>,
    retry: RetryPolicy,
    counters: Counters,
}

pub struct WebhookDispatcher {
    queue: Mutex<Option<mpsc::Sender<DeliveryJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    delivery: Arc<Delivery>,
    enqueue_timeout: Duration,
    cancel: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl WebhookDispatcher {
    /// Creates the queue and spawns the workers. Must be called inside a
    /// Tokio runtime.
    pub fn start(
        settings: DispatcherSettings,
        store: Arc<dyn WebhookStore>,
        sender: Arc<dyn WebhookSender>,
        breakers: Arc<CircuitBreakerRegistry>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let delivery = Arc::new(Delivery {
            store,
            sender,
            breakers,
            retry: settings.retry.clone(),
            counters: Counters::default(),
        });
        let cancel = CancellationToken::new();

        let worker_count = settings.worker_count.max(1);
        let workers = (0..worker_count)
            .map(|worker_id| {
                let delivery = delivery.clone();
                let rx = rx.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    tracing::debug!(worker_id, "Webhook worker starting");
                    loop {
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };
                        delivery.deliver(job, &cancel).await;
                    }
                    tracing::debug!(worker_id, "Webhook worker stopped");
                })
            })
            .collect();

        tracing::info!(
            worker_count,
            queue_capacity = settings.queue_capacity,
            "Webhook dispatcher started"
        );

        Self {
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            delivery,
            enqueue_timeout: settings.enqueue_timeout,
            cancel,
        }
    }

    pub fn stats(&self) -> DispatcherStats {
        self.delivery.counters.snapshot()
    }

    /// Queues delivery of `event` to one webhook.
    ///
    /// # Errors
    ///
    /// - `QueueFull` if no slot freed up within the enqueue timeout; the job
    ///   is dropped
    /// - `QueueClosed` after shutdown
    pub async fn enqueue(
        &self,
        webhook_id: WebhookId,
        event: EventEnvelope,
    ) -> Result<(), WebhookError> {
        let Some(queue) = lock(&self.queue).clone() else {
            return Err(WebhookError::QueueClosed);
        };
        let counters = &self.delivery.counters;

        match queue
            .send_timeout(DeliveryJob { webhook_id, event }, self.enqueue_timeout)
            .await
        {
            Ok(()) => {
                counters.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(SendTimeoutError::Timeout(job)) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    webhook_id = %job.webhook_id,
                    event = %job.event.event,
                    "Webhook queue full, delivery dropped"
                );
                Err(WebhookError::QueueFull)
            }
            Err(SendTimeoutError::Closed(_)) => Err(WebhookError::QueueClosed),
        }
    }

    /// Stops accepting jobs, lets the workers drain the queue and joins them.
    ///
    /// Workers still busy after `timeout` have their retries cancelled and
    /// are aborted.
    pub async fn shutdown(&self, timeout: Duration) -> Result<DispatcherStats, WebhookError> {
        lock(&self.queue).take();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.workers));
        let aborts: Vec<_> = workers.iter().map(|h| h.abort_handle()).collect();
        tracing::info!(workers = workers.len(), "Webhook dispatcher shutting down");

        let joined = tokio::time::timeout(timeout, async {
            for (worker_id, handle) in workers.into_iter().enumerate() {
                if let Err(e) = handle.await {
                    tracing::error!(worker_id, error = %e, "Webhook worker panicked");
                }
            }
        })
        .await;

        let stats = self.stats();
        match joined {
            Ok(()) => {
                tracing::info!(
                    delivered = stats.delivered,
                    failed = stats.failed,
                    dropped = stats.dropped,
                    "Webhook dispatcher stopped"
                );
                Ok(stats)
            }
            Err(_) => {
                self.cancel.cancel();
                aborts.iter().for_each(|a| a.abort());
                tracing::error!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Webhook workers did not drain in time"
                );
                Err(WebhookError::ShutdownTimeout(timeout))
            }
        }
    }
}

#[async_trait]
impl EventSink for WebhookDispatcher {
    /// Fans `event` out to every subscribed webhook of its tenant.
    async fn publish(&self, event: EventEnvelope) -> Result<(), WebhookError> {
        let webhooks = self
            .delivery
            .store
            .list_subscribed(&event.tenant_id, event.event)
            .await?;

        for webhook in webhooks {
            match self.enqueue(webhook.id, event.clone()).await {
                Ok(()) | Err(WebhookError::QueueFull) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Delivery {
    async fn deliver(&self, job: DeliveryJob, cancel: &CancellationToken) {
        let webhook = match self.store.find_webhook(&job.webhook_id).await {
            Ok(Some(webhook)) if webhook.active => webhook,
            Ok(_) => {
                tracing::debug!(webhook_id = %job.webhook_id, "Webhook gone or inactive, skipping");
                return;
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(webhook_id = %job.webhook_id, error = %e, "Could not load webhook");
                return;
            }
        };

        let body = match serde_json::to_vec(&job.event) {
            Ok(body) => body,
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(webhook_id = %webhook.id, error = %e, "Could not serialize event");
                return;
            }
        };

        let breaker = self.breakers.get_or_create(&format!("webhook:{}", webhook.id));
        let (webhook, job, body, breaker) = (&webhook, &job, &body, &breaker);
        let result = self
            .retry
            .execute(cancel, |attempt| async move {
                breaker
                    .call_classified(WebhookError::is_retriable, || {
                        self.attempt(webhook, job, body, attempt)
                    })
                    .await
            })
            .await;

        match result {
            Ok(_) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                let attempts = e.attempts();
                let reason = match e {
                    RetryError::Cancelled { .. } => "cancelled".to_string(),
                    other => other.into_last_error().map(|e| e.to_string()).unwrap_or_default(),
                };
                tracing::warn!(
                    webhook_id = %webhook.id,
                    event = %job.event.event,
                    attempts,
                    error = %reason,
                    "Webhook delivery gave up"
                );
            }
        }
    }

    /// One signed POST, recorded whatever the outcome.
    async fn attempt(
        &self,
        webhook: &Webhook,
        job: &DeliveryJob,
        body: &[u8],
        attempt: u32,
    ) -> Result<WebhookResponse, WebhookError> {
        let attempt_id = DeliveryAttemptId::new();
        let request = WebhookRequest {
            url: webhook.url.clone(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (
                    SIGNATURE_HEADER.to_string(),
                    signature_header_value(webhook.secret.as_bytes(), body),
                ),
                (EVENT_HEADER.to_string(), job.event.event.as_str().to_string()),
                (DELIVERY_HEADER.to_string(), attempt_id.to_string()),
            ],
            body: body.to_vec(),
        };

        let started = Instant::now();
        let outcome = self.sender.send(&request).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (response_code, response_body, result) = match outcome {
            Ok(response) if response.is_success() => (
                Some(response.status),
                Some(response.body.clone()),
                Ok(response),
            ),
            Ok(response) => (
                Some(response.status),
                Some(response.body.clone()),
                Err(WebhookError::Status {
                    status: response.status,
                    body: response.body,
                }),
            ),
            Err(e) => (None, None, Err(e)),
        };

        let record = WebhookDeliveryAttempt::record(
            attempt_id,
            webhook,
            job.event.event,
            attempt,
            response_code,
            response_body,
            result.as_ref().err().map(|e| e.to_string()),
            duration_ms,
        );
        if let Err(e) = self.store.record_attempt(&record).await {
            tracing::warn!(webhook_id = %webhook.id, error = %e, "Could not record delivery attempt");
        }

        tracing::debug!(
            webhook_id = %webhook.id,
            attempt,
            status = ?response_code,
            duration_ms,
            "Webhook attempt finished"
        );
        result
    }
}
