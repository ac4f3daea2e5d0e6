//! Name-keyed breaker and connector registries.
//!
//! Both are plain values built by the composition root and shared behind an
//! `Arc`. Tests construct their own.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::webhook::WebhookError;
use crate::ports::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, ConnectorError,
    VoucherConnector, VoucherRequest, VoucherResponse, VoucherStatus,
};

use super::{CircuitOpenError, InMemoryCircuitBreaker};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Lazily creates one breaker per name, all sharing one configuration.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<InMemoryCircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the breaker for `name`, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<InMemoryCircuitBreaker> {
        if let Some(breaker) = read(&self.breakers).get(name) {
            return breaker.clone();
        }
        write(&self.breakers)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryCircuitBreaker::new(name, self.config.clone())))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<InMemoryCircuitBreaker>> {
        read(&self.breakers).get(name).cloned()
    }

    /// Closes the named breaker. Returns false if it does not exist.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Metrics of every breaker, keyed and ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, CircuitBreakerMetrics> {
        read(&self.breakers)
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.metrics()))
            .collect()
    }
}

impl From<CircuitOpenError> for ConnectorError {
    fn from(err: CircuitOpenError) -> Self {
        ConnectorError::CircuitOpen(err.name)
    }
}

impl From<CircuitOpenError> for WebhookError {
    fn from(err: CircuitOpenError) -> Self {
        WebhookError::CircuitOpen(err.name)
    }
}

/// A connector wrapped with its own breaker.
pub struct GuardedConnector {
    name: String,
    inner: Arc<dyn VoucherConnector>,
    breaker: Arc<InMemoryCircuitBreaker>,
}

impl GuardedConnector {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn breaker(&self) -> &Arc<InMemoryCircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl VoucherConnector for GuardedConnector {
    async fn issue_voucher(&self, request: &VoucherRequest) -> Result<VoucherResponse, ConnectorError> {
        self.breaker
            .call_classified(ConnectorError::trips_breaker, || self.inner.issue_voucher(request))
            .await
    }

    async fn check_status(&self, transaction_id: &str) -> Result<VoucherStatus, ConnectorError> {
        self.breaker
            .call_classified(ConnectorError::trips_breaker, || {
                self.inner.check_status(transaction_id)
            })
            .await
    }

    async fn cancel_voucher(&self, external_ref: &str) -> Result<(), ConnectorError> {
        self.breaker
            .call_classified(ConnectorError::trips_breaker, || {
                self.inner.cancel_voucher(external_ref)
            })
            .await
    }
}

/// Breaker health of one registered connector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectorHealth {
    pub name: String,
    pub metrics: CircuitBreakerMetrics,
}

/// Registered suppliers, each behind its own breaker.
pub struct ConnectorRegistry {
    breakers: Arc<CircuitBreakerRegistry>,
    connectors: RwLock<BTreeMap<String, Arc<GuardedConnector>>>,
}

impl ConnectorRegistry {
    pub fn new(breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self {
            breakers,
            connectors: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers `connector` under `name`, replacing any previous one. The
    /// breaker for `name` survives replacement.
    pub fn register(&self, name: impl Into<String>, connector: Arc<dyn VoucherConnector>) {
        let name = name.into();
        let breaker = self.breakers.get_or_create(&format!("connector:{name}"));
        let guarded = Arc::new(GuardedConnector {
            name: name.clone(),
            inner: connector,
            breaker,
        });
        tracing::info!(connector = %name, "Registered voucher connector");
        write(&self.connectors).insert(name, guarded);
    }

    pub fn get(&self, name: &str) -> Option<Arc<GuardedConnector>> {
        read(&self.connectors).get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        read(&self.connectors).keys().cloned().collect()
    }

    /// The breaker registry shared with other outbound callers.
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Manually closes a connector's breaker. Returns false for unknown names.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(connector) => {
                connector.breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn health(&self) -> Vec<ConnectorHealth> {
        read(&self.connectors)
            .values()
            .map(|c| ConnectorHealth {
                name: c.name.clone(),
                metrics: c.breaker.metrics(),
            })
            .collect()
    }
}
