//! Scriptable voucher connector for tests and local development.
//!
//! Responses are queued and returned in order. When the queue is empty the
//! connector answers with a successful voucher derived from the idempotency
//! key, so repeated calls with the same key yield the same code.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::ports::{
    ConnectorError, VoucherConnector, VoucherRequest, VoucherResponse, VoucherStatus,
};

#[derive(Default)]
struct MockState {
    script: VecDeque<Result<VoucherResponse, ConnectorError>>,
    requests: Vec<VoucherRequest>,
    cancelled: Vec<String>,
}

/// In-memory `VoucherConnector` with call tracking.
#[derive(Clone, Default)]
pub struct MockVoucherConnector {
    inner: Arc<Mutex<MockState>>,
}

impl MockVoucherConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of the next `issue_voucher` call.
    pub fn push(&self, result: Result<VoucherResponse, ConnectorError>) {
        self.state().script.push_back(result);
    }

    /// Queues `count` copies of the same error.
    pub fn fail_times(&self, count: usize, error: ConnectorError) {
        let mut state = self.state();
        for _ in 0..count {
            state.script.push_back(Err(error.clone()));
        }
    }

    pub fn requests(&self) -> Vec<VoucherRequest> {
        self.state().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().requests.len()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state().cancelled.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl VoucherConnector for MockVoucherConnector {
    async fn issue_voucher(
        &self,
        request: &VoucherRequest,
    ) -> Result<VoucherResponse, ConnectorError> {
        let mut state = self.state();
        state.requests.push(request.clone());
        match state.script.pop_front() {
            Some(result) => result,
            None => Ok(VoucherResponse {
                voucher_code: Some(format!("MOCK-{}", request.idempotency_key)),
                transaction_id: format!("tx-{}", request.idempotency_key),
                status: VoucherStatus::Success,
                message: None,
            }),
        }
    }

    async fn check_status(&self, _transaction_id: &str) -> Result<VoucherStatus, ConnectorError> {
        Ok(VoucherStatus::Success)
    }

    async fn cancel_voucher(&self, external_ref: &str) -> Result<(), ConnectorError> {
        self.state().cancelled.push(external_ref.to_string());
        Ok(())
    }
}
