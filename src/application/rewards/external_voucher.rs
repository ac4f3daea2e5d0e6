//! Vouchers bought from an external supplier.
//!
//! The call goes through the supplier's circuit breaker and is retried with
//! backoff. The issuance id is the idempotency key, so a retry after a lost
//! response cannot buy a second voucher.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::adapters::resilience::{ConnectorRegistry, RetryError, RetryPolicy};
use crate::domain::issuance::Issuance;
use crate::domain::reward::{
    expiry_after, window_days, ExternalVoucherConfig, ProcessResult, Reward, RewardError,
    RewardType,
};
use crate::ports::{ConnectorError, VoucherConnector, VoucherRequest, VoucherStatus};

use super::{ProcessContext, RewardHandler};

pub struct ExternalVoucherHandler {
    connectors: Arc<ConnectorRegistry>,
    retry: RetryPolicy,
}

impl ExternalVoucherHandler {
    pub fn new(connectors: Arc<ConnectorRegistry>, retry: RetryPolicy) -> Self {
        Self { connectors, retry }
    }
}

fn to_reward_error(supplier: &str, err: RetryError<ConnectorError>) -> RewardError {
    match err {
        RetryError::Cancelled { .. } => RewardError::Cancelled,
        RetryError::Aborted {
            error: ConnectorError::CircuitOpen(name),
            ..
        } => RewardError::CircuitOpen(name),
        RetryError::Aborted {
            error: ConnectorError::Cancelled,
            ..
        } => RewardError::Cancelled,
        RetryError::Aborted { error, .. } => RewardError::supplier(supplier, error.to_string()),
        RetryError::Exhausted { attempts, last } => RewardError::RetriesExhausted {
            attempts,
            last: last.to_string(),
        },
    }
}

#[async_trait]
impl RewardHandler for ExternalVoucherHandler {
    fn reward_type(&self) -> RewardType {
        RewardType::ExternalVoucher
    }

    async fn process(
        &self,
        ctx: &mut ProcessContext<'_>,
        issuance: &Issuance,
        reward: &Reward,
    ) -> Result<ProcessResult, RewardError> {
        let config: ExternalVoucherConfig = reward.parse_config()?;
        let expires_at = match config.valid_days {
            Some(days) => {
                let days = window_days(reward.id, "valid_days", Some(days), days)?;
                Some(expiry_after(reward.id, "valid_days", days)?)
            }
            None => None,
        };
        let connector = self
            .connectors
            .get(&config.supplier)
            .ok_or_else(|| RewardError::ConnectorNotFound(config.supplier.clone()))?;

        let request = VoucherRequest {
            product_id: config.product_id.clone(),
            recipient: issuance.customer_id.to_string(),
            amount: issuance.face_amount,
            currency: issuance.currency,
            idempotency_key: issuance.id.to_string(),
        };

        let connector = &connector;
        let request_ref = &request;
        let response = self
            .retry
            .execute(ctx.cancel, |attempt| {
                tracing::debug!(
                    issuance_id = %issuance.id,
                    supplier = %config.supplier,
                    attempt,
                    "Requesting external voucher"
                );
                connector.issue_voucher(request_ref)
            })
            .await
            .map_err(|e| to_reward_error(&config.supplier, e))?;

        match response.status {
            VoucherStatus::Success | VoucherStatus::Pending => {}
            VoucherStatus::Failed | VoucherStatus::Cancelled => {
                return Err(RewardError::supplier(
                    &config.supplier,
                    response
                        .message
                        .unwrap_or_else(|| format!("voucher {:?}", response.status)),
                ));
            }
        }

        Ok(ProcessResult {
            code: response.voucher_code,
            external_ref: Some(response.transaction_id),
            expires_at,
            metadata: json!({
                "supplier": config.supplier,
                "product_id": config.product_id,
                "supplier_status": response.status,
                "message": response.message,
            }),
        })
    }
}
