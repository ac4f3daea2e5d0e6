//! Rewards fulfilled by the tenant's own system through a signed webhook.
//!
//! Each endpoint host sits behind its own circuit breaker, named
//! `webhook_custom:<host>:<port>`, so a dead tenant system stops being
//! called until the breaker lets a trial request through.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use reqwest::Url;

use crate::adapters::resilience::{CircuitBreakerRegistry, RetryError, RetryPolicy};
use crate::domain::issuance::Issuance;
use crate::domain::reward::{ProcessResult, Reward, RewardError, RewardType, WebhookCustomConfig};
use crate::domain::webhook::signature::{EVENT_HEADER, SIGNATURE_HEADER};
use crate::domain::webhook::{signature_header_value, WebhookError};
use crate::ports::{WebhookRequest, WebhookResponse, WebhookSender};

use super::{ProcessContext, RewardHandler};

pub const CUSTOM_EVENT: &str = "reward.custom";

pub struct WebhookCustomHandler {
    sender: Arc<dyn WebhookSender>,
    breakers: Arc<CircuitBreakerRegistry>,
    retry: RetryPolicy,
}

impl WebhookCustomHandler {
    pub fn new(
        sender: Arc<dyn WebhookSender>,
        breakers: Arc<CircuitBreakerRegistry>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            sender,
            breakers,
            retry,
        }
    }

    /// Breaker name shared by every reward posting to the same endpoint host.
    pub fn breaker_name(url: &Url) -> String {
        format!(
            "webhook_custom:{}:{}",
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default()
        )
    }

    fn payload(issuance: &Issuance, reward: &Reward, extra: &Value) -> Value {
        let mut body = json!({
            "event": CUSTOM_EVENT,
            "issuance_id": issuance.id,
            "tenant_id": issuance.tenant_id,
            "customer_id": issuance.customer_id,
            "reward_id": reward.id,
            "reward_name": reward.name,
            "currency": issuance.currency,
            "face_amount": issuance.face_amount,
        });
        // Caller-supplied fields never overwrite the issuance identity.
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                body.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        body
    }
}

async fn post(
    sender: &dyn WebhookSender,
    request: &WebhookRequest,
) -> Result<WebhookResponse, WebhookError> {
    let response = sender.send(request).await?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(WebhookError::Status {
            status: response.status,
            body: response.body,
        })
    }
}

#[async_trait]
impl RewardHandler for WebhookCustomHandler {
    fn reward_type(&self) -> RewardType {
        RewardType::WebhookCustom
    }

    async fn process(
        &self,
        ctx: &mut ProcessContext<'_>,
        issuance: &Issuance,
        reward: &Reward,
    ) -> Result<ProcessResult, RewardError> {
        let config: WebhookCustomConfig = reward.parse_config()?;
        let endpoint = Url::parse(&config.url)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
            .ok_or_else(|| {
                RewardError::invalid_config(
                    reward.id,
                    format!("webhook url must be http(s): {}", config.url),
                )
            })?;
        let breaker = self.breakers.get_or_create(&Self::breaker_name(&endpoint));

        let body = serde_json::to_vec(&Self::payload(issuance, reward, &config.payload))
            .map_err(|e| RewardError::invalid_config(reward.id, e.to_string()))?;
        let request = WebhookRequest {
            url: config.url.clone(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (
                    SIGNATURE_HEADER.to_string(),
                    signature_header_value(config.secret.as_bytes(), &body),
                ),
                (EVENT_HEADER.to_string(), CUSTOM_EVENT.to_string()),
            ],
            body,
        };

        let sender = self.sender.as_ref();
        let (request, breaker) = (&request, &breaker);
        let response = self
            .retry
            .execute(ctx.cancel, |_| async move {
                breaker
                    .call_classified(WebhookError::is_retriable, || post(sender, request))
                    .await
            })
            .await
            .map_err(|err| match err {
                RetryError::Cancelled { .. } => RewardError::Cancelled,
                RetryError::Aborted {
                    error: WebhookError::CircuitOpen(name),
                    ..
                } => RewardError::CircuitOpen(name),
                RetryError::Aborted { error, .. } => {
                    RewardError::supplier(&config.url, error.to_string())
                }
                RetryError::Exhausted { attempts, last } => RewardError::RetriesExhausted {
                    attempts,
                    last: last.to_string(),
                },
            })?;

        tracing::info!(
            issuance_id = %issuance.id,
            url = %config.url,
            status = response.status,
            "Custom reward webhook accepted"
        );

        Ok(ProcessResult {
            code: None,
            external_ref: None,
            expires_at: None,
            metadata: json!({
                "url": config.url,
                "status": response.status,
            }),
        })
    }
}
