//! Webhook sender port - performs one signed HTTP POST.
//!
//! A sender reports any HTTP answer as `Ok`; deciding whether a status counts
//! as delivered is the caller's job. Only transport failures are `Err`.

use async_trait::async_trait;

use crate::domain::webhook::WebhookError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, request: &WebhookRequest) -> Result<WebhookResponse, WebhookError>;
}
