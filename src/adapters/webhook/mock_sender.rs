//! Recording webhook sender for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::domain::webhook::WebhookError;
use crate::ports::{WebhookRequest, WebhookResponse, WebhookSender};

#[derive(Default)]
struct SenderState {
    script: VecDeque<Result<WebhookResponse, WebhookError>>,
    sent: Vec<WebhookRequest>,
}

/// Captures every request. Answers from a queued script, then `200 OK`.
#[derive(Clone, Default)]
pub struct RecordingWebhookSender {
    inner: Arc<Mutex<SenderState>>,
}

impl RecordingWebhookSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, status: u16) {
        self.state().script.push_back(Ok(WebhookResponse {
            status,
            body: String::new(),
        }));
    }

    pub fn push_error(&self, error: WebhookError) {
        self.state().script.push_back(Err(error));
    }

    pub fn sent(&self) -> Vec<WebhookRequest> {
        self.state().sent.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SenderState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl WebhookSender for RecordingWebhookSender {
    async fn send(&self, request: &WebhookRequest) -> Result<WebhookResponse, WebhookError> {
        let mut state = self.state();
        state.sent.push(request.clone());
        state.script.pop_front().unwrap_or(Ok(WebhookResponse {
            status: 200,
            body: "ok".to_string(),
        }))
    }
}
