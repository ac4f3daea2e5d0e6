//! reqwest implementation of `WebhookSender`.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::domain::webhook::WebhookError;
use crate::ports::{WebhookRequest, WebhookResponse, WebhookSender};

/// Posts webhook bodies with a per-request timeout.
#[derive(Clone)]
pub struct HttpWebhookSender {
    client: Client,
}

impl HttpWebhookSender {
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("loyalty-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WebhookError::Transport(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, request: &WebhookRequest) -> Result<WebhookResponse, WebhookError> {
        let mut builder = self
            .client
            .post(&request.url)
            .header("Content-Type", "application/json")
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                WebhookError::Transport(format!("timed out: {}", e))
            } else {
                WebhookError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(WebhookResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;

    fn request(url: String) -> WebhookRequest {
        WebhookRequest {
            url,
            headers: vec![("X-Webhook-Event".to_string(), "reward.issued".to_string())],
            body: br#"{"event":"reward.issued"}"#.to_vec(),
        }
    }

    #[tokio::test]
    async fn posts_body_with_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hooks")
                    .header("x-webhook-event", "reward.issued")
                    .header("content-type", "application/json")
                    .body(r#"{"event":"reward.issued"}"#);
                then.status(202).body("queued");
            })
            .await;

        let sender = HttpWebhookSender::new(Duration::from_secs(5)).unwrap();
        let response = sender.send(&request(server.url("/hooks"))).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 202);
        assert_eq!(response.body, "queued");
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn non_2xx_is_reported_not_raised() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/hooks");
                then.status(500).body("boom");
            })
            .await;

        let sender = HttpWebhookSender::new(Duration::from_secs(5)).unwrap();
        let response = sender.send(&request(server.url("/hooks"))).await.unwrap();

        assert_eq!(response.status, 500);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let sender = HttpWebhookSender::new(Duration::from_millis(500)).unwrap();
        let err = sender
            .send(&request("http://127.0.0.1:1/hooks".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Transport(_)));
        assert!(err.is_retriable());
    }
}
