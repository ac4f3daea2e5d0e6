//! HTTP voucher connector - reqwest implementation of `VoucherConnector`.
//!
//! # Wire protocol
//!
//! | Operation        | Request                               |
//! |------------------|---------------------------------------|
//! | `issue_voucher`  | `POST {base}/vouchers` (JSON body)    |
//! | `check_status`   | `GET {base}/vouchers/{transaction_id}`|
//! | `cancel_voucher` | `POST {base}/vouchers/{ref}/cancel`   |
//!
//! Every request carries `Authorization: Bearer <api key>` and
//! `X-Signature: <hex HMAC-SHA256 of the raw body>`. Issue requests also carry
//! `Idempotency-Key: <issuance id>` so suppliers can deduplicate retries.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::webhook::signature::sign_hex;
use crate::ports::{
    ConnectorError, VoucherConnector, VoucherRequest, VoucherResponse, VoucherStatus,
};

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Configuration for one HTTP supplier.
#[derive(Debug, Clone)]
pub struct HttpConnectorConfig {
    pub base_url: String,
    api_key: Secret<String>,
    signing_secret: Secret<String>,
    pub timeout: Duration,
}

impl HttpConnectorConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        signing_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: Secret::new(api_key.into()),
            signing_secret: Secret::new(signing_secret.into()),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: VoucherStatus,
}

/// reqwest-backed supplier connector.
pub struct HttpVoucherConnector {
    config: HttpConnectorConfig,
    client: Client,
}

impl HttpVoucherConnector {
    pub fn new(config: HttpConnectorConfig) -> Result<Self, ConnectorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConnectorError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn signed(&self, builder: RequestBuilder, body: Vec<u8>) -> RequestBuilder {
        let signature = sign_hex(self.config.signing_secret.expose_secret().as_bytes(), &body);
        builder
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ConnectorError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::Timeout
            } else {
                ConnectorError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ConnectorError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl VoucherConnector for HttpVoucherConnector {
    async fn issue_voucher(
        &self,
        request: &VoucherRequest,
    ) -> Result<VoucherResponse, ConnectorError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| ConnectorError::InvalidResponse(format!("encode request: {}", e)))?;

        let builder = self
            .signed(self.client.post(self.url("/vouchers")), body)
            .header(IDEMPOTENCY_HEADER, &request.idempotency_key);

        self.send(builder)
            .await?
            .json::<VoucherResponse>()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))
    }

    async fn check_status(&self, transaction_id: &str) -> Result<VoucherStatus, ConnectorError> {
        let builder = self.signed(
            self.client
                .get(self.url(&format!("/vouchers/{}", transaction_id))),
            Vec::new(),
        );

        let body: StatusBody = self
            .send(builder)
            .await?
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
        Ok(body.status)
    }

    async fn cancel_voucher(&self, external_ref: &str) -> Result<(), ConnectorError> {
        let builder = self.signed(
            self.client
                .post(self.url(&format!("/vouchers/{}/cancel", external_ref))),
            b"{}".to_vec(),
        );
        self.send(builder).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Currency;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    fn request() -> VoucherRequest {
        VoucherRequest {
            product_id: "airtime-100".to_string(),
            recipient: "+254700000001".to_string(),
            amount: 10_000,
            currency: Currency::Kes,
            idempotency_key: "iss-123".to_string(),
        }
    }

    fn connector(server: &MockServer) -> HttpVoucherConnector {
        HttpVoucherConnector::new(HttpConnectorConfig::new(
            server.base_url(),
            "key-1",
            "shh",
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn issue_sends_signed_idempotent_request() {
        let server = MockServer::start_async().await;
        let body = serde_json::to_vec(&request()).unwrap();
        let expected_signature = sign_hex(b"shh", &body);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vouchers")
                    .header("authorization", "Bearer key-1")
                    .header("idempotency-key", "iss-123")
                    .header("x-signature", expected_signature.as_str())
                    .body_includes("\"product_id\":\"airtime-100\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        json!({
                            "voucher_code": "AIR-42",
                            "transaction_id": "tx-9",
                            "status": "success"
                        })
                        .to_string(),
                    );
            })
            .await;

        let response = connector(&server).issue_voucher(&request()).await.unwrap();
        mock.assert_async().await;

        assert_eq!(response.voucher_code.as_deref(), Some("AIR-42"));
        assert_eq!(response.transaction_id, "tx-9");
        assert_eq!(response.status, VoucherStatus::Success);
    }

    #[tokio::test]
    async fn server_error_maps_to_retriable_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/vouchers");
                then.status(503).body("maintenance");
            })
            .await;

        let err = connector(&server).issue_voucher(&request()).await.unwrap_err();
        assert_eq!(
            err,
            ConnectorError::Http {
                status: 503,
                body: "maintenance".to_string()
            }
        );
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn client_error_is_not_retriable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/vouchers");
                then.status(422).body("unknown product");
            })
            .await;

        let err = connector(&server).issue_voucher(&request()).await.unwrap_err();
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/vouchers");
                then.status(200).body("not json");
            })
            .await;

        let err = connector(&server).issue_voucher(&request()).await.unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn check_status_reads_status_field() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/vouchers/tx-9");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(json!({"status": "pending"}).to_string());
            })
            .await;

        let status = connector(&server).check_status("tx-9").await.unwrap();
        mock.assert_async().await;
        assert_eq!(status, VoucherStatus::Pending);
    }

    #[tokio::test]
    async fn cancel_posts_to_cancel_path() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/vouchers/ext-1/cancel");
                then.status(204);
            })
            .await;

        connector(&server).cancel_voucher("ext-1").await.unwrap();
        mock.assert_async().await;
    }
}
