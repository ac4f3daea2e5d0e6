//! External reward supplier connectors.
//!
//! - `HttpVoucherConnector` - signed JSON over HTTP
//! - `MockVoucherConnector` - scripted responses for tests

mod http_connector;
mod mock_connector;

pub use http_connector::{
    HttpConnectorConfig, HttpVoucherConnector, IDEMPOTENCY_HEADER, SIGNATURE_HEADER,
};
pub use mock_connector::MockVoucherConnector;
