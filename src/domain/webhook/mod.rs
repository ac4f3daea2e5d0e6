//! Outbound webhooks: event envelopes, endpoint config, signing, and the
//! delivery audit record.

mod config;
mod errors;
mod event;
pub mod signature;

pub use config::{DeliveryStatus, Webhook, WebhookDeliveryAttempt, MAX_RESPONSE_BODY};
pub use errors::WebhookError;
pub use event::{EventEnvelope, EventType};
pub use signature::{signature_header_value, verify_signature};
