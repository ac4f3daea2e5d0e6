//! Outbound webhook transport.

mod http_sender;
mod mock_sender;

pub use http_sender::HttpWebhookSender;
pub use mock_sender::RecordingWebhookSender;
