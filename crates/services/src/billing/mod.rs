//! Payment provider webhooks.

mod signature;
mod webhook;

pub use signature::{
    DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, SignatureVerifier, header_value, sign,
};
pub use webhook::{BillingWebhookService, WebhookOutcome};
