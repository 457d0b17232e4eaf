pub mod reconciliation;
pub mod webhook;

pub use reconciliation::{Reconciliation, ReconciliationService};
pub use webhook::{WebhookPayload, WebhookVerifier};
