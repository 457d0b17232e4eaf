use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Body posted by the payment gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub bill_id: Option<String>,
    pub status: Option<String>,
    pub tx_id: Option<String>,
    pub paid_at: Option<String>,
}

impl WebhookPayload {
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))
    }

    pub fn bill_id(&self) -> Result<&str> {
        self.bill_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::Validation("billId is required".to_string()))
    }

    /// The gateway's payment time. An unparseable value is dropped so the
    /// caller falls back to the time of receipt.
    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.paid_at.as_deref()?;
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!("Ignoring unparseable paidAt '{}': {}", raw, e);
                None
            }
        }
    }
}

/// Checks the HMAC-SHA256 signature the gateway computes over the raw body.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret: secret.filter(|s| !s.is_empty()) }
    }

    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        let Some(secret) = &self.secret else {
            tracing::warn!("Webhook signature not checked: no webhook secret configured");
            return Ok(());
        };

        let signature = signature.ok_or(AppError::Unauthorized)?;
        let expected = hex::decode(signature.trim()).map_err(|_| AppError::Unauthorized)?;

        let mut mac = keyed_mac(secret)?;
        mac.update(body);
        mac.verify_slice(&expected).map_err(|_| {
            tracing::warn!("Rejected webhook with invalid signature");
            AppError::Unauthorized
        })
    }
}

fn keyed_mac(secret: &str) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::Internal(e.to_string()))
}

/// Hex signature for `body`, as the gateway would send it.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = keyed_mac(secret)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_signature() {
        let verifier = WebhookVerifier::new(Some("whsec_test".to_string()));
        let body = br#"{"billId":"B-1","status":"paid"}"#;
        let signature = sign("whsec_test", body).unwrap();
        assert!(verifier.verify(body, Some(&signature)).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let verifier = WebhookVerifier::new(Some("whsec_test".to_string()));
        let signature = sign("whsec_test", br#"{"billId":"B-1","status":"paid"}"#).unwrap();
        let result = verifier.verify(br#"{"billId":"B-2","status":"paid"}"#, Some(&signature));
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn rejects_missing_or_garbled_signature() {
        let verifier = WebhookVerifier::new(Some("whsec_test".to_string()));
        assert!(matches!(verifier.verify(b"{}", None), Err(AppError::Unauthorized)));
        assert!(matches!(verifier.verify(b"{}", Some("zz")), Err(AppError::Unauthorized)));
    }

    #[test]
    fn unsigned_when_no_secret() {
        let verifier = WebhookVerifier::new(None);
        assert!(verifier.verify(b"{}", None).is_ok());
    }

    #[test]
    fn payload_requires_bill_id() {
        let payload = WebhookPayload::parse(br#"{"status":"paid"}"#).unwrap();
        assert!(matches!(payload.bill_id(), Err(AppError::Validation(_))));

        let payload = WebhookPayload::parse(
            br#"{"billId":"B-42","status":"paid","txId":"T-1","paidAt":"2025-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(payload.bill_id().unwrap(), "B-42");
        assert_eq!(payload.tx_id.as_deref(), Some("T-1"));
        assert_eq!(
            payload.paid_at().map(|dt| dt.to_rfc3339()),
            Some("2025-03-01T10:00:00+00:00".to_string())
        );
    }

    #[test]
    fn malformed_paid_at_is_dropped() {
        let payload = WebhookPayload::parse(
            br#"{"billId":"B-42","status":"paid","paidAt":"01/03/2025 10:00"}"#,
        )
        .unwrap();
        assert!(payload.paid_at().is_none());
    }
}
