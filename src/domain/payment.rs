use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EnrollmentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bill_id: String,
    pub transaction_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// Confirmed by an admin or completed by the gateway.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed | PaymentStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Transfer,
    Manual,
}

/// Outcome reported for a payment, either by the gateway or by a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSignal {
    Paid,
    Failed,
}

impl PaymentSignal {
    /// Maps a gateway status string. Unknown statuses yield `None`.
    pub fn from_gateway_status(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "paid" | "completed" => Some(PaymentSignal::Paid),
            "cancelled" | "canceled" | "failed" => Some(PaymentSignal::Failed),
            _ => None,
        }
    }

    pub fn enrollment_status(&self) -> EnrollmentStatus {
        match self {
            PaymentSignal::Paid => EnrollmentStatus::Confirmed,
            PaymentSignal::Failed => EnrollmentStatus::Cancelled,
        }
    }
}

/// The absolute values written by one reconciliation.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub payment_status: PaymentStatus,
    pub enrollment_status: EnrollmentStatus,
    /// Applied only when the payment has no `paid_at` yet.
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub bill_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub method: PaymentMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_status_mapping() {
        assert_eq!(PaymentSignal::from_gateway_status("paid"), Some(PaymentSignal::Paid));
        assert_eq!(PaymentSignal::from_gateway_status("COMPLETED"), Some(PaymentSignal::Paid));
        assert_eq!(PaymentSignal::from_gateway_status("canceled"), Some(PaymentSignal::Failed));
        assert_eq!(PaymentSignal::from_gateway_status(" failed "), Some(PaymentSignal::Failed));
        assert_eq!(PaymentSignal::from_gateway_status("pending"), None);
    }

    #[test]
    fn settled_statuses() {
        assert!(PaymentStatus::Confirmed.is_settled());
        assert!(PaymentStatus::Completed.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(!PaymentStatus::Failed.is_settled());
    }
}
