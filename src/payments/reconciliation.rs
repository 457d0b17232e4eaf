//! Payment / enrollment status reconciliation.
//!
//! Every write to a payment's status goes through [`ReconciliationService`],
//! which settles the payment and all enrollments referencing it in one
//! database transaction. Enrollments therefore never hold a confirmed,
//! active or completed status while their payment is unsettled.

use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentSignal, PaymentStatus, Settlement},
    error::{AppError, Result},
    repository::PaymentRepository,
};

/// Result of one applied reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub payment: Payment,
    pub enrollments_updated: u64,
}

pub struct ReconciliationService {
    payment_repo: Arc<dyn PaymentRepository>,
}

impl ReconciliationService {
    pub fn new(payment_repo: Arc<dyn PaymentRepository>) -> Self {
        Self { payment_repo }
    }

    /// Applies a status reported by the payment gateway.
    ///
    /// Duplicate deliveries are not detected: the written values are
    /// absolute, so replaying the same signal leaves the same end state.
    pub async fn apply_gateway_signal(
        &self,
        bill_id: &str,
        signal: PaymentSignal,
        transaction_id: Option<String>,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Reconciliation> {
        let payment = match self.payment_repo.find_by_bill_id(bill_id).await? {
            Some(payment) => payment,
            None => {
                tracing::warn!("Webhook for unknown bill: {}", bill_id);
                return Err(AppError::NotFound("Payment not found".to_string()));
            }
        };

        let settlement = match signal {
            PaymentSignal::Paid => Settlement {
                payment_status: PaymentStatus::Completed,
                enrollment_status: signal.enrollment_status(),
                paid_at: Some(paid_at.unwrap_or_else(Utc::now)),
                transaction_id,
            },
            PaymentSignal::Failed => Settlement {
                payment_status: PaymentStatus::Failed,
                enrollment_status: signal.enrollment_status(),
                paid_at: None,
                transaction_id,
            },
        };

        self.apply(payment.id, settlement, false).await
    }

    /// Admin confirmation of a payment received outside the gateway.
    /// A payment that is already confirmed or completed yields `Conflict`.
    pub async fn confirm_manually(&self, payment_id: Uuid) -> Result<Reconciliation> {
        let settlement = Settlement {
            payment_status: PaymentStatus::Confirmed,
            enrollment_status: PaymentSignal::Paid.enrollment_status(),
            paid_at: Some(Utc::now()),
            transaction_id: None,
        };

        self.apply(payment_id, settlement, true).await
    }

    /// Cancellation of a pending payment by the user who owns it.
    pub async fn cancel_by_user(&self, user_id: Uuid, payment_id: Uuid) -> Result<Reconciliation> {
        let payment = self.payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.user_id != user_id {
            return Err(AppError::Forbidden);
        }

        if payment.status != PaymentStatus::Pending {
            return Err(AppError::Conflict("Only pending payments can be cancelled".to_string()));
        }

        let settlement = Settlement {
            payment_status: PaymentStatus::Failed,
            enrollment_status: PaymentSignal::Failed.enrollment_status(),
            paid_at: None,
            transaction_id: None,
        };

        self.apply(payment.id, settlement, true).await
    }

    async fn apply(
        &self,
        payment_id: Uuid,
        settlement: Settlement,
        require_unsettled: bool,
    ) -> Result<Reconciliation> {
        let target = settlement.payment_status;
        let (payment, enrollments_updated) = self.payment_repo
            .settle(payment_id, settlement, require_unsettled)
            .await
            .map_err(|e| {
                if let AppError::NotFound(_) = e {
                    tracing::warn!("Reconciliation for unknown payment: {}", payment_id);
                }
                e
            })?;

        tracing::info!(
            payment_id = %payment.id,
            bill_id = %payment.bill_id,
            status = ?target,
            enrollments_updated,
            "Payment reconciled"
        );

        Ok(Reconciliation { payment, enrollments_updated })
    }
}
