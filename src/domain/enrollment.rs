use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub schedule_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    /// Statuses that may only be held while the linked payment is settled.
    pub fn requires_settled_payment(&self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Confirmed | EnrollmentStatus::Active | EnrollmentStatus::Completed
        )
    }
}
