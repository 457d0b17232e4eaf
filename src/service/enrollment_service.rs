use std::sync::Arc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{CourseRepository, EnrollmentRepository},
};

/// Outcome of a registration: the enrollment plus the payment it waits on,
/// absent for free courses.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub enrollment: Enrollment,
    pub payment: Option<Payment>,
}

pub struct EnrollmentService {
    course_repo: Arc<dyn CourseRepository>,
    enrollment_repo: Arc<dyn EnrollmentRepository>,
}

impl EnrollmentService {
    pub fn new(
        course_repo: Arc<dyn CourseRepository>,
        enrollment_repo: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self { course_repo, enrollment_repo }
    }

    pub async fn register(
        &self,
        user_id: Uuid,
        schedule_id: Uuid,
        method: PaymentMethod,
    ) -> Result<Registration> {
        if method == PaymentMethod::Manual {
            return Err(AppError::Validation("Manual payments are recorded by administrators".to_string()));
        }

        let schedule = self.course_repo.find_schedule(schedule_id).await?
            .ok_or_else(|| AppError::NotFound("Schedule not found".to_string()))?;

        let course = self.course_repo.find_by_id(schedule.course_id).await?
            .filter(|c| c.published)
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

        let (enrollment, payment) = if course.is_free() {
            self.enrollment_repo
                .create(user_id, schedule_id, EnrollmentStatus::Confirmed, None)
                .await?
        } else {
            let new_payment = NewPayment {
                user_id,
                bill_id: generate_bill_id(),
                amount_cents: course.price_cents,
                currency: course.currency.clone(),
                method,
            };
            self.enrollment_repo
                .create(user_id, schedule_id, EnrollmentStatus::Pending, Some(new_payment))
                .await?
        };

        tracing::info!(
            "User {} registered for course '{}' (schedule {})",
            user_id,
            course.slug,
            schedule_id
        );

        Ok(Registration { enrollment, payment })
    }

    /// Admin status change. Statuses that imply a paid seat are refused
    /// while the linked payment is unsettled.
    pub async fn update_status(&self, id: Uuid, status: EnrollmentStatus) -> Result<Enrollment> {
        self.enrollment_repo.update_status(id, status).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Enrollment>> {
        self.enrollment_repo.list_by_user(user_id).await
    }
}

fn generate_bill_id() -> String {
    let id = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("B-{}", &id[..12])
}
