use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod user_repository;
pub mod course_repository;
pub mod enrollment_repository;
pub mod payment_repository;
pub mod verification_repository;

pub use user_repository::SqliteUserRepository;
pub use course_repository::SqliteCourseRepository;
pub use enrollment_repository::SqliteEnrollmentRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use verification_repository::SqliteVerificationCodeRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn password_hash(&self, email: &str) -> Result<Option<String>>;
    async fn mark_phone_verified(&self, id: Uuid, phone: &str) -> Result<User>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, course: CreateCourseRequest) -> Result<Course>;
    async fn create_schedule(&self, schedule: CreateScheduleRequest) -> Result<CourseSchedule>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Course>>;
    async fn find_schedule(&self, id: Uuid) -> Result<Option<CourseSchedule>>;
    async fn list_published(&self, limit: i64, offset: i64) -> Result<Vec<Course>>;
    async fn list_schedules(&self, course_id: Uuid) -> Result<Vec<CourseSchedule>>;
    /// Removes the courses together with their schedules, enrollments and
    /// the payments those enrollments reference.
    async fn delete_cascade(&self, ids: &[Uuid]) -> Result<CourseDeletion>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Inserts the enrollment, and the payment when one is given, in one
    /// transaction. The enrollment is linked to the new payment. Yields
    /// `Conflict` when the user already holds an open enrollment for the
    /// schedule or the schedule is at capacity.
    async fn create(
        &self,
        user_id: Uuid,
        schedule_id: Uuid,
        status: EnrollmentStatus,
        payment: Option<NewPayment>,
    ) -> Result<(Enrollment, Option<Payment>)>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Enrollment>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Enrollment>>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Enrollment>>;
    async fn list_by_payment(&self, payment_id: Uuid) -> Result<Vec<Enrollment>>;
    async fn count_by_status(&self) -> Result<Vec<(EnrollmentStatus, i64)>>;
    /// Statuses that imply a paid seat are refused with `Conflict` unless
    /// the linked payment is settled at the moment of the write.
    async fn update_status(&self, id: Uuid, status: EnrollmentStatus) -> Result<Enrollment>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_bill_id(&self, bill_id: &str) -> Result<Option<Payment>>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Payment>>;
    async fn count_by_status(&self) -> Result<Vec<(PaymentStatus, i64)>>;
    /// Writes the settlement to the payment and every enrollment linked to
    /// it in a single transaction. Returns the payment and the number of
    /// enrollments updated. With `require_unsettled`, a payment that is
    /// already confirmed or completed is left untouched and `Conflict` is
    /// returned.
    async fn settle(
        &self,
        id: Uuid,
        settlement: Settlement,
        require_unsettled: bool,
    ) -> Result<(Payment, u64)>;
}

#[async_trait]
pub trait VerificationCodeRepository: Send + Sync {
    async fn upsert(&self, phone: &str, code_hash: &str, expires_at: DateTime<Utc>) -> Result<()>;
    async fn find(&self, phone: &str) -> Result<Option<VerificationCode>>;
    async fn record_failed_attempt(&self, phone: &str) -> Result<i64>;
    async fn delete(&self, phone: &str) -> Result<()>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
