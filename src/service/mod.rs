pub mod enrollment_service;
pub mod verification_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::auth::AuthService;
use crate::config::Settings;
use crate::payments::{ReconciliationService, WebhookVerifier};
use crate::repository::*;
use enrollment_service::EnrollmentService;
use verification_service::{CodeSender, VerificationService};

pub use enrollment_service::Registration;

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub course_repo: Arc<dyn CourseRepository>,
    pub enrollment_repo: Arc<dyn EnrollmentRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub auth_service: Arc<AuthService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub webhook_verifier: WebhookVerifier,
    pub enrollment_service: Arc<EnrollmentService>,
    pub verification_service: Arc<VerificationService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(db_pool: SqlitePool, settings: &Settings, code_sender: Arc<dyn CodeSender>) -> Self {
        let user_repo: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let course_repo: Arc<dyn CourseRepository> =
            Arc::new(SqliteCourseRepository::new(db_pool.clone()));
        let enrollment_repo: Arc<dyn EnrollmentRepository> =
            Arc::new(SqliteEnrollmentRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let code_repo: Arc<dyn VerificationCodeRepository> =
            Arc::new(SqliteVerificationCodeRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            settings.auth.session_duration_hours,
        ));
        let reconciliation = Arc::new(ReconciliationService::new(payment_repo.clone()));
        let webhook_verifier = WebhookVerifier::new(settings.payments.webhook_secret.clone());
        let enrollment_service = Arc::new(EnrollmentService::new(
            course_repo.clone(),
            enrollment_repo.clone(),
        ));
        let verification_service = Arc::new(VerificationService::new(
            code_repo,
            user_repo.clone(),
            code_sender,
            settings.verification.clone(),
        ));

        Self {
            user_repo,
            course_repo,
            enrollment_repo,
            payment_repo,
            auth_service,
            reconciliation,
            webhook_verifier,
            enrollment_service,
            verification_service,
            db_pool,
        }
    }
}
