mod common;

use chrono::{TimeZone, Utc};
use coursehub::{
    domain::{EnrollmentStatus, PaymentSignal, PaymentStatus},
    error::AppError,
};
use uuid::Uuid;

use common::{enrollment_statuses, pending_payment, setup};

#[tokio::test]
async fn paid_signal_completes_payment_and_confirms_enrollments() -> anyhow::Result<()> {
    let app = setup().await;
    let (payment, _) = pending_payment(&app, "B-100", 3).await;

    let result = app.ctx.reconciliation
        .apply_gateway_signal("B-100", PaymentSignal::Paid, Some("TX-1".to_string()), None)
        .await?;

    assert_eq!(result.payment.status, PaymentStatus::Completed);
    assert_eq!(result.payment.transaction_id.as_deref(), Some("TX-1"));
    assert!(result.payment.paid_at.is_some());
    assert_eq!(result.enrollments_updated, 3);
    assert_eq!(
        enrollment_statuses(&app, payment.id).await,
        vec![EnrollmentStatus::Confirmed; 3]
    );

    Ok(())
}

#[tokio::test]
async fn failed_signal_fails_payment_and_cancels_enrollments() -> anyhow::Result<()> {
    let app = setup().await;
    let (payment, _) = pending_payment(&app, "B-200", 2).await;

    let result = app.ctx.reconciliation
        .apply_gateway_signal("B-200", PaymentSignal::Failed, None, None)
        .await?;

    assert_eq!(result.payment.status, PaymentStatus::Failed);
    assert!(result.payment.paid_at.is_none());
    assert_eq!(
        enrollment_statuses(&app, payment.id).await,
        vec![EnrollmentStatus::Cancelled; 2]
    );

    Ok(())
}

#[tokio::test]
async fn repeated_paid_signal_is_idempotent() -> anyhow::Result<()> {
    let app = setup().await;
    let (payment, _) = pending_payment(&app, "B-300", 1).await;
    let paid_at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();

    let first = app.ctx.reconciliation
        .apply_gateway_signal("B-300", PaymentSignal::Paid, Some("TX-A".to_string()), Some(paid_at))
        .await?;
    let second = app.ctx.reconciliation
        .apply_gateway_signal("B-300", PaymentSignal::Paid, Some("TX-B".to_string()), None)
        .await?;

    assert_eq!(first.payment.status, second.payment.status);
    assert_eq!(second.payment.paid_at, Some(paid_at));
    assert_eq!(second.payment.transaction_id.as_deref(), Some("TX-A"));
    assert_eq!(enrollment_statuses(&app, payment.id).await, vec![EnrollmentStatus::Confirmed]);

    Ok(())
}

#[tokio::test]
async fn webhook_scenario_bill_42() -> anyhow::Result<()> {
    let app = setup().await;
    let (payment, enrollments) = pending_payment(&app, "B-42", 1).await;
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(enrollments[0].status, EnrollmentStatus::Pending);

    let signal = PaymentSignal::from_gateway_status("paid").unwrap();
    app.ctx.reconciliation.apply_gateway_signal("B-42", signal, None, None).await?;

    let payment = app.ctx.payment_repo.find_by_bill_id("B-42").await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);

    let enrollment = app.ctx.enrollment_repo.find_by_id(enrollments[0].id).await?.unwrap();
    assert_eq!(enrollment.status, EnrollmentStatus::Confirmed);

    Ok(())
}

#[tokio::test]
async fn unknown_bill_is_not_found() {
    let app = setup().await;

    let result = app.ctx.reconciliation
        .apply_gateway_signal("B-missing", PaymentSignal::Paid, None, None)
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn manual_confirm_sets_confirmed() -> anyhow::Result<()> {
    let app = setup().await;
    let (payment, _) = pending_payment(&app, "B-400", 2).await;

    let result = app.ctx.reconciliation.confirm_manually(payment.id).await?;

    assert_eq!(result.payment.status, PaymentStatus::Confirmed);
    assert!(result.payment.paid_at.is_some());
    assert_eq!(
        enrollment_statuses(&app, payment.id).await,
        vec![EnrollmentStatus::Confirmed; 2]
    );

    Ok(())
}

#[tokio::test]
async fn manual_confirm_of_confirmed_payment_conflicts_without_writes() -> anyhow::Result<()> {
    let app = setup().await;
    let (payment, enrollments) = pending_payment(&app, "B-500", 1).await;

    let confirmed = app.ctx.reconciliation.confirm_manually(payment.id).await?.payment;

    // Move the enrollment on so an accidental rewrite would be visible.
    app.ctx.enrollment_service
        .update_status(enrollments[0].id, EnrollmentStatus::Active)
        .await?;

    let result = app.ctx.reconciliation.confirm_manually(payment.id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let after = app.ctx.payment_repo.find_by_id(payment.id).await?.unwrap();
    assert_eq!(after.status, PaymentStatus::Confirmed);
    assert_eq!(after.updated_at, confirmed.updated_at);
    assert_eq!(enrollment_statuses(&app, payment.id).await, vec![EnrollmentStatus::Active]);

    Ok(())
}

#[tokio::test]
async fn manual_confirm_of_completed_payment_conflicts() -> anyhow::Result<()> {
    let app = setup().await;
    let (payment, _) = pending_payment(&app, "B-600", 1).await;

    app.ctx.reconciliation
        .apply_gateway_signal("B-600", PaymentSignal::Paid, None, None)
        .await?;

    let result = app.ctx.reconciliation.confirm_manually(payment.id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn manual_confirm_of_missing_payment_is_not_found() -> anyhow::Result<()> {
    let app = setup().await;
    let (payment, _) = pending_payment(&app, "B-700", 1).await;

    let result = app.ctx.reconciliation.confirm_manually(Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    // The unrelated payment is untouched.
    let untouched = app.ctx.payment_repo.find_by_id(payment.id).await?.unwrap();
    assert_eq!(untouched.status, PaymentStatus::Pending);
    assert_eq!(enrollment_statuses(&app, payment.id).await, vec![EnrollmentStatus::Pending]);

    Ok(())
}

#[tokio::test]
async fn owner_can_cancel_pending_payment_only() -> anyhow::Result<()> {
    let app = setup().await;
    let (payment, _) = pending_payment(&app, "B-800", 1).await;

    let stranger = common::create_user(&app, "stranger@example.com", coursehub::domain::UserRole::Student).await;
    let result = app.ctx.reconciliation.cancel_by_user(stranger.id, payment.id).await;
    assert!(matches!(result, Err(AppError::Forbidden)));

    let cancelled = app.ctx.reconciliation.cancel_by_user(payment.user_id, payment.id).await?;
    assert_eq!(cancelled.payment.status, PaymentStatus::Failed);
    assert_eq!(enrollment_statuses(&app, payment.id).await, vec![EnrollmentStatus::Cancelled]);

    let again = app.ctx.reconciliation.cancel_by_user(payment.user_id, payment.id).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    Ok(())
}
