use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Payment, PaymentSignal},
    error::{AppError, Result},
    payments::{webhook::SIGNATURE_HEADER, WebhookPayload},
};

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<Payment>>> {
    let payments = state.service_context.payment_repo
        .list_by_user(current.user.id)
        .await?;

    Ok(Json(payments))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>> {
    let payment = state.service_context.payment_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    if payment.user_id != current.user.id && !current.user.is_admin() {
        return Err(AppError::Forbidden);
    }

    Ok(Json(payment))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    state.service_context.reconciliation
        .cancel_by_user(current.user.id, id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment cancelled",
    })))
}

/// Gateway callback. The raw body is needed for signature verification, so
/// the JSON is parsed by hand.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let ctx = &state.service_context;

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    ctx.webhook_verifier.verify(&body, signature)?;

    let payload = WebhookPayload::parse(&body)?;
    let bill_id = payload.bill_id()?;
    let status = payload.status
        .as_deref()
        .ok_or_else(|| AppError::Validation("status is required".to_string()))?;

    let Some(signal) = PaymentSignal::from_gateway_status(status) else {
        tracing::debug!("Ignoring webhook status '{}' for bill {}", status, bill_id);
        return Ok(Json(json!({ "success": true })));
    };

    ctx.reconciliation
        .apply_gateway_signal(bill_id, signal, payload.tx_id.clone(), payload.paid_at())
        .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn admin_confirm(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let result = state.service_context.reconciliation
        .confirm_manually(id)
        .await?;

    tracing::info!("Admin {} confirmed payment {}", admin.user.id, id);

    Ok(Json(json!({
        "success": true,
        "message": format!(
            "Payment confirmed, {} enrollment(s) updated",
            result.enrollments_updated
        ),
    })))
}
