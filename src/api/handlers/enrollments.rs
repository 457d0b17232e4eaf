use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{extract::JsonBody, middleware::auth::CurrentUser, state::AppState},
    domain::{Enrollment, EnrollmentStatus, PaymentMethod},
    error::Result,
    service::Registration,
};

#[derive(Debug, Deserialize)]
pub struct CreateEnrollmentDto {
    #[serde(alias = "scheduleId")]
    schedule_id: Uuid,
    #[serde(default = "default_method")]
    method: PaymentMethod,
}

fn default_method() -> PaymentMethod {
    PaymentMethod::Card
}

pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(dto): JsonBody<CreateEnrollmentDto>,
) -> Result<(StatusCode, Json<Registration>)> {
    let registration = state.service_context.enrollment_service
        .register(current.user.id, dto.schedule_id, dto.method)
        .await?;

    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<Enrollment>>> {
    let enrollments = state.service_context.enrollment_service
        .list_for_user(current.user.id)
        .await?;

    Ok(Json(enrollments))
}

#[derive(Debug, Deserialize)]
pub struct AdminListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct EnrollmentList {
    enrollments: Vec<Enrollment>,
    total: usize,
}

pub async fn admin_list(
    State(state): State<AppState>,
    Query(params): Query<AdminListParams>,
) -> Result<Json<EnrollmentList>> {
    let enrollments = state.service_context.enrollment_repo
        .list(params.limit.clamp(1, 500), params.offset.max(0))
        .await?;

    let total = enrollments.len();
    Ok(Json(EnrollmentList { enrollments, total }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusDto {
    status: EnrollmentStatus,
}

pub async fn admin_update_status(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    JsonBody(dto): JsonBody<UpdateStatusDto>,
) -> Result<Json<Enrollment>> {
    let enrollment = state.service_context.enrollment_service
        .update_status(id, dto.status)
        .await?;

    tracing::info!("Admin {} set enrollment {} to {:?}", admin.user.id, id, dto.status);

    Ok(Json(enrollment))
}
