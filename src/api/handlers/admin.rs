use axum::{
    extract::{Extension, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{extract::JsonBody, middleware::auth::CurrentUser, state::AppState},
    domain::CourseDeletion,
    error::Result,
};

pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>> {
    let ctx = &state.service_context;

    let payments: Vec<Value> = ctx.payment_repo
        .count_by_status()
        .await?
        .into_iter()
        .map(|(status, count)| json!({ "status": status, "count": count }))
        .collect();

    let enrollments: Vec<Value> = ctx.enrollment_repo
        .count_by_status()
        .await?
        .into_iter()
        .map(|(status, count)| json!({ "status": status, "count": count }))
        .collect();

    Ok(Json(json!({
        "payments": payments,
        "enrollments": enrollments,
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkDeleteRequest {
    #[validate(length(min = 1, max = 100))]
    ids: Vec<Uuid>,
}

pub async fn bulk_delete_courses(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    JsonBody(req): JsonBody<BulkDeleteRequest>,
) -> Result<Json<CourseDeletion>> {
    req.validate()?;

    tracing::warn!("Admin {} bulk-deleting {} courses", admin.user.id, req.ids.len());

    let deleted = state.service_context.course_repo
        .delete_cascade(&req.ids)
        .await?;

    Ok(Json(deleted))
}
