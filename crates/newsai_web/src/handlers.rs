use axum::extract::{Path, State};
use newsai_core::{ArticleDetail, FieldNode, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::envelope::{ok, ApiResult, MessageData};
use crate::extract::{CurrentUser, Payload};
use crate::services;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Body of `POST` and `DELETE /interests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestRequest {
    pub field_id: Uuid,
}

pub async fn health() -> ApiResult<HealthStatus> {
    ok(HealthStatus {
        status: "ok".to_string(),
    })
}

pub async fn list_fields(State(state): State<Arc<AppState>>) -> ApiResult<Vec<FieldNode>> {
    ok(services::fields::field_tree(state.storage.as_ref()).await?)
}

pub async fn list_interests(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> ApiResult<Vec<FieldNode>> {
    ok(services::interests::list_interests(state.storage.as_ref(), current.user.id).await?)
}

pub async fn add_interest(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Payload(request): Payload<InterestRequest>,
) -> ApiResult<MessageData> {
    let storage = state.storage.as_ref();
    ok(services::interests::add_interest(storage, current.user.id, request.field_id).await?)
}

pub async fn remove_interest(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Payload(request): Payload<InterestRequest>,
) -> ApiResult<MessageData> {
    let storage = state.storage.as_ref();
    ok(services::interests::remove_interest(storage, current.user.id, request.field_id).await?)
}

pub async fn read_me(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> ApiResult<UserProfile> {
    ok(services::users::profile(state.storage.as_ref(), current.user).await?)
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<ArticleDetail> {
    ok(services::articles::article_detail(state.storage.as_ref(), &slug).await?)
}
