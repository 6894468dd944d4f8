use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use newsai_core::User;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::middleware::session::ActiveSession;
use crate::{ApiError, AppState};

/// JSON body whose rejections become `Validation Error` envelopes.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(JsonRejection::BytesRejection(rejection)) => {
                Err(ApiError::http(rejection.status()))
            }
            Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
        }
    }
}

/// The authenticated user behind the request's session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub roles: Vec<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<ActiveSession>()
            .cloned()
            .ok_or_else(|| ApiError::Authentication("Not authenticated".to_string()))?;

        let user = state
            .storage
            .user_by_id(session.data.user_id)
            .await?
            .ok_or_else(|| ApiError::Authentication("User not found".to_string()))?;

        Ok(Self {
            user,
            roles: session.data.roles,
        })
    }
}
