use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

/// `{ "code": 200, "data": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Success<T> {
    pub code: u16,
    pub data: T,
}

/// `{ "code": 4xx/5xx, "title": ..., "message": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageData {
    pub message: String,
}

pub type ApiResult<T> = Result<Json<Success<T>>, crate::ApiError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Success {
        code: StatusCode::OK.as_u16(),
        data,
    }))
}
