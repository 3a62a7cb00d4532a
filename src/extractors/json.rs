//! JSON object body. Wrong content type, malformed JSON and non-object bodies all reject as `BadRequest`.

use crate::driver::Row;
use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct JsonObject(pub Row);

#[async_trait]
impl<S> FromRequest<S> for JsonObject
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        match value {
            Value::Object(m) => Ok(JsonObject(m)),
            _ => Err(AppError::BadRequest("body must be a JSON object".into())),
        }
    }
}
