use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// `Json<T>` whose rejections become `AppError::Validation`, so malformed
/// request bodies get the same `ErrorBody` as every other failure.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(AppJson(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;

    use super::*;
    use crate::models::level::UpdateLevelRequest;

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let result = AppJson::<UpdateLevelRequest>::from_request(json_request("{"), &()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn well_formed_body_is_accepted() {
        let AppJson(req) =
            AppJson::<UpdateLevelRequest>::from_request(json_request(r#"{"name":"Arena"}"#), &())
                .await
                .unwrap_or_else(|_| panic!("rejected"));
        assert_eq!(req.name.as_deref(), Some("Arena"));
    }
}
