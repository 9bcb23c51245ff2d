//! A `Json` extractor that answers 400 on a malformed body instead of
//! axum's default 422, matching the HTTP surface's error contract
//! (caller mistakes are 400s).

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::Json;

pub struct ApiJson<T>(pub T);

#[async_trait::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err((StatusCode::BAD_REQUEST, rejection.to_string())),
        }
    }
}
