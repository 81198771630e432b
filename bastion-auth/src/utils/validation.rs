//! Request-body extraction with validation.
//!
//! `ValidatedJson<T>` deserializes the body and runs the `validator` rules
//! before the handler sees it. Malformed JSON is a 400, a body that parses
//! but breaks a rule is a 422; both carry the standard error body.

use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::dtos::ErrorResponse;

pub struct ValidatedJson<T>(pub T);

fn reject(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("Malformed body: {e}")))?;

        value.validate().map_err(|e| {
            reject(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Validation failed: {e}"),
            )
        })?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest};
    use axum::routing::post;
    use axum::Router;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize, Validate)]
    struct SignupBody {
        #[validate(email)]
        email: String,
    }

    fn app() -> Router {
        Router::new().route(
            "/signup",
            post(|ValidatedJson(body): ValidatedJson<SignupBody>| async move { body.email }),
        )
    }

    async fn submit(body: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        assert_eq!(submit("{not json").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rule_violations_are_unprocessable() {
        assert_eq!(
            submit(r#"{"email": "not-an-email"}"#).await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn valid_bodies_pass_through() {
        assert_eq!(
            submit(r#"{"email": "a@example.com"}"#).await,
            StatusCode::OK
        );
    }
}
