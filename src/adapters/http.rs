//! HTTP adapter
//!
//! Mounts every operation at `POST /<operation-name>`. The request body is the
//! operation input, an incoming `X-Correlation-ID` header seeds the run's
//! correlation id, and the synchronous pipeline runs on the blocking pool.

use crate::error::{Failure, TenantryError, TenantryResult};
use crate::pipeline::interceptors::error_handling::{DEFAULT_STATUS, DEFAULT_TITLE};
use crate::pipeline::operation::{Operation, Outcome};
use crate::pipeline::response::{
    HttpResponse, HttpShaper, Response as PipelineResponse, ResponseShaper, CORRELATION_HEADER,
};
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.body)).into_response();

        for (name, value) in &self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

/// Build a router with one `POST` route per operation
pub fn router(operations: Vec<Arc<Operation>>) -> Router {
    let mut router = Router::new();
    for operation in operations {
        let path = format!("/{}", operation.name());
        tracing::debug!(path = %path, "Mounting operation");
        router = router.route(
            &path,
            post(move |headers: HeaderMap, body: Bytes| {
                let operation = Arc::clone(&operation);
                async move { handle(operation, headers, body).await }
            }),
        );
    }
    router
}

/// Serve `router` on `listener` until the process is stopped
pub async fn serve(listener: tokio::net::TcpListener, router: Router) -> TenantryResult<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "HTTP adapter listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn handle(operation: Arc<Operation>, headers: HeaderMap, body: Bytes) -> Response {
    let correlation_id = headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let input = match parse_input(&body) {
        Ok(input) => input,
        Err(failure) => {
            return shape_failure(&failure, 400, "Bad Request", correlation_id.as_deref());
        }
    };

    let mut ctx = operation.context(input);
    if let Some(id) = &correlation_id {
        ctx.set_correlation_id(id.clone());
    }

    let joined = tokio::task::spawn_blocking(move || operation.run(ctx)).await;

    match joined {
        Ok(Ok(Outcome::Response(PipelineResponse::Http(http)))) => http.into_response(),
        Ok(Ok(Outcome::Result(result))) => {
            match HttpShaper.shape_result(Some(&result), correlation_id.as_deref()) {
                PipelineResponse::Http(http) => http.into_response(),
                PipelineResponse::Cli(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            }
        }
        Ok(Ok(Outcome::Response(PipelineResponse::Cli(_)))) => {
            let failure = Failure::new("internal-error", "operation is not exposed over HTTP");
            shape_failure(&failure, DEFAULT_STATUS, DEFAULT_TITLE, correlation_id.as_deref())
        }
        Ok(Err(error)) => {
            let failure = Failure::from(error);
            tracing::error!(kind = %failure.kind, "Unhandled operation failure: {}", failure.message);
            shape_failure(&failure, DEFAULT_STATUS, DEFAULT_TITLE, correlation_id.as_deref())
        }
        Err(join_error) => {
            tracing::error!("Operation task did not complete: {}", join_error);
            let failure = Failure::from(TenantryError::Internal(join_error.to_string()));
            shape_failure(&failure, DEFAULT_STATUS, DEFAULT_TITLE, correlation_id.as_deref())
        }
    }
}

/// Empty body -> `{}`, otherwise the body must be JSON
fn parse_input(body: &Bytes) -> Result<Value, Failure> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body)
        .map_err(|e| Failure::new("serialization-error", format!("Invalid JSON body: {}", e)))
}

fn shape_failure(
    failure: &Failure,
    status: u16,
    title: &str,
    correlation_id: Option<&str>,
) -> Response {
    match HttpShaper.shape_failure(failure, status, title, correlation_id) {
        PipelineResponse::Http(http) => http.into_response(),
        PipelineResponse::Cli(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::compose::{OperationKind, PipelineTemplate};
    use crate::pipeline::interceptors::{EffectRegistry, ErrorMapping};
    use crate::pipeline::operation::OperationDescriptor;
    use crate::pipeline::result::OperationResult;
    use crate::system::System;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn echo(kind: OperationKind) -> Arc<Operation> {
        let template = match kind {
            OperationKind::Http => PipelineTemplate::http(
                Arc::new(ErrorMapping::standard()),
                Arc::new(EffectRegistry::new()),
            ),
            _ => PipelineTemplate::service(Arc::new(EffectRegistry::new())),
        };
        Arc::new(Operation::new(
            OperationDescriptor::new("echo", kind),
            &template,
            Arc::new(System::builder().build()),
            |ctx| match ctx.param("fail") {
                Some(_) => Err(TenantryError::Internal("secret detail".to_string())),
                None => Ok(OperationResult::success(ctx.input().clone())),
            },
        ))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_post_runs_operation() {
        let app = router(vec![echo(OperationKind::Http)]);
        let request = Request::builder()
            .method("POST")
            .uri("/echo")
            .header(CORRELATION_HEADER, "corr-http")
            .body(Body::from(r#"{"id": 1}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CORRELATION_HEADER], "corr-http");
        assert_eq!(body_json(response).await, json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_converted_failure_hides_detail() {
        let app = router(vec![echo(OperationKind::Http)]);
        let request = Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::from(r#"{"fail": true}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "An unexpected error occurred");
        assert_eq!(body["type"], "internal-error");
    }

    #[tokio::test]
    async fn test_unhandled_service_failure_is_500() {
        let app = router(vec![echo(OperationKind::Service)]);
        let request = Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::from(r#"{"fail": true}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_json_is_400() {
        let app = router(vec![echo(OperationKind::Http)]);
        let request = Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["type"], "serialization-error");
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_object() {
        let app = router(vec![echo(OperationKind::Http)]);
        let request = Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, json!({}));
    }
}
