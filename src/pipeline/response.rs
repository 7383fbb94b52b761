//! Protocol-specific response shaping
//!
//! A `ResponseShaper` knows how one protocol renders a result or a converted
//! failure. The shaper is picked when a pipeline template is composed, and the
//! same shaper is handed to the error converter so both paths agree on format.

use super::context::Context;
use super::core::{Interceptor, Phase};
use super::result::{OperationResult, Status};
use crate::error::{Failure, TenantryResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Header carrying the run's correlation id
pub const CORRELATION_HEADER: &str = "X-Correlation-ID";

/// Final shaped output of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum Response {
    Http(HttpResponse),
    Cli(CliResponse),
}

impl Response {
    pub fn as_http(&self) -> Option<&HttpResponse> {
        match self {
            Response::Http(http) => Some(http),
            Response::Cli(_) => None,
        }
    }

    pub fn as_cli(&self) -> Option<&CliResponse> {
        match self {
            Response::Cli(cli) => Some(cli),
            Response::Http(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliResponse {
    pub exit: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

/// Renders results and converted failures for one protocol
pub trait ResponseShaper: Send + Sync {
    /// Protocol name, e.g. `http`
    fn protocol(&self) -> &'static str;

    /// Shape the business result (or its absence) of a run that did not fail
    fn shape_result(&self, result: Option<&OperationResult>, correlation_id: Option<&str>)
        -> Response;

    /// Shape a thrown failure already resolved to `(status, title)`
    fn shape_failure(
        &self,
        failure: &Failure,
        status: u16,
        title: &str,
        correlation_id: Option<&str>,
    ) -> Response;
}

fn correlation_headers(correlation_id: Option<&str>) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    if let Some(id) = correlation_id {
        headers.insert(CORRELATION_HEADER.to_string(), id.to_string());
    }
    headers
}

/// success -> 201, error -> 400, anything else -> 500
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpShaper;

impl ResponseShaper for HttpShaper {
    fn protocol(&self) -> &'static str {
        "http"
    }

    fn shape_result(
        &self,
        result: Option<&OperationResult>,
        correlation_id: Option<&str>,
    ) -> Response {
        let (status, body) = match result {
            Some(result) => match result.status {
                Status::Success => (201, result.data.clone()),
                Status::Error => (400, json!({ "errors": result.errors })),
                Status::Other(_) => (500, json!({ "title": "Internal Server Error" })),
            },
            None => (500, json!({ "title": "Internal Server Error" })),
        };

        Response::Http(HttpResponse {
            status,
            body,
            headers: correlation_headers(correlation_id),
        })
    }

    fn shape_failure(
        &self,
        failure: &Failure,
        status: u16,
        title: &str,
        correlation_id: Option<&str>,
    ) -> Response {
        // Messages of unmapped failures can carry internals; keep them server side
        let detail = if status >= 500 {
            "An unexpected error occurred".to_string()
        } else {
            failure.message.clone()
        };

        let mut body = json!({
            "type": failure.kind,
            "title": title,
            "status": status,
            "detail": detail,
            "correlationId": correlation_id,
        });
        if !failure.fields.is_empty() {
            body["errors"] = json!(failure.fields);
        }

        Response::Http(HttpResponse {
            status,
            body,
            headers: correlation_headers(correlation_id),
        })
    }
}

/// success -> exit 0, error -> exit 1, anything else -> exit 2
#[derive(Debug, Default, Clone, Copy)]
pub struct CliShaper;

impl CliShaper {
    fn render(data: &Value) -> String {
        match data {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

impl ResponseShaper for CliShaper {
    fn protocol(&self) -> &'static str {
        "cli"
    }

    fn shape_result(
        &self,
        result: Option<&OperationResult>,
        _correlation_id: Option<&str>,
    ) -> Response {
        let response = match result {
            Some(result) => match &result.status {
                Status::Success => CliResponse {
                    exit: 0,
                    stdout: Some(Self::render(&result.data)),
                    stderr: None,
                },
                Status::Error => {
                    let lines: Vec<String> = result
                        .errors
                        .iter()
                        .map(|detail| format!("error: {}", detail))
                        .collect();
                    CliResponse {
                        exit: 1,
                        stdout: None,
                        stderr: Some(lines.join("\n")),
                    }
                }
                Status::Other(status) => CliResponse {
                    exit: 2,
                    stdout: None,
                    stderr: Some(format!("unexpected result status: {}", status)),
                },
            },
            None => CliResponse {
                exit: 2,
                stdout: None,
                stderr: Some("operation produced no result".to_string()),
            },
        };
        Response::Cli(response)
    }

    fn shape_failure(
        &self,
        failure: &Failure,
        status: u16,
        title: &str,
        correlation_id: Option<&str>,
    ) -> Response {
        let mut lines = vec![format!("{}: {}", title, failure.message)];
        for (field, problems) in &failure.fields {
            for problem in problems {
                lines.push(format!("  {}: {}", field, problem));
            }
        }
        if let Some(id) = correlation_id {
            lines.push(format!("correlation id: {}", id));
        }

        Response::Cli(CliResponse {
            exit: if status >= 500 { 2 } else { 1 },
            stdout: None,
            stderr: Some(lines.join("\n")),
        })
    }
}

/// Leave-phase interceptor that turns the final result into a response
///
/// A response set earlier (for instance by the error converter) is left
/// untouched.
pub struct ShaperInterceptor {
    shaper: Arc<dyn ResponseShaper>,
}

impl ShaperInterceptor {
    pub fn new(shaper: Arc<dyn ResponseShaper>) -> Self {
        Self { shaper }
    }
}

impl Interceptor for ShaperInterceptor {
    fn name(&self) -> &str {
        match self.shaper.protocol() {
            "http" => "http-shaper",
            "cli" => "cli-shaper",
            _ => "response-shaper",
        }
    }

    fn leave(&self, ctx: &mut Context) -> TenantryResult<()> {
        if ctx.response().is_some() {
            return Ok(());
        }
        let response = self.shaper.shape_result(ctx.result(), ctx.correlation_id());
        ctx.set_response(response);
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Leave
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::result::ErrorDetail;
    use crate::system::System;

    fn context() -> Context {
        Context::new("test", json!({}), Arc::new(System::builder().build()))
    }

    #[test]
    fn test_http_success_is_201_with_correlation_header() {
        let result = OperationResult::success(json!({"id": 1}));
        let response = HttpShaper.shape_result(Some(&result), Some("corr-1"));
        let http = response.as_http().unwrap();
        assert_eq!(http.status, 201);
        assert_eq!(http.body, json!({"id": 1}));
        assert_eq!(http.headers[CORRELATION_HEADER], "corr-1");
    }

    #[test]
    fn test_http_error_is_400_with_errors() {
        let result = OperationResult::error(vec![ErrorDetail::field("name", "required")]);
        let response = HttpShaper.shape_result(Some(&result), None);
        let http = response.as_http().unwrap();
        assert_eq!(http.status, 400);
        assert_eq!(http.body["errors"][0]["field"], "name");
        assert!(http.headers.is_empty());
    }

    #[test]
    fn test_http_unmapped_status_is_500() {
        let result = OperationResult::with_status(Status::Other("queued".into()), Value::Null);
        assert_eq!(HttpShaper.shape_result(Some(&result), None).as_http().unwrap().status, 500);
        assert_eq!(HttpShaper.shape_result(None, None).as_http().unwrap().status, 500);
    }

    #[test]
    fn test_http_failure_hides_detail_of_server_errors() {
        let failure = Failure::new("io-error", "disk /dev/sda1 exploded");
        let response = HttpShaper.shape_failure(&failure, 500, "Internal Server Error", Some("c"));
        let http = response.as_http().unwrap();
        assert_eq!(http.body["title"], "Internal Server Error");
        assert_eq!(http.body["detail"], "An unexpected error occurred");
        assert_eq!(http.body["correlationId"], "c");
    }

    #[test]
    fn test_cli_exit_codes() {
        let ok = CliShaper.shape_result(Some(&OperationResult::success(json!("done"))), None);
        assert_eq!(ok.as_cli().unwrap().exit, 0);
        assert_eq!(ok.as_cli().unwrap().stdout.as_deref(), Some("done"));

        let err = CliShaper.shape_result(
            Some(&OperationResult::error(vec![ErrorDetail::new("nope")])),
            None,
        );
        assert_eq!(err.as_cli().unwrap().exit, 1);
        assert_eq!(err.as_cli().unwrap().stderr.as_deref(), Some("error: nope"));

        let other = CliShaper.shape_result(None, None);
        assert_eq!(other.as_cli().unwrap().exit, 2);
    }

    #[test]
    fn test_cli_failure_lists_fields() {
        let failure = Failure::new("validation-error", "bad item").with_field("sku", "required");
        let response = CliShaper.shape_failure(&failure, 400, "Validation Error", None);
        let cli = response.as_cli().unwrap();
        assert_eq!(cli.exit, 1);
        assert_eq!(
            cli.stderr.as_deref(),
            Some("Validation Error: bad item\n  sku: required")
        );
    }

    #[test]
    fn test_shaper_keeps_existing_response() {
        let shaper = ShaperInterceptor::new(Arc::new(HttpShaper));
        let mut ctx = context();
        ctx.set_result(OperationResult::success(json!({"id": 1})));
        ctx.set_response(Response::Http(HttpResponse {
            status: 409,
            body: json!({"title": "Conflict"}),
            headers: BTreeMap::new(),
        }));
        let before = ctx.snapshot();

        shaper.leave(&mut ctx).unwrap();
        assert_eq!(ctx.snapshot(), before);
    }

    #[test]
    fn test_shaper_only_defines_leave() {
        let shaper = ShaperInterceptor::new(Arc::new(CliShaper));
        assert_eq!(shaper.name(), "cli-shaper");
        assert!(shaper.handles(Phase::Leave));
        assert!(!shaper.handles(Phase::Enter));
        assert!(!shaper.handles(Phase::Error));
    }
}
