//! Handler Invocation
//!
//! The boundary between the router and whatever runs a function: a
//! Lambda-invoke compatible HTTP endpoint or a local command.

use async_trait::async_trait;
use reqwest::Client;
use s3local_core::types::S3EventMessage;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Header a Lambda endpoint sets when the function itself raised
const FUNCTION_ERROR_HEADER: &str = "x-amz-function-error";

/// How a resolved function is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerTarget {
    /// Lambda `Invoke` API URL
    Lambda { url: String },
    /// Local process receiving the event on stdin
    Command { program: String, args: Vec<String> },
}

/// Opaque handle to an invocable function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRef {
    /// Declared function name
    pub function: String,
    /// Handler entry point, e.g. `handler.s3hook`
    pub handler: String,
    pub target: HandlerTarget,
}

impl HandlerRef {
    pub fn lambda(
        function: impl Into<String>,
        handler: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            function: function.into(),
            handler: handler.into(),
            target: HandlerTarget::Lambda { url: url.into() },
        }
    }

    pub fn command(
        function: impl Into<String>,
        handler: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            function: function.into(),
            handler: handler.into(),
            target: HandlerTarget::Command {
                program: program.into(),
                args,
            },
        }
    }
}

/// Result of invoking one handler for one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    Failed(String),
    TimedOut,
}

impl DispatchOutcome {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Completed => "completed",
            DispatchOutcome::Failed(_) => "failed",
            DispatchOutcome::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchOutcome::Completed => write!(f, "completed"),
            DispatchOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            DispatchOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Runs a handler with an event envelope.
///
/// Implementations report failures through the outcome and never panic on
/// behalf of the handler.
#[async_trait]
pub trait HandlerInvoker: Send + Sync {
    async fn invoke(&self, handler: &HandlerRef, event: &S3EventMessage) -> DispatchOutcome;
}

/// Invoker for HTTP and command targets with a per-invocation timeout
#[derive(Clone)]
pub struct LocalInvoker {
    http_client: Client,
    timeout: Duration,
}

impl LocalInvoker {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            timeout,
        })
    }

    async fn invoke_lambda(&self, url: &str, event: &S3EventMessage) -> DispatchOutcome {
        let response = match self.http_client.post(url).json(event).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return DispatchOutcome::TimedOut,
            Err(e) => return DispatchOutcome::Failed(format!("HTTP request failed: {}", e)),
        };

        let status = response.status();
        let function_error = response
            .headers()
            .get(FUNCTION_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return DispatchOutcome::TimedOut,
            Err(e) => return DispatchOutcome::Failed(format!("Failed to read response: {}", e)),
        };

        match function_error {
            Some(kind) => DispatchOutcome::Failed(format!("{}: {}", kind, body)),
            None if status.is_success() => {
                debug!("Lambda endpoint {} returned {}", url, status);
                DispatchOutcome::Completed
            }
            None => DispatchOutcome::Failed(format!("endpoint returned {}: {}", status, body)),
        }
    }

    async fn invoke_command(
        &self,
        handler: &HandlerRef,
        program: &str,
        args: &[String],
        event: &S3EventMessage,
    ) -> DispatchOutcome {
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => return DispatchOutcome::Failed(format!("Failed to serialize event: {}", e)),
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .env("_HANDLER", &handler.handler)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // dropping the future on timeout drops the child, which kills it
        match tokio::time::timeout(self.timeout, run_command(command, payload)).await {
            Err(_) => DispatchOutcome::TimedOut,
            Ok(Err(e)) => DispatchOutcome::Failed(format!("Failed to run {}: {}", program, e)),
            Ok(Ok(output)) if output.status.success() => DispatchOutcome::Completed,
            Ok(Ok(output)) => DispatchOutcome::Failed(format!(
                "{} {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )),
        }
    }
}

async fn run_command(mut command: Command, payload: Vec<u8>) -> std::io::Result<Output> {
    let mut child = command.spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(&payload).await {
            // the handler may exit without reading its input
            debug!("Failed to write event to handler stdin: {}", e);
        }
    }

    child.wait_with_output().await
}

#[async_trait]
impl HandlerInvoker for LocalInvoker {
    async fn invoke(&self, handler: &HandlerRef, event: &S3EventMessage) -> DispatchOutcome {
        match &handler.target {
            HandlerTarget::Lambda { url } => self.invoke_lambda(url, event).await,
            HandlerTarget::Command { program, args } => {
                self.invoke_command(handler, program, args, event).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use s3local_core::types::{RawNotification, RecordContext, S3EventRecord};

    fn event() -> S3EventMessage {
        let notification = RawNotification::new("local-bucket", "incoming/a.jpg", "ObjectCreated:Put");
        S3EventMessage::single(S3EventRecord::new(
            &notification,
            "s3hook",
            &RecordContext::default(),
        ))
    }

    async fn invocations(
        Path(name): Path<String>,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, HeaderMap, String) {
        let mut headers = HeaderMap::new();
        match name.as_str() {
            "ok" => {
                let key = body["Records"][0]["s3"]["object"]["key"].as_str().unwrap_or("");
                let status = if key == "incoming/a.jpg" {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                };
                (status, headers, "null".to_string())
            }
            "raises" => {
                headers.insert(FUNCTION_ERROR_HEADER, "Unhandled".parse().unwrap());
                (StatusCode::OK, headers, r#"{"errorMessage":"boom"}"#.to_string())
            }
            "slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                (StatusCode::OK, headers, "null".to_string())
            }
            _ => (StatusCode::NOT_FOUND, headers, "no such function".to_string()),
        }
    }

    async fn stub_endpoint() -> String {
        let app = Router::new().route(
            "/2015-03-31/functions/{name}/invocations",
            post(invocations),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn lambda(endpoint: &str, name: &str) -> HandlerRef {
        HandlerRef::lambda(
            name,
            "handler.s3hook",
            format!("{}/2015-03-31/functions/{}/invocations", endpoint, name),
        )
    }

    fn sh(script: &str) -> HandlerRef {
        HandlerRef::command(
            "s3hook",
            "handler.s3hook",
            "sh",
            vec!["-c".to_string(), script.to_string()],
        )
    }

    #[tokio::test]
    async fn test_lambda_completed() {
        let endpoint = stub_endpoint().await;
        let invoker = LocalInvoker::new(Duration::from_secs(5)).unwrap();

        let outcome = invoker.invoke(&lambda(&endpoint, "ok"), &event()).await;
        assert_eq!(outcome, DispatchOutcome::Completed);
    }

    #[tokio::test]
    async fn test_lambda_function_error() {
        let endpoint = stub_endpoint().await;
        let invoker = LocalInvoker::new(Duration::from_secs(5)).unwrap();

        let outcome = invoker.invoke(&lambda(&endpoint, "raises"), &event()).await;
        match outcome {
            DispatchOutcome::Failed(reason) => {
                assert!(reason.starts_with("Unhandled"));
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let outcome = invoker.invoke(&lambda(&endpoint, "missing"), &event()).await;
        assert!(matches!(outcome, DispatchOutcome::Failed(ref r) if r.contains("404")));
    }

    #[tokio::test]
    async fn test_lambda_timeout() {
        let endpoint = stub_endpoint().await;
        let invoker = LocalInvoker::new(Duration::from_millis(200)).unwrap();

        let outcome = invoker.invoke(&lambda(&endpoint, "slow"), &event()).await;
        assert_eq!(outcome, DispatchOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_command_receives_event_and_handler() {
        let invoker = LocalInvoker::new(Duration::from_secs(5)).unwrap();
        let handler = sh(r#"test "$_HANDLER" = handler.s3hook && grep -q '"key":"incoming/a.jpg"'"#);

        let outcome = invoker.invoke(&handler, &event()).await;
        assert_eq!(outcome, DispatchOutcome::Completed);
    }

    #[tokio::test]
    async fn test_command_failure_carries_stderr() {
        let invoker = LocalInvoker::new(Duration::from_secs(5)).unwrap();

        let outcome = invoker.invoke(&sh("echo boom >&2; exit 3"), &event()).await;
        match outcome {
            DispatchOutcome::Failed(reason) => assert!(reason.contains("boom")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let invoker = LocalInvoker::new(Duration::from_millis(200)).unwrap();

        let outcome = invoker.invoke(&sh("sleep 5"), &event()).await;
        assert_eq!(outcome, DispatchOutcome::TimedOut);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(DispatchOutcome::Completed.label(), "completed");
        assert_eq!(DispatchOutcome::Failed("x".into()).label(), "failed");
        assert_eq!(DispatchOutcome::TimedOut.to_string(), "timed out");
    }
}
