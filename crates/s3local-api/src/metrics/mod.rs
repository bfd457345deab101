//! Prometheus metrics for s3local
//!
//! HTTP request metrics are recorded by [`metrics_middleware`]; the storage
//! emulator and the dispatch engine record their own counters. Everything is
//! rendered by [`MetricsRecorder`] on a separate listener.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;
use tracing::debug;

/// Metric names
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "s3local_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "s3local_http_request_duration_seconds";
    pub const S3_OPERATIONS_TOTAL: &str = "s3local_s3_operations_total";
    pub const UPTIME_SECONDS: &str = "s3local_uptime_seconds";
    pub const INFO: &str = "s3local_info";
}

/// S3 operation types for metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3Operation {
    ListBuckets,
    CreateBucket,
    DeleteBucket,
    HeadBucket,
    GetObject,
    PutObject,
    CopyObject,
    DeleteObject,
    HeadObject,
}

impl S3Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListBuckets => "ListBuckets",
            Self::CreateBucket => "CreateBucket",
            Self::DeleteBucket => "DeleteBucket",
            Self::HeadBucket => "HeadBucket",
            Self::GetObject => "GetObject",
            Self::PutObject => "PutObject",
            Self::CopyObject => "CopyObject",
            Self::DeleteObject => "DeleteObject",
            Self::HeadObject => "HeadObject",
        }
    }

    /// Detect operation from HTTP method, path and whether a copy source is set
    pub fn from_request(method: &str, path: &str, copy_source: bool) -> Option<Self> {
        let segments = path.split('/').filter(|s| !s.is_empty()).count();

        match (method, segments) {
            ("GET", 0) => Some(Self::ListBuckets),
            ("PUT", 1) => Some(Self::CreateBucket),
            ("DELETE", 1) => Some(Self::DeleteBucket),
            ("HEAD", 1) => Some(Self::HeadBucket),
            ("PUT", n) if n > 1 && copy_source => Some(Self::CopyObject),
            ("PUT", n) if n > 1 => Some(Self::PutObject),
            ("GET", n) if n > 1 => Some(Self::GetObject),
            ("DELETE", n) if n > 1 => Some(Self::DeleteObject),
            ("HEAD", n) if n > 1 => Some(Self::HeadObject),
            _ => None,
        }
    }
}

/// Installed Prometheus recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    /// Install the global recorder; only one may exist per process
    pub fn install() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;

        gauge!(names::INFO, "version" => s3local_core::VERSION).set(1.0);

        Ok(Self {
            handle,
            start_time: Instant::now(),
        })
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());
        self.handle.render()
    }

    /// Router serving `/metrics`
    pub fn router(self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(self)
    }
}

/// Axum middleware for recording HTTP metrics
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let copy_source = request.headers().contains_key("x-amz-copy-source");

    let s3_op = S3Operation::from_request(&method, &path, copy_source);

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "status_class" => format!("{}xx", status / 100)
    )
    .increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, "method" => method.clone()).record(duration);

    if let Some(op) = s3_op {
        counter!(
            names::S3_OPERATIONS_TOTAL,
            "operation" => op.as_str(),
            "status" => if status < 400 { "success" } else { "error" }
        )
        .increment(1);
    }

    debug!(
        method = %method,
        path = %path,
        status = %status,
        duration_ms = %(duration * 1000.0),
        "Request completed"
    );

    response
}

/// Handler for /metrics endpoint
pub async fn metrics_handler(State(metrics): State<MetricsRecorder>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render(),
    )
}
