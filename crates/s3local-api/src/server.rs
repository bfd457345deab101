//! S3 Server implementation

use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use s3local_core::{config::ServerConfig, Result};
use s3local_storage::StorageEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::{error, info};

use crate::metrics::{metrics_middleware, MetricsRecorder};
use crate::routes;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageEngine>,
    /// Owner reported in ListBuckets
    pub owner_id: String,
}

/// S3 Server
pub struct S3Server {
    config: ServerConfig,
    state: AppState,
    metrics: Option<(MetricsRecorder, u16)>,
}

impl S3Server {
    pub fn new(config: ServerConfig, storage: Arc<dyn StorageEngine>) -> Self {
        Self {
            config,
            state: AppState {
                storage,
                owner_id: s3local_core::DEFAULT_PRINCIPAL_ID.to_string(),
            },
            metrics: None,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.state.owner_id = owner_id.into();
        self
    }

    /// Serve `/metrics` from `recorder` on `port`
    pub fn with_metrics(mut self, recorder: MetricsRecorder, port: u16) -> Self {
        self.metrics = Some((recorder, port));
        self
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        if let Some((recorder, port)) = self.metrics {
            let addr = format!("{}:{}", self.config.address, port);
            let listener = TcpListener::bind(&addr).await?;
            info!("Prometheus metrics at http://{}/metrics", addr);

            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let serve = axum::serve(listener, recorder.router())
                    .with_graceful_shutdown(async move { shutdown.cancelled().await });
                if let Err(e) = serve.await {
                    error!("Metrics server error: {}", e);
                }
            });
        }

        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        info!("S3 local listening on http://{}", addr);

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("S3 local server stopped");
        Ok(())
    }
}

/// S3 routes over `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        // Service operations
        .route("/", get(routes::list_buckets))
        // Bucket operations
        .route(
            "/{bucket}",
            put(routes::create_bucket)
                .delete(routes::delete_bucket)
                .head(routes::head_bucket),
        )
        // Object operations
        .route(
            "/{bucket}/{*key}",
            put(routes::object_put_handler)
                .get(routes::get_object)
                .head(routes::head_object)
                .delete(routes::delete_object),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use s3local_core::types::NotificationSource;
    use s3local_storage::LocalStorage;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app() -> (TempDir, Arc<LocalStorage>, Router) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()));
        storage.init().await.unwrap();
        let state = AppState {
            storage: storage.clone(),
            owner_id: "S3RVER".to_string(),
        };
        (dir, storage, router(state))
    }

    fn request(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(body.into())
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let (_dir, _storage, app) = app().await;

        let res = app
            .clone()
            .oneshot(request("PUT", "/local-bucket", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .clone()
            .oneshot(request("HEAD", "/local-bucket", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .clone()
            .oneshot(request("GET", "/", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_string(res).await.contains("<Name>local-bucket</Name>"));

        let res = app
            .clone()
            .oneshot(request("DELETE", "/local-bucket", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = app
            .oneshot(request("HEAD", "/local-bucket", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_object_emits_notification() {
        let (_dir, storage, app) = app().await;
        storage.create_bucket("local-bucket").await.unwrap();
        let mut notifications = storage.subscribe();

        let res = app
            .clone()
            .oneshot(request("PUT", "/local-bucket/incoming/img.jpg", "jpeg-bytes"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("etag"));

        let n = notifications.recv().await.unwrap();
        assert_eq!(n.bucket, "local-bucket");
        assert_eq!(n.key, "incoming/img.jpg");
        assert_eq!(n.event_type, "ObjectCreated:Put");

        let res = app
            .oneshot(request("GET", "/local-bucket/incoming/img.jpg", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "image/jpeg");
        assert_eq!(body_string(res).await, "jpeg-bytes");
    }

    #[tokio::test]
    async fn test_copy_and_delete_object() {
        let (_dir, storage, app) = app().await;
        storage.create_bucket("local-bucket").await.unwrap();
        storage
            .put("local-bucket", "a.txt", bytes::Bytes::from_static(b"abc"))
            .await
            .unwrap();
        let mut notifications = storage.subscribe();

        let copy = Request::builder()
            .method("PUT")
            .uri("/local-bucket/b.txt")
            .header("x-amz-copy-source", "/local-bucket/a.txt")
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(copy).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_string(res).await.contains("<CopyObjectResult"));
        assert_eq!(
            notifications.recv().await.unwrap().event_type,
            "ObjectCreated:Copy"
        );

        let res = app
            .clone()
            .oneshot(request("DELETE", "/local-bucket/a.txt", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            notifications.recv().await.unwrap().event_type,
            "ObjectRemoved:Delete"
        );

        let res = app
            .oneshot(request("HEAD", "/local-bucket/b.txt", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-length"], "3");
    }

    #[tokio::test]
    async fn test_errors_are_s3_xml() {
        let (_dir, storage, app) = app().await;
        storage.create_bucket("local-bucket").await.unwrap();

        let res = app
            .clone()
            .oneshot(request("GET", "/local-bucket/missing.txt", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = body_string(res).await;
        assert!(body.contains("<Code>NoSuchKey</Code>"));
        assert!(body.contains("<Resource>/local-bucket/missing.txt</Resource>"));

        let res = app
            .clone()
            .oneshot(request("PUT", "/nope-bucket/a.txt", "x"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(body_string(res).await.contains("<Code>NoSuchBucket</Code>"));

        storage
            .put("local-bucket", "a.txt", bytes::Bytes::from_static(b"abc"))
            .await
            .unwrap();
        let res = app
            .clone()
            .oneshot(request("DELETE", "/local-bucket", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = app
            .oneshot(request("PUT", "/Bad_Bucket", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_encoded_dot_bucket_is_rejected() {
        let root = TempDir::new().unwrap();
        let keep = root.path().join("keep.txt");
        std::fs::write(&keep, b"keep").unwrap();

        let storage = Arc::new(LocalStorage::new(root.path().join("buckets")));
        storage.init().await.unwrap();
        storage.create_bucket("local-bucket").await.unwrap();
        let app = router(AppState {
            storage: storage.clone(),
            owner_id: "S3RVER".to_string(),
        });

        for uri in ["/%2E%2E", "/%2E"] {
            let res = app
                .clone()
                .oneshot(request("DELETE", uri, Body::empty()))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert!(body_string(res).await.contains("<Code>InvalidBucketName</Code>"));
        }

        let res = app
            .oneshot(request("GET", "/%2E%2E/keep.txt", Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        assert!(keep.exists());
        assert!(storage.bucket_exists("local-bucket").await.unwrap());
    }
}
