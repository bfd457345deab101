//! S3 API Routes

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use s3local_core::{
    error::S3Error,
    utils::{generate_etag, generate_request_id},
    Error,
};
use tracing::{debug, error, info};

use crate::server::AppState;
use crate::xml;

fn error_response(err: Error, resource: &str, request_id: &str) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("{} failed: {}", resource, err);
    }
    let s3_error = S3Error::from(err)
        .with_resource(resource)
        .with_request_id(request_id);

    (
        status,
        [
            ("Content-Type", "application/xml".to_string()),
            ("x-amz-request-id", request_id.to_string()),
        ],
        s3_error.to_xml(),
    )
        .into_response()
}

fn xml_response(status: StatusCode, body: String, request_id: &str) -> Response {
    (
        status,
        [
            ("Content-Type", "application/xml".to_string()),
            ("x-amz-request-id", request_id.to_string()),
        ],
        body,
    )
        .into_response()
}

fn empty_response(status: StatusCode, request_id: &str) -> Response {
    (status, [("x-amz-request-id", request_id.to_string())]).into_response()
}

// ============= Service Operations =============

/// List all buckets
pub async fn list_buckets(State(state): State<AppState>) -> Response {
    let request_id = generate_request_id();
    debug!("ListBuckets request_id={}", request_id);

    match state.storage.list_buckets().await {
        Ok(buckets) => {
            let body = xml::list_buckets_response(&buckets, &state.owner_id);
            xml_response(StatusCode::OK, body, &request_id)
        }
        Err(e) => error_response(e, "/", &request_id),
    }
}

// ============= Bucket Operations =============

/// HEAD bucket - check if bucket exists
pub async fn head_bucket(State(state): State<AppState>, Path(bucket): Path<String>) -> Response {
    let request_id = generate_request_id();
    debug!("HeadBucket bucket={} request_id={}", bucket, request_id);

    match state.storage.bucket_exists(&bucket).await {
        Ok(true) => empty_response(StatusCode::OK, &request_id),
        Ok(false) => error_response(Error::NoSuchBucket, &format!("/{}", bucket), &request_id),
        Err(e) => error_response(e, &format!("/{}", bucket), &request_id),
    }
}

/// PUT bucket - create bucket
pub async fn create_bucket(State(state): State<AppState>, Path(bucket): Path<String>) -> Response {
    let request_id = generate_request_id();
    info!("CreateBucket bucket={} request_id={}", bucket, request_id);

    match state.storage.create_bucket(&bucket).await {
        Ok(()) => (
            StatusCode::OK,
            [
                ("Location", format!("/{}", bucket)),
                ("x-amz-request-id", request_id),
            ],
        )
            .into_response(),
        Err(e) => error_response(e, &format!("/{}", bucket), &request_id),
    }
}

/// DELETE bucket; fails when the bucket still holds objects
pub async fn delete_bucket(State(state): State<AppState>, Path(bucket): Path<String>) -> Response {
    let request_id = generate_request_id();
    info!("DeleteBucket bucket={} request_id={}", bucket, request_id);

    match state.storage.delete_bucket(&bucket, false).await {
        Ok(()) => empty_response(StatusCode::NO_CONTENT, &request_id),
        Err(e) => error_response(e, &format!("/{}", bucket), &request_id),
    }
}

// ============= Object Operations =============

/// HEAD object
pub async fn head_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    let request_id = generate_request_id();
    debug!(
        "HeadObject bucket={} key={} request_id={}",
        bucket, key, request_id
    );

    match state.storage.head(&bucket, &key).await {
        Ok(info) => (
            StatusCode::OK,
            [
                ("Content-Type", content_type(&key)),
                ("Content-Length", info.size.to_string()),
                ("ETag", generate_etag(&info.etag)),
                ("x-amz-request-id", request_id),
            ],
        )
            .into_response(),
        Err(e) => error_response(e, &format!("/{}/{}", bucket, key), &request_id),
    }
}

/// GET object
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    let request_id = generate_request_id();
    debug!(
        "GetObject bucket={} key={} request_id={}",
        bucket, key, request_id
    );

    match state.storage.get(&bucket, &key).await {
        Ok(data) => (
            StatusCode::OK,
            [
                ("Content-Type", content_type(&key)),
                ("x-amz-request-id", request_id),
            ],
            Body::from(data),
        )
            .into_response(),
        Err(e) => error_response(e, &format!("/{}/{}", bucket, key), &request_id),
    }
}

/// PUT object dispatcher - PutObject, or CopyObject when `x-amz-copy-source` is set
pub async fn object_put_handler(
    state: State<AppState>,
    path: Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if headers.contains_key("x-amz-copy-source") {
        copy_object(state, path, headers).await
    } else {
        put_object(state, path, body).await
    }
}

/// PUT object
pub async fn put_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let request_id = generate_request_id();
    info!(
        "PutObject bucket={} key={} size={} request_id={}",
        bucket,
        key,
        body.len(),
        request_id
    );

    match state.storage.put(&bucket, &key, body).await {
        Ok(info) => (
            StatusCode::OK,
            [
                ("ETag", generate_etag(&info.etag)),
                ("x-amz-request-id", request_id),
            ],
        )
            .into_response(),
        Err(e) => error_response(e, &format!("/{}/{}", bucket, key), &request_id),
    }
}

/// COPY object (PUT with x-amz-copy-source header)
pub async fn copy_object(
    State(state): State<AppState>,
    Path((dest_bucket, dest_key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let request_id = generate_request_id();
    let resource = format!("/{}/{}", dest_bucket, dest_key);

    let copy_source = headers
        .get("x-amz-copy-source")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    info!(
        "CopyObject source={} dest={}/{} request_id={}",
        copy_source, dest_bucket, dest_key, request_id
    );

    let (src_bucket, src_key) = match parse_copy_source(copy_source) {
        Some(source) => source,
        None => {
            return error_response(
                Error::InvalidRequest("Invalid copy source format".into()),
                &resource,
                &request_id,
            )
        }
    };

    match state
        .storage
        .copy(&src_bucket, &src_key, &dest_bucket, &dest_key)
        .await
    {
        Ok(info) => {
            let body = xml::copy_object_response(&info.etag, &Utc::now());
            xml_response(StatusCode::OK, body, &request_id)
        }
        Err(e) => error_response(e, &resource, &request_id),
    }
}

/// DELETE object; deleting a missing key succeeds
pub async fn delete_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    let request_id = generate_request_id();
    info!(
        "DeleteObject bucket={} key={} request_id={}",
        bucket, key, request_id
    );

    match state.storage.delete(&bucket, &key).await {
        Ok(()) => empty_response(StatusCode::NO_CONTENT, &request_id),
        Err(e) => error_response(e, &format!("/{}/{}", bucket, key), &request_id),
    }
}

/// `/bucket/key` or `bucket/key`, key URL-encoded
fn parse_copy_source(source: &str) -> Option<(String, String)> {
    let source = source.trim_start_matches('/');
    let source = source.split('?').next().unwrap_or(source);
    let (bucket, key) = source.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }

    let key = urlencoding::decode(key)
        .map(|k| k.into_owned())
        .unwrap_or_else(|_| key.to_string());
    Some((bucket.to_string(), key))
}

fn content_type(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_copy_source() {
        assert_eq!(
            parse_copy_source("/local-bucket/incoming/a%20b.jpg"),
            Some(("local-bucket".to_string(), "incoming/a b.jpg".to_string()))
        );
        assert_eq!(
            parse_copy_source("local-bucket/a.txt?versionId=1"),
            Some(("local-bucket".to_string(), "a.txt".to_string()))
        );
        assert_eq!(parse_copy_source("local-bucket"), None);
        assert_eq!(parse_copy_source("/local-bucket/"), None);
    }

    #[test]
    fn test_content_type_from_key() {
        assert_eq!(content_type("a.json"), "application/json");
        assert_eq!(content_type("noext"), "application/octet-stream");
    }
}
