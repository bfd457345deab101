//! Utility functions

use uuid::Uuid;

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string().replace("-", "").to_uppercase()
}

/// Generate an ETag from content hash
pub fn generate_etag(md5_hash: &str) -> String {
    format!("\"{}\"", md5_hash)
}

/// XML escape string
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Format datetime for S3 responses and event records
pub fn format_s3_datetime(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_request_id_shape() {
        let id = generate_request_id();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('-'));
        assert_eq!(id, id.to_uppercase());
    }

    #[test]
    fn test_s3_datetime() {
        let dt = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_s3_datetime(&dt), "2024-01-02T03:04:05.000Z");
    }

    #[test]
    fn test_etag_quoting() {
        assert_eq!(generate_etag("abc"), "\"abc\"");
    }
}
