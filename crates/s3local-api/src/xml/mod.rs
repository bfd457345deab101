//! XML response generation for S3 API

use chrono::{DateTime, Utc};
use s3local_core::types::Bucket;
use s3local_core::utils::{format_s3_datetime, xml_escape};

/// Generate ListBuckets response XML
pub fn list_buckets_response(buckets: &[Bucket], owner_id: &str) -> String {
    let owner = xml_escape(owner_id);
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Owner>
    <ID>{owner}</ID>
    <DisplayName>{owner}</DisplayName>
  </Owner>
  <Buckets>"#
    );

    for bucket in buckets {
        xml.push_str("\n    <Bucket>\n      <Name>");
        xml.push_str(&xml_escape(&bucket.name));
        xml.push_str("</Name>\n      <CreationDate>");
        xml.push_str(&format_s3_datetime(&bucket.created_at));
        xml.push_str("</CreationDate>\n    </Bucket>");
    }

    xml.push_str(
        r#"
  </Buckets>
</ListAllMyBucketsResult>"#,
    );

    xml
}

/// Generate CopyObject response XML
pub fn copy_object_response(etag: &str, last_modified: &DateTime<Utc>) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<CopyObjectResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <LastModified>{}</LastModified>
  <ETag>"{}"</ETag>
</CopyObjectResult>"#,
        format_s3_datetime(last_modified),
        etag
    )
}
