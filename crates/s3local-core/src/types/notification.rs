//! Event Notification types
//!
//! S3-compatible event notification model:
//! - Event type vocabulary (`s3:ObjectCreated:*`, `s3:ObjectRemoved:Delete`, ...)
//! - Key filter rules by prefix/suffix
//! - Raw notifications emitted by the storage emulator
//! - Event records in the AWS S3 event message format

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio::sync::broadcast;

// ============================================================================
// Event Types
// ============================================================================

/// S3 Event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum S3EventType {
    // Object Created events
    #[serde(rename = "s3:ObjectCreated:*")]
    ObjectCreatedAll,
    #[serde(rename = "s3:ObjectCreated:Put")]
    ObjectCreatedPut,
    #[serde(rename = "s3:ObjectCreated:Post")]
    ObjectCreatedPost,
    #[serde(rename = "s3:ObjectCreated:Copy")]
    ObjectCreatedCopy,
    #[serde(rename = "s3:ObjectCreated:CompleteMultipartUpload")]
    ObjectCreatedCompleteMultipartUpload,

    // Object Removed events
    #[serde(rename = "s3:ObjectRemoved:*")]
    ObjectRemovedAll,
    #[serde(rename = "s3:ObjectRemoved:Delete")]
    ObjectRemovedDelete,
    #[serde(rename = "s3:ObjectRemoved:DeleteMarkerCreated")]
    ObjectRemovedDeleteMarkerCreated,

    // Object Restore events
    #[serde(rename = "s3:ObjectRestore:*")]
    ObjectRestoreAll,
    #[serde(rename = "s3:ObjectRestore:Post")]
    ObjectRestorePost,
    #[serde(rename = "s3:ObjectRestore:Completed")]
    ObjectRestoreCompleted,

    // Replication events
    #[serde(rename = "s3:Replication:*")]
    ReplicationAll,
    #[serde(rename = "s3:Replication:OperationFailedReplication")]
    ReplicationFailed,
    #[serde(rename = "s3:Replication:OperationMissedThreshold")]
    ReplicationMissedThreshold,
    #[serde(rename = "s3:Replication:OperationReplicatedAfterThreshold")]
    ReplicationAfterThreshold,

    // Lifecycle events
    #[serde(rename = "s3:LifecycleExpiration:*")]
    LifecycleExpirationAll,
    #[serde(rename = "s3:LifecycleExpiration:Delete")]
    LifecycleExpirationDelete,
    #[serde(rename = "s3:LifecycleExpiration:DeleteMarkerCreated")]
    LifecycleExpirationDeleteMarkerCreated,

    // Tagging events
    #[serde(rename = "s3:ObjectTagging:*")]
    ObjectTaggingAll,
    #[serde(rename = "s3:ObjectTagging:Put")]
    ObjectTaggingPut,
    #[serde(rename = "s3:ObjectTagging:Delete")]
    ObjectTaggingDelete,

    // ACL events
    #[serde(rename = "s3:ObjectAcl:Put")]
    ObjectAclPut,

    // Test event
    #[serde(rename = "s3:TestEvent")]
    TestEvent,
}

impl S3EventType {
    /// Every recognized event type, wildcards included
    pub const ALL: [S3EventType; 23] = [
        S3EventType::ObjectCreatedAll,
        S3EventType::ObjectCreatedPut,
        S3EventType::ObjectCreatedPost,
        S3EventType::ObjectCreatedCopy,
        S3EventType::ObjectCreatedCompleteMultipartUpload,
        S3EventType::ObjectRemovedAll,
        S3EventType::ObjectRemovedDelete,
        S3EventType::ObjectRemovedDeleteMarkerCreated,
        S3EventType::ObjectRestoreAll,
        S3EventType::ObjectRestorePost,
        S3EventType::ObjectRestoreCompleted,
        S3EventType::ReplicationAll,
        S3EventType::ReplicationFailed,
        S3EventType::ReplicationMissedThreshold,
        S3EventType::ReplicationAfterThreshold,
        S3EventType::LifecycleExpirationAll,
        S3EventType::LifecycleExpirationDelete,
        S3EventType::LifecycleExpirationDeleteMarkerCreated,
        S3EventType::ObjectTaggingAll,
        S3EventType::ObjectTaggingPut,
        S3EventType::ObjectTaggingDelete,
        S3EventType::ObjectAclPut,
        S3EventType::TestEvent,
    ];

    /// Full event name as used in notification configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            S3EventType::ObjectCreatedAll => "s3:ObjectCreated:*",
            S3EventType::ObjectCreatedPut => "s3:ObjectCreated:Put",
            S3EventType::ObjectCreatedPost => "s3:ObjectCreated:Post",
            S3EventType::ObjectCreatedCopy => "s3:ObjectCreated:Copy",
            S3EventType::ObjectCreatedCompleteMultipartUpload => {
                "s3:ObjectCreated:CompleteMultipartUpload"
            }
            S3EventType::ObjectRemovedAll => "s3:ObjectRemoved:*",
            S3EventType::ObjectRemovedDelete => "s3:ObjectRemoved:Delete",
            S3EventType::ObjectRemovedDeleteMarkerCreated => "s3:ObjectRemoved:DeleteMarkerCreated",
            S3EventType::ObjectRestoreAll => "s3:ObjectRestore:*",
            S3EventType::ObjectRestorePost => "s3:ObjectRestore:Post",
            S3EventType::ObjectRestoreCompleted => "s3:ObjectRestore:Completed",
            S3EventType::ReplicationAll => "s3:Replication:*",
            S3EventType::ReplicationFailed => "s3:Replication:OperationFailedReplication",
            S3EventType::ReplicationMissedThreshold => "s3:Replication:OperationMissedThreshold",
            S3EventType::ReplicationAfterThreshold => {
                "s3:Replication:OperationReplicatedAfterThreshold"
            }
            S3EventType::LifecycleExpirationAll => "s3:LifecycleExpiration:*",
            S3EventType::LifecycleExpirationDelete => "s3:LifecycleExpiration:Delete",
            S3EventType::LifecycleExpirationDeleteMarkerCreated => {
                "s3:LifecycleExpiration:DeleteMarkerCreated"
            }
            S3EventType::ObjectTaggingAll => "s3:ObjectTagging:*",
            S3EventType::ObjectTaggingPut => "s3:ObjectTagging:Put",
            S3EventType::ObjectTaggingDelete => "s3:ObjectTagging:Delete",
            S3EventType::ObjectAclPut => "s3:ObjectAcl:Put",
            S3EventType::TestEvent => "s3:TestEvent",
        }
    }

    /// Event name as it appears in an event record (`ObjectCreated:Put`)
    pub fn event_name(&self) -> &'static str {
        let full = self.as_str();
        full.strip_prefix("s3:").unwrap_or(full)
    }
}

impl std::fmt::Display for S3EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned for names outside the S3 event type vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized S3 event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for S3EventType {
    type Err = UnknownEventType;

    /// Accepts both `s3:ObjectCreated:Put` and `ObjectCreated:Put`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("s3:").unwrap_or(s);
        S3EventType::ALL
            .iter()
            .copied()
            .find(|t| t.event_name() == name)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

// ============================================================================
// Filter Rules
// ============================================================================

/// Key filter rule as declared in a notification binding.
///
/// A rule may carry a prefix, a suffix, both, or neither. A rule with
/// neither matches every key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl FilterRule {
    /// Create a new prefix rule
    pub fn prefix(value: impl Into<String>) -> Self {
        Self {
            prefix: Some(value.into()),
            suffix: None,
        }
    }

    /// Create a new suffix rule
    pub fn suffix(value: impl Into<String>) -> Self {
        Self {
            prefix: None,
            suffix: Some(value.into()),
        }
    }

    /// Add a suffix to this rule
    pub fn with_suffix(mut self, value: impl Into<String>) -> Self {
        self.suffix = Some(value.into());
        self
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// A storage operation as reported by the emulator.
///
/// Emitted once per operation and dropped after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub bucket: String,
    pub key: String,
    /// Event name without the `s3:` prefix, e.g. `ObjectCreated:Put`
    pub event_type: String,
    pub size: u64,
    pub etag: String,
}

impl RawNotification {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            event_type: event_type.into(),
            size: 0,
            etag: String::new(),
        }
    }

    /// Attach object size and ETag
    pub fn with_object(mut self, size: u64, etag: impl Into<String>) -> Self {
        self.size = size;
        self.etag = etag.into();
        self
    }
}

/// Source of raw notifications (the storage emulator's change stream).
pub trait NotificationSource: Send + Sync {
    /// Open a new receiver; it sees every notification sent after this call.
    fn subscribe(&self) -> broadcast::Receiver<RawNotification>;
}

/// A resolved notification binding: the bucket is a literal name and the
/// function is looked up by name at registry build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDeclaration {
    pub function: String,
    pub bucket: String,
    pub event: String,
    #[serde(default)]
    pub rules: Vec<FilterRule>,
}

impl NotificationDeclaration {
    pub fn new(
        function: impl Into<String>,
        bucket: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            function: function.into(),
            bucket: bucket.into(),
            event: event.into(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: FilterRule) -> Self {
        self.rules.push(rule);
        self
    }
}

// ============================================================================
// Event Record (S3 Event Message Format)
// ============================================================================

/// Fixed context stamped onto every record
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub region: String,
    pub principal_id: String,
    pub source_ip: String,
}

impl Default for RecordContext {
    fn default() -> Self {
        Self {
            region: crate::DEFAULT_REGION.to_string(),
            principal_id: crate::DEFAULT_PRINCIPAL_ID.to_string(),
            source_ip: "127.0.0.1".to_string(),
        }
    }
}

/// S3 Event record (AWS-compatible format)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3EventRecord {
    pub event_version: String,
    pub event_source: String,
    pub aws_region: String,
    pub event_time: String,
    pub event_name: String,
    pub user_identity: UserIdentity,
    pub request_parameters: RequestParameters,
    pub response_elements: ResponseElements,
    pub s3: S3Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub principal_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestParameters {
    #[serde(rename = "sourceIPAddress")]
    pub source_ip_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseElements {
    #[serde(rename = "x-amz-request-id")]
    pub x_amz_request_id: String,
    #[serde(rename = "x-amz-id-2")]
    pub x_amz_id_2: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Info {
    pub s3_schema_version: String,
    pub configuration_id: String,
    pub bucket: S3BucketInfo,
    pub object: S3ObjectInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3BucketInfo {
    pub name: String,
    pub owner_identity: UserIdentity,
    pub arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3ObjectInfo {
    pub key: String,
    pub size: u64,
    pub e_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub sequencer: String,
}

/// S3 Event message (the envelope delivered to handlers)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3EventMessage {
    pub records: Vec<S3EventRecord>,
}

impl S3EventMessage {
    /// Envelope with a single record
    pub fn single(record: S3EventRecord) -> Self {
        Self {
            records: vec![record],
        }
    }
}

impl S3EventRecord {
    /// Create a record for one notification delivered under `config_id`
    pub fn new(notification: &RawNotification, config_id: &str, ctx: &RecordContext) -> Self {
        let now = Utc::now();
        let request_id = crate::utils::generate_request_id();
        let event_name = notification
            .event_type
            .strip_prefix("s3:")
            .unwrap_or(&notification.event_type)
            .to_string();

        Self {
            event_version: "2.1".to_string(),
            event_source: "aws:s3".to_string(),
            aws_region: ctx.region.clone(),
            event_time: crate::utils::format_s3_datetime(&now),
            event_name,
            user_identity: UserIdentity {
                principal_id: ctx.principal_id.clone(),
            },
            request_parameters: RequestParameters {
                source_ip_address: ctx.source_ip.clone(),
            },
            response_elements: ResponseElements {
                x_amz_id_2: format!("{}-extended", request_id),
                x_amz_request_id: request_id,
            },
            s3: S3Info {
                s3_schema_version: "1.0".to_string(),
                configuration_id: config_id.to_string(),
                bucket: S3BucketInfo {
                    name: notification.bucket.clone(),
                    owner_identity: UserIdentity {
                        principal_id: ctx.principal_id.clone(),
                    },
                    arn: format!("arn:aws:s3:::{}", notification.bucket),
                },
                object: S3ObjectInfo {
                    key: notification.key.clone(),
                    size: notification.size,
                    e_tag: notification.etag.clone(),
                    version_id: None,
                    sequencer: format!("{:016X}", now.timestamp_nanos_opt().unwrap_or(0)),
                },
            },
        }
    }
}
