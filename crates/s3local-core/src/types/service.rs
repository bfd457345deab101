//! Service definition
//!
//! Describes the buckets and functions of a service, in the shape of a
//! serverless `resources` + `functions` section, and resolves it into the
//! bucket list and the ordered notification declarations consumed by the
//! dispatch engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::notification::{FilterRule, NotificationDeclaration};
use crate::{Error, Result};

/// CloudFormation type of bucket resources
pub const BUCKET_RESOURCE_TYPE: &str = "AWS::S3::Bucket";

/// Logical id prefix serverless gives to buckets it generates from events
const GENERATED_BUCKET_PREFIX: &str = "S3Bucket";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    #[serde(default)]
    pub resources: Vec<BucketResource>,
    #[serde(default)]
    pub functions: Vec<FunctionDefinition>,
    /// Extra stacks deployed with the service; their bucket resources are
    /// merged after `resources`, in stack name order
    #[serde(default)]
    pub additional_stacks: BTreeMap<String, AdditionalStack>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalStack {
    #[serde(default)]
    pub resources: Vec<BucketResource>,
}

/// A declared bucket resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketResource {
    /// Logical id used by `{ ref = "..." }`
    pub id: String,
    #[serde(rename = "type", default = "default_resource_type")]
    pub kind: String,
    #[serde(default)]
    pub bucket_name: Option<String>,
}

fn default_resource_type() -> String {
    BUCKET_RESOURCE_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    /// Handler entry point, e.g. `handler.s3hook`
    #[serde(default)]
    pub handler: Option<String>,
    /// Deployed function name used for Lambda invocations; defaults to `name`
    #[serde(default)]
    pub function_name: Option<String>,
    /// Local command that receives the event on stdin
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub events: Vec<S3EventDefinition>,
}

impl FunctionDefinition {
    pub fn deployed_name(&self) -> &str {
        self.function_name.as_deref().unwrap_or(&self.name)
    }
}

/// An `s3` event of a function: either a bare bucket name or a full binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum S3EventDefinition {
    Bucket(String),
    /// Binding to a bucket that lives outside the service (`existingS3`)
    Existing { existing: ExistingS3Event },
    Detailed(S3EventDetails),
}

/// One `existingS3` binding may name several event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingS3Event {
    pub bucket: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub rules: Vec<FilterRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3EventDetails {
    pub bucket: BucketRef,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub rules: Vec<FilterRule>,
}

/// Bucket given by literal name or by reference to a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketRef {
    Name(String),
    Ref {
        #[serde(rename = "ref")]
        id: String,
    },
}

/// Output of resolving a service definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedService {
    /// Buckets to create, first-seen order, no duplicates
    pub buckets: Vec<String>,
    /// Notification bindings in function order, then event order
    pub declarations: Vec<NotificationDeclaration>,
}

impl ResolvedService {
    fn add_bucket(&mut self, name: &str) {
        if !self.buckets.iter().any(|b| b == name) {
            self.buckets.push(name.to_string());
        }
    }
}

impl ServiceDefinition {
    /// Look up a function by name
    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Look up a resource by logical id, in `resources` then the additional stacks
    pub fn resource(&self, id: &str) -> Option<&BucketResource> {
        self.all_resources().find(|r| r.id == id)
    }

    fn all_resources(&self) -> impl Iterator<Item = &BucketResource> {
        self.resources.iter().chain(
            self.additional_stacks
                .values()
                .flat_map(|stack| stack.resources.iter()),
        )
    }

    /// Resolve bucket references and produce the declarations.
    ///
    /// `extra_buckets` are listed first in the bucket list.
    pub fn resolve(&self, extra_buckets: &[String]) -> Result<ResolvedService> {
        let mut resolved = ResolvedService::default();

        for bucket in extra_buckets {
            resolved.add_bucket(bucket);
        }

        for resource in self.all_resources() {
            if resource.kind != BUCKET_RESOURCE_TYPE {
                continue;
            }
            if let Some(name) = &resource.bucket_name {
                resolved.add_bucket(name);
            }
        }

        for function in &self.functions {
            for event in &function.events {
                let (bucket, patterns, rules) = match event {
                    S3EventDefinition::Bucket(name) => (
                        self.resolve_name(name),
                        vec![crate::DEFAULT_EVENT.to_string()],
                        Vec::new(),
                    ),
                    S3EventDefinition::Existing { existing } => {
                        let patterns = if existing.events.is_empty() {
                            vec![crate::DEFAULT_EVENT.to_string()]
                        } else {
                            existing.events.clone()
                        };
                        (existing.bucket.clone(), patterns, existing.rules.clone())
                    }
                    S3EventDefinition::Detailed(details) => {
                        let bucket = match &details.bucket {
                            BucketRef::Name(name) => self.resolve_name(name),
                            BucketRef::Ref { id } => self.resolve_ref(id)?,
                        };
                        let pattern = details
                            .event
                            .clone()
                            .unwrap_or_else(|| crate::DEFAULT_EVENT.to_string());
                        (bucket, vec![pattern], details.rules.clone())
                    }
                };

                resolved.add_bucket(&bucket);
                for pattern in patterns {
                    resolved.declarations.push(NotificationDeclaration {
                        function: function.name.clone(),
                        bucket: bucket.clone(),
                        event: pattern,
                        rules: rules.clone(),
                    });
                }
            }
        }

        Ok(resolved)
    }

    /// `{ ref = "Id" }` must point at a named bucket resource
    fn resolve_ref(&self, id: &str) -> Result<String> {
        let resource = self
            .resource(id)
            .ok_or_else(|| Error::Configuration(format!("unknown bucket resource '{}'", id)))?;

        if resource.kind != BUCKET_RESOURCE_TYPE {
            return Err(Error::Configuration(format!(
                "resource '{}' is a {}, not a {}",
                id, resource.kind, BUCKET_RESOURCE_TYPE
            )));
        }

        resource
            .bucket_name
            .clone()
            .ok_or_else(|| Error::Configuration(format!("resource '{}' has no bucket_name", id)))
    }

    /// A literal name `photos` maps to resource `S3BucketPhotos` when declared
    fn resolve_name(&self, name: &str) -> String {
        let id = format!("{}{}", GENERATED_BUCKET_PREFIX, capitalize(name));
        self.resource(&id)
            .filter(|r| r.kind == BUCKET_RESOURCE_TYPE)
            .and_then(|r| r.bucket_name.clone())
            .unwrap_or_else(|| name.to_string())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: &str = r#"
[[resources]]
id = "S3BucketPhotos"
type = "AWS::S3::Bucket"
bucket_name = "local-bucket"

[[resources]]
id = "UploadsQueue"
type = "AWS::SQS::Queue"

[[functions]]
name = "s3hook"
handler = "handler.s3hook"
events = [
  { bucket = { ref = "S3BucketPhotos" }, event = "s3:ObjectCreated:*", rules = [{ prefix = "incoming/" }, { suffix = ".jpg" }] },
  "photos",
]

[[functions]]
name = "cleanup"
handler = "handler.cleanup"
function_name = "svc-dev-cleanup"
events = [{ bucket = "archive", event = "s3:ObjectRemoved:*" }]
"#;

    fn service() -> ServiceDefinition {
        toml::from_str(SERVICE).unwrap()
    }

    #[test]
    fn test_parse_service() {
        let service = service();
        assert_eq!(service.resources.len(), 2);
        assert_eq!(service.functions.len(), 2);
        assert_eq!(
            service.functions[0].events[1],
            S3EventDefinition::Bucket("photos".to_string())
        );
        assert_eq!(service.function("cleanup").unwrap().deployed_name(), "svc-dev-cleanup");
        assert_eq!(service.function("s3hook").unwrap().deployed_name(), "s3hook");
    }

    #[test]
    fn test_resolve_declarations_in_order() {
        let resolved = service().resolve(&["extra".to_string()]).unwrap();

        assert_eq!(resolved.buckets, vec!["extra", "local-bucket", "archive"]);
        assert_eq!(resolved.declarations.len(), 3);

        let first = &resolved.declarations[0];
        assert_eq!(first.function, "s3hook");
        assert_eq!(first.bucket, "local-bucket");
        assert_eq!(first.event, "s3:ObjectCreated:*");
        assert_eq!(
            first.rules,
            vec![FilterRule::prefix("incoming/"), FilterRule::suffix(".jpg")]
        );

        // bare name resolved through the S3Bucket<Name> convention
        let second = &resolved.declarations[1];
        assert_eq!(second.bucket, "local-bucket");
        assert_eq!(second.event, crate::DEFAULT_EVENT);
        assert!(second.rules.is_empty());

        let third = &resolved.declarations[2];
        assert_eq!(third.function, "cleanup");
        assert_eq!(third.bucket, "archive");
        assert_eq!(third.event, "s3:ObjectRemoved:*");
    }

    #[test]
    fn test_unknown_ref_is_configuration_error() {
        let mut service = service();
        service.functions[0].events = vec![S3EventDefinition::Detailed(S3EventDetails {
            bucket: BucketRef::Ref {
                id: "Missing".to_string(),
            },
            event: None,
            rules: Vec::new(),
        })];

        let err = service.resolve(&[]).unwrap_err();
        assert!(matches!(err, Error::Configuration(ref msg) if msg.contains("Missing")));
    }

    #[test]
    fn test_ref_to_non_bucket_resource() {
        let mut service = service();
        service.functions[0].events = vec![S3EventDefinition::Detailed(S3EventDetails {
            bucket: BucketRef::Ref {
                id: "UploadsQueue".to_string(),
            },
            event: None,
            rules: Vec::new(),
        })];

        assert!(matches!(service.resolve(&[]), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_additional_stack_resources() {
        let service: ServiceDefinition = toml::from_str(
            r#"
[[additional_stacks.media.resources]]
id = "S3BucketThumbs"
bucket_name = "thumbs-bucket"

[[functions]]
name = "publish"
handler = "handler.publish"
events = ["thumbs", { bucket = { ref = "S3BucketThumbs" } }]
"#,
        )
        .unwrap();

        let resolved = service.resolve(&[]).unwrap();
        assert_eq!(resolved.buckets, vec!["thumbs-bucket"]);
        assert_eq!(resolved.declarations.len(), 2);
        assert!(resolved
            .declarations
            .iter()
            .all(|d| d.bucket == "thumbs-bucket"));
    }

    #[test]
    fn test_existing_bucket_expands_events() {
        let service: ServiceDefinition = toml::from_str(
            r#"
[[functions]]
name = "audit"
handler = "handler.audit"
events = [
  { existing = { bucket = "legacy-bucket", events = ["s3:ObjectCreated:*", "s3:ObjectRemoved:*"], rules = [{ prefix = "logs/" }] } },
  { existing = { bucket = "other-bucket" } },
]
"#,
        )
        .unwrap();

        let resolved = service.resolve(&[]).unwrap();
        assert_eq!(resolved.buckets, vec!["legacy-bucket", "other-bucket"]);

        let events: Vec<_> = resolved
            .declarations
            .iter()
            .map(|d| (d.bucket.as_str(), d.event.as_str()))
            .collect();
        assert_eq!(
            events,
            vec![
                ("legacy-bucket", "s3:ObjectCreated:*"),
                ("legacy-bucket", "s3:ObjectRemoved:*"),
                ("other-bucket", crate::DEFAULT_EVENT),
            ]
        );
        assert_eq!(resolved.declarations[1].rules, vec![FilterRule::prefix("logs/")]);
    }

    #[test]
    fn test_empty_service() {
        let resolved = ServiceDefinition::default().resolve(&[]).unwrap();
        assert!(resolved.buckets.is_empty());
        assert!(resolved.declarations.is_empty());
    }
}
