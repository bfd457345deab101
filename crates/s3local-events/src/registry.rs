//! Subscription Registry
//!
//! A registry is built wholesale from resolved declarations and never
//! mutated afterwards. Rebuilding produces a new registry; the supervisor
//! swaps the active snapshot.

use s3local_core::types::{NotificationDeclaration, RawNotification, S3EventType};
use tracing::{debug, warn};

use crate::error::ConfigurationError;
use crate::invoke::HandlerRef;
use crate::resolver::HandlerResolver;
use crate::rules::{event_matches, KeyMatcher};

/// One compiled notification binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub bucket: String,
    pub event_pattern: String,
    pub matchers: Vec<KeyMatcher>,
    pub handler: HandlerRef,
}

impl Subscription {
    pub fn accepts_event(&self, event_type: &str) -> bool {
        event_matches(&self.event_pattern, event_type)
    }

    /// All matchers must accept; no matchers always passes
    pub fn accepts_key(&self, key: &str) -> bool {
        self.matchers.iter().all(|m| m.matches(key))
    }

    /// Bucket, event type and key all match
    pub fn matches(&self, notification: &RawNotification) -> bool {
        self.bucket == notification.bucket
            && self.accepts_event(&notification.event_type)
            && self.accepts_key(&notification.key)
    }
}

/// Ordered, immutable set of subscriptions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    subscriptions: Vec<Subscription>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Subscriptions in declaration order
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.iter()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

/// Registry plus the declarations skipped in lenient mode
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub registry: Registry,
    pub rejected: Vec<ConfigurationError>,
}

/// Compiles declarations into a [`Registry`]
pub struct RegistryBuilder<'a> {
    resolver: &'a dyn HandlerResolver,
    fail_fast: bool,
}

impl<'a> RegistryBuilder<'a> {
    pub fn new(resolver: &'a dyn HandlerResolver) -> Self {
        Self {
            resolver,
            fail_fast: false,
        }
    }

    /// Return the first configuration error instead of skipping the declaration
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn build(
        &self,
        declarations: &[NotificationDeclaration],
    ) -> Result<BuildReport, ConfigurationError> {
        let mut report = BuildReport::default();

        for declaration in declarations {
            match self.compile(declaration) {
                Ok(subscription) => {
                    debug!(
                        "Subscribed {} to {} on bucket {}",
                        subscription.handler.function, subscription.event_pattern, subscription.bucket
                    );
                    report.registry.subscriptions.push(subscription);
                }
                Err(e) if self.fail_fast => return Err(e),
                Err(e) => {
                    warn!("Skipping notification declaration: {}", e);
                    report.rejected.push(e);
                }
            }
        }

        Ok(report)
    }

    fn compile(&self, declaration: &NotificationDeclaration) -> Result<Subscription, ConfigurationError> {
        declaration
            .event
            .parse::<S3EventType>()
            .map_err(|_| ConfigurationError::UnknownEventType {
                function: declaration.function.clone(),
                event: declaration.event.clone(),
            })?;

        let handler = self.resolver.resolve(&declaration.function).ok_or_else(|| {
            ConfigurationError::UnresolvedHandler {
                function: declaration.function.clone(),
            }
        })?;

        Ok(Subscription {
            bucket: declaration.bucket.clone(),
            event_pattern: declaration.event.clone(),
            matchers: declaration.rules.iter().map(KeyMatcher::compile).collect(),
            handler,
        })
    }
}

/// Build a registry, failing on the first bad declaration
pub fn build_registry(
    declarations: &[NotificationDeclaration],
    resolver: &dyn HandlerResolver,
) -> Result<Registry, ConfigurationError> {
    RegistryBuilder::new(resolver)
        .fail_fast(true)
        .build(declarations)
        .map(|report| report.registry)
}
