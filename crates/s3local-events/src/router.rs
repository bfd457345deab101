//! Event Router
//!
//! Matches storage notifications against a registry snapshot and launches one
//! invocation task per matching subscription.

use metrics::counter;
use s3local_core::types::{RawNotification, RecordContext, S3EventMessage, S3EventRecord};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::invoke::{DispatchOutcome, HandlerInvoker};
use crate::registry::{Registry, Subscription};

/// Completed invocations buffered for slow report subscribers
const REPORT_CAPACITY: usize = 256;

/// Outcome of one invocation, published once it finishes
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub function: String,
    pub bucket: String,
    pub key: String,
    pub event_type: String,
    pub outcome: DispatchOutcome,
}

/// Handle to one in-flight invocation
#[derive(Debug)]
pub struct PendingDispatch {
    function: String,
    handle: JoinHandle<DispatchOutcome>,
}

impl PendingDispatch {
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Wait for the invocation; a task that panicked counts as failed
    pub async fn outcome(self) -> DispatchOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => DispatchOutcome::Failed(format!("dispatch task failed: {}", e)),
        }
    }
}

/// Routes notifications to handlers
#[derive(Clone)]
pub struct EventRouter {
    invoker: Arc<dyn HandlerInvoker>,
    context: RecordContext,
    reports: broadcast::Sender<DispatchReport>,
}

impl EventRouter {
    pub fn new(invoker: Arc<dyn HandlerInvoker>) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        Self {
            invoker,
            context: RecordContext::default(),
            reports,
        }
    }

    /// Region, principal and source address stamped onto records
    pub fn with_context(mut self, context: RecordContext) -> Self {
        self.context = context;
        self
    }

    /// Subscribe to the outcomes of every invocation this router launches
    pub fn reports(&self) -> broadcast::Receiver<DispatchReport> {
        self.reports.subscribe()
    }

    /// Subscriptions matching a notification, in declaration order
    pub fn matching<'r, 'n>(
        registry: &'r Registry,
        notification: &'n RawNotification,
    ) -> impl Iterator<Item = &'r Subscription> + 'n
    where
        'r: 'n,
    {
        registry
            .iter()
            .filter(move |s| s.bucket == notification.bucket)
            .filter(move |s| s.accepts_event(&notification.event_type))
            .filter(move |s| s.accepts_key(&notification.key))
    }

    /// Event message delivered to the handler of `subscription`
    pub fn envelope(
        &self,
        notification: &RawNotification,
        subscription: &Subscription,
    ) -> S3EventMessage {
        S3EventMessage::single(S3EventRecord::new(
            notification,
            &subscription.handler.function,
            &self.context,
        ))
    }

    /// Launch one invocation per matching subscription without awaiting any.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn route(&self, notification: &RawNotification, registry: &Registry) -> Vec<PendingDispatch> {
        let pending: Vec<PendingDispatch> = Self::matching(registry, notification)
            .map(|subscription| self.dispatch(notification, subscription))
            .collect();

        if pending.is_empty() {
            debug!(
                "No subscriptions for {} on {}/{}",
                notification.event_type, notification.bucket, notification.key
            );
        } else {
            info!(
                "Dispatching {} on {}/{} to {} handler(s)",
                notification.event_type,
                notification.bucket,
                notification.key,
                pending.len()
            );
        }

        pending
    }

    fn dispatch(&self, notification: &RawNotification, subscription: &Subscription) -> PendingDispatch {
        let envelope = self.envelope(notification, subscription);
        let handler = subscription.handler.clone();
        let invoker = Arc::clone(&self.invoker);
        let reports = self.reports.clone();
        let notification = notification.clone();

        let function = handler.function.clone();
        let handle = tokio::spawn(async move {
            let outcome = invoker.invoke(&handler, &envelope).await;
            counter!("s3local_dispatch_total", "outcome" => outcome.label()).increment(1);

            match &outcome {
                DispatchOutcome::Completed => info!(
                    function = %handler.function,
                    bucket = %notification.bucket,
                    key = %notification.key,
                    "Handler completed"
                ),
                DispatchOutcome::Failed(reason) => warn!(
                    function = %handler.function,
                    bucket = %notification.bucket,
                    key = %notification.key,
                    "Handler failed: {}", reason
                ),
                DispatchOutcome::TimedOut => warn!(
                    function = %handler.function,
                    bucket = %notification.bucket,
                    key = %notification.key,
                    "Handler timed out"
                ),
            }

            // nobody listening is fine
            let _ = reports.send(DispatchReport {
                function: handler.function.clone(),
                bucket: notification.bucket,
                key: notification.key,
                event_type: notification.event_type,
                outcome: outcome.clone(),
            });

            outcome
        });

        PendingDispatch { function, handle }
    }
}
