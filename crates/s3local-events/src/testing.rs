//! Test doubles for the invocation boundary and the notification source

use async_trait::async_trait;
use parking_lot::Mutex;
use s3local_core::types::{NotificationSource, RawNotification, S3EventMessage};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::invoke::{DispatchOutcome, HandlerInvoker, HandlerRef};

/// Resolver knowing exactly `functions`, each as a command target
pub fn resolver_for(functions: &[&str]) -> HashMap<String, HandlerRef> {
    functions
        .iter()
        .map(|f| {
            (
                f.to_string(),
                HandlerRef::command(*f, format!("handler.{}", f), "true", Vec::new()),
            )
        })
        .collect()
}

/// Records every invocation; outcomes default to `Completed`
#[derive(Default)]
pub struct RecordingInvoker {
    calls: Mutex<Vec<(String, S3EventMessage)>>,
    outcomes: HashMap<String, DispatchOutcome>,
    delay: Option<Duration>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, function: &str, outcome: DispatchOutcome) -> Self {
        self.outcomes.insert(function.to_string(), outcome);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, S3EventMessage)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HandlerInvoker for RecordingInvoker {
    async fn invoke(&self, handler: &HandlerRef, event: &S3EventMessage) -> DispatchOutcome {
        self.calls
            .lock()
            .push((handler.function.clone(), event.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.outcomes
            .get(&handler.function)
            .cloned()
            .unwrap_or(DispatchOutcome::Completed)
    }
}

/// In-memory notification stream
pub struct BroadcastSource {
    sender: broadcast::Sender<RawNotification>,
}

impl BroadcastSource {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn emit(&self, notification: RawNotification) {
        let _ = self.sender.send(notification);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationSource for BroadcastSource {
    fn subscribe(&self) -> broadcast::Receiver<RawNotification> {
        self.sender.subscribe()
    }
}
