//! Dispatch Supervisor
//!
//! Owns the single listener attached to a notification source and the
//! registry snapshot it routes with.
//!
//! A listener keeps one queue receiver for its whole life; resubscribing only
//! swaps the registry it reads, so a queued notification is routed with the
//! old or the new registry and never dropped. A second receiver on the same
//! source just wakes the listener task. Detaching routes what is already
//! queued, then closes the queue.
//!
//! ```text
//! Detached --attach--> Attached --detach--> Detached
//!     \                    |
//!      +---- shutdown -----+----> ShutDown (terminal)
//! ```

use parking_lot::Mutex;
use s3local_core::types::{NotificationSource, RawNotification};
use std::sync::Arc;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SupervisorError;
use crate::registry::Registry;
use crate::router::EventRouter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Detached,
    Attached,
    ShutDown,
}

/// State shared by the supervisor and its listener task
struct Listener {
    /// `None` once closed
    queue: Mutex<Option<broadcast::Receiver<RawNotification>>>,
    registry: Mutex<Arc<Registry>>,
    router: EventRouter,
}

impl Listener {
    /// Route everything queued; false once the queue is closed
    fn drain(&self) -> bool {
        let mut queue = self.queue.lock();
        let Some(receiver) = queue.as_mut() else {
            return false;
        };
        if self.route_queued(receiver) {
            true
        } else {
            *queue = None;
            false
        }
    }

    /// Route what is queued now and close the queue
    fn close(&self) {
        if let Some(mut receiver) = self.queue.lock().take() {
            self.route_queued(&mut receiver);
        }
    }

    /// Returns false when the notification stream has closed
    fn route_queued(&self, receiver: &mut broadcast::Receiver<RawNotification>) -> bool {
        loop {
            match receiver.try_recv() {
                Ok(notification) => {
                    let registry = Arc::clone(&self.registry.lock());
                    self.router.route(&notification, &registry);
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Notification listener lagged, skipped {} notification(s)", skipped);
                }
                Err(TryRecvError::Closed) => {
                    debug!("Notification stream closed");
                    return false;
                }
            }
        }
    }
}

/// An active listener; dropping it stops the listener task
struct Attachment {
    listener: Arc<Listener>,
    cancel: CancellationToken,
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Inner {
    /// `None` once shut down
    source: Option<Arc<dyn NotificationSource>>,
    attachment: Option<Attachment>,
}

pub struct DispatchSupervisor {
    router: EventRouter,
    inner: Mutex<Inner>,
}

impl DispatchSupervisor {
    pub fn new(source: Arc<dyn NotificationSource>, router: EventRouter) -> Self {
        Self {
            router,
            inner: Mutex::new(Inner {
                source: Some(source),
                attachment: None,
            }),
        }
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn state(&self) -> SupervisorState {
        let inner = self.inner.lock();
        match (&inner.source, &inner.attachment) {
            (None, _) => SupervisorState::ShutDown,
            (Some(_), Some(_)) => SupervisorState::Attached,
            (Some(_), None) => SupervisorState::Detached,
        }
    }

    /// Snapshot the listener currently routes with
    pub fn registry(&self) -> Option<Arc<Registry>> {
        self.inner
            .lock()
            .attachment
            .as_ref()
            .map(|a| Arc::clone(&a.listener.registry.lock()))
    }

    /// Start listening with `registry`.
    ///
    /// Notifications emitted after this returns are routed.
    pub fn attach(&self, registry: Arc<Registry>) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock();
        let source = inner.source.as_ref().ok_or(SupervisorError::ShutDown)?;
        if inner.attachment.is_some() {
            return Err(SupervisorError::AlreadyAttached);
        }

        let attachment = self.listen(source.as_ref(), registry);
        inner.attachment = Some(attachment);
        info!("Notification listener attached");
        Ok(())
    }

    /// Route with `registry` from now on, attaching first if needed
    pub fn resubscribe(&self, registry: Arc<Registry>) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock();
        let source = inner.source.as_ref().ok_or(SupervisorError::ShutDown)?;

        if let Some(attachment) = &inner.attachment {
            let count = registry.len();
            *attachment.listener.registry.lock() = registry;
            info!("Notification listener resubscribed with {} subscription(s)", count);
            return Ok(());
        }

        let attachment = self.listen(source.as_ref(), registry);
        inner.attachment = Some(attachment);
        info!("Notification listener attached");
        Ok(())
    }

    /// Stop listening; notifications queued before this call are still
    /// routed. A no-op when detached.
    pub fn detach(&self) {
        let attachment = self.inner.lock().attachment.take();
        if let Some(attachment) = attachment {
            attachment.listener.close();
            info!("Notification listener detached");
        }
    }

    /// Detach and release the notification source; the supervisor cannot be
    /// attached again.
    pub fn shutdown(&self) {
        let (attachment, source) = {
            let mut inner = self.inner.lock();
            (inner.attachment.take(), inner.source.take())
        };
        if let Some(attachment) = attachment {
            attachment.listener.close();
        }
        if source.is_some() {
            info!("Dispatch supervisor shut down");
        }
    }

    fn listen(&self, source: &dyn NotificationSource, registry: Arc<Registry>) -> Attachment {
        // subscribe before returning so nothing emitted after attach is missed
        let queue = source.subscribe();
        let wakeups = source.subscribe();

        let listener = Arc::new(Listener {
            queue: Mutex::new(Some(queue)),
            registry: Mutex::new(registry),
            router: self.router.clone(),
        });
        let cancel = CancellationToken::new();

        tokio::spawn(run_listener(Arc::clone(&listener), wakeups, cancel.clone()));

        Attachment { listener, cancel }
    }
}

async fn run_listener(
    listener: Arc<Listener>,
    mut wakeups: broadcast::Receiver<RawNotification>,
    cancel: CancellationToken,
) {
    debug!(
        "Listener started with {} subscription(s)",
        listener.registry.lock().len()
    );

    loop {
        let woken = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            woken = wakeups.recv() => woken,
        };

        // a lagged wakeup receiver only means several notifications are queued
        let closed = matches!(woken, Err(RecvError::Closed));
        if !listener.drain() || closed {
            break;
        }
    }

    debug!("Listener stopped");
}
