//! s3local Event Dispatch
//!
//! Turns notification declarations into an immutable subscription registry,
//! routes storage notifications to matching handlers and supervises the
//! listener attached to the storage emulator.
//!
//! - [`rules`]: key filters and event-type patterns
//! - [`registry`]: declaration → subscription compilation
//! - [`router`]: matching and fire-and-forget dispatch
//! - [`supervisor`]: listener lifecycle
//! - [`invoke`] / [`resolver`]: the handler invocation boundary

pub mod error;
pub mod invoke;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod rules;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use error::{ConfigurationError, SupervisorError};
pub use invoke::{DispatchOutcome, HandlerInvoker, HandlerRef, HandlerTarget, LocalInvoker};
pub use registry::{build_registry, BuildReport, Registry, RegistryBuilder, Subscription};
pub use resolver::{FunctionTable, HandlerResolver};
pub use router::{DispatchReport, EventRouter, PendingDispatch};
pub use rules::{event_matches, KeyMatcher};
pub use supervisor::{DispatchSupervisor, SupervisorState};
