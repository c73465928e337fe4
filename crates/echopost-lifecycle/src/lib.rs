//! Lifecycle of the echopost agent.
//!
//! The [`Controller`] owns the [`RuntimeContext`] and is the only writer of
//! lifecycle state. Each iteration checks the remote's health:
//!
//! - unhealthy: hold the [`AcceptingFlag`], flush, sleep the short cadence
//! - healthy with a backlog: release the flag, run one replay pass
//! - healthy and empty: exit
//!
//! The [`BackgroundFlusher`] runs beside it and only ever flushes the queue.

mod context;
mod controller;
mod error;
mod flag;
mod flusher;

pub use context::RuntimeContext;
pub use controller::{Controller, ExitReason, LifecycleState, Step};
pub use error::{LifecycleError, LifecycleResult};
pub use flag::AcceptingFlag;
pub use flusher::BackgroundFlusher;

#[cfg(test)]
mod tests;
