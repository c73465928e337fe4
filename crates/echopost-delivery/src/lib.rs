//! Delivery of buffered records to the remote ingestion server.
//!
//! [`ReplayEngine::run_pass`] walks a queue snapshot in key order, sends each
//! record through a [`RemoteClient`], classifies the response with
//! [`classify_status`], and removes every resolved record in one batch at the
//! end of the pass. Resolution happens before deletion commits, so a crash in
//! between replays those records again: delivery is at-least-once.

mod classify;
mod error;
mod outcome;
mod remote;
mod replay;

pub use classify::{classify_status, Outcome};
pub use error::{DeliveryError, DeliveryResult};
pub use outcome::OutcomeLogs;
pub use remote::{DeliveryResponse, HttpRemote, RemoteClient, API_KEY_HEADER};
pub use replay::{PassReport, ReplayEngine};
