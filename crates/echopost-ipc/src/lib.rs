//! Producer-facing ingestion over a Unix domain socket.
//!
//! This crate provides:
//! - a JSON-RPC-like NDJSON protocol (`health`, `log.send`)
//! - [`IngestServer`], which writes accepted records into the queue
//! - [`IngestClient`], used by producers and the `echopost-send` tool

mod client;
mod error;
mod protocol;
mod server;

pub use client::IngestClient;
pub use error::{IpcError, IpcResult};
pub use protocol::{
    error_codes, ErrorInfo, LogSendParams, LogSendResult, Method, Request, Response,
    MESSAGE_STORED, MESSAGE_WRITE_FAILED,
};
pub use server::IngestServer;
