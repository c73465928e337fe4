//! Scenario tests for the replay engine and the lifecycle controller.
//!
//! - `harness.rs`       - scripted in-memory remote and a temp-dir agent
//! - `classification.rs` - response status decides delete vs retain
//! - `ordering.rs`      - key-order replay and abort-at-first-transient
//! - `crash_safety.rs`  - at-least-once across failed commits and restarts
//! - `termination.rs`   - accepting/draining/exit transitions and shutdown

mod classification;
