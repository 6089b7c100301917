//! Concurrency tests for the auth pipeline.
//!
//! - `harness.rs`      - MockApi test double and TestHarness
//! - `single_flight.rs` - one renewal call per genuine expiry, waiter accounting
//! - `fan_out.rs`      - every waiter sees the shared renewal result
//! - `retry_budget.rs` - at most one refresh-and-retry per call
//! - `stale_epoch.rs`  - superseded credentials retry without a renewal call
//! - `passthrough.rs`  - non-expiry failures reach the caller untouched
//! - `cancellation.rs` - abandoning a waiter leaves the renewal running
//! - `task_failure.rs` - a crashed renewal task still resolves its waiters
//! - `session_flow.rs` - login, logout, restore, persistence and status

mod retry_budget;
mod session_flow;
