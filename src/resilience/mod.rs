//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Mutation against the provider:
//!     → retries.rs (re-attempt on any error, fixed delay)
//!     → returns an operation handle
//!     → polling.rs (poll the operation until DONE, error, or budget exhausted)
//! ```
//!
//! # Design Decisions
//! - Both helpers are generic over the action/probe; no provider types leak in
//! - Budgets are attempt counts, not wall-clock deadlines
//! - Flat delays; jitter is opt-in via configuration

pub mod backoff;
pub mod polling;
pub mod retries;

pub use polling::{await_completion, poll_until, OperationStatus, PollError, PollPolicy, Progress};
pub use retries::{retry, RetryPolicy};
