//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Compute client → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal or trigger → Stop accepting → Finish in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - In-flight provisioning flows are allowed to finish on shutdown

pub mod shutdown;
pub mod signals;

pub use shutdown::{shutdown_signal, Shutdown};
