//! Certificate provisioning subsystem.
//!
//! # Data Flow
//! ```text
//! POST /generate-cert
//!     → ProvisionRequest (validated input)
//!     → sequencer.rs (six gated stages against the Compute API)
//!     → ProvisionReport | ProvisionError
//! ```
//!
//! # Design Decisions
//! - No state survives a request; every lookup lists resources afresh
//! - Mutations are wrapped in the retrying mutator and confirmed by the poller
//! - No rollback: partial progress is kept and a repeated call converges

pub mod error;
pub mod sequencer;

pub use error::{ProvisionError, ProvisionResult};
pub use sequencer::{certificate_name, ProvisionReport, ProvisionRequest, Provisioner};
