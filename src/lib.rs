//! Managed TLS certificate provisioner for Compute Engine HTTPS load balancers.

pub mod compute;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod provisioning;
pub mod resilience;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use provisioning::{ProvisionError, Provisioner};
