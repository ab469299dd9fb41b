#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod artifact_ops;
mod branch_ops;
mod helpers;
mod job_ops;
mod node_ops;
mod plan_ops;
mod project_ops;

pub use helpers::{classify_failure_category, redact_sensitive};
pub use job_ops::LEASE_EXPIRED_ERROR;
