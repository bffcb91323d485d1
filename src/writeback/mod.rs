//! Persisting analysis results into the destination record store.

pub mod client;
pub mod plan;

pub use client::{AppCredentials, BitableClient};
pub use plan::{build_request, WriteContent, WriteMethod, WriteMode, WriteRequest, WriteTarget, WriteTargetConfig};
