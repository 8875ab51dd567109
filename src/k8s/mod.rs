//! Kubernetes integration for the gateway test clusters
//!
//! Everything here goes through the kubectl CLI against kind clusters:
//! - Selecting the cluster context of a gateway
//! - Discovering pods by name prefix or app label
//! - Waiting for pods to become Running, with a bounded budget

mod client;
mod types;

pub use client::KubectlClient;
pub use types::{ObjectList, PodPhase};
