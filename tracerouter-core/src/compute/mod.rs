use async_trait::async_trait;

use crate::{
    error::Result,
    models::{instances::Instance, zones::Zone},
};

pub mod auth;
pub mod client;

/// Read-only queries against a compute provider's inventory.
#[async_trait]
pub trait ComputeInventory: Send + Sync {
    async fn list_zones(&self, project: &str) -> Result<Vec<Zone>>;

    /// An empty zone is an empty list, never an error.
    async fn list_instances(&self, project: &str, zone: &str) -> Result<Vec<Instance>>;
}
