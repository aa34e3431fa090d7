use async_trait::async_trait;
use tracerouter_core::{new_client, ComputeClient, Config};

use crate::{app::Backend, error::Error};

pub mod project;
pub mod ssh;

/// The real environment: gcloud for the default project and the compute
/// REST API for the inventory.
pub struct GcloudBackend {
    config: Config,
}

impl GcloudBackend {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Backend for GcloudBackend {
    type Inventory = ComputeClient;

    async fn default_project(&self) -> Result<String, Error> {
        project::default_project(&self.config.gcloud_bin).await
    }

    async fn connect(&self) -> Result<ComputeClient, Error> {
        Ok(new_client(&self.config).await?)
    }
}
