//! Orchestrator and cluster controller REST surface.
//!
//! Applications live in Marathon; scheduler frameworks are registered with
//! the Mesos master. [`ControllerApi`] is the seam the deployment pipeline
//! talks to; [`ClusterClient`] implements it over HTTP.

pub mod client;
pub mod dns;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PackageResult;
use crate::render::DeploymentDescriptor;

pub use client::ClusterClient;
pub use dns::AgentDnsResolver;

/// A framework as reported by the master's frameworks endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FrameworkList {
    #[serde(default)]
    pub frameworks: Vec<FrameworkInfo>,
}

#[async_trait]
pub trait ControllerApi: Send + Sync {
    /// Create an application; succeeds only on HTTP 201.
    async fn create_app(&self, descriptor: &DeploymentDescriptor) -> PackageResult<()>;

    /// Fetch an application by id; 404 is `NotFound`.
    async fn get_app(&self, app_id: &str) -> PackageResult<Value>;

    async fn delete_app(&self, app_id: &str) -> PackageResult<Value>;

    async fn list_frameworks(&self) -> PackageResult<Vec<FrameworkInfo>>;

    /// Retire a framework by its id.
    async fn teardown_framework(&self, framework_id: &str) -> PackageResult<()>;
}
