//! HTTP implementation of [`ControllerApi`].

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::dns::Resolve;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{ControllerApi, FrameworkInfo, FrameworkList};
use crate::config::MesosCtlConfig;
use crate::controller::dns::AgentDnsResolver;
use crate::error::{PackageError, PackageResult};
use crate::render::DeploymentDescriptor;

#[derive(Debug, Clone)]
pub struct ClusterClient {
    http: reqwest::Client,
    marathon: Url,
    master: Url,
}

struct RawResponse {
    status: StatusCode,
    body: String,
}

impl ClusterClient {
    /// Client using the system resolver
    pub fn new(marathon: Url, master: Url) -> anyhow::Result<Self> {
        let http = Self::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            marathon,
            master,
        })
    }

    /// Client resolving hostnames through `resolver`
    pub fn with_resolver<R: Resolve + 'static>(
        marathon: Url,
        master: Url,
        resolver: Arc<R>,
    ) -> anyhow::Result<Self> {
        let http = Self::builder()
            .dns_resolver(resolver)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            marathon,
            master,
        })
    }

    /// Endpoints from the settings, names under the cluster TLD resolved via the agents.
    pub fn from_config(config: &MesosCtlConfig) -> anyhow::Result<Self> {
        let resolver = AgentDnsResolver::new(config.agent_addresses()?, config.dns_tld.clone());
        Self::with_resolver(
            config.marathon_base()?,
            config.master_base()?,
            Arc::new(resolver),
        )
    }

    fn builder() -> reqwest::ClientBuilder {
        reqwest::Client::builder().user_agent(concat!("mesosctl/", env!("CARGO_PKG_VERSION")))
    }

    fn endpoint(base: &Url, path: &str) -> String {
        format!("{}{}", base.as_str().trim_end_matches('/'), path)
    }

    fn app_url(&self, app_id: &str) -> String {
        Self::endpoint(
            &self.marathon,
            &format!("/v2/apps/{}", app_id.trim_start_matches('/')),
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        request: RequestBuilder,
    ) -> PackageResult<RawResponse> {
        debug!(%method, url, "Controller request");
        let transport = |source| PackageError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        debug!(%method, url, status = status.as_u16(), "Controller response");
        Ok(RawResponse { status, body })
    }

    fn rejection(method: Method, url: &str, response: RawResponse) -> PackageError {
        PackageError::OrchestratorRejection {
            method: method.to_string(),
            url: url.to_string(),
            status: response.status.as_u16(),
            body: response.body,
        }
    }

    fn parse_body(url: &str, body: &str) -> PackageResult<Value> {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(body)
            .with_context(|| format!("Failed to parse response from {}", url))?)
    }
}

#[async_trait]
impl ControllerApi for ClusterClient {
    async fn create_app(&self, descriptor: &DeploymentDescriptor) -> PackageResult<()> {
        let url = Self::endpoint(&self.marathon, "/v2/apps");
        let request = self.http.post(&url).json(descriptor.as_value());
        let response = self.send(Method::POST, &url, request).await?;
        if response.status == StatusCode::CREATED {
            Ok(())
        } else {
            Err(Self::rejection(Method::POST, &url, response))
        }
    }

    async fn get_app(&self, app_id: &str) -> PackageResult<Value> {
        let url = self.app_url(app_id);
        let request = self.http.get(&url);
        let response = self.send(Method::GET, &url, request).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Err(PackageError::application_not_found(app_id));
        }
        if response.status.is_client_error() || response.status.is_server_error() {
            return Err(Self::rejection(Method::GET, &url, response));
        }
        Self::parse_body(&url, &response.body)
    }

    async fn delete_app(&self, app_id: &str) -> PackageResult<Value> {
        let url = self.app_url(app_id);
        let request = self.http.delete(&url);
        let response = self.send(Method::DELETE, &url, request).await?;
        if response.status.is_client_error() || response.status.is_server_error() {
            return Err(Self::rejection(Method::DELETE, &url, response));
        }
        Self::parse_body(&url, &response.body)
    }

    async fn list_frameworks(&self) -> PackageResult<Vec<FrameworkInfo>> {
        let url = Self::endpoint(&self.master, "/frameworks");
        let request = self.http.get(&url);
        let response = self.send(Method::GET, &url, request).await?;
        if response.status.is_client_error() || response.status.is_server_error() {
            return Err(Self::rejection(Method::GET, &url, response));
        }
        let list: FrameworkList = serde_json::from_str(&response.body)
            .with_context(|| format!("Failed to parse framework list from {}", url))?;
        Ok(list.frameworks)
    }

    async fn teardown_framework(&self, framework_id: &str) -> PackageResult<()> {
        let url = Self::endpoint(&self.master, "/master/teardown");
        // The master reads the id from a form field, not a JSON body
        let request = self.http.post(&url).form(&[("frameworkId", framework_id)]);
        let response = self.send(Method::POST, &url, request).await?;
        if response.status.is_client_error() || response.status.is_server_error() {
            return Err(Self::rejection(Method::POST, &url, response));
        }
        Ok(())
    }
}
