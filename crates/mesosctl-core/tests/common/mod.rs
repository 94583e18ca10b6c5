//! On-disk repository fixture shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use mesosctl_core::commands::CommandContext;
use mesosctl_core::config::{ConfigStore, MesosCtlConfig};
use mesosctl_core::controller::ClusterClient;
use mesosctl_core::repository::RepositoryLayout;
use serde_json::json;
use tempfile::TempDir;
use url::Url;

pub const VERSION: &str = "version-2.x";

pub const INDEX: &str = r#"{
    "version": "2.0.0",
    "packages": [
        {
            "name": "kafka",
            "description": "Apache Kafka running on DC/OS",
            "tags": ["message", "broker", "pubsub"],
            "currentVersion": "1.1.9",
            "versions": {"1.1.8": "0", "1.1.9": "1"},
            "framework": true
        },
        {
            "name": "marathon-lb",
            "description": "HAProxy configured from Marathon state.\nLoad balancer for services.",
            "tags": ["loadbalancer", "proxy"],
            "currentVersion": "1.4.1",
            "versions": {"1.4.1": "0"}
        },
        {
            "name": "messagebus",
            "description": "A small broker for message fan-out",
            "tags": ["queue"],
            "currentVersion": "0.1.0",
            "versions": {"0.1.0": "0"}
        }
    ]
}"#;

pub const KAFKA_TEMPLATE: &str = r#"{
  "id": "{{service.name}}",
  "instances": 1,
  "cpus": {{brokers.cpus}},
  "env": {"BROKER_COUNT": "{{brokers.count}}", "USER": "{{service.user}}"},
  "ports": {{brokers.ports}},
  "container": {"docker": {"image": "{{resource.assets.container.docker.broker}}"}},
  "labels": {"DCOS_PACKAGE_FRAMEWORK_NAME": "{{service.name}}"}
}
"#;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

fn write_kafka(layout: &RepositoryLayout, revision: &str, framework: bool) {
    let dir = layout.package_dir("kafka", revision);
    let schema = json!({
        "type": "object",
        "properties": {
            "service": {
                "type": "object",
                "properties": {
                    "name": {"type": "string", "default": "kafka"},
                    "user": {"type": "string"}
                },
                "required": ["name"]
            },
            "brokers": {
                "type": "object",
                "properties": {
                    "count": {"type": "integer", "default": 3},
                    "cpus": {"type": "number", "default": 1.5},
                    "ports": {"type": "array", "items": {"type": "integer"}, "default": []}
                }
            }
        },
        "required": ["service"]
    });
    write(&dir, "config.json", &schema.to_string());
    write(
        &dir,
        "package.json",
        &json!({
            "name": "kafka",
            "version": "1.1.9",
            "framework": framework,
            "preInstallNotes": "Kafka needs three agents.",
            "postInstallNotes": "Kafka is starting.",
            "postUninstallNotes": "Remove the ZooKeeper node by hand."
        })
        .to_string(),
    );
    write(
        &dir,
        "resource.json",
        &json!({"assets": {"container": {"docker": {"broker": "mesosphere/kafka:1.1.9"}}}})
            .to_string(),
    );
    write(&dir, "marathon.json.mustache", KAFKA_TEMPLATE);
}

/// Extracted repository with kafka fully populated on disk.
pub fn repository(storage: &Path) -> RepositoryLayout {
    let layout = RepositoryLayout::new(storage, VERSION);
    write(layout.index_path().parent().unwrap(), "index.json", INDEX);
    write_kafka(&layout, "0", true);
    write_kafka(&layout, "1", true);
    layout
}

pub struct Fixture {
    pub temp: TempDir,
    pub store: ConfigStore,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        repository(temp.path());
        let store = ConfigStore::new(temp.path().join("mesosctl.toml"));
        Self { temp, store }
    }

    /// Without an extracted repository
    pub fn empty() -> Self {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("mesosctl.toml"));
        Self { temp, store }
    }

    /// Context whose marathon and master both point at `base_url`.
    pub fn context(&self, base_url: &str) -> CommandContext {
        self.context_with_store(base_url, self.store.clone())
    }

    pub fn context_with_store(&self, base_url: &str, store: ConfigStore) -> CommandContext {
        let config = MesosCtlConfig {
            storage_dir: self.temp.path().to_path_buf(),
            marathon_url: base_url.to_string(),
            master_url: base_url.to_string(),
            ..MesosCtlConfig::default()
        };
        let base = Url::parse(base_url).unwrap();
        let client = ClusterClient::new(base.clone(), base).unwrap();
        CommandContext::new(store, config, Arc::new(client))
    }
}
