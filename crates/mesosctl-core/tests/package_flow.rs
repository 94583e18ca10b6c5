//! Install, uninstall and describe against an on-disk repository and a mock cluster.

mod common;

use httpmock::Method::{DELETE, GET, POST};
use httpmock::MockServer;
use mesosctl_core::commands::{DescribeOptions, InstallOptions, PackageCommand};
use mesosctl_core::config::ConfigStore;
use mesosctl_core::deploy::UninstallStep;
use mesosctl_core::error::{NotFoundKind, PackageError};
use serde_json::json;

use common::Fixture;

fn default_descriptor() -> serde_json::Value {
    json!({
        "id": "kafka",
        "instances": 1,
        "cpus": 1.5,
        "env": {"BROKER_COUNT": "3", "USER": ""},
        "ports": [],
        "container": {"docker": {"image": "mesosphere/kafka:1.1.9"}},
        "labels": {"DCOS_PACKAGE_FRAMEWORK_NAME": "kafka"}
    })
}

#[tokio::test]
async fn install_submits_rendered_defaults_and_records_ledger() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/apps")
            .json_body(default_descriptor());
        then.status(201).json_body(json!({"id": "/kafka"}));
    });

    let fixture = Fixture::new();
    let mut ctx = fixture.context(&server.base_url());
    let report = PackageCommand::new(&mut ctx)
        .install(&InstallOptions::new("kafka"))
        .await
        .unwrap();

    create.assert_calls(1);
    assert_eq!(report.version, "1.1.9");
    assert_eq!(report.app_id.as_deref(), Some("kafka"));
    assert_eq!(report.pre_install_notes.as_deref(), Some("Kafka needs three agents."));
    assert_eq!(report.post_install_notes.as_deref(), Some("Kafka is starting."));
    assert!(report.ledger_error.is_none());

    let saved = fixture.store.load().unwrap();
    assert_eq!(saved.installed_package_names(), vec!["kafka"]);
    assert_eq!(saved.installed_packages[0].version, "1.1.9");
}

#[tokio::test]
async fn ledger_write_failure_still_reports_created_application() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path("/v2/apps");
        then.status(201);
    });

    let fixture = Fixture::new();
    // a regular file where the settings directory should be
    let blocker = fixture.temp.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let store = ConfigStore::new(blocker.join("mesosctl.toml"));
    let mut ctx = fixture.context_with_store(&server.base_url(), store);

    let report = PackageCommand::new(&mut ctx)
        .install(&InstallOptions::new("kafka"))
        .await
        .unwrap();

    create.assert_calls(1);
    assert_eq!(report.app_id.as_deref(), Some("kafka"));
    assert!(report.ledger_error.is_some());
    assert_eq!(ctx.config().installed_package_names(), vec!["kafka"]);
}

#[tokio::test]
async fn install_with_override_uses_document_as_is() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path("/v2/apps").json_body(json!({
            "id": "kafka-prod",
            "instances": 1,
            "cpus": 2,
            "env": {"BROKER_COUNT": "5", "USER": ""},
            "ports": [9092, 9093],
            "container": {"docker": {"image": "mesosphere/kafka:1.1.9"}},
            "labels": {"DCOS_PACKAGE_FRAMEWORK_NAME": "kafka-prod"}
        }));
        then.status(201);
    });

    let fixture = Fixture::new();
    let mut ctx = fixture.context(&server.base_url());
    let options = InstallOptions::new("kafka")
        .with_version("1.1.8")
        .with_config(json!({
            "service": {"name": "kafka-prod"},
            "brokers": {"count": 5, "cpus": 2, "ports": [9092, 9093]}
        }));
    let report = PackageCommand::new(&mut ctx).install(&options).await.unwrap();

    create.assert_calls(1);
    assert_eq!(report.version, "1.1.8");
}

#[tokio::test]
async fn rejected_install_keeps_body_and_ledger_untouched() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path("/v2/apps");
        then.status(409)
            .body(r#"{"message":"An app with id [/kafka] already exists."}"#);
    });

    let fixture = Fixture::new();
    let mut ctx = fixture.context(&server.base_url());
    let err = PackageCommand::new(&mut ctx)
        .install(&InstallOptions::new("kafka"))
        .await
        .unwrap_err();

    create.assert_calls(1);
    match err {
        PackageError::OrchestratorRejection { status, body, .. } => {
            assert_eq!(status, 409);
            assert_eq!(body, r#"{"message":"An app with id [/kafka] already exists."}"#);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(fixture.store.load().unwrap().installed_packages.is_empty());
    assert!(ctx.config().installed_packages.is_empty());
}

#[tokio::test]
async fn invalid_override_never_reaches_the_cluster() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path("/v2/apps");
        then.status(201);
    });

    let fixture = Fixture::new();
    let mut ctx = fixture.context(&server.base_url());
    let options = InstallOptions::new("kafka").with_config(json!({"brokers": {"count": "many"}}));
    let err = PackageCommand::new(&mut ctx).install(&options).await.unwrap_err();

    let violations = err.violations().expect("schema violations");
    assert!(violations.len() >= 2);
    assert!(violations.iter().any(|v| v.path == "/brokers/count"));
    create.assert_calls(0);
}

#[tokio::test]
async fn unknown_package_and_version_are_not_found() {
    let server = MockServer::start();
    let fixture = Fixture::new();
    let mut ctx = fixture.context(&server.base_url());
    let mut cmd = PackageCommand::new(&mut ctx);

    let err = cmd.install(&InstallOptions::new("spark")).await.unwrap_err();
    assert!(err.is_not_found(NotFoundKind::Package));

    let err = cmd
        .install(&InstallOptions::new("kafka").with_version("0.9.0"))
        .await
        .unwrap_err();
    assert!(err.is_not_found(NotFoundKind::Version));
}

#[tokio::test]
async fn commands_require_downloaded_repository() {
    let server = MockServer::start();
    let fixture = Fixture::empty();
    let mut ctx = fixture.context(&server.base_url());

    let err = PackageCommand::new(&mut ctx).search("kafka").await.unwrap_err();
    assert!(matches!(err, PackageError::RepositoryMissing { .. }));
}

#[tokio::test]
async fn uninstall_tears_down_active_framework_by_id() {
    let server = MockServer::start();
    let get = server.mock(|when, then| {
        when.method(GET).path("/v2/apps/kafka");
        then.status(200).json_body(json!({"app": {"id": "/kafka"}}));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/v2/apps/kafka");
        then.status(200).json_body(json!({"version": "2016-08-01T00:00:00Z", "deploymentId": "d1"}));
    });
    let frameworks = server.mock(|when, then| {
        when.method(GET).path("/frameworks");
        then.status(200).json_body(json!({
            "frameworks": [
                {"id": "5b1d-0001", "name": "kafka", "active": false},
                {"id": "5b1d-0002", "name": "kafka", "active": true},
                {"id": "5b1d-0003", "name": "marathon", "active": true}
            ]
        }));
    });
    let teardown = server.mock(|when, then| {
        when.method(POST)
            .path("/master/teardown")
            .body("frameworkId=5b1d-0002");
        then.status(200);
    });

    let fixture = Fixture::new();
    let mut ctx = fixture.context(&server.base_url());
    let report = PackageCommand::new(&mut ctx).uninstall("kafka").await.unwrap();

    get.assert_calls(1);
    delete.assert_calls(1);
    frameworks.assert_calls(1);
    teardown.assert_calls(1);
    assert_eq!(report.framework_id.as_deref(), Some("5b1d-0002"));
    assert_eq!(report.completed.last(), Some(&UninstallStep::TeardownFramework));
    assert_eq!(
        report.post_uninstall_notes.as_deref(),
        Some("Remove the ZooKeeper node by hand.")
    );
}

#[tokio::test]
async fn uninstall_of_absent_application_issues_no_delete() {
    let server = MockServer::start();
    let get = server.mock(|when, then| {
        when.method(GET).path("/v2/apps/kafka");
        then.status(404)
            .json_body(json!({"message": "App '/kafka' does not exist"}));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE);
        then.status(200);
    });
    let teardown = server.mock(|when, then| {
        when.method(POST).path("/master/teardown");
        then.status(200);
    });

    let fixture = Fixture::new();
    let mut ctx = fixture.context(&server.base_url());
    let err = PackageCommand::new(&mut ctx).uninstall("kafka").await.unwrap_err();

    assert!(err.is_not_found(NotFoundKind::Application));
    get.assert_calls(1);
    delete.assert_calls(0);
    teardown.assert_calls(0);
}

#[tokio::test]
async fn describe_lists_versions_and_renders_without_submitting() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path("/v2/apps");
        then.status(201);
    });

    let fixture = Fixture::new();
    let mut ctx = fixture.context(&server.base_url());
    let report = PackageCommand::new(&mut ctx)
        .describe(&DescribeOptions {
            name: "kafka".to_string(),
            package_versions: true,
            render: true,
            ..DescribeOptions::default()
        })
        .await
        .unwrap();

    create.assert_calls(0);
    assert_eq!(report.current_version, "1.1.9");
    assert_eq!(report.tags, vec!["broker", "message", "pubsub"]);
    assert_eq!(report.versions, Some(vec!["1.1.8".to_string(), "1.1.9".to_string()]));
    assert_eq!(report.rendered.unwrap().into_value(), default_descriptor());
}

#[tokio::test]
async fn search_flattens_descriptions() {
    let server = MockServer::start();
    let fixture = Fixture::new();
    let mut ctx = fixture.context(&server.base_url());

    let hits = PackageCommand::new(&mut ctx).search("load").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "marathon-lb");
    assert_eq!(
        hits[0].description,
        "HAProxy configured from Marathon state. Load balancer for services."
    );
}
