//! Ordered application and framework removal.
//!
//! Steps run strictly in sequence and stop at the first error. Nothing is
//! rolled back: a failed teardown leaves the application deleted.

use std::fmt;

use tracing::{debug, info};

use crate::catalog::{CatalogStore, PackageDescriptor, PackageFiles};
use crate::controller::{ControllerApi, FrameworkInfo};
use crate::error::{PackageError, PackageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallStep {
    /// Read package.json of the current version for the framework flag
    ResolveDescriptor,
    /// Fetch the running application; absent means nothing to remove
    LookupApplication,
    DeleteApplication,
    /// Only for framework packages with an active framework of the same name
    TeardownFramework,
}

impl fmt::Display for UninstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UninstallStep::ResolveDescriptor => "resolve-descriptor",
            UninstallStep::LookupApplication => "lookup-application",
            UninstallStep::DeleteApplication => "delete-application",
            UninstallStep::TeardownFramework => "teardown-framework",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub name: String,
    pub app_deleted: bool,
    /// Id of the framework that was torn down, if any
    pub framework_id: Option<String>,
    pub completed: Vec<UninstallStep>,
    pub post_uninstall_notes: Option<String>,
}

impl UninstallReport {
    fn complete(&mut self, step: UninstallStep) {
        debug!(package = %self.name, %step, "Uninstall step completed");
        self.completed.push(step);
    }
}

/// The framework to retire: same name as the package and still active.
/// When several qualify, the last one listed wins.
pub fn select_framework<'a>(frameworks: &'a [FrameworkInfo], name: &str) -> Option<&'a FrameworkInfo> {
    frameworks
        .iter()
        .rev()
        .find(|framework| framework.active && framework.name == name)
}

async fn resolve_descriptor(
    catalog: &CatalogStore,
    files: &PackageFiles,
    name: &str,
) -> PackageResult<PackageDescriptor> {
    let package = catalog.lookup(name)?;
    files
        .load_descriptor(package, &package.current_version)
        .await
}

pub(crate) async fn run(
    controller: &dyn ControllerApi,
    catalog: &CatalogStore,
    files: &PackageFiles,
    name: &str,
) -> PackageResult<UninstallReport> {
    let mut report = UninstallReport {
        name: name.to_string(),
        ..UninstallReport::default()
    };

    let descriptor = resolve_descriptor(catalog, files, name).await?;
    report.post_uninstall_notes = descriptor.post_uninstall_notes.clone();
    report.complete(UninstallStep::ResolveDescriptor);

    match controller.get_app(name).await {
        Ok(_) => report.complete(UninstallStep::LookupApplication),
        Err(err @ PackageError::NotFound { .. }) => {
            info!(package = name, "No running application to remove");
            return Err(err);
        }
        Err(err) => return Err(err),
    }

    controller.delete_app(name).await?;
    report.app_deleted = true;
    report.complete(UninstallStep::DeleteApplication);

    if descriptor.framework {
        let frameworks = controller.list_frameworks().await?;
        match select_framework(&frameworks, name) {
            Some(framework) => {
                controller.teardown_framework(&framework.id).await?;
                report.framework_id = Some(framework.id.clone());
                report.complete(UninstallStep::TeardownFramework);
            }
            None => info!(package = name, "No active framework registered under this name"),
        }
    }

    info!(package = name, steps = report.completed.len(), "Package uninstalled");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::files::DESCRIPTOR_FILE;
    use crate::error::NotFoundKind;
    use crate::render::DeploymentDescriptor;
    use crate::repository::RepositoryLayout;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingController {
        app_exists: bool,
        frameworks: Vec<FrameworkInfo>,
        fail_delete: bool,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingController {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ControllerApi for RecordingController {
        async fn create_app(&self, _descriptor: &DeploymentDescriptor) -> PackageResult<()> {
            self.record("create".to_string());
            Ok(())
        }

        async fn get_app(&self, app_id: &str) -> PackageResult<Value> {
            self.record(format!("get {app_id}"));
            if self.app_exists {
                Ok(json!({"app": {"id": format!("/{app_id}")}}))
            } else {
                Err(PackageError::application_not_found(app_id))
            }
        }

        async fn delete_app(&self, app_id: &str) -> PackageResult<Value> {
            self.record(format!("delete {app_id}"));
            if self.fail_delete {
                return Err(PackageError::OrchestratorRejection {
                    method: "DELETE".to_string(),
                    url: format!("/v2/apps/{app_id}"),
                    status: 409,
                    body: "locked".to_string(),
                });
            }
            Ok(json!({"deploymentId": "d-1"}))
        }

        async fn list_frameworks(&self) -> PackageResult<Vec<FrameworkInfo>> {
            self.record("frameworks".to_string());
            Ok(self.frameworks.clone())
        }

        async fn teardown_framework(&self, framework_id: &str) -> PackageResult<()> {
            self.record(format!("teardown {framework_id}"));
            Ok(())
        }
    }

    fn framework(id: &str, name: &str, active: bool) -> FrameworkInfo {
        FrameworkInfo {
            id: id.to_string(),
            name: name.to_string(),
            active,
        }
    }

    fn fixture(framework: bool) -> (TempDir, CatalogStore, PackageFiles) {
        let temp = TempDir::new().unwrap();
        let layout = RepositoryLayout::new(temp.path(), "version-2.x");
        let dir = layout.package_dir("foo", "0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(DESCRIPTOR_FILE),
            json!({"name": "foo", "framework": framework, "postUninstallNotes": "bye"}).to_string(),
        )
        .unwrap();

        let mut catalog = CatalogStore::new();
        catalog
            .load(r#"{"packages":[{"name":"foo","currentVersion":"1.0.0","versions":{"1.0.0":"0"}}]}"#)
            .unwrap();
        (temp, catalog, PackageFiles::new(layout))
    }

    #[tokio::test]
    async fn missing_application_stops_before_delete() {
        let (_temp, catalog, files) = fixture(true);
        let controller = RecordingController::default();

        let err = run(&controller, &catalog, &files, "foo").await.unwrap_err();

        assert!(err.is_not_found(NotFoundKind::Application));
        assert_eq!(controller.calls(), vec!["get foo"]);
    }

    #[tokio::test]
    async fn framework_is_torn_down_by_id() {
        let (_temp, catalog, files) = fixture(true);
        let controller = RecordingController {
            app_exists: true,
            frameworks: vec![
                framework("old-0001", "foo", false),
                framework("other-7", "bar", true),
                framework("fw-1234", "foo", true),
            ],
            ..RecordingController::default()
        };

        let report = run(&controller, &catalog, &files, "foo").await.unwrap();

        assert_eq!(
            controller.calls(),
            vec!["get foo", "delete foo", "frameworks", "teardown fw-1234"]
        );
        assert_eq!(report.framework_id.as_deref(), Some("fw-1234"));
        assert_eq!(report.post_uninstall_notes.as_deref(), Some("bye"));
        assert_eq!(
            report.completed,
            vec![
                UninstallStep::ResolveDescriptor,
                UninstallStep::LookupApplication,
                UninstallStep::DeleteApplication,
                UninstallStep::TeardownFramework,
            ]
        );
    }

    #[tokio::test]
    async fn plain_application_skips_framework_steps() {
        let (_temp, catalog, files) = fixture(false);
        let controller = RecordingController {
            app_exists: true,
            frameworks: vec![framework("fw-1", "foo", true)],
            ..RecordingController::default()
        };

        let report = run(&controller, &catalog, &files, "foo").await.unwrap();

        assert_eq!(controller.calls(), vec!["get foo", "delete foo"]);
        assert!(report.app_deleted);
        assert!(report.framework_id.is_none());
    }

    #[tokio::test]
    async fn inactive_framework_is_left_alone() {
        let (_temp, catalog, files) = fixture(true);
        let controller = RecordingController {
            app_exists: true,
            frameworks: vec![framework("fw-1", "foo", false)],
            ..RecordingController::default()
        };

        let report = run(&controller, &catalog, &files, "foo").await.unwrap();

        assert_eq!(controller.calls(), vec!["get foo", "delete foo", "frameworks"]);
        assert!(report.framework_id.is_none());
    }

    #[test]
    fn last_active_framework_with_matching_name_is_selected() {
        let frameworks = vec![
            framework("fw-1", "foo", true),
            framework("fw-2", "bar", true),
            framework("fw-3", "foo", true),
            framework("fw-4", "foo", false),
        ];
        assert_eq!(select_framework(&frameworks, "foo").map(|f| f.id.as_str()), Some("fw-3"));
        assert!(select_framework(&frameworks, "baz").is_none());
    }

    #[tokio::test]
    async fn failed_delete_aborts_remaining_steps() {
        let (_temp, catalog, files) = fixture(true);
        let controller = RecordingController {
            app_exists: true,
            fail_delete: true,
            frameworks: vec![framework("fw-1", "foo", true)],
            ..RecordingController::default()
        };

        let err = run(&controller, &catalog, &files, "foo").await.unwrap_err();

        assert!(matches!(err, PackageError::OrchestratorRejection { status: 409, .. }));
        assert_eq!(controller.calls(), vec!["get foo", "delete foo"]);
    }

    #[tokio::test]
    async fn unknown_package_issues_no_requests() {
        let (_temp, catalog, files) = fixture(true);
        let controller = RecordingController::default();

        let err = run(&controller, &catalog, &files, "ghost").await.unwrap_err();

        assert!(err.is_not_found(NotFoundKind::Package));
        assert!(controller.calls().is_empty());
    }
}
