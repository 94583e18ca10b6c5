//! Configuration resolution for a selected package version.
//!
//! The configuration view handed to the template renderer is either the
//! defaults declared by the package's configuration schema, or a complete
//! user-supplied document validated against that schema. The two are never
//! merged: an override replaces the defaults wholesale.

pub mod validator;

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PackageError, PackageResult};

pub use validator::{SchemaValidatorCache, schema_key};

/// Key under which the resource descriptor is injected
pub const RESOURCE_KEY: &str = "resource";

/// Rendered in place of an empty array default
pub const EMPTY_ARRAY_PLACEHOLDER: &str = "[]";

/// Configuration values for one render, shaped like the schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigView(Map<String, Value>);

impl ConfigView {
    /// Wrap a user-supplied document; it must be a JSON object.
    pub fn from_document(document: Value) -> PackageResult<Self> {
        match document {
            Value::Object(map) => Ok(Self(map)),
            other => Err(PackageError::SchemaValidation(vec![
                crate::error::SchemaViolation {
                    path: String::new(),
                    message: format!("configuration must be an object, got {}", other),
                },
            ])),
        }
    }

    /// Insert the resource descriptor verbatim under `resource`.
    pub fn with_resource(mut self, resource: Value) -> Self {
        self.0.insert(RESOURCE_KEY.to_string(), resource);
        self
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Dotted paths of every leaf, excluding the injected resource subtree
    pub fn leaf_paths(&self) -> BTreeSet<String> {
        let mut paths = BTreeSet::new();
        for (key, value) in &self.0 {
            if key == RESOURCE_KEY {
                continue;
            }
            collect_leaves(key, value, &mut paths);
        }
        paths
    }
}

fn collect_leaves(prefix: &str, value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaves(&format!("{}.{}", prefix, key), child, out);
            }
        }
        _ => {
            out.insert(prefix.to_string());
        }
    }
}

fn properties(node: &Value) -> Option<&Map<String, Value>> {
    node.get("properties").and_then(Value::as_object)
}

/// Empty array defaults become the literal string `"[]"` so the template
/// engine prints a placeholder instead of collapsing the value.
fn normalize_default(node: &Value) -> Value {
    match node.get("default") {
        Some(Value::Array(items)) if items.is_empty() => {
            Value::String(EMPTY_ARRAY_PLACEHOLDER.to_string())
        }
        Some(value) => value.clone(),
        None => Value::Null,
    }
}

/// Extract default values from a configuration schema.
///
/// Walks group → property and, where a property declares its own
/// `properties`, property → sub-property. Leaves without a `default`
/// are present with a null value. Groups without properties are omitted.
pub fn compute_defaults(schema: &Value) -> ConfigView {
    let mut view = Map::new();
    let Some(groups) = properties(schema) else {
        return ConfigView(view);
    };

    for (group_name, group) in groups {
        let Some(group_properties) = properties(group) else {
            if group.get("default").is_some() {
                view.insert(group_name.clone(), normalize_default(group));
            }
            continue;
        };

        let mut group_view = Map::new();
        for (property_name, property) in group_properties {
            match properties(property) {
                Some(sub_properties) => {
                    let sub_view: Map<String, Value> = sub_properties
                        .iter()
                        .map(|(sub_name, sub)| (sub_name.clone(), normalize_default(sub)))
                        .collect();
                    if !sub_view.is_empty() {
                        group_view.insert(property_name.clone(), Value::Object(sub_view));
                    }
                }
                None => {
                    group_view.insert(property_name.clone(), normalize_default(property));
                }
            }
        }

        if !group_view.is_empty() {
            view.insert(group_name.clone(), Value::Object(group_view));
        }
    }

    ConfigView(view)
}

/// Where a resolved configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    Override,
}

/// A configuration view together with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub view: ConfigView,
    pub source: ConfigSource,
}

#[derive(Debug, Default)]
pub struct ConfigResolver {
    validators: SchemaValidatorCache,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validators(&self) -> &SchemaValidatorCache {
        &self.validators
    }

    pub fn compute_defaults(&self, schema: &Value) -> ConfigView {
        compute_defaults(schema)
    }

    pub async fn validate(&self, schema: &Value, document: &Value) -> PackageResult<()> {
        self.validators.validate(schema, document).await
    }

    /// Pick the configuration for a render.
    ///
    /// An override is the complete configuration: it is validated as-is and
    /// never merged with defaults. Without an override the schema defaults
    /// are used and not validated again.
    pub async fn resolve(
        &self,
        schema: &Value,
        override_document: Option<Value>,
    ) -> PackageResult<ResolvedConfig> {
        match override_document {
            Some(document) => {
                self.validate(schema, &document).await?;
                debug!("Using validated configuration override");
                Ok(ResolvedConfig {
                    view: ConfigView::from_document(document)?,
                    source: ConfigSource::Override,
                })
            }
            None => {
                debug!("Using schema default configuration");
                Ok(ResolvedConfig {
                    view: compute_defaults(schema),
                    source: ConfigSource::Defaults,
                })
            }
        }
    }
}
