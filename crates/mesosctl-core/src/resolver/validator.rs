//! On-demand JSON Schema compilation with a content-addressed cache.
//!
//! Package schemas are only known once a package and version have been
//! selected, so validators are compiled at call time. Compilation may
//! fetch remote `$ref` targets and therefore runs on the blocking pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::debug;

use crate::error::{PackageError, PackageResult, SchemaViolation};

/// Compiled validators keyed by blake3 hash of the schema's JSON encoding
#[derive(Default)]
pub struct SchemaValidatorCache {
    compiled: Mutex<HashMap<String, Arc<JSONSchema>>>,
}

impl std::fmt::Debug for SchemaValidatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidatorCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// Cache key for a schema document
pub fn schema_key(schema: &Value) -> anyhow::Result<String> {
    // serde_json maps are key-ordered, so equal documents encode identically
    let encoded = serde_json::to_vec(schema).context("Failed to encode schema")?;
    Ok(blake3::hash(&encoded).to_hex().to_string())
}

impl SchemaValidatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<JSONSchema>>> {
        self.compiled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Compile `schema`, reusing an earlier compilation of identical content.
    pub async fn compile(&self, schema: &Value) -> PackageResult<Arc<JSONSchema>> {
        let key = schema_key(schema)?;
        if let Some(hit) = self.entries().get(&key) {
            debug!(key = %&key[..16], "Schema validator cache hit");
            return Ok(Arc::clone(hit));
        }

        let owned = schema.clone();
        let compiled = tokio::task::spawn_blocking(move || {
            JSONSchema::compile(&owned)
                .map(Arc::new)
                .map_err(|err| err.to_string())
        })
        .await
        .context("Schema compilation task failed")?
        .map_err(PackageError::InvalidSchema)?;

        debug!(key = %&key[..16], "Schema validator compiled");
        self.entries().insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Validate `document` against `schema`.
    ///
    /// Violations are reported in the order the validator produces them.
    pub async fn validate(&self, schema: &Value, document: &Value) -> PackageResult<()> {
        let validator = self.compile(schema).await?;
        let violations = collect_violations(&validator, document);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(PackageError::SchemaValidation(violations))
        }
    }
}

fn collect_violations(validator: &JSONSchema, document: &Value) -> Vec<SchemaViolation> {
    match validator.validate(document) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|err| SchemaViolation {
                path: err.instance_path.to_string(),
                message: err.to_string(),
            })
            .collect(),
    }
}
