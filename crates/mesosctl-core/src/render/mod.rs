//! Deployment template rendering.
//!
//! Templates produce JSON, so substitution must never apply HTML escaping:
//! the environment is configured with auto-escaping disabled for every
//! template. Null and undefined values print as nothing, booleans print
//! as `true`/`false`, arrays and objects print as JSON.

pub mod mustache;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use minijinja::value::{Rest, Value as TemplateValue, ValueKind};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, Output, State, UndefinedBehavior};
use serde::Serialize;
use serde_json::Value;

use crate::error::{PackageError, PackageResult};
use crate::resolver::ConfigView;

/// Parsed output of a rendered deployment template
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeploymentDescriptor(Value);

impl DeploymentDescriptor {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Application id declared by the descriptor, if any
    pub fn app_id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }
}

pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn write_raw(out: &mut Output<'_>, text: &str) -> Result<(), Error> {
    out.write_str(text)
        .map_err(|_| Error::new(ErrorKind::WriteFailure, "failed to write output"))
}

fn format_value(out: &mut Output<'_>, state: &State<'_, '_>, value: &TemplateValue) -> Result<(), Error> {
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => Ok(()),
        ValueKind::Bool => write_raw(out, if value.is_true() { "true" } else { "false" }),
        ValueKind::Seq | ValueKind::Map => {
            let encoded = serde_json::to_string(value)
                .map_err(|err| Error::new(ErrorKind::BadSerialization, err.to_string()))?;
            write_raw(out, &encoded)
        }
        _ => minijinja::escape_formatter(out, state, value),
    }
}

/// Items a section repeats over: list entries, the value itself when
/// truthy, nothing otherwise. Objects always count as truthy.
fn section_items(value: TemplateValue) -> Vec<TemplateValue> {
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => Vec::new(),
        ValueKind::Seq => value
            .try_iter()
            .map(|items| items.collect())
            .unwrap_or_default(),
        ValueKind::Map => vec![value],
        _ if value.is_true() => vec![value],
        _ => Vec::new(),
    }
}

/// First scope holding `name`, innermost first.
fn resolve_in_scopes(name: &str, scopes: Rest<TemplateValue>) -> TemplateValue {
    scopes
        .iter()
        .filter(|scope| scope.kind() == ValueKind::Map)
        .filter_map(|scope| scope.get_attr(name).ok())
        .find(|found| !found.is_undefined())
        .unwrap_or(TemplateValue::UNDEFINED)
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        env.set_formatter(format_value);
        env.add_filter(mustache::SECTION_FILTER, section_items);
        env.add_function(mustache::RESOLVE_FUNCTION, resolve_in_scopes);
        Self { env }
    }

    /// Expand `template` against `view` into raw text.
    pub fn render(&self, template: &str, view: &ConfigView) -> PackageResult<String> {
        let source = mustache::translate(template).map_err(|err| PackageError::TemplateRender {
            message: format!("unsupported template syntax: {}", err),
            rendered: None,
        })?;
        let context = BTreeMap::from([(mustache::ROOT, TemplateValue::from_serialize(view.as_map()))]);
        self.env
            .render_str(&source, context)
            .map_err(|err| PackageError::TemplateRender {
                message: format!("template evaluation failed: {}", err),
                rendered: None,
            })
    }

    /// Render and parse the result as a deployment descriptor.
    pub fn render_descriptor(
        &self,
        template: &str,
        view: &ConfigView,
    ) -> PackageResult<DeploymentDescriptor> {
        let rendered = self.render(template, view)?;
        match serde_json::from_str::<Value>(&rendered) {
            Ok(value) => Ok(DeploymentDescriptor(value)),
            Err(err) => Err(PackageError::TemplateRender {
                message: format!("output is not valid JSON: {}", err),
                rendered: Some(rendered),
            }),
        }
    }
}
