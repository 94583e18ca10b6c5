//! mesosctl.toml parsing; syntax errors point at the offending line and column

use super::MesosCtlConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Read, parse and validate a settings file
pub fn parse_config_toml(path: &Path) -> Result<MesosCtlConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_toml_str(&content)
        .with_context(|| format!("Invalid settings in {}", path.display()))
}

pub fn parse_config_toml_str(content: &str) -> Result<MesosCtlConfig> {
    let config: MesosCtlConfig = toml::from_str(content).map_err(|e| locate_toml_error(&e, content))?;
    config.validate()?;
    Ok(config)
}

/// 1-based line and column of a byte offset
fn position(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map(|tail| tail.chars().count() + 1)
        .unwrap_or(1);
    (line, column)
}

fn locate_toml_error(error: &toml::de::Error, content: &str) -> anyhow::Error {
    let message = error.message();
    let Some(span) = error.span() else {
        return anyhow::anyhow!("TOML parsing error: {}", message);
    };

    let (line, column) = position(content, span.start);
    let source_line = content.lines().nth(line - 1).unwrap_or_default();
    anyhow::anyhow!(
        "TOML parsing error at line {}, column {}:\n{:4} | {}\n     | {}^\n{}",
        line,
        column,
        line,
        source_line,
        " ".repeat(column.saturating_sub(1)),
        message
    )
}

pub fn to_toml(config: &MesosCtlConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize settings to TOML")
}
