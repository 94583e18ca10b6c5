//! Interactive prompts for package installation.
//!
//! Used when `package install` runs with `-i`: pick a version from the
//! catalog, review the rendered plan and its notes, then confirm.

use std::io::{self, Write};

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};

use mesosctl_core::commands::InstallPlan;
use mesosctl_core::resolver::ConfigSource;

pub struct InstallPrompt<W: Write = io::Stdout> {
    /// Skip the confirmation prompt
    yes: bool,
    writer: W,
    theme: ColorfulTheme,
}

impl InstallPrompt<io::Stdout> {
    pub fn new(yes: bool) -> Self {
        Self {
            yes,
            writer: io::stdout(),
            theme: ColorfulTheme::default(),
        }
    }
}

impl<W: Write> InstallPrompt<W> {
    #[cfg(test)]
    pub fn with_writer(yes: bool, writer: W) -> Self {
        Self {
            yes,
            writer,
            theme: ColorfulTheme::default(),
        }
    }

    /// Choose among `versions`, preselecting `current`.
    pub fn select_version(&self, name: &str, versions: &[String], current: &str) -> Result<String> {
        match versions {
            [] => Ok(current.to_string()),
            [only] => Ok(only.clone()),
            _ => {
                let default = versions.iter().position(|v| v == current).unwrap_or(0);
                let selection = Select::with_theme(&self.theme)
                    .with_prompt(format!("Version of {}", name))
                    .items(versions)
                    .default(default)
                    .interact()?;
                Ok(versions[selection].clone())
            }
        }
    }

    /// Print the plan summary and pre-install notes, then ask to proceed.
    pub fn confirm(&mut self, plan: &InstallPlan) -> Result<bool> {
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", style("  Install Summary").bold().cyan())?;
        writeln!(self.writer, "  ───────────────────────────")?;
        writeln!(self.writer, "  Package:  {}", style(&plan.name).green())?;
        writeln!(self.writer, "  Version:  {}", style(&plan.version).green())?;
        if let Some(app_id) = plan.descriptor.app_id() {
            writeln!(self.writer, "  App id:   {}", style(app_id).green())?;
        }
        let source = match plan.source {
            ConfigSource::Defaults => "package defaults",
            ConfigSource::Override => "options file",
        };
        writeln!(self.writer, "  Config:   {}", style(source).green())?;

        if let Some(notes) = &plan.pre_install_notes {
            writeln!(self.writer)?;
            for line in notes.lines() {
                writeln!(self.writer, "  {}", style(line).yellow())?;
            }
        }
        writeln!(self.writer)?;

        if self.yes {
            return Ok(true);
        }

        let confirmed = Confirm::with_theme(&self.theme)
            .with_prompt("Continue installing?")
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}
