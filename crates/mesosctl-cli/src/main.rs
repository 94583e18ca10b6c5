//! mesosctl - package manager for Marathon on Mesos
//!
//! Usage:
//!   mesosctl repository install        # Mirror the package repository
//!   mesosctl package search kafka      # Find packages
//!   mesosctl package install kafka     # Deploy a package
//!   mesosctl package uninstall kafka   # Remove it again

mod interactive;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mesosctl_core::commands::{
    CommandContext, DescribeOptions, InstallOptions, PackageCommand, RepositoryCommand,
    RepositoryReport, load_options_file,
};
use mesosctl_core::config::ConfigStore;

use crate::interactive::InstallPrompt;

#[derive(Parser)]
#[command(name = "mesosctl")]
#[command(about = "Package manager for Marathon on Mesos", long_about = None)]
struct Cli {
    /// Settings file (defaults to <storage>/mesosctl.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the local package repository mirror
    Repository(RepositoryArgs),

    /// Search, describe, install and uninstall packages
    Package(PackageArgs),

    /// Show the active settings and the installed packages ledger
    Config {
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
    /// No output on success
    Quiet,
}

#[derive(Args)]
struct RepositoryArgs {
    #[command(subcommand)]
    command: RepositorySubcommand,

    #[arg(short, long, default_value = "table", global = true)]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum RepositorySubcommand {
    /// Download the repository unless it is already present
    Install,
    /// Download the repository again and reload the catalog
    Update,
    /// Report whether the repository is present
    Check,
    /// Delete the extracted repository
    Remove,
}

#[derive(Args)]
struct PackageArgs {
    #[command(subcommand)]
    command: PackageSubcommand,

    #[arg(short, long, default_value = "table", global = true)]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum PackageSubcommand {
    /// Render and deploy a package
    Install(InstallArgs),

    /// Remove a package's application and framework
    #[command(alias = "rm")]
    Uninstall {
        /// Package name
        name: String,
    },

    /// Show package details
    Describe {
        /// Package name
        name: String,
        /// List every available version
        #[arg(long)]
        package_versions: bool,
        /// Print the rendered deployment descriptor without installing
        #[arg(long)]
        render: bool,
        /// Version to render (defaults to the current version)
        #[arg(long)]
        package_version: Option<String>,
        /// JSON file with the complete package configuration
        #[arg(long, value_name = "FILE")]
        options: Option<PathBuf>,
    },

    /// Search the catalog by name, description and tags
    Search {
        /// Search terms
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// List package names
    List,
}

#[derive(Args)]
struct InstallArgs {
    /// Package name
    name: String,
    /// Version to install (defaults to the current version)
    #[arg(long)]
    package_version: Option<String>,
    /// JSON file with the complete package configuration
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,
    /// Interactive mode - choose a version and confirm before submitting
    #[arg(short, long)]
    interactive: bool,
    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mesosctl=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_cli(cli))
}

async fn run_cli(cli: Cli) -> Result<()> {
    let store = match cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::from_default_location(),
    };
    let mut ctx = CommandContext::from_store(store)?;

    match cli.command {
        Commands::Repository(args) => run_repository(&mut ctx, args).await,
        Commands::Package(args) => run_package(&mut ctx, args).await,
        Commands::Config { format } => run_config(&ctx, format),
    }
}

async fn run_repository(ctx: &mut CommandContext, args: RepositoryArgs) -> Result<()> {
    let mut cmd = RepositoryCommand::new(ctx);
    let report = match args.command {
        RepositorySubcommand::Install => cmd.install().await?,
        RepositorySubcommand::Update => cmd.update().await?,
        RepositorySubcommand::Check => cmd.check(),
        RepositorySubcommand::Remove => cmd.remove()?,
    };
    print_repository_report(&report, args.format)
}

fn print_repository_report(report: &RepositoryReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if report.removed {
                println!("✓ Removed repository '{}'", report.version);
            } else if report.downloaded {
                println!(
                    "✓ Downloaded repository '{}' ({} packages)",
                    report.version, report.packages
                );
            } else if report.present {
                println!("• Repository '{}' is present", report.version);
            } else {
                println!("✗ Repository '{}' is not installed", report.version);
            }
            println!("  {}", report.path.display());
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "version": report.version,
                "path": report.path,
                "present": report.present,
                "downloaded": report.downloaded,
                "removed": report.removed,
                "packages": report.packages,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }
    Ok(())
}

async fn run_package(ctx: &mut CommandContext, args: PackageArgs) -> Result<()> {
    let format = args.format;
    match args.command {
        PackageSubcommand::Install(install) => run_install(ctx, install, format).await,
        PackageSubcommand::Uninstall { name } => run_uninstall(ctx, &name, format).await,
        PackageSubcommand::Describe {
            name,
            package_versions,
            render,
            package_version,
            options,
        } => {
            let config = match options {
                Some(path) => Some(load_options_file(&path).await?),
                None => None,
            };
            let options = DescribeOptions {
                name,
                package_versions,
                render,
                version: package_version,
                config,
            };
            run_describe(ctx, &options, format).await
        }
        PackageSubcommand::Search { query } => run_search(ctx, &query.join(" "), format).await,
        PackageSubcommand::List => {
            let names = PackageCommand::new(ctx).names().await?;
            match format {
                OutputFormat::Table => names.iter().for_each(|name| println!("{}", name)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
                OutputFormat::Quiet => {}
            }
            Ok(())
        }
    }
}

async fn run_install(ctx: &mut CommandContext, args: InstallArgs, format: OutputFormat) -> Result<()> {
    let mut cmd = PackageCommand::new(ctx);
    let mut options = InstallOptions::new(&args.name);
    if let Some(path) = &args.options {
        options = options.with_config(load_options_file(path).await?);
    }

    let mut prompt = InstallPrompt::new(args.yes);
    if let Some(version) = &args.package_version {
        options = options.with_version(version);
    } else if args.interactive {
        let versions = cmd.versions(&args.name).await?;
        let current = cmd
            .describe(&DescribeOptions {
                name: args.name.clone(),
                ..DescribeOptions::default()
            })
            .await?
            .current_version;
        options = options.with_version(prompt.select_version(&args.name, &versions, &current)?);
    }

    let plan = cmd.prepare_install(&options).await?;
    if args.interactive {
        if !prompt.confirm(&plan)? {
            println!("Installation cancelled");
            return Ok(());
        }
    } else if let (OutputFormat::Table, Some(notes)) = (format, &plan.pre_install_notes) {
        println!("{}", style(notes).yellow());
    }

    let report = cmd.apply(plan).await?;
    if let Some(err) = &report.ledger_error {
        eprintln!(
            "{} installed packages list was not updated: {}",
            style("warning:").yellow(),
            err
        );
    }
    match format {
        OutputFormat::Table => {
            println!("✓ Installed package '{}' version {}", report.name, report.version);
            if let Some(app_id) = &report.app_id {
                println!("  Application: {}", app_id);
            }
            if let Some(notes) = &report.post_install_notes {
                println!("{}", notes);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "name": report.name,
                "version": report.version,
                "app_id": report.app_id,
                "pre_install_notes": report.pre_install_notes,
                "post_install_notes": report.post_install_notes,
                "ledger_error": report.ledger_error,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }
    Ok(())
}

async fn run_uninstall(ctx: &mut CommandContext, name: &str, format: OutputFormat) -> Result<()> {
    let report = PackageCommand::new(ctx).uninstall(name).await?;
    match format {
        OutputFormat::Table => {
            println!("✓ Uninstalled package '{}'", report.name);
            if let Some(id) = &report.framework_id {
                println!("  Framework {} torn down", id);
            }
            if let Some(notes) = &report.post_uninstall_notes {
                println!("{}", notes);
            }
        }
        OutputFormat::Json => {
            let steps: Vec<String> = report.completed.iter().map(ToString::to_string).collect();
            let output = serde_json::json!({
                "name": report.name,
                "app_deleted": report.app_deleted,
                "framework_id": report.framework_id,
                "steps": steps,
                "post_uninstall_notes": report.post_uninstall_notes,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }
    Ok(())
}

async fn run_describe(
    ctx: &mut CommandContext,
    options: &DescribeOptions,
    format: OutputFormat,
) -> Result<()> {
    let report = PackageCommand::new(ctx).describe(options).await?;
    match format {
        OutputFormat::Table => {
            println!("{}", style(&report.name).bold());
            println!("  {}", report.description);
            println!("  Current version: {}", report.current_version);
            if !report.tags.is_empty() {
                println!("  Tags: {}", report.tags.join(", "));
            }
            if let Some(versions) = &report.versions {
                println!("  Versions:");
                for version in versions {
                    println!("    {}", version);
                }
            }
            if let Some(descriptor) = &report.rendered {
                println!("{}", serde_json::to_string_pretty(descriptor)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "name": report.name,
                "description": report.description,
                "currentVersion": report.current_version,
                "tags": report.tags,
                "framework": report.framework,
                "versions": report.versions,
                "rendered": report.rendered,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }
    Ok(())
}

async fn run_search(ctx: &mut CommandContext, query: &str, format: OutputFormat) -> Result<()> {
    let hits = PackageCommand::new(ctx).search(query).await?;
    match format {
        OutputFormat::Table => {
            if hits.is_empty() {
                println!("No packages match '{}'", query);
                return Ok(());
            }
            println!("  {:<24} Description", "Name");
            println!("  {}", "-".repeat(70));
            for hit in &hits {
                println!("  {:<24} {}", truncate(&hit.name, 24), truncate(&hit.description, 60));
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = hits
                .iter()
                .map(|hit| {
                    serde_json::json!({
                        "name": hit.name,
                        "description": hit.description,
                        "score": hit.score,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }
    Ok(())
}

fn run_config(ctx: &CommandContext, format: OutputFormat) -> Result<()> {
    let config = ctx.config();
    match format {
        OutputFormat::Table => {
            println!("Settings:    {}", ctx.config_path().display());
            println!("Storage:     {}", config.storage_dir.display());
            println!("Repository:  {}", config.repository.version);
            println!("Marathon:    {}", config.marathon_url);
            println!("Master:      {}", config.master_url);
            if !config.agents.is_empty() {
                println!("Agents:      {}", config.agents.join(", "));
            }
            println!();
            println!("  {:<24} {:<16} Installed", "Package", "Version");
            println!("  {}", "-".repeat(60));
            for entry in &config.installed_packages {
                println!(
                    "  {:<24} {:<16} {}",
                    truncate(&entry.name, 24),
                    truncate(&entry.version, 16),
                    entry.installed_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Quiet => {}
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
