//! High-level commands for mesosctl operations.
//!
//! This module is the public API frontends call into. Each command borrows
//! a [`CommandContext`] and returns a report instead of printing.

pub mod context;
pub mod package;
pub mod repository;

pub use context::CommandContext;
pub use package::{
    DescribeOptions, DescribeReport, InstallOptions, InstallPlan, InstallReport, PackageCommand,
    SearchEntry, load_options_file,
};
pub use repository::{RepositoryCommand, RepositoryReport};
