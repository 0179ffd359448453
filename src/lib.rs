//! Self-installing bootstrap for the `dicom-json` command-line tool
//!
//! Resolves the latest release for the host platform, downloads and unpacks
//! the matching artifact into a user-writable directory, and makes sure the
//! executable is reachable from the shell.

pub mod config;
pub mod install;

pub use config::{ConfigOverrides, InstallerConfig, RepoSlug};
pub use install::{InstallError, InstallReport, PathStores, Result, install_on_host, run_install};
