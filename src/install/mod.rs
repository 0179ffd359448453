//! Release bootstrap pipeline
//!
//! Platform detection, release lookup, artifact download, extraction and
//! search-path registration, run strictly one after another.
//!
//! ## Module Organization
//!
//! - `platform` - OS/architecture tokens and artifact naming
//! - `github` - latest release lookup
//! - `download` - artifact URL composition and streaming transfer
//! - `checksum` - optional SHA-256 verification
//! - `extract` - staged archive extraction into the install directory
//! - `path` - search-path registration strategies
//! - `environment` - search-path storage backends

pub mod checksum;
pub mod download;
pub mod environment;
pub mod error;
pub mod extract;
pub mod github;
pub mod path;
pub mod platform;
pub mod progress;
#[cfg(windows)]
mod windows;

use crate::config::InstallerConfig;

use download::ArtifactReference;
use environment::EnvironmentStore;
use extract::InstallTarget;
use github::ReleaseIdentity;
use path::{PathRegistrar, Registration};
use platform::PlatformDescriptor;
use progress::Reporter;

pub use error::{InstallError, Result};

/// Search-path stores consulted by the registration stage
#[derive(Clone, Copy)]
pub struct PathStores<'a> {
    /// Search path of the running process
    pub process: &'a dyn EnvironmentStore,
    /// Persistent per-user search path
    pub user: &'a dyn EnvironmentStore,
}

/// What a pipeline run did
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub platform: PlatformDescriptor,
    pub release: ReleaseIdentity,
    pub artifact_url: String,
    pub target: InstallTarget,
    /// `None` for dry runs
    pub registration: Option<Registration>,
}

/// Run every stage after platform detection
///
/// Fatal errors are returned as-is; the scratch directory holding the
/// download is removed on every exit path, including cancellation of the
/// returned future.
pub async fn run_install(
    config: &InstallerConfig,
    platform: PlatformDescriptor,
    stores: PathStores<'_>,
    dry_run: bool,
    reporter: &Reporter,
) -> Result<InstallReport> {
    config.validate()?;
    let repo = config.repo()?;

    reporter.header(&format!("🔧 {} installer", config.tool_name));
    reporter.note(&format!("Platform: {platform}\n"));

    reporter.step(&format!("🔍 Checking latest release of {repo}..."));
    let client = github::http_client()?;
    let release = github::get_latest_release(&client, &config.api_url, &repo).await?;
    reporter.success(&format!("✓ Latest release: {}", release.tag));

    let install_dir = config.install_dir(&platform)?;
    let target = InstallTarget::new(install_dir, &platform, &config.tool_name);

    let artifact = ArtifactReference::new(
        &config.download_url,
        &release,
        &platform,
        &config.tool_name,
    );

    if dry_run {
        reporter.note(&format!("   Artifact: {}", artifact.url));
        reporter.note(&format!("   Install to: {}", target.executable.display()));
        reporter.warn("Dry run: nothing downloaded or installed");
        return Ok(InstallReport {
            platform,
            release,
            artifact_url: artifact.url,
            target,
            registration: None,
        });
    }

    let scratch = tempfile::Builder::new()
        .prefix(&format!("{}-download-", config.tool_name))
        .tempdir()?;
    let archive = artifact.local_path(scratch.path());

    reporter.step(&format!("📥 Downloading {}...", artifact.filename));
    download::fetch_artifact(&client, &artifact, &archive, reporter).await?;
    reporter.success(&format!("✓ Downloaded {}", artifact.filename));

    match &config.sha256 {
        Some(expected) => {
            reporter.step("🔒 Verifying checksum...");
            checksum::verify_sha256(&archive, expected)?;
            reporter.success("✓ Checksum verified");
        }
        None => log::debug!("No checksum configured, skipping verification"),
    }

    reporter.step(&format!("📦 Extracting to {}...", target.dir.display()));
    let executable =
        extract::install_artifact(&archive, platform.archive_format(), &target).await?;

    if let Err(e) = scratch.close() {
        log::warn!("Failed to remove temporary download directory: {e}");
    }

    let registration = PathRegistrar::new(platform.os, stores.process, stores.user)
        .modify_persistent(config.modify_path)
        .register(&target.dir);
    registration.report(reporter);

    reporter.success(&format!(
        "\n✅ Installed {} {} to {}",
        config.tool_name,
        release.tag,
        executable.display()
    ));

    Ok(InstallReport {
        platform,
        release,
        artifact_url: artifact.url,
        target,
        registration: Some(registration),
    })
}

/// Detect the host platform and install with the real environment stores
pub async fn install_on_host(
    config: &InstallerConfig,
    dry_run: bool,
    reporter: &Reporter,
) -> Result<InstallReport> {
    let platform = PlatformDescriptor::detect()?;
    let process = environment::ProcessEnvironment;
    let user = environment::user_environment();
    let stores = PathStores {
        process: &process,
        user: user.as_ref(),
    };
    run_install(config, platform, stores, dry_run, reporter).await
}
