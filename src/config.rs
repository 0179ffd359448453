//! Installer configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! command-line overrides.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::install::platform::{Os, PlatformDescriptor};
use crate::install::{InstallError, Result};

pub const DEFAULT_REPOSITORY: &str = "ThalesMMS/dicom-json";
pub const DEFAULT_TOOL_NAME: &str = "dicom-json";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_DOWNLOAD_URL: &str = "https://github.com";

const CONFIG_FILE: &str = "installer.toml";

/// Top‑level installer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Release repository as `owner/name`
    pub repository: String,
    /// Tool name used in artifact and executable names
    pub tool_name: String,
    /// Base URL of the release metadata API
    pub api_url: String,
    /// Base URL artifacts are downloaded from
    pub download_url: String,
    /// Overrides the platform default install directory
    pub install_dir: Option<PathBuf>,
    /// Expected SHA-256 of the artifact; verification is skipped when unset
    pub sha256: Option<String>,
    /// Persist the install directory in the user search path (windows only)
    pub modify_path: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            repository: DEFAULT_REPOSITORY.to_string(),
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            install_dir: None,
            sha256: None,
            modify_path: true,
        }
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub repository: Option<String>,
    pub tool_name: Option<String>,
    pub api_url: Option<String>,
    pub download_url: Option<String>,
    pub install_dir: Option<PathBuf>,
    pub sha256: Option<String>,
    pub no_modify_path: bool,
}

/// Release repository identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn parse(slug: &str) -> Result<Self> {
        match slug.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(InstallError::Config(format!(
                "repository must be `owner/name`, got `{slug}`"
            ))),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Default location of the config file (`<config dir>/dicom-json/installer.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(DEFAULT_TOOL_NAME).join(CONFIG_FILE))
}

impl InstallerConfig {
    /// Load configuration from `explicit`, or from the default path when it exists
    ///
    /// An explicit path must exist; a missing default file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => {
                    log::debug!("No installer config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InstallError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let cfg = toml::from_str(&content).map_err(|e| {
            InstallError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        log::info!("Using installer config from: {}", path.display());
        Ok(cfg)
    }

    /// Apply command-line overrides on top of the loaded values
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(repository) = overrides.repository {
            self.repository = repository;
        }
        if let Some(tool_name) = overrides.tool_name {
            self.tool_name = tool_name;
        }
        if let Some(api_url) = overrides.api_url {
            self.api_url = api_url;
        }
        if let Some(download_url) = overrides.download_url {
            self.download_url = download_url;
        }
        if overrides.install_dir.is_some() {
            self.install_dir = overrides.install_dir;
        }
        if overrides.sha256.is_some() {
            self.sha256 = overrides.sha256;
        }
        if overrides.no_modify_path {
            self.modify_path = false;
        }
        self
    }

    pub fn repo(&self) -> Result<RepoSlug> {
        RepoSlug::parse(&self.repository)
    }

    /// Check values that would otherwise fail late in the pipeline
    pub fn validate(&self) -> Result<()> {
        self.repo()?;
        if self.tool_name.trim().is_empty() || self.tool_name.contains(['/', '\\']) {
            return Err(InstallError::Config(format!(
                "invalid tool name `{}`",
                self.tool_name
            )));
        }
        if let Some(digest) = &self.sha256
            && (digest.len() != 64 || hex::decode(digest).is_err())
        {
            return Err(InstallError::Config(format!(
                "sha256 must be 64 hex characters, got `{digest}`"
            )));
        }
        Ok(())
    }

    /// Install directory for `platform`, honoring an explicit override
    pub fn install_dir(&self, platform: &PlatformDescriptor) -> Result<PathBuf> {
        if let Some(dir) = &self.install_dir {
            return Ok(dir.clone());
        }
        default_install_dir(platform.os, &self.tool_name)
    }
}

/// Platform default install directory
///
/// - windows: `<local data dir>/<tool>` (`%LOCALAPPDATA%\dicom-json`)
/// - macos, linux: `~/.local/bin`
pub fn default_install_dir(os: Os, tool_name: &str) -> Result<PathBuf> {
    match os {
        Os::Windows => dirs::data_local_dir()
            .map(|dir| dir.join(tool_name))
            .ok_or_else(|| {
                InstallError::Config("Could not determine local data directory".to_string())
            }),
        Os::MacOs | Os::Linux => dirs::home_dir()
            .map(|home| home.join(".local").join("bin"))
            .ok_or_else(|| InstallError::Config("Could not determine home directory".to_string())),
    }
}
