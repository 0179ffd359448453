use std::path::PathBuf;

use clap::Parser;

use dicom_json_install::ConfigOverrides;

/// Command-line arguments for dicom-json-install
#[derive(Parser, Debug)]
#[command(name = "dicom-json-install")]
#[command(version, about = "Download and install the latest dicom-json release")]
pub struct Args {
    /// Path to an installer config file (TOML)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Release repository as owner/name
    #[arg(long)]
    pub repo: Option<String>,

    /// Tool name used in artifact and executable names
    #[arg(long)]
    pub tool_name: Option<String>,

    /// Install directory (defaults to ~/.local/bin, or %LOCALAPPDATA%\<tool> on Windows)
    #[arg(long)]
    pub install_dir: Option<PathBuf>,

    /// Base URL of the release API
    #[arg(long)]
    pub api_url: Option<String>,

    /// Base URL artifacts are downloaded from
    #[arg(long)]
    pub download_url: Option<String>,

    /// Expected SHA-256 of the artifact; verification is skipped when omitted
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Never modify the persistent user search path
    #[arg(long)]
    pub no_modify_path: bool,

    /// Resolve the release and print what would be installed
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Args {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            repository: self.repo.clone(),
            tool_name: self.tool_name.clone(),
            api_url: self.api_url.clone(),
            download_url: self.download_url.clone(),
            install_dir: self.install_dir.clone(),
            sha256: self.sha256.clone(),
            no_modify_path: self.no_modify_path,
        }
    }
}
