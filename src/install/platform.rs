//! Platform detection for artifact naming

use std::fmt;

use super::error::{InstallError, Result};

/// Operating system token used in release artifact names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Windows,
    MacOs,
    Linux,
}

/// CPU architecture token used in release artifact names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Aarch64,
}

/// Archive format published for an OS token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl Os {
    pub fn token(self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::MacOs => "macos",
            Os::Linux => "linux",
        }
    }

    /// Archive format is a fixed function of the OS token, never sniffed
    pub fn archive_format(self) -> ArchiveFormat {
        match self {
            Os::Windows => ArchiveFormat::Zip,
            Os::MacOs | Os::Linux => ArchiveFormat::TarGz,
        }
    }

    pub fn executable_suffix(self) -> &'static str {
        match self {
            Os::Windows => ".exe",
            Os::MacOs | Os::Linux => "",
        }
    }

    /// Separator between entries of the search path
    pub fn path_separator(self) -> char {
        match self {
            Os::Windows => ';',
            Os::MacOs | Os::Linux => ':',
        }
    }
}

impl Arch {
    pub fn token(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
        }
    }
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

/// OS and architecture pair of the running host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformDescriptor {
    pub os: Os,
    pub arch: Arch,
}

impl PlatformDescriptor {
    /// Detect the platform this binary is running on
    pub fn detect() -> Result<Self> {
        Self::resolve(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map raw OS and machine identifiers (as reported by Rust or `uname`)
    /// onto artifact tokens
    pub fn resolve(os: &str, arch: &str) -> Result<Self> {
        let unsupported = || InstallError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let os_lower = os.to_ascii_lowercase();
        let os_token = if os_lower.contains("darwin") || os_lower == "macos" {
            Os::MacOs
        } else if os_lower.contains("linux") {
            Os::Linux
        } else if os_lower == "windows" {
            Os::Windows
        } else {
            return Err(unsupported());
        };

        let arch_token = match arch.to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" => Arch::X86_64,
            "arm64" | "aarch64" => Arch::Aarch64,
            _ => return Err(unsupported()),
        };

        Ok(Self {
            os: os_token,
            arch: arch_token,
        })
    }

    pub fn archive_format(&self) -> ArchiveFormat {
        self.os.archive_format()
    }

    /// Artifact filename: `<tool>-<os>-<arch>.<ext>`
    pub fn artifact_filename(&self, tool_name: &str) -> String {
        format!(
            "{}-{}-{}.{}",
            tool_name,
            self.os.token(),
            self.arch.token(),
            self.archive_format().extension()
        )
    }

    /// Executable file name for the tool on this platform
    pub fn executable_name(&self, tool_name: &str) -> String {
        format!("{}{}", tool_name, self.os.executable_suffix())
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.token(), self.arch.token())
    }
}
