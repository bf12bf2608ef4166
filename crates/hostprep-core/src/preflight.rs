//! Environment preparation
//!
//! Runs before the first wizard stage: the host must be a supported
//! distribution, the process must run as root, and the base packages the
//! deployment engine needs are installed through apt.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Default location of the os-release file
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Distribution releases the deployment engine is tested against
pub const SUPPORTED_PLATFORMS: &[(&str, &[&str])] = &[
    ("ubuntu", &["22.04", "24.04"]),
    ("debian", &["11", "12"]),
];

/// Parsed `/etc/os-release`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    fields: HashMap<String, String>,
}

impl OsRelease {
    /// Parse `KEY=value` lines; values may be single- or double-quoted
    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), unquote(value.trim())))
            .collect();
        Self { fields }
    }

    /// Read and parse an os-release file
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::precondition(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&text))
    }

    /// `ID` (e.g. `ubuntu`)
    pub fn id(&self) -> Option<&str> {
        self.fields.get("ID").map(String::as_str)
    }

    /// `VERSION_ID` (e.g. `22.04`)
    pub fn version_id(&self) -> Option<&str> {
        self.fields.get("VERSION_ID").map(String::as_str)
    }

    /// `PRETTY_NAME`, falling back to `ID VERSION_ID`
    pub fn pretty_name(&self) -> String {
        self.fields.get("PRETTY_NAME").cloned().unwrap_or_else(|| {
            format!(
                "{} {}",
                self.id().unwrap_or("unknown"),
                self.version_id().unwrap_or("")
            )
            .trim()
            .to_string()
        })
    }

    /// Fail unless this is one of [`SUPPORTED_PLATFORMS`]
    pub fn ensure_supported(&self) -> Result<()> {
        let id = self.id().unwrap_or_default().to_ascii_lowercase();
        let version = self.version_id().unwrap_or_default();

        let supported = SUPPORTED_PLATFORMS
            .iter()
            .any(|(distro, versions)| *distro == id && versions.contains(&version));

        if supported {
            debug!(platform = %self.pretty_name(), "Platform supported");
            Ok(())
        } else {
            Err(Error::precondition(format!(
                "unsupported platform {} (supported: Ubuntu 22.04/24.04, Debian 11/12)",
                self.pretty_name()
            )))
        }
    }
}

fn unquote(value: &str) -> String {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')));
    stripped.unwrap_or(value).to_string()
}

/// Fail unless the effective uid is 0
#[cfg(unix)]
pub fn require_root() -> Result<()> {
    check_root(nix::unistd::geteuid().as_raw())
}

#[cfg(unix)]
fn check_root(euid: u32) -> Result<()> {
    if euid == 0 {
        Ok(())
    } else {
        Err(Error::precondition(format!(
            "hostprep must run as root (effective uid is {})",
            euid
        )))
    }
}

/// Fail unless the effective uid is 0
#[cfg(not(unix))]
pub fn require_root() -> Result<()> {
    Err(Error::precondition("hostprep only runs on Linux hosts"))
}

/// Installs base packages through apt-get
#[derive(Debug, Clone)]
pub struct PackageInstaller {
    program: String,
    packages: Vec<String>,
}

impl PackageInstaller {
    /// Installer for `packages` using `apt-get`
    pub fn new(packages: Vec<String>) -> Self {
        Self::with_program("apt-get", packages)
    }

    /// Installer invoking `program` instead of `apt-get`
    pub fn with_program(program: impl Into<String>, packages: Vec<String>) -> Self {
        Self {
            program: program.into(),
            packages,
        }
    }

    /// Packages that will be installed
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Refresh the package index, then install every package
    pub async fn install(&self) -> Result<()> {
        if self.packages.is_empty() {
            debug!("No packages to install");
            return Ok(());
        }

        info!(packages = ?self.packages, "Installing base packages");
        self.run(&["update".to_string()]).await?;

        let mut args = vec!["install".to_string(), "-y".to_string()];
        args.extend(self.packages.iter().cloned());
        self.run(&args).await?;

        info!("Base packages installed");
        Ok(())
    }

    async fn run(&self, args: &[String]) -> Result<()> {
        let rendered = format!("{} {}", self.program, args.join(" "));
        debug!(command = %rendered, "Running package manager");

        let output = Command::new(&self.program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::PackageInstall(format!("failed to run {}: {}", rendered, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(command = %rendered, status = %output.status, "Package manager failed");
            Err(Error::PackageInstall(format!(
                "{} exited with {}: {}",
                rendered,
                output.status,
                stderr.trim()
            )))
        }
    }
}
