//! Launch the deployment engine as a child process

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::HandoffConfig;
use crate::error::{Error, Result};
use crate::traits::{Handoff, HandoffReport};

/// Environment variable carrying the plain document path
pub const SETTINGS_ENV: &str = "HOSTPREP_SETTINGS";

/// Environment variable carrying the secret document path
pub const SECRETS_ENV: &str = "HOSTPREP_SECRETS";

/// Runs the configured program with inherited stdio
#[derive(Debug, Clone)]
pub struct CommandHandoff {
    config: HandoffConfig,
}

impl CommandHandoff {
    /// Create a hand-off for `config`
    pub fn new(config: HandoffConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Handoff for CommandHandoff {
    async fn launch(&self, settings: &Path, secrets: &Path) -> Result<HandoffReport> {
        let settings = absolute(settings).await;
        let secrets = absolute(secrets).await;
        let workdir = settings
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let command = self.describe();
        info!(command = %command, workdir = %workdir.display(), "Launching deployment engine");

        let status = Command::new(&self.config.program)
            .args(&self.config.args)
            .current_dir(&workdir)
            .env(SETTINGS_ENV, &settings)
            .env(SECRETS_ENV, &secrets)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::Handoff(format!("failed to start {}: {}", self.config.program, e)))?;

        let report = HandoffReport {
            command,
            exit_code: status.code(),
        };

        if report.succeeded() {
            debug!("Deployment engine finished");
        } else {
            warn!(exit_code = ?report.exit_code, "Deployment engine exited unsuccessfully");
        }

        Ok(report)
    }

    fn describe(&self) -> String {
        self.config.command_line()
    }
}

async fn absolute(path: &Path) -> PathBuf {
    tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf())
}
