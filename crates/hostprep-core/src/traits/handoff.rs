//! Deployment engine hand-off
//!
//! The deployment engine is external; hostprep only launches it with the
//! two document locations once the operator confirms.

use async_trait::async_trait;
use std::path::Path;

/// What happened when the deployment engine ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffReport {
    /// Command line that was executed
    pub command: String,
    /// Exit code (`None` if terminated by a signal)
    pub exit_code: Option<i32>,
}

impl HandoffReport {
    /// Whether the engine exited with status 0
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for launching the external deployment engine
#[async_trait]
pub trait Handoff: Send + Sync {
    /// Run the engine against the finished documents
    async fn launch(&self, settings: &Path, secrets: &Path) -> Result<HandoffReport, crate::Error>;

    /// Command line shown in the confirmation prompt
    fn describe(&self) -> String;
}
