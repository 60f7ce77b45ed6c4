//! Project type detection (spec §4.C step 3). Spec §1 Non-goals: "which
//! project types exist beyond an opaque tag" — the detection script's
//! content is out of scope; this crate only runs it and parses its output.

use crate::error::{BuildError, Result};
use crate::sandbox::{Sandbox, SandboxEvent};
use async_trait::async_trait;
use tokio_stream::StreamExt;

#[async_trait]
pub trait ProjectDetector: Send + Sync {
    /// Returns the raw tag string (validated by
    /// [`crate::types::ProjectType::parse`] by the caller).
    async fn detect(&self, sandbox: &dyn Sandbox) -> Result<String>;
}

/// Runs a fixed detection script in the sandbox and takes the last non-empty
/// stdout line as the tag.
pub struct ScriptProjectDetector {
    pub command: String,
}

impl Default for ScriptProjectDetector {
    fn default() -> Self {
        Self { command: "bash detect-project-type.sh".to_string() }
    }
}

#[async_trait]
impl ProjectDetector for ScriptProjectDetector {
    async fn detect(&self, sandbox: &dyn Sandbox) -> Result<String> {
        let mut stream = sandbox
            .run_script(&self.command, None, &[])
            .await
            .map_err(|e| BuildError::ProjectDetection(e.to_string()))?;

        let mut last_line = None;
        while let Some(event) = stream.next().await {
            match event {
                SandboxEvent::Log(line) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        last_line = Some(trimmed.to_string());
                    }
                }
                SandboxEvent::Error(e) => return Err(BuildError::ProjectDetection(e)),
                SandboxEvent::Complete(code) if code != 0 => {
                    return Err(BuildError::ProjectDetection(format!(
                        "detection script exited with code {code}"
                    )));
                }
                SandboxEvent::Complete(_) => break,
            }
        }
        last_line.ok_or_else(|| BuildError::ProjectDetection("detection script produced no output".to_string()))
    }
}

/// Returns a pre-set tag; for tests and for callers that already know the
/// project type out of band.
pub struct FixedProjectDetector(pub String);

#[async_trait]
impl ProjectDetector for FixedProjectDetector {
    async fn detect(&self, _sandbox: &dyn Sandbox) -> Result<String> {
        Ok(self.0.clone())
    }
}
