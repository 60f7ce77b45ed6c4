//! Error taxonomy for the Build Orchestrator (spec §7).

use backplane_core::CoreError;
use backplane_deploy::DeployError;
use backplane_events::EventsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Storage(#[from] CoreError),

    #[error(transparent)]
    Events(#[from] EventsError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("build {0} not found")]
    NotFound(String),

    #[error("failed to clone repository: {0}")]
    GitClone(String),

    #[error("git lfs pull failed: {0}")]
    GitLfs(String),

    #[error("archive extraction failed: {0}")]
    ArchiveExtraction(String),

    #[error("{0}")]
    ProjectDetection(String),

    #[error("build step `{command}` failed: {cause}")]
    BuildStep { command: String, cause: String },

    #[error("sandbox error: {0}")]
    Sandbox(String),
}

pub type Result<T> = std::result::Result<T, BuildError>;
