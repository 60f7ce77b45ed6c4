//! # Backplane Build
//!
//! The Build Orchestrator (spec §4.C): a per-build state machine that
//! acquires source, detects project type, runs the build pipeline, reads
//! artifacts, and hands them to the Deployment Client.

pub mod artifacts;
pub mod decrypt;
pub mod detect;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod redact;
pub mod sandbox;
pub mod types;

pub use decrypt::{EnvDecryptor, IdentityDecryptor};
pub use detect::{FixedProjectDetector, ProjectDetector, ScriptProjectDetector};
pub use error::{BuildError, Result};
pub use orchestrator::BuildOrchestrator;
pub use redact::sanitize_git_error;
pub use sandbox::{LocalSandbox, Sandbox, SandboxEvent, SandboxError};
pub use types::{
    Build, BuildStatus, CancelReason, CancelResult, EnvVarInput, ProjectType, PublicStatus, Source,
};
