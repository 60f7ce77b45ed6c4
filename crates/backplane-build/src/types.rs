//! Build record and state-machine types (spec §3, §4.C).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Queued,
    Building,
    Deploying,
    Deployed,
    Failed,
    Cancelled,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStatus::Deployed | BuildStatus::Failed | BuildStatus::Cancelled)
    }

    pub fn is_cancellable(self) -> bool {
        matches!(self, BuildStatus::Queued | BuildStatus::Building)
    }
}

/// How the project source is acquired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    Archive,
    Git {
        repo_source: String,
        branch: Option<String>,
        /// Cleared from persisted state on hand-off into `run()` (spec §4.C,
        /// §8 invariant "after any terminal transition, envVars and
        /// source.accessToken are absent").
        access_token: Option<String>,
    },
}

/// Project type detected from the source tree; the fixed allow-list from
/// spec §4.C step 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    Nextjs,
    Hugo,
    Jekyll,
    Eleventy,
    Astro,
    PlainHtml,
}

impl ProjectType {
    pub fn parse(tag: &str) -> std::result::Result<Self, crate::error::BuildError> {
        match tag {
            "nextjs" => Ok(ProjectType::Nextjs),
            "hugo" => Ok(ProjectType::Hugo),
            "jekyll" => Ok(ProjectType::Jekyll),
            "eleventy" => Ok(ProjectType::Eleventy),
            "astro" => Ok(ProjectType::Astro),
            "plain-html" => Ok(ProjectType::PlainHtml),
            "unknown" => Err(crate::error::BuildError::ProjectDetection(
                "could not determine the project type for this repository".to_string(),
            )),
            other => Err(crate::error::BuildError::ProjectDetection(format!(
                "unsupported project type `{other}`"
            ))),
        }
    }

    pub fn is_static(self) -> bool {
        !matches!(self, ProjectType::Nextjs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVarInput {
    pub key: String,
    pub sealed_value: String,
    pub is_secret: bool,
}

/// The persisted Build record (spec §3, "Persisted keys" §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub build_id: String,
    pub slug: String,
    pub status: BuildStatus,
    pub source: Source,
    /// Present only while queued/building; cleared on hand-off into `run()`
    /// and absent from every terminal state.
    pub env_vars: Option<Vec<EnvVarInput>>,
    pub project_type: Option<ProjectType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Build {
    pub fn new(build_id: String, slug: String, source: Source, env_vars: Vec<EnvVarInput>, now: DateTime<Utc>) -> Self {
        Self {
            build_id,
            slug,
            status: BuildStatus::Queued,
            source,
            env_vars: if env_vars.is_empty() { None } else { Some(env_vars) },
            project_type: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Public fields returned by `status()` (spec §4.C, §6
    /// `GET /deploy/:buildId/status`).
    pub fn public_status(&self) -> PublicStatus {
        PublicStatus {
            status: self.status,
            updated_at: self.updated_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            project_type: self.project_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicStatus {
    pub status: BuildStatus,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub project_type: Option<ProjectType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResult {
    pub cancelled: bool,
    pub reason: CancelReason,
    pub status: Option<BuildStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    NotFound,
    AlreadyFinished,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_type_rejects_unknown_and_unsupported() {
        assert!(matches!(
            ProjectType::parse("unknown"),
            Err(crate::error::BuildError::ProjectDetection(_))
        ));
        assert!(matches!(
            ProjectType::parse("rails"),
            Err(crate::error::BuildError::ProjectDetection(_))
        ));
        assert_eq!(ProjectType::parse("nextjs").unwrap(), ProjectType::Nextjs);
    }

    #[test]
    fn queued_and_building_are_cancellable_deploying_is_not() {
        assert!(BuildStatus::Queued.is_cancellable());
        assert!(BuildStatus::Building.is_cancellable());
        assert!(!BuildStatus::Deploying.is_cancellable());
        assert!(!BuildStatus::Deployed.is_cancellable());
    }

    #[test]
    fn terminal_statuses() {
        assert!(BuildStatus::Deployed.is_terminal());
        assert!(BuildStatus::Failed.is_terminal());
        assert!(BuildStatus::Cancelled.is_terminal());
        assert!(!BuildStatus::Building.is_terminal());
    }
}
