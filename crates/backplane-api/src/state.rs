//! Shared application state: durable storage, provider clients, and the
//! per-key registries that keep a `BuildOrchestrator`/`SessionAggregator`
//! alive for the lifetime of its in-process alarm-driving task (spec §5
//! "Singleton-per-key actors", generalized from a Durable-Object host to a
//! plain tokio runtime the way `backplane_core::alarm::InProcessAlarm`'s
//! doc comment describes).

use crate::error::{ApiError, ApiResult};
use crate::ingest::AnalyticsIngestClient;
use backplane_build::{BuildOrchestrator, EnvDecryptor, FixedProjectDetector, IdentityDecryptor, ProjectDetector};
use backplane_core::alarm::{Alarm, InProcessAlarm};
use backplane_core::config::RootConfig;
use backplane_core::storage::{Durable, MemoryDurable};
use backplane_deploy::DeploymentClient;
use backplane_sessions::SessionAggregator;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How often the background poll loops check their alarm for expiry. Small
/// enough that a build feels responsive, large enough not to spin the CPU
/// with thousands of idle per-build tasks.
const ALARM_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct BuildHandle {
    pub orchestrator: Mutex<BuildOrchestrator>,
    build_alarm: Arc<InProcessAlarm>,
    events_alarm: Arc<InProcessAlarm>,
}

pub struct SessionHandle {
    pub aggregator: Mutex<SessionAggregator>,
    alarm: Arc<InProcessAlarm>,
}

pub struct AppState {
    pub durable: Arc<dyn Durable>,
    pub config: RootConfig,
    pub deploy_client: Arc<DeploymentClient>,
    pub decryptor: Arc<dyn EnvDecryptor>,
    pub detector: Arc<dyn ProjectDetector>,
    pub ingest_client: Arc<AnalyticsIngestClient>,
    sandbox_root: PathBuf,
    builds: Mutex<HashMap<String, Arc<BuildHandle>>>,
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
}

impl AppState {
    pub fn new(config: RootConfig) -> Self {
        let durable: Arc<dyn Durable> = Arc::new(MemoryDurable::new());
        let deploy_client = Arc::new(DeploymentClient::new(config.provider.clone()));
        let ingest_client = Arc::new(AnalyticsIngestClient::new(config.api.analytics_ingest_url.clone()));
        Self {
            durable,
            deploy_client,
            decryptor: Arc::new(IdentityDecryptor),
            detector: Arc::new(FixedProjectDetector("plain-html".to_string())),
            ingest_client,
            sandbox_root: std::env::temp_dir().join("backplane-builds"),
            builds: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Returns the build's actor, constructing and registering it (plus its
    /// two alarm-driving tasks) on first access. Safe to call for a build
    /// that doesn't exist yet in storage; `load()` is a no-op in that case
    /// and the caller's subsequent operation (e.g. `status()`) surfaces
    /// `BuildError::NotFound`.
    pub async fn build_handle(self: &Arc<Self>, build_id: &str) -> ApiResult<Arc<BuildHandle>> {
        let mut builds = self.builds.lock().await;
        if let Some(handle) = builds.get(build_id) {
            return Ok(handle.clone());
        }

        let build_alarm = Arc::new(InProcessAlarm::new());
        let events_alarm = Arc::new(InProcessAlarm::new());
        let mut orchestrator = BuildOrchestrator::new(
            self.durable.clone(),
            build_alarm.clone(),
            events_alarm.clone(),
            self.config.events.clone(),
            build_id,
        );
        orchestrator.load().await?;

        let handle = Arc::new(BuildHandle {
            orchestrator: Mutex::new(orchestrator),
            build_alarm,
            events_alarm,
        });
        builds.insert(build_id.to_string(), handle.clone());
        drop(builds);

        self.spawn_build_alarm_loop(build_id.to_string(), handle.clone());
        self.spawn_events_alarm_loop(build_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Returns the session's actor, constructing and registering it (plus
    /// its alarm-driving task) on first access.
    pub async fn session_handle(self: &Arc<Self>, session_id: &str, kilo_user_id: Option<String>) -> ApiResult<Arc<SessionHandle>> {
        let mut sessions = self.sessions.lock().await;
        if let Some(handle) = sessions.get(session_id) {
            return Ok(handle.clone());
        }

        let alarm = Arc::new(InProcessAlarm::new());
        let mut aggregator = SessionAggregator::new(
            self.durable.clone(),
            alarm.clone(),
            self.ingest_client.clone(),
            session_id,
            kilo_user_id,
        );
        aggregator.load().await?;

        let handle = Arc::new(SessionHandle {
            aggregator: Mutex::new(aggregator),
            alarm,
        });
        sessions.insert(session_id.to_string(), handle.clone());
        drop(sessions);

        self.spawn_session_alarm_loop(session_id.to_string(), handle.clone());
        Ok(handle)
    }

    fn spawn_build_alarm_loop(self: &Arc<Self>, build_id: String, handle: Arc<BuildHandle>) {
        let state = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(ALARM_POLL_INTERVAL).await;
                if handle.build_alarm.delay_until_due() != Some(Duration::ZERO) {
                    continue;
                }
                let sandbox_path = state.sandbox_root.join(&build_id);
                let sandbox = match backplane_build::LocalSandbox::create(sandbox_path).await {
                    Ok(sandbox) => sandbox,
                    Err(e) => {
                        tracing::error!(build_id = %build_id, error = %e, "failed to create sandbox for alarm-driven build");
                        handle.build_alarm.delete().await;
                        continue;
                    }
                };
                let mut orchestrator = handle.orchestrator.lock().await;
                if let Err(e) = orchestrator
                    .on_alarm(&sandbox, &state.deploy_client, state.decryptor.as_ref(), state.detector.as_ref())
                    .await
                {
                    tracing::error!(build_id = %build_id, error = %e, "build alarm handler failed");
                }
                // The in-process scheduler has no platform-level guarantee
                // that firing an alarm clears it, unlike a Durable Object
                // host; clear it here so a terminal build stops polling.
                handle.build_alarm.delete().await;
            }
        });
    }

    fn spawn_events_alarm_loop(self: &Arc<Self>, build_id: String, handle: Arc<BuildHandle>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(ALARM_POLL_INTERVAL).await;
                if handle.events_alarm.delay_until_due() != Some(Duration::ZERO) {
                    continue;
                }
                let mut orchestrator = handle.orchestrator.lock().await;
                if let Err(e) = orchestrator.on_events_alarm().await {
                    tracing::error!(build_id = %build_id, error = %e, "events alarm handler failed");
                }
                handle.events_alarm.delete().await;
            }
        });
    }

    fn spawn_session_alarm_loop(self: &Arc<Self>, session_id: String, handle: Arc<SessionHandle>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(ALARM_POLL_INTERVAL).await;
                if handle.alarm.delay_until_due() != Some(Duration::ZERO) {
                    continue;
                }
                let mut aggregator = handle.aggregator.lock().await;
                if let Err(e) = aggregator.on_alarm().await {
                    tracing::error!(session_id = %session_id, error = %e, "session alarm handler failed");
                }
            }
        });
    }
}
