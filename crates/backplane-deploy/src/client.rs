//! Deployment Client (spec §4.D): worker script and static asset deploy to
//! the edge provider.

use crate::error::{DeployError, Result};
use crate::manifest::build_manifest;
use crate::types::{
    is_valid_worker_name, DeployRequest, DeployResult, EnvVar, UploadBatchResponse,
    UploadSessionResponse,
};
use backplane_core::config::ProviderConfig;
use backplane_core::error::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitError};
use backplane_core::error::retry::{retry_with_backoff, RetryPolicy};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::OnceLock;

const SECRETS_BATCH_SIZE: usize = 5;
const DEFAULT_NAMESPACE: &str = "default";

/// A migration descriptor carrying Durable Object class names to provision.
#[derive(Debug, Clone, Default)]
pub struct Migration {
    pub tag: Option<String>,
    pub new_classes: Vec<String>,
}

fn migration_class_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"class "([^"]+)""#).unwrap())
}

pub struct DeploymentClient {
    client: reqwest::Client,
    config: ProviderConfig,
    retry_policy: RetryPolicy,
    circuit_breaker: CircuitBreaker,
}

impl DeploymentClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            retry_policy: RetryPolicy::provider_default(),
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }

    /// Runs a retrying provider call through the circuit breaker, so a
    /// sustained run of failures across builds stops hammering the provider
    /// between the point it starts failing and the point any single call's
    /// own retry policy would otherwise give up.
    async fn guarded<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.circuit_breaker.call(f).await.map_err(|e| match e {
            CircuitError::Open => DeployError::CircuitOpen,
            CircuitError::Inner(inner) => inner,
        })
    }

    fn namespace<'a>(&self, request_ns: &'a Option<String>) -> &'a str {
        request_ns.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    fn script_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "{}/accounts/{}/workers/dispatch/namespaces/{}/scripts/{}",
            self.config.base_url, self.config.account_id, namespace, name
        )
    }

    fn secrets_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/secrets", self.script_url(namespace, name))
    }

    fn upload_session_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/assets-upload-session", self.script_url(namespace, name))
    }

    fn upload_batch_url(&self) -> String {
        format!(
            "{}/accounts/{}/workers/assets/upload?base64=true",
            self.config.base_url, self.config.account_id
        )
    }

    /// `deploy({artifacts, workerName, envVars?, dispatchNamespace?})`.
    pub async fn deploy(
        &self,
        request: DeployRequest,
        migrations: Vec<Migration>,
    ) -> Result<DeployResult> {
        if !is_valid_worker_name(&request.worker_name) {
            return Err(DeployError::InvalidWorkerName(request.worker_name));
        }
        let namespace = self.namespace(&request.dispatch_namespace).to_string();

        let (secrets, plain): (Vec<EnvVar>, Vec<EnvVar>) =
            request.env_vars.iter().cloned().partition(|v| v.is_secret);
        self.deploy_secrets(&namespace, &request.worker_name, &secrets).await?;

        if request.artifacts.is_empty() && request.assets.is_empty() {
            return self.deploy_no_assets(&namespace, &request, &plain, migrations).await;
        }

        let manifest = build_manifest(&request.assets);
        let session = self.create_upload_session(&namespace, &request.worker_name, &manifest).await?;

        let completion_jwt = if session.buckets.is_empty() {
            session.jwt.clone()
        } else {
            self.upload_batches(&session, &manifest).await?
        };

        self.deploy_with_assets(&namespace, &request, &plain, &completion_jwt, migrations).await
    }

    /// Secrets-first: `PUT {name, text, type:"secret_text"}` per secret, in
    /// parallel batches of 5, retrying a 10007 (script not found) by
    /// deploying a minimal draft worker first.
    async fn deploy_secrets(&self, namespace: &str, name: &str, secrets: &[EnvVar]) -> Result<()> {
        if secrets.is_empty() {
            return Ok(());
        }

        let mut draft_deployed = false;
        for batch in secrets.chunks(SECRETS_BATCH_SIZE) {
            let results = futures_util::future::join_all(
                batch.iter().map(|secret| self.put_secret(namespace, name, secret)),
            )
            .await;

            for result in results {
                match result {
                    Ok(()) => {}
                    Err(DeployError::ProviderCode { code: 10007, .. }) if !draft_deployed => {
                        self.deploy_draft(namespace, name).await?;
                        draft_deployed = true;
                    }
                    Err(e) => return Err(e),
                }
            }

            if draft_deployed {
                for secret in batch {
                    self.put_secret(namespace, name, secret).await?;
                }
            }
        }
        Ok(())
    }

    async fn put_secret(&self, namespace: &str, name: &str, secret: &EnvVar) -> Result<()> {
        let url = self.secrets_url(namespace, name);
        let body = json!({ "name": secret.key, "text": secret.value, "type": "secret_text" });
        self.guarded(|| {
            retry_with_backoff("put_secret", &self.retry_policy, Self::is_retryable, || async {
                let response = self
                    .client
                    .put(&url)
                    .bearer_auth(&self.config.api_token)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| DeployError::Transport(e.to_string()))?;
                Self::check_provider_response(response).await
            })
        })
        .await
    }

    /// A single module exporting `{fetch(){}}`, deployed so secrets have a
    /// script to attach to.
    async fn deploy_draft(&self, namespace: &str, name: &str) -> Result<()> {
        let metadata = json!({
            "main_module": "index.js",
            "compatibility_date": "2024-01-01",
            "compatibility_flags": [],
            "bindings": [],
        });
        let script = b"export default { fetch() {} };".to_vec();
        self.put_script(namespace, name, &metadata, &script, &[]).await?;
        Ok(())
    }

    async fn deploy_no_assets(
        &self,
        namespace: &str,
        request: &DeployRequest,
        plain_env: &[EnvVar],
        migrations: Vec<Migration>,
    ) -> Result<DeployResult> {
        let metadata = self.build_metadata(plain_env, None, migrations);
        self.put_script_with_migration_retry(namespace, &request.worker_name, metadata, &request.worker_script, &request.artifacts)
            .await?;
        Ok(DeployResult { script_name: request.worker_name.clone(), assets_jwt: None })
    }

    async fn deploy_with_assets(
        &self,
        namespace: &str,
        request: &DeployRequest,
        plain_env: &[EnvVar],
        completion_jwt: &str,
        migrations: Vec<Migration>,
    ) -> Result<DeployResult> {
        let metadata = self.build_metadata(plain_env, Some(completion_jwt), migrations);
        self.put_script_with_migration_retry(namespace, &request.worker_name, metadata, &request.worker_script, &request.artifacts)
            .await?;
        Ok(DeployResult {
            script_name: request.worker_name.clone(),
            assets_jwt: Some(completion_jwt.to_string()),
        })
    }

    fn build_metadata(&self, plain_env: &[EnvVar], assets_jwt: Option<&str>, migrations: Vec<Migration>) -> Value {
        let mut bindings: Vec<Value> = plain_env
            .iter()
            .map(|v| json!({ "type": "plain_text", "name": v.key, "text": v.value }))
            .collect();

        if assets_jwt.is_some() {
            bindings.push(json!({ "name": "ASSETS", "type": "assets" }));
        }

        let mut metadata = json!({
            "main_module": "index.js",
            "compatibility_date": "2024-01-01",
            "compatibility_flags": [],
            "bindings": bindings,
        });

        if let Some(jwt) = assets_jwt {
            metadata["assets"] = json!({ "jwt": jwt, "config": {} });
        }

        if !migrations.is_empty() {
            metadata["migrations"] = json!(migrations
                .iter()
                .map(|m| json!({ "tag": m.tag, "new_classes": m.new_classes }))
                .collect::<Vec<_>>());
        }

        metadata
    }

    /// PUT the script; on a 10074 (DO class collision) strip the named class
    /// from every migration's `new_classes`, drop emptied migrations, and
    /// retry once with the filtered metadata.
    async fn put_script_with_migration_retry(
        &self,
        namespace: &str,
        name: &str,
        mut metadata: Value,
        script: &[u8],
        artifacts: &[crate::types::DeploymentFile],
    ) -> Result<()> {
        match self.put_script(namespace, name, &metadata, script, artifacts).await {
            Ok(()) => Ok(()),
            Err(DeployError::ProviderCode { code: 10074, message }) => {
                let class = migration_class_pattern()
                    .captures(&message)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .ok_or(DeployError::ProviderCode { code: 10074, message })?;
                filter_migration_class(&mut metadata, &class);
                self.put_script(namespace, name, &metadata, script, artifacts).await
            }
            Err(e) => Err(e),
        }
    }

    async fn put_script(
        &self,
        namespace: &str,
        name: &str,
        metadata: &Value,
        script: &[u8],
        artifacts: &[crate::types::DeploymentFile],
    ) -> Result<()> {
        let url = self.script_url(namespace, name);
        self.guarded(|| {
            retry_with_backoff("put_script", &self.retry_policy, Self::is_retryable, || async {
                let mut form = reqwest::multipart::Form::new()
                    .text("metadata", metadata.to_string())
                    .part("index.js", reqwest::multipart::Part::bytes(script.to_vec()).file_name("index.js"));
                for artifact in artifacts {
                    form = form.part(
                        artifact.path.clone(),
                        reqwest::multipart::Part::bytes(artifact.bytes.clone())
                            .file_name(artifact.path.clone())
                            .mime_str(&artifact.mime)
                            .unwrap_or_else(|_| reqwest::multipart::Part::bytes(artifact.bytes.clone())),
                    );
                }

                let response = self
                    .client
                    .put(&url)
                    .bearer_auth(&self.config.api_token)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|e| DeployError::Transport(e.to_string()))?;
                Self::check_provider_response(response).await
            })
        })
        .await
    }

    async fn create_upload_session(
        &self,
        namespace: &str,
        name: &str,
        manifest: &crate::types::AssetManifest,
    ) -> Result<UploadSessionResponse> {
        let url = self.upload_session_url(namespace, name);
        let body = json!({ "manifest": manifest.manifest });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeployError::Transport(e.to_string()))?;
        let parsed = Self::check_provider_response_json::<UploadSessionResponse>(response).await?;
        Ok(parsed)
    }

    /// Upload every hash bucket as a `base64=true` multipart batch until a
    /// 201 yields the completion token.
    async fn upload_batches(
        &self,
        session: &UploadSessionResponse,
        manifest: &crate::types::AssetManifest,
    ) -> Result<String> {
        let url = self.upload_batch_url();
        let mut completion_jwt: Option<String> = None;

        for bucket in &session.buckets {
            let mut form = reqwest::multipart::Form::new();
            for hash in bucket {
                let Some((bytes, _mime)) = manifest.content.get(hash) else { continue };
                let encoded = BASE64.encode(bytes);
                form = form.part(
                    hash.clone(),
                    reqwest::multipart::Part::bytes(encoded.into_bytes()).file_name(hash.clone()),
                );
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&session.jwt)
                .multipart(form)
                .send()
                .await
                .map_err(|e| DeployError::Transport(e.to_string()))?;

            let status = response.status();
            let parsed: UploadBatchResponse = response
                .json()
                .await
                .map_err(|e| DeployError::Transport(e.to_string()))?;

            if status == StatusCode::CREATED {
                completion_jwt = parsed.jwt.or_else(|| Some(session.jwt.clone()));
            } else if status != StatusCode::OK {
                return Err(DeployError::Provider(format!("upload batch returned {status}")));
            }
        }

        completion_jwt.ok_or(DeployError::NoCompletionToken)
    }

    pub async fn delete_worker(&self, namespace: Option<&str>, name: &str) -> Result<()> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let url = self.script_url(namespace, name);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| DeployError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }
        match Self::check_provider_response(response).await {
            Ok(()) => Ok(()),
            Err(DeployError::ProviderCode { code: 10007, .. }) => Ok(()),
            Err(DeployError::Provider(message)) if message.to_lowercase().contains("not found") => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn is_retryable(error: &DeployError) -> bool {
        matches!(error, DeployError::Transport(_))
            || matches!(error, DeployError::Provider(message) if message.starts_with("5"))
    }

    async fn check_provider_response(response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            return Ok(());
        }
        Self::error_from_response(response).await
    }

    async fn check_provider_response_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            return response.json().await.map_err(|e| DeployError::Transport(e.to_string()));
        }
        Err(Self::error_from_response(response).await.unwrap_err())
    }

    async fn error_from_response(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if let Some(code) = body.get("code").and_then(Value::as_i64) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(DeployError::ProviderCode { code, message });
        }
        if status.as_u16() >= 500 {
            return Err(DeployError::Provider(status.to_string()));
        }
        Err(DeployError::Provider(format!("{status}: {body}")))
    }
}

fn filter_migration_class(metadata: &mut Value, class: &str) {
    let Some(migrations) = metadata.get_mut("migrations").and_then(Value::as_array_mut) else {
        return;
    };
    for migration in migrations.iter_mut() {
        if let Some(classes) = migration.get_mut("new_classes").and_then(Value::as_array_mut) {
            classes.retain(|c| c.as_str() != Some(class));
        }
    }
    migrations.retain(|m| {
        m.get("new_classes")
            .and_then(Value::as_array)
            .map(|c| !c.is_empty())
            .unwrap_or(false)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Asset;
    use serde_json::json;

    fn config() -> ProviderConfig {
        ProviderConfig {
            base_url: "https://provider.test".into(),
            account_id: "acct".into(),
            api_token: "tok".into(),
        }
    }

    #[test]
    fn filter_migration_class_strips_named_class_and_drops_emptied_migration() {
        let mut metadata = json!({
            "migrations": [
                { "tag": "v1", "new_classes": ["Foo", "Bar"] },
                { "tag": "v2", "new_classes": ["Baz"] },
            ]
        });
        filter_migration_class(&mut metadata, "Baz");
        let migrations = metadata["migrations"].as_array().unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0]["new_classes"], json!(["Foo", "Bar"]));
    }

    #[test]
    fn deploy_rejects_invalid_worker_name() {
        let client = DeploymentClient::new(config());
        assert!(!is_valid_worker_name("bad name!"));
        let _ = client; // constructed successfully with no network call
    }

    #[test]
    fn build_metadata_includes_assets_binding_only_when_jwt_present() {
        let client = DeploymentClient::new(config());
        let without = client.build_metadata(&[], None, vec![]);
        assert_eq!(without["bindings"].as_array().unwrap().len(), 0);
        assert!(without.get("assets").is_none());

        let with = client.build_metadata(&[], Some("jwt-123"), vec![]);
        assert_eq!(with["assets"]["jwt"], json!("jwt-123"));
        assert!(with["bindings"]
            .as_array()
            .unwrap()
            .iter()
            .any(|b| b["name"] == json!("ASSETS")));
    }

    #[test]
    fn manifest_builds_dedup_content_map() {
        let manifest = build_manifest(&[
            Asset { path: "a.txt".into(), bytes: b"x".to_vec(), mime: "text/plain".into() },
        ]);
        assert_eq!(manifest.manifest.len(), 1);
    }

    #[tokio::test]
    async fn asset_deduplication_reuses_session_jwt_with_zero_upload_batches() {
        use wiremock::matchers::{method, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path_regex(r"/accounts/acct/workers/dispatch/namespaces/default/scripts/my-worker/assets-upload-session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jwt": "session-jwt-abc",
                "buckets": [],
            })))
            .expect(1)
            .mount(&server)
            .await;

        // No upload-batch mock registered: any call to it would fail the
        // test with a connection error, proving zero batch POSTs occurred.

        Mock::given(method("PUT"))
            .and(path_regex(r"/accounts/acct/workers/dispatch/namespaces/default/scripts/my-worker$"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = DeploymentClient::new(ProviderConfig {
            base_url: server.uri(),
            account_id: "acct".into(),
            api_token: "tok".into(),
        });

        let assets: Vec<Asset> = (0..10)
            .map(|i| Asset {
                path: format!("/file{i}.txt"),
                bytes: format!("asset {i}").into_bytes(),
                mime: "text/plain".into(),
            })
            .collect();

        let request = DeployRequest {
            worker_name: "my-worker".into(),
            artifacts: vec![],
            assets,
            worker_script: b"export default { fetch() {} };".to_vec(),
            env_vars: vec![],
            dispatch_namespace: None,
        };

        let result = client.deploy(request, vec![]).await.unwrap();
        assert_eq!(result.assets_jwt.as_deref(), Some("session-jwt-abc"));
    }
}
