//! Wire types for the Deployment Client (spec §4.D, §6).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

fn worker_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").unwrap())
}

pub fn is_valid_worker_name(name: &str) -> bool {
    worker_name_pattern().is_match(name)
}

/// A plaintext or sealed-and-already-decrypted environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
    pub is_secret: bool,
}

/// A non-entrypoint file shipped alongside the worker script (spec GLOSSARY).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentFile {
    pub path: String,
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// A static asset destined for the CDN asset store.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub path: String,
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// One `{hash, size}` entry of the upload manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub hash: String,
    pub size: usize,
}

/// `deploy()`'s full input (spec §4.D contract).
pub struct DeployRequest {
    pub worker_name: String,
    pub artifacts: Vec<DeploymentFile>,
    pub assets: Vec<Asset>,
    pub worker_script: Vec<u8>,
    pub env_vars: Vec<EnvVar>,
    pub dispatch_namespace: Option<String>,
}

/// Outcome of a successful deploy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployResult {
    pub script_name: String,
    pub assets_jwt: Option<String>,
}

/// `{path -> {hash, size}}` plus `{hash -> bytes+mime}`, built by
/// [`crate::manifest::build_manifest`].
pub struct AssetManifest {
    pub manifest: HashMap<String, ManifestEntry>,
    pub content: HashMap<String, (Vec<u8>, String)>,
}

#[derive(Debug, Deserialize)]
pub struct UploadSessionResponse {
    pub jwt: String,
    pub buckets: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UploadBatchResponse {
    pub jwt: Option<String>,
}
