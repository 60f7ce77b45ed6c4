//! Deployment Client (spec §4.D): worker script and static asset deploy to
//! the edge provider, including the secrets-first flow, asset
//! deduplication, and Durable Object migration-collision retry.

pub mod client;
pub mod error;
pub mod manifest;
pub mod types;

pub use client::{DeploymentClient, Migration};
pub use error::{DeployError, Result};
pub use manifest::build_manifest;
pub use types::{
    is_valid_worker_name, Asset, AssetManifest, DeployRequest, DeployResult, DeploymentFile,
    EnvVar, ManifestEntry,
};
