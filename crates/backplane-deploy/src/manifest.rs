//! Asset manifest construction (spec §4.D "Assets path", step 1).

use crate::types::{Asset, AssetManifest, ManifestEntry};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// 32 hex characters is the first 16 bytes of the SHA-256 digest.
const HASH_PREFIX_LEN: usize = 32;

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex = hex_encode(&digest);
    hex[..HASH_PREFIX_LEN].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build the `{path -> {hash, size}}` manifest and `{hash -> bytes+mime}`
/// content map for an asset set.
pub fn build_manifest(assets: &[Asset]) -> AssetManifest {
    let mut manifest = HashMap::with_capacity(assets.len());
    let mut content = HashMap::new();

    for asset in assets {
        let hash = content_hash(&asset.bytes);
        manifest.insert(
            normalize_path(&asset.path),
            ManifestEntry { hash: hash.clone(), size: asset.bytes.len() },
        );
        content.entry(hash).or_insert_with(|| (asset.bytes.clone(), asset.mime.clone()));
    }

    AssetManifest { manifest, content }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_32_hex_characters() {
        let manifest = build_manifest(&[Asset {
            path: "index.html".into(),
            bytes: b"hello world".to_vec(),
            mime: "text/html".into(),
        }]);
        let entry = manifest.manifest.get("/index.html").unwrap();
        assert_eq!(entry.hash.len(), 32);
        assert!(entry.hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(entry.size, 11);
    }

    #[test]
    fn paths_are_normalized_to_start_with_slash() {
        let manifest = build_manifest(&[Asset {
            path: "css/app.css".into(),
            bytes: b"body{}".to_vec(),
            mime: "text/css".into(),
        }]);
        assert!(manifest.manifest.contains_key("/css/app.css"));
    }

    #[test]
    fn identical_bytes_dedup_into_one_content_entry() {
        let manifest = build_manifest(&[
            Asset { path: "a.txt".into(), bytes: b"same".to_vec(), mime: "text/plain".into() },
            Asset { path: "b.txt".into(), bytes: b"same".to_vec(), mime: "text/plain".into() },
        ]);
        assert_eq!(manifest.manifest.len(), 2);
        assert_eq!(manifest.content.len(), 1);
        let hash_a = &manifest.manifest["/a.txt"].hash;
        let hash_b = &manifest.manifest["/b.txt"].hash;
        assert_eq!(hash_a, hash_b);
    }
}
