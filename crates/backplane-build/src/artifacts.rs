//! Artifact Reader (spec §4.C "Artifacts" and "Folder-as-archive read").

use crate::error::{BuildError, Result};
use crate::sandbox::Sandbox;
use backplane_deploy::{Asset, DeploymentFile};
use std::io::Read;

const WORKER_SCRIPT_NAME: &str = "worker.js";

/// The fixed built-in static-site server, deployed verbatim for every
/// non-Next.js project type (spec §6 "Built-in static worker").
pub const STATIC_WORKER_SCRIPT: &str = r#"
export default {
  async fetch(request, env) {
    let response = await env.ASSETS.fetch(request);
    if (response.status === 404) {
      const url = new URL(request.url);
      const hasExtension = url.pathname.split("/").pop().includes(".");
      if (!url.pathname.endsWith("/") && !hasExtension) {
        response = await env.ASSETS.fetch(new Request(new URL("/index.html", url), request));
      }
      if (response.status === 404 && (request.headers.get("Accept") || "").includes("text/html")) {
        response = await env.ASSETS.fetch(new Request(new URL("/index.html", url), request));
      }
    }
    return response;
  },
};
"#;

/// Parse a gzip-compressed tar stream into `DeploymentFile` records, guessing
/// MIME type from each entry's file extension.
pub fn parse_tar_gz(bytes: &[u8]) -> Result<Vec<DeploymentFile>> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    let mut files = Vec::new();

    for entry in archive.entries().map_err(|e| BuildError::ArchiveExtraction(e.to_string()))? {
        let mut entry = entry.map_err(|e| BuildError::ArchiveExtraction(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| BuildError::ArchiveExtraction(e.to_string()))?
            .to_string_lossy()
            .to_string();
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| BuildError::ArchiveExtraction(e.to_string()))?;
        let mime = mime_guess::from_path(&path).first_or_octet_stream().to_string();
        files.push(DeploymentFile { path, bytes, mime });
    }
    Ok(files)
}

fn deployment_file_to_asset(file: DeploymentFile) -> Asset {
    Asset { path: file.path, bytes: file.bytes, mime: file.mime }
}

pub struct NextjsArtifacts {
    pub worker_script: Vec<u8>,
    pub artifacts: Vec<DeploymentFile>,
    pub assets: Vec<Asset>,
}

/// `nextjs`: `.bundled-app` is a tar of `worker.js` plus supporting
/// artifacts; assets come from `.open-next/assets`.
pub async fn read_nextjs_artifacts(sandbox: &dyn Sandbox) -> Result<NextjsArtifacts> {
    let bundle = sandbox
        .read_dir_as_tar_gz(".bundled-app", &[])
        .await
        .map_err(|e| BuildError::ArchiveExtraction(e.to_string()))?;
    let mut files = parse_tar_gz(&bundle)?;

    let worker_index = files
        .iter()
        .position(|f| f.path.ends_with(WORKER_SCRIPT_NAME))
        .ok_or_else(|| BuildError::ArchiveExtraction("bundled app has no worker.js".to_string()))?;
    let worker_script = files.remove(worker_index).bytes;

    let assets_archive = sandbox
        .read_dir_as_tar_gz(".open-next/assets", &[])
        .await
        .map_err(|e| BuildError::ArchiveExtraction(e.to_string()))?;
    let assets = parse_tar_gz(&assets_archive)?
        .into_iter()
        .map(deployment_file_to_asset)
        .collect();

    Ok(NextjsArtifacts { worker_script, artifacts: files, assets })
}

pub struct StaticArtifacts {
    pub worker_script: Vec<u8>,
    pub assets: Vec<Asset>,
}

/// Any static project type: assets come from `.static-site/assets`; the
/// worker script is the fixed built-in static server.
pub async fn read_static_artifacts(sandbox: &dyn Sandbox) -> Result<StaticArtifacts> {
    let assets_archive = sandbox
        .read_dir_as_tar_gz(".static-site/assets", &[])
        .await
        .map_err(|e| BuildError::ArchiveExtraction(e.to_string()))?;
    let assets = parse_tar_gz(&assets_archive)?
        .into_iter()
        .map(deployment_file_to_asset)
        .collect();

    Ok(StaticArtifacts { worker_script: STATIC_WORKER_SCRIPT.as_bytes().to_vec(), assets })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let buffer = Vec::new();
        let encoder = flate2::write::GzEncoder::new(buffer, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, bytes) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, path, *bytes).unwrap();
        }
        let encoder = builder.into_inner().unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn parse_tar_gz_extracts_files_with_guessed_mime() {
        let archive = make_tar_gz(&[("worker.js", b"export default {}"), ("index.html", b"<html></html>")]);
        let files = parse_tar_gz(&archive).unwrap();
        assert_eq!(files.len(), 2);
        let html = files.iter().find(|f| f.path == "index.html").unwrap();
        assert_eq!(html.mime, "text/html");
    }

    #[test]
    fn static_worker_script_retries_index_html_on_404() {
        assert!(STATIC_WORKER_SCRIPT.contains("index.html"));
        assert!(STATIC_WORKER_SCRIPT.contains("ASSETS.fetch"));
    }
}
