//! The executor sandbox contract (spec §1 Non-goals: "the isolated build
//! executor (shell, git, tar, base64)" is explicitly out of scope as a
//! concrete implementation — this module is the seam, plus a local
//! reference implementation for dev/test use). Grounded on
//! `backplane_core::storage::Durable`'s async-trait-over-local-reference-impl
//! pattern.

use async_trait::async_trait;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

pub type Result<T> = std::result::Result<T, SandboxError>;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox io error: {0}")]
    Io(String),
    #[error("command failed: {0}")]
    Command(String),
}

impl From<std::io::Error> for SandboxError {
    fn from(e: std::io::Error) -> Self {
        SandboxError::Io(e.to_string())
    }
}

/// One raw event out of a running shell command, as the underlying executor
/// streams it (spec §4.C "runScript contract").
#[derive(Debug, Clone)]
pub enum SandboxEvent {
    Log(String),
    Error(String),
    Complete(i32),
}

pub type EventStream = Pin<Box<dyn Stream<Item = SandboxEvent> + Send>>;

/// A single build's isolated execution environment: one per `buildId`, kept
/// alive for the duration of `run()` and destroyed on every exit path
/// (spec §5 "Shared resources").
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn git_checkout(&self, clone_url: &str, branch: Option<&str>) -> Result<()>;

    /// `grep -q "filter=lfs" .gitattributes` against the checked-out tree.
    async fn has_git_lfs(&self) -> Result<bool>;

    async fn git_lfs_pull(&self) -> Result<()>;

    async fn head_commit(&self) -> Result<String>;

    async fn write_file(&self, relative_path: &str, bytes: &[u8]) -> Result<()>;

    async fn extract_tar_gz(&self, archive_relative_path: &str, dest_relative_dir: &str) -> Result<()>;

    async fn run_script(&self, command: &str, cwd: Option<&str>, env: &[(String, String)]) -> Result<EventStream>;

    /// Tar a directory (with optional excludes) and read it back fully
    /// (spec §4.C "Folder-as-archive read"); a real executor would chunk
    /// this through a base64 `dd` loop to respect a streaming size limit
    /// (spec §9), which this in-process implementation has no need for.
    async fn read_dir_as_tar_gz(&self, relative_dir: &str, excludes: &[String]) -> Result<Vec<u8>>;

    async fn read_file(&self, relative_path: &str) -> Result<Vec<u8>>;

    async fn delete_file(&self, relative_path: &str) -> Result<()>;

    /// Best-effort; the caller never propagates a destroy failure.
    async fn destroy(&self);
}

/// Shells out to a real `git`/`tar`/shell on the local machine, rooted at a
/// per-build temp directory. Intended for local/dev use and tests; a remote
/// sandbox is a second implementation of the same trait.
pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    pub async fn create(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    fn project_dir(&self) -> PathBuf {
        self.root.join("workspace/project")
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn git_checkout(&self, clone_url: &str, branch: Option<&str>) -> Result<()> {
        let project_dir = self.project_dir();
        tokio::fs::create_dir_all(project_dir.parent().unwrap()).await?;
        let mut args = vec!["clone".to_string()];
        if let Some(branch) = branch {
            args.push("--branch".to_string());
            args.push(branch.to_string());
        }
        args.push(clone_url.to_string());
        args.push(project_dir.to_string_lossy().to_string());

        let output = Command::new("git").args(&args).output().await?;
        if !output.status.success() {
            return Err(SandboxError::Command(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(())
    }

    async fn has_git_lfs(&self) -> Result<bool> {
        let attrs_path = self.project_dir().join(".gitattributes");
        match tokio::fs::read_to_string(&attrs_path).await {
            Ok(contents) => Ok(contents.contains("filter=lfs")),
            Err(_) => Ok(false),
        }
    }

    async fn git_lfs_pull(&self) -> Result<()> {
        let project_dir = self.project_dir();
        for args in [vec!["lfs", "install"], vec!["lfs", "pull"]] {
            let output = Command::new("git").args(&args).current_dir(&project_dir).output().await?;
            if !output.status.success() {
                return Err(SandboxError::Command(String::from_utf8_lossy(&output.stderr).to_string()));
            }
        }
        Ok(())
    }

    async fn head_commit(&self) -> Result<String> {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(self.project_dir())
            .output()
            .await?;
        if !output.status.success() {
            return Err(SandboxError::Command(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn write_file(&self, relative_path: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(relative_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn extract_tar_gz(&self, archive_relative_path: &str, dest_relative_dir: &str) -> Result<()> {
        let archive_path = self.path(archive_relative_path);
        let dest_path = self.path(dest_relative_dir);
        tokio::fs::create_dir_all(&dest_path).await?;

        let archive_path = archive_path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let file = std::fs::File::open(&archive_path)?;
            let decoder = flate2::read::GzDecoder::new(file);
            let mut archive = tar::Archive::new(decoder);
            archive.unpack(&dest_path)
        })
        .await
        .map_err(|e| SandboxError::Io(e.to_string()))??;
        Ok(())
    }

    async fn run_script(&self, command: &str, cwd: Option<&str>, env: &[(String, String)]) -> Result<EventStream> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd.current_dir(cwd.map(|c| self.path(c)).unwrap_or_else(|| self.project_dir()));
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| SandboxError::Command(e.to_string()))?;
        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut stdout_lines = BufReader::new(stdout).lines();
            let mut stderr_lines = BufReader::new(stderr).lines();

            loop {
                tokio::select! {
                    line = stdout_lines.next_line() => {
                        match line {
                            Ok(Some(line)) => {
                                if tx.send(SandboxEvent::Log(line)).await.is_err() { return; }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                let _ = tx.send(SandboxEvent::Error(e.to_string())).await;
                                return;
                            }
                        }
                    }
                    line = stderr_lines.next_line() => {
                        match line {
                            Ok(Some(line)) => {
                                if tx.send(SandboxEvent::Log(line)).await.is_err() { return; }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                let _ = tx.send(SandboxEvent::Error(e.to_string())).await;
                                return;
                            }
                        }
                    }
                }
            }

            match child.wait().await {
                Ok(status) => {
                    let _ = tx.send(SandboxEvent::Complete(status.code().unwrap_or(-1))).await;
                }
                Err(e) => {
                    let _ = tx.send(SandboxEvent::Error(e.to_string())).await;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn read_dir_as_tar_gz(&self, relative_dir: &str, excludes: &[String]) -> Result<Vec<u8>> {
        let dir = self.path(relative_dir);
        let excludes = excludes.to_vec();
        tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
            let buffer = Vec::new();
            let encoder = flate2::write::GzEncoder::new(buffer, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            for entry in walk(&dir, &dir, &excludes)? {
                builder.append_path_with_name(&entry.0, &entry.1)?;
            }
            let encoder = builder.into_inner()?;
            encoder.finish()
        })
        .await
        .map_err(|e| SandboxError::Io(e.to_string()))?
        .map_err(SandboxError::from)
    }

    async fn read_file(&self, relative_path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path(relative_path)).await?)
    }

    async fn delete_file(&self, relative_path: &str) -> Result<()> {
        let path = self.path(relative_path);
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn destroy(&self) {
        let _ = tokio::fs::remove_dir_all(&self.root).await;
    }
}

fn walk(root: &std::path::Path, base: &std::path::Path, excludes: &[String]) -> std::io::Result<Vec<(PathBuf, PathBuf)>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(base).unwrap().to_path_buf();
        if excludes.iter().any(|e| relative.to_string_lossy().contains(e.as_str())) {
            continue;
        }
        if path.is_dir() {
            out.extend(walk(&path, base, excludes)?);
        } else {
            out.push((path.clone(), relative));
        }
    }
    Ok(out)
}

/// Strip ANSI/VT control characters, matching the `runScript` contract's
/// "strip VT control characters from each event data" step.
pub fn strip_vt_control_chars(input: &str) -> String {
    input.chars().filter(|c| !c.is_control() || *c == '\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_chars_but_keeps_printable_text() {
        let stripped = strip_vt_control_chars("\u{1b}[31mhello\u{1b}[0m world");
        assert_eq!(stripped, "[31mhello[0m world");
    }

    #[tokio::test]
    async fn local_sandbox_run_script_streams_stdout_lines_then_completes() {
        use tokio_stream::StreamExt;
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::create(tmp.path().join("workspace/project")).await.unwrap();
        let mut stream = sandbox
            .run_script("echo one && echo two", None, &[])
            .await
            .unwrap();

        let mut logs = Vec::new();
        let mut exit_code = None;
        while let Some(event) = stream.next().await {
            match event {
                SandboxEvent::Log(line) => logs.push(line),
                SandboxEvent::Complete(code) => {
                    exit_code = Some(code);
                    break;
                }
                SandboxEvent::Error(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(logs.contains(&"one".to_string()));
        assert!(logs.contains(&"two".to_string()));
        assert_eq!(exit_code, Some(0));
    }

    #[tokio::test]
    async fn local_sandbox_run_script_reports_nonzero_exit_code() {
        use tokio_stream::StreamExt;
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::create(tmp.path().join("workspace/project")).await.unwrap();
        let mut stream = sandbox.run_script("exit 7", None, &[]).await.unwrap();

        let mut exit_code = None;
        while let Some(event) = stream.next().await {
            if let SandboxEvent::Complete(code) = event {
                exit_code = Some(code);
            }
        }
        assert_eq!(exit_code, Some(7));
    }
}
