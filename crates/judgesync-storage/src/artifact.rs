use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

use crate::http::{Fetch, FetchError};

#[derive(Debug, Clone)]
pub struct ArchivedPayload {
    pub content_hash: String,
    pub relative_path: PathBuf,
    pub deduplicated: bool,
}

/// Hash-addressed archive of raw fetched payloads, one directory per run.
#[derive(Debug, Clone)]
pub struct PayloadArchive {
    root: PathBuf,
    run_stamp: String,
}

impl PayloadArchive {
    pub fn new(root: impl Into<PathBuf>, run_started_at: DateTime<Utc>) -> Self {
        Self {
            root: root.into(),
            run_stamp: run_started_at.format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// `<run stamp>/<label>/<sha256>.json`
    pub fn relative_path_for(&self, label: &str, content_hash: &str) -> PathBuf {
        PathBuf::from(&self.run_stamp)
            .join(sanitize_label(label))
            .join(format!("{content_hash}.json"))
    }

    /// Write `bytes` once. Identical payloads within a run share one file.
    pub async fn archive(&self, label: &str, bytes: &[u8]) -> anyhow::Result<ArchivedPayload> {
        let content_hash = Self::sha256_hex(bytes);
        let relative_path = self.relative_path_for(label, &content_hash);
        let target = self.root.join(&relative_path);
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating archive directory {}", parent.display()))?;

        let archived = |deduplicated| ArchivedPayload {
            content_hash: content_hash.clone(),
            relative_path: relative_path.clone(),
            deduplicated,
        };

        if fs::try_exists(&target)
            .await
            .with_context(|| format!("checking archive path {}", target.display()))?
        {
            return Ok(archived(true));
        }

        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening {}", temp_path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing {}", temp_path.display()))?;
        drop(file);

        match fs::rename(&temp_path, &target).await {
            Ok(()) => Ok(archived(false)),
            Err(err) => {
                let _ = fs::remove_file(&temp_path).await;
                if err.kind() == std::io::ErrorKind::AlreadyExists {
                    Ok(archived(true))
                } else {
                    Err(err).with_context(|| {
                        format!("renaming {} -> {}", temp_path.display(), target.display())
                    })
                }
            }
        }
    }
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '-' || c == '.');
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned.to_string()
    }
}

/// [`Fetch`] decorator that archives every successful body under the URL host.
///
/// Archive failures are logged and never fail the fetch.
pub struct ArchivingFetcher<F> {
    inner: F,
    archive: PayloadArchive,
}

impl<F: Fetch> ArchivingFetcher<F> {
    pub fn new(inner: F, archive: PayloadArchive) -> Self {
        Self { inner, archive }
    }
}

#[async_trait]
impl<F: Fetch> Fetch for ArchivingFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let body = self.inner.fetch(url).await?;
        let label = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(ToString::to_string))
            .unwrap_or_default();
        if let Err(err) = self.archive.archive(&label, &body).await {
            warn!(url, error = %err, "failed to archive payload");
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).single().unwrap()
    }

    struct FixedBody(&'static [u8]);

    #[async_trait]
    impl Fetch for FixedBody {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.to_vec())
        }
    }

    #[test]
    fn payload_hashing_is_stable() {
        assert_eq!(
            PayloadArchive::sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn labels_are_path_safe() {
        assert_eq!(sanitize_label("codeforces.com"), "codeforces.com");
        assert_eq!(sanitize_label("../etc"), "etc");
        assert_eq!(sanitize_label(""), "unknown");
    }

    #[tokio::test]
    async fn identical_payloads_are_deduplicated() {
        let dir = tempdir().expect("tempdir");
        let archive = PayloadArchive::new(dir.path(), started());

        let first = archive.archive("yukicoder.me", b"[]").await.expect("first");
        let second = archive.archive("yukicoder.me", b"[]").await.expect("second");

        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(first.relative_path, second.relative_path);
        assert!(first.relative_path.starts_with("20260301_060000/yukicoder.me"));
        assert!(dir.path().join(&first.relative_path).exists());
    }

    #[tokio::test]
    async fn archiving_fetcher_stores_body_under_host() {
        let dir = tempdir().expect("tempdir");
        let archive = PayloadArchive::new(dir.path(), started());
        let fetcher = ArchivingFetcher::new(FixedBody(b"{\"status\":\"OK\"}"), archive.clone());

        let body = fetcher
            .fetch("https://codeforces.com/api/contest.list?gym=false")
            .await
            .unwrap();

        let hash = PayloadArchive::sha256_hex(&body);
        let stored = dir
            .path()
            .join(archive.relative_path_for("codeforces.com", &hash));
        assert!(stored.exists());
    }
}
