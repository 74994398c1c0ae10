#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use judgesync_adapters::AdapterContext;
use judgesync_storage::{Fetch, FetchError};
use tokio::time::Instant;

pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .expect("workspace root")
}

pub fn fixture(domain: &str, file: &str) -> Vec<u8> {
    let path = workspace_root()
        .join("fixtures")
        .join(domain)
        .join("sample")
        .join(file);
    fs::read(&path).unwrap_or_else(|err| panic!("reading {}: {err}", path.display()))
}

pub fn ctx_at(secs: i64) -> AdapterContext {
    let at: DateTime<Utc> = Utc.timestamp_opt(secs, 0).single().expect("valid timestamp");
    AdapterContext::new(at)
}

/// Serves canned bodies by exact URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct FixtureFetch {
    routes: HashMap<String, Result<Vec<u8>, u16>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl FixtureFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(url.into(), Ok(body.into()));
        self
    }

    pub fn fixture(self, url: impl Into<String>, domain: &str, file: &str) -> Self {
        self.route(url, fixture(domain, file))
    }

    pub fn status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.routes.insert(url.into(), Err(status));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.timed_calls().into_iter().map(|(url, _)| url).collect()
    }

    /// Every request with the (possibly paused) clock reading it was made at.
    pub fn timed_calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Fetch for FixtureFetch {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((url.to_string(), Instant::now()));
        match self.routes.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::HttpStatus {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(FetchError::HttpStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}
