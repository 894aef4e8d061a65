//! Entry sources - where import batches come from
//!
//! - HttpEntrySource: the public JSON feed, with bounded retry
//! - FileEntrySource: the same format from a local file
//! - StaticEntrySource: a fixed list

use async_trait::async_trait;
use dex_core::RecordDraft;
use dex_core::config::ImportConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Entry source errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Source responded with status {0}")]
    Status(u16),

    #[error("Failed to decode entries: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl SourceError {
    /// Transport faults and server-side statuses are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Http(_) => true,
            SourceError::Status(status) => *status >= 500 || *status == 429,
            SourceError::Decode(_) | SourceError::Io(_) => false,
        }
    }
}

/// One entry of the external feed
///
/// Field names follow the feed (`"#"`, `"Sp. Atk"`, ...). Absent or null
/// attributes become 0 / false / no category when turned into a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEntry {
    /// Candidate unique key
    #[serde(rename = "#")]
    pub number: i64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type 1", default)]
    pub type_1: Option<String>,
    #[serde(rename = "Type 2", default)]
    pub type_2: Option<String>,
    #[serde(rename = "Total", default)]
    pub total: Option<i64>,
    #[serde(rename = "HP", default)]
    pub hp: Option<i64>,
    #[serde(rename = "Attack", default)]
    pub attack: Option<i64>,
    #[serde(rename = "Defense", default)]
    pub defense: Option<i64>,
    #[serde(rename = "Sp. Atk", default)]
    pub sp_atk: Option<i64>,
    #[serde(rename = "Sp. Def", default)]
    pub sp_def: Option<i64>,
    #[serde(rename = "Speed", default)]
    pub speed: Option<i64>,
    #[serde(rename = "Generation", default)]
    pub generation: Option<i64>,
    #[serde(rename = "Legendary", default)]
    pub legendary: Option<bool>,
}

impl ExternalEntry {
    /// Entry with only the key and name set
    pub fn new(number: i64, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            type_1: None,
            type_2: None,
            total: None,
            hp: None,
            attack: None,
            defense: None,
            sp_atk: None,
            sp_def: None,
            speed: None,
            generation: None,
            legendary: None,
        }
    }

    /// Build the row for this entry under its assigned key
    pub fn to_draft(&self, number: i64) -> RecordDraft {
        RecordDraft {
            number,
            name: self.name.clone(),
            category_primary: non_empty(&self.type_1),
            category_secondary: non_empty(&self.type_2),
            total: self.total.unwrap_or(0),
            hp: self.hp.unwrap_or(0),
            attack: self.attack.unwrap_or(0),
            defense: self.defense.unwrap_or(0),
            sp_atk: self.sp_atk.unwrap_or(0),
            sp_def: self.sp_def.unwrap_or(0),
            speed: self.speed.unwrap_or(0),
            generation: self.generation.unwrap_or(0),
            legendary: self.legendary.unwrap_or(false),
        }
    }
}

// The feed uses "" for "no secondary type".
fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

fn decode(bytes: &[u8]) -> Result<Vec<ExternalEntry>, SourceError> {
    serde_json::from_slice(bytes).map_err(|e| SourceError::Decode(e.to_string()))
}

/// Source of import entries
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// Human-readable origin, for logs and reports
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<ExternalEntry>, SourceError>;
}

/// HTTP JSON feed
#[derive(Debug, Clone)]
pub struct HttpEntrySource {
    url: String,
    client: reqwest::Client,
    /// Attempts including the first one
    max_attempts: u32,
    /// Linear backoff step between attempts
    backoff: Duration,
}

impl HttpEntrySource {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        max_attempts: u32,
        backoff: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Http(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
            max_attempts: max_attempts.max(1),
            backoff,
        })
    }

    pub fn from_config(config: &ImportConfig) -> Result<Self, SourceError> {
        Self::new(
            config.source_url.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    async fn fetch_once(&self) -> Result<Vec<ExternalEntry>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;
        decode(&body)
    }
}

#[async_trait]
impl EntrySource for HttpEntrySource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<ExternalEntry>, SourceError> {
        let mut attempt = 1;
        loop {
            debug!(url = %self.url, attempt, "Fetching import entries");
            match self.fetch_once().await {
                Ok(entries) => return Ok(entries),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(url = %self.url, attempt, error = %err, "Fetch failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// JSON feed stored on disk
#[derive(Debug, Clone)]
pub struct FileEntrySource {
    path: PathBuf,
}

impl FileEntrySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EntrySource for FileEntrySource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<ExternalEntry>, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SourceError::Io(e.to_string()))?;
        decode(&bytes)
    }
}

/// Fixed list of entries
#[derive(Debug, Clone, Default)]
pub struct StaticEntrySource {
    entries: Vec<ExternalEntry>,
}

impl StaticEntrySource {
    pub fn new(entries: Vec<ExternalEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl EntrySource for StaticEntrySource {
    fn describe(&self) -> String {
        format!("static ({} entries)", self.entries.len())
    }

    async fn fetch(&self) -> Result<Vec<ExternalEntry>, SourceError> {
        Ok(self.entries.clone())
    }
}
