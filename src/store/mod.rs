//! File-backed artifact store with TTL metadata and a run-history log.
//!
//! Artifacts are one JSON document per key under `<home>/artifacts/`, written
//! via temp-file + rename so readers never observe a partial document.
//! Phase run history is append-only JSONL (`<home>/runs.jsonl`), pruned to a
//! bounded recent window.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::domain::{Freshness, PhaseName, PhaseRun, StoredArtifact};

/// Durable keyed storage for produced artifacts.
///
/// `get` never blocks on a producer and happily returns stale entries;
/// callers decide whether stale is acceptable. A missing key is a normal
/// outcome (`Ok(None)`), not an error.
pub struct ArtifactStore {
    artifacts_dir: PathBuf,
    runs_path: PathBuf,
}

impl ArtifactStore {
    /// Create or open a store rooted at `home`
    pub async fn open(home: &Path) -> Result<Self> {
        let artifacts_dir = home.join("artifacts");
        fs::create_dir_all(&artifacts_dir)
            .await
            .with_context(|| format!("failed to create {}", artifacts_dir.display()))?;

        Ok(Self {
            artifacts_dir,
            runs_path: home.join("runs.jsonl"),
        })
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.artifacts_dir.join(format!("{}.json", key))
    }

    /// Write a new version for `key`, overwriting any previous one atomically.
    /// Returns the stored document including its `produced_at`.
    pub async fn put(
        &self,
        key: &str,
        payload: serde_json::Value,
        ttl: Duration,
    ) -> Result<StoredArtifact> {
        let artifact = StoredArtifact::new(key, payload, ttl);
        let text = serde_json::to_string(&artifact).context("failed to serialize artifact")?;

        let path = self.document_path(key);
        let tmp = self.artifacts_dir.join(format!("{}.json.tmp", key));

        fs::write(&tmp, text.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to replace {}", path.display()))?;

        debug!(key, hash = %artifact.payload_hash, "artifact written");
        Ok(artifact)
    }

    /// Read the latest version for `key`, stale or not
    pub async fn get(&self, key: &str) -> Result<Option<StoredArtifact>> {
        let path = self.document_path(key);

        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        let artifact = serde_json::from_str(&text)
            .with_context(|| format!("corrupt artifact document {}", path.display()))?;
        Ok(Some(artifact))
    }

    /// Advisory freshness of `key` at `now`
    pub async fn status(&self, key: &str, now: DateTime<Utc>) -> Result<Freshness> {
        Ok(match self.get(key).await? {
            Some(artifact) => artifact.freshness(now),
            None => Freshness::Missing,
        })
    }

    /// Read an input artifact together with its freshness at `now`
    pub async fn read_input(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<(Option<StoredArtifact>, Freshness)> {
        Ok(match self.get(key).await? {
            Some(artifact) => {
                let freshness = artifact.freshness(now);
                (Some(artifact), freshness)
            }
            None => (None, Freshness::Missing),
        })
    }

    /// Hard-retention sweep: delete documents produced more than `retention`
    /// ago. Independent of advisory TTL staleness. Returns evicted count.
    pub async fn evict_expired(&self, now: DateTime<Utc>, retention: Duration) -> Result<usize> {
        let mut evicted = 0;
        let mut entries = fs::read_dir(&self.artifacts_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let Ok(text) = fs::read_to_string(&path).await else {
                continue;
            };
            let Ok(artifact) = serde_json::from_str::<StoredArtifact>(&text) else {
                continue;
            };

            if now - artifact.produced_at > retention {
                fs::remove_file(&path)
                    .await
                    .with_context(|| format!("failed to evict {}", path.display()))?;
                debug!(key = %artifact.key, "artifact evicted by retention");
                evicted += 1;
            }
        }

        Ok(evicted)
    }

    /// Append a terminal phase run to the history log
    pub async fn append_run(&self, run: &PhaseRun) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.runs_path)
            .await
            .with_context(|| format!("failed to open {}", self.runs_path.display()))?;

        let json = serde_json::to_string(run).context("failed to serialize phase run")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("failed to write phase run")?;
        file.flush().await.context("failed to flush phase run")?;

        Ok(())
    }

    /// All recorded runs in append order
    pub async fn runs(&self) -> Result<Vec<PhaseRun>> {
        if !self.runs_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.runs_path)
            .await
            .with_context(|| format!("failed to open {}", self.runs_path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut runs = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let run: PhaseRun = serde_json::from_str(&line)
                .with_context(|| format!("failed to parse phase run: {}", line))?;
            runs.push(run);
        }

        Ok(runs)
    }

    /// The most recent recorded run for `phase`, if any
    pub async fn last_run(&self, phase: PhaseName) -> Result<Option<PhaseRun>> {
        let runs = self.runs().await?;
        Ok(runs.into_iter().rev().find(|r| r.phase == phase))
    }

    /// Keep only the newest `keep` runs in the log. History is advisory;
    /// pruning never affects pipeline correctness.
    pub async fn prune_runs(&self, keep: usize) -> Result<usize> {
        let runs = self.runs().await?;
        if runs.len() <= keep {
            return Ok(0);
        }

        let pruned = runs.len() - keep;
        let recent = &runs[pruned..];

        let mut text = String::new();
        for run in recent {
            text.push_str(&serde_json::to_string(run)?);
            text.push('\n');
        }

        let tmp = self.runs_path.with_extension("jsonl.tmp");
        fs::write(&tmp, text.as_bytes()).await?;
        fs::rename(&tmp, &self.runs_path).await?;

        debug!(pruned, keep, "run history pruned");
        Ok(pruned)
    }
}
