//! Embedded key-value cache for credentials that outlive a process
//!
//! Entries carry an absolute expiry and read as missing once it has passed.
//! The Amadeus access token is kept here so a restart does not force a new
//! client-credentials exchange.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use fjall::Keyspace;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::task;

#[derive(Serialize, Deserialize)]
struct Entry<T> {
    value: T,
    /// Unix timestamp in seconds
    expires_at: i64,
}

pub struct PersistentCache {
    keyspace: Keyspace,
}

impl PersistentCache {
    /// Opens (or creates) the cache database under `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open()?;
        let keyspace = db.keyspace("credentials", fjall::KeyspaceCreateOptions::default)?;
        Ok(Self { keyspace })
    }

    /// Stores `value` until `expires_at`
    #[tracing::instrument(level = "debug", skip(self, value))]
    pub async fn put_until<T: Serialize>(
        &self,
        key: &str,
        value: T,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let bytes = postcard::to_stdvec(&Entry {
            value,
            expires_at: expires_at.timestamp(),
        })?;
        let keyspace = self.keyspace.clone();
        let key = key.as_bytes().to_vec();

        task::spawn_blocking(move || keyspace.insert(key, bytes)).await??;
        Ok(())
    }

    /// Value under `key` unless missing or expired. Expired entries are removed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let keyspace = self.keyspace.clone();
        let key_bytes = key.as_bytes().to_vec();
        let stored = task::spawn_blocking(move || {
            keyspace
                .get(key_bytes)
                .map(|found| found.map(|bytes| bytes.to_vec()))
        })
        .await??;

        let Some(bytes) = stored else {
            return Ok(None);
        };

        let entry: Entry<T> = postcard::from_bytes(&bytes)?;
        if entry.expires_at > Utc::now().timestamp() {
            return Ok(Some(entry.value));
        }

        tracing::debug!("Cached entry expired");
        self.remove(key).await?;
        Ok(None)
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let keyspace = self.keyspace.clone();
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || keyspace.remove(key)).await??;
        Ok(())
    }
}
