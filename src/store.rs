//! Injected key-value persistence.
//!
//! Every durable client-side artifact goes through [`KeyValueStore`], so the
//! throttle can be exercised against [`MemoryStore`] in tests and against the
//! workspace database in the sidecar.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::db;

pub trait KeyValueStore {
    fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<serde_json::Value>>;
    fn set(&mut self, namespace: &str, key: &str, value: &serde_json::Value) -> anyhow::Result<()>;
}

/// Store backed by `<workspace>/eknows.sqlite3`. Writes are synchronous.
pub struct SqliteStore {
    workspace: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        let conn = db::open_db(workspace)?;
        Ok(Self {
            workspace: workspace.to_path_buf(),
            conn,
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        db::kv_get_json(&self.conn, namespace, key)
    }

    fn set(&mut self, namespace: &str, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        db::kv_set_json(&self.conn, namespace, key, value)
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: std::collections::HashMap<(String, String), serde_json::Value>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self
            .entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn set(&mut self, namespace: &str, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        self.entries
            .insert((namespace.to_string(), key.to_string()), value.clone());
        Ok(())
    }
}
