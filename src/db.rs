use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "eknows.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.to_string_lossy()))?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    // One row per namespaced key; values are JSON text.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv(
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(namespace, key)
        )",
        [],
    )?;
    Ok(())
}

pub fn kv_get_json(
    conn: &Connection,
    namespace: &str,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM kv WHERE namespace = ? AND key = ?",
            (namespace, key),
            |r| r.get(0),
        )
        .optional()?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("stored value for {namespace}.{key} is not valid json"))?;
    Ok(Some(value))
}

pub fn kv_set_json(
    conn: &Connection,
    namespace: &str,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value)?;
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO kv(namespace, key, value, updated_at) VALUES(?, ?, ?, ?)
         ON CONFLICT(namespace, key) DO UPDATE SET
           value = excluded.value,
           updated_at = excluded.updated_at",
        (namespace, key, &raw, &now),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_overwrites_previous_value() {
        let conn = open_in_memory().expect("open");
        kv_set_json(&conn, "ek", "student_attempts", &json!({ "a": 1 })).expect("set");
        kv_set_json(&conn, "ek", "student_attempts", &json!({ "a": 2 })).expect("set");
        let v = kv_get_json(&conn, "ek", "student_attempts").expect("get");
        assert_eq!(v, Some(json!({ "a": 2 })));
    }

    #[test]
    fn namespaces_are_isolated() {
        let conn = open_in_memory().expect("open");
        kv_set_json(&conn, "ek", "k", &json!(1)).expect("set");
        assert_eq!(kv_get_json(&conn, "other", "k").expect("get"), None);
    }

    #[test]
    fn corrupt_value_is_an_error() {
        let conn = open_in_memory().expect("open");
        conn.execute(
            "INSERT INTO kv(namespace, key, value, updated_at) VALUES('ek', 'k', '{oops', '')",
            [],
        )
        .expect("insert");
        assert!(kv_get_json(&conn, "ek", "k").is_err());
    }
}
