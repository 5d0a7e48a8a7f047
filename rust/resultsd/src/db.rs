use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::config;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(config::DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS projects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            school_info_json TEXT,
            students_json TEXT NOT NULL,
            student_count INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_projects_updated ON projects(updated_at)",
        [],
    )?;

    // Provenance columns arrived after the first schema; add when missing.
    ensure_projects_source_columns(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS outbox(
            id TEXT PRIMARY KEY,
            project_id TEXT,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            recipient TEXT NOT NULL,
            subject TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(project_id) REFERENCES projects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_outbox_status ON outbox(status)",
        [],
    )?;

    Ok(conn)
}

fn ensure_projects_source_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "projects", "source_file")? {
        conn.execute("ALTER TABLE projects ADD COLUMN source_file TEXT", [])?;
    }
    if !table_has_column(conn, "projects", "source_sha256")? {
        conn.execute("ALTER TABLE projects ADD COLUMN source_sha256 TEXT", [])?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn open_is_idempotent_and_adds_source_columns() {
        let ws = temp_dir("resultsd-db-open");
        let conn = open_db(&ws).expect("open");
        assert!(table_has_column(&conn, "projects", "source_sha256").expect("pragma"));
        drop(conn);
        let conn = open_db(&ws).expect("reopen");
        assert!(table_has_column(&conn, "projects", "source_file").expect("pragma"));
        assert!(!table_has_column(&conn, "projects", "nope").expect("pragma"));
    }

    #[test]
    fn settings_roundtrip_and_overwrite() {
        let ws = temp_dir("resultsd-db-settings");
        let conn = open_db(&ws).expect("open");
        assert_eq!(settings_get_json(&conn, "setup.display").expect("get"), None);
        settings_set_json(&conn, "setup.display", &json!({ "term": "First" })).expect("set");
        settings_set_json(&conn, "setup.display", &json!({ "term": "Second" })).expect("set");
        assert_eq!(
            settings_get_json(&conn, "setup.display").expect("get"),
            Some(json!({ "term": "Second" }))
        );
    }
}
