use crate::chat::ConversationSummary;
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ClientError, Result};

pub fn default_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "Tradeboard")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Last known conversation list, so a fresh start has something to show
/// before the first fetch returns.
pub struct ConversationCache {
    conn: Connection,
}

impl ConversationCache {
    pub fn open(path: &Path) -> Result<Self> {
        ensure_dir(path).map_err(|e| ClientError::Config(format!("cannot create {}: {e}", path.display())))?;
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_default() -> Result<Self> {
        let path = default_path().ok_or_else(|| ClientError::Config("no data dir".into()))?;
        Self::open(&path)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                raw_json TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Replace the stored snapshot with `conversations`, keeping their order.
    pub fn store(&mut self, conversations: &[ConversationSummary]) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM conversations", [])?;
        for (idx, c) in conversations.iter().enumerate() {
            let raw = serde_json::to_string(c)?;
            tx.execute(
                r#"
                INSERT INTO conversations (id, position, name, updated_at, raw_json)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    position=excluded.position,
                    name=excluded.name,
                    updated_at=excluded.updated_at,
                    raw_json=excluded.raw_json
                "#,
                params![c.id.as_str(), idx as i64, c.name, now, raw],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Stored summaries in list order. Rows that no longer decode are skipped.
    pub fn load(&self) -> Result<Vec<ConversationSummary>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, raw_json FROM conversations ORDER BY position ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for r in rows {
            let (id, raw) = r?;
            match serde_json::from_str::<ConversationSummary>(&raw) {
                Ok(summary) => out.push(summary),
                Err(e) => log::warn!("dropping cached conversation {}: {}", id, e),
            }
        }
        Ok(out)
    }

    pub fn last_stored_at(&self) -> Result<Option<i64>> {
        let ts: Option<i64> = self
            .conn
            .query_row("SELECT MAX(updated_at) FROM conversations", [], |row| row.get(0))?;
        Ok(ts)
    }
}
