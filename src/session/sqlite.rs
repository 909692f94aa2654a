//! Durable session store backed by a SQLite file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::store::SessionStore;
use super::{SessionState, StateMap};
use crate::error::WeaveError;
use crate::types::{Role, Turn, TurnContent};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    app_name TEXT NOT NULL,
    id TEXT NOT NULL,
    state_json TEXT NOT NULL,
    next_ordinal INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (app_name, id)
);
CREATE TABLE IF NOT EXISTS turns (
    app_name TEXT NOT NULL,
    session_id TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    role TEXT NOT NULL,
    author TEXT,
    content_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (app_name, session_id, ordinal),
    FOREIGN KEY (app_name, session_id) REFERENCES sessions(app_name, id) ON DELETE CASCADE
);
";

/// Sessions in two tables, `sessions` and `turns`.
///
/// Runs in WAL mode with `synchronous=FULL`; each save is one transaction
/// committed before the call returns.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WeaveError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "opened sqlite session store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database with the same schema.
    pub fn open_in_memory() -> Result<Self, WeaveError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, WeaveError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, WeaveError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut guard)
        })
        .await
        .map_err(|e| WeaveError::upstream("sqlite", format!("storage task failed: {e}")))?
    }
}

struct TurnRow {
    ordinal: i64,
    role: String,
    author: Option<String>,
    content_json: String,
    created_at: String,
}

fn parse_time(session_id: &str, raw: &str) -> Result<DateTime<Utc>, WeaveError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| WeaveError::corrupted(session_id, format!("bad timestamp '{raw}': {e}")))
}

fn decode_turn(session_id: &str, row: TurnRow) -> Result<Turn, WeaveError> {
    let ordinal = u64::try_from(row.ordinal)
        .map_err(|_| WeaveError::corrupted(session_id, format!("negative ordinal {}", row.ordinal)))?;
    let role: Role = row
        .role
        .parse()
        .map_err(|_| WeaveError::corrupted(session_id, format!("unknown role '{}'", row.role)))?;
    let content: TurnContent = serde_json::from_str(&row.content_json).map_err(|e| {
        WeaveError::corrupted(session_id, format!("turn {ordinal} content is malformed: {e}"))
    })?;
    Ok(Turn {
        ordinal,
        role,
        author: row.author,
        content,
        timestamp: parse_time(session_id, &row.created_at)?,
    })
}

fn load_state(
    conn: &Connection,
    app_name: &str,
    session_id: &str,
) -> Result<Option<SessionState>, WeaveError> {
    let header = conn
        .query_row(
            "SELECT state_json, next_ordinal, created_at, updated_at
             FROM sessions WHERE app_name = ?1 AND id = ?2",
            [app_name, session_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((state_json, next_ordinal, created_at, updated_at)) = header else {
        return Ok(None);
    };

    let values: StateMap = serde_json::from_str(&state_json)
        .map_err(|e| WeaveError::corrupted(session_id, format!("state is malformed: {e}")))?;
    let next_ordinal = u64::try_from(next_ordinal)
        .map_err(|_| WeaveError::corrupted(session_id, format!("negative next ordinal {next_ordinal}")))?;

    let mut stmt = conn.prepare(
        "SELECT ordinal, role, author, content_json, created_at
         FROM turns WHERE app_name = ?1 AND session_id = ?2 ORDER BY rowid",
    )?;
    let rows = stmt.query_map([app_name, session_id], |row| {
        Ok(TurnRow {
            ordinal: row.get(0)?,
            role: row.get(1)?,
            author: row.get(2)?,
            content_json: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;
    let mut turns = Vec::new();
    for row in rows {
        turns.push(decode_turn(session_id, row?)?);
    }

    let state = SessionState {
        session_id: session_id.to_string(),
        app_name: app_name.to_string(),
        turns,
        values,
        next_ordinal,
        created_at: parse_time(session_id, &created_at)?,
        updated_at: parse_time(session_id, &updated_at)?,
    };
    state
        .check_integrity()
        .map_err(|reason| WeaveError::corrupted(session_id, reason))?;
    Ok(Some(state))
}

fn save_state(conn: &mut Connection, state: &SessionState) -> Result<(), WeaveError> {
    let session_id = state.session_id.as_str();
    let state_json = serde_json::to_string(&state.values)?;
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO sessions (id, app_name, state_json, next_ordinal, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(app_name, id) DO UPDATE SET
             state_json = excluded.state_json,
             next_ordinal = excluded.next_ordinal,
             updated_at = excluded.updated_at",
        params![
            session_id,
            state.app_name,
            state_json,
            state.next_ordinal as i64,
            state.created_at.to_rfc3339(),
            state.updated_at.to_rfc3339(),
        ],
    )?;
    tx.execute(
        "DELETE FROM turns WHERE app_name = ?1 AND session_id = ?2",
        [state.app_name.as_str(), session_id],
    )?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO turns (app_name, session_id, ordinal, role, author, content_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for turn in &state.turns {
            insert.execute(params![
                state.app_name,
                session_id,
                turn.ordinal as i64,
                turn.role.to_string(),
                turn.author,
                serde_json::to_string(&turn.content)?,
                turn.timestamp.to_rfc3339(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn load(&self, app_name: &str, session_id: &str) -> Result<Option<SessionState>, WeaveError> {
        let app = app_name.to_string();
        let id = session_id.to_string();
        self.with_conn(move |conn| load_state(conn, &app, &id)).await
    }

    async fn save(&self, state: &SessionState) -> Result<(), WeaveError> {
        state
            .check_integrity()
            .map_err(|reason| WeaveError::corrupted(&state.session_id, reason))?;
        let state = state.clone();
        self.with_conn(move |conn| save_state(conn, &state)).await
    }

    async fn delete(&self, app_name: &str, session_id: &str) -> Result<bool, WeaveError> {
        let app = app_name.to_string();
        let id = session_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM turns WHERE app_name = ?1 AND session_id = ?2",
                [&app, &id],
            )?;
            let removed = tx.execute("DELETE FROM sessions WHERE app_name = ?1 AND id = ?2", [&app, &id])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list(&self, app_name: &str) -> Result<Vec<String>, WeaveError> {
        let app = app_name.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT id FROM sessions WHERE app_name = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map([&app], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
    }

    async fn close(&self) -> Result<(), WeaveError> {
        if self.path.is_none() {
            return Ok(());
        }
        self.with_conn(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
            Ok(())
        })
        .await
    }

    fn is_durable(&self) -> bool {
        self.path.is_some()
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}
