// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Durable log and registry backed by a single-writer embedded SQL engine
//! (SQLite via `rusqlite`, bundled). One connection is held for the lifetime
//! of the store; every operation runs on a blocking thread
//! (`tokio::task::spawn_blocking`) against that shared connection, guarded by
//! a `std::sync::Mutex` so all writes are serialized exactly as the core spec
//! requires ("single connection; all writes pass through a shared mutex").

mod error;
mod schema;
mod types;

pub use error::StoreError;
pub use types::{Account, Broadcast, Memory, MemoryRole, MemorySource, Mysis, MysisState};

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Handle to the persistent store. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl Store {
    /// Open (creating if absent) the SQLite database at `path` and ensure schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = Connection::open(path)?;
            schema::init(&conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Open an in-memory store, primarily for tests.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, StoreError> {
            let conn = Connection::open_in_memory()?;
            schema::init(&conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn_arc = self.conn.clone();
        // Blocking is acceptable here: callers always invoke `run` from inside
        // an async context via the public methods below, never directly.
        let guard = conn_arc.lock().expect("store mutex poisoned");
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(StoreError::Closed),
        }
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.run(f)).await?
    }

    // ── Memories ─────────────────────────────────────────────────────────────

    pub async fn append_memory(
        &self,
        mysis_id: &str,
        role: MemoryRole,
        source: MemorySource,
        sender_id: Option<&str>,
        content: &str,
        reasoning: &str,
    ) -> Result<Memory, StoreError> {
        let mysis_id = mysis_id.to_string();
        let sender_id = sender_id.map(|s| s.to_string());
        let content = content.to_string();
        let reasoning = reasoning.to_string();
        self.run_blocking(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO memories (mysis_id, role, source, sender_id, content, reasoning, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    mysis_id,
                    role.as_str(),
                    source.as_str(),
                    sender_id,
                    content,
                    reasoning,
                    now.to_rfc3339(),
                ],
            )?;
            let id = conn.last_insert_rowid();
            Ok(Memory {
                id,
                mysis_id,
                role,
                source,
                sender_id,
                content,
                reasoning,
                created_at: now,
            })
        })
        .await
    }

    pub async fn get_recent_memories(
        &self,
        mysis_id: &str,
        limit: usize,
    ) -> Result<Vec<Memory>, StoreError> {
        let mysis_id = mysis_id.to_string();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, mysis_id, role, source, sender_id, content, reasoning, created_at
                 FROM (
                     SELECT * FROM memories WHERE mysis_id = ?1 ORDER BY id DESC LIMIT ?2
                 ) ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map(params![mysis_id, limit as i64], row_to_memory)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn get_system_memory(&self, mysis_id: &str) -> Result<Memory, StoreError> {
        let mysis_id_owned = mysis_id.to_string();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT id, mysis_id, role, source, sender_id, content, reasoning, created_at
                 FROM memories WHERE mysis_id = ?1 AND role = 'system' ORDER BY id ASC LIMIT 1",
                params![mysis_id_owned],
                row_to_memory,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("system memory for mysis {mysis_id_owned}")))
        })
        .await
    }

    pub async fn get_memories_all(&self, mysis_id: &str) -> Result<Vec<Memory>, StoreError> {
        let mysis_id = mysis_id.to_string();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, mysis_id, role, source, sender_id, content, reasoning, created_at
                 FROM memories WHERE mysis_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map(params![mysis_id], row_to_memory)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Case-sensitive substring match over content, newest first, capped at `limit`.
    pub async fn search_memories(
        &self,
        mysis_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Memory>, StoreError> {
        let mysis_id = mysis_id.to_string();
        let pattern = format!("%{}%", escape_like(&query.to_string()));
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, mysis_id, role, source, sender_id, content, reasoning, created_at
                 FROM memories
                 WHERE mysis_id = ?1 AND content GLOB ?2
                 ORDER BY id DESC LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![mysis_id, glob_pattern(&pattern), limit as i64], row_to_memory)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    // ── Myses ────────────────────────────────────────────────────────────────

    pub async fn create_mysis(
        &self,
        name: &str,
        provider: &str,
        model: &str,
        temperature: f32,
    ) -> Result<Mysis, StoreError> {
        let name = name.to_string();
        let provider = provider.to_string();
        let model = model.to_string();
        self.run_blocking(move |conn| {
            let now = Utc::now();
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO myses (id, name, provider, model, temperature, state, last_error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'idle', '', ?6, ?6)",
                params![id, name, provider, model, temperature, now.to_rfc3339()],
            )?;
            Ok(Mysis {
                id,
                name,
                provider,
                model,
                temperature,
                state: MysisState::Idle,
                last_error: String::new(),
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    pub async fn list_myses(&self) -> Result<Vec<Mysis>, StoreError> {
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, provider, model, temperature, state, last_error, created_at, updated_at
                 FROM myses ORDER BY created_at ASC",
            )?;
            let rows = stmt
                .query_map([], row_to_mysis)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn update_mysis_state(
        &self,
        id: &str,
        state: MysisState,
        last_error: &str,
    ) -> Result<(), StoreError> {
        let id = id.to_string();
        let last_error = last_error.to_string();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE myses SET state = ?1, last_error = ?2, updated_at = ?3 WHERE id = ?4",
                params![state.as_str(), last_error, Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn update_mysis_config(
        &self,
        id: &str,
        provider: &str,
        model: &str,
        temperature: f32,
    ) -> Result<(), StoreError> {
        let id = id.to_string();
        let provider = provider.to_string();
        let model = model.to_string();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE myses SET provider = ?1, model = ?2, temperature = ?3, updated_at = ?4 WHERE id = ?5",
                params![provider, model, temperature, Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    /// Seed an account row (used to populate `accounts` from the credentials file).
    /// Idempotent on `(provider, username)`.
    pub async fn seed_account(
        &self,
        provider: &str,
        username: &str,
        credentials: &str,
    ) -> Result<(), StoreError> {
        let provider = provider.to_string();
        let username = username.to_string();
        let credentials = credentials.to_string();
        self.run_blocking(move |conn| {
            let exists: Option<String> = conn
                .query_row(
                    "SELECT id FROM accounts WHERE provider = ?1 AND username = ?2",
                    params![provider, username],
                    |r| r.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Ok(());
            }
            conn.execute(
                "INSERT INTO accounts (id, provider, username, credentials, in_use_by, claimed_at)
                 VALUES (?1, ?2, ?3, ?4, NULL, NULL)",
                params![Uuid::new_v4().to_string(), provider, username, credentials],
            )?;
            Ok(())
        })
        .await
    }

    /// Idempotent per mysis: if it already holds an account for `provider`, return it.
    /// Otherwise atomically claim any unclaimed row for that provider.
    pub async fn claim_account(&self, provider: &str, mysis_id: &str) -> Result<Account, StoreError> {
        let provider = provider.to_string();
        let mysis_id = mysis_id.to_string();
        self.run_blocking(move |conn| {
            let tx = conn.unchecked_transaction()?;

            let already: Option<Account> = tx
                .query_row(
                    "SELECT id, provider, username, credentials, in_use_by, claimed_at
                     FROM accounts WHERE provider = ?1 AND in_use_by = ?2",
                    params![provider, mysis_id],
                    row_to_account,
                )
                .optional()?;
            if let Some(acct) = already {
                tx.commit()?;
                return Ok(acct);
            }

            let candidate: Option<String> = tx
                .query_row(
                    "SELECT id FROM accounts WHERE provider = ?1 AND in_use_by IS NULL LIMIT 1",
                    params![provider],
                    |r| r.get(0),
                )
                .optional()?;

            let Some(account_id) = candidate else {
                return Err(StoreError::NoAccountAvailable(provider));
            };

            let now = Utc::now().to_rfc3339();
            tx.execute(
                "UPDATE accounts SET in_use_by = ?1, claimed_at = ?2 WHERE id = ?3",
                params![mysis_id, now, account_id],
            )?;
            let acct = tx.query_row(
                "SELECT id, provider, username, credentials, in_use_by, claimed_at
                 FROM accounts WHERE id = ?1",
                params![account_id],
                row_to_account,
            )?;
            tx.commit()?;
            Ok(acct)
        })
        .await
    }

    pub async fn release_account(&self, mysis_id: &str) -> Result<(), StoreError> {
        let mysis_id = mysis_id.to_string();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE accounts SET in_use_by = NULL, claimed_at = NULL WHERE in_use_by = ?1",
                params![mysis_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn release_all_accounts(&self) -> Result<(), StoreError> {
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE accounts SET in_use_by = NULL, claimed_at = NULL WHERE in_use_by IS NOT NULL",
                [],
            )?;
            Ok(())
        })
        .await
    }

    // ── Broadcasts ───────────────────────────────────────────────────────────

    pub async fn append_broadcast(&self, sender_id: &str, content: &str) -> Result<Broadcast, StoreError> {
        let sender_id = sender_id.to_string();
        let content = content.to_string();
        self.run_blocking(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO broadcasts (sender_id, content, created_at) VALUES (?1, ?2, ?3)",
                params![sender_id, content, now.to_rfc3339()],
            )?;
            Ok(Broadcast {
                id: conn.last_insert_rowid(),
                sender_id,
                content,
                created_at: now,
            })
        })
        .await
    }

    pub async fn search_broadcasts(&self, query: &str, limit: usize) -> Result<Vec<Broadcast>, StoreError> {
        let pattern = glob_pattern(&format!("%{}%", escape_like(&query.to_string())));
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, content, created_at FROM broadcasts
                 WHERE content GLOB ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![pattern, limit as i64], |row| {
                    Ok(Broadcast {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        content: row.get(2)?,
                        created_at: parse_ts(row.get::<_, String>(3)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Idempotent: blocks new writes, flushes, closes the connection. Safe to call N times.
    pub async fn close(&self) -> Result<(), StoreError> {
        let conn_arc = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn_arc.lock().expect("store mutex poisoned");
            if let Some(conn) = guard.take() {
                conn.execute("PRAGMA wal_checkpoint(FULL)", [])
                    .map_err(StoreError::from)?;
                drop(conn);
            }
            Ok::<(), StoreError>(())
        })
        .await?
    }

    pub fn is_closed(&self) -> bool {
        self.conn.lock().expect("store mutex poisoned").is_none()
    }
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    let role: String = row.get(2)?;
    let source: String = row.get(3)?;
    Ok(Memory {
        id: row.get(0)?,
        mysis_id: row.get(1)?,
        role: MemoryRole::parse(&role).unwrap_or(MemoryRole::User),
        source: MemorySource::parse(&source).unwrap_or(MemorySource::Llm),
        sender_id: row.get(4)?,
        content: row.get(5)?,
        reasoning: row.get(6)?,
        created_at: parse_ts(row.get::<_, String>(7)?),
    })
}

fn row_to_mysis(row: &rusqlite::Row) -> rusqlite::Result<Mysis> {
    let state: String = row.get(5)?;
    Ok(Mysis {
        id: row.get(0)?,
        name: row.get(1)?,
        provider: row.get(2)?,
        model: row.get(3)?,
        temperature: row.get(4)?,
        state: MysisState::parse(&state).unwrap_or(MysisState::Errored),
        last_error: row.get(6)?,
        created_at: parse_ts(row.get::<_, String>(7)?),
        updated_at: parse_ts(row.get::<_, String>(8)?),
    })
}

fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        provider: row.get(1)?,
        username: row.get(2)?,
        credentials: row.get(3)?,
        in_use_by: row.get(4)?,
        claimed_at: row
            .get::<_, Option<String>>(5)?
            .map(parse_ts),
    })
}

fn parse_ts(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Escapes GLOB metacharacters (`*`, `?`, `[`) so substring search stays literal.
fn escape_like(s: &str) -> String {
    s.replace('[', "[[]").replace('*', "[*]").replace('?', "[?]")
}

fn glob_pattern(escaped_with_percent: &str) -> String {
    // `search_memories`/`search_broadcasts` build patterns with `%` wildcards
    // (SQL LIKE convention) for readability; GLOB uses `*`, so translate here.
    escaped_with_percent.replace('%', "*")
}

// ── Unit tests ────────────────────────────────────────────────────────────────
