// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use rusqlite::Connection;

use crate::error::StoreError;

/// Current on-disk schema version. Upgrades are destructive (drop + recreate),
/// per the core spec's "no migrations" stance — acceptable for a local tool.
pub const SCHEMA_VERSION: i64 = 1;

pub fn init(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS myses (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            provider    TEXT NOT NULL,
            model       TEXT NOT NULL,
            temperature REAL NOT NULL,
            state       TEXT NOT NULL,
            last_error  TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS memories (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            mysis_id   TEXT NOT NULL,
            role       TEXT NOT NULL,
            source     TEXT NOT NULL,
            sender_id  TEXT,
            content    TEXT NOT NULL,
            reasoning  TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memories_mysis_id ON memories (mysis_id, id);

        CREATE TABLE IF NOT EXISTS accounts (
            id          TEXT PRIMARY KEY,
            provider    TEXT NOT NULL,
            username    TEXT NOT NULL,
            credentials TEXT NOT NULL,
            in_use_by   TEXT,
            claimed_at  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_accounts_provider ON accounts (provider, in_use_by);

        CREATE TABLE IF NOT EXISTS broadcasts (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id  TEXT NOT NULL,
            content    TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        ",
    )?;

    let have_version: i64 = conn.query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))?;
    if have_version == 0 {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [SCHEMA_VERSION],
        )?;
    }
    Ok(())
}
