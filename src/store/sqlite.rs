//! SQLite-backed store.

use super::{HistoryEntry, NewMessage, Privacy, Store};
use crate::util;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use std::error::Error;

const INIT_SQL: &str = include_str!("init.sql");

/// Excludes rows whose sender turned off history access.  The history
/// table is aliased `m` in every query below.
const PRIVACY_FILTER: &str = "NOT EXISTS (SELECT 1 FROM account a \
     WHERE a.username = m.sender AND a.allow_history_access = 0)";

const ENTRY_COLUMNS: &str =
    "m.id, m.timestamp, m.sender, m.target, m.message, m.message_type, \
     m.is_channel_message, m.reply_to_id";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        sender: row.get(2)?,
        target: row.get(3)?,
        body: row.get(4)?,
        kind: row.get(5)?,
        is_channel: row.get(6)?,
        reply_to: row.get(7)?,
    })
}

/// A store over a pooled SQLite database.
pub struct SqliteStore {
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Opens (creating it if needed) the database at `path` and runs the
    /// schema bootstrap.
    pub fn open(path: &str) -> Result<Self, Box<dyn Error>> {
        let (manager, max_size) = if path == ":memory:" {
            // A pooled in-memory database must keep a single connection,
            // each new connection would see its own empty database.
            (SqliteConnectionManager::memory(), 1)
        } else {
            (SqliteConnectionManager::file(path), 8)
        };
        let pool = r2d2::Pool::builder().max_size(max_size).build(manager)?;
        pool.get()?.execute_batch(INIT_SQL)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Option<r2d2::PooledConnection<SqliteConnectionManager>> {
        match self.pool.get() {
            Ok(conn) => Some(conn),
            Err(err) => {
                log::warn!("Database unavailable: {}", err);
                None
            }
        }
    }

    fn query_entries(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Vec<HistoryEntry> {
        let conn = match self.conn() {
            Some(conn) => conn,
            None => return Vec::new(),
        };
        let res = conn.prepare(sql).and_then(|mut stmt| {
            stmt.query_map(params, entry_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()
        });
        match res {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("History query failed: {}", err);
                Vec::new()
            }
        }
    }
}

impl Store for SqliteStore {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        let conn = match self.conn() {
            Some(conn) => conn,
            None => return false,
        };
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM account WHERE username = ?1 AND password_verifier = ?2",
                params![username, password],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or_else(|err| {
                log::warn!("Account lookup failed: {}", err);
                None
            });
        match id {
            Some(id) => {
                let _ = conn.execute(
                    "UPDATE account SET last_login = ?1 WHERE id = ?2",
                    params![util::time_millis(), id],
                );
                true
            }
            None => false,
        }
    }

    fn account_exists(&self, username: &str) -> bool {
        let conn = match self.conn() {
            Some(conn) => conn,
            None => return false,
        };
        conn.query_row(
            "SELECT 1 FROM account WHERE username = ?1",
            params![username],
            |_| Ok(()),
        )
        .optional()
        .unwrap_or_else(|err| {
            log::warn!("Account lookup failed: {}", err);
            None
        })
        .is_some()
    }

    fn privacy(&self, username: &str) -> Privacy {
        let conn = match self.conn() {
            Some(conn) => conn,
            None => return Privacy::default(),
        };
        conn.query_row(
            "SELECT allow_message_logging, allow_history_access \
             FROM account WHERE username = ?1",
            params![username],
            |row| {
                Ok(Privacy {
                    allow_logging: row.get(0)?,
                    allow_history: row.get(1)?,
                })
            },
        )
        .optional()
        .unwrap_or_else(|err| {
            log::warn!("Privacy lookup failed: {}", err);
            None
        })
        .unwrap_or_default()
    }

    fn append_history(&self, msg: &NewMessage<'_>) -> Option<i64> {
        if !self.privacy(msg.sender).allow_logging {
            return None;
        }
        let conn = self.conn()?;
        let res = conn.execute(
            "INSERT INTO message_history \
             (timestamp, sender, target, message, message_type, is_channel_message, reply_to_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                util::time_millis(),
                msg.sender,
                msg.target,
                msg.body,
                msg.kind,
                msg.is_channel,
                msg.reply_to,
            ],
        );
        match res {
            Ok(_) => Some(conn.last_insert_rowid()),
            Err(err) => {
                log::warn!("History append failed: {}", err);
                None
            }
        }
    }

    fn channel_history(
        &self,
        channel: &str,
        limit: usize,
        before: Option<i64>,
    ) -> Vec<HistoryEntry> {
        let sql = format!(
            "SELECT {} FROM message_history m \
             WHERE m.target = ?1 AND m.is_channel_message = 1 \
               AND (?2 IS NULL OR m.timestamp < ?2) AND {} \
             ORDER BY m.timestamp DESC, m.id DESC LIMIT ?3",
            ENTRY_COLUMNS, PRIVACY_FILTER,
        );
        let mut entries = self.query_entries(&sql, &[&channel, &before, &(limit as i64)]);
        entries.reverse();
        entries
    }

    fn private_history(&self, a: &str, b: &str, limit: usize, before: Option<i64>)
        -> Vec<HistoryEntry>
    {
        let sql = format!(
            "SELECT {} FROM message_history m \
             WHERE m.is_channel_message = 0 \
               AND ((m.sender = ?1 AND m.target = ?2) OR (m.sender = ?2 AND m.target = ?1)) \
               AND (?3 IS NULL OR m.timestamp < ?3) AND {} \
             ORDER BY m.timestamp DESC, m.id DESC LIMIT ?4",
            ENTRY_COLUMNS, PRIVACY_FILTER,
        );
        let mut entries = self.query_entries(&sql, &[&a, &b, &before, &(limit as i64)]);
        entries.reverse();
        entries
    }

    fn search(&self, query: &str, target: Option<&str>, limit: usize) -> Vec<HistoryEntry> {
        let sql = format!(
            "SELECT {} FROM message_history m \
             WHERE m.message LIKE '%' || ?1 || '%' \
               AND (?2 IS NULL OR m.target = ?2) AND {} \
             ORDER BY m.timestamp DESC, m.id DESC LIMIT ?3",
            ENTRY_COLUMNS, PRIVACY_FILTER,
        );
        self.query_entries(&sql, &[&query, &target, &(limit as i64)])
    }

    fn messages_by_sender(&self, sender: &str, limit: usize) -> Vec<HistoryEntry> {
        let sql = format!(
            "SELECT {} FROM message_history m WHERE m.sender = ?1 \
             ORDER BY m.timestamp DESC, m.id DESC LIMIT ?2",
            ENTRY_COLUMNS,
        );
        self.query_entries(&sql, &[&sender, &(limit as i64)])
    }

    fn message(&self, id: i64) -> Option<HistoryEntry> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM message_history m WHERE m.id = ?1", ENTRY_COLUMNS);
        conn.query_row(&sql, params![id], entry_from_row)
            .optional()
            .unwrap_or_else(|err| {
                log::warn!("History lookup failed: {}", err);
                None
            })
    }

    fn replies(&self, parent: i64, limit: usize) -> Vec<HistoryEntry> {
        let sql = format!(
            "SELECT {} FROM message_history m WHERE m.reply_to_id = ?1 \
             ORDER BY m.timestamp ASC, m.id ASC LIMIT ?2",
            ENTRY_COLUMNS,
        );
        self.query_entries(&sql, &[&parent, &(limit as i64)])
    }

    fn cleanup_older_than(&self, cutoff: i64) -> usize {
        let conn = match self.conn() {
            Some(conn) => conn,
            None => return 0,
        };
        conn.execute("DELETE FROM message_history WHERE timestamp < ?1", params![cutoff])
            .unwrap_or_else(|err| {
                log::warn!("History cleanup failed: {}", err);
                0
            })
    }
}

// mod tests
