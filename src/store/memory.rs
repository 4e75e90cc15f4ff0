//! In-memory store, for tests and storeless runs.

use super::{HistoryEntry, NewMessage, Privacy, Store};
use crate::util;
use std::collections::HashMap;
use std::sync::Mutex;

struct Account {
    password: String,
    privacy: Privacy,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    history: Vec<HistoryEntry>,
    next_id: i64,
}

impl Inner {
    fn allows_history(&self, sender: &str) -> bool {
        self.accounts
            .get(sender)
            .map_or(true, |account| account.privacy.allow_history)
    }
}

/// A store holding everything in process memory.
///
/// History ids are monotonic and start at 1, like SQLite rowids.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account.  Replaces any previous account with the same
    /// username.
    pub fn add_account(&self, username: &str, password: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.accounts.insert(
            username.to_owned(),
            Account {
                password: password.to_owned(),
                privacy: Privacy::default(),
            },
        );
    }

    /// Overrides the privacy switches of an existing account.
    pub fn set_privacy(&self, username: &str, privacy: Privacy) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(account) = inner.accounts.get_mut(username) {
            account.privacy = privacy;
        }
    }
}

impl Store for MemoryStore {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .accounts
            .get(username)
            .map_or(false, |account| account.password == password)
    }

    fn account_exists(&self, username: &str) -> bool {
        self.inner.lock().unwrap().accounts.contains_key(username)
    }

    fn privacy(&self, username: &str) -> Privacy {
        let inner = self.inner.lock().unwrap();
        inner
            .accounts
            .get(username)
            .map_or_else(Privacy::default, |account| account.privacy)
    }

    fn append_history(&self, msg: &NewMessage<'_>) -> Option<i64> {
        let mut inner = self.inner.lock().unwrap();
        if !inner
            .accounts
            .get(msg.sender)
            .map_or(true, |account| account.privacy.allow_logging)
        {
            return None;
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.history.push(HistoryEntry {
            id,
            timestamp: util::time_millis(),
            sender: msg.sender.to_owned(),
            target: msg.target.to_owned(),
            body: msg.body.to_owned(),
            kind: msg.kind.to_owned(),
            is_channel: msg.is_channel,
            reply_to: msg.reply_to,
        });
        Some(id)
    }

    fn channel_history(&self, channel: &str, limit: usize, before: Option<i64>)
        -> Vec<HistoryEntry>
    {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<_> = inner
            .history
            .iter()
            .filter(|e| e.is_channel && e.target == channel)
            .filter(|e| before.map_or(true, |ts| e.timestamp < ts))
            .filter(|e| inner.allows_history(&e.sender))
            .rev()
            .take(limit)
            .cloned()
            .collect();
        entries.reverse();
        entries
    }

    fn private_history(&self, a: &str, b: &str, limit: usize, before: Option<i64>)
        -> Vec<HistoryEntry>
    {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<_> = inner
            .history
            .iter()
            .filter(|e| !e.is_channel)
            .filter(|e| {
                (e.sender == a && e.target == b) || (e.sender == b && e.target == a)
            })
            .filter(|e| before.map_or(true, |ts| e.timestamp < ts))
            .filter(|e| inner.allows_history(&e.sender))
            .rev()
            .take(limit)
            .cloned()
            .collect();
        entries.reverse();
        entries
    }

    fn search(&self, query: &str, target: Option<&str>, limit: usize) -> Vec<HistoryEntry> {
        let inner = self.inner.lock().unwrap();
        inner
            .history
            .iter()
            .filter(|e| e.body.contains(query))
            .filter(|e| target.map_or(true, |t| e.target == t))
            .filter(|e| inner.allows_history(&e.sender))
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    fn messages_by_sender(&self, sender: &str, limit: usize) -> Vec<HistoryEntry> {
        let inner = self.inner.lock().unwrap();
        inner
            .history
            .iter()
            .filter(|e| e.sender == sender)
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    fn message(&self, id: i64) -> Option<HistoryEntry> {
        let inner = self.inner.lock().unwrap();
        inner.history.iter().find(|e| e.id == id).cloned()
    }

    fn replies(&self, parent: i64, limit: usize) -> Vec<HistoryEntry> {
        let inner = self.inner.lock().unwrap();
        inner
            .history
            .iter()
            .filter(|e| e.reply_to == Some(parent))
            .take(limit)
            .cloned()
            .collect()
    }

    fn cleanup_older_than(&self, cutoff: i64) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.history.len();
        inner.history.retain(|e| cutoff <= e.timestamp);
        before - inner.history.len()
    }
}

// mod tests
