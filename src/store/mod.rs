//! The account and message history store.
//!
//! The server talks to its persistence layer through the `Store` trait.
//! Two implementations exist: `SqliteStore`, backed by a SQLite database
//! behind an r2d2 pool, and `MemoryStore`, which keeps everything in
//! process memory and backs tests and storeless runs.
//!
//! All methods are blocking and infallible from the caller's point of
//! view: a failing backend makes authentication return `false`, appends
//! return `None` and queries return empty results.  Failures are logged
//! where they are first observed.

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

mod memory;
mod sqlite;

/// Per-account privacy switches.
///
/// Accounts that never opted out keep the defaults; unknown senders are
/// treated the same way.
#[derive(Clone, Copy, Debug)]
pub struct Privacy {
    /// Whether messages from this account may be written to history.
    pub allow_logging: bool,

    /// Whether this account's messages may come back from history queries.
    pub allow_history: bool,
}

impl Default for Privacy {
    fn default() -> Self {
        Self {
            allow_logging: true,
            allow_history: true,
        }
    }
}

/// One row of message history.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: i64,
    pub sender: String,
    pub target: String,
    pub body: String,
    /// The wire command the message arrived as, `PRIVMSG` or `NOTICE`.
    pub kind: String,
    pub is_channel: bool,
    /// The id of the entry this one replies to, from the `+reply` tag.
    pub reply_to: Option<i64>,
}

/// A message about to be appended to history.
#[derive(Clone, Copy, Debug)]
pub struct NewMessage<'a> {
    pub sender: &'a str,
    pub target: &'a str,
    pub body: &'a str,
    pub kind: &'a str,
    pub is_channel: bool,
    pub reply_to: Option<i64>,
}

/// The persistence interface consumed by the server.
pub trait Store: Send + Sync {
    /// Checks `password` against the account's stored verifier.  Returns
    /// `false` for unknown accounts and unavailable backends.
    fn authenticate(&self, username: &str, password: &str) -> bool;

    /// Whether an account with this username exists.
    fn account_exists(&self, username: &str) -> bool;

    /// The privacy switches of the given account.  Defaults when the
    /// account is unknown.
    fn privacy(&self, username: &str) -> Privacy;

    /// Appends a message to history and returns its id.
    ///
    /// Returns `None`, writing nothing, when the sender's `allow_logging`
    /// switch is off or the backend is unavailable.
    fn append_history(&self, msg: &NewMessage<'_>) -> Option<i64>;

    /// The most recent channel messages, in chronological order.  Entries
    /// from senders who disallow history access are excluded.
    fn channel_history(&self, channel: &str, limit: usize, before: Option<i64>)
        -> Vec<HistoryEntry>;

    /// The most recent private messages between two users, in
    /// chronological order, with the same privacy filtering.
    fn private_history(&self, a: &str, b: &str, limit: usize, before: Option<i64>)
        -> Vec<HistoryEntry>;

    /// Messages whose body contains `query`, most recent first.
    fn search(&self, query: &str, target: Option<&str>, limit: usize) -> Vec<HistoryEntry>;

    /// Messages sent by `sender`, most recent first.
    fn messages_by_sender(&self, sender: &str, limit: usize) -> Vec<HistoryEntry>;

    /// Looks up a single message by id.
    fn message(&self, id: i64) -> Option<HistoryEntry>;

    /// Replies to the given message, in chronological order.
    fn replies(&self, parent: i64, limit: usize) -> Vec<HistoryEntry>;

    /// Deletes history entries older than `cutoff` (milliseconds since the
    /// UNIX epoch) and returns how many were removed.
    fn cleanup_older_than(&self, cutoff: i64) -> usize;
}

/// Opens the store named by the configuration.
///
/// `None` selects the in-memory store.  A SQLite path that cannot be
/// opened falls back to the in-memory store so the server still comes up.
pub fn open(db_path: Option<&str>) -> Box<dyn Store> {
    match db_path {
        Some(path) => match SqliteStore::open(path) {
            Ok(store) => {
                log::info!("Using SQLite store at {:?}", path);
                Box::new(store)
            }
            Err(err) => {
                log::error!("Failed to open {:?}: {}; using the in-memory store", path, err);
                Box::new(MemoryStore::new())
            }
        },
        None => {
            log::info!("No database configured, using the in-memory store");
            Box::new(MemoryStore::new())
        }
    }
}
