//! Testing utilities for `malefirc::state`.

use super::StateInner;
use crate::client::MessageQueueItem;
use crate::config::Config;
use crate::store::MemoryStore;
use malefirc_tokens::Message;
use tokio::sync::mpsc;

pub const SERVER_NAME: &str = "test.malefirc.local";

type Queue = mpsc::UnboundedReceiver<MessageQueueItem>;

pub fn test_config() -> Config {
    Config {
        port: 6667,
        server_name: SERVER_NAME.to_owned(),
        oper_name: "admin".to_owned(),
        oper_password: "adminpass".to_owned(),
        tls: None,
        db_path: None,
    }
}

pub(crate) fn simple_state() -> StateInner {
    StateInner::new(&test_config(), Box::new(MemoryStore::new()))
}

/// A state over a prepared in-memory store.
pub(crate) fn state_with_store(store: MemoryStore) -> StateInner {
    StateInner::new(&test_config(), Box::new(store))
}

/// A state whose store holds the given `(username, password)` accounts.
pub(crate) fn state_with_accounts(accounts: &[(&str, &str)]) -> StateInner {
    let store = MemoryStore::new();
    for (username, password) in accounts {
        store.add_account(username, password);
    }
    state_with_store(store)
}

pub(crate) fn add_client(s: &mut StateInner) -> (usize, Queue) {
    let (msg_queue, outgoing_msgs) = mpsc::unbounded_channel();
    let id = s.peer_joined("127.0.0.1".to_owned(), msg_queue);
    (id, outgoing_msgs)
}

pub(crate) fn add_registered_client(s: &mut StateInner, nickname: &str) -> (usize, Queue) {
    let (id, mut queue) = add_client(s);
    sequence(s, id, &[&format!("NICK {}", nickname), "USER X 0 * :X"]);
    flush(&mut queue);
    (id, queue)
}

/// Runs raw lines from the client `id` through the state.
pub(crate) fn sequence(state: &mut StateInner, id: usize, messages: &[&str]) {
    for message in messages {
        let message = Message::parse(message).expect("bad test input");
        state.handle_message(id, message);
    }
}

/// Discards everything currently on the queue.
pub fn flush(queue: &mut Queue) {
    while queue.try_recv().is_ok() {}
}

/// Drains the queue into one string, keeping tag blocks.
pub fn collect(res: &mut String, queue: &mut Queue) {
    while let Ok(item) = queue.try_recv() {
        res.push_str(item.as_ref());
    }
}

/// Drains the queue and parses every line.
pub fn messages(s: &str) -> impl Iterator<Item = Message<'_>> {
    s.lines().map(|line| Message::parse(line).expect("bad message"))
}

/// Drains the queue and returns the numeric replies it contains.
pub fn numerics(queue: &mut Queue) -> Vec<String> {
    let mut res = String::new();
    collect(&mut res, queue);
    messages(&res)
        .filter_map(|msg| match msg.command {
            Ok(malefirc_tokens::Command::Reply(_)) => None,
            Ok(_) => None,
            Err(num) => Some(num.to_owned()),
        })
        .collect()
}
