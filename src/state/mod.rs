//! Shared state and API to handle incoming commands.
//!
//! This module is split in several files:
//!
//! - `mod.rs`: public API of the server state, dispatch and send utilities
//! - `rfc2812.rs`: handlers for messages defined in the RFCs
//! - `ircv3.rs`: handlers for CAP and SASL

use crate::channel::Channel;
use crate::client::{Client, MessageQueue, MessageQueueItem};
use crate::config::Config;
use crate::lines;
use crate::store::Store;
use crate::util;
use malefirc_tokens::{rpl, Buffer, Command, Message, ReplyBuffer};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

mod ircv3;
mod rfc2812;
#[cfg(test)]
mod test;

#[macro_export]
macro_rules! server_version(() => {concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"))});

/// Information about malefirc from an IRC client perspective.
///
/// Sent to clients with the INFO command.
const SERVER_INFO: &str = include_str!("info.txt");

const MAX_CHANNEL_NAME_LENGTH: usize = 50;
const MAX_NICKNAME_LENGTH: usize = 16;

type ChannelMap = HashMap<String, Channel>;
type ClientMap = HashMap<usize, Client>;
type NickMap = HashMap<String, usize>;
type HandlerResult = Result<(), ()>;

/// Data common to all handlers of one incoming message.
struct CommandContext<'a> {
    id: usize,
    rb: &'a mut ReplyBuffer,

    /// The raw tag string of the incoming message.
    tags: &'a str,
}

/// State of an IRC network.
///
/// This is just an `Arc` around the real data, so it is cheap to clone and
/// clones share the same state.  Every connection task holds one.
///
/// # Example
///
/// ```rust
/// # use malefirc::config::Config;
/// # use malefirc::store::MemoryStore;
/// # use malefirc::State;
/// # use malefirc_tokens::Message;
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let config = Config {
///     port: 6667,
///     server_name: "irc.example.test".to_owned(),
///     oper_name: "admin".to_owned(),
///     oper_password: "adminpass".to_owned(),
///     tls: None,
///     db_path: None,
/// };
/// let state = State::new(&config, Box::new(MemoryStore::new()));
///
/// // The state pushes messages meant for a client onto its queue.
/// let (queue, mut outgoing) = tokio::sync::mpsc::unbounded_channel();
/// let id = state.peer_joined("127.0.0.1".to_owned(), queue).await;
///
/// state.handle_message(id, Message::parse("NICK ser\r\n").unwrap()).await;
/// state.handle_message(id, Message::parse("USER ser 0 * :ser\r\n").unwrap()).await;
///
/// // Registration completed, the welcome burst is on the queue.
/// let batch = outgoing.recv().await.unwrap();
/// let text: &str = batch.as_ref();
/// assert!(text.starts_with(":irc.example.test 001 ser"));
/// # });
/// ```
#[derive(Clone)]
pub struct State(Arc<Mutex<StateInner>>);

impl State {
    /// Initializes the IRC state from the given configuration and store.
    pub fn new(config: &Config, store: Box<dyn Store>) -> Self {
        let inner = StateInner::new(config, store);
        Self(Arc::new(Mutex::new(inner)))
    }

    /// Adds a new connection to the state.
    ///
    /// Returns the connection's id.  The queue is used to push messages
    /// back to the peer.
    pub async fn peer_joined(&self, host: String, queue: MessageQueue) -> usize {
        self.0.lock().await.peer_joined(host, queue)
    }

    /// Removes the given connection from the state.
    ///
    /// Idempotent; called from every connection exit path.
    pub async fn peer_quit(&self, id: usize) {
        self.0.lock().await.peer_quit(id);
    }

    /// Updates the state according to the given message from the given
    /// client.
    pub async fn handle_message(&self, id: usize, msg: Message<'_>) {
        self.0.lock().await.handle_message(id, msg);
    }
}

/// The actual shared data (state) of the IRC server.
pub(crate) struct StateInner {
    /// The name of the server.  Used as the prefix of server replies.
    server_name: String,

    /// The formatted time when this instance was created.  Sent in the
    /// 003 reply of the welcome burst.
    created_at: String,

    /// The name/password pair accepted by OPER.
    oper_name: String,
    oper_password: String,

    /// The connected clients, keyed by connection id.
    clients: ClientMap,

    /// Lowercased nickname to connection id.
    nicks: NickMap,

    /// Lowercased channel name to channel data.
    channels: ChannelMap,

    /// The account and history store.
    store: Box<dyn Store>,

    /// Matches `@nick` tokens in message bodies.
    mentions: Regex,

    next_id: usize,
}

impl StateInner {
    pub fn new(config: &Config, store: Box<dyn Store>) -> Self {
        Self {
            server_name: config.server_name.clone(),
            created_at: util::time_str(),
            oper_name: config.oper_name.clone(),
            oper_password: config.oper_password.clone(),
            clients: HashMap::new(),
            nicks: HashMap::new(),
            channels: HashMap::new(),
            store,
            mentions: Regex::new(r"@([A-Za-z0-9_\-\[\]\\{}^|]+)").unwrap(),
            next_id: 0,
        }
    }

    pub fn peer_joined(&mut self, host: String, queue: MessageQueue) -> usize {
        self.next_id += 1;
        let id = self.next_id;
        log::debug!("{}: Connected from {}", id, host);
        self.clients.insert(id, Client::new(queue, host));
        id
    }

    pub fn peer_quit(&mut self, id: usize) {
        if let Some(client) = self.clients.remove(&id) {
            log::debug!("{}: Disconnected", id);
            self.remove_client(id, client, lines::CONNECTION_CLOSED);
        }
    }

    /// Called by `peer_quit`, `cmd_quit` and `cmd_kill` to do the cleanup
    /// a leaving client needs:
    ///
    /// - send a QUIT to the remaining members of each of its channels,
    /// - remove it from those channels, dropping the ones left empty,
    /// - free its nickname.
    ///
    /// The caller has already removed the client from `clients`.
    fn remove_client(&mut self, id: usize, client: Client, reason: &str) {
        let mut response = Buffer::new();
        response
            .message(client.full_name(), Command::Quit)
            .trailing_param(reason);
        let msg = MessageQueueItem::from(response);

        for channel in self.channels.values() {
            if channel.has_member(id) {
                for member in channel.member_ids().filter(|member| *member != id) {
                    self.send(member, msg.clone());
                }
            }
        }

        self.channels.retain(|_, channel| {
            channel.remove_member(id);
            !channel.is_empty()
        });

        if client.has_nick() {
            self.nicks.remove(&client.nick().to_ascii_lowercase());
        }
    }

    pub fn handle_message(&mut self, id: usize, msg: Message<'_>) {
        let client = match self.clients.get(&id) {
            Some(client) => client,
            None => return,
        };

        let command = match msg.command {
            Ok(command) => command,
            Err(unknown) => {
                if client.is_registered() {
                    let mut rb = ReplyBuffer::new(&self.server_name, client.nick());
                    rb.reply(rpl::ERR_UNKNOWNCOMMAND)
                        .param(unknown)
                        .trailing_param(lines::UNKNOWN_COMMAND);
                    client.send(rb);
                } else {
                    log::debug!("{}: {:?} dropped before registration", id, unknown);
                }
                return;
            }
        };

        // Before registration, only the handshake commands are honored.
        // Everything else is dropped without a reply.
        if !client.is_registered() && !is_handshake_command(command) {
            log::debug!("{}: {} dropped before registration", id, command);
            return;
        }

        let mut rb = ReplyBuffer::new(&self.server_name, client.nick());

        if !msg.has_enough_params() {
            match command {
                Command::Nick | Command::Whois => {
                    rb.reply(rpl::ERR_NONICKNAMEGIVEN)
                        .trailing_param(lines::NO_NICKNAME_GIVEN);
                }
                Command::PrivMsg | Command::Notice if msg.num_params == 0 => {
                    rb.reply(rpl::ERR_NORECIPIENT).trailing_param(lines::NO_RECIPIENT);
                }
                Command::PrivMsg | Command::Notice => {
                    rb.reply(rpl::ERR_NOTEXTTOSEND).trailing_param(lines::NO_TEXT_TO_SEND);
                }
                _ => {
                    rb.reply(rpl::ERR_NEEDMOREPARAMS)
                        .param(command.as_str())
                        .trailing_param(lines::NEED_MORE_PARAMS);
                }
            }
            self.send_reply(id, rb);
            return;
        }

        let ps = msg.params;
        let n = msg.num_params;
        log::debug!("{}: {} {:?}", id, command, &ps[..n]);
        let ctx = CommandContext {
            id,
            rb: &mut rb,
            tags: msg.tags,
        };
        let _ = match command {
            Command::Admin => self.cmd_admin(ctx),
            Command::Authenticate => self.cmd_authenticate(ctx, ps[0]),
            Command::Away => {
                let reason = if n == 0 || ps[0].is_empty() { None } else { Some(ps[0]) };
                self.cmd_away(ctx, reason)
            }
            Command::Cap => self.cmd_cap(ctx, &ps[..n]),
            Command::Error | Command::Pong | Command::Reply(_) => Ok(()),
            Command::Info => self.cmd_info(ctx),
            Command::Invite => self.cmd_invite(ctx, ps[0], ps[1]),
            Command::Ison => self.cmd_ison(ctx, &ps[..n]),
            Command::Join => self.cmd_join(ctx, ps[0], ps[1]),
            Command::Kick => {
                let reason = if n < 3 || ps[2].is_empty() { None } else { Some(ps[2]) };
                self.cmd_kick(ctx, ps[0], ps[1], reason)
            }
            Command::Kill => {
                let reason = if n < 2 || ps[1].is_empty() { None } else { Some(ps[1]) };
                self.cmd_kill(ctx, ps[0], reason)
            }
            Command::List => self.cmd_list(ctx),
            Command::Mode => self.cmd_mode(ctx, ps[0], ps[1], &ps[2..n.max(2)]),
            Command::Motd => self.cmd_motd(ctx),
            Command::Names => self.cmd_names(ctx, ps[0]),
            Command::Nick => self.cmd_nick(ctx, ps[0]),
            Command::Notice => self.cmd_notice(ctx, ps[0], ps[1]),
            Command::Oper => self.cmd_oper(ctx, ps[0], ps[1]),
            Command::Part => {
                let reason = if n < 2 || ps[1].is_empty() { None } else { Some(ps[1]) };
                self.cmd_part(ctx, ps[0], reason)
            }
            Command::Pass => self.cmd_pass(ctx, ps[0]),
            Command::Ping => self.cmd_ping(ctx, ps[0]),
            Command::PrivMsg => self.cmd_privmsg(ctx, ps[0], ps[1]),
            Command::Quit => {
                let reason = if n == 0 || ps[0].is_empty() { None } else { Some(ps[0]) };
                self.cmd_quit(id, reason);
                return;
            }
            Command::Time => self.cmd_time(ctx),
            Command::Topic => {
                self.cmd_topic(ctx, ps[0], if n == 1 { None } else { Some(ps[1]) })
            }
            Command::User => self.cmd_user(ctx, ps[0], ps[3]),
            Command::Userhost => self.cmd_userhost(ctx, &ps[..n]),
            Command::Version => self.cmd_version(ctx),
            Command::Who => self.cmd_who(ctx, ps[0]),
            Command::Whois => self.cmd_whois(ctx, ps[0]),
            Command::Whowas => self.cmd_whowas(ctx, ps[0]),
        };

        self.send_reply(id, rb);
    }
}

/// The commands honored before registration completes.
fn is_handshake_command(command: Command) -> bool {
    matches!(
        command,
        Command::Pass
            | Command::Cap
            | Command::Authenticate
            | Command::Nick
            | Command::User
            | Command::Quit
            | Command::Ping
    )
}

/// Whether `s` names a channel, as opposed to a user.
fn is_channel_name(s: &str) -> bool {
    s.starts_with('#')
}

fn is_valid_channel_name(s: &str) -> bool {
    // https://tools.ietf.org/html/rfc2811.html#section-2.1
    let ctrl_g = 7 as char;
    is_channel_name(s)
        && s.len() <= MAX_CHANNEL_NAME_LENGTH
        && s.chars().all(|c| c != ' ' && c != ',' && c != ctrl_g && c != ':')
}

fn is_valid_nickname(s: &str) -> bool {
    let s = s.as_bytes();
    let is_valid_nickname_char = |&c: &u8| {
        c.is_ascii_alphanumeric()
            // "[", "]", "\", "`", "_", "^", "{", "|", "}"
            || (0x5b <= c && c <= 0x60)
            || (0x7b <= c && c <= 0x7d)
    };
    !s.is_empty()
        && s.len() <= MAX_NICKNAME_LENGTH
        && s.iter().all(is_valid_nickname_char)
        && !s[0].is_ascii_digit()
        && s[0] != b'-'
}

/// Returns `Ok(channel)` when `name` is an existing channel name.
/// Otherwise sends an error to the client and returns `Err(())`.
fn find_channel<'a>(
    id: usize,
    rb: &mut ReplyBuffer,
    channels: &'a ChannelMap,
    name: &str,
) -> Result<&'a Channel, ()> {
    match channels.get(&name.to_ascii_lowercase()) {
        Some(channel) => Ok(channel),
        None => {
            log::debug!("{}:     no such channel", id);
            rb.reply(rpl::ERR_NOSUCHCHANNEL)
                .param(name)
                .trailing_param(lines::NO_SUCH_CHANNEL);
            Err(())
        }
    }
}

/// Returns `Ok(member_modes)` when the client identified by `id` is in the
/// given `channel`.  Otherwise sends an error to the client and returns
/// `Err(())`.
fn find_member(
    id: usize,
    rb: &mut ReplyBuffer,
    channel: &Channel,
    channel_name: &str,
) -> Result<crate::channel::MemberModes, ()> {
    match channel.member(id) {
        Some(modes) => Ok(modes),
        None => {
            log::debug!("{}:     not on channel", id);
            rb.reply(rpl::ERR_NOTONCHANNEL)
                .param(channel_name)
                .trailing_param(lines::NOT_ON_CHANNEL);
            Err(())
        }
    }
}

/// Returns `Ok((id, client))` when a registered client holds the nickname
/// `nick`.  Otherwise sends an error to the client and returns `Err(())`.
fn find_nick<'a>(
    rb: &mut ReplyBuffer,
    clients: &'a ClientMap,
    nicks: &NickMap,
    nick: &str,
) -> Result<(usize, &'a Client), ()> {
    match nicks
        .get(&nick.to_ascii_lowercase())
        .and_then(|id| clients.get(id).map(|client| (*id, client)))
        .filter(|(_, client)| client.is_registered())
    {
        Some(found) => Ok(found),
        None => {
            rb.reply(rpl::ERR_NOSUCHNICK)
                .param(nick)
                .trailing_param(lines::NO_SUCH_NICK);
            Err(())
        }
    }
}

// Send utilities
impl StateInner {
    /// Sends the given message to the given client.
    fn send(&self, id: usize, msg: MessageQueueItem) {
        if let Some(client) = self.clients.get(&id) {
            client.send(msg);
        }
    }

    /// Sends the accumulated replies to the given client, if any.
    fn send_reply(&self, id: usize, rb: ReplyBuffer) {
        if !rb.is_empty() {
            self.send(id, MessageQueueItem::from(rb));
        }
    }

    /// Sends the given message to all members of the given channel.
    fn broadcast(&self, channel: &Channel, msg: MessageQueueItem) {
        for member in channel.member_ids() {
            self.send(member, msg.clone());
        }
    }

    /// Completes registration when both NICK and USER have been received.
    ///
    /// A pending PASS password is tried against the account named by USER;
    /// failure is silent.  Ends with the welcome burst.
    fn complete_registration(&mut self, id: usize, rb: &mut ReplyBuffer) {
        let client = match self.clients.get_mut(&id) {
            Some(client) => client,
            None => return,
        };
        if !client.can_register() {
            return;
        }
        client.set_registered();
        rb.set_nick(client.nick());

        let password = client.password.take();
        let username = client.user().to_owned();
        if let Some(password) = password {
            if self.store.authenticate(&username, &password) {
                log::debug!("{}: logged in as {} during registration", id, username);
                self.clients.get_mut(&id).unwrap().log_in(username);
            }
        }

        self.write_welcome(id, rb);
    }

    /// Sends the welcome burst.  Called when a client has completed its
    /// registration.
    fn write_welcome(&self, id: usize, rb: &mut ReplyBuffer) {
        let client = &self.clients[&id];
        lines::welcome(rb.reply(rpl::WELCOME), client.full_name());
        lines::your_host(rb.reply(rpl::YOURHOST), &self.server_name, server_version!());
        lines::created(rb.reply(rpl::CREATED), &self.created_at);
        rb.reply(rpl::MYINFO)
            .param(&self.server_name)
            .param(server_version!())
            .param(malefirc_tokens::mode::USER_MODES)
            .param(malefirc_tokens::mode::SIMPLE_CHAN_MODES)
            .param(malefirc_tokens::mode::EXTENDED_CHAN_MODES);
        if let Some(account) = client.account() {
            self.write_logged_in(rb, client.full_name(), account);
        }
    }

    /// Appends the 900 reply for the given account.
    fn write_logged_in(&self, rb: &mut ReplyBuffer, full_name: &str, account: &str) {
        lines::logged_in(
            rb.reply(rpl::LOGGEDIN).param(full_name).param(account),
            account,
        );
    }

    /// Sends the list of nicknames in the channel `channel_name` to the
    /// given client.
    fn write_names(&self, id: usize, rb: &mut ReplyBuffer, channel_name: &str) {
        let channel = match self.channels.get(&channel_name.to_ascii_lowercase()) {
            Some(channel) => channel,
            None => return,
        };
        if channel.secret && !channel.has_member(id) {
            return;
        }
        if !channel.is_empty() {
            let mut message = rb
                .reply(rpl::NAMREPLY)
                .param(channel.symbol())
                .param(&channel.name);
            let trailing = message.raw_trailing_param();
            for (member, modes) in channel.members() {
                if let Some(s) = modes.symbol() {
                    trailing.push(s);
                }
                trailing.push_str(self.clients[&member].nick());
                trailing.push(' ');
            }
            trailing.pop(); // Remove last space
        }
        rb.reply(rpl::ENDOFNAMES)
            .param(&channel.name)
            .trailing_param(lines::END_OF_NAMES);
    }

    /// Sends the topic of the channel to the given client.
    fn write_topic(&self, rb: &mut ReplyBuffer, channel: &Channel) {
        if let Some(ref topic) = channel.topic {
            rb.reply(rpl::TOPIC).param(&channel.name).trailing_param(topic);
        } else {
            rb.reply(rpl::NOTOPIC)
                .param(&channel.name)
                .trailing_param(lines::NO_TOPIC);
        }
    }
}
