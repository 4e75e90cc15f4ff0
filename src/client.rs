//! Client data, connection state and capability logic.

use malefirc_tokens::{Buffer, MessageBuffer, ReplyBuffer};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One serialized batch of outgoing messages.
///
/// The batch is built with its tag block in place; `start` points past the
/// tags so that clients without `message-tags` receive the line without
/// them.  Cloning shares the underlying string.
#[derive(Clone, Debug)]
pub struct MessageQueueItem {
    pub start: usize,
    buf: Arc<String>,
}

impl From<Buffer> for MessageQueueItem {
    fn from(val: Buffer) -> Self {
        Self {
            start: 0,
            buf: Arc::new(val.build()),
        }
    }
}

impl From<ReplyBuffer> for MessageQueueItem {
    fn from(val: ReplyBuffer) -> Self {
        Self {
            start: 0,
            buf: Arc::new(val.build()),
        }
    }
}

impl AsRef<str> for MessageQueueItem {
    fn as_ref(&self) -> &str {
        &self.buf.as_ref()[self.start..]
    }
}

/// The sending end of a connection's outgoing message queue.
pub type MessageQueue = mpsc::UnboundedSender<MessageQueueItem>;

pub mod cap {
    //! The capabilities advertised by the server.

    pub const MESSAGE_TAGS: &str = "message-tags";
    pub const MSGID: &str = "msgid";
    pub const SASL: &str = "sasl";

    /// The CAP LS advertisement.
    pub const LS: &str = "message-tags msgid sasl";

    /// An iterator over the capability names of a CAP REQ parameter, with
    /// their enable/disable value.
    pub fn query(buf: &str) -> impl Iterator<Item = (&str, bool)> {
        buf.split_whitespace().map(|word| match word.strip_prefix('-') {
            Some(name) => (name, false),
            None => (word, true),
        })
    }

    /// Whether all capabilities of the CAP REQ parameter are known.
    pub fn are_supported(buf: &str) -> bool {
        query(buf).all(|(name, _)| matches!(name, MESSAGE_TAGS | MSGID | SASL))
    }
}

/// The set of capabilities enabled on a session.
#[derive(Clone, Copy, Debug, Default)]
pub struct Capabilities {
    pub message_tags: bool,
    pub msgid: bool,
    pub sasl: bool,
}

impl Capabilities {
    /// Applies a CAP REQ parameter.  The caller has checked that every
    /// name is supported.
    pub fn update(&mut self, buf: &str) {
        for (name, enable) in cap::query(buf) {
            match name {
                cap::MESSAGE_TAGS => self.message_tags = enable,
                cap::MSGID => self.msgid = enable,
                cap::SASL => self.sasl = enable,
                _ => {}
            }
        }
    }

    /// Writes the enabled capability names, space-separated.
    pub fn write(&self, buf: &mut String) {
        let len = buf.len();
        if self.message_tags {
            buf.push_str(cap::MESSAGE_TAGS);
            buf.push(' ');
        }
        if self.msgid {
            buf.push_str(cap::MSGID);
            buf.push(' ');
        }
        if self.sasl {
            buf.push_str(cap::SASL);
            buf.push(' ');
        }
        if len < buf.len() {
            buf.pop();
        }
    }

    pub fn has_message_tags(&self) -> bool {
        self.message_tags
    }
}

/// The length of all AUTHENTICATE chunks except the last.
pub const AUTHENTICATE_CHUNK_LEN: usize = 400;

/// Upper bound on buffered AUTHENTICATE data.
const AUTHENTICATE_BUFFER_LEN: usize = 4096;

const FULL_NAME_LENGTH: usize = 64;

/// Client data.
pub struct Client {
    /// The queue of messages to be sent to the client.
    ///
    /// This is the write end of a mpsc channel of messages (similar to go
    /// channels).  It is currently unbounded, so sending never blocks.
    queue: MessageQueue,

    pub capabilities: Capabilities,

    nick: Option<String>,
    user: Option<String>,
    real: String,
    host: String,
    registered: bool,

    /// The nick!user@host, updated when nick or user change.
    full_name: String,

    /// A password given with PASS, kept until registration completes.
    pub password: Option<String>,

    account: Option<String>,

    /// Base64 chunks of an AUTHENTICATE PLAIN exchange, `Some` while the
    /// exchange is in progress.
    auth_buffer: Option<String>,

    // Modes: https://tools.ietf.org/html/rfc2812.html#section-3.1.5
    pub away_message: Option<String>,
    pub invisible: bool,
    pub operator: bool,
    pub wallops: bool,
}

impl Client {
    /// Initializes the data for a new client, given its message queue and
    /// the host its socket is connected from.
    pub fn new(queue: MessageQueue, host: String) -> Self {
        let mut client = Self {
            queue,
            capabilities: Capabilities::default(),
            nick: None,
            user: None,
            real: String::new(),
            host,
            registered: false,
            full_name: String::with_capacity(FULL_NAME_LENGTH),
            password: None,
            account: None,
            auth_buffer: None,
            away_message: None,
            invisible: false,
            operator: false,
            wallops: false,
        };
        client.update_full_name();
        client
    }

    /// Pushes a message onto the client's queue.
    ///
    /// Tag blocks are kept for clients that negotiated `message-tags` and
    /// stripped for everyone else.
    pub fn send(&self, msg: impl Into<MessageQueueItem>) {
        let mut msg = msg.into();
        if self.capabilities.has_message_tags() {
            msg.start = 0;
        }
        let _ = self.queue.send(msg);
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Whether both NICK and USER have been received.
    pub fn can_register(&self) -> bool {
        !self.registered && self.nick.is_some() && self.user.is_some()
    }

    pub fn set_registered(&mut self) {
        self.registered = true;
    }

    /// The nickname of the client, `*` until NICK is received.
    pub fn nick(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }

    pub fn has_nick(&self) -> bool {
        self.nick.is_some()
    }

    pub fn set_nick(&mut self, nick: &str) {
        self.nick = Some(nick.to_owned());
        self.update_full_name();
    }

    /// The username of the client, empty until USER is received.
    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or("")
    }

    pub fn has_user(&self) -> bool {
        self.user.is_some()
    }

    pub fn set_user_real(&mut self, user: &str, real: &str) {
        self.user = Some(user.to_owned());
        self.real.clear();
        self.real.push_str(real);
        self.update_full_name();
    }

    /// The realname of the client.
    pub fn real(&self) -> &str {
        &self.real
    }

    /// The host of the client.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The nick!user@host of the client.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    fn update_full_name(&mut self) {
        let name = format!("{}!{}@{}", self.nick(), self.user(), self.host);
        self.full_name.clear();
        let _ = write!(self.full_name, "{}", name);
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn log_in(&mut self, account: String) {
        self.account = Some(account);
    }

    pub fn away_message(&self) -> Option<&str> {
        self.away_message.as_deref()
    }

    /// Starts an AUTHENTICATE PLAIN exchange.
    pub fn auth_begin(&mut self) {
        self.auth_buffer = Some(String::new());
    }

    pub fn auth_in_progress(&self) -> bool {
        self.auth_buffer.is_some()
    }

    /// Buffers one AUTHENTICATE chunk.
    ///
    /// Returns `Ok(true)` when the exchange is complete (a chunk shorter
    /// than 400 bytes arrived; `+` stands for the empty chunk), `Ok(false)`
    /// while more chunks are expected, and `Err(())` on overflow.
    pub fn auth_push(&mut self, chunk: &str) -> Result<bool, ()> {
        let buffer = self.auth_buffer.as_mut().ok_or(())?;
        if AUTHENTICATE_CHUNK_LEN < chunk.len()
            || AUTHENTICATE_BUFFER_LEN < buffer.len() + chunk.len()
        {
            return Err(());
        }
        if chunk != "+" {
            buffer.push_str(chunk);
        }
        Ok(chunk.len() != AUTHENTICATE_CHUNK_LEN)
    }

    /// Takes the buffered base64 data and ends the exchange.
    pub fn auth_take(&mut self) -> String {
        self.auth_buffer.take().unwrap_or_default()
    }

    pub fn auth_reset(&mut self) {
        self.auth_buffer = None;
    }

    /// Writes the client's user modes as a `+...` parameter.
    pub fn write_modes(&self, mut out: MessageBuffer<'_>) {
        let modes = out.raw_param();
        modes.push('+');
        if self.invisible {
            modes.push('i');
        }
        if self.operator {
            modes.push('o');
        }
        if self.wallops {
            modes.push('w');
        }
    }
}
