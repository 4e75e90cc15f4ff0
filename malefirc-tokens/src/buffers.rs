use crate::{Command, MESSAGE_LENGTH};
use std::fmt;

/// Helper to build one IRC message.
///
/// Obtained from `Buffer::message`.  The terminating `\r\n` is appended
/// when the `MessageBuffer` is dropped.
pub struct MessageBuffer<'a> {
    buf: &'a mut String,
}

impl<'a> MessageBuffer<'a> {
    fn with_prefix(buf: &'a mut String, prefix: &str, command: impl Into<Command>) -> Self {
        if !prefix.is_empty() {
            buf.push(':');
            buf.push_str(prefix);
            buf.push(' ');
        }
        buf.push_str(command.into().as_str());
        MessageBuffer { buf }
    }

    /// Appends a middle parameter to the message.
    ///
    /// The parameter is trimmed before insertion; whitespace-only parameters
    /// are not appended.  The caller must make sure the parameter contains
    /// no inner whitespace or newline.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use malefirc_tokens::{Buffer, Command};
    /// let mut response = Buffer::new();
    ///
    /// response.message("nick!user@127.0.0.1", Command::Join)
    ///     .param("")
    ///     .param("  #chess ");
    ///
    /// assert_eq!(&response.build(), ":nick!user@127.0.0.1 JOIN #chess\r\n");
    /// ```
    pub fn param(self, param: &str) -> Self {
        let param = param.trim();
        if param.is_empty() {
            return self;
        }
        self.buf.push(' ');
        self.buf.push_str(param);
        self
    }

    /// Formats, then appends a parameter to the message.
    ///
    /// Unlike `param`, the formatted value is appended as-is.
    pub fn fmt_param(self, param: &dyn fmt::Display) -> Self {
        use std::fmt::Write as _;

        self.buf.push(' ');
        let _ = write!(self.buf, "{}", param);
        self
    }

    /// Appends the trailing parameter and consumes the buffer.
    ///
    /// The parameter is not trimmed; it may contain spaces and start with
    /// `:`.  The caller must make sure it contains no newline.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use malefirc_tokens::{Buffer, Command};
    /// let mut response = Buffer::new();
    ///
    /// response.message("nick!user@127.0.0.1", Command::Quit)
    ///     .trailing_param("long quit message");
    ///
    /// assert_eq!(&response.build(), ":nick!user@127.0.0.1 QUIT :long quit message\r\n");
    /// ```
    pub fn trailing_param(self, param: &str) {
        self.buf.push(' ');
        self.buf.push(':');
        self.buf.push_str(param);
    }

    /// Returns the underlying string, positioned at a new middle parameter.
    pub fn raw_param(&mut self) -> &mut String {
        self.buf.push(' ');
        self.buf
    }

    /// Returns the underlying string, positioned at the trailing parameter.
    pub fn raw_trailing_param(&mut self) -> &mut String {
        self.buf.push(' ');
        self.buf.push(':');
        self.buf
    }
}

impl Drop for MessageBuffer<'_> {
    /// Appends "\r\n" when the `MessageBuffer` is dropped.
    fn drop(&mut self) {
        self.buf.push('\r');
        self.buf.push('\n');
    }
}

fn write_escaped(buf: &mut String, value: &dyn fmt::Display) {
    use std::fmt::Write as _;

    let mut raw = String::new();
    let _ = write!(raw, "{}", value);

    buf.reserve(raw.len());
    for c in raw.chars() {
        match c {
            ';' => buf.push_str("\\:"),
            ' ' => buf.push_str("\\s"),
            '\r' => buf.push_str("\\r"),
            '\n' => buf.push_str("\\n"),
            '\\' => buf.push_str("\\\\"),
            c => buf.push(c),
        }
    }
}

/// Helper to build the tag block of an IRC message.
pub struct TagBuffer<'a> {
    buf: &'a mut String,
    tag_start: usize,
}

impl<'a> TagBuffer<'a> {
    /// Starts a tag block at the end of `buf`.  Called by
    /// `Buffer::tagged_message`.
    fn new(buf: &'a mut String) -> Self {
        buf.reserve(MESSAGE_LENGTH);
        let tag_start = buf.len();
        buf.push('@');
        TagBuffer { buf, tag_start }
    }

    /// Whether the block has tags in it.
    pub fn is_empty(&self) -> bool {
        self.buf.len() == self.tag_start + 1
    }

    /// Appends a tag, escaping its value.
    pub fn tag(self, key: &str, value: Option<&dyn fmt::Display>) -> Self {
        if !self.is_empty() {
            self.buf.push(';');
        }
        self.buf.push_str(key);
        if let Some(value) = value {
            self.buf.push('=');
            write_escaped(self.buf, value);
        }
        self
    }

    /// Appends the raw tag item `s`.
    fn raw_tag(self, s: &str) -> Self {
        if !self.is_empty() {
            self.buf.push(';');
        }
        self.buf.push_str(s);
        self
    }

    /// Writes the length of the tag block (`@` and the following space
    /// included) to `out`, or 0 when no tag was added.
    ///
    /// Writers use this offset to strip tags for clients that have not
    /// negotiated `message-tags`.
    pub fn save_tags_len(self, out: &mut usize) -> Self {
        if self.buf.ends_with('@') {
            *out = 0;
        } else {
            *out = self.buf.len() + 1 - self.tag_start;
        }
        self
    }

    /// Ends the tag block and starts the message itself.
    pub fn prefixed_command(self, prefix: &str, cmd: impl Into<Command>) -> MessageBuffer<'a> {
        if self.is_empty() {
            self.buf.pop();
        } else {
            self.buf.push(' ');
        }
        MessageBuffer::with_prefix(self.buf, prefix, cmd)
    }
}

/// Helper to build IRC messages.
///
/// One buffer may hold several consecutive messages.
///
/// # Example
///
/// ```rust
/// # use malefirc_tokens::{Buffer, Command, rpl};
/// let mut response = Buffer::new();
///
/// response.message("nick!user@127.0.0.1", Command::Topic)
///     .param("#hall")
///     .trailing_param("Welcome to new users!");
/// response.message("malefirc.local", rpl::TOPIC)
///     .param("nickname")
///     .param("#hall")
///     .trailing_param("Welcome to new users!");
///
/// assert_eq!(&response.build(), ":nick!user@127.0.0.1 TOPIC #hall :Welcome to new users!\r\n\
/// :malefirc.local 332 nickname #hall :Welcome to new users!\r\n");
/// ```
#[derive(Debug, Default)]
pub struct Buffer {
    buf: String,
}

impl Buffer {
    /// Creates an empty `Buffer`.  Does not allocate.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: String::with_capacity(capacity),
        }
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// A view of the buffer's contents.
    pub fn get(&self) -> &str {
        &self.buf
    }

    /// Appends a message with the given prefix and command.
    pub fn message(&mut self, prefix: &str, command: impl Into<Command>) -> MessageBuffer<'_> {
        MessageBuffer::with_prefix(&mut self.buf, prefix, command)
    }

    /// Starts a message with a tag block.
    ///
    /// Client tags (those with the `+` prefix) are copied from
    /// `client_tags`; server tags are not forwarded.
    pub fn tagged_message(&mut self, client_tags: &str) -> TagBuffer<'_> {
        client_tags
            .split(';')
            .filter(|s| s.starts_with('+') && !s.starts_with("+="))
            .fold(TagBuffer::new(&mut self.buf), |buf, tag| buf.raw_tag(tag))
    }

    /// Consumes the `Buffer` and returns the built string.
    pub fn build(self) -> String {
        self.buf
    }
}

/// A `Buffer` that knows the server name and the client's nickname, for
/// numeric replies.
///
/// # Example
///
/// ```rust
/// # use malefirc_tokens::{ReplyBuffer, rpl};
/// let mut response = ReplyBuffer::new("malefirc.local", "ser");
///
/// response.reply(rpl::ERR_NOMOTD).trailing_param("MOTD File is missing");
///
/// assert_eq!(&response.build(), ":malefirc.local 422 ser :MOTD File is missing\r\n");
/// ```
#[derive(Debug)]
pub struct ReplyBuffer {
    buf: Buffer,
    domain: String,
    nick: String,
}

impl ReplyBuffer {
    pub fn new(domain: &str, nick: &str) -> Self {
        Self {
            buf: Buffer::new(),
            domain: domain.to_owned(),
            nick: nick.to_owned(),
        }
    }

    /// Whether the buffer has messages in it.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Updates the nickname used for subsequent replies.
    pub fn set_nick(&mut self, nick: &str) {
        self.nick.clear();
        self.nick.push_str(nick);
    }

    /// Appends a numeric reply: the server prefix, the reply and the
    /// client's nickname.
    pub fn reply(&mut self, r: impl Into<Command>) -> MessageBuffer<'_> {
        let msg = self.buf.message(&self.domain, r);
        msg.param(&self.nick)
    }

    /// Appends a message with an arbitrary prefix, like `Buffer::message`.
    pub fn message(&mut self, prefix: &str, command: impl Into<Command>) -> MessageBuffer<'_> {
        self.buf.message(prefix, command)
    }

    /// Consumes the `ReplyBuffer` and returns the built string.
    pub fn build(self) -> String {
        self.buf.build()
    }
}

// mod tests
