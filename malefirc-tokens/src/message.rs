use crate::Command;

/// The recommended length of a message.
///
/// `Message::parse` accepts longer lines; `Buffer` uses this to reserve
/// space up front.
pub const MESSAGE_LENGTH: usize = 512;

/// The number of elements in `Message::params`.
pub const PARAMS_LENGTH: usize = 15;

/// Splits the first word off `s`.
///
/// Returns `(word, rest)` where `rest` starts at the first character of the
/// next word.  Word boundaries are single spaces.
fn split_word(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(i) => (&s[..i], s[i + 1..].trim_start_matches(' ')),
        None => (s, ""),
    }
}

/// Consumes the tag block, if any.  Returns the tag string without its `@`.
fn split_tags(s: &str) -> (&str, &str) {
    if let Some(rest) = s.strip_prefix('@') {
        let (tags, rest) = split_word(rest);
        (tags, rest)
    } else {
        ("", s)
    }
}

/// Consumes the prefix, if any.  Returns the prefix without its `:`.
fn split_prefix(s: &str) -> (Option<&str>, &str) {
    if let Some(rest) = s.strip_prefix(':') {
        let (prefix, rest) = split_word(rest);
        (Some(prefix), rest)
    } else {
        (None, s)
    }
}

/// Match a tag escape with its meaningful character.
///
/// # Example
///
/// ```rust
/// # use malefirc_tokens::tag_escape;
/// assert_eq!(tag_escape(':'), ';');  // "\:" is ";"
/// assert_eq!(tag_escape('x'), 'x');  // "\x" is "x"
/// ```
pub fn tag_escape(c: char) -> char {
    match c {
        ':' => ';',
        's' => ' ',
        'r' => '\r',
        'n' => '\n',
        c => c,
    }
}

/// A message tag.
///
/// See <https://ircv3.net/specs/extensions/message-tags> for the format and
/// the escaping scheme.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag<'a> {
    /// The key of the tag, `+`-prefixed for client tags.
    pub key: &'a str,

    /// The value of the tag, or `None` when the tag has no value.
    pub value: Option<&'a str>,
}

impl<'a> Tag<'a> {
    /// Parses one `key[=value]` item.
    pub fn parse(item: &'a str) -> Self {
        let mut split = item.splitn(2, '=');
        let key = split.next().unwrap();
        let value = match split.next() {
            Some("") | None => None,
            Some(value) => Some(value),
        };
        Self { key, value }
    }

    /// Whether the tag is a client-only tag.
    pub fn is_client(&self) -> bool {
        self.key.starts_with('+')
    }

    /// Returns the unescaped value of the tag.
    pub fn unescape_value(&self) -> String {
        let value = match self.value {
            Some(value) => value,
            None => return String::new(),
        };
        let mut res = String::with_capacity(value.len());
        let mut escape = false;
        for c in value.chars() {
            if c == '\\' && !escape {
                escape = true;
            } else {
                res.push(if escape { tag_escape(c) } else { c });
                escape = false;
            }
        }
        res
    }
}

/// An iterator over the tags of a tag string.
///
/// Items with an empty key are skipped.
///
/// # Example
///
/// ```rust
/// # use malefirc_tokens::{tags, Tag};
/// let mut my_tags = tags("msgid=42;+reply=7");
///
/// assert_eq!(my_tags.next(), Some(Tag { key: "msgid", value: Some("42") }));
/// assert_eq!(my_tags.next(), Some(Tag { key: "+reply", value: Some("7") }));
/// assert_eq!(my_tags.next(), None);
/// ```
pub fn tags(s: &str) -> impl Iterator<Item = Tag<'_>> {
    s.split(';')
        .filter(|item| !item.is_empty() && !item.starts_with('=') && !item.starts_with("+="))
        .map(Tag::parse)
}

/// A borrowed view over one IRC line.
///
/// See `Message::parse` for how lines are read, and `Buffer` for how they
/// are built.  Format reference:
/// <https://tools.ietf.org/html/rfc2812.html#section-2.3>.
#[derive(Clone, Debug)]
pub struct Message<'a> {
    /// The raw tag string, without the leading `@`.  Empty when the line
    /// carried no tags.
    pub tags: &'a str,

    /// The prefix, without the leading `:`.
    pub prefix: Option<&'a str>,

    /// The command, or `Err(s)` with the raw token when it is not a known
    /// `Command`.
    pub command: Result<Command, &'a str>,

    /// The number of valid elements in `Message::params`.
    pub num_params: usize,

    /// The parameters.  Only the first `num_params` elements are valid.
    pub params: [&'a str; PARAMS_LENGTH],
}

impl<'a> Message<'a> {
    /// Parses an IRC line.
    ///
    /// A single trailing `\r`, `\n` or `\r\n` is accepted.  Returns `None`
    /// when the line is empty or has no command.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use malefirc_tokens::{Command, Message};
    /// let msg = Message::parse("@+reply=1 :ser PRIVMSG #chess :good game\r\n").unwrap();
    ///
    /// assert_eq!(msg.tags, "+reply=1");
    /// assert_eq!(msg.prefix, Some("ser"));
    /// assert_eq!(msg.command, Ok(Command::PrivMsg));
    /// assert_eq!(msg.num_params, 2);
    /// assert_eq!(msg.params[0], "#chess");
    /// assert_eq!(msg.params[1], "good game");
    ///
    /// assert!(Message::parse("\r\n").is_none());
    /// assert!(Message::parse(":prefix.only").is_none());
    /// ```
    pub fn parse(s: &'a str) -> Option<Message<'a>> {
        let line = s.trim_end_matches(|c| c == '\r' || c == '\n');
        if line.is_empty() || line.contains('\0') {
            return None;
        }

        let (tags, rest) = split_tags(line);
        let (prefix, rest) = split_prefix(rest);
        let (command, mut rest) = split_word(rest);
        if command.is_empty() {
            return None;
        }
        let command = Command::parse(command).ok_or(command);

        let mut params = [""; PARAMS_LENGTH];
        let mut num_params = 0;
        while num_params < PARAMS_LENGTH && !rest.is_empty() {
            if let Some(trailing) = rest.strip_prefix(':') {
                params[num_params] = trailing;
                rest = "";
            } else {
                let (word, next) = split_word(rest);
                params[num_params] = word;
                rest = next;
            }
            num_params += 1;
        }

        Some(Message {
            tags,
            prefix,
            command,
            num_params,
            params,
        })
    }

    /// Whether the message has enough parameters for its command.
    pub fn has_enough_params(&self) -> bool {
        match self.command {
            Ok(cmd) => cmd.required_params() <= self.num_params,
            Err(_) => false,
        }
    }

    /// An iterator over the message's tags.
    pub fn tags(&self) -> impl Iterator<Item = Tag<'_>> {
        tags(self.tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let msg = Message::parse("NICK ser\r\n").unwrap();
        assert_eq!(msg.tags, "");
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, Ok(Command::Nick));
        assert_eq!(&msg.params[..msg.num_params], &["ser"]);

        let msg = Message::parse("nick ser").unwrap();
        assert_eq!(msg.command, Ok(Command::Nick));
    }

    #[test]
    fn test_parse_trailing() {
        let msg = Message::parse("USER ser 0 * :Sersei O.").unwrap();
        assert_eq!(msg.command, Ok(Command::User));
        assert_eq!(msg.num_params, 4);
        assert_eq!(msg.params[3], "Sersei O.");

        let msg = Message::parse("QUIT :").unwrap();
        assert_eq!(msg.num_params, 1);
        assert_eq!(msg.params[0], "");
    }

    #[test]
    fn test_parse_prefix_and_tags() {
        let msg = Message::parse("@msgid=42;+reply=7 :ser!ser@h PRIVMSG #c :hi there").unwrap();
        assert_eq!(msg.tags, "msgid=42;+reply=7");
        assert_eq!(msg.prefix, Some("ser!ser@h"));
        assert_eq!(&msg.params[..msg.num_params], &["#c", "hi there"]);

        let mut tags = msg.tags();
        assert_eq!(tags.next(), Some(Tag { key: "msgid", value: Some("42") }));
        assert_eq!(tags.next(), Some(Tag { key: "+reply", value: Some("7") }));
        assert_eq!(tags.next(), None);
    }

    #[test]
    fn test_parse_unknown_command() {
        let msg = Message::parse("TYPO one two").unwrap();
        assert_eq!(msg.command, Err("TYPO"));
        assert_eq!(&msg.params[..msg.num_params], &["one", "two"]);
        assert!(!msg.has_enough_params());
    }

    #[test]
    fn test_parse_rejects() {
        assert!(Message::parse("").is_none());
        assert!(Message::parse("\r\n").is_none());
        assert!(Message::parse("\n").is_none());
        assert!(Message::parse(":prefix.only").is_none());
        assert!(Message::parse("NICK a\0b").is_none());
    }

    #[test]
    fn test_parse_crlf_tolerance() {
        for line in &["PING token", "PING token\r", "PING token\n", "PING token\r\n"] {
            let msg = Message::parse(line).unwrap();
            assert_eq!(msg.command, Ok(Command::Ping));
            assert_eq!(msg.params[0], "token");
        }
    }

    #[test]
    fn test_tag_filtering() {
        let mut ts = tags("=skipped;time=12732;+=skipped;re=;ok=5678");
        assert_eq!(ts.next(), Some(Tag { key: "time", value: Some("12732") }));
        assert_eq!(ts.next(), Some(Tag { key: "re", value: None }));
        assert_eq!(ts.next(), Some(Tag { key: "ok", value: Some("5678") }));
        assert_eq!(ts.next(), None);
    }

    #[test]
    fn test_tag_unescape() {
        let cases = &[
            (r"semi\:colon", "semi;colon"),
            (r"with\sspace", "with space"),
            (r"line\r\nbreak", "line\r\nbreak"),
            (r"back\\slash", "back\\slash"),
            (r"unknown\x", "unknownx"),
            (r"dangling\", "dangling"),
            ("", ""),
        ];
        for (escaped, expected) in cases {
            let tag = Tag { key: "k", value: Some(escaped) };
            assert_eq!(&tag.unescape_value(), expected);
        }
    }
} // mod tests
