//! Mode parsing and validation

use std::str;

/// User modes supported by malefirc.  Advertised in welcome messages.
pub const USER_MODES: &str = "iow";

/// Channel modes that take no parameter.  Advertised in welcome messages.
pub const SIMPLE_CHAN_MODES: &str = "imnst";

/// Channel modes that require a parameter.  Advertised in welcome messages.
pub const EXTENDED_CHAN_MODES: &str = "bklov";

/// An iterator over the modes of a string, with their `+`/`-` value.
struct SimpleQuery<'a> {
    modes: str::Chars<'a>,
    value: bool,
}

impl<'a> SimpleQuery<'a> {
    pub fn new(modes: &'a str) -> Self {
        Self {
            modes: modes.chars(),
            value: true,
        }
    }
}

impl Iterator for SimpleQuery<'_> {
    type Item = (bool, char);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.modes.next()? {
                '+' => {
                    self.value = true;
                }
                '-' => {
                    self.value = false;
                }
                c => {
                    return Some((self.value, c));
                }
            }
        }
    }
}

/// Mode query errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// One of the modes in the query is unknown.
    Unknown(char, bool),

    /// A mode is missing its required parameter.
    MissingParam(char, bool),
}

/// Alias to std's Result using this module's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Item of a user mode query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserChange {
    Invisible(bool),
    Wallops(bool),
    Oper(bool),
}

impl UserChange {
    /// Whether this change is enabling or disabling the mode.
    pub fn value(self) -> bool {
        match self {
            Self::Invisible(v) | Self::Wallops(v) | Self::Oper(v) => v,
        }
    }

    /// The letter of this mode change.
    pub fn symbol(self) -> char {
        match self {
            Self::Invisible(_) => 'i',
            Self::Wallops(_) => 'w',
            Self::Oper(_) => 'o',
        }
    }
}

/// An iterator over the changes of a user MODE query.
///
/// # Example
///
/// ```rust
/// # use malefirc_tokens::mode::{self, Error, UserChange};
/// let mut query = mode::user_query("+iX-w");
///
/// assert_eq!(query.next(), Some(Ok(UserChange::Invisible(true))));
/// assert_eq!(query.next(), Some(Err(Error::Unknown('X', true))));
/// assert_eq!(query.next(), Some(Ok(UserChange::Wallops(false))));
/// assert_eq!(query.next(), None);
/// ```
pub fn user_query(modes: &str) -> impl Iterator<Item = Result<UserChange>> + '_ {
    SimpleQuery::new(modes).map(|(value, mode)| match mode {
        'i' => Ok(UserChange::Invisible(value)),
        'w' => Ok(UserChange::Wallops(value)),
        'o' => Ok(UserChange::Oper(value)),
        other => Err(Error::Unknown(other, value)),
    })
}

/// Item of a channel mode query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelChange<'a> {
    InviteOnly(bool),
    Moderated(bool),
    NoExternalMessages(bool),
    Secret(bool),
    TopicRestricted(bool),
    Key(bool, &'a str),
    UserLimit(Option<&'a str>),
    GetBans,
    ChangeBan(bool, &'a str),
    ChangeOperator(bool, &'a str),
    ChangeVoice(bool, &'a str),
}

impl ChannelChange<'_> {
    /// Whether this change is enabling or disabling the mode.
    pub fn value(&self) -> bool {
        use ChannelChange::*;
        match self {
            InviteOnly(v)
            | Moderated(v)
            | NoExternalMessages(v)
            | Secret(v)
            | TopicRestricted(v)
            | Key(v, _)
            | ChangeBan(v, _)
            | ChangeOperator(v, _)
            | ChangeVoice(v, _) => *v,
            UserLimit(l) => l.is_some(),
            GetBans => false,
        }
    }

    /// The letter of this mode change.
    pub fn symbol(&self) -> char {
        use ChannelChange::*;
        match self {
            InviteOnly(_) => 'i',
            Moderated(_) => 'm',
            NoExternalMessages(_) => 'n',
            Secret(_) => 's',
            TopicRestricted(_) => 't',
            Key(_, _) => 'k',
            UserLimit(_) => 'l',
            ChangeBan(_, _) | GetBans => 'b',
            ChangeOperator(_, _) => 'o',
            ChangeVoice(_, _) => 'v',
        }
    }

    /// The parameter of this mode change.
    pub fn param(&self) -> Option<&str> {
        use ChannelChange::*;
        match self {
            Key(_, p) | ChangeBan(_, p) | ChangeOperator(_, p) | ChangeVoice(_, p) => Some(p),
            UserLimit(l) => *l,
            _ => None,
        }
    }
}

/// An iterator over the changes of a channel MODE query.
///
/// Modes that take an argument consume the next mode parameter, in order.
///
/// # Example
///
/// ```rust
/// # use malefirc_tokens::mode::{self, ChannelChange, Error};
/// let mut query = mode::channel_query("-ol+kmv", &["admin", "secret_key"]);
///
/// assert_eq!(query.next(), Some(Ok(ChannelChange::ChangeOperator(false, "admin"))));
/// assert_eq!(query.next(), Some(Ok(ChannelChange::UserLimit(None))));
/// assert_eq!(query.next(), Some(Ok(ChannelChange::Key(true, "secret_key"))));
/// assert_eq!(query.next(), Some(Ok(ChannelChange::Moderated(true))));
/// assert_eq!(query.next(), Some(Err(Error::MissingParam('v', true))));
/// assert_eq!(query.next(), None);
/// ```
pub fn channel_query<'a, I, S>(
    modes: &'a str,
    params: I,
) -> impl Iterator<Item = Result<ChannelChange<'a>>>
where
    I: IntoIterator<Item = &'a S> + 'a,
    S: AsRef<str> + 'a,
{
    let mut params = params
        .into_iter()
        .map(|p| p.as_ref())
        .filter(|p| !p.is_empty());
    SimpleQuery::new(modes).map(move |(value, mode)| {
        use ChannelChange::*;
        match mode {
            'i' => Ok(InviteOnly(value)),
            'm' => Ok(Moderated(value)),
            'n' => Ok(NoExternalMessages(value)),
            's' => Ok(Secret(value)),
            't' => Ok(TopicRestricted(value)),
            'k' => {
                if let Some(param) = params.next() {
                    Ok(Key(value, param))
                } else if !value {
                    // "MODE -k" with no key is accepted, freenode-style
                    Ok(Key(false, "*"))
                } else {
                    Err(Error::MissingParam('k', value))
                }
            }
            'l' => {
                if !value {
                    Ok(UserLimit(None))
                } else if let Some(param) = params.next() {
                    Ok(UserLimit(Some(param)))
                } else {
                    Err(Error::MissingParam('l', value))
                }
            }
            'b' => {
                if let Some(param) = params.next() {
                    Ok(ChangeBan(value, param))
                } else {
                    Ok(GetBans)
                }
            }
            'o' => {
                if let Some(param) = params.next() {
                    Ok(ChangeOperator(value, param))
                } else {
                    Err(Error::MissingParam('o', value))
                }
            }
            'v' => {
                if let Some(param) = params.next() {
                    Ok(ChangeVoice(value, param))
                } else {
                    Err(Error::MissingParam('v', value))
                }
            }
            other => Err(Error::Unknown(other, value)),
        }
    })
}

// mod tests
