//! Channel data and mode application.

use crate::util;
use malefirc_tokens::{mode, rpl, MessageBuffer};
use std::collections::HashSet;

/// Modes applied to clients on a per-channel basis.
///
/// <https://tools.ietf.org/html/rfc2811.html#section-4.1>
#[derive(Clone, Copy, Default)]
pub struct MemberModes {
    pub operator: bool,
    pub voice: bool,
}

impl MemberModes {
    /// The prefix shown before the member's nick in NAMES replies.
    pub fn symbol(self) -> Option<char> {
        if self.operator {
            Some('@')
        } else if self.voice {
            Some('+')
        } else {
            None
        }
    }
}

/// Channel data.
///
/// Members are kept in join order, the order NAMES and WHO list them in.
pub struct Channel {
    /// The channel name, in the case of the first join.
    pub name: String,

    members: Vec<(usize, MemberModes)>,

    /// Clients invited with INVITE, consumed by their next join.
    pub invites: HashSet<usize>,

    /// The topic.
    pub topic: Option<String>,

    pub key: Option<String>,
    pub user_limit: Option<usize>,

    // https://tools.ietf.org/html/rfc2811.html#section-4.3
    pub ban_masks: HashSet<String>,

    // Modes: https://tools.ietf.org/html/rfc2811.html#section-4.2
    pub invite_only: bool,
    pub moderated: bool,
    pub no_external: bool,
    pub secret: bool,
    pub topic_restricted: bool,
}

impl Channel {
    /// Creates an empty channel.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            members: Vec::new(),
            invites: HashSet::new(),
            topic: None,
            key: None,
            user_limit: None,
            ban_masks: HashSet::new(),
            invite_only: false,
            moderated: false,
            no_external: false,
            secret: false,
            topic_restricted: false,
        }
    }

    /// Adds a member.  The first member of a channel becomes its operator.
    /// Any pending invitation is consumed.
    pub fn add_member(&mut self, id: usize) {
        let modes = MemberModes {
            operator: self.members.is_empty(),
            voice: false,
        };
        self.members.push((id, modes));
        self.invites.remove(&id);
    }

    /// Removes a member.  Returns whether it was one.
    pub fn remove_member(&mut self, id: usize) -> bool {
        match self.members.iter().position(|(m, _)| *m == id) {
            Some(i) => {
                self.members.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn member(&self, id: usize) -> Option<MemberModes> {
        self.members
            .iter()
            .find(|(m, _)| *m == id)
            .map(|(_, modes)| *modes)
    }

    pub fn has_member(&self, id: usize) -> bool {
        self.members.iter().any(|(m, _)| *m == id)
    }

    /// The members in join order.
    pub fn members(&self) -> impl Iterator<Item = (usize, MemberModes)> + '_ {
        self.members.iter().copied()
    }

    /// The member ids in join order.
    pub fn member_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().map(|(m, _)| *m)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `full_name` matches one of the channel's ban masks.
    pub fn is_banned(&self, full_name: &str) -> bool {
        self.ban_masks.iter().any(|mask| util::mask_matches(mask, full_name))
    }

    pub fn is_full(&self) -> bool {
        self.user_limit
            .map_or(false, |limit| limit <= self.members.len())
    }

    /// Whether the given client may send messages to the channel.
    pub fn can_talk(&self, id: usize) -> bool {
        if self.moderated {
            self.member(id).map_or(false, |m| m.voice || m.operator)
        } else {
            !self.no_external || self.has_member(id)
        }
    }

    /// Writes the channel modes as MODE parameters.  Key and limit values
    /// are only written when `full_info` is set.
    pub fn write_modes(&self, mut out: MessageBuffer<'_>, full_info: bool) {
        let modes = out.raw_param();
        modes.push('+');
        if self.invite_only {
            modes.push('i');
        }
        if self.moderated {
            modes.push('m');
        }
        if self.no_external {
            modes.push('n');
        }
        if self.secret {
            modes.push('s');
        }
        if self.topic_restricted {
            modes.push('t');
        }
        if self.key.is_some() {
            modes.push('k');
        }
        if self.user_limit.is_some() {
            modes.push('l');
        }

        if full_info {
            if let Some(ref key) = self.key {
                out = out.param(key);
            }
            if let Some(user_limit) = self.user_limit {
                out.fmt_param(&user_limit);
            }
        }
    }

    /// Applies one mode change.
    ///
    /// `member` is the resolved target of an `o`/`v` change, looked up by
    /// the caller.  Returns whether the change had an effect, or the
    /// numeric to send back when it cannot apply.
    pub fn apply_mode_change(
        &mut self,
        change: mode::ChannelChange<'_>,
        member: Option<usize>,
    ) -> Result<bool, &'static str> {
        use mode::ChannelChange::*;
        let mut applied = false;
        match change {
            InviteOnly(value) => {
                applied = self.invite_only != value;
                self.invite_only = value;
            }
            Moderated(value) => {
                applied = self.moderated != value;
                self.moderated = value;
            }
            NoExternalMessages(value) => {
                applied = self.no_external != value;
                self.no_external = value;
            }
            Secret(value) => {
                applied = self.secret != value;
                self.secret = value;
            }
            TopicRestricted(value) => {
                applied = self.topic_restricted != value;
                self.topic_restricted = value;
            }
            Key(value, key) => {
                if value {
                    applied = self.key.as_deref() != Some(key);
                    self.key = Some(key.to_owned());
                } else {
                    applied = self.key.is_some();
                    self.key = None;
                }
            }
            UserLimit(Some(s)) => {
                if let Ok(limit) = s.parse() {
                    applied = self.user_limit != Some(limit);
                    self.user_limit = Some(limit);
                }
            }
            UserLimit(None) => {
                applied = self.user_limit.is_some();
                self.user_limit = None;
            }
            ChangeBan(value, mask) => {
                applied = if value {
                    self.ban_masks.insert(mask.to_owned())
                } else {
                    self.ban_masks.remove(mask)
                };
            }
            ChangeOperator(value, _) => {
                let id = member.ok_or(rpl::ERR_USERNOTINCHANNEL)?;
                let modes = self
                    .members
                    .iter_mut()
                    .find(|(m, _)| *m == id)
                    .map(|(_, modes)| modes)
                    .ok_or(rpl::ERR_USERNOTINCHANNEL)?;
                applied = modes.operator != value;
                modes.operator = value;
            }
            ChangeVoice(value, _) => {
                let id = member.ok_or(rpl::ERR_USERNOTINCHANNEL)?;
                let modes = self
                    .members
                    .iter_mut()
                    .find(|(m, _)| *m == id)
                    .map(|(_, modes)| modes)
                    .ok_or(rpl::ERR_USERNOTINCHANNEL)?;
                applied = modes.voice != value;
                modes.voice = value;
            }
            GetBans => {}
        }
        Ok(applied)
    }

    /// The channel symbol for NAMES replies.
    pub fn symbol(&self) -> &'static str {
        if self.secret {
            "@"
        } else {
            "="
        }
    }
}

// mod tests
