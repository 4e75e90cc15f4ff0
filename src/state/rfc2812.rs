//! Handlers for the client-to-server interface defined in the RFCs.
//!
//! <https://tools.ietf.org/html/rfc2812.html>
//! <https://modern.ircdocs.horse/>

use super::{
    find_channel, find_member, find_nick, is_channel_name, is_valid_channel_name,
    is_valid_nickname, CommandContext, HandlerResult as Result,
};
use crate::channel::Channel;
use crate::client::MessageQueueItem;
use crate::lines;
use crate::store::NewMessage;
use crate::util;
use malefirc_tokens::{mode, rpl, Buffer, Command};
use std::collections::HashSet;

// Command handlers
impl super::StateInner {
    // ADMIN

    pub fn cmd_admin(&self, ctx: CommandContext<'_>) -> Result {
        ctx.rb
            .reply(rpl::ADMINME)
            .param(&self.server_name)
            .trailing_param(lines::ADMIN_ME);
        ctx.rb.reply(rpl::ADMINLOC1).trailing_param(lines::ADMIN_LOC_1);
        ctx.rb.reply(rpl::ADMINLOC2).trailing_param(lines::ADMIN_LOC_2);
        ctx.rb.reply(rpl::ADMINMAIL).trailing_param(lines::ADMIN_MAIL);
        Ok(())
    }

    // AWAY

    pub fn cmd_away(&mut self, ctx: CommandContext<'_>, reason: Option<&str>) -> Result {
        let client = self.clients.get_mut(&ctx.id).unwrap();
        client.away_message = reason.map(str::to_owned);

        if reason.is_some() {
            ctx.rb.reply(rpl::NOWAWAY).trailing_param(lines::NOW_AWAY);
        } else {
            ctx.rb.reply(rpl::UNAWAY).trailing_param(lines::UN_AWAY);
        }
        Ok(())
    }

    // INFO

    pub fn cmd_info(&self, ctx: CommandContext<'_>) -> Result {
        for line in super::SERVER_INFO.lines() {
            ctx.rb.reply(rpl::INFO).trailing_param(line);
        }
        ctx.rb.reply(rpl::ENDOFINFO).trailing_param(lines::END_OF_INFO);
        Ok(())
    }

    // INVITE

    pub fn cmd_invite(&mut self, ctx: CommandContext<'_>, who: &str, to: &str) -> Result {
        let channel_key = to.to_ascii_lowercase();
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, to)?;
        let member_modes = find_member(ctx.id, ctx.rb, channel, to)?;
        if channel.invite_only && !member_modes.operator {
            log::debug!("{}:     not operator", ctx.id);
            ctx.rb
                .reply(rpl::ERR_CHANOPRIVSNEEDED)
                .param(to)
                .trailing_param(lines::CHAN_O_PRIVS_NEEDED);
            return Err(());
        }
        let (who_id, who_client) = find_nick(ctx.rb, &self.clients, &self.nicks, who)?;
        if channel.has_member(who_id) {
            log::debug!("{}:     user on channel", ctx.id);
            ctx.rb
                .reply(rpl::ERR_USERONCHANNEL)
                .param(who)
                .param(to)
                .trailing_param(lines::USER_ON_CHANNEL);
            return Err(());
        }
        let who_nick = who_client.nick().to_owned();
        let inviter = self.clients[&ctx.id].full_name().to_owned();

        self.channels
            .get_mut(&channel_key)
            .unwrap()
            .invites
            .insert(who_id);

        let mut invite = Buffer::new();
        invite
            .message(&inviter, Command::Invite)
            .param(&who_nick)
            .param(to);
        self.send(who_id, MessageQueueItem::from(invite));

        ctx.rb.reply(rpl::INVITING).param(&who_nick).param(to);
        Ok(())
    }

    // ISON

    pub fn cmd_ison(&self, ctx: CommandContext<'_>, nicks: &[&str]) -> Result {
        let mut message = ctx.rb.reply(rpl::ISON);
        let trailing = message.raw_trailing_param();
        let start = trailing.len();
        for nick in nicks {
            if let Some(client) = self
                .nicks
                .get(&nick.to_ascii_lowercase())
                .and_then(|id| self.clients.get(id))
            {
                trailing.push_str(client.nick());
                trailing.push(' ');
            }
        }
        if start < trailing.len() {
            trailing.pop();
        }
        Ok(())
    }

    // JOIN

    fn join_one(&mut self, ctx: &mut CommandContext<'_>, target: &str, key: Option<&str>)
        -> Result
    {
        if !is_valid_channel_name(target) {
            log::debug!("{}:     invalid channel name", ctx.id);
            ctx.rb
                .reply(rpl::ERR_NOSUCHCHANNEL)
                .param(target)
                .trailing_param(lines::NO_SUCH_CHANNEL);
            return Err(());
        }
        let channel_key = target.to_ascii_lowercase();

        if let Some(channel) = self.channels.get(&channel_key) {
            if channel.has_member(ctx.id) {
                return Ok(());
            }
            let client = &self.clients[&ctx.id];
            // Checks happen in this order: ban, invite, key, limit.
            if channel.is_banned(client.full_name()) {
                log::debug!("{}:     banned", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_BANNEDFROMCHAN)
                    .param(target)
                    .trailing_param(lines::BANNED_FROM_CHAN);
                return Err(());
            }
            if channel.invite_only && !channel.invites.contains(&ctx.id) {
                log::debug!("{}:     not invited", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_INVITEONLYCHAN)
                    .param(target)
                    .trailing_param(lines::INVITE_ONLY_CHAN);
                return Err(());
            }
            if channel.key.is_some() && channel.key.as_deref() != key {
                log::debug!("{}:     bad key", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_BADCHANKEY)
                    .param(target)
                    .trailing_param(lines::BAD_CHAN_KEY);
                return Err(());
            }
            if channel.is_full() {
                log::debug!("{}:     user limit reached", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_CHANNELISFULL)
                    .param(target)
                    .trailing_param(lines::CHANNEL_IS_FULL);
                return Err(());
            }
        }

        self.channels
            .entry(channel_key.clone())
            .or_insert_with(|| Channel::new(target))
            .add_member(ctx.id);

        let client = &self.clients[&ctx.id];
        let channel = &self.channels[&channel_key];

        ctx.rb
            .message(client.full_name(), Command::Join)
            .param(&channel.name);
        let mut join = Buffer::new();
        join.message(client.full_name(), Command::Join)
            .param(&channel.name);
        let join = MessageQueueItem::from(join);
        for member in channel.member_ids().filter(|member| *member != ctx.id) {
            self.send(member, join.clone());
        }

        self.write_topic(ctx.rb, channel);
        self.write_names(ctx.id, ctx.rb, &channel_key);
        Ok(())
    }

    pub fn cmd_join(&mut self, mut ctx: CommandContext<'_>, targets: &str, keys: &str) -> Result {
        let mut keys = keys.split(',');
        for target in targets.split(',').filter(|target| !target.is_empty()) {
            let key = keys.next().filter(|key| !key.is_empty());
            let _ = self.join_one(&mut ctx, target, key);
        }
        Ok(())
    }

    // KICK

    pub fn cmd_kick(
        &mut self,
        ctx: CommandContext<'_>,
        target: &str,
        nick: &str,
        reason: Option<&str>,
    ) -> Result {
        let channel_key = target.to_ascii_lowercase();
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
        let member_modes = find_member(ctx.id, ctx.rb, channel, target)?;
        if !member_modes.operator {
            log::debug!("{}:     not operator", ctx.id);
            ctx.rb
                .reply(rpl::ERR_CHANOPRIVSNEEDED)
                .param(target)
                .trailing_param(lines::CHAN_O_PRIVS_NEEDED);
            return Err(());
        }
        let kicked_id = self
            .nicks
            .get(&nick.to_ascii_lowercase())
            .copied()
            .filter(|kicked| channel.has_member(*kicked));
        let kicked_id = match kicked_id {
            Some(kicked_id) => kicked_id,
            None => {
                log::debug!("{}:     target not on channel", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_USERNOTINCHANNEL)
                    .param(nick)
                    .param(target)
                    .trailing_param(lines::USER_NOT_IN_CHANNEL);
                return Err(());
            }
        };

        let kicker = self.clients[&ctx.id].full_name().to_owned();
        let kicked_nick = self.clients[&kicked_id].nick().to_owned();
        let mut response = Buffer::new();
        {
            let msg = response
                .message(&kicker, Command::Kick)
                .param(target)
                .param(&kicked_nick);
            if let Some(reason) = reason {
                msg.trailing_param(reason);
            }
        }
        let msg = MessageQueueItem::from(response);

        // The kicker and the kicked both see the echo.
        let channel = self.channels.get_mut(&channel_key).unwrap();
        let members: Vec<usize> = channel.member_ids().collect();
        channel.remove_member(kicked_id);
        if channel.is_empty() {
            self.channels.remove(&channel_key);
        }
        for member in members {
            self.send(member, msg.clone());
        }
        Ok(())
    }

    // KILL

    pub fn cmd_kill(&mut self, ctx: CommandContext<'_>, nick: &str, reason: Option<&str>)
        -> Result
    {
        if !self.clients[&ctx.id].operator {
            log::debug!("{}:     not operator", ctx.id);
            ctx.rb
                .reply(rpl::ERR_NOPRIVILEGES)
                .trailing_param(lines::NO_PRIVILEGES);
            return Err(());
        }
        let (target_id, _) = find_nick(ctx.rb, &self.clients, &self.nicks, nick)?;
        let killer = self.clients[&ctx.id].nick().to_owned();
        let reason = reason.unwrap_or(&killer);

        let mut kill = Buffer::new();
        kill.message(self.clients[&ctx.id].full_name(), Command::Kill)
            .param(nick)
            .trailing_param(reason);
        self.send(target_id, MessageQueueItem::from(kill));

        let target = self.clients.remove(&target_id).unwrap();
        self.remove_client(target_id, target, &format!("Killed ({})", reason));
        Ok(())
    }

    // LIST

    pub fn cmd_list(&self, ctx: CommandContext<'_>) -> Result {
        ctx.rb
            .reply(rpl::LISTSTART)
            .param("Channel")
            .trailing_param("Users Name");
        for channel in self.channels.values() {
            if channel.secret && !channel.has_member(ctx.id) {
                continue;
            }
            let msg = ctx.rb
                .reply(rpl::LIST)
                .param(&channel.name)
                .fmt_param(&channel.member_count());
            // No trailing at all when the channel has no topic.
            if let Some(ref topic) = channel.topic {
                msg.trailing_param(topic);
            }
        }
        ctx.rb.reply(rpl::LISTEND).trailing_param(lines::END_OF_LIST);
        Ok(())
    }

    // MODE

    fn cmd_mode_chan_get(&self, ctx: CommandContext<'_>, target: &str) -> Result {
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
        let msg = ctx.rb.reply(rpl::CHANNELMODEIS).param(&channel.name);
        channel.write_modes(msg, true);
        Ok(())
    }

    fn cmd_mode_chan_set(
        &mut self,
        ctx: CommandContext<'_>,
        target: &str,
        modes: &str,
        modeparams: &[&str],
    ) -> Result {
        let channel_key = target.to_ascii_lowercase();
        {
            let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
            let member_modes = find_member(ctx.id, ctx.rb, channel, target)?;
            if !member_modes.operator {
                log::debug!("{}:     not operator", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_CHANOPRIVSNEEDED)
                    .param(target)
                    .trailing_param(lines::CHAN_O_PRIVS_NEEDED);
                return Err(());
            }
        }

        let mut applied_modes = String::new();
        let mut applied_params = Vec::new();
        for maybe_change in mode::channel_query(modes, modeparams) {
            match maybe_change {
                Ok(mode::ChannelChange::GetBans) => {
                    let channel = &self.channels[&channel_key];
                    for mask in &channel.ban_masks {
                        ctx.rb.reply(rpl::BANLIST).param(&channel.name).param(mask);
                    }
                    ctx.rb
                        .reply(rpl::ENDOFBANLIST)
                        .param(&channel.name)
                        .trailing_param(lines::END_OF_BAN_LIST);
                }
                Ok(change) => {
                    // o and v name a member; resolve the nickname here so
                    // the channel only deals in connection ids.
                    let member = match change {
                        mode::ChannelChange::ChangeOperator(_, nick)
                        | mode::ChannelChange::ChangeVoice(_, nick) => {
                            self.nicks.get(&nick.to_ascii_lowercase()).copied()
                        }
                        _ => None,
                    };
                    let channel = self.channels.get_mut(&channel_key).unwrap();
                    match channel.apply_mode_change(change, member) {
                        Ok(true) => {
                            log::debug!("  - Applied {:?}", change);
                            applied_modes.push(if change.value() { '+' } else { '-' });
                            applied_modes.push(change.symbol());
                            if let Some(param) = change.param() {
                                applied_params.push(param.to_owned());
                            }
                        }
                        Ok(false) => {}
                        Err(reply) => {
                            ctx.rb
                                .reply(reply)
                                .param(change.param().unwrap_or(target))
                                .param(target)
                                .trailing_param(lines::USER_NOT_IN_CHANNEL);
                        }
                    }
                }
                Err(mode::Error::Unknown(mode, _)) => {
                    ctx.rb
                        .reply(rpl::ERR_UNKNOWNMODE)
                        .param(&mode.to_string())
                        .trailing_param(lines::UNKNOWN_MODE);
                }
                Err(_) => {}
            }
        }

        if !applied_modes.is_empty() {
            let mut response = Buffer::new();
            {
                let mut msg = response
                    .message(self.clients[&ctx.id].full_name(), Command::Mode)
                    .param(target)
                    .param(&applied_modes);
                for mp in applied_params {
                    msg = msg.param(&mp);
                }
            }
            self.broadcast(&self.channels[&channel_key], MessageQueueItem::from(response));
        }
        Ok(())
    }

    fn cmd_mode_user(
        &mut self,
        ctx: CommandContext<'_>,
        target: &str,
        modes: &str,
    ) -> Result {
        let caller_is_oper = self.clients[&ctx.id].operator;
        let (target_id, _) = find_nick(ctx.rb, &self.clients, &self.nicks, target)?;
        if target_id != ctx.id && !caller_is_oper {
            log::debug!("{}:     users don't match", ctx.id);
            ctx.rb
                .reply(rpl::ERR_USERSDONTMATCH)
                .param(target)
                .trailing_param(lines::USERS_DONT_MATCH);
            return Err(());
        }

        if modes.is_empty() {
            let client = &self.clients[&target_id];
            let msg = ctx.rb.reply(rpl::UMODEIS);
            client.write_modes(msg);
            return Ok(());
        }

        let mut applied_modes = String::new();
        let client = self.clients.get_mut(&target_id).unwrap();
        for maybe_change in mode::user_query(modes) {
            match maybe_change {
                Ok(change) => {
                    let applied = match change {
                        mode::UserChange::Invisible(value) => {
                            let applied = client.invisible != value;
                            client.invisible = value;
                            applied
                        }
                        mode::UserChange::Wallops(value) => {
                            let applied = client.wallops != value;
                            client.wallops = value;
                            applied
                        }
                        // Only a server operator may grant +o, and only to
                        // themselves.
                        mode::UserChange::Oper(true) => {
                            if caller_is_oper && target_id == ctx.id && !client.operator {
                                client.operator = true;
                                true
                            } else {
                                false
                            }
                        }
                        mode::UserChange::Oper(false) => {
                            let applied = client.operator;
                            client.operator = false;
                            applied
                        }
                    };
                    if applied {
                        applied_modes.push(if change.value() { '+' } else { '-' });
                        applied_modes.push(change.symbol());
                    }
                }
                Err(mode::Error::Unknown(..)) => {
                    ctx.rb
                        .reply(rpl::ERR_UMODEUNKNOWNFLAG)
                        .trailing_param(lines::UNKNOWN_MODE_FLAG);
                }
                Err(_) => {}
            }
        }
        if !applied_modes.is_empty() {
            let client = &self.clients[&target_id];
            ctx.rb
                .message(client.full_name(), Command::Mode)
                .param(client.nick())
                .param(&applied_modes);
        }
        Ok(())
    }

    pub fn cmd_mode(
        &mut self,
        ctx: CommandContext<'_>,
        target: &str,
        modes: &str,
        modeparams: &[&str],
    ) -> Result {
        if is_channel_name(target) {
            if modes.is_empty() {
                self.cmd_mode_chan_get(ctx, target)
            } else {
                self.cmd_mode_chan_set(ctx, target, modes, modeparams)
            }
        } else {
            self.cmd_mode_user(ctx, target, modes)
        }
    }

    // MOTD

    pub fn cmd_motd(&self, ctx: CommandContext<'_>) -> Result {
        ctx.rb.reply(rpl::ERR_NOMOTD).trailing_param(lines::NO_MOTD);
        Ok(())
    }

    // NAMES

    pub fn cmd_names(&self, ctx: CommandContext<'_>, targets: &str) -> Result {
        if targets.is_empty() || targets == "*" {
            ctx.rb
                .reply(rpl::ENDOFNAMES)
                .param("*")
                .trailing_param(lines::END_OF_NAMES);
        } else {
            for target in targets.split(',') {
                self.write_names(ctx.id, ctx.rb, target);
            }
        }
        Ok(())
    }

    // NICK

    pub fn cmd_nick(&mut self, ctx: CommandContext<'_>, nick: &str) -> Result {
        if !is_valid_nickname(nick) {
            log::debug!("{}:     bad nickname", ctx.id);
            ctx.rb
                .reply(rpl::ERR_ERRONEUSNICKNAME)
                .param(nick)
                .trailing_param(lines::ERRONEOUS_NICKNAME);
            return Err(());
        }
        let nick_key = nick.to_ascii_lowercase();
        if self.nicks.get(&nick_key).map_or(false, |owner| *owner != ctx.id) {
            log::debug!("{}:     already in use", ctx.id);
            ctx.rb
                .reply(rpl::ERR_NICKNAMEINUSE)
                .param(nick)
                .trailing_param(lines::NICKNAME_IN_USE);
            return Err(());
        }

        let client = self.clients.get_mut(&ctx.id).unwrap();
        let old_key = if client.has_nick() {
            Some(client.nick().to_ascii_lowercase())
        } else {
            None
        };

        if client.is_registered() {
            let mut response = Buffer::new();
            response
                .message(client.full_name(), Command::Nick)
                .param(nick);
            let msg = MessageQueueItem::from(response);
            client.set_nick(nick);
            ctx.rb.set_nick(nick);
            if let Some(old_key) = old_key {
                self.nicks.remove(&old_key);
            }
            self.nicks.insert(nick_key, ctx.id);

            // The change is seen once by everyone sharing a channel with
            // the client, and by the client itself.
            let mut observers: HashSet<usize> = self
                .channels
                .values()
                .filter(|channel| channel.has_member(ctx.id))
                .flat_map(|channel| channel.member_ids())
                .collect();
            observers.insert(ctx.id);
            for observer in observers {
                self.send(observer, msg.clone());
            }
        } else {
            client.set_nick(nick);
            ctx.rb.set_nick(nick);
            if let Some(old_key) = old_key {
                self.nicks.remove(&old_key);
            }
            self.nicks.insert(nick_key, ctx.id);
            self.complete_registration(ctx.id, ctx.rb);
        }
        Ok(())
    }

    // NOTICE

    pub fn cmd_notice(&mut self, ctx: CommandContext<'_>, target: &str, content: &str) -> Result {
        self.cmd_privnotice(ctx, Command::Notice, target, content)
    }

    // OPER

    pub fn cmd_oper(&mut self, ctx: CommandContext<'_>, name: &str, password: &str) -> Result {
        if self.oper_name != name || self.oper_password != password {
            log::debug!("{}:     password mismatch", ctx.id);
            ctx.rb
                .reply(rpl::ERR_PASSWDMISMATCH)
                .trailing_param(lines::PASSWORD_MISMATCH);
            return Err(());
        }

        let client = self.clients.get_mut(&ctx.id).unwrap();
        client.operator = true;
        let nick = client.nick().to_owned();
        ctx.rb
            .message(&self.server_name, Command::Mode)
            .param(&nick)
            .param("+o");
        ctx.rb.reply(rpl::YOUREOPER).trailing_param(lines::YOURE_OPER);
        Ok(())
    }

    // PART

    pub fn cmd_part(&mut self, mut ctx: CommandContext<'_>, targets: &str, reason: Option<&str>)
        -> Result
    {
        for target in targets.split(',').filter(|target| !target.is_empty()) {
            let _ = self.part_one(&mut ctx, target, reason);
        }
        Ok(())
    }

    fn part_one(&mut self, ctx: &mut CommandContext<'_>, target: &str, reason: Option<&str>)
        -> Result
    {
        let channel_key = target.to_ascii_lowercase();
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
        if !channel.has_member(ctx.id) {
            log::debug!("{}:     not on channel", ctx.id);
            ctx.rb
                .reply(rpl::ERR_NOTONCHANNEL)
                .param(target)
                .trailing_param(lines::NOT_ON_CHANNEL);
            return Err(());
        }

        let client = &self.clients[&ctx.id];
        let mut response = Buffer::new();
        {
            let msg = response
                .message(client.full_name(), Command::Part)
                .param(&channel.name);
            if let Some(reason) = reason {
                msg.trailing_param(reason);
            }
        }
        let msg = MessageQueueItem::from(response);
        self.broadcast(channel, msg);

        let channel = self.channels.get_mut(&channel_key).unwrap();
        channel.remove_member(ctx.id);
        if channel.is_empty() {
            self.channels.remove(&channel_key);
        }
        Ok(())
    }

    // PASS

    pub fn cmd_pass(&mut self, ctx: CommandContext<'_>, password: &str) -> Result {
        let client = self.clients.get_mut(&ctx.id).unwrap();
        if client.is_registered() {
            ctx.rb
                .reply(rpl::ERR_ALREADYREGISTRED)
                .trailing_param(lines::ALREADY_REGISTERED);
            return Err(());
        }
        client.password = Some(password.to_owned());
        Ok(())
    }

    // PING

    pub fn cmd_ping(&mut self, ctx: CommandContext<'_>, token: &str) -> Result {
        ctx.rb
            .message(&self.server_name, Command::Pong)
            .param(&self.server_name)
            .trailing_param(token);
        Ok(())
    }

    // PRIVMSG

    pub fn cmd_privmsg(&mut self, ctx: CommandContext<'_>, target: &str, content: &str)
        -> Result
    {
        self.cmd_privnotice(ctx, Command::PrivMsg, target, content)
    }

    fn cmd_privnotice(
        &mut self,
        ctx: CommandContext<'_>,
        cmd: Command,
        target: &str,
        content: &str,
    ) -> Result {
        if content.is_empty() {
            ctx.rb
                .reply(rpl::ERR_NOTEXTTOSEND)
                .trailing_param(lines::NO_TEXT_TO_SEND);
            return Err(());
        }
        let reply_to = malefirc_tokens::tags(ctx.tags)
            .find(|tag| tag.key == "+reply")
            .and_then(|tag| tag.value)
            .and_then(|value| value.parse().ok());

        if is_channel_name(target) {
            let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
            if !channel.can_talk(ctx.id) {
                log::debug!("{}:     can't send to channel", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_CANNOTSENDTOCHAN)
                    .param(target)
                    .trailing_param(lines::CANNOT_SEND_TO_CHAN);
                return Err(());
            }

            let client = &self.clients[&ctx.id];
            let msgid = self.store.append_history(&NewMessage {
                sender: client.nick(),
                target: &channel.name,
                body: content,
                kind: cmd.as_str(),
                is_channel: true,
                reply_to,
            });
            let msg = tagged_to_target(ctx.tags, msgid, client.full_name(), cmd,
                                       &channel.name, content);
            for member in channel.member_ids().filter(|member| *member != ctx.id) {
                self.send(member, msg.clone());
            }

            if cmd == Command::PrivMsg {
                self.send_mention_notices(ctx.id, &target.to_ascii_lowercase(), content);
            }
        } else {
            let (target_id, target_client) =
                find_nick(ctx.rb, &self.clients, &self.nicks, target)?;
            let client = &self.clients[&ctx.id];
            let msgid = self.store.append_history(&NewMessage {
                sender: client.nick(),
                target: target_client.nick(),
                body: content,
                kind: cmd.as_str(),
                is_channel: false,
                reply_to,
            });
            let msg = tagged_to_target(ctx.tags, msgid, client.full_name(), cmd,
                                       target_client.nick(), content);
            self.send(target_id, msg);
        }
        Ok(())
    }

    /// Sends a server NOTICE to every channel member whose nickname is
    /// mentioned as `@nick` in `content`, except the sender.
    fn send_mention_notices(&self, sender: usize, channel_key: &str, content: &str) {
        let channel = &self.channels[channel_key];
        let sender_nick = self.clients[&sender].nick();
        let mut notified = HashSet::new();
        for capture in self.mentions.captures_iter(content) {
            let nick_key = capture[1].to_ascii_lowercase();
            if !notified.insert(nick_key.clone()) {
                continue;
            }
            let mentioned = match self.nicks.get(&nick_key) {
                Some(mentioned) => *mentioned,
                None => continue,
            };
            if mentioned == sender || !channel.has_member(mentioned) {
                continue;
            }
            let mut notice = Buffer::new();
            lines::mentioned(
                notice
                    .message(&self.server_name, Command::Notice)
                    .param(self.clients[&mentioned].nick()),
                sender_nick,
                &channel.name,
                content,
            );
            self.send(mentioned, MessageQueueItem::from(notice));
        }
    }

    // QUIT

    pub fn cmd_quit(&mut self, id: usize, reason: Option<&str>) {
        if let Some(client) = self.clients.remove(&id) {
            let mut error = Buffer::new();
            error
                .message(&self.server_name, Command::Error)
                .trailing_param(lines::CLOSING_LINK);
            client.send(MessageQueueItem::from(error));
            self.remove_client(id, client, reason.unwrap_or(lines::DEFAULT_QUIT));
        }
    }

    // TIME

    pub fn cmd_time(&self, ctx: CommandContext<'_>) -> Result {
        ctx.rb
            .reply(rpl::TIME)
            .param(&self.server_name)
            .trailing_param(&util::time_str());
        Ok(())
    }

    // TOPIC

    fn cmd_topic_get(&self, ctx: CommandContext<'_>, target: &str) -> Result {
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
        self.write_topic(ctx.rb, channel);
        Ok(())
    }

    fn cmd_topic_set(&mut self, ctx: CommandContext<'_>, target: &str, topic: &str) -> Result {
        let channel_key = target.to_ascii_lowercase();
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
        let member_modes = find_member(ctx.id, ctx.rb, channel, target)?;
        if channel.topic_restricted && !member_modes.operator {
            log::debug!("{}:     not operator", ctx.id);
            ctx.rb
                .reply(rpl::ERR_CHANOPRIVSNEEDED)
                .param(target)
                .trailing_param(lines::CHAN_O_PRIVS_NEEDED);
            return Err(());
        }

        let full_name = self.clients[&ctx.id].full_name().to_owned();
        let channel = self.channels.get_mut(&channel_key).unwrap();
        channel.topic = if topic.is_empty() {
            None
        } else {
            Some(topic.to_owned())
        };

        let mut response = Buffer::new();
        response
            .message(&full_name, Command::Topic)
            .param(&channel.name)
            .trailing_param(topic);
        self.broadcast(&self.channels[&channel_key], MessageQueueItem::from(response));
        Ok(())
    }

    pub fn cmd_topic(&mut self, ctx: CommandContext<'_>, target: &str, topic: Option<&str>)
        -> Result
    {
        match topic {
            Some(topic) => self.cmd_topic_set(ctx, target, topic),
            None => self.cmd_topic_get(ctx, target),
        }
    }

    // USER

    pub fn cmd_user(&mut self, ctx: CommandContext<'_>, user: &str, real: &str) -> Result {
        let client = self.clients.get_mut(&ctx.id).unwrap();
        if client.is_registered() || client.has_user() {
            ctx.rb
                .reply(rpl::ERR_ALREADYREGISTRED)
                .trailing_param(lines::ALREADY_REGISTERED);
            return Err(());
        }
        client.set_user_real(user, real);
        self.complete_registration(ctx.id, ctx.rb);
        Ok(())
    }

    // USERHOST

    pub fn cmd_userhost(&self, ctx: CommandContext<'_>, nicks: &[&str]) -> Result {
        let mut message = ctx.rb.reply(rpl::USERHOST);
        let trailing = message.raw_trailing_param();
        let start = trailing.len();
        for nick in nicks.iter().take(5) {
            let client = match self
                .nicks
                .get(&nick.to_ascii_lowercase())
                .and_then(|id| self.clients.get(id))
            {
                Some(client) => client,
                None => continue,
            };
            trailing.push_str(client.nick());
            if client.operator {
                trailing.push('*');
            }
            trailing.push('=');
            trailing.push(if client.away_message().is_some() { '-' } else { '+' });
            trailing.push_str(client.user());
            trailing.push('@');
            trailing.push_str(client.host());
            trailing.push(' ');
        }
        if start < trailing.len() {
            trailing.pop();
        }
        Ok(())
    }

    // VERSION

    pub fn cmd_version(&self, ctx: CommandContext<'_>) -> Result {
        ctx.rb
            .reply(rpl::VERSION)
            .param(crate::server_version!())
            .param(&self.server_name);
        Ok(())
    }

    // WHO

    pub fn cmd_who(&self, ctx: CommandContext<'_>, mask: &str) -> Result {
        if let Some(channel) = self.channels.get(&mask.to_ascii_lowercase()) {
            for (member, member_modes) in channel.members() {
                let client = &self.clients[&member];
                let mut flags = String::with_capacity(3);
                flags.push(if client.away_message().is_some() { 'G' } else { 'H' });
                if client.operator {
                    flags.push('*');
                }
                if let Some(s) = member_modes.symbol() {
                    flags.push(s);
                }
                let mut msg = ctx.rb
                    .reply(rpl::WHOREPLY)
                    .param(&channel.name)
                    .param(client.user())
                    .param(client.host())
                    .param(&self.server_name)
                    .param(client.nick())
                    .param(&flags);
                let trailing = msg.raw_trailing_param();
                trailing.push_str("0 ");
                trailing.push_str(client.real());
            }
        }
        ctx.rb
            .reply(rpl::ENDOFWHO)
            .param(mask)
            .trailing_param(lines::END_OF_WHO);
        Ok(())
    }

    // WHOIS

    pub fn cmd_whois(&self, ctx: CommandContext<'_>, nick: &str) -> Result {
        let (target_id, target) = find_nick(ctx.rb, &self.clients, &self.nicks, nick)?;

        ctx.rb
            .reply(rpl::WHOISUSER)
            .param(target.nick())
            .param(target.user())
            .param(target.host())
            .param("*")
            .trailing_param(target.real());

        let mut channel_list = String::new();
        for channel in self.channels.values() {
            if let Some(member_modes) = channel.member(target_id) {
                if let Some(s) = member_modes.symbol() {
                    channel_list.push(s);
                }
                channel_list.push_str(&channel.name);
                channel_list.push(' ');
            }
        }
        if !channel_list.is_empty() {
            channel_list.pop();
            ctx.rb
                .reply(rpl::WHOISCHANNELS)
                .param(target.nick())
                .trailing_param(&channel_list);
        }

        ctx.rb
            .reply(rpl::WHOISSERVER)
            .param(target.nick())
            .param(&self.server_name)
            .trailing_param(crate::server_version!());
        if target.operator {
            ctx.rb
                .reply(rpl::WHOISOPERATOR)
                .param(target.nick())
                .trailing_param(lines::WHOIS_OPERATOR);
        }
        if let Some(account) = target.account() {
            ctx.rb
                .reply(rpl::WHOISACCOUNT)
                .param(target.nick())
                .param(account)
                .trailing_param(lines::WHOIS_ACCOUNT);
        }
        if let Some(away) = target.away_message() {
            ctx.rb.reply(rpl::AWAY).param(target.nick()).trailing_param(away);
        }
        ctx.rb
            .reply(rpl::ENDOFWHOIS)
            .param(target.nick())
            .trailing_param(lines::END_OF_WHOIS);
        Ok(())
    }

    // WHOWAS

    pub fn cmd_whowas(&self, ctx: CommandContext<'_>, nick: &str) -> Result {
        // No nickname history is kept.
        ctx.rb
            .reply(rpl::ERR_WASNOSUCHNICK)
            .param(nick)
            .trailing_param(lines::WAS_NO_SUCH_NICK);
        ctx.rb
            .reply(rpl::ENDOFWHOWAS)
            .param(nick)
            .trailing_param(lines::END_OF_WHOWAS);
        Ok(())
    }
}

/// Builds the outgoing PRIVMSG/NOTICE, carrying the sender's client tags
/// and, when the message was persisted, its `msgid`.
///
/// The item's `start` is set past the tag block, so untagged delivery is
/// the default and the writer keeps tags only for capable clients.
fn tagged_to_target(
    client_tags: &str,
    msgid: Option<i64>,
    full_name: &str,
    cmd: Command,
    target: &str,
    content: &str,
) -> MessageQueueItem {
    let mut response = Buffer::new();
    let mut tags_len = 0;
    {
        let mut tags = response.tagged_message(client_tags);
        if let Some(msgid) = msgid {
            tags = tags.tag("msgid", Some(&msgid));
        }
        tags.save_tags_len(&mut tags_len)
            .prefixed_command(full_name, cmd)
            .param(target)
            .trailing_param(content);
    }
    let mut msg = MessageQueueItem::from(response);
    msg.start = tags_len;
    msg
}

#[cfg(test)]
mod tests {
    use super::super::test::{
        add_client, add_registered_client, collect, flush, numerics, sequence, simple_state,
        state_with_accounts, state_with_store, SERVER_NAME,
    };
    use crate::store::{MemoryStore, Privacy, Store};

    // Scenario: two users chat on a channel.
    #[test]
    fn test_two_user_chat() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");

        sequence(&mut s, alice, &["JOIN #t"]);
        sequence(&mut s, bob, &["JOIN #t"]);
        flush(&mut q_alice);
        flush(&mut q_bob);

        sequence(&mut s, alice, &["PRIVMSG #t :hello"]);

        let mut bob_sees = String::new();
        collect(&mut bob_sees, &mut q_bob);
        assert_eq!(bob_sees, ":alice!X@127.0.0.1 PRIVMSG #t :hello\r\n");

        // No echo to the sender.
        let mut alice_sees = String::new();
        collect(&mut alice_sees, &mut q_alice);
        assert_eq!(alice_sees, "");

        // Persisted exactly once.
        let entry = s.store.message(1).unwrap();
        assert_eq!(entry.sender, "alice");
        assert_eq!(entry.target, "#t");
        assert_eq!(entry.body, "hello");
        assert_eq!(entry.kind, "PRIVMSG");
        assert!(entry.is_channel);
        assert!(s.store.message(2).is_none());
    }

    #[test]
    fn test_broadcast_excludes_sender_only() {
        let mut s = simple_state();
        let (alice, _q_alice) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        let (carol, mut q_carol) = add_registered_client(&mut s, "carol");
        for id in [alice, bob, carol] {
            sequence(&mut s, id, &["JOIN #t"]);
        }
        flush(&mut q_bob);
        flush(&mut q_carol);

        sequence(&mut s, alice, &["PRIVMSG #t :hi"]);
        for queue in [&mut q_bob, &mut q_carol] {
            let mut seen = String::new();
            collect(&mut seen, queue);
            assert!(seen.contains("PRIVMSG #t :hi"), "{:?}", seen);
        }
    }

    #[test]
    fn test_nickname_conflict() {
        let mut s = simple_state();
        let (_alice, _q) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_client(&mut s);
        sequence(&mut s, bob, &["NICK alice"]);
        assert_eq!(numerics(&mut q_bob), vec!["433"]);

        // Case-insensitively taken too.
        sequence(&mut s, bob, &["NICK ALICE"]);
        assert_eq!(numerics(&mut q_bob), vec!["433"]);
        assert!(!s.clients[&bob].has_nick());
    }

    #[test]
    fn test_registration_gate() {
        let mut s = simple_state();
        let (id, mut queue) = add_client(&mut s);
        sequence(&mut s, id, &["JOIN #t", "PRIVMSG #t :hi", "LIST"]);
        assert!(s.channels.is_empty());
        let mut seen = String::new();
        collect(&mut seen, &mut queue);
        assert_eq!(seen, "");
    }

    #[test]
    fn test_membership_symmetry() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, _qb) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #a,#b"]);
        sequence(&mut s, bob, &["JOIN #a"]);

        assert!(s.channels["#a"].has_member(alice));
        assert!(s.channels["#a"].has_member(bob));
        assert!(s.channels["#b"].has_member(alice));
        assert!(!s.channels["#b"].has_member(bob));

        sequence(&mut s, alice, &["PART #a"]);
        assert!(!s.channels["#a"].has_member(alice));
        assert!(s.channels["#a"].has_member(bob));

        // Kick removes membership as well; bob operates his own channel.
        sequence(&mut s, bob, &["JOIN #x"]);
        sequence(&mut s, alice, &["JOIN #x"]);
        assert!(s.channels["#x"].has_member(alice));
        sequence(&mut s, bob, &["KICK #x alice :begone"]);
        assert!(!s.channels["#x"].has_member(alice));
        assert!(s.channels["#x"].has_member(bob));
    }

    #[test]
    fn test_channel_destroyed_when_empty() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        sequence(&mut s, alice, &["JOIN #t"]);
        assert!(s.channels.contains_key("#t"));
        sequence(&mut s, alice, &["PART #t"]);
        assert!(!s.channels.contains_key("#t"));

        flush(&mut q_alice);
        sequence(&mut s, alice, &["LIST"]);
        let mut seen = String::new();
        collect(&mut seen, &mut q_alice);
        assert!(!seen.contains("#t"));
        assert!(seen.contains(" 323 "));
    }

    // Scenario: key-protected channel.
    #[test]
    fn test_key_protected_channel() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #k", "MODE #k +k secret"]);

        sequence(&mut s, bob, &["JOIN #k wrong"]);
        assert_eq!(numerics(&mut q_bob), vec!["475"]);
        assert!(!s.channels["#k"].has_member(bob));

        sequence(&mut s, bob, &["JOIN #k secret"]);
        assert!(s.channels["#k"].has_member(bob));
        let mut seen = String::new();
        collect(&mut seen, &mut q_bob);
        assert!(seen.contains(":@alice bob"), "{:?}", seen);
    }

    // Scenario: moderated channel.
    #[test]
    fn test_moderated_channel() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #m", "MODE #m +m"]);
        sequence(&mut s, bob, &["JOIN #m"]);
        flush(&mut q_alice);
        flush(&mut q_bob);

        sequence(&mut s, bob, &["PRIVMSG #m :pst"]);
        assert_eq!(numerics(&mut q_bob), vec!["404"]);
        let mut alice_sees = String::new();
        collect(&mut alice_sees, &mut q_alice);
        assert_eq!(alice_sees, "");

        sequence(&mut s, alice, &["MODE #m +v bob"]);
        flush(&mut q_alice);
        flush(&mut q_bob);
        sequence(&mut s, bob, &["PRIVMSG #m :pst"]);
        collect(&mut alice_sees, &mut q_alice);
        assert!(alice_sees.contains("PRIVMSG #m :pst"));
    }

    // Scenario: invite-only channel.
    #[test]
    fn test_invite_only_channel() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #i", "MODE #i +i"]);
        flush(&mut q_alice);

        sequence(&mut s, bob, &["JOIN #i"]);
        assert_eq!(numerics(&mut q_bob), vec!["473"]);

        sequence(&mut s, alice, &["INVITE bob #i"]);
        let mut bob_sees = String::new();
        collect(&mut bob_sees, &mut q_bob);
        assert!(bob_sees.contains("INVITE bob #i"), "{:?}", bob_sees);
        let mut alice_sees = String::new();
        collect(&mut alice_sees, &mut q_alice);
        assert!(alice_sees.contains(" 341 "), "{:?}", alice_sees);

        sequence(&mut s, bob, &["JOIN #i"]);
        assert!(s.channels["#i"].has_member(bob));
        assert!(s.channels["#i"].invites.is_empty());
    }

    #[test]
    fn test_ban_prevents_join() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #b", "MODE #b +b *!*@127.0.0.1"]);

        sequence(&mut s, bob, &["JOIN #b"]);
        assert_eq!(numerics(&mut q_bob), vec!["474"]);
        assert!(!s.channels["#b"].has_member(bob));
    }

    #[test]
    fn test_user_limit() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #l", "MODE #l +l 1"]);

        sequence(&mut s, bob, &["JOIN #l"]);
        assert_eq!(numerics(&mut q_bob), vec!["471"]);
    }

    #[test]
    fn test_topic_lock() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #t", "MODE #t +t", "TOPIC #t :settled"]);
        sequence(&mut s, bob, &["JOIN #t"]);
        flush(&mut q_bob);

        sequence(&mut s, bob, &["TOPIC #t :vandalism"]);
        assert_eq!(numerics(&mut q_bob), vec!["482"]);
        assert_eq!(s.channels["#t"].topic.as_deref(), Some("settled"));

        sequence(&mut s, bob, &["TOPIC #t"]);
        let mut seen = String::new();
        collect(&mut seen, &mut q_bob);
        assert!(seen.contains(" 332 bob #t :settled"), "{:?}", seen);
    }

    #[test]
    fn test_mention_notice() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        let (_carol, mut q_carol) = add_registered_client(&mut s, "carol");
        sequence(&mut s, alice, &["JOIN #t"]);
        sequence(&mut s, bob, &["JOIN #t"]);
        flush(&mut q_bob);

        sequence(&mut s, alice, &["PRIVMSG #t :hi @bob and @carol"]);

        let mut bob_sees = String::new();
        collect(&mut bob_sees, &mut q_bob);
        assert!(bob_sees.contains("PRIVMSG #t :hi @bob and @carol"));
        let expected = format!(
            ":{} NOTICE bob :alice mentioned you in #t: hi @bob and @carol\r\n",
            SERVER_NAME,
        );
        assert_eq!(bob_sees.matches("NOTICE bob").count(), 1);
        assert!(bob_sees.contains(&expected), "{:?}", bob_sees);

        // carol is not a member, no notice for her.
        let mut carol_sees = String::new();
        collect(&mut carol_sees, &mut q_carol);
        assert_eq!(carol_sees, "");
    }

    #[test]
    fn test_notice_sends_no_mention_notice() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #t"]);
        sequence(&mut s, bob, &["JOIN #t"]);
        flush(&mut q_bob);

        sequence(&mut s, alice, &["NOTICE #t :hi @bob"]);
        let mut bob_sees = String::new();
        collect(&mut bob_sees, &mut q_bob);
        assert!(bob_sees.contains("NOTICE #t :hi @bob"));
        assert!(!bob_sees.contains("mentioned you"), "{:?}", bob_sees);
    }

    // Scenario: reply threading with message tags.
    #[test]
    fn test_reply_thread() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        let (bob, _qb) = add_registered_client(&mut s, "bob");
        let (carol, mut q_carol) = add_registered_client(&mut s, "carol");
        sequence(&mut s, alice, &["CAP REQ :message-tags"]);
        for id in [alice, bob, carol] {
            sequence(&mut s, id, &["JOIN #t"]);
        }
        flush(&mut q_alice);
        flush(&mut q_carol);

        sequence(&mut s, alice, &["PRIVMSG #t :hi"]);
        assert_eq!(s.store.message(1).unwrap().body, "hi");

        sequence(&mut s, bob, &["@+reply=1 PRIVMSG #t :yo"]);
        let entry = s.store.message(2).unwrap();
        assert_eq!(entry.reply_to, Some(1));

        // Tag-capable members see both tags, others see none.
        let mut alice_sees = String::new();
        collect(&mut alice_sees, &mut q_alice);
        assert!(
            alice_sees.contains("@+reply=1;msgid=2 :bob!X@127.0.0.1 PRIVMSG #t :yo"),
            "{:?}",
            alice_sees,
        );
        let mut carol_sees = String::new();
        collect(&mut carol_sees, &mut q_carol);
        assert!(carol_sees.contains(":bob!X@127.0.0.1 PRIVMSG #t :yo"));
        assert!(!carol_sees.contains("msgid"), "{:?}", carol_sees);
    }

    #[test]
    fn test_private_message_routing() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        let (_bob, mut q_bob) = add_registered_client(&mut s, "bob");

        sequence(&mut s, alice, &["PRIVMSG bob :psst"]);
        let mut bob_sees = String::new();
        collect(&mut bob_sees, &mut q_bob);
        assert_eq!(bob_sees, ":alice!X@127.0.0.1 PRIVMSG bob :psst\r\n");

        let entry = s.store.message(1).unwrap();
        assert!(!entry.is_channel);
        assert_eq!(entry.target, "bob");

        sequence(&mut s, alice, &["PRIVMSG nosuch :psst"]);
        assert_eq!(numerics(&mut q_alice), vec!["401"]);
    }

    #[test]
    fn test_privacy_logging_optout() {
        let store = MemoryStore::new();
        store.add_account("alice", "pass");
        store.set_privacy("alice", Privacy { allow_logging: false, allow_history: true });
        let mut s = state_with_store(store);

        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #t"]);
        sequence(&mut s, bob, &["JOIN #t"]);
        flush(&mut q_bob);

        sequence(&mut s, alice, &["PRIVMSG #t :off the record"]);
        // Delivered but not persisted, so no msgid was assigned.
        let mut bob_sees = String::new();
        collect(&mut bob_sees, &mut q_bob);
        assert!(bob_sees.contains("PRIVMSG #t :off the record"));
        assert!(s.store.message(1).is_none());
        assert!(s.store.channel_history("#t", 10, None).is_empty());
    }

    // Scenario: quit cascade.
    #[test]
    fn test_quit_cascade() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        let (carol, mut q_carol) = add_registered_client(&mut s, "carol");
        sequence(&mut s, alice, &["JOIN #a,#b,#c"]);
        sequence(&mut s, bob, &["JOIN #a"]);
        sequence(&mut s, carol, &["JOIN #b"]);
        flush(&mut q_bob);
        flush(&mut q_carol);

        s.peer_quit(alice);

        for queue in [&mut q_bob, &mut q_carol] {
            let mut seen = String::new();
            collect(&mut seen, queue);
            assert_eq!(seen, ":alice!X@127.0.0.1 QUIT :Connection closed\r\n");
        }

        // alice was alone on #c, it is gone; the others remain.
        assert!(!s.channels.contains_key("#c"));
        assert!(s.channels.contains_key("#a"));
        assert!(s.channels.contains_key("#b"));
        assert!(!s.nicks.contains_key("alice"));
    }

    #[test]
    fn test_quit_reason() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #t"]);
        sequence(&mut s, bob, &["JOIN #t"]);
        flush(&mut q_bob);

        sequence(&mut s, alice, &["QUIT :gone fishing"]);
        let mut bob_sees = String::new();
        collect(&mut bob_sees, &mut q_bob);
        assert!(bob_sees.contains("QUIT :gone fishing"), "{:?}", bob_sees);
        assert!(!s.clients.contains_key(&alice));
        assert!(!s.nicks.contains_key("alice"));
    }

    #[test]
    fn test_oper_and_kill() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");

        sequence(&mut s, alice, &["KILL bob :spam"]);
        assert_eq!(numerics(&mut q_alice), vec!["481"]);

        sequence(&mut s, alice, &["OPER admin wrongpass"]);
        assert_eq!(numerics(&mut q_alice), vec!["464"]);

        sequence(&mut s, alice, &["OPER admin adminpass"]);
        let mut seen = String::new();
        collect(&mut seen, &mut q_alice);
        assert!(seen.contains(" 381 "), "{:?}", seen);
        assert!(s.clients[&alice].operator);

        sequence(&mut s, bob, &["JOIN #t"]);
        flush(&mut q_bob);
        sequence(&mut s, alice, &["KILL bob :spam"]);
        let mut bob_sees = String::new();
        collect(&mut bob_sees, &mut q_bob);
        assert!(bob_sees.contains("KILL bob :spam"), "{:?}", bob_sees);
        assert!(!s.clients.contains_key(&bob));
        assert!(!s.channels.contains_key("#t"));
    }

    #[test]
    fn test_away_and_who() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #t"]);
        sequence(&mut s, bob, &["JOIN #t"]);
        flush(&mut q_alice);
        flush(&mut q_bob);

        sequence(&mut s, alice, &["AWAY :afk"]);
        let mut seen = String::new();
        collect(&mut seen, &mut q_alice);
        assert!(seen.contains(" 306 "), "{:?}", seen);

        sequence(&mut s, bob, &["WHO #t"]);
        collect(&mut seen, &mut q_bob);
        assert!(seen.contains(" 352 bob #t X 127.0.0.1"), "{:?}", seen);
        assert!(seen.contains(" G@ "), "{:?}", seen);
        assert!(seen.contains(" 315 "), "{:?}", seen);

        sequence(&mut s, alice, &["AWAY"]);
        seen.clear();
        collect(&mut seen, &mut q_alice);
        assert!(seen.contains(" 305 "), "{:?}", seen);
    }

    #[test]
    fn test_whois() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        let (_bob, _qb) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #t"]);
        flush(&mut q_alice);

        sequence(&mut s, alice, &["WHOIS nosuch"]);
        assert_eq!(numerics(&mut q_alice), vec!["401"]);

        sequence(&mut s, alice, &["WHOIS alice"]);
        let mut seen = String::new();
        collect(&mut seen, &mut q_alice);
        assert!(seen.contains(" 311 alice alice X 127.0.0.1 *"), "{:?}", seen);
        assert!(seen.contains(" 319 alice alice :@#t"), "{:?}", seen);
        assert!(seen.contains(" 318 alice alice :"), "{:?}", seen);
    }

    #[test]
    fn test_list_skips_secret_channels() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #s", "MODE #s +s", "JOIN #open", "TOPIC #open :hi"]);

        sequence(&mut s, bob, &["LIST"]);
        let mut seen = String::new();
        collect(&mut seen, &mut q_bob);
        assert!(!seen.contains("#s"), "{:?}", seen);
        assert!(seen.contains(" 322 bob #open 1 :hi"), "{:?}", seen);

        // Channels with no topic have no trailing at all.
        sequence(&mut s, alice, &["TOPIC #open :"]);
        seen.clear();
        sequence(&mut s, bob, &["LIST"]);
        collect(&mut seen, &mut q_bob);
        assert!(seen.contains(" 322 bob #open 1\r\n"), "{:?}", seen);
    }

    #[test]
    fn test_user_mode() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        let (_bob, _q_bob) = add_registered_client(&mut s, "bob");

        sequence(&mut s, alice, &["MODE alice +i"]);
        assert!(s.clients[&alice].invisible);
        let mut seen = String::new();
        collect(&mut seen, &mut q_alice);
        assert!(seen.contains("MODE alice +i"), "{:?}", seen);

        sequence(&mut s, alice, &["MODE alice"]);
        seen.clear();
        collect(&mut seen, &mut q_alice);
        assert!(seen.contains(" 221 alice +i"), "{:?}", seen);

        // Unknown flag.
        sequence(&mut s, alice, &["MODE alice +x"]);
        assert_eq!(numerics(&mut q_alice), vec!["501"]);

        // Others' modes are off limits.
        sequence(&mut s, alice, &["MODE bob +i"]);
        assert_eq!(numerics(&mut q_alice), vec!["502"]);

        // +o is not self-grantable.
        sequence(&mut s, alice, &["MODE alice +o"]);
        assert!(!s.clients[&alice].operator);
        seen.clear();
        collect(&mut seen, &mut q_alice);
        assert!(!seen.contains("MODE alice +o"), "{:?}", seen);
    }

    #[test]
    fn test_channel_mode_query_and_bans() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        sequence(&mut s, alice, &["JOIN #t", "MODE #t +kl hunter2 5"]);
        flush(&mut q_alice);

        sequence(&mut s, alice, &["MODE #t"]);
        let mut seen = String::new();
        collect(&mut seen, &mut q_alice);
        assert!(seen.contains(" 324 alice #t +kl hunter2 5"), "{:?}", seen);

        sequence(&mut s, alice, &["MODE #t +b *!*@spam.example", "MODE #t +b"]);
        seen.clear();
        collect(&mut seen, &mut q_alice);
        assert!(seen.contains(" 367 alice #t *!*@spam.example"), "{:?}", seen);
        assert!(seen.contains(" 368 alice #t :"), "{:?}", seen);
    }

    #[test]
    fn test_mode_requires_chanop() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #t"]);
        sequence(&mut s, bob, &["JOIN #t"]);
        flush(&mut q_bob);

        sequence(&mut s, bob, &["MODE #t +m"]);
        assert_eq!(numerics(&mut q_bob), vec!["482"]);
        assert!(!s.channels["#t"].moderated);
    }

    #[test]
    fn test_no_external_messages() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #t", "MODE #t +n"]);

        sequence(&mut s, bob, &["PRIVMSG #t :outside"]);
        assert_eq!(numerics(&mut q_bob), vec!["404"]);
    }

    #[test]
    fn test_pass_authentication_at_registration() {
        let mut s = state_with_accounts(&[("alice", "sesame")]);
        let (id, mut queue) = add_client(&mut s);
        sequence(&mut s, id, &["PASS sesame", "NICK alice", "USER alice 0 * :Alice"]);
        let mut seen = String::new();
        collect(&mut seen, &mut queue);
        assert!(seen.contains(" 900 alice "), "{:?}", seen);
        assert_eq!(s.clients[&id].account(), Some("alice"));

        // A wrong password is silent, the session just stays logged out.
        let (id, mut queue) = add_client(&mut s);
        sequence(&mut s, id, &["PASS wrong", "NICK alice2", "USER alice 0 * :Alice"]);
        seen.clear();
        collect(&mut seen, &mut queue);
        assert!(seen.contains(" 001 alice2 "), "{:?}", seen);
        assert!(!seen.contains(" 900 "), "{:?}", seen);
        assert_eq!(s.clients[&id].account(), None);
    }

    #[test]
    fn test_userhost_and_ison() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        let (_bob, _qb) = add_registered_client(&mut s, "bob");

        sequence(&mut s, alice, &["USERHOST bob nosuch", "ISON alice bob nosuch"]);
        let mut seen = String::new();
        collect(&mut seen, &mut q_alice);
        assert!(seen.contains(" 302 alice :bob=+X@127.0.0.1"), "{:?}", seen);
        assert!(seen.contains(" 303 alice :alice bob"), "{:?}", seen);
    }

    #[test]
    fn test_unknown_command() {
        let mut s = simple_state();
        let (alice, mut q_alice) = add_registered_client(&mut s, "alice");
        sequence(&mut s, alice, &["FROBNICATE x"]);
        assert_eq!(numerics(&mut q_alice), vec!["421"]);
    }

    #[test]
    fn test_nick_change_is_broadcast() {
        let mut s = simple_state();
        let (alice, _qa) = add_registered_client(&mut s, "alice");
        let (bob, mut q_bob) = add_registered_client(&mut s, "bob");
        sequence(&mut s, alice, &["JOIN #t"]);
        sequence(&mut s, bob, &["JOIN #t"]);
        flush(&mut q_bob);

        sequence(&mut s, alice, &["NICK alicia"]);
        let mut seen = String::new();
        collect(&mut seen, &mut q_bob);
        assert_eq!(seen, ":alice!X@127.0.0.1 NICK alicia\r\n");
        assert!(s.nicks.contains_key("alicia"));
        assert!(!s.nicks.contains_key("alice"));

        // The old name is free again.
        let (carol, mut q_carol) = add_client(&mut s);
        sequence(&mut s, carol, &["NICK alice"]);
        assert_eq!(numerics(&mut q_carol), Vec::<String>::new());
    }
} // mod tests
