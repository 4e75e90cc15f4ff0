//! Text of the server's replies.

use malefirc_tokens::MessageBuffer;

pub const ADMIN_ME: &str = "Administrative info";
pub const ADMIN_LOC_1: &str = "This server is run by its local administrators";
pub const ADMIN_LOC_2: &str = "Somewhere on the internet";
pub const ADMIN_MAIL: &str = "admin@localhost";
pub const BAD_CHAN_KEY: &str = "Cannot join channel (+k)";
pub const BANNED_FROM_CHAN: &str = "Cannot join channel (+b)";
pub const CANNOT_SEND_TO_CHAN: &str = "Cannot send to channel";
pub const CHAN_O_PRIVS_NEEDED: &str = "You're not channel operator";
pub const CHANNEL_IS_FULL: &str = "Cannot join channel (+l)";
pub const CLOSING_LINK: &str = "Closing link";
pub const CONNECTION_CLOSED: &str = "Connection closed";
pub const DEFAULT_QUIT: &str = "Client quit";
pub const END_OF_BAN_LIST: &str = "End of channel ban list";
pub const END_OF_INFO: &str = "End of INFO list";
pub const END_OF_LIST: &str = "End of LIST";
pub const END_OF_NAMES: &str = "End of NAMES list";
pub const END_OF_WHO: &str = "End of WHO list";
pub const END_OF_WHOIS: &str = "End of WHOIS list";
pub const END_OF_WHOWAS: &str = "End of WHOWAS";
pub const ERRONEOUS_NICKNAME: &str = "Erroneous nickname";
pub const INVITE_ONLY_CHAN: &str = "Cannot join channel (+i)";
pub const NEED_MORE_PARAMS: &str = "Not enough parameters";
pub const NICKNAME_IN_USE: &str = "Nickname is already in use";
pub const NO_MOTD: &str = "MOTD File is missing";
pub const NO_NICKNAME_GIVEN: &str = "No nickname given";
pub const NO_PRIVILEGES: &str = "Permission Denied- You're not an IRC operator";
pub const NO_RECIPIENT: &str = "No recipient given";
pub const NO_SUCH_CHANNEL: &str = "No such channel";
pub const NO_SUCH_NICK: &str = "No such nick/channel";
pub const NO_TEXT_TO_SEND: &str = "No text to send";
pub const NO_TOPIC: &str = "No topic is set";
pub const NOT_ON_CHANNEL: &str = "You're not on that channel";
pub const NOW_AWAY: &str = "You have been marked as being away";
pub const PASSWORD_MISMATCH: &str = "Password incorrect";
pub const SASL_ABORTED: &str = "SASL authentication aborted";
pub const SASL_FAILED: &str = "SASL authentication failed";
pub const SASL_SUCCESSFUL: &str = "SASL authentication successful";
pub const SASL_TOO_LONG: &str = "SASL message too long";
pub const SASL_ALREADY: &str = "You have already authenticated using SASL";
pub const SASL_MECHS: &str = "are available SASL mechanisms";
pub const UN_AWAY: &str = "You are no longer marked as being away";
pub const UNKNOWN_COMMAND: &str = "Unknown command";
pub const UNKNOWN_MODE: &str = "is unknown mode char to me";
pub const UNKNOWN_MODE_FLAG: &str = "Unknown MODE flag";
pub const USER_NOT_IN_CHANNEL: &str = "They aren't on that channel";
pub const USER_ON_CHANNEL: &str = "is already on channel";
pub const USERS_DONT_MATCH: &str = "Cannot change mode for other users";
pub const WAS_NO_SUCH_NICK: &str = "There was no such nickname";
pub const WHOIS_ACCOUNT: &str = "is logged in as";
pub const WHOIS_OPERATOR: &str = "is an IRC operator";
pub const YOURE_OPER: &str = "You are now an IRC operator";
pub const ALREADY_REGISTERED: &str = "You may not reregister";

// Welcome burst

pub fn welcome(r: MessageBuffer<'_>, name: &str) {
    let mut r = r;
    let trailing = r.raw_trailing_param();
    trailing.push_str("Welcome to the Internet Relay Network ");
    trailing.push_str(name);
}

pub fn your_host(r: MessageBuffer<'_>, domain: &str, version: &str) {
    let mut r = r;
    let trailing = r.raw_trailing_param();
    trailing.push_str("Your host is ");
    trailing.push_str(domain);
    trailing.push_str(", running version ");
    trailing.push_str(version);
}

pub fn created(r: MessageBuffer<'_>, since: &str) {
    let mut r = r;
    let trailing = r.raw_trailing_param();
    trailing.push_str("This server was created ");
    trailing.push_str(since);
}

pub fn logged_in(r: MessageBuffer<'_>, account: &str) {
    let mut r = r;
    let trailing = r.raw_trailing_param();
    trailing.push_str("You are now logged in as ");
    trailing.push_str(account);
}

pub fn mentioned(r: MessageBuffer<'_>, sender: &str, channel: &str, body: &str) {
    let mut r = r;
    let trailing = r.raw_trailing_param();
    trailing.push_str(sender);
    trailing.push_str(" mentioned you in ");
    trailing.push_str(channel);
    trailing.push_str(": ");
    trailing.push_str(body);
}
