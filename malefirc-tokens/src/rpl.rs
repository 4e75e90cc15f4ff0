//! The list of IRC replies.
//!
//! Each reply takes the client's nick as its first parameter.
//!
//! Sources:
//!
//! - <https://tools.ietf.org/html/rfc2812.html#section-5>
//! - <https://modern.ircdocs.horse/#numerics>

pub const WELCOME: &str  = "001";  // :Welcome message
pub const YOURHOST: &str = "002";  // :Your host is...
pub const CREATED: &str  = "003";  // :This server was created...
pub const MYINFO: &str   = "004";  // <servername> <version> <umodes> <chan modes>
pub const ISUPPORT: &str = "005";  // 1*13<TOKEN[=value]> :are supported by this server

pub const UMODEIS: &str   = "221";  // <modes>
pub const ADMINME: &str   = "256";  // <server> :Admin info
pub const ADMINLOC1: &str = "257";  // :<info>
pub const ADMINLOC2: &str = "258";  // :<info>
pub const ADMINMAIL: &str = "259";  // :<info>

pub const AWAY: &str          = "301";  // <nick> :<away message>
pub const USERHOST: &str      = "302";  // :*( nick ["*"] "=" ("+"/"-") user@host " " )
pub const ISON: &str          = "303";  // :*( nick " " )
pub const UNAWAY: &str        = "305";  // :You are no longer marked as being away
pub const NOWAWAY: &str       = "306";  // :You have been marked as being away
pub const WHOISUSER: &str     = "311";  // <nick> <user> <host> * :<realname>
pub const WHOISSERVER: &str   = "312";  // <nick> <server> :<server info>
pub const WHOISOPERATOR: &str = "313";  // <nick> :is an IRC operator
pub const ENDOFWHO: &str      = "315";  // <name> :End of WHO list
pub const ENDOFWHOIS: &str    = "318";  // <nick> :End of WHOIS list
pub const WHOISCHANNELS: &str = "319";  // <nick> :*( (@/+) <channel> " " )
pub const LISTSTART: &str     = "321";  // Channel :Users Name
pub const LIST: &str          = "322";  // <channel> <# of visible members> <topic>
pub const LISTEND: &str       = "323";  // :End of list
pub const CHANNELMODEIS: &str = "324";  // <channel> <modes> <mode params>
pub const WHOISACCOUNT: &str  = "330";  // <nick> <account> :is logged in as
pub const NOTOPIC: &str       = "331";  // <channel> :No topic set
pub const TOPIC: &str         = "332";  // <channel> <topic>
pub const INVITING: &str      = "341";  // <nick> <channel>
pub const VERSION: &str       = "351";  // <version> <servername> :<comments>
pub const WHOREPLY: &str      = "352";  // <channel> <user> <host> <server> <nick> "H"/"G" ["*"] [("@"/"+")] :<hop count> <realname>
pub const NAMREPLY: &str      = "353";  // <=/*/@> <channel> :1*(@/ /+nick)
pub const ENDOFNAMES: &str    = "366";  // <channel> :End of names list
pub const BANLIST: &str       = "367";  // <channel> <ban mask>
pub const ENDOFBANLIST: &str  = "368";  // <channel> :End of ban list
pub const ENDOFWHOWAS: &str   = "369";  // <nick> :End of WHOWAS
pub const INFO: &str          = "371";  // :<info>
pub const ENDOFINFO: &str     = "374";  // :End of INFO
pub const YOUREOPER: &str     = "381";  // :You are now an operator
pub const TIME: &str          = "391";  // <servername> :<time in whatever format>

pub const ERR_NOSUCHNICK: &str       = "401";  // <nick> :No such nick/channel
pub const ERR_NOSUCHCHANNEL: &str    = "403";  // <channel> :No such channel
pub const ERR_CANNOTSENDTOCHAN: &str = "404";  // <channel> :Cannot send to channel
pub const ERR_WASNOSUCHNICK: &str    = "406";  // <nick> :There was no such nickname
pub const ERR_INVALIDCAPCMD: &str    = "410";  // <command> :Unknown cap command
pub const ERR_NORECIPIENT: &str      = "411";  // :No recipient given
pub const ERR_NOTEXTTOSEND: &str     = "412";  // :No text to send
pub const ERR_UNKNOWNCOMMAND: &str   = "421";  // <command> :Unknown command
pub const ERR_NOMOTD: &str           = "422";  // :MOTD file missing
pub const ERR_NONICKNAMEGIVEN: &str  = "431";  // :No nickname given
pub const ERR_ERRONEUSNICKNAME: &str = "432";  // <nick> :Erroneous nickname
pub const ERR_NICKNAMEINUSE: &str    = "433";  // <nick> :Nickname in use
pub const ERR_USERNOTINCHANNEL: &str = "441";  // <nick> <channel> :User not in channel
pub const ERR_NOTONCHANNEL: &str     = "442";  // <channel> :You're not on that channel
pub const ERR_USERONCHANNEL: &str    = "443";  // <user> <channel> :is already on channel
pub const ERR_NEEDMOREPARAMS: &str   = "461";  // <command> :Not enough parameters
pub const ERR_ALREADYREGISTRED: &str = "462";  // :Already registered
pub const ERR_PASSWDMISMATCH: &str   = "464";  // :Password incorrect
pub const ERR_CHANNELISFULL: &str    = "471";  // <channel> :Cannot join channel (+l)
pub const ERR_UNKNOWNMODE: &str      = "472";  // <char> :Don't know this mode for <channel>
pub const ERR_INVITEONLYCHAN: &str   = "473";  // <channel> :Cannot join channel (+i)
pub const ERR_BANNEDFROMCHAN: &str   = "474";  // <channel> :Cannot join channel (+b)
pub const ERR_BADCHANKEY: &str       = "475";  // <channel> :Cannot join channel (+k)
pub const ERR_NOPRIVILEGES: &str     = "481";  // :Permission Denied
pub const ERR_CHANOPRIVSNEEDED: &str = "482";  // <channel> :You're not an operator

pub const ERR_UMODEUNKNOWNFLAG: &str = "501";  // :Unknown mode flag
pub const ERR_USERSDONTMATCH: &str   = "502";  // :Can't change mode for other users

pub const LOGGEDIN: &str        = "900";  // <nick>!<user>@<host> <account> :You are now logged in as <account>
pub const SASLSUCCESS: &str     = "903";  // :SASL authentication successful
pub const ERR_SASLFAIL: &str    = "904";  // :SASL authentication failed
pub const ERR_SASLTOOLONG: &str = "905";  // :SASL message too long
pub const ERR_SASLABORTED: &str = "906";  // :SASL authentication aborted
pub const ERR_SASLALREADY: &str = "907";  // :You have already authenticated using SASL
pub const SASLMECHS: &str       = "908";  // <mechanisms> :are available SASL mechanisms
