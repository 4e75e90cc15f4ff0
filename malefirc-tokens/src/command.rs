use std::fmt;

macro_rules! commands {
    ( $( $cmd:ident $cmd_str:literal $n:literal )* ) => {
        /// The list of known commands.
        ///
        /// Numeric replies and unknown commands are carried by `Message`
        /// directly; this enum only lists the commands the server accepts.
        #[derive(Clone, Copy, Debug, PartialEq)]
        pub enum Command {
            $( $cmd, )*
            Reply(&'static str),
        }

        impl Command {
            /// Returns the command named `s`, ignoring case.
            ///
            /// # Example
            ///
            /// ```rust
            /// # use malefirc_tokens::Command;
            /// assert_eq!(Command::parse("join"), Some(Command::Join));
            /// assert_eq!(Command::parse("JOIN"), Some(Command::Join));
            /// assert_eq!(Command::parse("jojoin"), None);
            /// ```
            pub fn parse(s: &str) -> Option<Self> {
                $( if s.eq_ignore_ascii_case($cmd_str) {
                    Some(Command::$cmd)
                } else )* {
                    None
                }
            }

            /// The number of required parameters for the command.  The
            /// command may accept more.
            pub fn required_params(&self) -> usize {
                match self {
                $(
                    Command::$cmd => $n,
                )*
                    Command::Reply(_) => 0,
                }
            }

            /// The canonical (uppercase) command string.
            pub fn as_str(&self) -> &'static str {
                match self {
                $(
                    Command::$cmd => $cmd_str,
                )*
                    Command::Reply(s) => s,
                }
            }
        }

        impl From<&'static str> for Command {
            /// `&'static str`s convert to the `Command::Reply` variant, so
            /// that `Buffer` accepts both commands and numeric replies.
            fn from(reply: &'static str) -> Self {
                Command::Reply(reply)
            }
        }

        impl fmt::Display for Command {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.as_str().fmt(f)
            }
        }
    }
}

commands! {
//  Ident.       String         Minimum # of params
    Admin        "ADMIN"        0
    Authenticate "AUTHENTICATE" 1
    Away         "AWAY"         0
    Cap          "CAP"          1
    Error        "ERROR"        0
    Info         "INFO"         0
    Invite       "INVITE"       2
    Ison         "ISON"         1
    Join         "JOIN"         1
    Kick         "KICK"         2
    Kill         "KILL"         1
    List         "LIST"         0
    Mode         "MODE"         1
    Motd         "MOTD"         0
    Names        "NAMES"        0
    Nick         "NICK"         1
    Notice       "NOTICE"       2
    Oper         "OPER"         2
    Part         "PART"         1
    Pass         "PASS"         1
    Ping         "PING"         1
    Pong         "PONG"         1
    PrivMsg      "PRIVMSG"      2
    Quit         "QUIT"         0
    Time         "TIME"         0
    Topic        "TOPIC"        1
    User         "USER"         4
    Userhost     "USERHOST"     1
    Version      "VERSION"      0
    Who          "WHO"          1
    Whois        "WHOIS"        1
    Whowas       "WHOWAS"       1
}
