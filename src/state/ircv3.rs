//! Handlers for messages defined in IRCv3 extensions.
//!
//! - capability negotiation: <https://ircv3.net/specs/core/capability-negotiation>
//! - SASL: <https://ircv3.net/specs/extensions/sasl-3.1>

use super::{CommandContext, HandlerResult as Result};
use crate::client::cap;
use crate::lines;
use malefirc_tokens::{rpl, Command};
use std::str;

/// Handler for the CAP command.
impl super::StateInner {
    fn cmd_cap_ls(&self, ctx: CommandContext<'_>) -> Result {
        let client = &self.clients[&ctx.id];
        ctx.rb
            .message(&self.server_name, Command::Cap)
            .param(client.nick())
            .param("LS")
            .trailing_param(cap::LS);
        Ok(())
    }

    fn cmd_cap_list(&self, ctx: CommandContext<'_>) -> Result {
        let client = &self.clients[&ctx.id];
        let mut enabled = String::new();
        client.capabilities.write(&mut enabled);
        ctx.rb
            .message(&self.server_name, Command::Cap)
            .param(client.nick())
            .param("LIST")
            .trailing_param(&enabled);
        Ok(())
    }

    fn cmd_cap_req(&mut self, ctx: CommandContext<'_>, capabilities: &str) -> Result {
        let client = self.clients.get_mut(&ctx.id).unwrap();
        let nick = client.nick().to_owned();
        if !cap::are_supported(capabilities) {
            ctx.rb
                .message(&self.server_name, Command::Cap)
                .param(&nick)
                .param("NAK")
                .trailing_param(capabilities);
            return Err(());
        }
        client.capabilities.update(capabilities);
        ctx.rb
            .message(&self.server_name, Command::Cap)
            .param(&nick)
            .param("ACK")
            .trailing_param(capabilities);
        Ok(())
    }

    pub fn cmd_cap(&mut self, ctx: CommandContext<'_>, params: &[&str]) -> Result {
        match params[0] {
            "END" => Ok(()),
            "LIST" => self.cmd_cap_list(ctx),
            "LS" => self.cmd_cap_ls(ctx),
            "REQ" => self.cmd_cap_req(ctx, params.get(1).unwrap_or(&"")),
            _ => {
                log::debug!("{}:     bad CAP command", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_INVALIDCAPCMD)
                    .param(params[0])
                    .trailing_param(lines::UNKNOWN_COMMAND);
                Err(())
            }
        }
    }
}

/// Handlers for SASL PLAIN.
impl super::StateInner {
    pub fn cmd_authenticate(&mut self, ctx: CommandContext<'_>, payload: &str) -> Result {
        let client = self.clients.get_mut(&ctx.id).unwrap();

        if client.account().is_some() {
            log::debug!("{}:     is already logged in", ctx.id);
            ctx.rb
                .reply(rpl::ERR_SASLALREADY)
                .trailing_param(lines::SASL_ALREADY);
            client.auth_reset();
            return Err(());
        }
        if payload == "*" && client.auth_in_progress() {
            ctx.rb
                .reply(rpl::ERR_SASLABORTED)
                .trailing_param(lines::SASL_ABORTED);
            client.auth_reset();
            return Ok(());
        }

        if client.auth_in_progress() {
            match client.auth_push(payload) {
                Ok(true) => {
                    let data = client.auth_take();
                    self.continue_auth(ctx, &data)
                }
                Ok(false) => Ok(()),
                Err(()) => {
                    log::debug!("{}:     sasl too long", ctx.id);
                    ctx.rb
                        .reply(rpl::ERR_SASLTOOLONG)
                        .trailing_param(lines::SASL_TOO_LONG);
                    client.auth_reset();
                    Err(())
                }
            }
        } else if payload.eq_ignore_ascii_case("PLAIN") {
            client.auth_begin();
            ctx.rb.message("", Command::Authenticate).param("+");
            Ok(())
        } else {
            log::debug!("{}:     unknown mechanism {:?}", ctx.id, payload);
            ctx.rb
                .reply(rpl::SASLMECHS)
                .param("PLAIN")
                .trailing_param(lines::SASL_MECHS);
            ctx.rb
                .reply(rpl::ERR_SASLFAIL)
                .trailing_param(lines::SASL_FAILED);
            Err(())
        }
    }

    /// Decodes and verifies a complete AUTHENTICATE PLAIN payload: base64
    /// over `authzid NUL authcid NUL password`.
    fn continue_auth(&mut self, ctx: CommandContext<'_>, data: &str) -> Result {
        let credentials = match decode_plain(data) {
            Some(credentials) => credentials,
            None => {
                log::debug!("{}:     bad payload format", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_SASLFAIL)
                    .trailing_param(lines::SASL_FAILED);
                return Err(());
            }
        };
        let (authcid, password) = credentials;

        if !self.store.authenticate(&authcid, &password) {
            log::debug!("{}:     invalid credentials", ctx.id);
            ctx.rb
                .reply(rpl::ERR_SASLFAIL)
                .trailing_param(lines::SASL_FAILED);
            return Err(());
        }

        log::debug!("{}:     now authenticated as {}", ctx.id, authcid);
        let client = self.clients.get_mut(&ctx.id).unwrap();
        client.log_in(authcid.clone());
        ctx.rb
            .reply(rpl::SASLSUCCESS)
            .trailing_param(lines::SASL_SUCCESSFUL);
        let full_name = self.clients[&ctx.id].full_name().to_owned();
        self.write_logged_in(ctx.rb, &full_name, &authcid);
        Ok(())
    }
}

/// Splits a decoded PLAIN payload into `(authcid, password)`.
///
/// The authorization identity is accepted and ignored.
fn decode_plain(data: &str) -> Option<(String, String)> {
    let decoded = base64::decode(data).ok()?;
    let mut fields = decoded.split(|b| *b == 0);
    let _authzid = fields.next()?;
    let authcid = str::from_utf8(fields.next()?).ok()?;
    let password = str::from_utf8(fields.next()?).ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((authcid.to_owned(), password.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::super::test::{
        add_client, collect, numerics, sequence, simple_state, state_with_accounts,
        state_with_store, SERVER_NAME,
    };
    use crate::client::AUTHENTICATE_CHUNK_LEN;
    use crate::store::MemoryStore;

    #[test]
    fn test_cap_ls_advertises_capabilities() {
        let mut s = simple_state();
        let (id, mut queue) = add_client(&mut s);
        sequence(&mut s, id, &["CAP LS 302"]);
        let mut seen = String::new();
        collect(&mut seen, &mut queue);
        assert_eq!(
            seen,
            format!(":{} CAP * LS :message-tags msgid sasl\r\n", SERVER_NAME),
        );
    }

    #[test]
    fn test_cap_req_ack_and_nak() {
        let mut s = simple_state();
        let (id, mut queue) = add_client(&mut s);

        sequence(&mut s, id, &["CAP REQ :message-tags sasl"]);
        let mut seen = String::new();
        collect(&mut seen, &mut queue);
        assert!(seen.contains("CAP * ACK :message-tags sasl"), "{:?}", seen);
        assert!(s.clients[&id].capabilities.message_tags);
        assert!(s.clients[&id].capabilities.sasl);
        assert!(!s.clients[&id].capabilities.msgid);

        sequence(&mut s, id, &["CAP REQ :msgid dragons"]);
        seen.clear();
        collect(&mut seen, &mut queue);
        assert!(seen.contains("CAP * NAK :msgid dragons"), "{:?}", seen);
        assert!(!s.clients[&id].capabilities.msgid);

        sequence(&mut s, id, &["CAP REQ :-sasl", "CAP LIST"]);
        seen.clear();
        collect(&mut seen, &mut queue);
        assert!(seen.contains("CAP * LIST :message-tags"), "{:?}", seen);
        assert!(!s.clients[&id].capabilities.sasl);
    }

    #[test]
    fn test_cap_unknown_subcommand() {
        let mut s = simple_state();
        let (id, mut queue) = add_client(&mut s);
        sequence(&mut s, id, &["CAP FROB"]);
        assert_eq!(numerics(&mut queue), vec!["410"]);
    }

    #[test]
    fn test_sasl_plain_success() {
        let mut s = state_with_accounts(&[("alice", "password")]);
        let (id, mut queue) = add_client(&mut s);

        sequence(&mut s, id, &["AUTHENTICATE PLAIN"]);
        let mut seen = String::new();
        collect(&mut seen, &mut queue);
        assert_eq!(seen, "AUTHENTICATE +\r\n");

        let payload = base64::encode(b"\0alice\0password");
        sequence(&mut s, id, &[&format!("AUTHENTICATE {}", payload)]);
        seen.clear();
        collect(&mut seen, &mut queue);
        let success = seen.find(" 903 ").expect("no 903");
        let logged_in = seen.find(" 900 ").expect("no 900");
        assert!(success < logged_in, "{:?}", seen);
        assert_eq!(s.clients[&id].account(), Some("alice"));

        // The welcome burst repeats 900 for the authenticated session.
        sequence(&mut s, id, &["NICK alice", "USER alice 0 * :Alice"]);
        seen.clear();
        collect(&mut seen, &mut queue);
        assert!(seen.contains(" 001 alice "), "{:?}", seen);
        assert!(seen.contains(" 900 alice alice!alice@127.0.0.1 alice :"), "{:?}", seen);
    }

    #[test]
    fn test_sasl_plain_bad_password() {
        let mut s = state_with_accounts(&[("alice", "password")]);
        let (id, mut queue) = add_client(&mut s);
        let payload = base64::encode(b"\0alice\0wrong");
        sequence(&mut s, id, &["AUTHENTICATE PLAIN", &format!("AUTHENTICATE {}", payload)]);
        let mut seen = String::new();
        collect(&mut seen, &mut queue);
        assert!(seen.contains(" 904 "), "{:?}", seen);
        assert_eq!(s.clients[&id].account(), None);
    }

    #[test]
    fn test_sasl_bad_payload() {
        let mut s = state_with_accounts(&[("alice", "password")]);
        let (id, mut queue) = add_client(&mut s);

        // Not base64 at all.
        sequence(&mut s, id, &["AUTHENTICATE PLAIN", "AUTHENTICATE !!!"]);
        assert_eq!(numerics(&mut queue), vec!["904"]);

        // Base64, but not three NUL-separated fields.
        let payload = base64::encode(b"no separators here");
        sequence(&mut s, id, &["AUTHENTICATE PLAIN", &format!("AUTHENTICATE {}", payload)]);
        assert_eq!(numerics(&mut queue), vec!["904"]);
    }

    #[test]
    fn test_sasl_abort() {
        let mut s = state_with_accounts(&[("alice", "password")]);
        let (id, mut queue) = add_client(&mut s);
        sequence(&mut s, id, &["AUTHENTICATE PLAIN", "AUTHENTICATE *"]);
        let mut seen = String::new();
        collect(&mut seen, &mut queue);
        assert!(seen.contains(" 906 "), "{:?}", seen);

        // The exchange can be restarted afterwards.
        let payload = base64::encode(b"\0alice\0password");
        sequence(&mut s, id, &["AUTHENTICATE PLAIN", &format!("AUTHENTICATE {}", payload)]);
        assert_eq!(s.clients[&id].account(), Some("alice"));
    }

    #[test]
    fn test_sasl_unknown_mechanism() {
        let mut s = state_with_accounts(&[("alice", "password")]);
        let (id, mut queue) = add_client(&mut s);
        sequence(&mut s, id, &["AUTHENTICATE EXTERNAL"]);
        assert_eq!(numerics(&mut queue), vec!["908", "904"]);
    }

    #[test]
    fn test_sasl_chunked_payload() {
        let store = MemoryStore::new();
        let password = "x".repeat(300);
        store.add_account("alice", &password);
        let mut s = state_with_store(store);
        let (id, mut queue) = add_client(&mut s);

        let payload = base64::encode(format!("\0alice\0{}", password).as_bytes());
        assert!(AUTHENTICATE_CHUNK_LEN < payload.len());
        let (first, rest) = payload.split_at(AUTHENTICATE_CHUNK_LEN);

        sequence(&mut s, id, &["AUTHENTICATE PLAIN"]);
        sequence(&mut s, id, &[&format!("AUTHENTICATE {}", first)]);
        // Nothing to say until the final chunk arrives.
        let mut seen = String::new();
        collect(&mut seen, &mut queue);
        assert_eq!(seen, "AUTHENTICATE +\r\n");

        sequence(&mut s, id, &[&format!("AUTHENTICATE {}", rest)]);
        seen.clear();
        collect(&mut seen, &mut queue);
        assert!(seen.contains(" 903 "), "{:?}", seen);
        assert_eq!(s.clients[&id].account(), Some("alice"));
    }

    #[test]
    fn test_sasl_already_authenticated() {
        let mut s = state_with_accounts(&[("alice", "password")]);
        let (id, mut queue) = add_client(&mut s);
        let payload = base64::encode(b"\0alice\0password");
        sequence(&mut s, id, &["AUTHENTICATE PLAIN", &format!("AUTHENTICATE {}", payload)]);
        collect(&mut String::new(), &mut queue);

        sequence(&mut s, id, &["AUTHENTICATE PLAIN"]);
        assert_eq!(numerics(&mut queue), vec!["907"]);
    }
} // mod tests
