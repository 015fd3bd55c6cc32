//! Wire-exact reply text. These are constants and small constructors, never
//! printf templates. Every byte here, including the spacing in
//! `RCPT TO: <address>` and the literal `node.js` in the greeting, is part
//! of the tested wire protocol and must not be reconstructed dynamically in
//! a way that could drift from it.

/// A single SMTP reply: a three-digit code and free-text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub text: String,
}

impl Response {
    fn new(code: u16, text: impl Into<String>) -> Self {
        Response { code, text: text.into() }
    }

    /// Serializes as `"{code} {text}\r\n"`, the only wire form this server
    /// produces; multi-line replies are not used.
    pub fn to_wire(&self) -> String {
        format!("{} {}\r\n", self.code, self.text)
    }

    pub fn greeting(server_name: &str) -> Self {
        Response::new(220, format!("{} node.js SMTP server", server_name))
    }

    pub fn quit(server_name: &str) -> Self {
        Response::new(221, format!("{} closing connection", server_name))
    }

    pub fn helo_ok(server_name: &str, peer_ip: &str) -> Self {
        Response::new(250, format!("{} Hello {}", server_name, peer_ip))
    }

    pub fn ok() -> Self {
        Response::new(250, "Ok")
    }

    pub fn start_data() -> Self {
        Response::new(354, "End data with <CR><LF>.<CR><LF>")
    }

    pub fn helo_syntax() -> Self {
        Response::new(501, "Syntax: HELO hostname")
    }

    pub fn noop_syntax() -> Self {
        Response::new(501, "Syntax: NOOP")
    }

    pub fn rset_syntax() -> Self {
        Response::new(501, "Syntax: RSET")
    }

    pub fn mail_syntax() -> Self {
        Response::new(501, "Syntax: MAIL FROM:<address>")
    }

    pub fn rcpt_syntax() -> Self {
        Response::new(501, "Syntax: RCPT TO: <address>")
    }

    pub fn data_syntax() -> Self {
        Response::new(501, "Syntax: DATA")
    }

    pub fn unknown_command(verb: &str) -> Self {
        Response::new(502, format!("Error: command \"{}\" not implemented", verb))
    }

    pub fn duplicate_helo() -> Self {
        Response::new(503, "Duplicate HELO/EHLO")
    }

    pub fn nested_mail() -> Self {
        Response::new(503, "Error: nested MAIL command")
    }

    pub fn need_mail() -> Self {
        Response::new(503, "Error: need MAIL command")
    }

    pub fn need_rcpt() -> Self {
        Response::new(503, "Error: need RCPT command")
    }

    pub fn data_too_large() -> Self {
        Response::new(552, "Too much mail data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_matches_wire_text_exactly() {
        assert_eq!(
            Response::greeting("test").to_wire(),
            "220 test node.js SMTP server\r\n"
        );
    }

    #[test]
    fn helo_ok_does_not_echo_client_argument() {
        assert_eq!(
            Response::helo_ok("test", "127.0.0.1").to_wire(),
            "250 test Hello 127.0.0.1\r\n"
        );
    }

    #[test]
    fn rcpt_syntax_preserves_the_quirky_space() {
        assert_eq!(
            Response::rcpt_syntax().to_wire(),
            "501 Syntax: RCPT TO: <address>\r\n"
        );
    }

    #[test]
    fn unknown_command_echoes_verb_uppercase_in_quotes() {
        assert_eq!(
            Response::unknown_command("EHLO").to_wire(),
            "502 Error: command \"EHLO\" not implemented\r\n"
        );
    }

    #[test]
    fn quit_matches_wire_text_exactly() {
        assert_eq!(
            Response::quit("test").to_wire(),
            "221 test closing connection\r\n"
        );
    }
}
