//! Extracts a subject and a plain-text body (HTML stripped, when present)
//! from a raw RFC 5322 message, for shaping the webhook payload. This is a
//! concern of the webhook sink, not the core SMTP engine: the core never
//! looks inside the DATA body it accumulates.

use anyhow::{Context, Result};
use mailparse::{parse_mail, ParsedMail};

/// The parts of a message the webhook payload cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEmail {
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
}

/// Parses a raw message (headers + body, as accumulated verbatim from DATA)
/// into a subject and a plain-text body.
///
/// Multipart messages are searched depth-first for the first `text/plain`
/// part; if none exists but a `text/html` part does, it is rendered to text
/// with `html2text` and also preserved verbatim in `html_body`.
pub fn parse(raw_message: &str) -> Result<ParsedEmail> {
    let mail = parse_mail(raw_message.as_bytes()).context("failed to parse message for webhook payload")?;
    let subject = mail
        .headers
        .get_first_value("Subject")
        .unwrap_or_default();

    let plain = find_part(&mail, "text/plain");
    let html = find_part(&mail, "text/html");

    let (body, html_body) = match (plain, html) {
        (Some(plain_part), html_part) => {
            let body = plain_part.get_body().context("failed to decode text/plain part")?;
            let html_body = html_part
                .map(|p| p.get_body())
                .transpose()
                .context("failed to decode text/html part")?;
            (body, html_body)
        }
        (None, Some(html_part)) => {
            let html_raw = html_part.get_body().context("failed to decode text/html part")?;
            let plain = html2text::from_read(html_raw.as_bytes(), 80)
                .context("failed to render html body as text")?;
            (plain, Some(html_raw))
        }
        (None, None) => {
            // No explicit content-type part (a single-part, non-MIME
            // message): treat the whole decoded body as plain text.
            let body = mail.get_body().context("failed to decode message body")?;
            (body, None)
        }
    };

    Ok(ParsedEmail {
        subject,
        body: body.trim_end().to_string(),
        html_body,
    })
}

/// Depth-first search for the first part whose MIME type matches `mimetype`,
/// including the top-level part itself.
fn find_part<'a>(mail: &'a ParsedMail<'a>, mimetype: &str) -> Option<&'a ParsedMail<'a>> {
    if mail.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
        return Some(mail);
    }
    for subpart in &mail.subparts {
        if let Some(found) = find_part(subpart, mimetype) {
            return Some(found);
        }
    }
    None
}
