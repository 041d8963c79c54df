//! MIME message reading: envelope extraction and leaf-part iteration.
//!
//! Wraps `mail-parser`. A message is parsed once; parts are then handed out
//! one at a time, classified as inline content or a named attachment.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset};
use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use thiserror::Error;
use tracing::debug;

use crate::error::{AttacheError, Result};
use crate::model::envelope::Envelope;

/// Upper bound on leaf parts read from one message (adversarial input guard).
pub const MAX_PARTS: usize = 10_000;

/// One leaf part of a message.
#[derive(Debug)]
pub enum Part<'a> {
    /// Body text: disposition `inline`, or a `text/*` part not marked as an
    /// attachment. Never saved.
    Inline { content_type: String },
    /// Everything else.
    Attachment(Attachment<'a>),
}

/// An attachment and its decoded content.
#[derive(Debug)]
pub struct Attachment<'a> {
    /// Declared filename, possibly empty.
    pub filename: String,
    /// Content with the transfer encoding removed, otherwise untouched.
    pub body: Cow<'a, [u8]>,
}

/// Errors raised while walking the parts of a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartError {
    /// The part declares a character set we cannot decode. Only this part is lost.
    #[error("unknown charset '{charset}'")]
    UnknownCharset { charset: String },

    /// The MIME structure cannot be followed any further.
    #[error("malformed MIME structure: {0}")]
    Malformed(String),
}

impl PartError {
    /// Whether iteration may continue with the next part.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownCharset { .. })
    }
}

/// A parsed message, ready to have its envelope and parts read.
pub struct MessageReader<'x> {
    message: Message<'x>,
}

impl<'x> MessageReader<'x> {
    /// Parse a complete raw message (headers + body).
    pub fn open(raw: &'x [u8]) -> Result<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(AttacheError::MimeError("empty message".into()));
        }
        MessageParser::default()
            .parse(raw)
            .map(|message| Self { message })
            .ok_or_else(|| AttacheError::MimeError("not a parseable RFC 5322 message".into()))
    }

    /// Bare address of the first `From:` mailbox.
    pub fn sender(&self) -> Option<&str> {
        self.message
            .from()?
            .first()?
            .address()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
    }

    /// The `Date:` header, keeping its original offset.
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        let date = self.message.date()?;
        DateTime::parse_from_rfc3339(&date.to_rfc3339()).ok()
    }

    /// Sender and date together; either one missing abandons the message.
    pub fn envelope(&self) -> Result<Envelope> {
        let sender = self.sender().ok_or(AttacheError::MissingSender)?;
        let timestamp = self.date().ok_or(AttacheError::MissingDate)?;
        Ok(Envelope::new(sender, timestamp))
    }

    /// Iterate over the leaf parts in document order.
    pub fn parts(&self) -> Parts<'_, 'x> {
        Parts {
            raw: self.message.raw_message.as_ref(),
            parts: &self.message.parts,
            next: 0,
            yielded: 0,
            done: false,
        }
    }
}

/// Iterator over the leaf parts of a [`MessageReader`].
pub struct Parts<'a, 'x> {
    raw: &'a [u8],
    parts: &'a [MessagePart<'x>],
    next: usize,
    yielded: usize,
    done: bool,
}

impl<'a, 'x> Iterator for Parts<'a, 'x> {
    type Item = std::result::Result<Part<'a>, PartError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let part = self.parts.get(self.next)?;
            self.next += 1;
            if matches!(part.body, PartType::Multipart(_)) {
                continue;
            }

            self.yielded += 1;
            if self.yielded > MAX_PARTS {
                self.done = true;
                return Some(Err(PartError::Malformed(format!(
                    "more than {MAX_PARTS} parts"
                ))));
            }
            return Some(classify(part, self.raw));
        }
    }
}

fn classify<'a>(
    part: &'a MessagePart<'_>,
    raw: &'a [u8],
) -> std::result::Result<Part<'a>, PartError> {
    if let Some(charset) = unknown_charset(part) {
        return Err(PartError::UnknownCharset { charset });
    }

    if is_inline(part) {
        return Ok(Part::Inline {
            content_type: content_type(part),
        });
    }

    Ok(Part::Attachment(Attachment {
        filename: part.attachment_name().unwrap_or_default().to_string(),
        body: body_bytes(part, raw),
    }))
}

/// Inline when the disposition says so, or when a `text/*` part carries no
/// `attachment` disposition. A part without `Content-Type` is `text/plain`.
fn is_inline(part: &MessagePart<'_>) -> bool {
    match part.content_disposition() {
        Some(d) if d.is_inline() => true,
        Some(d) if d.is_attachment() => false,
        _ => part
            .content_type()
            .map_or(true, |ct| ct.ctype().eq_ignore_ascii_case("text")),
    }
}

/// The declared charset of a text part, if `encoding_rs` does not know it.
fn unknown_charset(part: &MessagePart<'_>) -> Option<String> {
    if !matches!(part.body, PartType::Text(_) | PartType::Html(_)) {
        return None;
    }
    let charset = part.content_type()?.attribute("charset")?.trim();
    if charset.is_empty() || encoding_rs::Encoding::for_label(charset.as_bytes()).is_some() {
        return None;
    }
    Some(charset.to_string())
}

fn content_type(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{sub}", ct.ctype()),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "text/plain".to_string())
}

/// Content of an attachment part.
///
/// Text parts are decoded to UTF-8 by the parser, which is lossy for
/// anything else, so their bytes are taken from the raw message and only the
/// transfer encoding is undone. Embedded messages are returned verbatim.
fn body_bytes<'a>(part: &'a MessagePart<'_>, raw: &'a [u8]) -> Cow<'a, [u8]> {
    match &part.body {
        PartType::Text(_) | PartType::Html(_) => raw_text_body(part, raw),
        PartType::Binary(data) | PartType::InlineBinary(data) => Cow::Borrowed(data.as_ref()),
        PartType::Message(msg) => Cow::Borrowed(msg.raw_message.as_ref()),
        PartType::Multipart(_) => Cow::Borrowed(&[]),
    }
}

fn raw_text_body<'a>(part: &MessagePart<'_>, raw: &'a [u8]) -> Cow<'a, [u8]> {
    let body = raw
        .get(part.raw_body_offset()..part.raw_end_offset())
        .unwrap_or_default();
    let encoding = part
        .content_transfer_encoding()
        .map(|e| e.trim().to_ascii_lowercase());
    let decoded = match encoding.as_deref() {
        Some("base64") => base64_decode(body),
        Some("quoted-printable") => quoted_printable_decode(body),
        _ => return Cow::Borrowed(body),
    };
    match decoded {
        Some(bytes) => Cow::Owned(bytes),
        None => {
            debug!(bytes = body.len(), "Undecodable transfer encoding, keeping raw bytes");
            Cow::Borrowed(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"From: Alice <a@example.com>\r\n\
Date: Tue, 02 Jan 2024 03:04:05 +0000\r\n\
Subject: Report\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
See attached.\r\n\
--XX\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
MDEyMzQ1Njc4OQ==\r\n\
--XX--\r\n";

    #[test]
    fn test_envelope() {
        let reader = MessageReader::open(SIMPLE).unwrap();
        let env = reader.envelope().unwrap();
        assert_eq!(env.sender, "a@example.com");
        assert_eq!(env.timestamp_dir(), "2024-01-02T03-04-05");
    }

    #[test]
    fn test_parts_classified() {
        let reader = MessageReader::open(SIMPLE).unwrap();
        let parts: Vec<_> = reader.parts().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], Part::Inline { content_type } if content_type == "text/plain"));
        match &parts[1] {
            Part::Attachment(att) => {
                assert_eq!(att.filename, "report.pdf");
                assert_eq!(&*att.body, b"0123456789");
            }
            other => panic!("expected attachment, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_sender() {
        let raw = b"Date: Tue, 02 Jan 2024 03:04:05 +0000\r\nSubject: x\r\n\r\nbody\r\n";
        let reader = MessageReader::open(raw).unwrap();
        assert!(matches!(reader.envelope(), Err(AttacheError::MissingSender)));
    }

    #[test]
    fn test_missing_date() {
        let raw = b"From: a@example.com\r\nSubject: x\r\n\r\nbody\r\n";
        let reader = MessageReader::open(raw).unwrap();
        assert!(matches!(reader.envelope(), Err(AttacheError::MissingDate)));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            MessageReader::open(b"  \r\n"),
            Err(AttacheError::MimeError(_))
        ));
    }

    #[test]
    fn test_unknown_charset_is_recoverable() {
        let raw = b"From: a@example.com\r\n\
Date: Tue, 02 Jan 2024 03:04:05 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"B\"\r\n\
\r\n\
--B\r\n\
Content-Type: text/plain; charset=x-no-such-charset\r\n\
\r\n\
hello\r\n\
--B\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename=\"a.bin\"\r\n\
\r\n\
abc\r\n\
--B--\r\n";
        let reader = MessageReader::open(raw).unwrap();
        let parts: Vec<_> = reader.parts().collect();
        assert_eq!(parts.len(), 2);
        let err = parts[0].as_ref().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(
            *err,
            PartError::UnknownCharset {
                charset: "x-no-such-charset".into()
            }
        );
        assert!(matches!(&parts[1], Ok(Part::Attachment(a)) if a.filename == "a.bin"));
    }

    #[test]
    fn test_malformed_not_recoverable() {
        assert!(!PartError::Malformed("x".into()).is_recoverable());
    }

    fn multipart(parts: &str) -> Vec<u8> {
        format!(
            "From: a@example.com\r\n\
Date: Tue, 02 Jan 2024 03:04:05 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"B\"\r\n\
\r\n\
--B\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
body\r\n\
{parts}--B--\r\n"
        )
        .into_bytes()
    }

    fn attachments(raw: &[u8]) -> Vec<(String, Vec<u8>)> {
        let reader = MessageReader::open(raw).unwrap();
        reader
            .parts()
            .filter_map(|p| match p.unwrap() {
                Part::Attachment(a) => Some((a.filename, a.body.into_owned())),
                Part::Inline { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_part_without_disposition_is_attachment() {
        let raw = multipart(
            "--B\r\n\
Content-Type: application/pdf; name=\"scan.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
MDEyMzQ1Njc4OQ==\r\n",
        );
        assert_eq!(
            attachments(&raw),
            vec![("scan.pdf".to_string(), b"0123456789".to_vec())]
        );
    }

    #[test]
    fn test_inline_disposition_wins_over_type() {
        let raw = multipart(
            "--B\r\n\
Content-Type: image/png\r\n\
Content-Disposition: inline\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0K\r\n",
        );
        assert!(attachments(&raw).is_empty());
    }

    #[test]
    fn test_text_part_with_attachment_disposition_is_attachment() {
        let raw = multipart(
            "--B\r\n\
Content-Type: text/plain; name=\"notes.txt\"\r\n\
\r\n\
plain notes\r\n\
--B\r\n\
Content-Type: text/plain\r\n\
Content-Disposition: attachment; filename=\"kept.txt\"\r\n\
\r\n\
kept\r\n",
        );
        let found = attachments(&raw);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "kept.txt");
        assert_eq!(found[0].1, b"kept");
    }

    #[test]
    fn test_non_utf8_text_attachment_bytes_preserved() {
        // "caf\xe9;1\r\n" in Latin-1, no charset declared
        let raw = multipart(
            "--B\r\n\
Content-Type: text/csv\r\n\
Content-Disposition: attachment; filename=\"prices.csv\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
Y2Fm6TsxDQo=\r\n",
        );
        let found = attachments(&raw);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, b"caf\xe9;1\r\n");
    }

    #[test]
    fn test_quoted_printable_text_attachment_decoded_to_source_bytes() {
        let raw = multipart(
            "--B\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Disposition: attachment; filename=\"menu.txt\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
caf=E9 cr=E8me\r\n",
        );
        let found = attachments(&raw);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, b"caf\xe9 cr\xe8me");
    }
}
