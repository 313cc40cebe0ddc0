//! Response body decoding for HTML pages.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

/// Declared charsets that are too often a server default to be trusted.
const UNTRUSTED_CHARSETS: &[&str] = &["iso-8859-1", "latin-1", "latin1"];

/// Pull the `charset` parameter out of a `Content-Type` value.
pub fn declared_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_ascii_lowercase())
    })
}

/// Guess an encoding from the bytes alone.
pub fn guess_encoding(body: &[u8]) -> &'static Encoding {
    if body.is_empty() {
        return UTF_8;
    }
    if let Some((encoding, _)) = Encoding::for_bom(body) {
        return encoding;
    }
    if std::str::from_utf8(body).is_ok() {
        return UTF_8;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(body, true);
    detector.guess(None, true)
}

/// Decode an HTML body.
///
/// The declared charset wins unless it is missing, unknown, or one of the
/// single-byte Latin labels; those fall back to content detection.
pub fn decode_html(body: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type
        .and_then(declared_charset)
        .filter(|label| !UNTRUSTED_CHARSETS.contains(&label.as_str()))
        .and_then(|label| Encoding::for_label(label.as_bytes()));

    let encoding = declared.unwrap_or_else(|| guess_encoding(body));
    tracing::trace!(encoding = encoding.name(), "decoding html body");
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_charset() {
        assert_eq!(
            declared_charset("text/html; charset=UTF-8"),
            Some("utf-8".to_string())
        );
        assert_eq!(
            declared_charset("text/html;CHARSET=\"Shift_JIS\""),
            Some("shift_jis".to_string())
        );
        assert_eq!(declared_charset("text/html"), None);
        assert_eq!(declared_charset("text/html; charset="), None);
    }

    #[test]
    fn test_declared_charset_is_used() {
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("<p>日本語</p>");
        let text = decode_html(&bytes, Some("text/html; charset=shift_jis"));
        assert_eq!(text, "<p>日本語</p>");
    }

    #[test]
    fn test_latin1_declaration_falls_back_to_guess() {
        let body = "<p>café</p>".as_bytes();
        let text = decode_html(body, Some("text/html; charset=ISO-8859-1"));
        assert_eq!(text, "<p>café</p>");
    }

    #[test]
    fn test_missing_declaration_defaults_to_utf8() {
        assert_eq!(decode_html("<p>naïve</p>".as_bytes(), None), "<p>naïve</p>");
        assert_eq!(decode_html(b"", None), "");
        assert_eq!(guess_encoding(b""), UTF_8);
    }

    #[test]
    fn test_unknown_declaration_falls_back_to_guess() {
        let text = decode_html(b"<p>ok</p>", Some("text/html; charset=not-a-charset"));
        assert_eq!(text, "<p>ok</p>");
    }

    #[test]
    fn test_bom_wins_guess() {
        let mut body = vec![0xEF, 0xBB, 0xBF];
        body.extend_from_slice(b"<p>bom</p>");
        assert_eq!(decode_html(&body, None), "<p>bom</p>");
    }
}
