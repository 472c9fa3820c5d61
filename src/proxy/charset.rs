//! Text body decoding and re-encoding by the declared charset.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

/// The encoding named by the `charset` parameter of a Content-Type value.
///
/// Labels are resolved per the WHATWG Encoding Standard, so `iso-8859-1`
/// yields windows-1252. Unknown labels give `None`.
pub fn from_content_type(content_type: &str) -> Option<&'static Encoding> {
    let label = content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })?;
    Encoding::for_label(label.as_bytes())
}

/// Decode `body`, letting a byte order mark override `declared`.
///
/// Returns the text and the encoding actually used.
pub fn decode<'a>(
    body: &'a [u8],
    declared: Option<&'static Encoding>,
) -> (Cow<'a, str>, &'static Encoding) {
    let (text, used, _) = declared.unwrap_or(UTF_8).decode(body);
    (text, used)
}

/// Encode `text` back into `encoding`.
///
/// Encodings that cannot be produced (UTF-16) fall back to UTF-8; the
/// returned encoding is the one the bytes are in.
pub fn encode(text: &str, encoding: &'static Encoding) -> (Vec<u8>, &'static Encoding) {
    let (bytes, used, _) = encoding.encode(text);
    (bytes.into_owned(), used)
}

/// Replace (or add) the `charset` parameter of a Content-Type value.
pub fn with_charset(content_type: &str, encoding: &'static Encoding) -> String {
    let mut parts = content_type.split(';');
    let mut out = parts.next().unwrap_or_default().trim().to_owned();
    for param in parts {
        let param = param.trim();
        let is_charset = param
            .split_once('=')
            .is_some_and(|(name, _)| name.trim().eq_ignore_ascii_case("charset"));
        if !param.is_empty() && !is_charset {
            out.push_str("; ");
            out.push_str(param);
        }
    }
    out.push_str("; charset=");
    out.push_str(encoding.name());
    out
}
