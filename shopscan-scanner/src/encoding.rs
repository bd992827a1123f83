// Decoding of fetched bodies into UTF-8 text

use crate::error::{Result, ScanError};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use regex::bytes::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Bytes of the document searched for a `<meta>` charset declaration.
const META_PRESCAN_BYTES: usize = 1024;

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)<meta\b[^>]*?charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#)
        .expect("static pattern")
});

/// Resolve an encoding label such as `euc-jp` or `shift_jis`.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ScanError::UnknownEncoding(label.to_string()))
}

/// Pull the `charset=` parameter out of a Content-Type header value.
pub fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| Encoding::for_label(value.trim().trim_matches('"').as_bytes()))
}

/// Charset declared by a `<meta charset>` or `<meta http-equiv>` tag near
/// the start of the document. UTF-16 declarations read as UTF-8, as browsers do.
pub fn charset_from_meta(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(META_PRESCAN_BYTES)];
    let caps = META_CHARSET.captures(head)?;
    let encoding = Encoding::for_label(&caps[1])?;
    if encoding == UTF_16LE || encoding == UTF_16BE {
        Some(UTF_8)
    } else {
        Some(encoding)
    }
}

/// Decode a response body.
///
/// Order of precedence: explicit override, the transport's `charset`, the
/// page's own `<meta>` declaration, then a byte-level guess hinted by the
/// host's top-level domain. A BOM always wins (encoding_rs behaviour).
pub fn decode_body(
    body: &[u8],
    content_type: Option<&str>,
    host: Option<&str>,
    override_encoding: Option<&'static Encoding>,
) -> String {
    let encoding = override_encoding
        .or_else(|| content_type.and_then(charset_from_content_type))
        .or_else(|| charset_from_meta(body))
        .unwrap_or_else(|| detect_encoding(body, host));

    debug!("Decoding {} bytes as {}", body.len(), encoding.name());
    let (text, actual, had_errors) = encoding.decode(body);
    if had_errors {
        debug!("Replacement characters produced while decoding as {}", actual.name());
    }
    text.into_owned()
}

fn detect_encoding(body: &[u8], host: Option<&str>) -> &'static Encoding {
    if std::str::from_utf8(body).is_ok() {
        return UTF_8;
    }
    let tld = host
        .and_then(|h| h.rsplit('.').next())
        .filter(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_lowercase()));
    let mut detector = EncodingDetector::new();
    detector.feed(body, true);
    detector.guess(tld.map(str::as_bytes), true)
}
