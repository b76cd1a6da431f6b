use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

use crate::error::XmlError;

/// How far into the file the XML declaration is looked for.
const DECLARATION_WINDOW: usize = 1024;

/// Decode raw file bytes into text.
///
/// A byte order mark wins; otherwise the `encoding` pseudo-attribute of the XML
/// declaration is honoured; otherwise the bytes must be UTF-8.
pub fn decode_document(bytes: &[u8]) -> Result<Cow<'_, str>, XmlError> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => (declared_encoding(bytes).unwrap_or(UTF_8), bytes),
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| XmlError {
            message: format!("document is not valid {}", encoding.name()),
            position: 0,
        })
}

/// Encoding named by `<?xml ... encoding="..."?>`, if present and known.
///
/// The declaration was readable as ASCII, so a UTF-16 label here cannot be
/// right; `output_encoding` maps it back to UTF-8.
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(DECLARATION_WINDOW)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = &head[..end];

    let at = decl.windows(8).position(|w| w == b"encoding")?;
    let rest = decl[at + 8..].trim_ascii_start().strip_prefix(b"=")?.trim_ascii_start();
    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let label = &rest[..rest.iter().position(|&b| b == quote)?];

    let encoding = Encoding::for_label(label);
    if encoding.is_none() {
        tracing::warn!(label = %String::from_utf8_lossy(label), "unknown XML encoding, assuming UTF-8");
    }
    encoding.map(Encoding::output_encoding)
}
