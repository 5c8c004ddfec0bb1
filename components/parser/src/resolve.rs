//! External entity resolution and fetch (spec.md §4.C4). Grounded in
//! `original_source/xml_parser/helpers.py::fetch_external_entity_expansion_text`
//! and the teacher's use of `encoding_rs` for charset detection
//! (`examples/R1tschY-xrs/components/parser/Cargo.toml`).

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Pluggable source of external-entity and external-subset bytes (spec.md
/// §4.C4 "External resolution is pluggable"). The default implementation
/// reads from the local filesystem relative to a base directory.
pub trait ExternalResolver {
    /// Fetches the raw bytes named by `system_id`, resolved against
    /// `base_uri` if relative. `public_id` is advisory only: this crate
    /// never performs catalog resolution.
    fn resolve(&self, public_id: Option<&str>, system_id: &str, base_uri: Option<&str>) -> std::io::Result<Vec<u8>>;
}

/// Resolves `system_id` as a filesystem path, relative to `base_uri` (or the
/// process's current directory if none is given).
pub struct FileResolver;

impl ExternalResolver for FileResolver {
    fn resolve(&self, _public_id: Option<&str>, system_id: &str, base_uri: Option<&str>) -> std::io::Result<Vec<u8>> {
        let path = resolve_path(system_id, base_uri);
        std::fs::read(path)
    }
}

fn resolve_path(system_id: &str, base_uri: Option<&str>) -> PathBuf {
    let system_id = system_id.strip_prefix("file://").unwrap_or(system_id);
    let path = Path::new(system_id);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match base_uri {
        Some(base) => Path::new(base).join(path),
        None => path.to_path_buf(),
    }
}

/// Result of fetching and decoding an external resource: the decoded text
/// with its text/XML declaration stripped, and a base URI for any further
/// relative resolution performed from within it (spec.md §4.C4 "nested base
/// URI").
pub struct FetchedText {
    pub text: String,
    pub base_uri: Option<String>,
}

/// Fetches `system_id` (preferring it over `public_id`, spec.md §4.C4
/// "fetch order"), decodes it, and strips any leading text declaration.
/// Declared-encoding -> UTF-8 -> UTF-16 is the decoding fallback order
/// (spec.md §4.C4 "Decoding fallback"). Returns `Ok(None)` only cannot
/// happen here: fetch/decode failures are reported as `Error::Encoding`
/// or bubbled up from I/O by the caller, which the caller may choose to
/// downgrade to a logged, unresolved entity (spec.md §4.C6 "unparsed
/// expansion on fetch failure").
pub fn fetch_external(
    resolver: &dyn ExternalResolver,
    public_id: Option<&str>,
    system_id: &str,
    base_uri: Option<&str>,
) -> Result<FetchedText> {
    let bytes = resolver
        .resolve(public_id, system_id, base_uri)
        .map_err(|e| Error::encoding(format!("could not fetch '{}': {}", system_id, e)))?;

    let declared = sniff_declared_encoding(&bytes);
    let text = decode(&bytes, declared.as_deref())?;
    let (_, stripped) = strip_text_declaration(&text);
    let stripped = canonicalize_line_endings(stripped);

    let new_base = Path::new(system_id)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| !p.is_empty())
        .or_else(|| base_uri.map(str::to_string));

    Ok(FetchedText {
        text: stripped,
        base_uri: new_base,
    })
}

/// Replays a text declaration's `encoding="…"` pseudo-attribute without a
/// full parse, good enough to pick a codec before the real decode.
fn sniff_declared_encoding(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Some("UTF-16BE".to_string());
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Some("UTF-16LE".to_string());
    }
    let head = &bytes[..bytes.len().min(200)];
    let head = String::from_utf8_lossy(head);
    let marker = "encoding=";
    let start = head.find(marker)? + marker.len();
    let quote = head[start..].chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let rest = &head[start + 1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

/// Sniffs and decodes a byte stream the same way `fetch_external` does,
/// for use on the top-level document entity (spec.md §4.C4/C12
/// "document decoding"), without also stripping a text declaration — the
/// document's XML declaration is parsed by `document::parse_document`
/// itself since (unlike a text declaration) it may carry `standalone`.
pub(crate) fn decode_document_bytes(bytes: &[u8], encoding_override: Option<&str>) -> Result<String> {
    let declared = encoding_override
        .map(str::to_string)
        .or_else(|| sniff_declared_encoding(bytes));
    decode(bytes, declared.as_deref())
}

/// Decodes `bytes` trying, in order: the declared encoding, UTF-8, UTF-16.
fn decode(bytes: &[u8], declared: Option<&str>) -> Result<String> {
    if let Some(label) = declared {
        if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
            let (text, _, had_errors) = encoding.decode(bytes);
            if !had_errors {
                return Ok(text.into_owned());
            }
        }
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }
    for label in ["UTF-16LE", "UTF-16BE"] {
        let encoding = encoding_rs::Encoding::for_label(label.as_bytes()).unwrap();
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return Ok(text.into_owned());
        }
    }
    Err(Error::encoding("no candidate encoding could decode the byte stream"))
}

/// Strips a leading text declaration `<?xml … ?>` (spec.md §4.C4 "Text
/// declaration stripping"), returning its raw body (if present, for
/// diagnostics) and the remaining text.
pub fn strip_text_declaration(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text.strip_prefix("<?xml") else {
        return (None, text);
    };
    // Must be followed by whitespace or '?' (not e.g. "<?xmlfoo").
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return (None, text);
    }
    match rest.find("?>") {
        Some(end) => (Some(&rest[..end]), &rest[end + 2..]),
        None => (None, text),
    }
}

/// Canonicalizes all XML 1.0 line endings to `\n` in one upfront pass
/// (spec.md §4.C12 "Line-ending canonicalization"): every `#xD#xA` and
/// every lone `#xD` becomes `#xA`.
pub fn canonicalize_line_endings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_crlf_and_lone_cr() {
        assert_eq!(canonicalize_line_endings("a\r\nb\rc\nd"), "a\nb\nc\nd");
    }

    #[test]
    fn strips_text_declaration() {
        let (decl, rest) = strip_text_declaration("<?xml version=\"1.0\" encoding=\"UTF-8\"?>content");
        assert_eq!(decl, Some(" version=\"1.0\" encoding=\"UTF-8\""));
        assert_eq!(rest, "content");
    }

    #[test]
    fn leaves_text_without_declaration_untouched() {
        let (decl, rest) = strip_text_declaration("content");
        assert_eq!(decl, None);
        assert_eq!(rest, "content");
    }

    #[test]
    fn resolve_path_joins_relative_to_base() {
        let p = resolve_path("foo.dtd", Some("/a/b"));
        assert_eq!(p, PathBuf::from("/a/b/foo.dtd"));
    }
}
