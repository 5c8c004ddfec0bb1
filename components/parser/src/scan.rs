//! Character-level scanning helpers shared by every reader (spec.md §4.C1,
//! the lexical primitives underneath C6–C12). Every function takes the
//! remaining input as a plain `&str` and returns the parsed piece together
//! with the unparsed tail, mirroring design note §9's "current input is
//! returned along with any produced node" recursive-descent shape.

use xrs_chars::{XmlAsciiChar, XmlChar};

use crate::error::{Error, Result};

/// Consumes leading XML whitespace (`S?`).
pub fn skip_whitespace(input: &str) -> &str {
    input.trim_start_matches(|c: char| c.is_xml_whitespace())
}

/// Consumes mandatory XML whitespace (`S`).
pub fn whitespace<'a>(input: &'a str, source: &str) -> Result<&'a str> {
    let rest = skip_whitespace(input);
    if rest.len() == input.len() {
        Err(Error::wf("expected whitespace", source))
    } else {
        Ok(rest)
    }
}

/// Consumes a literal ASCII token, failing with a well-formedness error if
/// it is absent.
pub fn literal<'a>(input: &'a str, lit: &str, source: &str) -> Result<&'a str> {
    input
        .strip_prefix(lit)
        .ok_or_else(|| Error::wf(format!("expected '{}'", lit), source))
}

pub fn starts_with(input: &str, lit: &str) -> bool {
    input.starts_with(lit)
}

/// Scans a `Name` production, returning the name and remaining input.
pub fn name<'a>(input: &'a str, source: &str) -> Result<(&'a str, &'a str)> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_xml_name_start_char() => {}
        _ => return Err(Error::wf("expected a Name", source)),
    }
    let mut end = input.len();
    for (i, c) in chars {
        if !c.is_xml_name_char() {
            end = i;
            break;
        }
    }
    Ok((&input[..end], &input[end..]))
}

/// Scans an `NmToken` production.
pub fn nmtoken<'a>(input: &'a str, source: &str) -> Result<(&'a str, &'a str)> {
    let end = input
        .char_indices()
        .find(|(_, c)| !c.is_xml_name_char())
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    if end == 0 {
        return Err(Error::wf("expected an Nmtoken", source));
    }
    Ok((&input[..end], &input[end..]))
}

/// Scans a quoted literal (`'...'` or `"..."`), returning its unescaped
/// content verbatim (no normalization) and the remaining input.
pub fn quoted<'a>(input: &'a str, source: &str) -> Result<(&'a str, &'a str)> {
    let delimiter = input
        .chars()
        .next()
        .filter(|&c| c == '\'' || c == '"')
        .ok_or_else(|| Error::wf("expected ' or \"", source))?;
    let rest = &input[delimiter.len_utf8()..];
    let end = rest
        .find(delimiter)
        .ok_or_else(|| Error::wf("unterminated literal", source))?;
    Ok((&rest[..end], &rest[end + delimiter.len_utf8()..]))
}

/// Scans `Eq ::= S? '=' S?`.
pub fn eq<'a>(input: &'a str, source: &str) -> Result<&'a str> {
    let rest = skip_whitespace(input);
    let rest = literal(rest, "=", source)?;
    Ok(skip_whitespace(rest))
}

/// Returns the first legal `Char` in `s` that fails `predicate`, used to turn
/// a bulk-match failure into a precise `DisallowedCharacter`.
pub fn assert_chars(s: &str, context: &'static str) -> Result<()> {
    if let Some(c) = s.chars().find(|c| !c.is_xml_char()) {
        return Err(Error::DisallowedCharacter {
            sequence: s.chars().take(100).collect(),
            context,
            conforms_to: "Char",
            offending: Some(c),
        });
    }
    Ok(())
}

pub fn assert_name(s: &str, context: &'static str) -> Result<()> {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_xml_name_start_char() => {}
        other => {
            return Err(Error::DisallowedCharacter {
                sequence: s.chars().take(100).collect(),
                context,
                conforms_to: "Name",
                offending: other,
            })
        }
    }
    if let Some(c) = chars.find(|c| !c.is_xml_name_char()) {
        return Err(Error::DisallowedCharacter {
            sequence: s.chars().take(100).collect(),
            context,
            conforms_to: "Name",
            offending: Some(c),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_scans_up_to_first_non_name_char() {
        let (n, rest) = name("foo.bar baz", "").unwrap();
        assert_eq!(n, "foo.bar");
        assert_eq!(rest, " baz");
    }

    #[test]
    fn name_rejects_leading_digit() {
        assert!(name("1abc", "").is_err());
    }

    #[test]
    fn quoted_handles_both_delimiters() {
        assert_eq!(quoted("'a'rest", "").unwrap(), ("a", "rest"));
        assert_eq!(quoted("\"a\"rest", "").unwrap(), ("a", "rest"));
    }

    #[test]
    fn eq_allows_surrounding_whitespace() {
        assert_eq!(eq(" = rest", "").unwrap(), "rest");
        assert_eq!(eq("=rest", "").unwrap(), "rest");
    }
}
