//! Reference helpers (spec.md §4.C3): numeric character references,
//! parameter-entity expansion inside DTD markup tokens, entity-value
//! normalization and attribute-value normalization. Grounded in
//! `original_source/xml_parser/helpers.py` and
//! `original_source/xml_parser/content/Element.py::normalise_attribute_value`.

use xrs_chars::XmlChar;

use crate::dtd::{Dtd, EntityChain};
use crate::error::{Error, Result};
use crate::scan;

/// Parses a leading `&#…;` or `&#x…;` character reference.
///
/// Resolved from `original_source/xml_parser/helpers.py::parse_character_reference`:
/// an empty digit run or a non-hex digit in the hex form is a
/// WellFormedness error, not a DisallowedCharacter (the reference is
/// malformed, not a legal-but-forbidden code point).
pub fn parse_char_ref<'a>(input: &'a str, source: &str) -> Result<(char, &'a str)> {
    let rest = scan::literal(input, "&#", source)?;
    let end = rest
        .find(';')
        .ok_or_else(|| Error::wf("unterminated character reference", source))?;
    let (digits, after) = (&rest[..end], &rest[end + 1..]);

    let code_point = if let Some(hex) = digits.strip_prefix('x') {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::wf(
                format!("invalid hexadecimal character reference '&#x{};'", hex),
                source,
            ));
        }
        u32::from_str_radix(hex, 16)
    } else {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::wf(
                format!("invalid character reference '&#{};'", digits),
                source,
            ));
        }
        digits.parse()
    }
    .map_err(|_| Error::wf(format!("character reference out of range: '{}'", digits), source))?;

    let c = char::from_u32(code_point)
        .filter(|c| c.is_xml_char())
        .ok_or_else(|| {
            Error::wf(
                format!("character reference U+{:04X} is not a legal XML character", code_point),
                source,
            )
        })?;

    Ok((c, after))
}

/// Expands every `%Name;` parameter-entity reference found anywhere in
/// `text`, recursing into each entity's own expansion text. Used only when
/// parsing the external subset (and entities declared there); illegal
/// directly in the internal subset.
///
/// Grounded in `helpers.py::expand_parameter_entity_references`.
pub fn expand_parameter_entities(
    text: &str,
    dtd: &Dtd,
    chain: &EntityChain,
    source: &str,
) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(start) = rest.find('%') else {
            out.push_str(rest);
            return Ok(out);
        };
        let Some(end_rel) = rest[start..].find(';') else {
            out.push_str(rest);
            return Ok(out);
        };
        let end = start + end_rel;
        out.push_str(&rest[..start]);
        let name = &rest[start + 1..end];
        let entity = dtd
            .parameter_entities
            .get(name)
            .ok_or_else(|| Error::wf(format!("reference to undeclared parameter entity '%{};'", name), source))?;
        let chain = chain.push(name)?;
        let expansion = entity.expansion_text.as_deref().unwrap_or("");
        let padded = format!(" {} ", expansion);
        out.push_str(&expand_parameter_entities(&padded, dtd, &chain, source)?);
        rest = &rest[end + 1..];
    }
}

/// Expands a single leading `%Name;` reference (after optional leading
/// whitespace) and splices its expansion, padded with a space on each
/// side, ahead of the remaining unparsed text — used to re-lex a markup
/// token whose first significant character is a parameter-entity
/// reference (spec.md §4.C8/C9 "re-lexes after every substitution").
///
/// Grounded in `helpers.py::expand_parameter_entity_reference`.
pub fn expand_leading_parameter_entity(
    input: &str,
    dtd: &Dtd,
    chain: &EntityChain,
    source: &str,
) -> Result<String> {
    let after_ws = scan::skip_whitespace(input);
    let rest = after_ws
        .strip_prefix('%')
        .ok_or_else(|| Error::wf("expected a parameter entity reference", source))?;
    let end = rest
        .find(';')
        .ok_or_else(|| Error::wf("unterminated parameter entity reference", source))?;
    let name = &rest[..end];
    let entity = dtd
        .parameter_entities
        .get(name)
        .ok_or_else(|| Error::wf(format!("reference to undeclared parameter entity '%{};'", name), source))?;
    let chain = chain.push(name)?;
    let expansion_text = entity.expansion_text.as_deref().unwrap_or("");
    let expanded = expand_parameter_entities(expansion_text, dtd, &chain, source)?;

    let mut out = String::with_capacity(expanded.len() + rest.len() - end + 2);
    out.push(' ');
    out.push_str(&expanded);
    out.push(' ');
    out.push_str(&rest[end + 1..]);
    Ok(out)
}

/// Normalizes an `EntityValue` literal at `<!ENTITY Name "…">` read time
/// (spec.md §4.C3 "Normalize entity-value literal"): expands parameter-
/// entity and character references, leaves general-entity references
/// literal, and rejects unescaped `&`/`%` outside legal references.
/// `%Name;` inside an entity value in the *internal* subset is itself a
/// well-formedness error.
///
/// Grounded in `original_source/xml_parser/dtd/Entity.py::normalise_entity_value`.
pub fn normalize_entity_value(
    value: &str,
    dtd: &Dtd,
    external: bool,
    chain: &EntityChain,
    source: &str,
) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    loop {
        let Some(amp) = rest.find(['&', '%']) else {
            reject_bare_markup_chars(rest, source)?;
            out.push_str(rest);
            return Ok(out);
        };
        out.push_str(&rest[..amp]);
        let marker = rest.as_bytes()[amp];
        let Some(semi_rel) = rest[amp..].find(';') else {
            return Err(Error::wf("unterminated reference in entity value", source));
        };
        let reference = &rest[amp..amp + semi_rel + 1];
        rest = &rest[amp + semi_rel + 1..];

        if marker == b'&' {
            if reference.starts_with("&#") {
                let (c, leftover) = parse_char_ref(reference, source)?;
                debug_assert!(leftover.is_empty());
                out.push(c);
            } else {
                // General-entity references are left literal; only validate shape.
                let name = &reference[1..reference.len() - 1];
                scan::assert_name(name, "entity value")?;
                out.push_str(reference);
            }
        } else {
            if !external {
                return Err(Error::wf(
                    "parameter entity references are not allowed within markup in the internal subset",
                    source,
                ));
            }
            let name = &reference[1..reference.len() - 1];
            let entity = dtd
                .parameter_entities
                .get(name)
                .ok_or_else(|| Error::wf(format!("reference to undeclared parameter entity '{}'", reference), source))?;
            let chain = chain.push(name)?;
            let expansion = entity.expansion_text.as_deref().unwrap_or("");
            out.push_str(&normalize_entity_value(expansion, dtd, external, &chain, source)?);
        }
    }
}

fn reject_bare_markup_chars(s: &str, source: &str) -> Result<()> {
    if s.contains('&') {
        return Err(Error::disallowed_char(s, "entity value", "Char"));
    }
    if s.contains('%') {
        return Err(Error::disallowed_char(s, "entity value", "Char"));
    }
    Ok(())
}

/// Implements the attribute-value normalization algorithm of XML spec
/// §3.3.3 (spec.md §4.C3 "Normalize attribute-value literal"):
///
/// 1. Replace every `#xD #xA`, lone `#xD`, `#x9` and `#xA` in the literal
///    with `#x20`.
/// 2. Expand character references and general-entity references,
///    recursively normalizing each expansion's text with the same rules.
/// 3. Reject any expansion containing `<`.
/// 4. Reject reference to an unparsed entity, or a parsed external entity
///    whose body could not be fetched.
/// 5. If `is_cdata` is false, strip leading/trailing `#x20` and collapse
///    interior runs of `#x20` to one.
///
/// Grounded in `original_source/xml_parser/content/Element.py::normalise_attribute_value`.
pub fn normalize_attribute_value(
    value: &str,
    dtd: &Dtd,
    is_cdata: bool,
    chain: &EntityChain,
    source: &str,
) -> Result<String> {
    let whitespace_folded: String = value
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect();

    let mut out = String::with_capacity(whitespace_folded.len());
    let mut rest = whitespace_folded.as_str();
    loop {
        let Some(amp) = rest.find('&') else {
            reject_attr_markup_chars(rest, source)?;
            out.push_str(rest);
            break;
        };
        reject_attr_markup_chars(&rest[..amp], source)?;
        out.push_str(&rest[..amp]);
        let Some(semi_rel) = rest[amp..].find(';') else {
            return Err(Error::wf("unterminated reference in attribute value", source));
        };
        let reference = &rest[amp..amp + semi_rel + 1];
        rest = &rest[amp + semi_rel + 1..];

        if reference.starts_with("&#") {
            let (c, leftover) = parse_char_ref(reference, source)?;
            debug_assert!(leftover.is_empty());
            out.push(c);
            continue;
        }

        let name = &reference[1..reference.len() - 1];
        let chain = chain.push(name)?;
        let entity = dtd
            .general_entities
            .get(name)
            .ok_or_else(|| Error::wf(format!("reference to undeclared entity '{}'", reference), source))?;
        if !entity.parsed {
            return Err(Error::wf(
                "illegal reference to unparsed entity in attribute value",
                source,
            ));
        }
        let expansion = entity.expansion_text.as_ref().ok_or_else(|| {
            Error::wf(
                format!(
                    "reference to parsed external entity '{}' which could not be fetched",
                    reference
                ),
                source,
            )
        })?;
        out.push_str(&normalize_attribute_value(expansion, dtd, true, &chain, source)?);
    }

    if !is_cdata {
        collapse_whitespace(&out)
    } else {
        Ok(out)
    }
}

fn reject_attr_markup_chars(s: &str, source: &str) -> Result<()> {
    if s.contains('&') {
        return Err(Error::disallowed_char(s, "attribute value", "Char"));
    }
    if s.contains('<') {
        return Err(Error::disallowed_char(s, "attribute value", "Char"));
    }
    Ok(())
}

fn collapse_whitespace(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = true; // drop leading spaces
    for c in s.chars() {
        if c == ' ' {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    Ok(out)
}
