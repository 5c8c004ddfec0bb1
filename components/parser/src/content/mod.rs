//! Element and content readers (spec.md §4.C11). Grounded in
//! `original_source/xml_parser/content/Element.py` and
//! `original_source/xml_parser/content/Text.py`.

use crate::document::{Content, Element, ProcessingInstruction};
use crate::dtd::{AttDefault, Dtd, EntityChain};
use crate::error::{Error, Result};
use crate::markup::{parse_comment, parse_pi};
use crate::reference::{normalize_attribute_value, parse_char_ref};
use crate::resolve::ExternalResolver;
use crate::scan;

/// `element ::= EmptyElemTag | STag content ETag`, starting at the
/// element's opening `<`.
pub fn parse_element<'i>(
    input: &'i str,
    dtd: &Dtd,
    resolver: &dyn ExternalResolver,
    base_uri: Option<&str>,
    chain: &EntityChain,
    source: &str,
) -> Result<(Element, &'i str)> {
    let rest = scan::literal(input, "<", source)?;
    let (name, rest) = scan::name(rest, source)?;
    let (explicit_attrs, rest) = parse_attributes(rest, name, dtd, chain, source)?;
    let attributes = apply_attribute_defaults(name, explicit_attrs, dtd, source)?;
    let rest = scan::skip_whitespace(rest);

    if let Some(rest) = rest.strip_prefix("/>") {
        return Ok((
            Element {
                name: name.to_string(),
                attributes,
                children: Vec::new(),
            },
            rest,
        ));
    }

    let rest = scan::literal(rest, ">", source)?;
    let (children, rest) = parse_content(rest, dtd, resolver, base_uri, chain, source)?;
    let rest = scan::literal(rest, "</", source)?;
    let (end_name, rest) = scan::name(rest, source)?;
    if end_name != name {
        return Err(Error::wf(
            format!("end tag '</{}>' does not match start tag '<{}>'", end_name, name),
            source,
        ));
    }
    let rest = scan::skip_whitespace(rest);
    let rest = scan::literal(rest, ">", source)?;

    Ok((
        Element {
            name: name.to_string(),
            attributes,
            children,
        },
        rest,
    ))
}

/// `(S Attribute)*`. Returns the explicit attributes found in document
/// order, each already value-normalized (spec.md §4.C3).
fn parse_attributes<'i>(
    input: &'i str,
    element: &str,
    dtd: &Dtd,
    chain: &EntityChain,
    source: &str,
) -> Result<(Vec<(String, String)>, &'i str)> {
    let mut attrs = Vec::new();
    let mut rest = input;
    loop {
        let after_ws = scan::skip_whitespace(rest);
        if after_ws.is_empty() || after_ws.starts_with('/') || after_ws.starts_with('>') {
            rest = after_ws;
            break;
        }
        if after_ws.len() == rest.len() {
            return Err(Error::wf("expected whitespace before attribute", source));
        }
        let (name, after) = scan::name(after_ws, source)?;
        let after = scan::eq(after, source)?;
        let (literal, after) = scan::quoted(after, source)?;

        if attrs.iter().any(|(n, _): &(String, String)| n == name) {
            return Err(Error::wf(format!("duplicate attribute '{}'", name), source));
        }

        let is_cdata = dtd
            .attribute_decl(element, name)
            .map(|decl| !decl.att_type.is_tokenized())
            .unwrap_or(true);
        let value = normalize_attribute_value(literal, dtd, is_cdata, chain, source)?;
        attrs.push((name.to_string(), value));
        rest = after;
    }
    Ok((attrs, rest))
}

/// Enforces `#REQUIRED`/`#FIXED` and injects `#FIXED`/default-valued
/// attributes absent from the start tag (spec.md §4.C8 "Default-attribute
/// injection").
fn apply_attribute_defaults(
    element: &str,
    mut explicit: Vec<(String, String)>,
    dtd: &Dtd,
    source: &str,
) -> Result<Vec<(String, String)>> {
    let Some(declared) = dtd.attlists.get(element) else {
        return Ok(explicit);
    };
    for decl in declared {
        let attr_name = &decl.name;
        let present = explicit.iter().position(|(n, _)| n == attr_name);
        match (&decl.default, present) {
            (AttDefault::Required, None) => {
                return Err(Error::wf(
                    format!("missing required attribute '{}' on element '<{}>'", attr_name, element),
                    source,
                ))
            }
            (AttDefault::Fixed(fixed), Some(i)) => {
                if &explicit[i].1 != fixed {
                    return Err(Error::wf(
                        format!("attribute '{}' does not match its #FIXED value", attr_name),
                        source,
                    ));
                }
            }
            (AttDefault::Fixed(fixed), None) => explicit.push((attr_name.clone(), fixed.clone())),
            (AttDefault::Default(default), None) => explicit.push((attr_name.clone(), default.clone())),
            _ => {}
        }
    }
    Ok(explicit)
}

/// `content ::= CharData? ((element | Reference | CDSect | PI | Comment) CharData?)*`.
///
/// Always stops either at end-of-input or just before a top-level `</`,
/// leaving the caller to decide which is expected: an enclosing element
/// expects `</Name>` to follow; an entity's replacement text, parsed as a
/// nested content fragment, expects to be fully consumed (an unmatched
/// `</` there means the entity's replacement text isn't well-balanced).
pub fn parse_content<'i>(
    input: &'i str,
    dtd: &Dtd,
    resolver: &dyn ExternalResolver,
    base_uri: Option<&str>,
    chain: &EntityChain,
    source: &str,
) -> Result<(Vec<Content>, &'i str)> {
    let mut children = Vec::new();
    let mut rest = input;
    loop {
        if rest.is_empty() || rest.starts_with("</") {
            coalesce_text(&mut children);
            return Ok((children, rest));
        }
        if let Some(text_end) = rest.find(['<', '&']) {
            if text_end > 0 {
                push_text(&mut children, &rest[..text_end], source)?;
                rest = &rest[text_end..];
                continue;
            }
        } else {
            push_text(&mut children, rest, source)?;
            coalesce_text(&mut children);
            return Ok((children, ""));
        }

        if let Some(after) = rest.strip_prefix("<![CDATA[") {
            let end = after
                .find("]]>")
                .ok_or_else(|| Error::wf("unterminated CDATA section", source))?;
            scan::assert_chars(&after[..end], "CDATA section")?;
            children.push(Content::Text(after[..end].to_string()));
            rest = &after[end + 3..];
        } else if let Some(after) = rest.strip_prefix("<!--") {
            // Comments are well-formedness-checked but stripped from the
            // content list (spec.md §3 "Element" invariant).
            let (_, after) = parse_comment(after, source)?;
            rest = after;
        } else if let Some(after) = rest.strip_prefix("<?") {
            let (pi, after) = parse_pi(after, source)?;
            children.push(Content::ProcessingInstruction(pi));
            rest = after;
        } else if rest.starts_with('<') {
            let (element, after) = parse_element(rest, dtd, resolver, base_uri, chain, source)?;
            children.push(Content::Element(element));
            rest = after;
        } else if rest.starts_with("&#") {
            let (c, after) = parse_char_ref(rest, source)?;
            children.push(Content::Text(c.to_string()));
            rest = after;
        } else if rest.starts_with('&') {
            let end = rest
                .find(';')
                .ok_or_else(|| Error::wf("unterminated entity reference", source))?;
            let name = &rest[1..end];
            let entity_chain = chain.push(name)?;
            let entity = dtd
                .general_entities
                .get(name)
                .ok_or_else(|| Error::wf(format!("reference to undeclared entity '&{};'", name), source))?;
            if !entity.parsed {
                return Err(Error::wf(
                    format!("illegal reference to unparsed entity '&{};' in content", name),
                    source,
                ));
            }
            let expansion = entity.expansion_text.as_ref().ok_or_else(|| {
                Error::wf(
                    format!("reference to parsed external entity '&{};' which could not be fetched", name),
                    source,
                )
            })?;
            // A fetched external entity carries its own base URI so further
            // external references inside it resolve against its directory,
            // not the referencing document's (spec.md §4.C6).
            let entity_base_uri = entity.base_uri.as_deref().or(base_uri);
            let (nested, leftover) =
                parse_content(expansion, dtd, resolver, entity_base_uri, &entity_chain, source)?;
            if !leftover.is_empty() {
                return Err(Error::wf(
                    format!("replacement text of entity '{}' is not well-balanced", name),
                    source,
                ));
            }
            children.extend(nested);
            rest = &rest[end + 1..];
        } else {
            return Err(Error::wf("unexpected content", source));
        }
    }
}

fn push_text(children: &mut Vec<Content>, text: &str, source: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    if text.contains("]]>") {
        return Err(Error::wf("literal ']]>' is not allowed in character data", source));
    }
    scan::assert_chars(text, "character data")?;
    match children.last_mut() {
        Some(Content::Text(existing)) => existing.push_str(text),
        _ => children.push(Content::Text(text.to_string())),
    }
    Ok(())
}

/// Merges adjacent `Content::Text` nodes that originated from distinct
/// CDATA sections or reference expansions, so canonical output (spec.md
/// §6) sees one text run rather than several.
pub fn coalesce_text(children: &mut Vec<Content>) {
    let mut merged: Vec<Content> = Vec::with_capacity(children.len());
    for child in children.drain(..) {
        match (merged.last_mut(), child) {
            (Some(Content::Text(existing)), Content::Text(next)) => existing.push_str(&next),
            (_, other) => merged.push(other),
        }
    }
    *children = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::FileResolver;

    #[test]
    fn parses_empty_element() {
        let dtd = Dtd::new();
        let resolver = FileResolver;
        let chain = EntityChain::default();
        let (el, rest) = parse_element("<br/>rest", &dtd, &resolver, None, &chain, "").unwrap();
        assert_eq!(el.name, "br");
        assert!(el.children.is_empty());
        assert_eq!(rest, "rest");
    }

    #[test]
    fn parses_element_with_attributes_and_text() {
        let dtd = Dtd::new();
        let resolver = FileResolver;
        let chain = EntityChain::default();
        let (el, rest) =
            parse_element("<p id=\"a\">hello</p>rest", &dtd, &resolver, None, &chain, "").unwrap();
        assert_eq!(el.name, "p");
        assert_eq!(el.attributes, vec![("id".to_string(), "a".to_string())]);
        assert_eq!(el.children, vec![Content::Text("hello".to_string())]);
        assert_eq!(rest, "rest");
    }

    #[test]
    fn rejects_mismatched_end_tag() {
        let dtd = Dtd::new();
        let resolver = FileResolver;
        let chain = EntityChain::default();
        assert!(parse_element("<p>hi</q>", &dtd, &resolver, None, &chain, "").is_err());
    }

    #[test]
    fn rejects_duplicate_attribute() {
        let dtd = Dtd::new();
        let resolver = FileResolver;
        let chain = EntityChain::default();
        assert!(parse_element("<p a=\"1\" a=\"2\"/>", &dtd, &resolver, None, &chain, "").is_err());
    }

    #[test]
    fn expands_predefined_entity_in_content() {
        let dtd = Dtd::new();
        let resolver = FileResolver;
        let chain = EntityChain::default();
        let (el, _) = parse_element("<p>a &amp; b</p>", &dtd, &resolver, None, &chain, "").unwrap();
        assert_eq!(el.children, vec![Content::Text("a & b".to_string())]);
    }

    #[test]
    fn parses_nested_elements() {
        let dtd = Dtd::new();
        let resolver = FileResolver;
        let chain = EntityChain::default();
        let (el, _) = parse_element("<a><b/><c/></a>", &dtd, &resolver, None, &chain, "").unwrap();
        assert_eq!(el.children.len(), 2);
    }

    #[test]
    fn rejects_bare_cdata_terminator_in_text() {
        let dtd = Dtd::new();
        let resolver = FileResolver;
        let chain = EntityChain::default();
        assert!(parse_element("<p>a]]>b</p>", &dtd, &resolver, None, &chain, "").is_err());
    }
}
