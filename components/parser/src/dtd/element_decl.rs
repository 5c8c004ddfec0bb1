//! `ElementDecl` reader (spec.md §4.C9). The content model is parsed into
//! an algebraic `Particle`/`ContentModel` tree — design note §9's explicit
//! REDESIGN away from the original's regex-string encoding (see
//! `original_source/xml_parser/dtd/ElementDeclaration.py`, which stores the
//! content spec as a compiled regular expression) — so later content
//! validation can walk structure instead of re-deriving it from a pattern.

use crate::dtd::{expand_declaration_body, Dtd, EntityChain};
use crate::error::{Error, Result};
use crate::scan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

/// One content-particle in a `children` content model (spec.md §3
/// "Particle").
#[derive(Debug, Clone, PartialEq)]
pub enum Particle {
    Name(String, Cardinality),
    Seq(Vec<Particle>, Cardinality),
    Choice(Vec<Particle>, Cardinality),
}

/// An element's declared content model (spec.md §3 "ContentModel").
#[derive(Debug, Clone, PartialEq)]
pub enum ContentModel {
    Empty,
    Any,
    /// `Mixed`: `#PCDATA` optionally interleaved with any of the named
    /// children, in any order, any number of times. An empty `Vec` means
    /// `(#PCDATA)` with no children allowed at all.
    Mixed(Vec<String>),
    Children(Particle),
}

#[derive(Debug, Clone)]
pub struct ElementDeclaration {
    pub name: String,
    pub content_model: ContentModel,
}

/// Parses one `<!ELEMENT …>` declaration, starting just after `<!ELEMENT`.
/// `elementdecl ::= '<!ELEMENT' S Name S contentspec S? '>'`.
pub fn parse_element_decl<'i>(
    input: &'i str,
    dtd: &Dtd,
    chain: &EntityChain,
    external: bool,
    source: &str,
) -> Result<(ElementDeclaration, &'i str)> {
    let rest = scan::whitespace(input, source)?;
    let (name, rest) = scan::name(rest, source)?;
    let (body, rest) = expand_declaration_body(rest, dtd, chain, external, source)?;
    let body = scan::skip_whitespace(body.trim_end());

    let content_model = if let Some(after) = body.strip_prefix("EMPTY") {
        ensure_exhausted(after, source)?;
        ContentModel::Empty
    } else if let Some(after) = body.strip_prefix("ANY") {
        ensure_exhausted(after, source)?;
        ContentModel::Any
    } else if scan::skip_whitespace(body.strip_prefix('(').unwrap_or(body)).starts_with("#PCDATA") {
        let (names, after) = parse_mixed(body, source)?;
        ensure_exhausted(after, source)?;
        ContentModel::Mixed(names)
    } else {
        let (particle, after) = parse_children(body, source)?;
        ensure_exhausted(after, source)?;
        ContentModel::Children(particle)
    };

    Ok((
        ElementDeclaration {
            name: name.to_string(),
            content_model,
        },
        rest,
    ))
}

fn ensure_exhausted(rest: &str, source: &str) -> Result<()> {
    if scan::skip_whitespace(rest).is_empty() {
        Ok(())
    } else {
        Err(Error::wf("unexpected trailing content in contentspec", source))
    }
}

/// `Mixed ::= '(' S? '#PCDATA' (S? '|' S? Name)* S? ')*' | '(' S? '#PCDATA' S? ')'`
fn parse_mixed<'i>(input: &'i str, source: &str) -> Result<(Vec<String>, &'i str)> {
    let rest = scan::literal(input, "(", source)?;
    let rest = scan::skip_whitespace(rest);
    let rest = scan::literal(rest, "#PCDATA", source)?;
    let mut rest = scan::skip_whitespace(rest);
    let mut names = Vec::new();
    while let Some(after) = rest.strip_prefix('|') {
        let after = scan::skip_whitespace(after);
        let (name, after) = scan::name(after, source)?;
        names.push(name.to_string());
        rest = scan::skip_whitespace(after);
    }
    let rest = scan::literal(rest, ")", source)?;
    if names.is_empty() {
        let rest = rest.strip_prefix('*').unwrap_or(rest);
        Ok((names, rest))
    } else {
        let rest = scan::literal(rest, "*", source)?;
        let mut seen = Vec::with_capacity(names.len());
        for name in &names {
            if seen.contains(name) {
                return Err(Error::wf(
                    format!("mixed-content declaration lists '{}' more than once", name),
                    source,
                ));
            }
            seen.push(name.clone());
        }
        Ok((names, rest))
    }
}

/// `children ::= (choice | seq) ('?' | '*' | '+')?`
fn parse_children<'i>(input: &'i str, source: &str) -> Result<(Particle, &'i str)> {
    parse_cp(input, source)
}

/// `cp ::= (Name | choice | seq) ('?' | '*' | '+')?`
fn parse_cp<'i>(input: &'i str, source: &str) -> Result<(Particle, &'i str)> {
    if input.starts_with('(') {
        parse_group(input, source)
    } else {
        let (name, rest) = scan::name(input, source)?;
        let (cardinality, rest) = parse_cardinality(rest);
        Ok((Particle::Name(name.to_string(), cardinality), rest))
    }
}

fn parse_cardinality(input: &str) -> (Cardinality, &str) {
    match input.chars().next() {
        Some('?') => (Cardinality::Optional, &input[1..]),
        Some('*') => (Cardinality::ZeroOrMore, &input[1..]),
        Some('+') => (Cardinality::OneOrMore, &input[1..]),
        _ => (Cardinality::One, input),
    }
}

/// A parenthesized group is a `choice` if it contains any top-level `|`,
/// a `seq` if any top-level `,`, or a singleton `seq` of one member
/// (equivalent either way, represented as `Seq`).
fn parse_group<'i>(input: &'i str, source: &str) -> Result<(Particle, &'i str)> {
    let rest = scan::literal(input, "(", source)?;
    let rest = scan::skip_whitespace(rest);
    let (first, rest) = parse_cp(rest, source)?;
    let mut members = vec![first];
    let mut rest = scan::skip_whitespace(rest);

    let mut separator = None;
    loop {
        let sep = match rest.chars().next() {
            Some(c @ ('|' | ',')) => c,
            _ => break,
        };
        if let Some(expected) = separator {
            if sep != expected {
                return Err(Error::wf("mixed '|' and ',' in the same content-model group", source));
            }
        } else {
            separator = Some(sep);
        }
        let after = scan::skip_whitespace(&rest[1..]);
        let (member, after) = parse_cp(after, source)?;
        members.push(member);
        rest = scan::skip_whitespace(after);
    }
    let rest = scan::literal(rest, ")", source)?;
    let (cardinality, rest) = parse_cardinality(rest);

    let particle = if separator == Some('|') {
        Particle::Choice(members, cardinality)
    } else {
        Particle::Seq(members, cardinality)
    };
    Ok((particle, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dtd() -> Dtd {
        Dtd::new()
    }

    #[test]
    fn parses_empty_and_any() {
        let d = dtd();
        let chain = EntityChain::default();
        let (decl, _) = parse_element_decl(" br EMPTY>", &d, &chain, false, "").unwrap();
        assert_eq!(decl.content_model, ContentModel::Empty);
        let (decl, _) = parse_element_decl(" div ANY>", &d, &chain, false, "").unwrap();
        assert_eq!(decl.content_model, ContentModel::Any);
    }

    #[test]
    fn parses_mixed_with_children() {
        let d = dtd();
        let chain = EntityChain::default();
        let (decl, rest) =
            parse_element_decl(" p (#PCDATA|b|i)*>rest", &d, &chain, false, "").unwrap();
        assert_eq!(
            decl.content_model,
            ContentModel::Mixed(vec!["b".into(), "i".into()])
        );
        assert_eq!(rest, "rest");
    }

    #[test]
    fn parses_pcdata_only() {
        let d = dtd();
        let chain = EntityChain::default();
        let (decl, _) = parse_element_decl(" p (#PCDATA)>", &d, &chain, false, "").unwrap();
        assert_eq!(decl.content_model, ContentModel::Mixed(vec![]));
    }

    #[test]
    fn parses_pcdata_only_with_trailing_star() {
        let d = dtd();
        let chain = EntityChain::default();
        let (decl, rest) = parse_element_decl(" p (#PCDATA)*>rest", &d, &chain, false, "").unwrap();
        assert_eq!(decl.content_model, ContentModel::Mixed(vec![]));
        assert_eq!(rest, "rest");
    }

    #[test]
    fn parses_mixed_with_whitespace_around_pcdata() {
        let d = dtd();
        let chain = EntityChain::default();
        let (decl, _) = parse_element_decl(" p ( #PCDATA )>", &d, &chain, false, "").unwrap();
        assert_eq!(decl.content_model, ContentModel::Mixed(vec![]));
        let (decl, _) = parse_element_decl(" p ( #PCDATA | a)*>", &d, &chain, false, "").unwrap();
        assert_eq!(decl.content_model, ContentModel::Mixed(vec!["a".into()]));
    }

    #[test]
    fn parses_nested_children_model() {
        let d = dtd();
        let chain = EntityChain::default();
        let (decl, _) =
            parse_element_decl(" spec (front, body, back?)>", &d, &chain, false, "").unwrap();
        match decl.content_model {
            ContentModel::Children(Particle::Seq(members, Cardinality::One)) => {
                assert_eq!(members.len(), 3);
                assert_eq!(members[0], Particle::Name("front".into(), Cardinality::One));
                assert_eq!(members[2], Particle::Name("back".into(), Cardinality::Optional));
            }
            other => panic!("unexpected content model: {:?}", other),
        }
    }

    #[test]
    fn rejects_mixed_separators() {
        let d = dtd();
        let chain = EntityChain::default();
        assert!(parse_element_decl(" x (a, b | c)>", &d, &chain, false, "").is_err());
    }

    #[test]
    fn rejects_duplicate_name_in_mixed_content() {
        let d = dtd();
        let chain = EntityChain::default();
        assert!(parse_element_decl(" p (#PCDATA|b|b)*>", &d, &chain, false, "").is_err());
    }
}
