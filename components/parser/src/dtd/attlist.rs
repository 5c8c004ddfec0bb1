//! `AttlistDecl` reader (spec.md §4.C8). Grounded in
//! `original_source/xml_parser/dtd/AttListDeclaration.py`.

use crate::dtd::{expand_declaration_body, Dtd, EntityChain};
use crate::error::{Error, Result};
use crate::reference::normalize_attribute_value;
use crate::scan;

#[derive(Debug, Clone, PartialEq)]
pub enum AttType {
    Cdata,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Notation(Vec<String>),
    Enumeration(Vec<String>),
}

impl AttType {
    /// True for every type except `CDATA` (spec.md §4.C3 "tokenized types
    /// are whitespace-collapsed").
    pub fn is_tokenized(&self) -> bool {
        !matches!(self, AttType::Cdata)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttDefault {
    Required,
    Implied,
    /// `#FIXED` with its (already-normalized) literal value.
    Fixed(String),
    /// A literal default value (already normalized).
    Default(String),
}

#[derive(Debug, Clone)]
pub struct AttributeDeclaration {
    pub name: String,
    pub att_type: AttType,
    pub default: AttDefault,
}

/// Parses one `<!ATTLIST …>` declaration, starting just after `<!ATTLIST`,
/// returning the owning element's name and its attribute declarations.
///
/// `AttlistDecl ::= '<!ATTLIST' S Name AttDef* S? '>'`. Grounded in
/// `AttListDeclaration.py::parse_from_xml`.
pub fn parse_attlist_decl<'i>(
    input: &'i str,
    dtd: &Dtd,
    chain: &EntityChain,
    external: bool,
    source: &str,
) -> Result<(String, Vec<AttributeDeclaration>, &'i str)> {
    let rest = scan::whitespace(input, source)?;
    let (element, rest) = scan::name(rest, source)?;
    let (body, rest) = expand_declaration_body(rest, dtd, chain, external, source)?;

    let mut attributes = Vec::new();
    let mut cursor = body.as_str();
    while let (Some(attr), after) = parse_att_def(cursor, dtd, chain, source)? {
        attributes.push(attr);
        cursor = after;
    }

    Ok((element.to_string(), attributes, rest))
}

/// `AttDef ::= S Name S AttType S DefaultDecl`. Returns `None` if nothing
/// but trailing whitespace remains (end of the AttDef* list).
fn parse_att_def<'i>(
    input: &'i str,
    dtd: &Dtd,
    chain: &EntityChain,
    source: &str,
) -> Result<(Option<AttributeDeclaration>, &'i str)> {
    let rest = scan::skip_whitespace(input);
    if rest.is_empty() {
        return Ok((None, rest));
    }
    let (name, rest) = scan::name(rest, source)?;
    let rest = scan::whitespace(rest, source)?;
    let (att_type, rest) = parse_att_type(rest, source)?;
    let rest = scan::whitespace(rest, source)?;
    let (default, rest) = parse_default_decl(rest, &att_type, dtd, chain, source)?;
    Ok((
        Some(AttributeDeclaration {
            name: name.to_string(),
            att_type,
            default,
        }),
        rest,
    ))
}

fn parse_att_type<'i>(input: &'i str, source: &str) -> Result<(AttType, &'i str)> {
    for (keyword, ty) in [
        ("CDATA", AttType::Cdata),
        ("IDREFS", AttType::IdRefs),
        ("IDREF", AttType::IdRef),
        ("ID", AttType::Id),
        ("ENTITIES", AttType::Entities),
        ("ENTITY", AttType::Entity),
        ("NMTOKENS", AttType::NmTokens),
        ("NMTOKEN", AttType::NmToken),
    ] {
        if let Some(rest) = input.strip_prefix(keyword) {
            return Ok((ty, rest));
        }
    }
    if let Some(rest) = input.strip_prefix("NOTATION") {
        let rest = scan::whitespace(rest, source)?;
        let (names, rest) = parse_name_group(rest, source)?;
        return Ok((AttType::Notation(names), rest));
    }
    if input.starts_with('(') {
        let (names, rest) = parse_nmtoken_group(input, source)?;
        return Ok((AttType::Enumeration(names), rest));
    }
    Err(Error::wf("expected an attribute type", source))
}

fn parse_name_group<'i>(input: &'i str, source: &str) -> Result<(Vec<String>, &'i str)> {
    let rest = scan::literal(input, "(", source)?;
    let mut rest = scan::skip_whitespace(rest);
    let mut names = Vec::new();
    loop {
        let (name, after) = scan::name(rest, source)?;
        names.push(name.to_string());
        rest = scan::skip_whitespace(after);
        if let Some(after) = rest.strip_prefix('|') {
            rest = scan::skip_whitespace(after);
        } else {
            break;
        }
    }
    let rest = scan::literal(rest, ")", source)?;
    Ok((names, rest))
}

fn parse_nmtoken_group<'i>(input: &'i str, source: &str) -> Result<(Vec<String>, &'i str)> {
    let rest = scan::literal(input, "(", source)?;
    let mut rest = scan::skip_whitespace(rest);
    let mut names = Vec::new();
    loop {
        let (name, after) = scan::nmtoken(rest, source)?;
        names.push(name.to_string());
        rest = scan::skip_whitespace(after);
        if let Some(after) = rest.strip_prefix('|') {
            rest = scan::skip_whitespace(after);
        } else {
            break;
        }
    }
    let rest = scan::literal(rest, ")", source)?;
    Ok((names, rest))
}

fn parse_default_decl<'i>(
    input: &'i str,
    att_type: &AttType,
    dtd: &Dtd,
    chain: &EntityChain,
    source: &str,
) -> Result<(AttDefault, &'i str)> {
    if let Some(rest) = input.strip_prefix("#REQUIRED") {
        return Ok((AttDefault::Required, rest));
    }
    if let Some(rest) = input.strip_prefix("#IMPLIED") {
        return Ok((AttDefault::Implied, rest));
    }
    let (fixed, rest) = if let Some(rest) = input.strip_prefix("#FIXED") {
        (true, scan::whitespace(rest, source)?)
    } else {
        (false, input)
    };
    let (literal, rest) = scan::quoted(rest, source)?;
    let is_cdata = matches!(att_type, AttType::Cdata);
    let normalized = normalize_attribute_value(literal, dtd, is_cdata, chain, source)?;
    Ok((
        if fixed {
            AttDefault::Fixed(normalized)
        } else {
            AttDefault::Default(normalized)
        },
        rest,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cdata_required() {
        let dtd = Dtd::new();
        let chain = EntityChain::default();
        let (element, attrs, rest) =
            parse_attlist_decl(" person id CDATA #REQUIRED>rest", &dtd, &chain, false, "").unwrap();
        assert_eq!(element, "person");
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].att_type, AttType::Cdata);
        assert_eq!(attrs[0].default, AttDefault::Required);
        assert_eq!(rest, "rest");
    }

    #[test]
    fn parses_enumeration_with_default() {
        let dtd = Dtd::new();
        let chain = EntityChain::default();
        let (_, attrs, _) =
            parse_attlist_decl(" x color (red|green|blue) \"red\">", &dtd, &chain, false, "").unwrap();
        assert_eq!(
            attrs[0].att_type,
            AttType::Enumeration(vec!["red".into(), "green".into(), "blue".into()])
        );
        assert_eq!(attrs[0].default, AttDefault::Default("red".into()));
    }

    #[test]
    fn parses_multiple_attdefs() {
        let dtd = Dtd::new();
        let chain = EntityChain::default();
        let (_, attrs, _) = parse_attlist_decl(
            " x a CDATA #IMPLIED b ID #REQUIRED>",
            &dtd,
            &chain,
            false,
            "",
        )
        .unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1].att_type, AttType::Id);
    }
}
