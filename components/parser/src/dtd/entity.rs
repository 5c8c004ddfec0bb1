//! `EntityDecl` reader (spec.md §4.C6). Grounded in
//! `original_source/xml_parser/dtd/Entity.py`.

use log::warn;

use crate::dtd::{Dtd, EntityChain};
use crate::error::{Error, Result};
use crate::reference::normalize_entity_value;
use crate::resolve::{fetch_external, ExternalResolver};
use crate::scan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    General,
    Parameter,
}

/// A declared general or parameter entity (spec.md §3 "Entity").
///
/// `expansion_text` is `None` only for an unparsed entity, or a parsed
/// external entity whose body could not be fetched (spec.md §4.C6
/// "Fetch failure"); any later reference to such an entity is a
/// well-formedness error, not a silent empty expansion.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    pub parsed: bool,
    pub expansion_text: Option<String>,
    pub system_id: Option<String>,
    pub public_id: Option<String>,
    pub notation: Option<String>,
    /// Base directory a fetched external entity's body should resolve any
    /// further relative references against (spec.md §4.C6 "keep the new
    /// encoding and base directory so nested external references resolve
    /// correctly"). `None` for internal entities and for unparsed entities.
    pub base_uri: Option<String>,
}

/// Parses one `<!ENTITY …>` declaration, starting just after `<!ENTITY`,
/// eagerly fetching and normalizing its expansion text, and returns the
/// remaining input.
///
/// `EntityDecl ::= '<!ENTITY' S (GEDecl | PEDecl) S? '>'`. Grounded in
/// `Entity.py::EntityFactory.parse_from_xml`.
pub fn parse_entity_decl<'i>(
    input: &'i str,
    dtd: &Dtd,
    resolver: &dyn ExternalResolver,
    base_uri: Option<&str>,
    chain: &EntityChain,
    source: &str,
) -> Result<(Entity, &'i str)> {
    let rest = scan::whitespace(input, source)?;
    let (kind, rest) = if let Some(r) = rest.strip_prefix('%') {
        (EntityKind::Parameter, scan::whitespace(r, source)?)
    } else {
        (EntityKind::General, rest)
    };
    let (name, rest) = scan::name(rest, source)?;
    let rest = scan::whitespace(rest, source)?;

    let (entity, rest) = if rest.starts_with('\'') || rest.starts_with('"') {
        let (literal, rest) = scan::quoted(rest, source)?;
        let expansion = normalize_entity_value(literal, dtd, false, chain, source)?;
        (
            Entity {
                name: name.to_string(),
                kind,
                parsed: true,
                expansion_text: Some(expansion),
                system_id: None,
                public_id: None,
                notation: None,
                base_uri: None,
            },
            rest,
        )
    } else {
        let (public_id, system_id, rest) = parse_external_id(rest, source)?;
        let rest = scan::skip_whitespace(rest);
        let (notation, rest) = if kind == EntityKind::General && rest.starts_with("NDATA") {
            let rest = scan::literal(rest, "NDATA", source)?;
            let rest = scan::whitespace(rest, source)?;
            let (ndata_name, rest) = scan::name(rest, source)?;
            (Some(ndata_name.to_string()), rest)
        } else {
            (None, rest)
        };

        let parsed = notation.is_none();
        let (expansion_text, fetched_base_uri) = if parsed {
            match fetch_external(resolver, public_id.as_deref(), &system_id, base_uri) {
                Ok(fetched) => (Some(fetched.text), fetched.base_uri),
                Err(e) => {
                    warn!("could not fetch external entity '{}': {}", name, e);
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        (
            Entity {
                name: name.to_string(),
                kind,
                parsed,
                expansion_text,
                system_id: Some(system_id),
                public_id,
                notation,
                base_uri: fetched_base_uri,
            },
            rest,
        )
    };

    let rest = scan::skip_whitespace(rest);
    let rest = scan::literal(rest, ">", source)?;
    Ok((entity, rest))
}

/// `ExternalID ::= 'SYSTEM' S SystemLiteral | 'PUBLIC' S PubidLiteral S SystemLiteral`.
/// Grounded in `DTD.py::parse_external_id`.
pub fn parse_external_id<'i>(input: &'i str, source: &str) -> Result<(Option<String>, String, &'i str)> {
    if let Some(rest) = input.strip_prefix("SYSTEM") {
        let rest = scan::whitespace(rest, source)?;
        let (system_id, rest) = scan::quoted(rest, source)?;
        Ok((None, system_id.to_string(), rest))
    } else if let Some(rest) = input.strip_prefix("PUBLIC") {
        let rest = scan::whitespace(rest, source)?;
        let (public_id, rest) = scan::quoted(rest, source)?;
        scan::assert_chars(public_id, "public identifier")?;
        for c in public_id.chars() {
            if !xrs_chars::XmlChar::is_xml_pubid_char(c) {
                return Err(Error::disallowed_char(public_id, "public identifier", "Pubid"));
            }
        }
        let rest = scan::whitespace(rest, source)?;
        let (system_id, rest) = scan::quoted(rest, source)?;
        Ok((Some(public_id.to_string()), system_id.to_string(), rest))
    } else {
        Err(Error::wf("expected 'SYSTEM' or 'PUBLIC'", source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::FileResolver;

    #[test]
    fn parses_internal_general_entity() {
        let dtd = Dtd::new();
        let resolver = FileResolver;
        let chain = EntityChain::default();
        let (entity, rest) =
            parse_entity_decl(" foo \"bar\">rest", &dtd, &resolver, None, &chain, "").unwrap();
        assert_eq!(entity.name, "foo");
        assert_eq!(entity.kind, EntityKind::General);
        assert_eq!(entity.expansion_text.as_deref(), Some("bar"));
        assert_eq!(rest, "rest");
    }

    #[test]
    fn parses_parameter_entity() {
        let dtd = Dtd::new();
        let resolver = FileResolver;
        let chain = EntityChain::default();
        let (entity, _) = parse_entity_decl(" % foo \"bar\">", &dtd, &resolver, None, &chain, "").unwrap();
        assert_eq!(entity.kind, EntityKind::Parameter);
    }

    #[test]
    fn parses_unparsed_entity_with_ndata() {
        let dtd = Dtd::new();
        let resolver = FileResolver;
        let chain = EntityChain::default();
        let (entity, _) = parse_entity_decl(
            " img SYSTEM \"img.gif\" NDATA gif>",
            &dtd,
            &resolver,
            None,
            &chain,
            "",
        )
        .unwrap();
        assert!(!entity.parsed);
        assert_eq!(entity.notation.as_deref(), Some("gif"));
        assert!(entity.expansion_text.is_none());
    }
}
