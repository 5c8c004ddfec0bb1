//! `NotationDecl` reader (spec.md §4.C7). Grounded in
//! `original_source/xml_parser/dtd/Notation.py`.

use crate::dtd::entity::parse_external_id;
use crate::error::Result;
use crate::scan;

/// A declared notation (spec.md §3 "Notation"): either an `ExternalID` or a
/// `PUBLIC` identifier with no system literal.
#[derive(Debug, Clone)]
pub struct Notation {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

/// Parses one `<!NOTATION …>` declaration, starting just after
/// `<!NOTATION`. `NotationDecl ::= '<!NOTATION' S Name S (ExternalID |
/// PublicID) S? '>'`.
pub fn parse_notation_decl<'i>(input: &'i str, source: &str) -> Result<(Notation, &'i str)> {
    let rest = scan::whitespace(input, source)?;
    let (name, rest) = scan::name(rest, source)?;
    let rest = scan::whitespace(rest, source)?;

    let (public_id, system_id, rest) = if rest.starts_with("PUBLIC") {
        let rest = scan::literal(rest, "PUBLIC", source)?;
        let rest = scan::whitespace(rest, source)?;
        let (public_id, rest) = scan::quoted(rest, source)?;
        let saved = rest;
        let after_ws = scan::skip_whitespace(rest);
        if after_ws.starts_with('\'') || after_ws.starts_with('"') {
            let (system_id, rest) = scan::quoted(after_ws, source)?;
            (Some(public_id.to_string()), Some(system_id.to_string()), rest)
        } else {
            (Some(public_id.to_string()), None, saved)
        }
    } else {
        let (public_id, system_id, rest) = parse_external_id(rest, source)?;
        (public_id, Some(system_id), rest)
    };

    let rest = scan::skip_whitespace(rest);
    let rest = scan::literal(rest, ">", source)?;
    Ok((
        Notation {
            name: name.to_string(),
            public_id,
            system_id,
        },
        rest,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_system_notation() {
        let (n, rest) = parse_notation_decl(" gif SYSTEM \"gif-viewer\">rest", "").unwrap();
        assert_eq!(n.name, "gif");
        assert_eq!(n.system_id.as_deref(), Some("gif-viewer"));
        assert_eq!(rest, "rest");
    }

    #[test]
    fn parses_public_only_notation() {
        let (n, _) = parse_notation_decl(" gif PUBLIC \"-//ACME//GIF//EN\">", "").unwrap();
        assert_eq!(n.public_id.as_deref(), Some("-//ACME//GIF//EN"));
        assert_eq!(n.system_id, None);
    }

    #[test]
    fn parses_public_with_system_notation() {
        let (n, _) = parse_notation_decl(" gif PUBLIC \"-//ACME//GIF//EN\" \"gif.dtd\">", "").unwrap();
        assert_eq!(n.system_id.as_deref(), Some("gif.dtd"));
    }
}
