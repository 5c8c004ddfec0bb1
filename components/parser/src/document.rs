//! Data model (spec.md §3) and the document driver (spec.md §4.C12).
//! Grounded in `original_source/xml_parser/Document.py` for the driver's
//! step order and in `original_source/xml_parser/content/Element.py` for
//! the tree shape.

use std::collections::HashMap;
use std::rc::Rc;

use crate::dtd::{parse_external_id, parse_subset_into_dtd, Dtd, Entity, EntityChain, Notation};
use crate::error::{Error, Result};
use crate::markup::{parse_comment, parse_pi};
use crate::resolve::{canonicalize_line_endings, fetch_external, ExternalResolver};
use crate::scan;

/// A fully parsed XML document (spec.md §3 "Document").
#[derive(Debug, Clone)]
pub struct Document {
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
    pub doctype: Option<DoctypeInfo>,
    pub leading_pis: Vec<ProcessingInstruction>,
    pub root: Element,
    pub trailing_pis: Vec<ProcessingInstruction>,
    /// The general entities declared (or predefined) by the time parsing
    /// finished, keyed by name.
    pub entities: HashMap<String, Rc<Entity>>,
    pub notations: HashMap<String, Rc<Notation>>,
}

/// The `<!DOCTYPE …>` declaration's own identity, separate from the
/// declarations it introduces into the `Dtd` store.
#[derive(Debug, Clone, PartialEq)]
pub struct DoctypeInfo {
    pub name: String,
    pub system_id: Option<String>,
    pub public_id: Option<String>,
}

/// One element, with its attributes in document order and its content in
/// document order (spec.md §3 "Element"). Comments are well-formedness-
/// checked but never appear here.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Content>,
}

/// One node of an element's content (spec.md §3 "Content"). Adjacent
/// `Text` nodes never occur; `content::coalesce_text` enforces that.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Element(Element),
    Text(String),
    ProcessingInstruction(ProcessingInstruction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingInstruction {
    pub target: String,
    pub data: Option<String>,
}

/// Parses a complete document from `input`, which has already been decoded
/// to `str` (by `decode_document_bytes` for byte input, or taken as-is for
/// `parse_str`). `source` is the raw text used for error excerpts; `base_uri`
/// anchors relative external references.
///
/// Driver order (spec.md §4.C12): canonicalize line endings once, up front,
/// before anything else is located — including the XML declaration, per
/// design note §9's "applies uniformly" requirement — then: optional XML
/// declaration, leading misc, optional DOCTYPE (internal subset, then
/// external subset), more misc, exactly one root element, trailing misc,
/// and a final check that nothing but whitespace, already consumed by the
/// trailing misc pass, remains.
pub fn parse_document(input: &str, resolver: &dyn ExternalResolver, base_uri: Option<&str>) -> Result<Document> {
    let canonical = canonicalize_line_endings(input);
    let source: &str = &canonical;

    let mut rest: &str = &canonical;
    let (version, encoding, standalone) = if rest.starts_with("<?xml")
        && rest[5..].starts_with(|c: char| c.is_ascii_whitespace() || c == '?')
    {
        let (version, encoding, standalone, after) = parse_xml_decl(rest, source)?;
        rest = after;
        (version, encoding, standalone)
    } else {
        (None, None, None)
    };

    let mut leading_pis = Vec::new();
    rest = parse_misc(rest, &mut leading_pis, source)?;

    let mut dtd = Dtd::new();
    let chain = EntityChain::default();
    let doctype = if rest.starts_with("<!DOCTYPE") {
        let (info, after) = parse_doctype(rest, &mut dtd, resolver, base_uri, &chain, source)?;
        rest = after;
        Some(info)
    } else {
        None
    };

    rest = parse_misc(rest, &mut leading_pis, source)?;

    if !rest.starts_with('<') {
        return Err(Error::wf("expected the root element", source));
    }
    let (root, after_root) = crate::content::parse_element(rest, &dtd, resolver, base_uri, &chain, source)?;
    rest = after_root;

    let mut trailing_pis = Vec::new();
    rest = parse_misc(rest, &mut trailing_pis, source)?;

    if !rest.is_empty() {
        return Err(Error::wf("content found after the root element", source));
    }

    Ok(Document {
        version,
        encoding,
        standalone,
        doctype,
        leading_pis,
        root,
        trailing_pis,
        entities: dtd.general_entities,
        notations: dtd.notations,
    })
}

/// `XMLDecl ::= '<?xml' VersionInfo EncodingDecl? SDDecl? S? '?>'`. Only
/// legal at byte offset zero, which the caller has already checked.
fn parse_xml_decl<'i>(
    input: &'i str,
    source: &str,
) -> Result<(Option<String>, Option<String>, Option<bool>, &'i str)> {
    let rest = scan::literal(input, "<?xml", source)?;
    let rest = scan::whitespace(rest, source)?;
    let rest = scan::literal(rest, "version", source)?;
    let rest = scan::eq(rest, source)?;
    let (version, rest) = scan::quoted(rest, source)?;
    let version_num = version.strip_prefix("1.").filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
    if version_num.is_none() {
        return Err(Error::wf(
            format!("unsupported XML version '{}': only 1.x is supported", version),
            source,
        ));
    }

    let (encoding, rest) = match scan::whitespace(rest, source) {
        Ok(after_ws) if after_ws.starts_with("encoding") => {
            let after = after_ws.strip_prefix("encoding").unwrap();
            let after = scan::eq(after, source)?;
            let (enc, after) = scan::quoted(after, source)?;
            (Some(enc.to_string()), after)
        }
        _ => (None, rest),
    };

    let (standalone, rest) = match scan::whitespace(rest, source) {
        Ok(after_ws) if after_ws.starts_with("standalone") => {
            let after = after_ws.strip_prefix("standalone").unwrap();
            let after = scan::eq(after, source)?;
            let (sd, after) = scan::quoted(after, source)?;
            let sd = match sd {
                "yes" => true,
                "no" => false,
                other => return Err(Error::wf(format!("standalone must be 'yes' or 'no', found '{}'", other), source)),
            };
            (Some(sd), after)
        }
        _ => (None, rest),
    };

    let rest = scan::skip_whitespace(rest);
    let rest = scan::literal(rest, "?>", source)?;
    Ok((Some(version.to_string()), encoding, standalone, rest))
}

/// `Misc ::= Comment | PI | S`, repeated. Collects PIs into `pis`.
fn parse_misc<'i>(mut input: &'i str, pis: &mut Vec<ProcessingInstruction>, source: &str) -> Result<&'i str> {
    loop {
        input = scan::skip_whitespace(input);
        if let Some(after) = input.strip_prefix("<!--") {
            let (_, after) = parse_comment(after, source)?;
            input = after;
        } else if let Some(after) = input.strip_prefix("<?") {
            let (pi, after) = parse_pi(after, source)?;
            pis.push(pi);
            input = after;
        } else {
            return Ok(input);
        }
    }
}

/// `doctypedecl ::= '<!DOCTYPE' S Name (S ExternalID)? S? ('[' intSubset ']' S?)? '>'`.
/// Internal subset (if any) is parsed first; the external subset (if any) is
/// fetched and parsed after, per `original_source/xml_parser/dtd/DTD.py::parse_from_xml`.
fn parse_doctype<'i>(
    input: &'i str,
    dtd: &mut Dtd,
    resolver: &dyn ExternalResolver,
    base_uri: Option<&str>,
    chain: &EntityChain,
    source: &str,
) -> Result<(DoctypeInfo, &'i str)> {
    let rest = scan::literal(input, "<!DOCTYPE", source)?;
    let rest = scan::whitespace(rest, source)?;
    let (name, rest) = scan::name(rest, source)?;
    let rest = scan::skip_whitespace(rest);

    let (public_id, system_id, rest) = if rest.starts_with("SYSTEM") || rest.starts_with("PUBLIC") {
        let (public_id, system_id, rest) = parse_external_id(rest, source)?;
        (public_id, Some(system_id), rest)
    } else {
        (None, None, rest)
    };
    let rest = scan::skip_whitespace(rest);

    let rest = if let Some(after) = rest.strip_prefix('[') {
        let leftover = parse_subset_into_dtd(after, dtd, resolver, base_uri, chain, false, source)?;
        let leftover = scan::literal(leftover, "]", source)?;
        scan::skip_whitespace(leftover)
    } else {
        rest
    };
    let rest = scan::literal(rest, ">", source)?;

    if let Some(system_id) = &system_id {
        let fetched = fetch_external(resolver, public_id.as_deref(), system_id, base_uri)?;
        let leftover = parse_subset_into_dtd(
            &fetched.text,
            dtd,
            resolver,
            fetched.base_uri.as_deref(),
            chain,
            true,
            source,
        )?;
        if !scan::skip_whitespace(leftover).is_empty() {
            return Err(Error::wf("ill-formed markup in external DTD subset", source));
        }
    }

    Ok((
        DoctypeInfo {
            name: name.to_string(),
            system_id,
            public_id,
        },
        rest,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::FileResolver;

    fn parse(xml: &str) -> Result<Document> {
        parse_document(xml, &FileResolver, None)
    }

    #[test]
    fn parses_minimal_document() {
        let doc = parse("<r/>").unwrap();
        assert_eq!(doc.root.name, "r");
        assert_eq!(doc.version, None);
    }

    #[test]
    fn parses_xml_declaration() {
        let doc = parse("<?xml version=\"1.0\" encoding=\"UTF-8\"?><r/>").unwrap();
        assert_eq!(doc.version.as_deref(), Some("1.0"));
        assert_eq!(doc.encoding.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn parses_standalone_declaration() {
        let doc = parse("<?xml version=\"1.0\" standalone=\"yes\"?><r/>").unwrap();
        assert_eq!(doc.standalone, Some(true));
    }

    #[test]
    fn collects_leading_and_trailing_misc() {
        let doc = parse("<!-- c1 --><?p1 d1?><r/><?p2 d2?><!-- c2 -->").unwrap();
        assert_eq!(doc.leading_pis.len(), 1);
        assert_eq!(doc.leading_pis[0].target, "p1");
        assert_eq!(doc.trailing_pis.len(), 1);
        assert_eq!(doc.trailing_pis[0].target, "p2");
    }

    #[test]
    fn injects_default_attributes_in_declaration_order() {
        let doc = parse(
            "<!DOCTYPE r [<!ATTLIST r z CDATA \"last\" a CDATA \"first\">]><r/>",
        )
        .unwrap();
        assert_eq!(
            doc.root.attributes,
            vec![
                ("z".to_string(), "last".to_string()),
                ("a".to_string(), "first".to_string()),
            ]
        );
    }

    #[test]
    fn parses_internal_dtd_subset() {
        let doc = parse("<!DOCTYPE r [ <!ENTITY foo \"bar\"> ]><r>&foo;</r>").unwrap();
        assert_eq!(doc.doctype.as_ref().unwrap().name, "r");
        assert_eq!(doc.root.children, vec![Content::Text("bar".to_string())]);
        assert!(doc.entities.contains_key("foo"));
    }

    #[test]
    fn rejects_trailing_content_after_root() {
        assert!(parse("<r/>stray").is_err());
    }

    #[test]
    fn rejects_multiple_root_elements() {
        assert!(parse("<r/><s/>").is_err());
    }

    #[test]
    fn rejects_missing_root_element() {
        assert!(parse("<?xml version=\"1.0\"?>").is_err());
    }

    #[test]
    fn rejects_unsupported_xml_version() {
        assert!(parse("<?xml version=\"2.0\"?><r/>").is_err());
        assert!(parse("<?xml version=\"1.\"?><r/>").is_err());
    }

    #[test]
    fn accepts_any_1x_version() {
        let doc = parse("<?xml version=\"1.1\"?><r/>").unwrap();
        assert_eq!(doc.version.as_deref(), Some("1.1"));
    }

    #[test]
    fn rejects_missing_whitespace_before_pseudo_attributes() {
        assert!(parse("<?xml version=\"1.0\"standalone=\"yes\"?><r/>").is_err());
        assert!(parse("<?xml version=\"1.0\"encoding=\"UTF-8\"?><r/>").is_err());
        assert!(parse("<?xml version=\"1.0\" encoding=\"UTF-8\"standalone=\"yes\"?><r/>").is_err());
    }

    #[test]
    fn canonicalizes_line_endings_before_parsing() {
        let doc = parse("<r>a\r\nb</r>").unwrap();
        assert_eq!(doc.root.children, vec![Content::Text("a\nb".to_string())]);
    }
}
