mod escape;
mod write;

pub use escape::{canonical_escape, CanonicalEscaper};
pub use write::UnicodeWrite;

use std::fmt::Write as _;
use xrs_parser::{Content, Document, Element, Notation, ProcessingInstruction};

/// Renders a parsed [`Document`] to the canonical-form contract used by the
/// test harness (spec.md §6): a `<!DOCTYPE … [ … ]>` block if and only if
/// any notation was declared, leading PIs, the root element (attributes
/// sorted by name, self-closing elements emitted as open/close pairs, the
/// six-character escape table applied to text and attribute values), then
/// trailing PIs.
pub fn canonical_form(document: &Document) -> String {
    let mut out = String::new();

    if !document.notations.is_empty() {
        let root_name = document
            .doctype
            .as_ref()
            .map(|d| d.name.as_str())
            .unwrap_or(document.root.name.as_str());
        write!(out, "<!DOCTYPE {} [", root_name).unwrap();
        let mut names: Vec<&String> = document.notations.keys().collect();
        names.sort();
        for name in names {
            out.push('\n');
            write_notation(&mut out, &document.notations[name]);
        }
        out.push_str("\n]>\n");
    }

    for pi in &document.leading_pis {
        write_pi(&mut out, pi);
    }

    write_element(&mut out, &document.root);

    for pi in &document.trailing_pis {
        write_pi(&mut out, pi);
    }

    out
}

fn write_notation(out: &mut String, notation: &Notation) {
    match (&notation.public_id, &notation.system_id) {
        (Some(p), Some(s)) => write!(out, "<!NOTATION {} PUBLIC '{}' '{}'>", notation.name, p, s).unwrap(),
        (Some(p), None) => write!(out, "<!NOTATION {} PUBLIC '{}'>", notation.name, p).unwrap(),
        (None, Some(s)) => write!(out, "<!NOTATION {} SYSTEM '{}'>", notation.name, s).unwrap(),
        (None, None) => unreachable!("a declared notation always carries a public or system identifier"),
    }
}

fn write_pi(out: &mut String, pi: &ProcessingInstruction) {
    write!(out, "<?{} {}?>", pi.target, pi.data.as_deref().unwrap_or("")).unwrap();
}

fn write_element(out: &mut String, element: &Element) {
    out.push('<');
    out.push_str(&element.name);
    let mut attrs: Vec<&(String, String)> = element.attributes.iter().collect();
    attrs.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&canonical_escape(value));
        out.push('"');
    }
    out.push('>');
    for child in &element.children {
        match child {
            Content::Element(child_element) => write_element(out, child_element),
            Content::Text(text) => out.push_str(&canonical_escape(text)),
            Content::ProcessingInstruction(pi) => write_pi(out, pi),
        }
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrs_parser::ParseOptions;

    fn parse(xml: &str) -> Document {
        xrs_parser::parse_str(xml, ParseOptions::default()).unwrap()
    }

    #[test]
    fn self_closing_element_becomes_open_close_pair() {
        let doc = parse("<r/>");
        assert_eq!(canonical_form(&doc), "<r></r>");
    }

    #[test]
    fn attributes_sort_by_name() {
        let doc = parse("<r z=\"1\" a=\"2\"/>");
        assert_eq!(canonical_form(&doc), "<r a=\"2\" z=\"1\"></r>");
    }

    #[test]
    fn escapes_the_six_characters_in_text_and_attributes() {
        let doc = parse("<r a=\"&lt;&amp;&quot;\">&lt;&amp;&gt;</r>");
        assert_eq!(canonical_form(&doc), "<r a=\"&lt;&amp;&quot;\">&lt;&amp;&gt;</r>");
    }

    #[test]
    fn leading_and_trailing_pis_render_with_mandatory_space() {
        let doc = parse("<?a?><r/><?b data?>");
        assert_eq!(canonical_form(&doc), "<?a ?><r></r><?b data?>");
    }

    #[test]
    fn notations_emit_a_doctype_block() {
        let doc = parse("<!DOCTYPE r [ <!NOTATION gif SYSTEM 'gif-viewer'> ]><r/>");
        assert_eq!(
            canonical_form(&doc),
            "<!DOCTYPE r [\n<!NOTATION gif SYSTEM 'gif-viewer'>\n]>\n<r></r>"
        );
    }

    #[test]
    fn no_doctype_block_without_notations() {
        let doc = parse("<!DOCTYPE r [ <!ENTITY foo \"bar\"> ]><r/>");
        assert_eq!(canonical_form(&doc), "<r></r>");
    }
}
