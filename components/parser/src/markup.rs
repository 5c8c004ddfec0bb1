//! Comment and processing-instruction readers (spec.md §4.C11), shared
//! between DTD-subset parsing (where they may appear as subset-level
//! markup) and content parsing (where they may appear as child nodes).
//! Grounded in `original_source/xml_parser/content/Comment.py` and
//! `original_source/xml_parser/content/ProcessingInstruction.py`.

use crate::document::ProcessingInstruction;
use crate::error::{Error, Result};
use crate::scan;

/// `Comment ::= '<!--' ((Char - '-') | ('-' (Char - '-')))* '-->'`, starting
/// just after `<!--`. A comment may not contain `--` anywhere in its body.
pub fn parse_comment<'i>(input: &'i str, source: &str) -> Result<(&'i str, &'i str)> {
    let end = input
        .find("--")
        .ok_or_else(|| Error::wf("unterminated comment", source))?;
    if !input[end..].starts_with("-->") {
        return Err(Error::wf("comment body may not contain '--'", source));
    }
    let body = &input[..end];
    scan::assert_chars(body, "comment")?;
    Ok((body, &input[end + 3..]))
}

/// `PI ::= '<?' PITarget (S (Char* - (Char* '?>' Char*)))? '?>'`, starting
/// just after `<?`. Rejects `xml`/`Xml`/`XML` etc. as a target (spec.md
/// §4.C11 "PI target may not be 'xml' in any case combination" — stricter
/// than the original, which does not enforce this).
pub fn parse_pi<'i>(input: &'i str, source: &str) -> Result<(ProcessingInstruction, &'i str)> {
    let (target, rest) = scan::name(input, source)?;
    if target.eq_ignore_ascii_case("xml") {
        return Err(Error::wf(
            format!("processing instruction target may not be '{}'", target),
            source,
        ));
    }
    let end = rest
        .find("?>")
        .ok_or_else(|| Error::wf("unterminated processing instruction", source))?;
    let body = &rest[..end];
    let data = if body.is_empty() {
        None
    } else {
        let stripped = scan::whitespace(body, source)?;
        scan::assert_chars(stripped, "processing instruction")?;
        Some(stripped.to_string())
    };
    Ok((
        ProcessingInstruction {
            target: target.to_string(),
            data,
        },
        &rest[end + 2..],
    ))
}
