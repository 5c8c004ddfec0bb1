use crate::UnicodeWrite;
use std::io;

/// Escapes the six characters the canonical-form contract names —
/// `& < > " #x9 #xA #xD` — and no others (notably not `'`, since canonical
/// form always double-quotes attribute values).
///
/// see https://www.w3.org/TR/REC-xml/#dt-chardata
pub struct CanonicalEscaper;

impl CanonicalEscaper {
    fn escape<W: UnicodeWrite>(input: &str, write: &mut W) -> io::Result<()> {
        let mut p = 0;
        for (i, r) in input.match_indices(|c: char| matches!(c, '&' | '<' | '>' | '"' | '\u{9}' | '\u{A}' | '\u{D}')) {
            write.write_all(&input[p..i])?;
            write.write_all(match r {
                "&" => "&amp;",
                "<" => "&lt;",
                ">" => "&gt;",
                "\"" => "&quot;",
                "\u{9}" => "&#9;",
                "\u{A}" => "&#10;",
                "\u{D}" => "&#13;",
                _ => unreachable!(),
            })?;
            p = i + r.len();
        }
        write.write_all(&input[p..])
    }
}

pub fn canonical_escape(input: &str) -> String {
    let mut output = String::new();
    CanonicalEscaper::escape(input, &mut &mut output).unwrap();
    output
}
