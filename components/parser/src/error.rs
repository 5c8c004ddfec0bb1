use std::fmt;

/// Maximum number of code units kept in a diagnostic excerpt (spec.md §7).
const EXCERPT_LIMIT: usize = 100;

/// The three error surfaces a parse can raise (spec.md §4.C2, §7).
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Any grammatical or structural well-formedness violation.
    WellFormedness { message: String, excerpt: String },
    /// A character (or reference to one) failed a character-class test.
    DisallowedCharacter {
        sequence: String,
        context: &'static str,
        conforms_to: &'static str,
        offending: Option<char>,
    },
    /// No candidate encoding could decode a byte stream (external fetch only).
    Encoding { message: String },
}

impl Error {
    pub fn wf(message: impl Into<String>, source: &str) -> Self {
        Error::WellFormedness {
            message: message.into(),
            excerpt: excerpt(source),
        }
    }

    pub fn disallowed_char(sequence: &str, context: &'static str, conforms_to: &'static str) -> Self {
        let offending = first_offending_char(sequence, conforms_to);
        Error::DisallowedCharacter {
            sequence: excerpt(sequence),
            context,
            conforms_to,
            offending,
        }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Error::Encoding {
            message: message.into(),
        }
    }
}

/// Scans `sequence` to find the first character that fails the class named by
/// `conforms_to`, so `DisallowedCharacter` can report a concrete code point.
fn first_offending_char(sequence: &str, conforms_to: &str) -> Option<char> {
    use xrs_chars::XmlChar;
    sequence.chars().find(|c| match conforms_to {
        "Char" => !c.is_xml_char(),
        "Name" | "NmToken" => !c.is_xml_name_char(),
        "Pubid" => !c.is_xml_pubid_char(),
        _ => false,
    })
}

fn excerpt(source: &str) -> String {
    if source.chars().count() <= EXCERPT_LIMIT {
        source.to_string()
    } else {
        source.chars().take(EXCERPT_LIMIT).collect()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WellFormedness { message, excerpt } => {
                if excerpt.is_empty() {
                    write!(f, "{}", message)
                } else {
                    write!(f, "{} (near: {:?})", message, excerpt)
                }
            }
            Error::DisallowedCharacter {
                sequence,
                context,
                conforms_to,
                offending,
            } => match offending {
                Some(c) => write!(
                    f,
                    "disallowed character U+{:04X} in {} (must conform to {}): {:?}",
                    *c as u32, context, conforms_to, sequence
                ),
                None => write!(
                    f,
                    "disallowed content in {} (must conform to {}): {:?}",
                    context, conforms_to, sequence
                ),
            },
            Error::Encoding { message } => write!(f, "encoding error: {}", message),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
