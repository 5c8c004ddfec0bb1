//! Non-validating, well-formedness-checking XML 1.0 parser (spec.md §1).
//!
//! Reads a whole document into an in-memory [`Document`] tree: the parsed
//! root [`Element`], its [`Content`] (child elements, text, processing
//! instructions — comments are checked but stripped), the entities and
//! notations declared along the way, and the document's own declaration
//! and DOCTYPE identity.
//!
//! ```
//! let doc = xrs_parser::parse_str("<r>hi</r>", xrs_parser::ParseOptions::default()).unwrap();
//! assert_eq!(doc.root.name, "r");
//! ```

mod content;
mod document;
mod dtd;
mod error;
mod markup;
mod reference;
mod resolve;
mod scan;

use std::path::Path;

pub use document::{Content, Document, DoctypeInfo, Element, ProcessingInstruction};
pub use dtd::{
    AttDefault, AttType, AttributeDeclaration, Cardinality, ContentModel, Entity, EntityKind, ElementDeclaration,
    Notation, Particle,
};
pub use error::{Error, Result};
pub use resolve::ExternalResolver;

use resolve::{decode_document_bytes, FileResolver};

/// Parameters to one parse (spec.md §6): where to resolve relative external
/// references against, an encoding to assume instead of sniffing one, and
/// an optional replacement for the default filesystem-backed resolver.
#[derive(Default)]
pub struct ParseOptions {
    pub base_dir: Option<String>,
    pub encoding: Option<String>,
    pub resolver: Option<Box<dyn ExternalResolver>>,
}

/// Parses `xml`, already decoded to `str`, into a [`Document`].
pub fn parse_str(xml: &str, options: ParseOptions) -> Result<Document> {
    let default_resolver;
    let resolver: &dyn ExternalResolver = match &options.resolver {
        Some(r) => r.as_ref(),
        None => {
            default_resolver = FileResolver;
            &default_resolver
        }
    };
    document::parse_document(xml, resolver, options.base_dir.as_deref())
}

/// Reads and parses the document at `path`, sniffing its declared encoding
/// (falling back to UTF-8, then UTF-16) unless `options.encoding` overrides
/// it, and defaulting `base_dir` to `path`'s parent directory.
pub fn parse_file(path: &Path, mut options: ParseOptions) -> Result<Document> {
    let bytes = std::fs::read(path).map_err(|e| Error::encoding(format!("could not read '{}': {}", path.display(), e)))?;
    let text = decode_document_bytes(&bytes, options.encoding.as_deref())?;

    if options.base_dir.is_none() {
        options.base_dir = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty());
    }
    parse_str(&text, options)
}
