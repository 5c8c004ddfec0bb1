//! The DTD store (spec.md §4.C5) and the data model for entities, notations,
//! element declarations and attribute-list declarations (spec.md §3).

mod attlist;
mod element_decl;
mod entity;
mod notation;
mod subset;

pub use attlist::{AttDefault, AttType, AttributeDeclaration};
pub use element_decl::{Cardinality, ContentModel, ElementDeclaration, Particle};
pub use entity::{parse_external_id, Entity, EntityKind};
pub use notation::Notation;
pub use subset::parse_subset_into_dtd;

use std::collections::HashMap;
use std::rc::Rc;

use crate::document::ProcessingInstruction;
use crate::error::{Error, Result};
use crate::reference::expand_parameter_entities;

/// In-memory tables of every DTD-subset declaration, owned for the lifetime
/// of one parse. Seeded with the five predefined general entities.
pub struct Dtd {
    pub general_entities: HashMap<String, Rc<Entity>>,
    pub parameter_entities: HashMap<String, Rc<Entity>>,
    pub notations: HashMap<String, Rc<Notation>>,
    pub elements: HashMap<String, ElementDeclaration>,
    /// Attribute-list declarations, grouped per owning element and kept in
    /// first-declared order (spec.md §3 "Element" invariant: "iteration
    /// order is declaration order for emission"), since this is also the
    /// order injected default attributes are appended to an instance.
    pub attlists: HashMap<String, Vec<AttributeDeclaration>>,
    pub processing_instructions: Vec<ProcessingInstruction>,
}

impl Dtd {
    pub fn new() -> Self {
        let mut dtd = Dtd {
            general_entities: HashMap::new(),
            parameter_entities: HashMap::new(),
            notations: HashMap::new(),
            elements: HashMap::new(),
            attlists: HashMap::new(),
            processing_instructions: Vec::new(),
        };
        dtd.load_predefined_entities();
        dtd
    }

    /// Installs `lt`, `gt`, `amp`, `apos` and `quot` (spec.md §3 "Entity").
    /// Grounded in `original_source/xml_parser/dtd/DTD.py::__load_default_entities`,
    /// which bootstraps `lt` and `amp` through a second round of character-
    /// reference expansion (`&#38;#60;"` for `lt`). This implementation keeps
    /// `lt`/`amp` one expansion step short of their final character — `&#60;`
    /// and `&#38;` — so that re-parsing a reference to either one (in content
    /// or in an attribute value, both of which re-parse an entity's expansion
    /// text) still runs through the ordinary character-reference path instead
    /// of splicing a raw `<`/`&` that would be misread as markup. `gt`,
    /// `apos` and `quot` need no such indirection: their characters are not
    /// markup-significant to the content/attribute scanners. See DESIGN.md.
    fn load_predefined_entities(&mut self) {
        for (name, expansion) in [
            ("lt", "&#60;"),
            ("gt", ">"),
            ("amp", "&#38;"),
            ("apos", "'"),
            ("quot", "\""),
        ] {
            self.general_entities.insert(
                name.to_string(),
                Rc::new(Entity {
                    name: name.to_string(),
                    kind: EntityKind::General,
                    parsed: true,
                    expansion_text: Some(expansion.to_string()),
                    system_id: None,
                    public_id: None,
                    notation: None,
                    base_uri: None,
                }),
            );
        }
    }

    /// First-declaration-wins insertion for a general or parameter entity
    /// (spec.md §4.C5 "Insertion rule").
    pub fn declare_entity(&mut self, entity: Entity) {
        let table = match entity.kind {
            EntityKind::General => &mut self.general_entities,
            EntityKind::Parameter => &mut self.parameter_entities,
        };
        table
            .entry(entity.name.clone())
            .or_insert_with(|| Rc::new(entity));
    }

    /// First-declaration-wins insertion for a notation.
    pub fn declare_notation(&mut self, notation: Notation) {
        self.notations
            .entry(notation.name.clone())
            .or_insert_with(|| Rc::new(notation));
    }

    /// First-declaration-wins insertion for an element declaration.
    pub fn declare_element(&mut self, decl: ElementDeclaration) {
        self.elements.entry(decl.name.clone()).or_insert(decl);
    }

    /// Merges a newly-read ATTLIST's attributes into any existing
    /// declaration for the same element, per-attribute first-wins (spec.md
    /// §4.C5 "Attribute-list declarations for the same element merge"),
    /// preserving the order each attribute was first declared in.
    pub fn merge_attlist(&mut self, element: &str, attributes: Vec<AttributeDeclaration>) {
        let existing = self.attlists.entry(element.to_string()).or_default();
        for attr in attributes {
            if !existing.iter().any(|a| a.name == attr.name) {
                existing.push(attr);
            }
        }
    }

    pub fn attribute_decl(&self, element: &str, attribute: &str) -> Option<&AttributeDeclaration> {
        self.attlists.get(element)?.iter().find(|a| a.name == attribute)
    }
}

impl Default for Dtd {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered, deduplication-checked chain of currently-expanding entity
/// references, used for cycle detection (spec.md §5 "Cycle detection").
/// A frame on the call stack, not global state (design note §9).
#[derive(Clone, Default)]
pub struct EntityChain<'a>(Vec<&'a str>);

impl<'a> EntityChain<'a> {
    pub fn push(&self, name: &'a str) -> Result<Self> {
        if self.0.contains(&name) {
            return Err(crate::error::Error::wf(
                format!("recursive entity reference to '{}'", name),
                name,
            ));
        }
        let mut chain = self.0.clone();
        chain.push(name);
        Ok(EntityChain(chain))
    }
}

/// Captures one markup declaration's body — from just after its keyword
/// up to (but excluding) its terminating, top-level `>` — and, when found
/// in the external subset, expands every parameter-entity reference in
/// it before structural parsing begins.
///
/// ATTLIST and ELEMENT declarations are the only ones in which a
/// parameter-entity reference conventionally appears *within* the
/// declaration rather than only before it (DTD modularization idiom, see
/// DESIGN.md); this is where that expansion happens, once per
/// declaration rather than the original's per-substitution re-lex, which
/// is observationally identical for any well-formed expansion.
pub(crate) fn expand_declaration_body<'i>(
    input: &'i str,
    dtd: &Dtd,
    chain: &EntityChain,
    external: bool,
    source: &str,
) -> Result<(String, &'i str)> {
    let end = find_declaration_end(input, source)?;
    let (body, rest) = (&input[..end], &input[end + 1..]);
    let expanded = if external && body.contains('%') {
        expand_parameter_entities(body, dtd, chain, source)?
    } else {
        body.to_string()
    };
    Ok((expanded, rest))
}

/// Scans to the top-level `>` terminating a markup declaration, skipping
/// over quoted literals so a `>` inside an attribute default value or
/// enumeration member doesn't terminate the scan early.
fn find_declaration_end(input: &str, source: &str) -> Result<usize> {
    let mut chars = input.char_indices().peekable();
    let mut quote: Option<char> = None;
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '>' => return Ok(i),
                _ => {}
            },
        }
    }
    Err(Error::wf("unterminated markup declaration", source))
}
