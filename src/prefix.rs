//! Prefix table and value resolution.
//!
//! Short prefixes such as `ex:` expand to a base IRI. The table is append-only:
//! it is populated once when a store is set up and then shared read-only, so
//! that a shortened name means the same thing for the whole life of the store.

use bimap::BiMap;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::construct::{Iri, Node};
use crate::datatype::{NativeValue, OWL, RDF, RDFS, SCHEMA, XSD};
use crate::error::{QuadcladError, Result};

lazy_static! {
    static ref SHORT_PREFIX: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*:$").unwrap();
}

#[derive(Debug, Clone, Default)]
pub struct PrefixTable {
    // short prefix (with its trailing colon) <-> expansion
    prefixes: BiMap<String, String>,
}

impl PrefixTable {
    pub fn new() -> Self {
        Self::default()
    }
    /// A table holding the usual `rdf:`, `rdfs:`, `xsd:`, `owl:` and `schema:`
    /// prefixes.
    pub fn with_core() -> Self {
        let mut table = Self::new();
        for (short, expansion) in [
            ("rdf:", RDF),
            ("rdfs:", RDFS),
            ("xsd:", XSD),
            ("owl:", OWL),
            ("schema:", SCHEMA),
        ] {
            table.prefixes.insert(short.to_owned(), expansion.to_owned());
        }
        table
    }
    /// Registers `short` (with or without its trailing colon).
    ///
    /// Registering the same pair twice is fine. Rebinding a short prefix, or
    /// binding an expansion already owned by another prefix, is a
    /// [`QuadcladError::Conflict`] and leaves the table untouched.
    pub fn register_prefix(&mut self, short: &str, expansion: &str) -> Result<()> {
        let short = if short.ends_with(':') {
            short.to_owned()
        } else {
            format!("{}:", short)
        };
        if !SHORT_PREFIX.is_match(&short) {
            return Err(QuadcladError::InvalidSchema(format!(
                "'{}' is not a valid prefix",
                short
            )));
        }
        if expansion.is_empty() {
            return Err(QuadcladError::InvalidSchema(format!(
                "empty expansion for prefix '{}'",
                short
            )));
        }
        if let Some(existing) = self.prefixes.get_by_left(&short) {
            if existing == expansion {
                return Ok(());
            }
            return Err(QuadcladError::Conflict {
                short,
                existing: existing.clone(),
                requested: expansion.to_owned(),
            });
        }
        if let Some(owner) = self.prefixes.get_by_right(expansion) {
            return Err(QuadcladError::Conflict {
                short: owner.clone(),
                existing: expansion.to_owned(),
                requested: short,
            });
        }
        debug!(%short, %expansion, "registered prefix");
        self.prefixes.insert(short, expansion.to_owned());
        Ok(())
    }
    pub fn expansion(&self, short: &str) -> Option<&str> {
        self.prefixes.get_by_left(short).map(String::as_str)
    }
    /// Substitutes a registered leading prefix, anything else is returned as is.
    pub fn expand(&self, name: &str) -> String {
        if let Some(colon) = name.find(':') {
            if let Some(expansion) = self.prefixes.get_by_left(&name[..=colon]) {
                return format!("{}{}", expansion, &name[colon + 1..]);
            }
        }
        name.to_owned()
    }
    /// Picks the longest registered expansion that starts `iri`. Only meant
    /// for display.
    pub fn shorten(&self, iri: &str) -> String {
        self.prefixes
            .iter()
            .filter(|(_, expansion)| iri.len() > expansion.len() && iri.starts_with(expansion.as_str()))
            .max_by_key(|(_, expansion)| expansion.len())
            .map(|(short, expansion)| format!("{}{}", short, &iri[expansion.len()..]))
            .unwrap_or_else(|| iri.to_owned())
    }
    pub fn iri(&self, name: &str) -> Node {
        Node::Iri(Iri::new(self.expand(name)))
    }
    /// Renders a node for people, IRIs shortened where possible.
    pub fn display(&self, node: &Node) -> String {
        match node {
            Node::Iri(iri) => {
                let short = self.shorten(iri.as_str());
                if short == iri.as_str() {
                    iri.to_string()
                } else {
                    short
                }
            }
            other => other.to_string(),
        }
    }
    pub fn native_value(&self, node: &Node) -> Result<NativeValue> {
        match node {
            Node::Iri(iri) => Ok(NativeValue::Iri(iri.as_str().to_owned())),
            Node::Blank(blank) => Ok(NativeValue::Blank(blank.id().to_owned())),
            Node::Literal(literal) => NativeValue::from_literal(literal),
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(s, e)| (s.as_str(), e.as_str()))
    }
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
