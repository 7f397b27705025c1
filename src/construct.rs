use std::sync::Arc;

// used to keep the one-to-one mapping between nodes and their assigned identities
use bimap::BiMap;

// other keepers use HashSet or HashMap
use core::hash::{BuildHasher, BuildHasherDefault};
use seahash::SeaHasher;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

// used to print out readable forms of a construct
use std::fmt;

// so regular expressions don't have to be recompiled
use lazy_static::lazy_static;
use regex::Regex;

// our own stuff that we need
use crate::datatype::{LiteralType, RDF_LANG_STRING, XSD_STRING};
use crate::error::{QuadcladError, Result};

lazy_static! {
    // what fits between < and > in N-Quads
    static ref IRI_CHARS: Regex = Regex::new(r#"^[^\x00-\x20<>"{}|^`\\]*$"#).unwrap();
    static ref BLANK_ID: Regex = Regex::new(r"^[A-Za-z0-9_]+([-.][A-Za-z0-9_]+)*$").unwrap();
    static ref LANGUAGE: Regex = Regex::new(r"^[a-z]+(-[a-z0-9]+)*$").unwrap();
}

// ------------- Thing -------------
/// The interned identity of a node.
pub type Thing = u64;

pub type ThingHasher = BuildHasherDefault<SeaHasher>;
pub type OtherHasher = BuildHasherDefault<SeaHasher>;

/// Never handed out to a node, used as the label of the default graph.
pub const GENESIS: Thing = 0;

#[derive(Debug, Default)]
pub struct ThingGenerator {
    lower_bound: Thing,
    released: Vec<Thing>,
}

impl ThingGenerator {
    pub fn new() -> Self {
        Self {
            lower_bound: GENESIS,
            released: Vec::new(),
        }
    }
    // Restoring a persisted store hands us identities we did not generate,
    // so the lower bound has to move past them.
    pub fn retain(&mut self, t: Thing) {
        if t > self.lower_bound {
            self.lower_bound = t;
        }
    }
    pub fn release(&mut self, t: Thing) {
        self.released.push(t);
    }
    pub fn generate(&mut self) -> Thing {
        self.released.pop().unwrap_or_else(|| {
            self.lower_bound += 1;
            self.lower_bound
        })
    }
}

// ------------- Nodes -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Iri(String);

impl Iri {
    /// Takes the IRI as is, prefixed names should go through a
    /// [`crate::prefix::PrefixTable`] first.
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlankNode(String);

impl BlankNode {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        match id.strip_prefix("_:") {
            Some(stripped) => Self(stripped.to_owned()),
            None => Self(id),
        }
    }
    pub fn id(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "_:{}", self.0)
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Literal {
    lexical: String,
    datatype: String,
    language: Option<String>,
}

impl Literal {
    pub fn new(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: datatype.into(),
            language: None,
        }
    }
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(value, XSD_STRING)
    }
    /// Language tags compare case-insensitively, so they are kept lowercased.
    pub fn lang_string(value: impl Into<String>, language: &str) -> Self {
        Self {
            lexical: value.into(),
            datatype: RDF_LANG_STRING.to_owned(),
            language: Some(language.to_lowercase()),
        }
    }
    pub fn typed<V: LiteralType>(value: &V) -> Self {
        Self::new(value.lexical(), V::DATATYPE)
    }
    pub fn lexical(&self) -> &str {
        &self.lexical
    }
    pub fn datatype(&self) -> &str {
        &self.datatype
    }
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", escape(&self.lexical))?;
        match &self.language {
            Some(language) => write!(f, "@{}", language),
            None if self.datatype == XSD_STRING => Ok(()),
            None => write!(f, "^^<{}>", self.datatype),
        }
    }
}

pub(crate) fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Any vertex of the graph. Equality is on the stored (expanded) form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Node {
    Iri(Iri),
    Blank(BlankNode),
    Literal(Literal),
}

impl Node {
    pub fn iri(iri: impl Into<String>) -> Self {
        Node::Iri(Iri::new(iri))
    }
    pub fn blank(id: impl Into<String>) -> Self {
        Node::Blank(BlankNode::new(id))
    }
    pub fn string(value: impl Into<String>) -> Self {
        Node::Literal(Literal::string(value))
    }
    pub fn typed<V: LiteralType>(value: &V) -> Self {
        Node::Literal(Literal::typed(value))
    }
    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal(_))
    }
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Node::Iri(iri) => Some(iri),
            _ => None,
        }
    }
    /// Refuses nodes the N-Quads form cannot carry back.
    fn check(&self, position: &str) -> Result<()> {
        let problem = match self {
            Node::Iri(iri) if !IRI_CHARS.is_match(iri.as_str()) => "an IRI with forbidden characters",
            Node::Blank(blank) if !BLANK_ID.is_match(blank.id()) => "a malformed blank node",
            Node::Literal(literal) if !IRI_CHARS.is_match(literal.datatype()) => {
                "a literal with a malformed datatype"
            }
            Node::Literal(literal) if literal.language().is_some_and(|l| !LANGUAGE.is_match(l)) => {
                "a literal with a malformed language tag"
            }
            _ => return Ok(()),
        };
        Err(QuadcladError::InvalidQuad(format!(
            "{} {} is {}",
            position, self, problem
        )))
    }
}
impl From<Iri> for Node {
    fn from(iri: Iri) -> Self {
        Node::Iri(iri)
    }
}
impl From<BlankNode> for Node {
    fn from(blank: BlankNode) -> Self {
        Node::Blank(blank)
    }
}
impl From<Literal> for Node {
    fn from(literal: Literal) -> Self {
        Node::Literal(literal)
    }
}
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Node::Iri(iri) => iri.fmt(f),
            Node::Blank(blank) => blank.fmt(f),
            Node::Literal(literal) => literal.fmt(f),
        }
    }
}

// ------------- Quad -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Quad {
    subject: Node,
    predicate: Node,
    object: Node,
    label: Option<Node>, // None is the default graph
}

impl Quad {
    pub fn new(
        subject: impl Into<Node>,
        predicate: impl Into<Node>,
        object: impl Into<Node>,
        label: Option<Node>,
    ) -> Result<Self> {
        let subject = subject.into();
        let predicate = predicate.into();
        if subject.is_literal() {
            return Err(QuadcladError::InvalidQuad(format!(
                "subject {} is a literal",
                subject
            )));
        }
        if predicate.as_iri().is_none() {
            return Err(QuadcladError::InvalidQuad(format!(
                "predicate {} is not an IRI",
                predicate
            )));
        }
        if let Some(label) = &label {
            if label.is_literal() {
                return Err(QuadcladError::InvalidQuad(format!(
                    "label {} is a literal",
                    label
                )));
            }
            label.check("label")?;
        }
        let object = object.into();
        subject.check("subject")?;
        predicate.check("predicate")?;
        object.check("object")?;
        Ok(Self {
            subject,
            predicate,
            object,
            label,
        })
    }
    pub fn triple(
        subject: impl Into<Node>,
        predicate: impl Into<Node>,
        object: impl Into<Node>,
    ) -> Result<Self> {
        Self::new(subject, predicate, object, None)
    }
    pub fn subject(&self) -> &Node {
        &self.subject
    }
    pub fn predicate(&self) -> &Node {
        &self.predicate
    }
    pub fn object(&self) -> &Node {
        &self.object
    }
    pub fn label(&self) -> Option<&Node> {
        self.label.as_ref()
    }
}
impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(label) = &self.label {
            write!(f, " {}", label)?;
        }
        write!(f, " .")
    }
}

/// A partial quad, unbound fields match anything.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct QuadPattern {
    pub subject: Option<Node>,
    pub predicate: Option<Node>,
    pub object: Option<Node>,
    pub label: Option<Node>,
}

impl QuadPattern {
    pub fn any() -> Self {
        Self::default()
    }
    pub fn subject(mut self, node: impl Into<Node>) -> Self {
        self.subject = Some(node.into());
        self
    }
    pub fn predicate(mut self, node: impl Into<Node>) -> Self {
        self.predicate = Some(node.into());
        self
    }
    pub fn object(mut self, node: impl Into<Node>) -> Self {
        self.object = Some(node.into());
        self
    }
    pub fn label(mut self, node: impl Into<Node>) -> Self {
        self.label = Some(node.into());
        self
    }
    pub fn matches(&self, quad: &Quad) -> bool {
        self.subject.as_ref().is_none_or(|s| s == quad.subject())
            && self.predicate.as_ref().is_none_or(|p| p == quad.predicate())
            && self.object.as_ref().is_none_or(|o| o == quad.object())
            && self.label.as_ref().is_none_or(|l| Some(l) == quad.label())
    }
}

/// A quad as kept in the indexes: four things, the label being
/// [`GENESIS`] for the default graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct QuadKey {
    pub subject: Thing,
    pub predicate: Thing,
    pub object: Thing,
    pub label: Thing,
}

// ------------- NodeKeeper -------------
#[derive(Debug, Default)]
pub struct NodeKeeper {
    kept: BiMap<Arc<Node>, Thing>,
    generator: ThingGenerator,
}
impl NodeKeeper {
    pub fn new() -> Self {
        Self {
            kept: BiMap::new(),
            generator: ThingGenerator::new(),
        }
    }
    pub fn thing(&self, node: &Node) -> Option<Thing> {
        self.kept.get_by_left(node).copied()
    }
    pub fn node(&self, thing: Thing) -> Option<Arc<Node>> {
        self.kept.get_by_right(&thing).map(Arc::clone)
    }
    // Identities are reserved first and kept only once the owning commit
    // succeeds, otherwise they are released for reuse.
    pub fn reserve(&mut self) -> Thing {
        self.generator.generate()
    }
    pub fn release(&mut self, thing: Thing) {
        self.generator.release(thing);
    }
    pub fn keep(&mut self, thing: Thing, node: Arc<Node>) {
        self.generator.retain(thing);
        self.kept.insert(node, thing);
    }
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.kept.left_values()
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- Lookups -------------
#[derive(Debug)]
pub struct Lookup<K, V, H = OtherHasher> {
    index: HashMap<K, HashSet<V, H>, H>,
}
impl<K: Eq + Hash, V: Eq + Hash, H: BuildHasher + Default> Lookup<K, V, H> {
    pub fn new() -> Self {
        Self {
            index: HashMap::<K, HashSet<V, H>, H>::default(),
        }
    }
    pub fn insert(&mut self, key: K, value: V) {
        let set = self.index.entry(key).or_default();
        set.insert(value);
    }
    pub fn remove(&mut self, key: &K, value: &V) {
        if let Some(set) = self.index.get_mut(key) {
            set.remove(value);
            if set.is_empty() {
                self.index.remove(key);
            }
        }
    }
    pub fn lookup(&self, key: &K) -> Option<&HashSet<V, H>> {
        self.index.get(key)
    }
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.index.keys()
    }
}
impl<K: Eq + Hash, V: Eq + Hash, H: BuildHasher + Default> Default for Lookup<K, V, H> {
    fn default() -> Self {
        Self::new()
    }
}
