//! Mapping records to quads and back.
//!
//! A [`RecordSchema`] declares, per field, the predicate it populates, whether
//! it holds one value or many, and whether its values are plain nodes or
//! nested records of another schema. Predicates may be written prefixed and
//! are resolved against the mapper's [`PrefixTable`] when a record is mapped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::construct::{BlankNode, Iri, Literal, Node, Quad, QuadPattern};
use crate::datatype::RDF_TYPE;
use crate::error::{QuadcladError, Result};
use crate::identity::IdGenerator;
use crate::prefix::PrefixTable;
use crate::store::{QuadWriter, Store};

lazy_static! {
    // an absolute IRI: a scheme followed by something without spaces or delimiters
    static ref ABSOLUTE_IRI: Regex =
        Regex::new(r#"^[A-Za-z][A-Za-z0-9+.-]*:[^\s<>"{}|\\^`]+$"#).unwrap();
}

// ------------- Schemas -------------
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    Many,
}

#[derive(Clone, Debug)]
pub enum FieldKind {
    Node,
    Record(Arc<RecordSchema>),
}

#[derive(Clone, Debug)]
pub struct FieldSchema {
    name: String,
    predicate: String,
    multiplicity: Multiplicity,
    kind: FieldKind,
}

impl FieldSchema {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn predicate(&self) -> &str {
        &self.predicate
    }
    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

#[derive(Clone, Debug)]
pub struct RecordSchema {
    type_name: String,
    fields: Vec<FieldSchema>,
}

impl RecordSchema {
    pub fn builder(type_name: &str) -> RecordSchemaBuilder {
        RecordSchemaBuilder {
            type_name: type_name.to_owned(),
            fields: Vec::new(),
        }
    }
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

pub struct RecordSchemaBuilder {
    type_name: String,
    fields: Vec<FieldSchema>,
}

impl RecordSchemaBuilder {
    fn field(mut self, name: &str, predicate: &str, multiplicity: Multiplicity, kind: FieldKind) -> Self {
        self.fields.push(FieldSchema {
            name: name.to_owned(),
            predicate: predicate.to_owned(),
            multiplicity,
            kind,
        });
        self
    }
    pub fn single(self, name: &str, predicate: &str) -> Self {
        self.field(name, predicate, Multiplicity::Single, FieldKind::Node)
    }
    pub fn many(self, name: &str, predicate: &str) -> Self {
        self.field(name, predicate, Multiplicity::Many, FieldKind::Node)
    }
    pub fn nested(self, name: &str, predicate: &str, schema: &Arc<RecordSchema>) -> Self {
        let kind = FieldKind::Record(Arc::clone(schema));
        self.field(name, predicate, Multiplicity::Single, kind)
    }
    pub fn nested_many(self, name: &str, predicate: &str, schema: &Arc<RecordSchema>) -> Self {
        let kind = FieldKind::Record(Arc::clone(schema));
        self.field(name, predicate, Multiplicity::Many, kind)
    }
    pub fn build(self) -> Result<Arc<RecordSchema>> {
        if self.type_name.trim().is_empty() {
            return Err(QuadcladError::InvalidSchema("empty type name".to_owned()));
        }
        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(QuadcladError::InvalidSchema("empty field name".to_owned()));
            }
            if !names.insert(field.name.as_str()) {
                return Err(QuadcladError::InvalidSchema(format!(
                    "field '{}' declared twice in {}",
                    field.name, self.type_name
                )));
            }
        }
        Ok(Arc::new(RecordSchema {
            type_name: self.type_name,
            fields: self.fields,
        }))
    }
}

// ------------- Records -------------
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Node(Node),
    Record(Record),
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}
impl From<Iri> for Value {
    fn from(iri: Iri) -> Self {
        Value::Node(iri.into())
    }
}
impl From<BlankNode> for Value {
    fn from(blank: BlankNode) -> Self {
        Value::Node(blank.into())
    }
}
impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        Value::Node(literal.into())
    }
}
impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

/// A value of a [`RecordSchema`]. Fields are checked against the schema when
/// the record is mapped, not when they are set.
#[derive(Clone, Debug)]
pub struct Record {
    schema: Arc<RecordSchema>,
    id: Option<Node>,
    values: HashMap<String, Vec<Value>>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.type_name == other.schema.type_name
            && self.id == other.id
            && self.values == other.values
    }
}

impl Record {
    pub fn new(schema: &Arc<RecordSchema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            id: None,
            values: HashMap::new(),
        }
    }
    pub fn with_id(mut self, id: impl Into<Node>) -> Self {
        self.id = Some(id.into());
        self
    }
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.values.insert(field.to_owned(), vec![value.into()]);
        self
    }
    pub fn set_all<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.values
            .insert(field.to_owned(), values.into_iter().map(Into::into).collect());
        self
    }
    pub fn get(&self, field: &str) -> &[Value] {
        self.values.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
    /// The single node of a field, if it holds exactly one plain node.
    pub fn node(&self, field: &str) -> Option<&Node> {
        match self.get(field) {
            [Value::Node(node)] => Some(node),
            _ => None,
        }
    }
    pub fn id(&self) -> Option<&Node> {
        self.id.as_ref()
    }
    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }
}

/// Plain Rust types that know their schema and how to become a record.
pub trait Mapped: Sized {
    fn schema() -> Result<Arc<RecordSchema>>;
    fn to_record(&self) -> Result<Record>;
    fn from_record(record: &Record) -> Result<Self>;
}

// ------------- Mapper -------------
pub struct SchemaMapper {
    prefixes: Arc<PrefixTable>,
    generator: Arc<dyn IdGenerator>,
}

impl SchemaMapper {
    pub fn new(prefixes: Arc<PrefixTable>, generator: Arc<dyn IdGenerator>) -> Self {
        Self {
            prefixes,
            generator,
        }
    }
    /// A mapper sharing the store's prefixes, naming records with a counter
    /// that starts after the store's existing blank nodes.
    pub fn for_store(store: &Store) -> Result<Self> {
        Ok(Self::new(
            Arc::clone(store.prefixes()),
            Arc::new(store.id_generator()?),
        ))
    }
    pub fn prefixes(&self) -> &Arc<PrefixTable> {
        &self.prefixes
    }

    fn resolve(&self, name: &str) -> Result<Node> {
        let expanded = self.prefixes.expand(name.trim());
        if expanded.is_empty() || !ABSOLUTE_IRI.is_match(&expanded) {
            return Err(QuadcladError::InvalidSchema(format!(
                "'{}' does not resolve to an IRI",
                name
            )));
        }
        Ok(Node::iri(expanded))
    }

    pub fn to_quads(&self, record: &Record) -> Result<(Node, Vec<Quad>)> {
        self.to_quads_with(record, self.generator.as_ref())
    }
    /// Maps a record, naming it and any unnamed nested record with `generator`.
    /// The type quad comes first, then fields in schema order and values in
    /// the order they were set. A nested record's quads precede the quad
    /// linking to it.
    pub fn to_quads_with(&self, record: &Record, generator: &dyn IdGenerator) -> Result<(Node, Vec<Quad>)> {
        let mut quads = Vec::new();
        let subject = self.map(record, generator, &mut quads)?;
        debug!(subject = %subject, quads = quads.len(), "mapped record");
        Ok((subject, quads))
    }
    pub fn to_quads_of<T: Mapped>(&self, value: &T) -> Result<(Node, Vec<Quad>)> {
        self.to_quads(&value.to_record()?)
    }

    fn map(&self, record: &Record, generator: &dyn IdGenerator, quads: &mut Vec<Quad>) -> Result<Node> {
        let schema = &record.schema;
        if let Some(unknown) = record.values.keys().find(|name| schema.field(name).is_none()) {
            return Err(QuadcladError::InvalidSchema(format!(
                "{} has no field '{}'",
                schema.type_name, unknown
            )));
        }
        // every predicate is checked, including those of empty fields
        let type_node = self.resolve(&schema.type_name)?;
        let predicates = schema
            .fields
            .iter()
            .map(|field| self.resolve(&field.predicate))
            .collect::<Result<Vec<_>>>()?;
        let subject = match &record.id {
            Some(id) if id.is_literal() => {
                return Err(QuadcladError::InvalidSchema(format!(
                    "literal {} cannot identify a record",
                    id
                )));
            }
            Some(id) => id.clone(),
            None => Node::Blank(generator.generate()?),
        };
        quads.push(Quad::triple(subject.clone(), Node::iri(RDF_TYPE), type_node)?);
        for (field, predicate) in schema.fields.iter().zip(predicates) {
            let values = record.get(&field.name);
            if field.multiplicity == Multiplicity::Single && values.len() > 1 {
                return Err(QuadcladError::InvalidSchema(format!(
                    "field '{}' holds a single value, got {}",
                    field.name,
                    values.len()
                )));
            }
            for value in values {
                let object = match (&field.kind, value) {
                    (FieldKind::Node, Value::Node(node)) => node.clone(),
                    (FieldKind::Record(nested), Value::Record(child))
                        if nested.type_name == child.schema.type_name =>
                    {
                        self.map(child, generator, quads)?
                    }
                    (FieldKind::Record(nested), _) => {
                        return Err(QuadcladError::InvalidSchema(format!(
                            "field '{}' expects a {} record",
                            field.name, nested.type_name
                        )));
                    }
                    (FieldKind::Node, Value::Record(_)) => {
                        return Err(QuadcladError::InvalidSchema(format!(
                            "field '{}' expects a node, not a record",
                            field.name
                        )));
                    }
                };
                quads.push(Quad::triple(subject.clone(), predicate.clone(), object)?);
            }
        }
        Ok(subject)
    }

    /// Maps a record and hands its quads to the session, all of them or,
    /// if mapping fails, none.
    pub fn write(&self, writer: &mut QuadWriter<'_>, record: &Record) -> Result<Node> {
        let (subject, quads) = self.to_quads(record)?;
        writer.write_quads(quads)?;
        Ok(subject)
    }

    // ------------- Reading back -------------
    /// Rebuilds the record stored under `subject`. Values of many-valued
    /// fields come back in node order, since the store keeps no order.
    pub fn load(&self, store: &Store, schema: &Arc<RecordSchema>, subject: &Node) -> Result<Record> {
        let mut loading = HashSet::new();
        self.load_inner(store, schema, subject, &mut loading)
    }
    pub fn load_mapped<T: Mapped>(&self, store: &Store, subject: &Node) -> Result<T> {
        T::from_record(&self.load(store, &T::schema()?, subject)?)
    }

    fn load_inner(
        &self,
        store: &Store,
        schema: &Arc<RecordSchema>,
        subject: &Node,
        loading: &mut HashSet<Node>,
    ) -> Result<Record> {
        if !loading.insert(subject.clone()) {
            return Err(QuadcladError::InvalidSchema(format!(
                "{} contains itself",
                subject
            )));
        }
        let type_quad = Quad::triple(subject.clone(), Node::iri(RDF_TYPE), self.resolve(&schema.type_name)?)?;
        if !store.contains(&type_quad)? {
            return Err(QuadcladError::NotFound(format!(
                "{} is not a {}",
                subject, schema.type_name
            )));
        }
        let mut record = Record::new(schema).with_id(subject.clone());
        for field in &schema.fields {
            let pattern = QuadPattern::any()
                .subject(subject.clone())
                .predicate(self.resolve(&field.predicate)?);
            let mut objects = store
                .lookup(&pattern)?
                .map(|quad| quad.map(|q| q.object().clone()))
                .collect::<Result<Vec<_>>>()?;
            objects.sort();
            objects.dedup();
            if field.multiplicity == Multiplicity::Single && objects.len() > 1 {
                return Err(QuadcladError::InvalidSchema(format!(
                    "{} has {} values for single field '{}'",
                    subject,
                    objects.len(),
                    field.name
                )));
            }
            if objects.is_empty() {
                continue;
            }
            let values = match &field.kind {
                FieldKind::Node => objects.into_iter().map(Value::Node).collect(),
                FieldKind::Record(nested) => objects
                    .iter()
                    .map(|object| self.load_inner(store, nested, object, loading).map(Value::Record))
                    .collect::<Result<Vec<_>>>()?,
            };
            record.values.insert(field.name.clone(), values);
        }
        loading.remove(subject);
        Ok(record)
    }
}
