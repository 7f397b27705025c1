// used for persistence
use rusqlite::{Connection, params};
use std::sync::Arc;
use tracing::{debug, info};

use crate::construct::{BlankNode, Iri, Literal, Node, QuadKey, Thing};
use crate::error::{QuadcladError, Result, StoreError};

/// Where a store keeps its quads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Nothing outlives the store.
    InMemory,
    /// An SQLite database file, restored when the store is opened again.
    File(String),
}

const IRI_KIND: i64 = 1;
const BLANK_KIND: i64 = 2;
const LITERAL_KIND: i64 = 3;

/// Everything a persisted store contained when it was last closed.
pub struct Restored {
    pub nodes: Vec<(Thing, Node)>,
    pub quads: Vec<QuadKey>,
}

// Things are bound as SQLite integers, which are signed.

// ------------- Persistence -------------
pub struct Persistor {
    connection: Connection,
}
impl Persistor {
    pub fn open(path: &str) -> Result<Persistor> {
        let connection = Connection::open(path)?;
        // The "STRICT" keyword introduced in 3.37.0 breaks JDBC connections, which makes
        // debugging using an external tool like DBeaver impossible
        connection.execute_batch(
            "
            create table if not exists Node (
                Node_Identity integer not null,
                Kind integer not null,
                Lexical text not null,
                Datatype text not null,
                Language text not null,
                constraint referenceable_Node_Identity primary key (
                    Node_Identity
                ),
                constraint unique_Node unique (
                    Kind,
                    Lexical,
                    Datatype,
                    Language
                )
            );-- STRICT;
            create table if not exists Quad (
                Subject_Identity integer not null,
                Predicate_Identity integer not null,
                Object_Identity integer not null,
                Label_Identity integer not null,
                constraint Subject_is_Node foreign key (
                    Subject_Identity
                ) references Node(Node_Identity),
                constraint Predicate_is_Node foreign key (
                    Predicate_Identity
                ) references Node(Node_Identity),
                constraint Object_is_Node foreign key (
                    Object_Identity
                ) references Node(Node_Identity),
                constraint unique_Quad primary key (
                    Subject_Identity,
                    Predicate_Identity,
                    Object_Identity,
                    Label_Identity
                )
            );-- STRICT;
            ",
        )?;
        info!(path, "opened persistent quad store");
        Ok(Persistor { connection })
    }
    pub fn restore(&mut self) -> Result<Restored> {
        let mut nodes = Vec::new();
        let mut statement = self.connection.prepare(
            "
            select Node_Identity, Kind, Lexical, Datatype, Language
                from Node
            ",
        )?;
        let mut rows = statement.query([])?;
        while let Some(row) = rows.next()? {
            let thing = row.get::<_, i64>(0)? as Thing;
            let kind: i64 = row.get(1)?;
            let lexical: String = row.get(2)?;
            let datatype: String = row.get(3)?;
            let language: String = row.get(4)?;
            let node = match kind {
                IRI_KIND => Node::Iri(Iri::new(lexical)),
                BLANK_KIND => Node::Blank(BlankNode::new(lexical)),
                LITERAL_KIND if !language.is_empty() => {
                    Node::Literal(Literal::lang_string(lexical, &language))
                }
                LITERAL_KIND => Node::Literal(Literal::new(lexical, datatype)),
                _ => {
                    return Err(QuadcladError::Store(StoreError::IoFailure(format!(
                        "node {} has unknown kind {}",
                        thing, kind
                    ))));
                }
            };
            nodes.push((thing, node));
        }
        let mut quads = Vec::new();
        let mut statement = self.connection.prepare(
            "
            select Subject_Identity, Predicate_Identity, Object_Identity, Label_Identity
                from Quad
            ",
        )?;
        let mut rows = statement.query([])?;
        while let Some(row) = rows.next()? {
            quads.push(QuadKey {
                subject: row.get::<_, i64>(0)? as Thing,
                predicate: row.get::<_, i64>(1)? as Thing,
                object: row.get::<_, i64>(2)? as Thing,
                label: row.get::<_, i64>(3)? as Thing,
            });
        }
        debug!(nodes = nodes.len(), quads = quads.len(), "restored");
        Ok(Restored { nodes, quads })
    }
    /// Writes new nodes and quads in one transaction, so a failure leaves
    /// the file as it was.
    pub fn persist(&mut self, nodes: &[(Thing, Arc<Node>)], quads: &[QuadKey]) -> Result<()> {
        let transaction = self.connection.transaction()?;
        {
            let mut add_node = transaction.prepare_cached(
                "
                insert into Node (
                    Node_Identity,
                    Kind,
                    Lexical,
                    Datatype,
                    Language
                ) values (?, ?, ?, ?, ?)
                ",
            )?;
            for (thing, node) in nodes {
                let (kind, lexical, datatype, language) = match node.as_ref() {
                    Node::Iri(iri) => (IRI_KIND, iri.as_str(), "", ""),
                    Node::Blank(blank) => (BLANK_KIND, blank.id(), "", ""),
                    Node::Literal(literal) => (
                        LITERAL_KIND,
                        literal.lexical(),
                        literal.datatype(),
                        literal.language().unwrap_or(""),
                    ),
                };
                add_node.execute(params![*thing as i64, kind, lexical, datatype, language])?;
            }
            let mut add_quad = transaction.prepare_cached(
                "
                insert or ignore into Quad (
                    Subject_Identity,
                    Predicate_Identity,
                    Object_Identity,
                    Label_Identity
                ) values (?, ?, ?, ?)
                ",
            )?;
            for quad in quads {
                add_quad.execute(params![
                    quad.subject as i64,
                    quad.predicate as i64,
                    quad.object as i64,
                    quad.label as i64
                ])?;
            }
        }
        transaction.commit()?;
        Ok(())
    }
    pub fn remove(&mut self, quads: &[QuadKey]) -> Result<()> {
        let transaction = self.connection.transaction()?;
        {
            let mut remove_quad = transaction.prepare_cached(
                "
                delete from Quad
                    where Subject_Identity = ?
                    and Predicate_Identity = ?
                    and Object_Identity = ?
                    and Label_Identity = ?
                ",
            )?;
            for quad in quads {
                remove_quad.execute(params![
                    quad.subject as i64,
                    quad.predicate as i64,
                    quad.object as i64,
                    quad.label as i64
                ])?;
            }
        }
        transaction.commit()?;
        Ok(())
    }
    pub fn close(self) -> Result<()> {
        self.connection
            .close()
            .map_err(|(_, e)| QuadcladError::from(e))
    }
}
