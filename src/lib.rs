//! Quadclad – an embeddable graph fact store.
//!
//! Facts are *quads* `(subject, predicate, object, label?)` where:
//! * A [`construct::Node`] is an IRI, a blank node or a typed literal.
//! * A [`construct::Quad`] keeps subject and label to IRIs and blank nodes and
//!   the predicate to an IRI. A missing label means the default graph.
//! * Every distinct node is interned as a [`construct::Thing`] (a simple `u64`),
//!   and quads are indexed by each of their four positions.
//!
//! Nodes are owned and deduplicated by a keeper in the `construct` module, so
//! the same node is shared through `Arc` wherever it appears.
//!
//! ## Modules
//! * [`construct`] – Nodes, quads, patterns, keepers and lookups.
//! * [`store`] – The [`store::Store`], its write sessions and cursors.
//! * [`persist`] – SQLite persistence & restoration layer.
//! * [`prefix`] – The [`prefix::PrefixTable`] and native values of nodes.
//! * [`datatype`] – Literal datatypes and [`datatype::NativeValue`].
//! * [`identity`] – Strategies naming records that have no identifier.
//! * [`schema`] – Mapping records to quads through a declared schema, and back.
//! * [`path`] – Path expressions, morphisms and their lazy evaluation.
//! * [`nquads`] – Reading the line oriented fact format.
//! * [`pathql`] – A textual form of path expressions and its engine.
//! * [`interface`] – Threaded query runner with cancellation.
//! * [`server`] – HTTP endpoints.
//! * [`config`] – Settings for the binary.
//!
//! ## Quick Start
//! ```
//! use quadclad::construct::{Node, Quad};
//! use quadclad::path::Path;
//! use quadclad::persist::PersistenceMode;
//! use quadclad::prefix::PrefixTable;
//! use quadclad::store::Store;
//!
//! let mut prefixes = PrefixTable::with_core();
//! prefixes.register_prefix("ex:", "http://coordy.org/").unwrap();
//! let store = Store::with_prefixes(PersistenceMode::InMemory, prefixes).unwrap();
//! let ex = |name: &str| store.iri(&format!("ex:{}", name));
//! store
//!     .insert([
//!         Quad::triple(ex("doc1"), ex("creator"), ex("agentA")).unwrap(),
//!         Quad::triple(ex("agentA"), ex("hasRole"), ex("roleAdmin")).unwrap(),
//!     ])
//!     .unwrap();
//! let roles: Vec<Node> = Path::start_at([ex("doc1")])
//!     .out(ex("creator"))
//!     .out(ex("hasRole"))
//!     .iterate(&store)
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(roles, vec![ex("roleAdmin")]);
//! ```

pub mod config;
pub mod construct;
pub mod datatype;
pub mod error;
pub mod identity;
pub mod interface;
pub mod nquads;
pub mod path;
pub mod pathql;
pub mod persist;
pub mod prefix;
pub mod schema;
pub mod server;
pub mod store;
