//! Path expressions and their evaluation.
//!
//! A [`Path`] is a start set plus a [`Morphism`], an immutable list of steps.
//! Nothing touches the store until the first call to `next()` on the
//! [`PathIter`] returned by [`Path::iterate`], which then walks the indexes
//! breadth first: every node of the current frontier is expanded before the
//! next step begins.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use roaring::RoaringTreemap;
use tracing::debug;

use crate::construct::{Node, Thing};
use crate::datatype::NativeValue;
use crate::error::{QuadcladError, Result};
use crate::store::{Index, Store};

// ------------- Steps -------------
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// From x to y over every (x, p, y).
    Out(Node),
    /// From y to x over every (x, p, y).
    In(Node),
    Both(Node),
    /// Keeps only the listed nodes.
    Is(Vec<Node>),
    /// Keeps x when (x, p, o) exists.
    Has(Node, Node),
    Follow(Morphism),
    /// A morphism looked up by name when the path is compiled.
    FollowNamed(String),
}

/// A reusable, immutable sequence of steps. Extending a morphism returns a
/// new one and leaves the original, and every path it was spliced into,
/// untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Morphism {
    steps: Arc<Vec<Step>>,
}

impl Morphism {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
    pub fn len(&self) -> usize {
        self.steps.len()
    }
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
    pub fn then(&self, step: Step) -> Self {
        let mut steps = self.steps.as_ref().clone();
        steps.push(step);
        Self {
            steps: Arc::new(steps),
        }
    }
    pub fn out(&self, predicate: impl Into<Node>) -> Self {
        self.then(Step::Out(predicate.into()))
    }
    pub fn in_(&self, predicate: impl Into<Node>) -> Self {
        self.then(Step::In(predicate.into()))
    }
    pub fn both(&self, predicate: impl Into<Node>) -> Self {
        self.then(Step::Both(predicate.into()))
    }
    pub fn is(&self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.then(Step::Is(nodes.into_iter().collect()))
    }
    pub fn has(&self, predicate: impl Into<Node>, object: impl Into<Node>) -> Self {
        self.then(Step::Has(predicate.into(), object.into()))
    }
    pub fn follow(&self, morphism: &Morphism) -> Self {
        self.then(Step::Follow(morphism.clone()))
    }
    pub fn follow_named(&self, name: &str) -> Self {
        self.then(Step::FollowNamed(name.to_owned()))
    }
}

/// Named morphisms, consulted for [`Step::FollowNamed`].
#[derive(Clone, Debug, Default)]
pub struct Morphisms {
    named: HashMap<String, Morphism>,
}

impl Morphisms {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the morphism previously bound to the name, if any.
    pub fn define(&mut self, name: &str, morphism: Morphism) -> Option<Morphism> {
        self.named.insert(name.to_owned(), morphism)
    }
    pub fn get(&self, name: &str) -> Option<&Morphism> {
        self.named.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }
    pub fn len(&self) -> usize {
        self.named.len()
    }
    pub fn is_empty(&self) -> bool {
        self.named.is_empty()
    }
}

// ------------- Path -------------
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Path {
    // None is every subject and object in the store
    start: Option<Arc<Vec<Node>>>,
    morphism: Morphism,
}

impl Path {
    pub fn start_at(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self {
            start: Some(Arc::new(nodes.into_iter().collect())),
            morphism: Morphism::new(),
        }
    }
    pub fn all() -> Self {
        Self::default()
    }
    pub fn start(&self) -> Option<&[Node]> {
        self.start.as_deref().map(Vec::as_slice)
    }
    pub fn morphism(&self) -> &Morphism {
        &self.morphism
    }
    fn with(&self, morphism: Morphism) -> Self {
        Self {
            start: self.start.clone(),
            morphism,
        }
    }
    pub fn out(&self, predicate: impl Into<Node>) -> Self {
        self.with(self.morphism.out(predicate))
    }
    pub fn in_(&self, predicate: impl Into<Node>) -> Self {
        self.with(self.morphism.in_(predicate))
    }
    pub fn both(&self, predicate: impl Into<Node>) -> Self {
        self.with(self.morphism.both(predicate))
    }
    pub fn is(&self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.with(self.morphism.is(nodes))
    }
    pub fn has(&self, predicate: impl Into<Node>, object: impl Into<Node>) -> Self {
        self.with(self.morphism.has(predicate, object))
    }
    pub fn follow(&self, morphism: &Morphism) -> Self {
        self.with(self.morphism.follow(morphism))
    }
    pub fn follow_named(&self, name: &str) -> Self {
        self.with(self.morphism.follow_named(name))
    }

    /// Compiles the path without any registered morphisms.
    pub fn iterate<'s>(&self, store: &'s Store) -> Result<PathIter<'s>> {
        self.iterate_with(store, &Morphisms::new())
    }
    /// Compiles the path, resolving named morphisms. Fails on a name that
    /// is not registered or that ends up following itself. The store is not
    /// read until the first value is requested.
    pub fn iterate_with<'s>(&self, store: &'s Store, morphisms: &Morphisms) -> Result<PathIter<'s>> {
        let mut ops = Vec::new();
        let mut expanding = HashSet::new();
        compile(self.morphism.steps(), morphisms, &mut expanding, &mut ops)?;
        Ok(PathIter {
            store,
            start: self.start.clone(),
            ops,
            state: State::Pending,
        })
    }
    /// Calls back with the native value of every result.
    pub fn for_each_value(&self, store: &Store, mut callback: impl FnMut(NativeValue)) -> Result<usize> {
        let mut count = 0;
        for node in self.iterate(store)? {
            callback(store.prefixes().native_value(&node?)?);
            count += 1;
        }
        Ok(count)
    }
    pub fn values(&self, store: &Store) -> Result<Vec<NativeValue>> {
        let mut values = Vec::new();
        self.for_each_value(store, |value| values.push(value))?;
        Ok(values)
    }
}

// ------------- Compilation -------------
#[derive(Clone, Debug)]
enum Op {
    Out(Node),
    In(Node),
    Both(Node),
    Is(Vec<Node>),
    Has(Node, Node),
}

fn compile(
    steps: &[Step],
    morphisms: &Morphisms,
    expanding: &mut HashSet<String>,
    ops: &mut Vec<Op>,
) -> Result<()> {
    for step in steps {
        match step {
            Step::Out(p) => ops.push(Op::Out(p.clone())),
            Step::In(p) => ops.push(Op::In(p.clone())),
            Step::Both(p) => ops.push(Op::Both(p.clone())),
            Step::Is(nodes) => ops.push(Op::Is(nodes.clone())),
            Step::Has(p, o) => ops.push(Op::Has(p.clone(), o.clone())),
            Step::Follow(morphism) => compile(morphism.steps(), morphisms, expanding, ops)?,
            Step::FollowNamed(name) => {
                let morphism = morphisms.get(name).ok_or_else(|| {
                    QuadcladError::PathCompilation(format!("unknown morphism '{}'", name))
                })?;
                if !expanding.insert(name.clone()) {
                    return Err(QuadcladError::PathCompilation(format!(
                        "morphism '{}' follows itself",
                        name
                    )));
                }
                compile(morphism.steps(), morphisms, expanding, ops)?;
                expanding.remove(name);
            }
        }
    }
    Ok(())
}

// ------------- Evaluation -------------
enum State {
    Pending,
    Ready(std::vec::IntoIter<Node>),
    Done,
}

/// The lazy result of a path. Each call to [`Path::iterate`] gives an
/// independent one; dropping it early needs no cleanup.
pub struct PathIter<'s> {
    store: &'s Store,
    start: Option<Arc<Vec<Node>>>,
    ops: Vec<Op>,
    state: State,
}

impl PathIter<'_> {
    fn evaluate(&self) -> Result<Vec<Node>> {
        let mut frontier = {
            let index = self.store.read()?;
            match &self.start {
                Some(nodes) => nodes.iter().filter_map(|node| index.thing(node)).collect(),
                None => universe(&index),
            }
        };
        for op in &self.ops {
            if frontier.is_empty() {
                break;
            }
            let index = self.store.read()?;
            frontier = apply(&index, op, &frontier);
            debug!(step = ?op, frontier = frontier.len(), "expanded");
        }
        let index = self.store.read()?;
        Ok(frontier
            .iter()
            .filter_map(|thing| index.node(thing))
            .map(|node| node.as_ref().clone())
            .collect())
    }
}

impl Iterator for PathIter<'_> {
    type Item = Result<Node>;
    fn next(&mut self) -> Option<Self::Item> {
        if let State::Pending = self.state {
            match self.evaluate() {
                Ok(nodes) => self.state = State::Ready(nodes.into_iter()),
                Err(e) => {
                    self.state = State::Done;
                    return Some(Err(e));
                }
            }
        }
        match &mut self.state {
            State::Ready(nodes) => nodes.next().map(Ok),
            _ => None,
        }
    }
}

fn universe(index: &Index) -> RoaringTreemap {
    index
        .by_subject
        .keys()
        .chain(index.by_object.keys())
        .copied()
        .collect()
}

fn apply(index: &Index, op: &Op, frontier: &RoaringTreemap) -> RoaringTreemap {
    let mut next = RoaringTreemap::new();
    match op {
        Op::Out(p) => {
            if let Some(p) = index.thing(p) {
                outward(index, p, frontier, &mut next);
            }
        }
        Op::In(p) => {
            if let Some(p) = index.thing(p) {
                inward(index, p, frontier, &mut next);
            }
        }
        Op::Both(p) => {
            if let Some(p) = index.thing(p) {
                outward(index, p, frontier, &mut next);
                inward(index, p, frontier, &mut next);
            }
        }
        Op::Is(nodes) => {
            let kept: RoaringTreemap = nodes.iter().filter_map(|n| index.thing(n)).collect();
            next = frontier & &kept;
        }
        Op::Has(p, o) => {
            if let (Some(p), Some(o)) = (index.thing(p), index.thing(o)) {
                for x in frontier {
                    let found = index
                        .by_subject
                        .lookup(&x)
                        .is_some_and(|keys| keys.iter().any(|k| k.predicate == p && k.object == o));
                    if found {
                        next.insert(x);
                    }
                }
            }
        }
    }
    next
}

fn outward(index: &Index, predicate: Thing, frontier: &RoaringTreemap, next: &mut RoaringTreemap) {
    for x in frontier {
        if let Some(keys) = index.by_subject.lookup(&x) {
            next.extend(keys.iter().filter(|k| k.predicate == predicate).map(|k| k.object));
        }
    }
}

fn inward(index: &Index, predicate: Thing, frontier: &RoaringTreemap, next: &mut RoaringTreemap) {
    for y in frontier {
        if let Some(keys) = index.by_object.lookup(&y) {
            next.extend(keys.iter().filter(|k| k.predicate == predicate).map(|k| k.subject));
        }
    }
}
