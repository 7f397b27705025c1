//! Strategies for naming records that arrive without an identifier.
//!
//! [`CounterGenerator`] is the default. A store owns one and moves it past
//! every `bN` blank node it keeps, and every generator handed out by
//! [`crate::store::Store::id_generator`] shares it, so it never names a node
//! the store already has. [`UuidGenerator`] is collision free across stores.
//! [`SmallRangeGenerator`] picks from a tiny random range with no uniqueness
//! check and will, sooner or later, hand out the same node twice; keep it to
//! tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use tracing::warn;

use crate::construct::BlankNode;
use crate::error::{QuadcladError, Result};

pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Result<BlankNode>;
}

/// Hands out `b1`, `b2`, ... starting after a given value. Clones share
/// the counter.
#[derive(Debug, Clone)]
pub struct CounterGenerator {
    prefix: String,
    last: Arc<AtomicU64>,
}

impl CounterGenerator {
    pub const DEFAULT_PREFIX: &'static str = "b";

    pub fn new() -> Self {
        Self::starting_after(0)
    }
    pub fn starting_after(last: u64) -> Self {
        Self::with_prefix(Self::DEFAULT_PREFIX, last)
    }
    pub fn with_prefix(prefix: &str, last: u64) -> Self {
        Self {
            prefix: prefix.to_owned(),
            last: Arc::new(AtomicU64::new(last)),
        }
    }
    /// The number in a blank node id this generator could have produced.
    pub fn counter_of(&self, id: &str) -> Option<u64> {
        id.strip_prefix(self.prefix.as_str())?.parse().ok()
    }
    /// Moves the counter past `id` when it has this generator's form.
    pub fn advance_past(&self, id: &str) {
        if let Some(n) = self.counter_of(id) {
            self.last.fetch_max(n, Ordering::SeqCst);
        }
    }
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}
impl Default for CounterGenerator {
    fn default() -> Self {
        Self::new()
    }
}
impl IdGenerator for CounterGenerator {
    fn generate(&self) -> Result<BlankNode> {
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map_err(|_| QuadcladError::IdGeneration("counter exhausted".to_owned()))?;
        Ok(BlankNode::new(format!("{}{}", self.prefix, previous + 1)))
    }
}

#[derive(Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Result<BlankNode> {
        Ok(BlankNode::new(uuid::Uuid::now_v7().simple().to_string()))
    }
}

/// `node0` to `node{range - 1}`, picked at random.
#[derive(Debug)]
pub struct SmallRangeGenerator {
    range: u32,
}

impl SmallRangeGenerator {
    pub fn new(range: u32) -> Self {
        warn!(range, "small range identifiers may collide, do not use outside tests");
        Self { range }
    }
}
impl Default for SmallRangeGenerator {
    fn default() -> Self {
        Self::new(1000)
    }
}
impl IdGenerator for SmallRangeGenerator {
    fn generate(&self) -> Result<BlankNode> {
        if self.range == 0 {
            return Err(QuadcladError::IdGeneration("empty range".to_owned()));
        }
        let n = rand::rng().random_range(0..self.range);
        Ok(BlankNode::new(format!("node{}", n)))
    }
}
