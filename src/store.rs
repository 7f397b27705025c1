use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock, RwLockReadGuard};
use std::thread::{self, ThreadId};

use tracing::{debug, info, warn};

use crate::construct::{
    GENESIS, Lookup, Node, NodeKeeper, OtherHasher, Quad, QuadKey, QuadPattern, Thing,
    ThingHasher,
};
use crate::error::{QuadcladError, Result, StoreError};
use crate::identity::CounterGenerator;
use crate::nquads;
use crate::persist::{PersistenceMode, Persistor};
use crate::prefix::PrefixTable;

// ------------- Index -------------
// Owns the interned nodes and every quad, plus lookups from each position
// of a quad (similar to database indexes).
#[derive(Debug, Default)]
pub(crate) struct Index {
    pub(crate) nodes: NodeKeeper,
    pub(crate) quads: HashSet<QuadKey, OtherHasher>,
    pub(crate) by_subject: Lookup<Thing, QuadKey, ThingHasher>,
    pub(crate) by_predicate: Lookup<Thing, QuadKey, ThingHasher>,
    pub(crate) by_object: Lookup<Thing, QuadKey, ThingHasher>,
    pub(crate) by_label: Lookup<Thing, QuadKey, ThingHasher>,
}

impl Index {
    fn add(&mut self, key: QuadKey) -> bool {
        if !self.quads.insert(key) {
            return false;
        }
        self.by_subject.insert(key.subject, key);
        self.by_predicate.insert(key.predicate, key);
        self.by_object.insert(key.object, key);
        self.by_label.insert(key.label, key);
        true
    }
    fn remove(&mut self, key: &QuadKey) -> bool {
        if !self.quads.remove(key) {
            return false;
        }
        self.by_subject.remove(&key.subject, key);
        self.by_predicate.remove(&key.predicate, key);
        self.by_object.remove(&key.object, key);
        self.by_label.remove(&key.label, key);
        true
    }
    pub(crate) fn thing(&self, node: &Node) -> Option<Thing> {
        self.nodes.thing(node)
    }
    pub(crate) fn node(&self, thing: Thing) -> Option<Arc<Node>> {
        self.nodes.node(thing)
    }
    fn quad(&self, key: &QuadKey) -> Option<Quad> {
        let label = match key.label {
            GENESIS => None,
            label => Some(self.node(label)?.as_ref().clone()),
        };
        Quad::new(
            self.node(key.subject)?.as_ref().clone(),
            self.node(key.predicate)?.as_ref().clone(),
            self.node(key.object)?.as_ref().clone(),
            label,
        )
        .ok()
    }
    fn matching(&self, pattern: &QuadPattern) -> Vec<QuadKey> {
        // A bound node that was never kept cannot match anything.
        let mut bound = [None; 4];
        let fields = [
            &pattern.subject,
            &pattern.predicate,
            &pattern.object,
            &pattern.label,
        ];
        for (slot, field) in bound.iter_mut().zip(fields) {
            if let Some(node) = field {
                match self.thing(node) {
                    Some(thing) => *slot = Some(thing),
                    None => return Vec::new(),
                }
            }
        }
        let [subject, predicate, object, label] = bound;
        let accept = |key: &QuadKey| {
            subject.is_none_or(|s| s == key.subject)
                && predicate.is_none_or(|p| p == key.predicate)
                && object.is_none_or(|o| o == key.object)
                && label.is_none_or(|l| l == key.label)
        };
        // scan the smallest candidate set among the bound positions
        let candidates = [
            subject.map(|s| self.by_subject.lookup(&s)),
            object.map(|o| self.by_object.lookup(&o)),
            label.map(|l| self.by_label.lookup(&l)),
            predicate.map(|p| self.by_predicate.lookup(&p)),
        ];
        let mut smallest: Option<&HashSet<QuadKey, ThingHasher>> = None;
        for candidate in candidates.into_iter().flatten() {
            match candidate {
                None => return Vec::new(),
                Some(set) => {
                    if smallest.is_none_or(|s| set.len() < s.len()) {
                        smallest = Some(set);
                    }
                }
            }
        }
        match smallest {
            Some(set) => set.iter().filter(|k| accept(k)).copied().collect(),
            None => self.quads.iter().copied().collect(),
        }
    }
}

// ------------- Store -------------
/// An indexed collection of quads.
///
/// Readers share the index, a commit holds it exclusively for as long as it
/// takes to apply one batch. There is no snapshot isolation, so writes block
/// concurrent reads while they are applied.
pub struct Store {
    mode: PersistenceMode,
    prefixes: Arc<PrefixTable>,
    index: RwLock<Index>,
    persistor: Mutex<Option<Persistor>>,
    closed: AtomicBool,
    // shared by every generator from id_generator, kept past every bN
    blank_ids: CounterGenerator,
    // labels currently held by an open write session, and the holding thread
    sessions: Mutex<HashMap<Option<Node>, ThreadId>>,
    released: Condvar,
}

impl Store {
    pub fn new(mode: PersistenceMode) -> Result<Store> {
        Self::with_prefixes(mode, PrefixTable::with_core())
    }
    pub fn with_prefixes(mode: PersistenceMode, prefixes: PrefixTable) -> Result<Store> {
        let mut index = Index::default();
        let blank_ids = CounterGenerator::new();
        let persistor = match &mode {
            PersistenceMode::InMemory => None,
            PersistenceMode::File(path) => {
                let mut persistor = Persistor::open(path)?;
                let restored = persistor.restore()?;
                for (thing, node) in restored.nodes {
                    if let Node::Blank(blank) = &node {
                        blank_ids.advance_past(blank.id());
                    }
                    index.nodes.keep(thing, Arc::new(node));
                }
                for key in restored.quads {
                    index.add(key);
                }
                Some(persistor)
            }
        };
        info!(
            nodes = index.nodes.len(),
            quads = index.quads.len(),
            prefixes = prefixes.len(),
            "store ready"
        );
        Ok(Store {
            mode,
            prefixes: Arc::new(prefixes),
            index: RwLock::new(index),
            persistor: Mutex::new(persistor),
            closed: AtomicBool::new(false),
            blank_ids,
            sessions: Mutex::new(HashMap::new()),
            released: Condvar::new(),
        })
    }
    pub fn mode(&self) -> &PersistenceMode {
        &self.mode
    }
    pub fn prefixes(&self) -> &Arc<PrefixTable> {
        &self.prefixes
    }
    /// Expands a possibly prefixed name into an IRI node.
    pub fn iri(&self, name: &str) -> Node {
        self.prefixes.iri(name)
    }
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(StoreError::Closed.into());
        }
        Ok(())
    }
    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Index>> {
        self.ensure_open()?;
        Ok(self.index.read()?)
    }

    // ------------- Writing -------------
    /// Inserts a batch atomically: either all new quads become visible when
    /// the call returns or, on error, none of them.
    pub fn insert(&self, quads: impl IntoIterator<Item = Quad>) -> Result<usize> {
        let quads: Vec<Quad> = quads.into_iter().collect();
        let labels: Vec<Option<Node>> = quads.iter().map(|q| q.label().cloned()).collect();
        let mut writer = self.writer_for_labels(labels)?;
        writer.write_quads(quads)?;
        writer.close()
    }
    /// Opens a write session on the default graph.
    ///
    /// A thread holding a session cannot open another one, directly or
    /// through [`Store::insert`], on a label it already holds: that is a
    /// [`QuadcladError::Lock`] error rather than a wait.
    pub fn writer(&self) -> Result<QuadWriter<'_>> {
        self.writer_for_labels([None])
    }
    pub fn writer_for(&self, label: Option<Node>) -> Result<QuadWriter<'_>> {
        self.writer_for_labels([label])
    }
    /// Opens a write session holding every given label. Blocks while any of
    /// them is held by another session.
    pub fn writer_for_labels(
        &self,
        labels: impl IntoIterator<Item = Option<Node>>,
    ) -> Result<QuadWriter<'_>> {
        self.ensure_open()?;
        let mut labels: Vec<Option<Node>> = labels.into_iter().collect();
        labels.sort();
        labels.dedup();
        let me = thread::current().id();
        let mut held = self.sessions.lock()?;
        loop {
            if let Some(label) = labels.iter().find(|label| held.get(*label) == Some(&me)) {
                return Err(QuadcladError::Lock(format!(
                    "this thread already holds a write session on {}",
                    match label {
                        Some(label) => label.to_string(),
                        None => "the default graph".to_owned(),
                    }
                )));
            }
            if !labels.iter().any(|label| held.contains_key(label)) {
                break;
            }
            held = self.released.wait(held)?;
        }
        for label in &labels {
            held.insert(label.clone(), me);
        }
        Ok(QuadWriter {
            store: self,
            labels,
            pending: Vec::new(),
            closed: false,
        })
    }
    fn release(&self, labels: &[Option<Node>]) {
        match self.sessions.lock() {
            Ok(mut held) => {
                for label in labels {
                    held.remove(label);
                }
            }
            Err(e) => warn!(error = %e, "could not release write session"),
        }
        self.released.notify_all();
    }
    fn commit(&self, quads: &[Quad]) -> Result<usize> {
        let mut index = self.index.write()?;
        let mut persistor = self.persistor.lock()?;
        // checked under the persistor lock so a concurrent close cannot slip in
        self.ensure_open()?;
        let mut staged: Vec<(Thing, Arc<Node>)> = Vec::new();
        let mut staged_things: HashMap<&Node, Thing> = HashMap::new();
        let mut keys = Vec::new();
        let mut seen = HashSet::new();
        for quad in quads {
            let subject = intern(&mut index, &mut staged, &mut staged_things, quad.subject());
            let predicate = intern(&mut index, &mut staged, &mut staged_things, quad.predicate());
            let object = intern(&mut index, &mut staged, &mut staged_things, quad.object());
            let label = match quad.label() {
                Some(label) => intern(&mut index, &mut staged, &mut staged_things, label),
                None => GENESIS,
            };
            let key = QuadKey {
                subject,
                predicate,
                object,
                label,
            };
            if !index.quads.contains(&key) && seen.insert(key) {
                keys.push(key);
            }
        }
        if let Some(persistor) = persistor.as_mut() {
            if let Err(e) = persistor.persist(&staged, &keys) {
                for (thing, _) in &staged {
                    index.nodes.release(*thing);
                }
                warn!(error = %e, quads = keys.len(), "commit failed");
                return Err(e);
            }
        }
        for (thing, node) in staged {
            if let Node::Blank(blank) = node.as_ref() {
                self.blank_ids.advance_past(blank.id());
            }
            index.nodes.keep(thing, node);
        }
        for key in &keys {
            index.add(*key);
        }
        debug!(written = quads.len(), inserted = keys.len(), "committed");
        Ok(keys.len())
    }
    /// Removes every quad matching the pattern and returns how many there were.
    pub fn delete_matching(&self, pattern: &QuadPattern) -> Result<usize> {
        let mut index = self.index.write()?;
        let mut persistor = self.persistor.lock()?;
        self.ensure_open()?;
        let keys = index.matching(pattern);
        if keys.is_empty() {
            return Ok(0);
        }
        if let Some(persistor) = persistor.as_mut() {
            persistor.remove(&keys)?;
        }
        for key in &keys {
            index.remove(key);
        }
        debug!(removed = keys.len(), "deleted");
        Ok(keys.len())
    }

    // ------------- Reading -------------
    /// An independent cursor over every quad in the store.
    pub fn quads(&self) -> Result<QuadIter<'_>> {
        self.lookup(&QuadPattern::any())
    }
    pub fn lookup(&self, pattern: &QuadPattern) -> Result<QuadIter<'_>> {
        let keys = self.read()?.matching(pattern);
        Ok(QuadIter {
            store: self,
            keys: keys.into_iter(),
        })
    }
    pub fn contains(&self, quad: &Quad) -> Result<bool> {
        let index = self.read()?;
        let thing = |node: &Node| index.thing(node);
        let key = (|| {
            Some(QuadKey {
                subject: thing(quad.subject())?,
                predicate: thing(quad.predicate())?,
                object: thing(quad.object())?,
                label: match quad.label() {
                    Some(label) => thing(label)?,
                    None => GENESIS,
                },
            })
        })();
        Ok(key.is_some_and(|key| index.quads.contains(&key)))
    }
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.quads.len())
    }
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
    pub fn node_count(&self) -> Result<usize> {
        Ok(self.read()?.nodes.len())
    }
    /// The store's counter generator. Every generator returned shares one
    /// counter, which is kept past each `bN` blank node the store keeps, so
    /// generated names never collide with kept ones or with each other.
    pub fn id_generator(&self) -> Result<CounterGenerator> {
        self.ensure_open()?;
        Ok(self.blank_ids.clone())
    }

    // ------------- Serialization -------------
    /// The canonical N-Quads rendering: one quad per line, lines sorted.
    pub fn to_nquads(&self) -> Result<String> {
        let mut lines = self
            .quads()?
            .map(|quad| quad.map(|q| q.to_string()))
            .collect::<Result<Vec<_>>>()?;
        lines.sort();
        let mut document = String::new();
        for line in lines {
            document.push_str(&line);
            document.push('\n');
        }
        Ok(document)
    }
    pub fn export_nquads(&self, out: &mut impl Write) -> Result<usize> {
        let document = self.to_nquads()?;
        out.write_all(document.as_bytes())?;
        out.flush()?;
        Ok(document.lines().count())
    }
    /// Reads an N-Quads document and inserts it as one batch.
    pub fn import_nquads(&self, input: impl BufRead) -> Result<usize> {
        let quads = nquads::read_nquads(input, &self.prefixes)?;
        self.insert(quads)
    }
    /// A blake3 hash of the canonical export, equal for equal contents.
    pub fn digest(&self) -> Result<String> {
        Ok(blake3::hash(self.to_nquads()?.as_bytes()).to_hex().to_string())
    }

    // ------------- Lifecycle -------------
    /// Shuts the store down. Committed data is already on disk, so closing
    /// only releases the backing file. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let persistor = self.persistor.lock()?.take();
        if let Some(persistor) = persistor {
            persistor.close()?;
        }
        self.released.notify_all();
        info!("store closed");
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "closing store on drop failed");
        }
    }
}

fn intern<'q>(
    index: &mut Index,
    staged: &mut Vec<(Thing, Arc<Node>)>,
    staged_things: &mut HashMap<&'q Node, Thing>,
    node: &'q Node,
) -> Thing {
    if let Some(thing) = index.thing(node) {
        return thing;
    }
    if let Some(thing) = staged_things.get(node) {
        return *thing;
    }
    let thing = index.nodes.reserve();
    staged.push((thing, Arc::new(node.clone())));
    staged_things.insert(node, thing);
    thing
}

// ------------- QuadIter -------------
/// A lazy cursor over the quads that matched when it was created.
pub struct QuadIter<'s> {
    store: &'s Store,
    keys: std::vec::IntoIter<QuadKey>,
}

impl Iterator for QuadIter<'_> {
    type Item = Result<Quad>;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.keys.next()?;
            let index = match self.store.read() {
                Ok(index) => index,
                Err(e) => return Some(Err(e)),
            };
            // deleted since the cursor was opened
            if !index.quads.contains(&key) {
                continue;
            }
            return index.quad(&key).map(Ok);
        }
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.keys.len()))
    }
}

// ------------- QuadWriter -------------
/// A write session. Quads are buffered until [`QuadWriter::flush`] or
/// [`QuadWriter::close`]; a writer dropped without closing discards them.
pub struct QuadWriter<'s> {
    store: &'s Store,
    labels: Vec<Option<Node>>,
    pending: Vec<Quad>,
    closed: bool,
}

impl QuadWriter<'_> {
    pub fn labels(&self) -> &[Option<Node>] {
        &self.labels
    }
    pub fn write_quad(&mut self, quad: Quad) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed.into());
        }
        let label = quad.label().cloned();
        if !self.labels.contains(&label) {
            return Err(QuadcladError::InvalidQuad(format!(
                "{} is outside the labels held by this session",
                quad
            )));
        }
        self.pending.push(quad);
        Ok(())
    }
    /// Buffers all quads or, if one is rejected, none of them.
    pub fn write_quads(&mut self, quads: impl IntoIterator<Item = Quad>) -> Result<()> {
        let before = self.pending.len();
        for quad in quads {
            if let Err(e) = self.write_quad(quad) {
                self.pending.truncate(before);
                return Err(e);
            }
        }
        Ok(())
    }
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
    /// Commits what has been written so far and keeps the session open.
    pub fn flush(&mut self) -> Result<usize> {
        if self.closed {
            return Err(StoreError::Closed.into());
        }
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(0);
        }
        self.store.commit(&pending)
    }
    /// Commits and ends the session. Closing again returns `Ok(0)`.
    pub fn close(&mut self) -> Result<usize> {
        if self.closed {
            return Ok(0);
        }
        let committed = self.flush();
        self.closed = true;
        self.store.release(&self.labels);
        committed
    }
}

impl Drop for QuadWriter<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if !self.pending.is_empty() {
                warn!(discarded = self.pending.len(), "write session dropped without close");
            }
            self.closed = true;
            self.store.release(&self.labels);
        }
    }
}
