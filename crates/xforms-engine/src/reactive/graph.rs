//! Arena of reactive cells.
//!
//! Three roles share the arena: signals hold written state, memos cache a
//! derived value, effects are derived cells that get queued whenever they go
//! stale. Writes push staleness downwards (`Dirty` for direct subscribers,
//! `Check` further down); reads pull and recompute on demand, see
//! [`super::Runtime`].

use super::scope::{ScopeId, Scopes};
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Generational index into the graph.
/// A disposed cell's id never resolves again, even after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    index: u32,
    generation: u32,
}

impl CellId {
    pub(crate) fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// How far a cell is from its last computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Freshness {
    Clean,
    /// Some transitive source changed; sources must be verified first.
    Check,
    /// A direct source changed.
    Dirty,
}

#[derive(Debug, Clone)]
pub enum Role<K> {
    Signal,
    Memo(K),
    Effect(K),
}

#[derive(Debug)]
struct Cell<K, V> {
    role: Role<K>,
    value: Option<V>,
    freshness: Freshness,
    computing: bool,
    sources: SmallVec<[CellId; 4]>,
    subscribers: SmallVec<[CellId; 4]>,
}

#[derive(Debug)]
struct Slot<K, V> {
    generation: u32,
    cell: Option<Cell<K, V>>,
}

#[derive(Debug)]
struct Frame {
    cell: CellId,
    reads: SmallVec<[CellId; 8]>,
}

/// Counters for tooling and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub live_cells: usize,
    pub live_scopes: usize,
    pub recomputations: u64,
}

pub struct Graph<K, V> {
    slots: Vec<Slot<K, V>>,
    free: Vec<u32>,
    frames: Vec<Frame>,
    effects: VecDeque<CellId>,
    scopes: Scopes,
    live: usize,
    recomputations: u64,
}

impl<K: Clone, V: Clone + PartialEq> Graph<K, V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            frames: Vec::new(),
            effects: VecDeque::new(),
            scopes: Scopes::new(),
            live: 0,
            recomputations: 0,
        }
    }

    pub fn create_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.create(parent)
    }

    /// Create a signal holding `value`.
    pub fn signal(&mut self, scope: ScopeId, value: V) -> CellId {
        self.insert(scope, Role::Signal, Some(value), Freshness::Clean)
    }

    /// Create a memo. Nothing is computed until the first read.
    pub fn memo(&mut self, scope: ScopeId, kind: K) -> CellId {
        self.insert(scope, Role::Memo(kind), None, Freshness::Dirty)
    }

    /// Create an effect. It is queued and runs on the next flush.
    pub fn effect(&mut self, scope: ScopeId, kind: K) -> CellId {
        let id = self.insert(scope, Role::Effect(kind), None, Freshness::Dirty);
        self.effects.push_back(id);
        id
    }

    fn insert(&mut self, scope: ScopeId, role: Role<K>, value: Option<V>, freshness: Freshness) -> CellId {
        let cell = Cell {
            role,
            value,
            freshness,
            computing: false,
            sources: SmallVec::new(),
            subscribers: SmallVec::new(),
        };
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.cell = Some(cell);
            CellId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                cell: Some(cell),
            });
            CellId { index, generation: 0 }
        };
        self.live += 1;
        if !self.scopes.adopt(scope, id) {
            log::warn!("cell {id:?} created in disposed scope {scope:?}");
        }
        id
    }

    fn cell(&self, id: CellId) -> Option<&Cell<K, V>> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.cell.as_ref())
    }

    fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell<K, V>> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.cell.as_mut())
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.cell(id).is_some()
    }

    /// Current cached value without tracking or recomputation.
    pub fn peek(&self, id: CellId) -> Option<&V> {
        self.cell(id).and_then(|cell| cell.value.as_ref())
    }

    pub fn freshness(&self, id: CellId) -> Option<Freshness> {
        self.cell(id).map(|cell| cell.freshness)
    }

    pub fn is_computing(&self, id: CellId) -> bool {
        self.cell(id).is_some_and(|cell| cell.computing)
    }

    pub fn is_effect(&self, id: CellId) -> bool {
        self.cell(id)
            .is_some_and(|cell| matches!(cell.role, Role::Effect(_)))
    }

    /// The kind of a memo or effect.
    pub fn kind(&self, id: CellId) -> Option<&K> {
        match &self.cell(id)?.role {
            Role::Signal => None,
            Role::Memo(kind) | Role::Effect(kind) => Some(kind),
        }
    }

    pub fn sources(&self, id: CellId) -> SmallVec<[CellId; 4]> {
        self.cell(id)
            .map(|cell| cell.sources.clone())
            .unwrap_or_default()
    }

    pub fn subscribers(&self, id: CellId) -> SmallVec<[CellId; 4]> {
        self.cell(id)
            .map(|cell| cell.subscribers.clone())
            .unwrap_or_default()
    }

    /// Write a signal. Returns false when the value is unchanged or the cell
    /// is not a live signal.
    pub fn write(&mut self, id: CellId, value: V) -> bool {
        let Some(cell) = self.cell_mut(id) else {
            return false;
        };
        if !matches!(cell.role, Role::Signal) {
            log::warn!("write to non-signal cell {id:?} ignored");
            return false;
        }
        if cell.value.as_ref() == Some(&value) {
            return false;
        }
        cell.value = Some(value);
        let subscribers = cell.subscribers.clone();
        for subscriber in subscribers {
            self.mark(subscriber, Freshness::Dirty);
        }
        true
    }

    /// Raise `id` to `state` and everything downstream of it to `Check`.
    pub fn mark(&mut self, id: CellId, state: Freshness) {
        let mut pending = vec![(id, state)];
        while let Some((id, state)) = pending.pop() {
            let Some(cell) = self.cell_mut(id) else {
                continue;
            };
            if cell.freshness >= state {
                continue;
            }
            let was_clean = cell.freshness == Freshness::Clean;
            cell.freshness = state;
            let is_effect = matches!(cell.role, Role::Effect(_));
            pending.extend(
                cell.subscribers
                    .iter()
                    .map(|subscriber| (*subscriber, Freshness::Check)),
            );
            if was_clean && is_effect {
                self.effects.push_back(id);
            }
        }
    }

    pub(crate) fn set_clean(&mut self, id: CellId) {
        if let Some(cell) = self.cell_mut(id) {
            cell.freshness = Freshness::Clean;
        }
    }

    /// Register a read of `id` with the computation currently running.
    pub fn record_read(&mut self, id: CellId) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.cell != id && !frame.reads.contains(&id) {
                frame.reads.push(id);
            }
        }
    }

    /// Start recomputing `id`: drop its old subscriptions and open a tracking
    /// frame. Returns `None` for signals, dead cells and cells already
    /// being computed.
    pub(crate) fn begin(&mut self, id: CellId) -> Option<K> {
        let cell = self.cell_mut(id)?;
        if cell.computing {
            return None;
        }
        let kind = match &cell.role {
            Role::Signal => return None,
            Role::Memo(kind) | Role::Effect(kind) => kind.clone(),
        };
        cell.computing = true;
        cell.freshness = Freshness::Clean;
        let sources = std::mem::take(&mut cell.sources);
        for source in sources {
            if let Some(source) = self.cell_mut(source) {
                source.subscribers.retain(|subscriber| *subscriber != id);
            }
        }
        self.frames.push(Frame {
            cell: id,
            reads: SmallVec::new(),
        });
        Some(kind)
    }

    /// Close the tracking frame of `id`, subscribe it to what it read and
    /// store `value`. Returns whether the value changed.
    pub(crate) fn finish(&mut self, id: CellId, value: V) -> bool {
        let reads = match self.frames.pop() {
            Some(frame) if frame.cell == id => frame.reads,
            Some(frame) => {
                log::error!("tracking frame mismatch: expected {id:?}, found {:?}", frame.cell);
                frame.reads
            }
            None => SmallVec::new(),
        };
        self.recomputations += 1;
        let mut sources = SmallVec::new();
        for source in reads {
            if let Some(cell) = self.cell_mut(source) {
                if !cell.subscribers.contains(&id) {
                    cell.subscribers.push(id);
                }
                sources.push(source);
            }
        }
        let Some(cell) = self.cell_mut(id) else {
            return false;
        };
        cell.computing = false;
        cell.sources = sources;
        if cell.value.as_ref() == Some(&value) {
            return false;
        }
        cell.value = Some(value);
        let subscribers = cell.subscribers.clone();
        for subscriber in subscribers {
            self.mark(subscriber, Freshness::Dirty);
        }
        true
    }

    pub(crate) fn pop_effect(&mut self) -> Option<CellId> {
        self.effects.pop_front()
    }

    pub(crate) fn clear_effects(&mut self) {
        self.effects.clear();
    }

    pub fn has_pending_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    /// Dispose `scope` and every cell it (transitively) owns.
    pub fn dispose_scope(&mut self, scope: ScopeId) {
        for id in self.scopes.dispose(scope) {
            self.dispose_cell(id);
        }
    }

    fn dispose_cell(&mut self, id: CellId) {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return;
        };
        if slot.generation != id.generation {
            return;
        }
        let Some(cell) = slot.cell.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        for source in cell.sources {
            if let Some(source) = self.cell_mut(source) {
                source.subscribers.retain(|subscriber| *subscriber != id);
            }
        }
        // Subscribers keep the dead id in their sources; verification treats
        // a dead source as changed.
        for subscriber in cell.subscribers {
            self.mark(subscriber, Freshness::Dirty);
        }
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            live_cells: self.live,
            live_scopes: self.scopes.len(),
            recomputations: self.recomputations,
        }
    }
}

impl<K: Clone, V: Clone + PartialEq> Default for Graph<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestGraph = Graph<&'static str, i64>;

    #[test]
    fn write_marks_direct_subscribers_dirty_and_the_rest_check() {
        let mut graph = TestGraph::new();
        let a = graph.signal(ScopeId::ROOT, 1);
        let b = graph.memo(ScopeId::ROOT, "b");
        let c = graph.memo(ScopeId::ROOT, "c");

        graph.begin(b).unwrap();
        graph.record_read(a);
        graph.finish(b, 2);
        graph.begin(c).unwrap();
        graph.record_read(b);
        graph.finish(c, 3);

        assert_eq!(graph.freshness(b), Some(Freshness::Clean));
        assert!(graph.write(a, 5));
        assert_eq!(graph.freshness(b), Some(Freshness::Dirty));
        assert_eq!(graph.freshness(c), Some(Freshness::Check));
    }

    #[test]
    fn unchanged_write_is_ignored() {
        let mut graph = TestGraph::new();
        let a = graph.signal(ScopeId::ROOT, 1);
        assert!(!graph.write(a, 1));
    }

    #[test]
    fn disposed_cell_id_never_resolves_again() {
        let mut graph = TestGraph::new();
        let scope = graph.create_scope(ScopeId::ROOT);
        let a = graph.signal(scope, 1);
        graph.dispose_scope(scope);
        let b = graph.signal(ScopeId::ROOT, 2);

        assert_eq!(a.index(), b.index());
        assert!(!graph.contains(a));
        assert_eq!(graph.peek(b), Some(&2));
        assert_eq!(graph.stats().live_cells, 1);
    }

    #[test]
    fn effects_are_queued_once_until_they_run() {
        let mut graph = TestGraph::new();
        let a = graph.signal(ScopeId::ROOT, 1);
        let effect = graph.effect(ScopeId::ROOT, "effect");
        assert_eq!(graph.pop_effect(), Some(effect));

        graph.begin(effect).unwrap();
        graph.record_read(a);
        graph.finish(effect, 1);

        graph.write(a, 2);
        graph.write(a, 3);
        assert_eq!(graph.pop_effect(), Some(effect));
        assert_eq!(graph.pop_effect(), None);
    }
}
