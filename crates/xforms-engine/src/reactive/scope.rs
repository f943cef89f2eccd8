//! Hierarchical reactive scopes.
//!
//! A scope owns the cells created on its behalf. Disposing a scope disposes
//! every descendant scope first and hands back all cells that have to be
//! torn down.

use super::graph::CellId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Identifier of a reactive scope. Never reused within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub const ROOT: Self = Self(0);
}

#[derive(Debug, Default)]
struct ScopeData {
    parent: Option<ScopeId>,
    children: SmallVec<[ScopeId; 4]>,
    cells: Vec<CellId>,
}

#[derive(Debug)]
pub struct Scopes {
    scopes: FxHashMap<ScopeId, ScopeData>,
    next: u64,
}

impl Scopes {
    pub fn new() -> Self {
        let mut scopes = FxHashMap::default();
        scopes.insert(ScopeId::ROOT, ScopeData::default());
        Self { scopes, next: 1 }
    }

    /// Create a child scope of `parent`.
    pub fn create(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.next);
        self.next += 1;
        self.scopes.insert(
            id,
            ScopeData {
                parent: Some(parent),
                ..ScopeData::default()
            },
        );
        if let Some(parent) = self.scopes.get_mut(&parent) {
            parent.children.push(id);
        }
        id
    }

    pub fn contains(&self, scope: ScopeId) -> bool {
        self.scopes.contains_key(&scope)
    }

    /// Record that `cell` belongs to `scope`. Returns false for a disposed scope.
    pub fn adopt(&mut self, scope: ScopeId, cell: CellId) -> bool {
        match self.scopes.get_mut(&scope) {
            Some(data) => {
                data.cells.push(cell);
                true
            }
            None => false,
        }
    }

    /// Remove `scope` and all of its descendants, returning every owned cell.
    ///
    /// Cells of descendant scopes come before the cells of their ancestors.
    pub fn dispose(&mut self, scope: ScopeId) -> Vec<CellId> {
        let mut cells = Vec::new();
        let Some(data) = self.scopes.get(&scope) else {
            return cells;
        };
        if let Some(parent) = data.parent.and_then(|parent| self.scopes.get_mut(&parent)) {
            parent.children.retain(|child| *child != scope);
        }
        self.collect(scope, &mut cells);
        cells
    }

    fn collect(&mut self, scope: ScopeId, cells: &mut Vec<CellId>) {
        let Some(data) = self.scopes.remove(&scope) else {
            return;
        };
        for child in data.children {
            self.collect(child, cells);
        }
        cells.extend(data.cells);
    }

    /// Number of live scopes, the root scope included.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}
