use super::graph::{CellId, Freshness, Graph};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlushError {
    #[error("effects did not settle after {iterations} runs")]
    Unsettled { iterations: usize },
}

/// Pull-based evaluation over a [`Graph`].
///
/// Implementors own the graph and know how to compute a cell of their kind;
/// staleness verification, dependency tracking and effect flushing are
/// provided.
pub trait Runtime {
    type Kind: Clone;
    type Value: Clone + PartialEq + Default;

    fn graph(&self) -> &Graph<Self::Kind, Self::Value>;

    fn graph_mut(&mut self) -> &mut Graph<Self::Kind, Self::Value>;

    /// Compute a memo or effect. Every [`Runtime::read`] made from here is
    /// recorded as a dependency of `cell`.
    fn compute(&mut self, cell: CellId, kind: &Self::Kind) -> Self::Value;

    /// Side effect of an effect cell whose computed value changed. Runs
    /// outside of any tracking frame.
    fn apply_effect(&mut self, _cell: CellId, _kind: &Self::Kind, _value: &Self::Value) {}

    fn max_effect_runs(&self) -> usize {
        10_000
    }

    /// Tracked read: brings `cell` up to date and records the dependency.
    fn read(&mut self, cell: CellId) -> Self::Value {
        self.refresh(cell);
        self.graph_mut().record_read(cell);
        self.graph().peek(cell).cloned().unwrap_or_default()
    }

    /// Read without registering a dependency.
    fn read_untracked(&mut self, cell: CellId) -> Self::Value {
        self.refresh(cell);
        self.graph().peek(cell).cloned().unwrap_or_default()
    }

    /// Bring `cell` up to date. Returns true if it was recomputed to a new
    /// value.
    fn refresh(&mut self, cell: CellId) -> bool {
        if self.graph().is_computing(cell) {
            log::warn!("dependency cycle through cell {cell:?}; using its previous value");
            return false;
        }
        match self.graph().freshness(cell) {
            None | Some(Freshness::Clean) => return false,
            Some(Freshness::Check) => {
                for source in self.graph().sources(cell) {
                    if !self.graph().contains(source) {
                        self.graph_mut().mark(cell, Freshness::Dirty);
                        break;
                    }
                    self.refresh(source);
                    if self.graph().freshness(cell) == Some(Freshness::Dirty) {
                        break;
                    }
                }
                if self.graph().freshness(cell) == Some(Freshness::Check) {
                    self.graph_mut().set_clean(cell);
                    return false;
                }
            }
            Some(Freshness::Dirty) => {}
        }
        let Some(kind) = self.graph_mut().begin(cell) else {
            return false;
        };
        let value = self.compute(cell, &kind);
        self.graph_mut().finish(cell, value)
    }

    /// Run queued effects until none are stale.
    fn flush(&mut self) -> Result<(), FlushError> {
        let limit = self.max_effect_runs();
        let mut runs = 0;
        while let Some(effect) = self.graph_mut().pop_effect() {
            match self.graph().freshness(effect) {
                None | Some(Freshness::Clean) => continue,
                Some(_) => {}
            }
            runs += 1;
            if runs > limit {
                self.graph_mut().clear_effects();
                return Err(FlushError::Unsettled { iterations: limit });
            }
            if self.refresh(effect) {
                let Some(kind) = self.graph().kind(effect).cloned() else {
                    continue;
                };
                let Some(value) = self.graph().peek(effect).cloned() else {
                    continue;
                };
                self.apply_effect(effect, &kind, &value);
            }
        }
        Ok(())
    }
}
