//! Fine-grained reactive substrate: signals, memos and effects over an arena
//! with push-dirty / pull-recompute evaluation.

mod graph;
mod runtime;
mod scope;

pub use graph::{CellId, Freshness, Graph, GraphStats, Role};
pub use runtime::{FlushError, Runtime};
pub use scope::{ScopeId, Scopes};
