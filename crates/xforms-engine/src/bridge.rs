//! One-directional mirror of node state into client objects.
//!
//! The engine hands a plain field map to a caller-supplied
//! [`ReactiveFactory`] once per node and mirror target, then pushes each
//! changed field into the returned object. Clients only ever get shared
//! references to their objects, so the mirrored state is read-only to them.

use crate::error::BridgeError;
use crate::instance::{NodeId, Payload};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// Field name -> initial value.
pub type StateObject = IndexMap<&'static str, Payload>;

/// A client-side object with the same shape as the [`StateObject`] it was
/// created from.
pub trait ClientObject {
    fn fields(&self) -> Vec<&str>;

    fn get(&self, field: &str) -> Option<Payload>;

    /// Called by the engine only, with a field that changed.
    fn set(&mut self, field: &str, value: Payload);
}

/// Strategy creating client objects, supplied once per form instance.
pub trait ReactiveFactory {
    type Object: ClientObject;

    fn create(&mut self, state: StateObject) -> Self::Object;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorTarget {
    /// `currentState`: reference, relevance, value, children and so on.
    Current,
    /// `validationState`: own violation or descendant violations.
    Validation,
}

/// Factory producing [`PlainState`] objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFactory;

/// Plain field map without any client reactivity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlainState(StateObject);

impl PlainState {
    pub fn field(&self, field: &str) -> Option<&Payload> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Payload)> {
        self.0.iter().map(|(field, value)| (*field, value))
    }
}

impl ClientObject for PlainState {
    fn fields(&self) -> Vec<&str> {
        self.0.keys().copied().collect()
    }

    fn get(&self, field: &str) -> Option<Payload> {
        self.0.get(field).cloned()
    }

    fn set(&mut self, field: &str, value: Payload) {
        if let Some(slot) = self.0.get_mut(field) {
            *slot = value;
        }
    }
}

impl ReactiveFactory for PlainFactory {
    type Object = PlainState;

    fn create(&mut self, state: StateObject) -> PlainState {
        PlainState(state)
    }
}

pub(crate) struct Bridge<F: ReactiveFactory> {
    factory: F,
    objects: FxHashMap<(NodeId, MirrorTarget), F::Object>,
    enabled: bool,
}

impl<F: ReactiveFactory> Bridge<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            objects: FxHashMap::default(),
            enabled: false,
        }
    }

    /// Nodes created from now on get mirrored as soon as they exist.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn create(
        &mut self,
        node: NodeId,
        target: MirrorTarget,
        state: StateObject,
    ) -> Result<(), BridgeError> {
        let mut expected: Vec<String> = state.keys().map(|field| (*field).to_owned()).collect();
        let object = self.factory.create(state);
        let mut found: Vec<String> = object.fields().into_iter().map(str::to_owned).collect();
        expected.sort();
        found.sort();
        if expected != found {
            return Err(BridgeError::ShapeMismatch { expected, found });
        }
        self.objects.insert((node, target), object);
        Ok(())
    }

    /// Push `value` into `field` unless the object already holds it.
    pub fn propagate(&mut self, node: NodeId, target: MirrorTarget, field: &str, value: &Payload) {
        let Some(object) = self.objects.get_mut(&(node, target)) else {
            return;
        };
        if object.get(field).as_ref() == Some(value) {
            return;
        }
        log::trace!("mirror {node:?}.{field} <- {value:?}");
        object.set(field, value.clone());
    }

    pub fn get(&self, node: NodeId, target: MirrorTarget) -> Option<&F::Object> {
        self.objects.get(&(node, target))
    }

    pub fn release(&mut self, node: NodeId) {
        self.objects.remove(&(node, MirrorTarget::Current));
        self.objects.remove(&(node, MirrorTarget::Validation));
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }
}
