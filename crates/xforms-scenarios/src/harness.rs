//! Drives a [`FormInstance`] by reference the way a form client would.
//! Helpers panic with the engine error so a failing step names itself.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use xforms_engine::{
    ClientObject, DefinitionError, EngineConfig, EngineError, FormDefinition, FormInstance,
    FormModel, NodeId, Payload, PlainFactory, ReactiveFactory, Result, StateObject,
    ValidationState,
};
use xforms_xpath_lite::XPathEvaluator;

pub struct Scenario<F: ReactiveFactory = PlainFactory> {
    instance: FormInstance<F>,
}

impl Scenario {
    pub fn init(definition: &FormDefinition) -> Self {
        Self::init_with(definition, PlainFactory, EngineConfig::default())
    }
}

impl<F: ReactiveFactory> Scenario<F> {
    pub fn try_init_with(
        definition: &FormDefinition,
        factory: F,
        config: EngineConfig,
    ) -> Result<Self, DefinitionError> {
        let model = Arc::new(FormModel::compile(definition)?);
        let instance = FormInstance::new(model, Arc::new(XPathEvaluator::new()), factory, config)?;
        Ok(Self { instance })
    }

    pub fn init_with(definition: &FormDefinition, factory: F, config: EngineConfig) -> Self {
        Self::try_init_with(definition, factory, config)
            .unwrap_or_else(|error| panic!("form '{}' failed to load: {error}", definition.title))
    }

    pub fn instance(&mut self) -> &mut FormInstance<F> {
        &mut self.instance
    }

    pub fn root(&self) -> NodeId {
        self.instance.root()
    }

    /// The single node at `reference`.
    pub fn node(&mut self, reference: &str) -> NodeId {
        self.instance
            .find(reference)
            .unwrap_or_else(|| panic!("no single node at {reference}"))
    }

    pub fn exists(&mut self, reference: &str) -> bool {
        self.instance.find(reference).is_some()
    }

    pub fn range(&mut self, reference: &str) -> NodeId {
        self.instance
            .find_range(reference)
            .unwrap_or_else(|| panic!("no repeat range at {reference}"))
    }

    pub fn try_answer(&mut self, reference: &str, value: &str) -> Result<NodeId> {
        let node = self
            .instance
            .find(reference)
            .ok_or_else(|| EngineError::UnknownReference(reference.to_owned()))?;
        self.instance.set_value(node, value)
    }

    pub fn answer(&mut self, reference: &str, value: &str) {
        if let Err(error) = self.try_answer(reference, value) {
            panic!("answering {reference} with '{value}' failed: {error}");
        }
    }

    /// Visible value of the leaf at `reference`.
    pub fn value(&mut self, reference: &str) -> String {
        let node = self.node(reference);
        self.instance
            .value(node)
            .unwrap_or_else(|error| panic!("reading {reference} failed: {error}"))
    }

    pub fn relevant(&mut self, reference: &str) -> bool {
        let node = self.node(reference);
        self.instance.is_relevant(node).unwrap_or_else(|error| panic!("{error}"))
    }

    pub fn readonly(&mut self, reference: &str) -> bool {
        let node = self.node(reference);
        self.instance.is_readonly(node).unwrap_or_else(|error| panic!("{error}"))
    }

    pub fn required(&mut self, reference: &str) -> bool {
        let node = self.node(reference);
        self.instance.is_required(node).unwrap_or_else(|error| panic!("{error}"))
    }

    pub fn label(&mut self, reference: &str) -> Option<String> {
        let node = self.node(reference);
        self.instance.label(node).unwrap_or_else(|error| panic!("{error}"))
    }

    pub fn validation(&mut self, reference: &str) -> ValidationState {
        let node = self.node(reference);
        self.instance
            .validation_state(node)
            .unwrap_or_else(|error| panic!("{error}"))
    }

    /// Current reference of every instance of the range at `reference`.
    pub fn instance_references(&mut self, reference: &str) -> Vec<String> {
        let range = self.range(reference);
        let instances = self.instance.children(range).unwrap_or_else(|error| panic!("{error}"));
        instances
            .into_iter()
            .map(|node| self.instance.reference(node).unwrap_or_else(|error| panic!("{error}")))
            .collect()
    }

    pub fn repeat_count(&mut self, reference: &str) -> usize {
        let range = self.range(reference);
        self.instance
            .children(range)
            .map(|instances| instances.len())
            .unwrap_or_else(|error| panic!("{error}"))
    }

    /// Append one instance to the range at `reference`.
    pub fn add_repeat(&mut self, reference: &str) {
        if let Err(error) = self.try_add_repeat(reference, None, 1) {
            panic!("adding to {reference} failed: {error}");
        }
    }

    pub fn try_add_repeat(&mut self, reference: &str, after: Option<usize>, count: usize) -> Result<NodeId> {
        let range = self
            .instance
            .find_range(reference)
            .ok_or_else(|| EngineError::UnknownReference(reference.to_owned()))?;
        self.instance.add_instances(range, after, count)
    }

    /// Remove the instance at 0-based `index` of the range at `reference`.
    pub fn remove_repeat(&mut self, reference: &str, index: usize) {
        if let Err(error) = self.try_remove_repeat(reference, index, 1) {
            panic!("removing {reference} #{index} failed: {error}");
        }
    }

    pub fn try_remove_repeat(&mut self, reference: &str, start: usize, count: usize) -> Result<NodeId> {
        let range = self
            .instance
            .find_range(reference)
            .ok_or_else(|| EngineError::UnknownReference(reference.to_owned()))?;
        self.instance.remove_instances(range, start, count)
    }

    pub fn set_language(&mut self, language: &str) {
        if let Err(error) = self.instance.set_language(language) {
            panic!("switching to {language} failed: {error}");
        }
    }
}

/// One field pushed into a client object after its creation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub field: String,
    pub value: Payload,
}

/// Factory whose objects log every field write into a shared journal.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    journal: Rc<RefCell<Vec<FieldWrite>>>,
    created: Rc<RefCell<usize>>,
}

impl RecordingFactory {
    pub fn journal(&self) -> Rc<RefCell<Vec<FieldWrite>>> {
        Rc::clone(&self.journal)
    }

    pub fn created(&self) -> Rc<RefCell<usize>> {
        Rc::clone(&self.created)
    }
}

#[derive(Debug)]
pub struct RecordingObject {
    fields: IndexMap<&'static str, Payload>,
    journal: Rc<RefCell<Vec<FieldWrite>>>,
}

impl ClientObject for RecordingObject {
    fn fields(&self) -> Vec<&str> {
        self.fields.keys().copied().collect()
    }

    fn get(&self, field: &str) -> Option<Payload> {
        self.fields.get(field).cloned()
    }

    fn set(&mut self, field: &str, value: Payload) {
        if let Some(slot) = self.fields.get_mut(field) {
            *slot = value.clone();
            self.journal.borrow_mut().push(FieldWrite {
                field: field.to_owned(),
                value,
            });
        }
    }
}

impl ReactiveFactory for RecordingFactory {
    type Object = RecordingObject;

    fn create(&mut self, state: StateObject) -> RecordingObject {
        *self.created.borrow_mut() += 1;
        RecordingObject {
            fields: state,
            journal: Rc::clone(&self.journal),
        }
    }
}
