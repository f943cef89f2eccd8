//! Scenario harness for the XForms engine: shared form fixtures and a
//! reference-driven [`Scenario`] wrapper over a form instance, evaluated with
//! the `xforms-xpath-lite` evaluator.

pub mod forms;
pub mod harness;

pub use harness::{FieldWrite, RecordingFactory, RecordingObject, Scenario};
