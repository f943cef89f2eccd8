//! A small XPath 1.0 subset evaluator for the XForms engine.
//!
//! Covers location paths with child, parent and self steps, numeric and
//! boolean predicates, the usual operators and the function library ODK
//! forms use for calculations, relevance and constraints.

pub mod ast;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use parser::{SyntaxError, parse};

use ast::Expr;
use eval::{Context, Value};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};
use xforms_engine::error::EvaluationError;
use xforms_engine::{EvaluationContext, ExpressionEvaluator, ResultType, TypedResult};

/// Evaluator with a parse cache keyed by expression text.
///
/// Contextualized expressions differ per repeat instance, so the cache is
/// bounded: once it holds `cache_limit` entries it starts over.
pub struct XPathEvaluator {
    parsed: Mutex<FxHashMap<String, Result<Arc<Expr>, EvaluationError>>>,
    cache_limit: usize,
}

impl Default for XPathEvaluator {
    fn default() -> Self {
        Self::with_cache_limit(4096)
    }
}

impl XPathEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_limit(cache_limit: usize) -> Self {
        Self {
            parsed: Mutex::default(),
            cache_limit: cache_limit.max(1),
        }
    }

    /// Number of parsed expressions currently cached.
    pub fn cached(&self) -> usize {
        self.parsed.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn parse_cached(&self, expression: &str) -> Result<Arc<Expr>, EvaluationError> {
        let mut parsed = self.parsed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = parsed.get(expression) {
            return entry.clone();
        }
        let entry = parse(expression).map(Arc::new).map_err(|errors| {
            let (span, message) = errors
                .into_iter()
                .next()
                .map(|error| (error.span, error.message))
                .unwrap_or((0..expression.len(), "unexpected end of input".to_owned()));
            EvaluationError::Syntax {
                expression: expression.to_owned(),
                span,
                message,
            }
        });
        if let Err(error) = &entry {
            log::debug!("{error}");
        }
        if parsed.len() >= self.cache_limit {
            log::debug!("parse cache reached {} entries, clearing", parsed.len());
            parsed.clear();
        }
        parsed.insert(expression.to_owned(), entry.clone());
        entry
    }
}

impl ExpressionEvaluator for XPathEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        result_type: ResultType,
        context: EvaluationContext<'_>,
    ) -> Result<TypedResult, EvaluationError> {
        let parsed = self.parse_cached(expression)?;
        let context = Context::new(context.node, context.document);
        let value = parsed.evaluate(&context)?;
        Ok(match result_type {
            ResultType::Boolean => TypedResult::Boolean(eval::boolean(&value)),
            ResultType::Number => TypedResult::Number(context.number(&value)),
            ResultType::String => TypedResult::String(context.string(&value)),
            ResultType::Nodes => match value {
                Value::Nodes(nodes) => TypedResult::Nodes(nodes),
                _ => {
                    return Err(EvaluationError::Type(format!(
                        "'{expression}' does not select nodes"
                    )));
                }
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xforms_engine::{DocumentView, NodeId};

    /// `/data` with leaves `a`, `b` and two `rep` instances holding `x`.
    struct Fixture {
        nodes: Vec<(Option<usize>, &'static str, &'static str)>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                nodes: vec![
                    (None, "data", ""),
                    (Some(0), "a", "3"),
                    (Some(0), "b", "yes no"),
                    (Some(0), "rep", ""),
                    (Some(3), "x", "1"),
                    (Some(0), "rep", ""),
                    (Some(5), "x", "4"),
                ],
            }
        }

        fn id(&self, index: usize) -> NodeId {
            NodeId::from_index(index)
        }
    }

    impl DocumentView for Fixture {
        fn root(&self) -> NodeId {
            self.id(0)
        }

        fn parent(&self, node: NodeId) -> Option<NodeId> {
            self.nodes[node.index()].0.map(|parent| self.id(parent))
        }

        fn children(&self, node: NodeId) -> Vec<NodeId> {
            (0..self.nodes.len())
                .filter(|index| self.nodes[*index].0 == Some(node.index()))
                .map(|index| self.id(index))
                .collect()
        }

        fn name(&self, node: NodeId) -> Option<&str> {
            Some(self.nodes[node.index()].1)
        }

        fn string_value(&self, node: NodeId) -> String {
            let (_, _, value) = self.nodes[node.index()];
            if value.is_empty() {
                self.children(node)
                    .into_iter()
                    .map(|child| self.string_value(child))
                    .collect()
            } else {
                value.to_owned()
            }
        }

        fn language(&self) -> Option<&str> {
            Some("en")
        }

        fn translate(&self, id: &str) -> Option<&str> {
            (id == "greeting").then_some("Hello")
        }
    }

    fn evaluate(expression: &str, result_type: ResultType, node: usize) -> TypedResult {
        let fixture = Fixture::new();
        XPathEvaluator::new()
            .evaluate(
                expression,
                result_type,
                EvaluationContext {
                    node: fixture.id(node),
                    document: &fixture,
                },
            )
            .unwrap()
    }

    #[test]
    fn arithmetic_over_paths() {
        assert_eq!(
            evaluate("/data/a * 2 + 1", ResultType::Number, 0),
            TypedResult::Number(7.0)
        );
        assert_eq!(
            evaluate("2 * ../../a", ResultType::Number, 4),
            TypedResult::Number(6.0)
        );
    }

    #[test]
    fn parse_cache_stays_bounded() {
        let fixture = Fixture::new();
        let evaluator = XPathEvaluator::with_cache_limit(2);
        for position in 1..=5 {
            let result = evaluator
                .evaluate(
                    &format!("/data/rep[{position}]/x"),
                    ResultType::String,
                    EvaluationContext {
                        node: fixture.id(0),
                        document: &fixture,
                    },
                )
                .unwrap();
            assert!(evaluator.cached() <= 2);
            if position == 2 {
                assert_eq!(result, TypedResult::String("4".to_owned()));
            }
        }
        assert_eq!(evaluator.cached(), 1);
    }

    #[test]
    fn positional_predicates_pick_instances() {
        assert_eq!(
            evaluate("/data/rep[2]/x", ResultType::String, 0),
            TypedResult::String("4".to_owned())
        );
        assert_eq!(
            evaluate("sum(/data/rep/x)", ResultType::Number, 0),
            TypedResult::Number(5.0)
        );
        assert_eq!(
            evaluate("count(/data/rep)", ResultType::Number, 0),
            TypedResult::Number(2.0)
        );
    }

    #[test]
    fn position_of_repeat_instance() {
        assert_eq!(
            evaluate("position(..)", ResultType::Number, 6),
            TypedResult::Number(2.0)
        );
    }

    #[test]
    fn string_functions_and_selection() {
        assert_eq!(
            evaluate("selected(/data/b, 'no')", ResultType::Boolean, 0),
            TypedResult::Boolean(true)
        );
        assert_eq!(
            evaluate("count-selected(/data/b)", ResultType::Number, 0),
            TypedResult::Number(2.0)
        );
        assert_eq!(
            evaluate("concat(jr:itext('greeting'), ' ', /data/a)", ResultType::String, 0),
            TypedResult::String("Hello 3".to_owned())
        );
        assert_eq!(
            evaluate("if(/data/a > 2, 'big', 'small')", ResultType::String, 0),
            TypedResult::String("big".to_owned())
        );
    }

    #[test]
    fn node_set_comparison_is_existential() {
        assert_eq!(
            evaluate("/data/rep/x = 4", ResultType::Boolean, 0),
            TypedResult::Boolean(true)
        );
        assert_eq!(
            evaluate("/data/missing = ''", ResultType::Boolean, 0),
            TypedResult::Boolean(false)
        );
    }

    #[test]
    fn syntax_errors_are_cached_and_reported() {
        let fixture = Fixture::new();
        let evaluator = XPathEvaluator::new();
        let context = EvaluationContext {
            node: fixture.id(0),
            document: &fixture,
        };
        for _ in 0..2 {
            let error = evaluator
                .evaluate("1 +", ResultType::Number, context)
                .unwrap_err();
            assert!(matches!(error, EvaluationError::Syntax { .. }));
        }
        assert_eq!(evaluator.parsed.lock().unwrap().len(), 1);
    }

    #[test]
    fn unknown_functions_fail() {
        let fixture = Fixture::new();
        let error = XPathEvaluator::new()
            .evaluate(
                "uuid()",
                ResultType::String,
                EvaluationContext {
                    node: fixture.id(0),
                    document: &fixture,
                },
            )
            .unwrap_err();
        assert_eq!(
            error,
            EvaluationError::UnknownFunction {
                name: "uuid".to_owned()
            }
        );
    }
}
