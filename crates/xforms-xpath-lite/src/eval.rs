//! Tree-walking evaluation over a [`DocumentView`].

use crate::ast::{BinaryOperator, Expr, LocationPath, Step};
use crate::functions;
use xforms_engine::error::EvaluationError;
use xforms_engine::{DocumentView, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nodes(Vec<NodeId>),
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub node: NodeId,
    /// 1-based position within the node list being filtered.
    pub position: usize,
    pub size: usize,
    pub document: &'a dyn DocumentView,
}

impl<'a> Context<'a> {
    pub fn new(node: NodeId, document: &'a dyn DocumentView) -> Self {
        Self {
            node,
            position: 1,
            size: 1,
            document,
        }
    }

    fn at(self, node: NodeId, position: usize, size: usize) -> Self {
        Self {
            node,
            position,
            size,
            ..self
        }
    }

    pub fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|node| self.document.string_value(*node))
                .unwrap_or_default(),
            Value::Boolean(value) => value.to_string(),
            Value::Number(number) => format_number(*number),
            Value::String(text) => text.clone(),
        }
    }

    pub fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Number(number) => *number,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
            other => parse_number(&self.string(other)),
        }
    }
}

pub fn boolean(value: &Value) -> bool {
    match value {
        Value::Nodes(nodes) => !nodes.is_empty(),
        Value::Boolean(value) => *value,
        Value::Number(number) => *number != 0.0 && !number.is_nan(),
        Value::String(text) => !text.is_empty(),
    }
}

/// XPath number syntax only: optional minus, digits, optional fraction.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !digits.is_empty()
        && digits.chars().any(|character| character.is_ascii_digit())
        && digits
            .chars()
            .all(|character| character.is_ascii_digit() || character == '.')
        && digits.matches('.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

pub fn format_number(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_owned()
    } else if number.is_infinite() {
        if number > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if number == number.trunc() && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        format!("{number}")
    }
}

impl Expr {
    pub fn evaluate(&self, context: &Context<'_>) -> Result<Value, EvaluationError> {
        match self {
            Self::Number(number) => Ok(Value::Number(*number)),
            Self::Literal(text) => Ok(Value::String(text.clone())),
            Self::Path(path) => path.select(context).map(Value::Nodes),
            Self::Call { name, arguments } => functions::call(name, arguments, context),
            Self::Negate(operand) => {
                let value = operand.evaluate(context)?;
                Ok(Value::Number(-context.number(&value)))
            }
            Self::Binary { operator, lhs, rhs } => binary(*operator, lhs, rhs, context),
        }
    }
}

impl LocationPath {
    pub fn select(&self, context: &Context<'_>) -> Result<Vec<NodeId>, EvaluationError> {
        let document = context.document;
        let mut steps = self.steps.iter();
        let mut current = if self.absolute {
            let root = document.root();
            match steps.next() {
                None => return Ok(vec![root]),
                Some(Step::Child { name, predicates }) => {
                    let matches = document.name(root) == Some(name.as_str());
                    let candidates = if matches { vec![root] } else { Vec::new() };
                    filter(candidates, predicates, context)?
                }
                Some(_) => Vec::new(),
            }
        } else {
            vec![context.node]
        };

        for step in steps {
            let mut next = Vec::new();
            for node in &current {
                match step {
                    Step::Current => next.push(*node),
                    Step::Parent => next.extend(document.parent(*node)),
                    Step::Attribute(_) => {}
                    Step::Child { name, predicates } => {
                        let candidates = document
                            .children(*node)
                            .into_iter()
                            .filter(|child| document.name(*child) == Some(name.as_str()))
                            .collect();
                        next.extend(filter(candidates, predicates, context)?);
                    }
                }
            }
            dedup(&mut next);
            current = next;
        }
        Ok(current)
    }
}

fn filter(
    mut candidates: Vec<NodeId>,
    predicates: &[Expr],
    context: &Context<'_>,
) -> Result<Vec<NodeId>, EvaluationError> {
    for predicate in predicates {
        let size = candidates.len();
        let mut kept = Vec::with_capacity(size);
        for (index, candidate) in candidates.into_iter().enumerate() {
            let inner = context.at(candidate, index + 1, size);
            let keep = match predicate.evaluate(&inner)? {
                Value::Number(position) => position == (index + 1) as f64,
                other => boolean(&other),
            };
            if keep {
                kept.push(candidate);
            }
        }
        candidates = kept;
    }
    Ok(candidates)
}

fn dedup(nodes: &mut Vec<NodeId>) {
    let mut seen = rustc_hash::FxHashSet::default();
    nodes.retain(|node| seen.insert(*node));
}

fn binary(
    operator: BinaryOperator,
    lhs: &Expr,
    rhs: &Expr,
    context: &Context<'_>,
) -> Result<Value, EvaluationError> {
    match operator {
        BinaryOperator::Or => {
            let value = boolean(&lhs.evaluate(context)?) || boolean(&rhs.evaluate(context)?);
            return Ok(Value::Boolean(value));
        }
        BinaryOperator::And => {
            let value = boolean(&lhs.evaluate(context)?) && boolean(&rhs.evaluate(context)?);
            return Ok(Value::Boolean(value));
        }
        _ => {}
    }

    let left = lhs.evaluate(context)?;
    let right = rhs.evaluate(context)?;
    let arithmetic = |operation: fn(f64, f64) -> f64| -> Result<Value, EvaluationError> {
        Ok(Value::Number(operation(context.number(&left), context.number(&right))))
    };
    match operator {
        BinaryOperator::Add => arithmetic(|a, b| a + b),
        BinaryOperator::Subtract => arithmetic(|a, b| a - b),
        BinaryOperator::Multiply => arithmetic(|a, b| a * b),
        BinaryOperator::Divide => arithmetic(|a, b| a / b),
        BinaryOperator::Modulo => arithmetic(|a, b| a % b),
        BinaryOperator::Union => match (left, right) {
            (Value::Nodes(mut left), Value::Nodes(right)) => {
                left.extend(right);
                dedup(&mut left);
                Ok(Value::Nodes(left))
            }
            _ => Err(EvaluationError::Type(
                "the operands of '|' must be node-sets".to_owned(),
            )),
        },
        comparison => Ok(Value::Boolean(compare(comparison, &left, &right, context))),
    }
}

fn compare(operator: BinaryOperator, left: &Value, right: &Value, context: &Context<'_>) -> bool {
    let document = context.document;
    match (left, right) {
        (Value::Nodes(left), Value::Nodes(right)) => left.iter().any(|left| {
            let left = Value::String(document.string_value(*left));
            right.iter().any(|right| {
                let right = Value::String(document.string_value(*right));
                compare_atomic(operator, &left, &right, context)
            })
        }),
        (Value::Nodes(nodes), Value::Boolean(_)) | (Value::Boolean(_), Value::Nodes(nodes)) => {
            let nodes = Value::Boolean(!nodes.is_empty());
            if matches!(left, Value::Nodes(_)) {
                compare_atomic(operator, &nodes, right, context)
            } else {
                compare_atomic(operator, left, &nodes, context)
            }
        }
        (Value::Nodes(nodes), other) => nodes.iter().any(|node| {
            let text = Value::String(document.string_value(*node));
            compare_atomic(operator, &text, other, context)
        }),
        (other, Value::Nodes(nodes)) => nodes.iter().any(|node| {
            let text = Value::String(document.string_value(*node));
            compare_atomic(operator, other, &text, context)
        }),
        _ => compare_atomic(operator, left, right, context),
    }
}

fn compare_atomic(operator: BinaryOperator, left: &Value, right: &Value, context: &Context<'_>) -> bool {
    match operator {
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            let equal = match (left, right) {
                (Value::Boolean(_), _) | (_, Value::Boolean(_)) => boolean(left) == boolean(right),
                (Value::Number(_), _) | (_, Value::Number(_)) => {
                    context.number(left) == context.number(right)
                }
                _ => context.string(left) == context.string(right),
            };
            equal == (operator == BinaryOperator::Equal)
        }
        _ => {
            let (left, right) = (context.number(left), context.number(right));
            match operator {
                BinaryOperator::Less => left < right,
                BinaryOperator::LessOrEqual => left <= right,
                BinaryOperator::Greater => left > right,
                BinaryOperator::GreaterOrEqual => left >= right,
                _ => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_format_like_xpath() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn only_xpath_number_syntax_parses() {
        assert_eq!(parse_number(" 12 "), 12.0);
        assert_eq!(parse_number("-1.5"), -1.5);
        assert!(parse_number("").is_nan());
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("inf").is_nan());
    }

    #[test]
    fn truthiness() {
        assert!(boolean(&Value::String("false".to_owned())));
        assert!(!boolean(&Value::Number(f64::NAN)));
        assert!(!boolean(&Value::Nodes(Vec::new())));
    }
}
