//! Core XPath functions plus the XForms and ODK extensions forms rely on.

use crate::ast::Expr;
use crate::eval::{Context, Value, boolean};
use xforms_engine::error::EvaluationError;
use xforms_engine::NodeId;

pub fn call(name: &str, arguments: &[Expr], context: &Context<'_>) -> Result<Value, EvaluationError> {
    let arguments = Arguments {
        function: name,
        expressions: arguments,
        context,
    };
    match name {
        "true" => arguments.exactly(0).map(|()| Value::Boolean(true)),
        "false" => arguments.exactly(0).map(|()| Value::Boolean(false)),
        "not" => {
            arguments.exactly(1)?;
            Ok(Value::Boolean(!boolean(&arguments.value(0)?)))
        }
        "boolean" => {
            arguments.exactly(1)?;
            Ok(Value::Boolean(boolean(&arguments.value(0)?)))
        }
        "string" => Ok(Value::String(arguments.string_or_context()?)),
        "number" => {
            arguments.at_most(1, "0 or 1")?;
            let value = match arguments.expressions.first() {
                Some(_) => arguments.value(0)?,
                None => Value::Nodes(vec![context.node]),
            };
            Ok(Value::Number(context.number(&value)))
        }
        "concat" => {
            let mut text = String::new();
            for index in 0..arguments.expressions.len() {
                text.push_str(&arguments.string(index)?);
            }
            Ok(Value::String(text))
        }
        "string-length" => Ok(Value::Number(
            arguments.string_or_context()?.chars().count() as f64,
        )),
        "normalize-space" => Ok(Value::String(
            arguments
                .string_or_context()?
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        )),
        "contains" => {
            arguments.exactly(2)?;
            Ok(Value::Boolean(arguments.string(0)?.contains(&arguments.string(1)?)))
        }
        "starts-with" => {
            arguments.exactly(2)?;
            Ok(Value::Boolean(arguments.string(0)?.starts_with(&arguments.string(1)?)))
        }
        "ends-with" => {
            arguments.exactly(2)?;
            Ok(Value::Boolean(arguments.string(0)?.ends_with(&arguments.string(1)?)))
        }
        "count" => {
            arguments.exactly(1)?;
            Ok(Value::Number(arguments.nodes(0)?.len() as f64))
        }
        "sum" => {
            arguments.exactly(1)?;
            let sum = arguments
                .nodes(0)?
                .into_iter()
                .map(|node| context.number(&Value::String(context.document.string_value(node))))
                .sum();
            Ok(Value::Number(sum))
        }
        "position" => match arguments.expressions.len() {
            0 => Ok(Value::Number(context.position as f64)),
            1 => {
                let position = arguments
                    .nodes(0)?
                    .first()
                    .map_or(f64::NAN, |node| sibling_position(*node, context));
                Ok(Value::Number(position))
            }
            found => Err(arguments.arity("0 or 1", found)),
        },
        "last" => arguments.exactly(0).map(|()| Value::Number(context.size as f64)),
        "round" => arguments.number_with(|number| (number + 0.5).floor()),
        "floor" => arguments.number_with(f64::floor),
        "ceiling" => arguments.number_with(f64::ceil),
        "int" => arguments.number_with(f64::trunc),
        "if" => {
            arguments.exactly(3)?;
            if boolean(&arguments.value(0)?) {
                arguments.value(1)
            } else {
                arguments.value(2)
            }
        }
        "coalesce" => {
            arguments.exactly(2)?;
            let first = arguments.string(0)?;
            if first.is_empty() {
                Ok(Value::String(arguments.string(1)?))
            } else {
                Ok(Value::String(first))
            }
        }
        "selected" => {
            arguments.exactly(2)?;
            let choice = arguments.string(1)?;
            let choice = choice.trim();
            Ok(Value::Boolean(
                arguments
                    .string(0)?
                    .split_whitespace()
                    .any(|selected| selected == choice),
            ))
        }
        "count-selected" => {
            arguments.exactly(1)?;
            Ok(Value::Number(arguments.string(0)?.split_whitespace().count() as f64))
        }
        "jr:itext" => {
            arguments.exactly(1)?;
            let id = arguments.string(0)?;
            let text = context.document.translate(&id).unwrap_or_default();
            Ok(Value::String(text.to_owned()))
        }
        _ => Err(EvaluationError::UnknownFunction {
            name: name.to_owned(),
        }),
    }
}

/// 1-based position of `node` among its parent's children of the same name.
fn sibling_position(node: NodeId, context: &Context<'_>) -> f64 {
    let document = context.document;
    let Some(parent) = document.parent(node) else {
        return 1.0;
    };
    let name = document.name(node);
    document
        .children(parent)
        .into_iter()
        .filter(|sibling| document.name(*sibling) == name)
        .position(|sibling| sibling == node)
        .map_or(f64::NAN, |index| (index + 1) as f64)
}

struct Arguments<'a, 'c> {
    function: &'a str,
    expressions: &'a [Expr],
    context: &'a Context<'c>,
}

impl Arguments<'_, '_> {
    fn arity(&self, expected: &'static str, found: usize) -> EvaluationError {
        EvaluationError::Arity {
            function: self.function.to_owned(),
            expected,
            found,
        }
    }

    fn exactly(&self, count: usize) -> Result<(), EvaluationError> {
        if self.expressions.len() == count {
            return Ok(());
        }
        let expected = match count {
            0 => "0",
            1 => "1",
            2 => "2",
            _ => "3",
        };
        Err(self.arity(expected, self.expressions.len()))
    }

    fn at_most(&self, count: usize, expected: &'static str) -> Result<(), EvaluationError> {
        if self.expressions.len() <= count {
            Ok(())
        } else {
            Err(self.arity(expected, self.expressions.len()))
        }
    }

    fn value(&self, index: usize) -> Result<Value, EvaluationError> {
        match self.expressions.get(index) {
            Some(expression) => expression.evaluate(self.context),
            None => Err(self.arity("more", self.expressions.len())),
        }
    }

    fn string(&self, index: usize) -> Result<String, EvaluationError> {
        Ok(self.context.string(&self.value(index)?))
    }

    /// The single argument as a string, or the context node's string value.
    fn string_or_context(&self) -> Result<String, EvaluationError> {
        self.at_most(1, "0 or 1")?;
        if self.expressions.is_empty() {
            Ok(self.context.document.string_value(self.context.node))
        } else {
            self.string(0)
        }
    }

    fn nodes(&self, index: usize) -> Result<Vec<NodeId>, EvaluationError> {
        match self.value(index)? {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(EvaluationError::Type(format!(
                "{}() expects a node-set argument",
                self.function
            ))),
        }
    }

    fn number_with(&self, operation: fn(f64) -> f64) -> Result<Value, EvaluationError> {
        self.exactly(1)?;
        Ok(Value::Number(operation(self.context.number(&self.value(0)?))))
    }
}
