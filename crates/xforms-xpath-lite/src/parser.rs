use crate::ast::{BinaryOperator, Expr, LocationPath, Step};
use crate::lexer::{Span, Spanned, Token, lexer};
use chumsky::{input::ValueInput, pratt::*, prelude::*};
use std::ops::Range;

pub type ParseError<'src, T> = Rich<'src, T, Span>;

/// A lexing or parsing failure with its byte span in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub span: Range<usize>,
    pub message: String,
    pub reason: String,
}

impl SyntaxError {
    fn from_rich<T: std::fmt::Display>(error: &ParseError<'_, T>) -> Self {
        Self {
            span: error.span().into_range(),
            message: error.to_string(),
            reason: error.reason().to_string(),
        }
    }
}

pub fn parser<'src, I>() -> impl Parser<'src, I, Expr, extra::Err<ParseError<'src, Token<'src>>>>
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    recursive(|expression| {
        let name = select! { Token::Name(name) => name };
        let paren_open = just(Token::ParenOpen);
        let paren_close = just(Token::ParenClose);

        let predicate = expression
            .clone()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose));

        let step = choice((
            just(Token::DotDot).to(Step::Parent),
            just(Token::Dot).to(Step::Current),
            just(Token::At)
                .ignore_then(name.clone())
                .map(|name: &str| Step::Attribute(name.to_owned())),
            name.clone()
                .then(predicate.repeated().collect::<Vec<_>>())
                .map(|(name, predicates): (&str, _)| Step::Child {
                    name: name.to_owned(),
                    predicates,
                }),
        ));

        let relative_steps = step
            .separated_by(just(Token::Slash))
            .at_least(1)
            .collect::<Vec<_>>();

        let absolute_path = just(Token::Slash)
            .ignore_then(relative_steps.clone().or_not())
            .map(|steps| LocationPath {
                absolute: true,
                steps: steps.unwrap_or_default(),
            });
        let relative_path = relative_steps.map(|steps| LocationPath {
            absolute: false,
            steps,
        });
        let path = absolute_path.or(relative_path).map(Expr::Path);

        let call = name
            .then(
                expression
                    .clone()
                    .separated_by(just(Token::Comma))
                    .collect::<Vec<_>>()
                    .delimited_by(paren_open.clone(), paren_close.clone()),
            )
            .map(|(name, arguments): (&str, _)| Expr::Call {
                name: name.to_owned(),
                arguments,
            });

        let literal = select! {
            Token::Number(number) => Expr::Number(number),
            Token::Literal(text) => Expr::Literal(text.to_owned()),
        };

        let nested = expression.delimited_by(paren_open, paren_close);

        choice((literal, call, nested, path)).pratt((
            infix(left(1), just(Token::Name("or")), |l, _, r, _| {
                Expr::binary(BinaryOperator::Or, l, r)
            }),
            infix(left(2), just(Token::Name("and")), |l, _, r, _| {
                Expr::binary(BinaryOperator::And, l, r)
            }),
            infix(left(3), just(Token::Equal), |l, _, r, _| {
                Expr::binary(BinaryOperator::Equal, l, r)
            }),
            infix(left(3), just(Token::NotEqual), |l, _, r, _| {
                Expr::binary(BinaryOperator::NotEqual, l, r)
            }),
            infix(left(4), just(Token::Less), |l, _, r, _| {
                Expr::binary(BinaryOperator::Less, l, r)
            }),
            infix(left(4), just(Token::LessOrEqual), |l, _, r, _| {
                Expr::binary(BinaryOperator::LessOrEqual, l, r)
            }),
            infix(left(4), just(Token::Greater), |l, _, r, _| {
                Expr::binary(BinaryOperator::Greater, l, r)
            }),
            infix(left(4), just(Token::GreaterOrEqual), |l, _, r, _| {
                Expr::binary(BinaryOperator::GreaterOrEqual, l, r)
            }),
            infix(left(5), just(Token::Plus), |l, _, r, _| {
                Expr::binary(BinaryOperator::Add, l, r)
            }),
            infix(left(5), just(Token::Minus), |l, _, r, _| {
                Expr::binary(BinaryOperator::Subtract, l, r)
            }),
            infix(left(6), just(Token::Star), |l, _, r, _| {
                Expr::binary(BinaryOperator::Multiply, l, r)
            }),
            infix(left(6), just(Token::Name("div")), |l, _, r, _| {
                Expr::binary(BinaryOperator::Divide, l, r)
            }),
            infix(left(6), just(Token::Name("mod")), |l, _, r, _| {
                Expr::binary(BinaryOperator::Modulo, l, r)
            }),
            prefix(7, just(Token::Minus), |_, operand, _| {
                Expr::Negate(Box::new(operand))
            }),
            infix(left(8), just(Token::Pipe), |l, _, r, _| {
                Expr::binary(BinaryOperator::Union, l, r)
            }),
        ))
    })
}

/// Lex and parse `source`, collecting every error with its span.
pub fn parse(source: &str) -> Result<Expr, Vec<SyntaxError>> {
    let (tokens, errors) = lexer().parse(source).into_output_errors();
    if !errors.is_empty() {
        return Err(errors.iter().map(SyntaxError::from_rich).collect());
    }
    let Some(tokens) = tokens else {
        return Err(Vec::new());
    };

    let end = source.len();
    let (expression, errors) = parser()
        .parse(tokens.map(Span::from(end..end), |Spanned { node, span }| {
            (node, span)
        }))
        .into_output_errors();
    match expression {
        Some(expression) if errors.is_empty() => Ok(expression),
        _ => Err(errors.iter().map(SyntaxError::from_rich).collect()),
    }
}
