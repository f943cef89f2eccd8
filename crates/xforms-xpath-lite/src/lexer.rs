use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

pub type Span = SimpleSpan;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'src> {
    Number(f64),
    Literal(&'src str),
    /// Element name or function name, optionally prefixed (`jr:itext`).
    /// `and`, `or`, `div` and `mod` are names too; the parser decides.
    Name(&'src str),
    Slash,
    Dot,
    DotDot,
    At,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    Comma,
    Pipe,
    Plus,
    Minus,
    Star,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl<'src> Token<'src> {
    pub fn into_cow_str(self) -> Cow<'src, str> {
        match self {
            Self::Number(number) => number.to_string().into(),
            Self::Literal(text) => format!("'{text}'").into(),
            Self::Name(name) => name.into(),
            Self::Slash => "/".into(),
            Self::Dot => ".".into(),
            Self::DotDot => "..".into(),
            Self::At => "@".into(),
            Self::ParenOpen => "(".into(),
            Self::ParenClose => ")".into(),
            Self::BracketOpen => "[".into(),
            Self::BracketClose => "]".into(),
            Self::Comma => ",".into(),
            Self::Pipe => "|".into(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Star => "*".into(),
            Self::Equal => "=".into(),
            Self::NotEqual => "!=".into(),
            Self::Less => "<".into(),
            Self::LessOrEqual => "<=".into(),
            Self::Greater => ">".into(),
            Self::GreaterOrEqual => ">=".into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'src>()
-> impl Parser<'src, &'src str, Vec<Spanned<Token<'src>>>, extra::Err<Rich<'src, char>>> {
    let number = text::digits(10)
        .then(just('.').then(text::digits(10).or_not()).or_not())
        .to_slice()
        .or(just('.').then(text::digits(10)).to_slice())
        .from_str()
        .unwrapped()
        .map(Token::Number);

    let literal = choice((
        just('\'')
            .ignore_then(none_of('\'').repeated().to_slice())
            .then_ignore(just('\'')),
        just('"')
            .ignore_then(none_of('"').repeated().to_slice())
            .then_ignore(just('"')),
    ))
    .map(Token::Literal);

    let ncname = any()
        .filter(|character: &char| character.is_alphabetic() || *character == '_')
        .then(
            any()
                .filter(|character: &char| {
                    character.is_alphanumeric() || matches!(character, '_' | '-' | '.')
                })
                .repeated(),
        )
        .to_slice();
    let name = ncname
        .then(just(':').then(ncname).or_not())
        .to_slice()
        .map(Token::Name);

    let comparator = choice((
        just("!=").to(Token::NotEqual),
        just("<=").to(Token::LessOrEqual),
        just(">=").to(Token::GreaterOrEqual),
        just('<').to(Token::Less),
        just('>').to(Token::Greater),
        just('=').to(Token::Equal),
    ));

    let punctuation = choice((
        just("..").to(Token::DotDot),
        just('.').to(Token::Dot),
        just('/').to(Token::Slash),
        just('@').to(Token::At),
        just('(').to(Token::ParenOpen),
        just(')').to(Token::ParenClose),
        just('[').to(Token::BracketOpen),
        just(']').to(Token::BracketClose),
        just(',').to(Token::Comma),
        just('|').to(Token::Pipe),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
    ));

    let token = choice((number, comparator, punctuation, literal, name));

    token
        .map_with(|token, extra| Spanned {
            node: token,
            span: extra.span(),
        })
        .padded_by(text::whitespace())
        .repeated()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token<'_>> {
        lexer()
            .parse(source)
            .into_result()
            .unwrap()
            .into_iter()
            .map(|token| token.node)
            .collect()
    }

    #[test]
    fn relative_path_arithmetic() {
        assert_eq!(
            tokens("2*../inner1"),
            vec![
                Token::Number(2.0),
                Token::Star,
                Token::DotDot,
                Token::Slash,
                Token::Name("inner1"),
            ]
        );
    }

    #[test]
    fn prefixed_function_and_literals() {
        assert_eq!(
            tokens("jr:itext('q1') != \"x\""),
            vec![
                Token::Name("jr:itext"),
                Token::ParenOpen,
                Token::Literal("q1"),
                Token::ParenClose,
                Token::NotEqual,
                Token::Literal("x"),
            ]
        );
    }

    #[test]
    fn leading_dot_number() {
        assert_eq!(tokens(".5 >= ."), vec![Token::Number(0.5), Token::GreaterOrEqual, Token::Dot]);
    }

    #[test]
    fn unknown_character_is_an_error() {
        assert!(lexer().parse("1 # 2").has_errors());
    }
}
