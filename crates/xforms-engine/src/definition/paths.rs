//! Location path scanner.
//!
//! Finds the location paths written in an expression without parsing the
//! whole expression language: string literals, numbers, variables and
//! function names are skipped, everything else that looks like a path is
//! reported with its byte span and its steps (predicates stripped). Paths
//! inside predicates are reported as well: absolute ones as written,
//! relative ones prefixed with the steps of the path they filter.

use chumsky::prelude::*;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPath {
    pub span: Range<usize>,
    pub absolute: bool,
    pub steps: Vec<String>,
    /// Index of the first step carrying a predicate.
    pub filtered_step: Option<usize>,
    /// `span` covers exactly this path. False for relative predicate paths,
    /// whose steps start with the filtered path's.
    pub literal: bool,
}

impl ScannedPath {
    /// Resolve against the nodeset of the context node.
    /// `None` for attribute paths and paths escaping the root.
    pub fn resolve(&self, context: &str) -> Option<String> {
        resolve_steps(self.absolute, &self.steps, context)
    }

    /// Nodeset of the first filtered step.
    pub fn resolve_filtered(&self, context: &str) -> Option<String> {
        let index = self.filtered_step?;
        resolve_steps(self.absolute, &self.steps[..=index], context)
    }
}

fn resolve_steps(absolute: bool, steps: &[String], context: &str) -> Option<String> {
    let mut resolved: Vec<&str> = if absolute {
        Vec::new()
    } else {
        context.split('/').filter(|step| !step.is_empty()).collect()
    };
    for step in steps {
        match step.as_str() {
            "." => {}
            ".." => {
                resolved.pop()?;
            }
            attribute if attribute.starts_with('@') => return None,
            name => resolved.push(name),
        }
    }
    Some(format!("/{}", resolved.join("/")))
}

type Extra<'src> = extra::Err<Rich<'src, char>>;

const OPERATOR_NAMES: [&str; 4] = ["and", "or", "div", "mod"];

fn scanner<'src>() -> impl Parser<'src, &'src str, Vec<ScannedPath>, Extra<'src>> {
    let name = any()
        .filter(|character: &char| character.is_alphabetic() || *character == '_')
        .then(
            any()
                .filter(|character: &char| {
                    character.is_alphanumeric() || matches!(character, '_' | '-' | '.')
                })
                .repeated(),
        )
        .to_slice();
    let qname = name.clone().then(just(':').then(name).or_not()).to_slice();

    let literal = choice((
        just('\'')
            .then(none_of('\'').repeated())
            .then(just('\''))
            .ignored(),
        just('"')
            .then(none_of('"').repeated())
            .then(just('"'))
            .ignored(),
    ));

    let number = choice((
        text::digits(10)
            .then(just('.').then(text::digits(10).or_not()).or_not())
            .ignored(),
        just('.').then(text::digits(10)).ignored(),
    ));

    let variable = just('$').then(qname.clone()).ignored();

    let function = qname
        .clone()
        .then(text::whitespace().then(just('(')).rewind())
        .ignored();

    recursive(|pieces| {
        let predicate = just('[').ignore_then(pieces).then_ignore(just(']'));

        let step: Boxed<'src, '_, &'src str, (&'src str, Vec<Vec<ScannedPath>>), Extra<'src>> = choice((
            just("..").to_slice(),
            just('.').to_slice(),
            just('@').or_not().then(qname).to_slice(),
        ))
        .then(predicate.repeated().collect::<Vec<Vec<ScannedPath>>>())
        .boxed();

        let steps = step
            .clone()
            .then(just('/').ignore_then(step).repeated().collect::<Vec<_>>())
            .map(|(first, rest)| {
                let mut steps = vec![first];
                steps.extend(rest);
                steps
            });

        let path = choice((
            just('/')
                .ignore_then(steps.clone().or_not())
                .map(|steps| (true, steps.unwrap_or_default())),
            steps.map(|steps| (false, steps)),
        ))
        .map_with(|(absolute, steps), extra| {
            let span: SimpleSpan = extra.span();
            let names: Vec<String> = steps.iter().map(|(step, _)| (*step).to_owned()).collect();
            let filtered_step = steps.iter().position(|(_, predicates)| !predicates.is_empty());
            let mut inner = Vec::new();
            for (index, (_, predicates)) in steps.into_iter().enumerate() {
                for path in predicates.into_iter().flatten() {
                    if path.absolute {
                        inner.push(path);
                        continue;
                    }
                    let mut steps = names[..=index].to_vec();
                    steps.extend(path.steps);
                    inner.push(ScannedPath {
                        span: path.span,
                        absolute,
                        steps,
                        filtered_step,
                        literal: false,
                    });
                }
            }
            let operator = !absolute
                && names.len() == 1
                && OPERATOR_NAMES.contains(&names[0].as_str());
            let mut found = Vec::new();
            if !operator {
                found.push(ScannedPath {
                    span: span.into_range(),
                    absolute,
                    steps: names,
                    filtered_step,
                    literal: true,
                });
            }
            found.extend(inner);
            found
        });

        choice((
            literal.to(Vec::new()),
            number.to(Vec::new()),
            variable.to(Vec::new()),
            function.to(Vec::new()),
            path,
            none_of("'\"]").to(Vec::new()),
        ))
        .repeated()
        .collect::<Vec<Vec<ScannedPath>>>()
        .map(|pieces| pieces.into_iter().flatten().collect::<Vec<_>>())
    })
    .then_ignore(end())
}

/// Every location path of `expression` in source order, each followed by
/// the paths of its predicates.
///
/// A path directly following a closing parenthesis continues a function
/// result (`instance('x')/item`) and is not a document path.
pub fn scan_paths(expression: &str) -> Result<Vec<ScannedPath>, String> {
    let paths = scanner().parse(expression).into_result().map_err(|errors| {
        errors
            .iter()
            .map(|error| format!("{} at {:?}", error.reason(), error.span().into_range()))
            .collect::<Vec<_>>()
            .join("; ")
    })?;
    Ok(paths
        .into_iter()
        .filter(|path| {
            let before = expression[..path.span.start].trim_end();
            !(path.literal && path.absolute && before.ends_with(')'))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(expression: &str, context: &str) -> Vec<String> {
        scan_paths(expression)
            .unwrap()
            .iter()
            .filter_map(|path| path.resolve(context))
            .collect()
    }

    #[test]
    fn relative_paths_resolve_against_context() {
        assert_eq!(
            resolved("2 * ../inner1", "/data/rep/inner2"),
            vec!["/data/rep/inner1"]
        );
        assert_eq!(resolved(". > 10", "/data/age"), vec!["/data/age"]);
        assert_eq!(resolved("sibling + 1", "/data/age"), vec!["/data/age/sibling"]);
    }

    #[test]
    fn literals_functions_and_operators_are_skipped() {
        let paths = resolved(
            "if(/data/a = 'x/y' and $v, concat(\"/no\", /data/b), 1.5 div 2)",
            "/data/c",
        );
        assert_eq!(paths, vec!["/data/a", "/data/b"]);
    }

    #[test]
    fn predicates_are_stripped_and_absolute_inner_paths_kept() {
        let paths = scan_paths("count(/data/rep[position() = /data/index]/x)").unwrap();
        let steps: Vec<_> = paths.iter().map(|path| path.steps.join("/")).collect();
        assert_eq!(steps, vec!["data/rep/x", "data/index"]);
    }

    #[test]
    fn relative_predicate_paths_resolve_against_the_filtered_step() {
        let paths = scan_paths("sum(/data/item[name = /data/sel]/price)").unwrap();
        let summary: Vec<_> = paths
            .iter()
            .map(|path| {
                (
                    path.resolve("/data/chosen").unwrap(),
                    path.resolve_filtered("/data/chosen"),
                    path.literal,
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("/data/item/price".to_owned(), Some("/data/item".to_owned()), true),
                ("/data/item/name".to_owned(), Some("/data/item".to_owned()), false),
                ("/data/sel".to_owned(), None, true),
            ]
        );
    }

    #[test]
    fn nested_predicates_chain_their_steps() {
        let paths = resolved("count(../row[cell[. = 'x']]/cell)", "/data/table/total");
        assert_eq!(
            paths,
            vec![
                "/data/table/row/cell",
                "/data/table/row/cell",
                "/data/table/row/cell"
            ]
        );
        let filtered: Vec<_> = scan_paths("a/b[c]/d[e]")
            .unwrap()
            .iter()
            .map(|path| path.filtered_step)
            .collect();
        assert_eq!(filtered, vec![Some(1), Some(1), Some(1)]);
    }

    #[test]
    fn spans_cover_the_path_text() {
        let expression = "sum( /data/rep/x )";
        let paths = scan_paths(expression).unwrap();
        assert_eq!(&expression[paths[0].span.clone()], "/data/rep/x");
    }

    #[test]
    fn function_result_paths_are_not_document_paths() {
        assert!(scan_paths("instance('list')/root/item").unwrap().is_empty());
    }

    #[test]
    fn unterminated_literal_is_an_error() {
        assert!(scan_paths("concat('abc, /data/a)").is_err());
    }

    #[test]
    fn paths_escaping_the_root_do_not_resolve() {
        assert_eq!(resolved("../../../x", "/data/a"), Vec::<String>::new());
    }
}
