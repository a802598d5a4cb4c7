use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    multi::many0,
    sequence::{preceded, terminated},
};
use std::borrow::Cow;
use std::collections::VecDeque;

use crate::ast::{Expression, NumberType};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Queue of tokens produced by [`tokenize`] and consumed by [`read_from_tokens`]
pub type Tokens<'a> = VecDeque<&'a str>;

/// Reader options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParseConfig {
    /// Strip `;` line comments before tokenizing
    pub handle_comments: bool,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')'
}

/// Whitespace is anything Unicode considers whitespace, not just ASCII
fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace).parse(input)
}

/// A parenthesis, or a maximal run of non-delimiter characters
fn token(input: &str) -> IResult<&str, &str> {
    alt((tag("("), tag(")"), take_while1(|c: char| !is_delimiter(c)))).parse(input)
}

/// Split source text into tokens.
///
/// `None` means there was no source text at all, which is distinct from an
/// empty string: the latter yields an empty queue.
pub fn tokenize(source: Option<&str>) -> Result<Tokens<'_>, Error> {
    let Some(source) = source else {
        return Err(Error::syntax(ParseErrorKind::NoInput, "no code"));
    };

    match terminated(many0(preceded(whitespace, token)), whitespace).parse(source) {
        Ok(("", tokens)) => {
            log::trace!("tokenized {} token(s)", tokens.len());
            Ok(VecDeque::from(tokens))
        }
        Ok((remaining, _)) => Err(Error::SyntaxError(ParseError::new(
            ParseErrorKind::InvalidSyntax,
            "could not tokenize input",
            None,
            Some(remaining.chars().take(10).collect()),
        ))),
        Err(e) => Err(Error::syntax(
            ParseErrorKind::InvalidSyntax,
            format!("could not tokenize input: {e}"),
        )),
    }
}

/// Resolve a non-parenthesis token: number, then boolean, then symbol.
pub fn atom(token: &str) -> Expression {
    if let Ok(n) = token.parse::<NumberType>() {
        return Expression::Number(n);
    }
    match token {
        "#t" => Expression::Boolean(true),
        "#f" => Expression::Boolean(false),
        "" => Expression::List(Vec::new()),
        _ => Expression::Symbol(token.to_owned()),
    }
}

/// Read one expression from the front of the token queue.
///
/// Tokens after the first complete expression are left in the queue.
pub fn read_from_tokens(tokens: &mut Tokens<'_>) -> Result<Expression, Error> {
    let mut consumed = Vec::new();
    read_expression(tokens, &mut consumed, 0)
}

fn read_expression<'a>(
    tokens: &mut Tokens<'a>,
    consumed: &mut Vec<&'a str>,
    depth: usize,
) -> Result<Expression, Error> {
    let Some(token) = tokens.pop_front() else {
        return Err(unexpected_eof(consumed));
    };

    match token {
        "(" => {
            if depth >= MAX_PARSE_DEPTH {
                return Err(Error::SyntaxError(ParseError::with_token_context(
                    ParseErrorKind::TooDeeplyNested,
                    format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    consumed.iter().copied(),
                    Some(token.to_owned()),
                )));
            }
            consumed.push(token);

            let mut elements = Vec::new();
            loop {
                match tokens.front() {
                    None => return Err(unexpected_eof(consumed)),
                    Some(&")") => {
                        tokens.pop_front();
                        consumed.push(")");
                        return Ok(Expression::List(elements));
                    }
                    Some(_) => elements.push(read_expression(tokens, consumed, depth + 1)?),
                }
            }
        }
        ")" => Err(Error::SyntaxError(ParseError::with_token_context(
            ParseErrorKind::InvalidSyntax,
            "unexpected ')'",
            consumed.iter().copied(),
            Some(token.to_owned()),
        ))),
        _ => {
            consumed.push(token);
            Ok(atom(token))
        }
    }
}

fn unexpected_eof(consumed: &[&str]) -> Error {
    Error::SyntaxError(ParseError::with_token_context(
        ParseErrorKind::Incomplete,
        "unexpected EOF while reading",
        consumed.iter().copied(),
        None,
    ))
}

/// Remove `;` line comments
fn strip_comments(input: &str) -> Cow<'_, str> {
    if !input.contains(';') {
        return Cow::Borrowed(input);
    }
    let stripped = input
        .lines()
        .map(|line| line.split_once(';').map_or(line, |(code, _)| code))
        .collect::<Vec<_>>()
        .join("\n");
    Cow::Owned(stripped)
}

/// Parse the first expression in `input`.
pub fn parse_scheme(input: &str) -> Result<Expression, Error> {
    parse_scheme_with_config(input, ParseConfig::default())
}

/// Parse the first expression in `input` with the given reader options.
pub fn parse_scheme_with_config(input: &str, config: ParseConfig) -> Result<Expression, Error> {
    let source = if config.handle_comments {
        strip_comments(input)
    } else {
        Cow::Borrowed(input)
    };
    let mut tokens = tokenize(Some(&*source))?;
    read_from_tokens(&mut tokens)
}

/// Parse every top-level expression in a script. `;` comments are ignored.
pub fn parse_program(input: &str) -> Result<Vec<Expression>, Error> {
    let source = strip_comments(input);
    let mut tokens = tokenize(Some(&*source))?;
    let mut program = Vec::new();
    while !tokens.is_empty() {
        program.push(read_from_tokens(&mut tokens)?);
    }
    log::debug!("read {} top-level form(s)", program.len());
    Ok(program)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};

    /// Test result variants for comprehensive parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Expression),         // Parsing should succeed with this value
        SpecificError(&'static str), // Parsing should fail with error containing this string
        Error,                       // Parsing should fail (any error)
    }
    use ParseTestResult::*;

    /// Helper for successful parse test cases
    fn success<T: Into<Expression>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    /// The empty list prints as nothing, so it cannot survive a round trip
    fn contains_empty_list(expr: &Expression) -> bool {
        match expr {
            Expression::List(items) => items.is_empty() || items.iter().any(contains_empty_list),
            _ => false,
        }
    }

    /// Run parse tests with round-trip validation
    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{}", i + 1);
            let result = parse_scheme(input);

            match (result, expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch for '{input}'");

                    if contains_empty_list(&actual) {
                        continue;
                    }
                    // display -> parse -> display should be identical
                    let displayed = format!("{actual}");
                    let reparsed = parse_scheme(&displayed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{displayed}': {e:?}")
                    });
                    assert_eq!(
                        displayed,
                        format!("{reparsed}"),
                        "{test_id}: round-trip display mismatch for '{input}'"
                    );
                }
                (Err(_), Error) => {}
                (Err(err), SpecificError(expected_text)) => {
                    let error_msg = format!("{err}");
                    assert!(
                        error_msg.contains(expected_text),
                        "{test_id}: error should contain '{expected_text}', got: {error_msg}"
                    );
                }
                (Ok(actual), Error) => {
                    panic!("{test_id}: expected error, got {actual:?}");
                }
                (Ok(actual), SpecificError(expected_text)) => {
                    panic!(
                        "{test_id}: expected error containing '{expected_text}', got {actual:?}"
                    );
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: expected success for '{input}', got error {err:?}");
                }
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        let test_cases = vec![
            // ===== NUMBERS =====
            ("42", success(42)),
            ("-5", success(-5)),
            ("0", success(0)),
            ("2.5", success(2.5)),
            (".5", success(0.5)),
            ("+7", success(7)),
            ("1e3", success(1000)),
            ("-3.14e159", success(-3.14e159)),
            ("  12  ", success(12)),
            // ===== BOOLEANS =====
            ("#t", success(true)),
            ("#f", success(false)),
            // ===== SYMBOLS =====
            ("foo", success(sym("foo"))),
            ("set!", success(sym("set!"))),
            ("null?", success(sym("null?"))),
            ("<=", success(sym("<="))),
            ("-", success(sym("-"))),
            ("1+", success(sym("1+"))),
            ("#true", success(sym("#true"))),
            ("'x", success(sym("'x"))), // no quote shorthand
            ("\"str\"", success(sym("\"str\""))), // no string literals
            // ===== LISTS =====
            ("()", success(nil())),
            ("(1 2 3)", success([1, 2, 3])),
            ("(+ 1 2)", success(vec![sym("+"), val(1), val(2)])),
            ("(a())", success(vec![sym("a"), nil()])),
            ("((1) (2 3))", success(vec![val([1]), val([2, 3])])),
            (
                "(define f (lambda (x) (* x x)))",
                success(vec![
                    sym("define"),
                    sym("f"),
                    val(vec![
                        sym("lambda"),
                        val(vec![sym("x")]),
                        val(vec![sym("*"), sym("x"), sym("x")]),
                    ]),
                ]),
            ),
            ("(\n  1\t2\r\n)", success([1, 2])),
            ("(a\u{00A0}b)", success(vec![sym("a"), sym("b")])), // non-breaking space
            // Only the first form is read
            ("1 2 3", success(1)),
            ("(a) junk )", success(vec![sym("a")])),
            // ===== ERRORS =====
            ("", SpecificError("unexpected EOF while reading")),
            ("   ", SpecificError("unexpected EOF while reading")),
            ("(", SpecificError("unexpected EOF while reading")),
            ("(1 (2 3)", SpecificError("unexpected EOF while reading")),
            (")", SpecificError("unexpected ')'")),
            (") (1)", Error),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_tokenize() {
        let tokens = tokenize(Some("(begin (define r 10) (* pi (* r r)))")).unwrap();
        assert_eq!(
            Vec::from(tokens),
            vec![
                "(", "begin", "(", "define", "r", "10", ")", "(", "*", "pi", "(", "*", "r", "r",
                ")", ")", ")"
            ]
        );

        assert!(tokenize(Some("")).unwrap().is_empty());
        assert!(tokenize(Some(" \n\t ")).unwrap().is_empty());
        assert_eq!(Vec::from(tokenize(Some("a(b)c")).unwrap()), vec!["a", "(", "b", ")", "c"]);

        let err = tokenize(None).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::SyntaxError(ParseError {
                kind: ParseErrorKind::NoInput,
                ..
            })
        ));
        assert_eq!(format!("{err}"), "SyntaxError: no code");
    }

    #[test]
    fn test_read_leaves_trailing_tokens() {
        let mut tokens = tokenize(Some("(+ 1 2) (* 3 4)")).unwrap();
        assert_eq!(
            read_from_tokens(&mut tokens).unwrap(),
            val(vec![sym("+"), val(1), val(2)])
        );
        assert_eq!(tokens.len(), 5);
        assert_eq!(
            read_from_tokens(&mut tokens).unwrap(),
            val(vec![sym("*"), val(3), val(4)])
        );
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_atom_resolution_order() {
        assert_eq!(atom("1.5"), val(1.5));
        assert_eq!(atom("#t"), val(true));
        assert_eq!(atom("#f"), val(false));
        assert_eq!(atom(""), nil());
        assert_eq!(atom("lambda"), sym("lambda"));
    }

    #[test]
    fn test_error_kinds_and_context() {
        let Err(crate::Error::SyntaxError(eof)) = parse_scheme("(define x") else {
            panic!("expected syntax error");
        };
        assert_eq!(eof.kind, ParseErrorKind::Incomplete);
        assert_eq!(eof.context.as_deref(), Some("( define x"));

        let Err(crate::Error::SyntaxError(close)) = parse_scheme(")") else {
            panic!("expected syntax error");
        };
        assert_eq!(close.kind, ParseErrorKind::InvalidSyntax);
        assert_eq!(close.found.as_deref(), Some(")"));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let ok = format!("{}{}", "(".repeat(MAX_PARSE_DEPTH), ")".repeat(MAX_PARSE_DEPTH));
        assert!(parse_scheme(&ok).is_ok());

        let deep = format!(
            "{}{}",
            "(".repeat(MAX_PARSE_DEPTH + 1),
            ")".repeat(MAX_PARSE_DEPTH + 1)
        );
        let Err(crate::Error::SyntaxError(err)) = parse_scheme(&deep) else {
            panic!("expected syntax error");
        };
        assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested);
    }

    #[test]
    fn test_comments() {
        let config = ParseConfig {
            handle_comments: true,
        };
        let source = "; leading comment\n(+ 1 ; inline\n 2)";
        assert_eq!(
            parse_scheme_with_config(source, config).unwrap(),
            val(vec![sym("+"), val(1), val(2)])
        );
        // Without comment handling `;` is an ordinary symbol character
        assert_eq!(parse_scheme("; x").unwrap(), sym(";"));
        assert!(parse_scheme_with_config("; only a comment", config).is_err());
    }

    #[test]
    fn test_parse_program() {
        let program = parse_program(
            "; square numbers\n(define sq (lambda (x) (* x x)))\n(sq 4) ; sixteen\n",
        )
        .unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program[1], val(vec![sym("sq"), val(4)]));

        assert!(parse_program("").unwrap().is_empty());
        assert!(parse_program("(sq 4) (").is_err());
    }
}
