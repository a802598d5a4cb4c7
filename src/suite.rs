//! Regression table of (input, expected printed output) pairs.
//!
//! The rows build on each other (later rows use earlier definitions), so they
//! must run in order against a single environment. Definitions print as the
//! empty string.

use crate::Error;
use crate::evaluator::{Environment, eval};
use crate::scheme::parse_scheme;

pub const LISPY_CASES: &[(&str, &str)] = &[
    ("(quote (testing 1 (2.0) -3.14e159))", "(testing 1 (2) -3.14e159)"),
    ("(+ 2 2)", "4"),
    ("(+ (* 2 100) (* 1 10))", "210"),
    ("(if (> 6 5) (+ 1 1) (+ 2 2))", "2"),
    ("(if (< 6 5) (+ 1 1) (+ 2 2))", "4"),
    ("(define x 3)", ""),
    ("x", "3"),
    ("(+ x x)", "6"),
    ("(begin (define x 1) (set! x (+ x 1)) (+ x 1))", "3"),
    ("((lambda (x) (+ x x)) 5)", "10"),
    ("(define twice (lambda (x) (* 2 x)))", ""),
    ("(twice 5)", "10"),
    ("(define compose (lambda (f g) (lambda (x) (f (g x)))))", ""),
    ("((compose list twice) 5)", "(10)"),
    ("(define repeat (lambda (f) (compose f f)))", ""),
    ("((repeat twice) 5)", "20"),
    ("((repeat (repeat twice)) 5)", "80"),
    ("(define fact (lambda (n) (if (<= n 1) 1 (* n (fact (- n 1))))))", ""),
    ("(fact 3)", "6"),
    ("(fact 50)", "3.0414093201713376e64"),
    ("(define abs (lambda (n) ((if (> n 0) + -) 0 n)))", ""),
    ("(list (abs -3) (abs 0) (abs 3))", "(3 0 3)"),
    ("(not #f)", "#t"),
    ("(length (list 1 2 3))", "3"),
    ("(length ())", "0"),
    ("(null? ())", "#t"),
    ("(null? (list 0))", "#f"),
    ("(begin (define a (list 1 2 3 4)) a)", "(1 2 3 4)"),
    ("(car a)", "1"),
    ("(cdr a)", "(2 3 4)"),
    ("(car (cdr (cdr a)))", "3"),
    (
        "(define combine (lambda (f) \
            (lambda (x y) \
              (if (null? x) (quote ()) \
                  (f (list (car x) (car y)) \
                     ((combine f) (cdr x) (cdr y)))))))",
        "",
    ),
    ("(cons (list 1) (list 2 3))", "((1) 2 3)"),
    ("(cons 1 (list 2 3))", "(1 2 3)"),
    ("(define zip (combine cons))", ""),
    ("(zip (list 1 2 3 4) (list 5 6 7 8))", "((1 5) (2 6) (3 7) (4 8))"),
    ("(append (list 1) (list 2 3))", "(1 2 3)"),
    ("(append (list 1 2) (list 3))", "(1 2 3)"),
    ("((combine append) (list 1 2 3 4) (list 5 6 7 8))", "(1 5 2 6 3 7 4 8)"),
    (
        "(define riff-shuffle (lambda (deck) (begin \
            (define take (lambda (n seq) (if (<= n 0) (quote ()) (cons (car seq) (take (- n 1) (cdr seq)))))) \
            (define drop (lambda (n seq) (if (<= n 0) seq(drop (- n 1) (cdr seq))))) \
            (define mid (lambda (seq) (/ (length seq) 2))) \
            ((combine append) (take (mid deck) deck) (drop (mid deck) deck)))))",
        "",
    ),
    ("(riff-shuffle (list 1 2 3 4 5 6 7 8))", "(1 5 2 6 3 7 4 8)"),
    ("((repeat riff-shuffle) (list 1 2 3 4 5 6 7 8))", "(1 3 5 7 2 4 6 8)"),
    (
        "(riff-shuffle (riff-shuffle (riff-shuffle (list 1 2 3 4 5 6 7 8))))",
        "(1 2 3 4 5 6 7 8)",
    ),
];

/// Result of running one row of the table
#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub input: &'static str,
    pub expected: &'static str,
    /// Printed result, or the error that stopped evaluation
    pub actual: Result<String, Error>,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        matches!(&self.actual, Ok(printed) if printed == self.expected)
    }
}

fn run_case(input: &str, env: &Environment) -> Result<String, Error> {
    let expr = parse_scheme(input)?;
    Ok(eval(&expr, env)?.to_string())
}

/// Run every row of [`LISPY_CASES`] in order against `env`.
///
/// A failing row does not stop the run.
pub fn run_cases(env: &Environment) -> Vec<CaseOutcome> {
    LISPY_CASES
        .iter()
        .map(|&(input, expected)| {
            let actual = run_case(input, env);
            if let Err(err) = &actual {
                log::debug!("case {input} failed: {err}");
            }
            CaseOutcome {
                input,
                expected,
                actual,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::create_global_env;

    #[test]
    fn test_all_cases_pass_in_one_environment() {
        let env = create_global_env();
        let outcomes = run_cases(&env);
        assert_eq!(outcomes.len(), LISPY_CASES.len());
        for outcome in &outcomes {
            assert!(
                outcome.passed(),
                "{} => {:?}, expected {:?}",
                outcome.input,
                outcome.actual,
                outcome.expected
            );
        }
    }

    #[test]
    fn test_rows_depend_on_earlier_definitions() {
        // Skipping the definitions leaves later rows unbound
        let env = create_global_env();
        let outcome = run_case("(twice 5)", &env);
        assert_eq!(outcome, Err(Error::UnboundSymbol("twice".into())));
    }

    #[test]
    fn test_outcome_reports_mismatch() {
        let outcome = CaseOutcome {
            input: "(+ 1 1)",
            expected: "3",
            actual: Ok("2".into()),
        };
        assert!(!outcome.passed());
    }
}
