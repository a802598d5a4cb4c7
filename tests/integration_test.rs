use lispflat::{EVAL_STACK_SIZE, Error};
use lispflat::ast::{Expression, nil, sym, val};
use lispflat::evaluator::{Environment, create_global_env, eval};
use lispflat::scheme::{parse_program, parse_scheme};
use lispflat::suite::{LISPY_CASES, run_cases};
use std::fs;
use std::path::Path;

fn run(src: &str, env: &Environment) -> Result<Expression, Error> {
    eval(&parse_scheme(src)?, env)
}

#[test]
fn test_documented_scenarios() {
    // Each group shares one environment; (input, printed result)
    let groups: Vec<Vec<(&str, &str)>> = vec![
        vec![("(+ 2 2)", "4")],
        vec![("(if (> 6 5) (+ 1 1) (+ 2 2))", "2")],
        vec![("(define x 3)", ""), ("x", "3")],
        vec![("(length (list 1 2 3))", "3")],
        vec![("(define twice (lambda (x) (* 2 x)))", ""), ("(twice 5)", "10")],
        vec![("(car (cdr (cdr (list 1 2 3 4))))", "3")],
    ];

    for (g, group) in groups.iter().enumerate() {
        let env = create_global_env();
        for (input, expected) in group {
            let result = run(input, &env)
                .unwrap_or_else(|e| panic!("group #{}: '{input}' failed: {e}", g + 1));
            assert_eq!(result.to_string(), *expected, "group #{}: '{input}'", g + 1);
        }
    }
}

#[test]
fn test_regression_table_through_public_api() {
    let env = create_global_env();
    let outcomes = run_cases(&env);
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.passed()).collect();
    assert!(failed.is_empty(), "failing rows: {failed:#?}");
    assert_eq!(outcomes.len(), LISPY_CASES.len());

    // The table leaves its definitions behind
    assert_eq!(run("(fact 5)", &env), Ok(val(120)));
    assert_eq!(run("(zip (list 1) (list 2))", &env), Ok(val(vec![val([1, 2])])));
}

#[test]
fn test_errors_do_not_poison_the_environment() {
    let env = create_global_env();
    let failures = [
        ("undefined-thing", "Unbound symbol"),
        ("(+ 1 #t)", "TypeError"),
        ("((lambda (x) x))", "ArityError"),
        ("(car (quote ()))", "EvaluationError"),
        ("(1 2)", "TypeError"),
        ("(if 1 2 3)", "TypeError"),
    ];
    for (input, kind) in failures {
        match run(input, &env) {
            Ok(value) => panic!("'{input}' should fail, got {value}"),
            Err(err) => assert!(err.to_string().starts_with(kind), "'{input}': {err}"),
        }
    }
    assert_eq!(run("(+ 2 2)", &env), Ok(val(4)));
}

#[test]
fn test_syntax_errors() {
    for input in ["(", "(+ 1 2", ")", ""] {
        assert!(
            matches!(parse_scheme(input), Err(Error::SyntaxError(_))),
            "'{input}' should be a syntax error"
        );
    }
}

#[test]
fn test_values_print_in_canonical_form() {
    let env = create_global_env();
    let cases = [
        ("(quote (a (b 2.0) #t))", "(a (b 2) #t)"),
        ("(list 1 (list) 2)", "(1  2)"),
        ("(quote ())", ""),
        ("car", "#<procedure>"),
        ("(lambda (x) x)", "#<procedure>"),
        ("(* 1e200 1e200)", "inf"),
        ("(/ 1 3)", "0.3333333333333333"),
    ];
    for (input, printed) in cases {
        assert_eq!(run(input, &env).map(|v| v.to_string()), Ok(printed.to_owned()), "{input}");
    }
    assert_eq!(run("(list)", &env), Ok(nil()));
    assert_eq!(run("(quote lambda)", &env), Ok(sym("lambda")));
}

#[test]
fn test_equality_primitives() {
    let env = create_global_env();
    for src in [
        "(equal? car car)",
        "(equal? (list car) (list car))",
        "(equal? (list 1 (list (lambda (x) x))) (list 1 (list 2)))",
    ] {
        assert!(
            matches!(run(src, &env), Err(Error::TypeError(_))),
            "'{src}' should reject procedures"
        );
    }

    assert_eq!(
        run("(equal? (list 1 (list 2)) (list 1 (list 2)))", &env).ok(),
        Some(val(true))
    );
    assert_eq!(run("(eq? 3 (+ 1 2))", &env).ok(), Some(val(true)));
    assert_eq!(run("(eq? 3 4)", &env).ok(), Some(val(false)));
    assert!(matches!(
        run("(eq? (quote a) (quote a))", &env),
        Err(Error::TypeError(_))
    ));
}

/// Run every `.scm` file in `tests/programs`. The first line of each file is
/// `; expect: <printed value of the last form>`.
#[test]
fn test_all_scheme_programs() {
    // Programs may recurse deeply; evaluate them on the interpreter's stack size
    std::thread::Builder::new()
        .stack_size(EVAL_STACK_SIZE)
        .spawn(run_scheme_programs)
        .unwrap_or_else(|e| panic!("cannot spawn evaluator thread: {e}"))
        .join()
        .unwrap_or_else(|_| panic!("scheme program runner panicked"));
}

fn run_scheme_programs() {
    let programs_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/programs");
    let mut entries: Vec<_> = fs::read_dir(&programs_dir)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", programs_dir.display()))
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "scm"))
        .collect();
    entries.sort();
    assert!(!entries.is_empty(), "no .scm programs found");

    for path in entries {
        let source = fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        let expected = source
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("; expect:"))
            .map(str::trim)
            .unwrap_or_else(|| panic!("{}: missing '; expect:' header", path.display()));

        let env = create_global_env();
        let program =
            parse_program(&source).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        let mut last = nil();
        for expr in &program {
            last = eval(expr, &env).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        }
        assert_eq!(last.to_string(), expected, "{}", path.display());
    }
}
