use clap::Parser;
use lispflat::{EVAL_STACK_SIZE, Error};
use lispflat::ast::{Expression, Procedure};
use lispflat::evaluator::{self, Environment};
use lispflat::repl::InputCollector;
use lispflat::scheme::{ParseConfig, parse_program, parse_scheme_with_config};
use lispflat::suite;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

#[derive(Parser)]
#[command(version, about = "A small tree-walking Lisp interpreter")]
struct CliArgs {
    /// Script to evaluate; starts the interactive loop when omitted
    file: Option<PathBuf>,
    /// Run the built-in regression table and exit
    #[arg(long)]
    self_test: bool,
    /// Prompt shown by the interactive loop
    #[arg(long, default_value = "lispflat> ")]
    prompt: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = CliArgs::parse();

    // Deep recursion needs far more stack than the main thread has
    let worker = thread::Builder::new()
        .name("eval".to_owned())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(move || run(&args));
    let handle = match worker {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("Error: cannot start evaluator thread: {err}");
            return ExitCode::FAILURE;
        }
    };

    match handle.join() {
        Ok(code) => code,
        Err(panic_info) => {
            eprintln!("The interpreter encountered an unexpected error and must exit.");

            if let Some(msg) = panic_info.downcast_ref::<&str>() {
                eprintln!("Error: {msg}");
            } else if let Some(msg) = panic_info.downcast_ref::<String>() {
                eprintln!("Error: {msg}");
            } else {
                eprintln!("Error: Unknown panic occurred");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> ExitCode {
    if args.self_test {
        return self_test();
    }
    if let Some(path) = &args.file {
        return run_file(path);
    }

    match run_repl(&args.prompt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn self_test() -> ExitCode {
    let env = evaluator::create_global_env();
    let outcomes = suite::run_cases(&env);
    let mut failures = 0;

    for outcome in &outcomes {
        let shown = match &outcome.actual {
            Ok(printed) if printed.is_empty() => "None".to_owned(),
            Ok(printed) => printed.clone(),
            Err(err) => format!("Error: {err}"),
        };
        if outcome.passed() {
            println!("{} => {shown}", outcome.input);
        } else {
            failures += 1;
            println!("{} => {shown} !! => {}", outcome.input, outcome.expected);
        }
    }

    println!();
    println!("{} passed, {failures} failed", outcomes.len() - failures);
    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_file(path: &Path) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let env = evaluator::create_global_env();
    let result = parse_program(&source).and_then(|program| {
        for expr in &program {
            print_value(&evaluator::eval(expr, &env)?);
        }
        Ok(())
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Print a result unless it prints as nothing (definitions, the empty list)
fn print_value(value: &Expression) {
    let printed = value.to_string();
    if !printed.is_empty() {
        println!("{printed}");
    }
}

fn evaluate_input(source: &str, env: &Environment) -> Result<Expression, Error> {
    let config = ParseConfig {
        handle_comments: true,
    };
    let expr = parse_scheme_with_config(source, config)?;
    evaluator::eval(&expr, env)
}

fn run_repl(prompt: &str) -> Result<(), ReadlineError> {
    println!("lispflat, a minimal Scheme");
    println!("Enter S-expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let env = evaluator::create_global_env();
    let mut collector = InputCollector::new();
    let continuation = format!("{}> ", " ".repeat(prompt.trim_end().len().saturating_sub(1)));

    loop {
        let current_prompt = if collector.is_pending() {
            continuation.as_str()
        } else {
            prompt
        };

        match rl.readline(current_prompt) {
            Ok(line) => {
                // Commands are only recognized at the start of a form
                if !collector.is_pending() {
                    match line.trim() {
                        "" => continue,
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&env);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                let Some(source) = collector.push_line(&line) else {
                    continue;
                };
                let _ = rl.add_history_entry(source.as_str());

                match evaluate_input(&source, &env) {
                    Ok(value) => print_value(&value),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Interrupted) if collector.is_pending() => {
                collector.clear();
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Discard a partial form, or exit");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Special forms: quote, if, define, set!, lambda, begin");
    println!("Values: numbers (42, -2.5, 1e10), #t, #f, symbols, lists");
    println!("Conditions must be booleans; there is no truthiness.");
    println!("Forms may span several lines; ';' starts a comment.");
    println!();
    println!("Examples:");
    println!("  (define twice (lambda (x) (* 2 x)))");
    println!("  (twice 5)");
    println!("  (map twice (list 1 2 3))");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate primitives from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Expression::Procedure(Procedure::Primitive { .. }) => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Primitives ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            // The empty list prints as nothing; show it explicitly here
            if value.is_nil() {
                println!("  {name} = ()");
            } else {
                println!("  {name} = {value}");
            }
        }
    }
}
