use log::info;
use pairlisp::ast::Value;
use pairlisp::{EnvRef, Interpreter};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

fn main() {
    env_logger::init();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("pairlisp: a small Lisp over mutable cons pairs");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, (quit) or Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let mut interp = Interpreter::new();
    interp.enter_repl();
    info!("repl started");

    loop {
        match rl.readline("pairlisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&interp.global_env());
                        continue;
                    }
                    "(quit)" | ":quit" | ":exit" => break,
                    _ => {}
                }

                match interp.eval_str(line) {
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("{e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }

    interp.leave_repl();
    println!("Goodbye!");
}

fn print_help() {
    println!("Commands:");
    println!("  :help  - Show this help message");
    println!("  :env   - Show global environment bindings");
    println!("  (quit) - Exit the interpreter (also :quit, Ctrl+D, Ctrl+C)");
    println!();
    println!("Special forms:");
    println!("  quote  set!  define  if  lambda  begin  cond  let");
    println!();
    println!("Examples:");
    println!("  (define (square x) (* x x))");
    println!("  (square 12)");
    println!("  (let ((x 2) (y 3)) (+ x y))");
    println!("  (cond ((< 1 0) 'negative) (else 'positive))");
    println!("  (define p (list 1 2)) (set-car! p 9) p");
    println!();
}

fn print_environment(env: &EnvRef) {
    let bindings = env.bindings();

    // Separate primitives from user-defined values
    let (primitives, user_defined): (Vec<_>, Vec<_>) = bindings
        .into_iter()
        .partition(|(_, value)| matches!(value, Value::Primitive(_)));

    println!("Primitives ({}):", primitives.len());
    let names: Vec<&str> = primitives.iter().map(|(name, _)| name.as_str()).collect();
    println!("  {}", names.join(" "));
    println!();

    println!("Other bindings ({}):", user_defined.len());
    for (name, value) in &user_defined {
        println!("  {name} = {value}");
    }
}
