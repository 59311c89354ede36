//! Printer: values back to text.
//!
//! Readable mode quotes strings and re-escapes them so the output reads back as
//! the same value; display mode writes string contents raw. Procedures,
//! primitives and environments print as opaque `#<...>` placeholders. A pair
//! that is already being printed further up the same path prints as `...`, so
//! structures made cyclic with `set-cdr!` still terminate.

use crate::ast::{Pair, PairRef, Value};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Render a value; `readable` selects quoted, escaped strings
pub fn print(value: &Value, readable: bool) -> String {
    let mut out = String::new();
    write_value(&mut out, value, readable);
    out
}

/// Shortest decimal form that reads back as the same number
pub fn format_number(n: f64) -> String {
    if n.is_infinite() {
        let sign = if n < 0.0 { "-" } else { "" };
        format!("{sign}Infinity")
    } else {
        format!("{n}")
    }
}

fn escape_string(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

type PairKey = *const RefCell<Pair>;

/// Pending output, processed from the top of an explicit stack so nesting on
/// either side of a pair never grows the native stack
enum Task {
    Value(Value),
    /// Print this pair's `first`, then continue with its `rest`
    Element { pair: PairRef, leading_space: bool },
    /// Whatever followed the last printed element
    Rest(Value),
    /// End of the innermost open list
    Close,
}

fn write_atom(out: &mut String, value: &Value, readable: bool) {
    match value {
        Value::Number(n) => out.push_str(&format_number(*n)),
        Value::Symbol(name) => out.push_str(name),
        Value::String(text) if readable => escape_string(out, text),
        Value::String(text) => out.push_str(text),
        Value::Nil => out.push_str("nil"),
        // Expanded by `write_value`
        Value::Pair(_) => {}
        Value::Procedure(_) => out.push_str("#<procedure>"),
        Value::Primitive(op) => {
            out.push_str("#<primitive:");
            out.push_str(op.name);
            out.push('>');
        }
        Value::Environment(_) => out.push_str("#<environment>"),
    }
}

fn write_value(out: &mut String, value: &Value, readable: bool) {
    // Pairs entered on the current path, one entry per open list
    let mut open: Vec<Vec<PairKey>> = Vec::new();
    let mut active: HashSet<PairKey> = HashSet::new();
    let mut tasks = vec![Task::Value(value.clone())];

    while let Some(task) = tasks.pop() {
        match task {
            Task::Value(Value::Pair(pair)) if active.contains(&Rc::as_ptr(&pair)) => {
                out.push_str("...");
            }
            Task::Value(Value::Pair(pair)) => {
                out.push('(');
                open.push(Vec::new());
                tasks.push(Task::Close);
                tasks.push(Task::Element {
                    pair,
                    leading_space: false,
                });
            }
            Task::Value(atom) => write_atom(out, &atom, readable),
            Task::Element {
                pair,
                leading_space,
            } => {
                let key = Rc::as_ptr(&pair);
                active.insert(key);
                if let Some(entered) = open.last_mut() {
                    entered.push(key);
                }
                if leading_space {
                    out.push(' ');
                }
                let cell = pair.borrow();
                tasks.push(Task::Rest(cell.rest.clone()));
                tasks.push(Task::Value(cell.first.clone()));
            }
            Task::Rest(Value::Nil) => {}
            Task::Rest(Value::Pair(next)) if active.contains(&Rc::as_ptr(&next)) => {
                out.push_str(" . ...");
            }
            Task::Rest(Value::Pair(next)) => tasks.push(Task::Element {
                pair: next,
                leading_space: true,
            }),
            // A dotted tail is always printed readably
            Task::Rest(tail) => {
                out.push_str(" . ");
                write_atom(out, &tail, true);
            }
            Task::Close => {
                out.push(')');
                for key in open.pop().unwrap_or_default() {
                    active.remove(&key);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print(self, true))
    }
}
