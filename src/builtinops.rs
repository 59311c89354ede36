//! Built-in procedure registry.
//!
//! Every primitive is defined once in a static registry and bound by name into
//! each new global environment. Primitives receive evaluated arguments; special
//! forms are handled by the evaluator and never appear here.
//!
//! ```scheme
//! (+ 1 2 3)              ; => 6
//! (< 1 2 3)              ; => true
//! (car (cons 1 2))       ; => 1
//! (apply + (list 1 2))   ; => 3
//! ```
//!
//! ## Kinds of primitives
//!
//! - **Functions** are pure over their arguments. They are written as plain typed
//!   Rust functions and wired through the adapter layer in
//!   `evaluator::intooperation`, which converts arguments and checks types.
//! - **Contextual** primitives need the interpreter itself: `eval`, `apply`, and
//!   everything that goes through the host (`display`, `error`, `slurp`, `time`).
//!
//! Arity is validated against [`Arity`] before either kind runs.
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with typed parameters (`NumberType`, `&str`,
//!    `Value`, `PairRef`) and an optional rest iterator (`NumIter`, `ValueIter`)
//! 2. **Add to BUILTIN_OPS** with its name and arity
//! 3. **Add tests** to the table in this module

use crate::Error;
use crate::ast::{NumberType, PairRef, Value};
use crate::evaluator::Interpreter;
use crate::evaluator::intooperation::{
    IntoOperation, IntoVariadicOperation, NumIter, OperationFn, ValueIter,
};
use crate::lexer::parse_number;
use crate::printer::{format_number, print};
use crate::reader::read_str;
use log::trace;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Accepted argument counts of a primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive bounds
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(n) if got != n => Err(Error::arity_error(n, got)),
            Arity::AtLeast(min) if got < min => Err(Error::arity_error(min, got)),
            Arity::Range(min, _) if got < min => Err(Error::arity_error(min, got)),
            Arity::Range(_, max) if got > max => Err(Error::arity_error(max, got)),
            _ => Ok(()),
        }
    }
}

/// Signature of primitives that need the interpreter
pub type ContextualFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value, Error>;

/// Represents the implementation of a primitive
#[derive(Clone)]
pub enum OpKind {
    /// Function of its evaluated arguments only, through the canonical erased signature
    Function(Arc<OperationFn>),
    /// Function that also needs the interpreter (evaluation, host I/O)
    Contextual(ContextualFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::Contextual(_) => write!(f, "Contextual(<fn>)"),
        }
    }
}

impl PartialEq for OpKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OpKind::Function(f1), OpKind::Function(f2)) => Arc::ptr_eq(f1, f2),
            (OpKind::Contextual(f1), OpKind::Contextual(f2)) => std::ptr::fn_addr_eq(*f1, *f2),
            _ => false,
        }
    }
}

/// Definition of a primitive procedure
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The name the primitive is bound to in the global environment
    pub name: &'static str,
    pub op_kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // Names are unique within the registry
        self.name == other.name
    }
}

impl BuiltinOp {
    /// Validate the argument count, then run the primitive
    pub fn invoke(&self, interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
        self.arity.validate(args.len())?;
        trace!("primitive {} with {} argument(s)", self.name, args.len());
        match &self.op_kind {
            OpKind::Function(func) => func(args),
            OpKind::Contextual(func) => func(interp, args),
        }
    }
}

//
// Builtin Function Implementations
//

// Chained numeric comparison over two or more arguments
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(first: NumberType, rest: NumIter<'_>) -> bool {
            let mut prev = first;
            for current in rest {
                if !(prev $op current) {
                    return false;
                }
                prev = current;
            }
            true
        }
    };
}

numeric_comparison!(builtin_num_eq, ==);
numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);

fn builtin_add(args: NumIter<'_>) -> NumberType {
    args.sum()
}

fn builtin_mul(args: NumIter<'_>) -> NumberType {
    args.product()
}

fn builtin_sub(first: NumberType, rest: NumIter<'_>) -> NumberType {
    if rest.len() == 0 {
        -first
    } else {
        rest.fold(first, |acc, n| acc - n)
    }
}

fn builtin_div(first: NumberType, rest: NumIter<'_>) -> NumberType {
    if rest.len() == 0 {
        1.0 / first
    } else {
        rest.fold(first, |acc, n| acc / n)
    }
}

fn builtin_car(value: Value) -> Result<Value, Error> {
    value.car()
}

fn builtin_cdr(value: Value) -> Result<Value, Error> {
    value.cdr()
}

fn builtin_cons(first: Value, rest: Value) -> Value {
    Value::cons(first, rest)
}

fn builtin_set_car(pair: PairRef, value: Value) -> Value {
    // Release the borrow before the old value is dropped
    let previous = std::mem::replace(&mut pair.borrow_mut().first, value);
    drop(previous);
    Value::ok()
}

fn builtin_set_cdr(pair: PairRef, value: Value) -> Value {
    // Release the borrow before the old value is dropped
    let previous = std::mem::replace(&mut pair.borrow_mut().rest, value);
    drop(previous);
    Value::ok()
}

fn builtin_list(args: ValueIter<'_>) -> Value {
    Value::list(args.cloned())
}

fn builtin_pair_p(value: Value) -> bool {
    matches!(value, Value::Pair(_))
}

fn builtin_null_p(value: Value) -> bool {
    value.is_nil()
}

fn builtin_number_p(value: Value) -> bool {
    matches!(value, Value::Number(_))
}

fn builtin_string_p(value: Value) -> bool {
    matches!(value, Value::String(_))
}

fn builtin_symbol_p(value: Value) -> bool {
    matches!(value, Value::Symbol(_))
}

fn builtin_eq_p(a: Value, b: Value) -> bool {
    a.is_identical(&b)
}

fn builtin_not(value: Value) -> bool {
    value.is_false()
}

fn builtin_symbol_to_string(value: Value) -> Result<Value, Error> {
    match value {
        Value::Symbol(name) => Ok(Value::String(name)),
        other => Err(Error::TypeError(format!(
            "symbol->string: expected symbol, got {other}"
        ))),
    }
}

fn builtin_string_to_symbol(text: &str) -> Value {
    Value::symbol(text)
}

fn builtin_number_to_string(n: NumberType) -> Value {
    Value::string(&format_number(n))
}

fn builtin_string_to_number(text: &str) -> Value {
    parse_number(text).map_or(Value::Nil, Value::Number)
}

fn builtin_read(source: &str) -> Result<Value, Error> {
    read_str(source)
}

//
// Contextual primitives
//

fn builtin_eval(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    let mut args = args.into_iter();
    let expr = args.next().ok_or_else(|| Error::arity_error(1, 0))?;
    let env = match args.next() {
        None => interp.global_env(),
        Some(Value::Environment(env)) => env,
        Some(other) => {
            return Err(Error::TypeError(format!(
                "eval: expected environment, got {other}"
            )));
        }
    };
    interp.eval(&expr, &env)
}

fn builtin_apply(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    let [procedure, arg_list] = <[Value; 2]>::try_from(args)
        .map_err(|args| Error::arity_error(2, args.len()))?;
    let args = arg_list.to_vec()?;
    interp.call(&procedure, args)
}

fn builtin_display(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    for value in &args {
        interp.write_output(&print(value, false))?;
    }
    Ok(Value::Nil)
}

fn builtin_error(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    let mut args = args.into_iter();
    let message = args
        .next()
        .map(|value| print(&value, false))
        .ok_or_else(|| Error::arity_error(1, 0))?;

    let mut irritants = Vec::new();
    for irritant in args {
        let text = print(&irritant, true);
        interp.write_output(&text)?;
        interp.write_output("\n")?;
        irritants.push(text);
    }

    Err(Error::UserError { message, irritants })
}

fn builtin_slurp(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    match args.as_slice() {
        [Value::String(path)] => interp.read_file(path).map(|text| Value::string(&text)),
        [other] => Err(Error::TypeError(format!(
            "slurp: expected string, got {other}"
        ))),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

fn builtin_time(interp: &mut Interpreter, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::Number(interp.now_millis()))
}

fn builtin_repl_depth(interp: &mut Interpreter, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::Number(interp.repl_depth() as NumberType))
}

/// Global registry of all primitive procedures.
///
/// Typed implementations are wired through the adapter layer once, at
/// initialization time, via a `LazyLock`.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn builtin_variadic<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    fn function(name: &'static str, arity: Arity, f: Arc<OperationFn>) -> BuiltinOp {
        BuiltinOp {
            name,
            op_kind: OpKind::Function(f),
            arity,
        }
    }

    fn contextual(name: &'static str, arity: Arity, f: ContextualFn) -> BuiltinOp {
        BuiltinOp {
            name,
            op_kind: OpKind::Contextual(f),
            arity,
        }
    }

    type Num = NumberType;
    type Rest = NumIter<'static>;

    vec![
        // Arithmetic
        function("+", Arity::Any, builtin_variadic::<(Rest,), _>(builtin_add)),
        function("*", Arity::Any, builtin_variadic::<(Rest,), _>(builtin_mul)),
        function("-", Arity::AtLeast(1), builtin_variadic::<(Num, Rest), _>(builtin_sub)),
        function("/", Arity::AtLeast(1), builtin_variadic::<(Num, Rest), _>(builtin_div)),
        // Comparison
        function("=", Arity::AtLeast(2), builtin_variadic::<(Num, Rest), _>(builtin_num_eq)),
        function("<", Arity::AtLeast(2), builtin_variadic::<(Num, Rest), _>(builtin_lt)),
        function(">", Arity::AtLeast(2), builtin_variadic::<(Num, Rest), _>(builtin_gt)),
        // Pairs and lists
        function("car", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_car)),
        function("cdr", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_cdr)),
        function("cons", Arity::Exact(2), builtin_fixed::<(Value, Value), _>(builtin_cons)),
        function(
            "set-car!",
            Arity::Exact(2),
            builtin_fixed::<(PairRef, Value), _>(builtin_set_car),
        ),
        function(
            "set-cdr!",
            Arity::Exact(2),
            builtin_fixed::<(PairRef, Value), _>(builtin_set_cdr),
        ),
        function("list", Arity::Any, builtin_variadic::<(ValueIter<'static>,), _>(builtin_list)),
        // Predicates
        function("pair?", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_pair_p)),
        function("null?", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_null_p)),
        function("number?", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_number_p)),
        function("string?", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_string_p)),
        function("symbol?", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_symbol_p)),
        function("eq?", Arity::Exact(2), builtin_fixed::<(Value, Value), _>(builtin_eq_p)),
        function("not", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_not)),
        // Conversions
        function(
            "symbol->string",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_symbol_to_string),
        ),
        function(
            "string->symbol",
            Arity::Exact(1),
            builtin_fixed::<(&str,), _>(builtin_string_to_symbol),
        ),
        function(
            "number->string",
            Arity::Exact(1),
            builtin_fixed::<(Num,), _>(builtin_number_to_string),
        ),
        function(
            "string->number",
            Arity::Exact(1),
            builtin_fixed::<(&str,), _>(builtin_string_to_number),
        ),
        function("read", Arity::Exact(1), builtin_fixed::<(&str,), _>(builtin_read)),
        // Interpreter and host
        contextual("eval", Arity::Range(1, 2), builtin_eval),
        contextual("apply", Arity::Exact(2), builtin_apply),
        contextual("display", Arity::Exact(1), builtin_display),
        contextual("error", Arity::AtLeast(1), builtin_error),
        contextual("slurp", Arity::Exact(1), builtin_slurp),
        contextual("time", Arity::Exact(0), builtin_time),
        contextual("repl-depth", Arity::Exact(0), builtin_repl_depth),
    ]
});

/// Lazy static map from name to BuiltinOp (private - use find_op)
static BUILTIN_BY_NAME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| {
        let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
        ops.iter().map(|op| (op.name, op)).collect()
    });

/// Get all primitive operations, in registry order
pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a primitive by the name it is bound to
pub fn find_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_NAME.get(name).copied()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};
    use crate::host::BufferHost;

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    /// Helper to invoke a primitive through the public registry, with a fresh
    /// interpreter for the contextual ones.
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_op(name).unwrap_or_else(|| panic!("builtin not found: {name}"));
        let mut interp = Interpreter::with_host(BufferHost::new());
        op.invoke(&mut interp, args.to_vec())
    }

    #[test]
    fn test_builtin_ops_registry() {
        let not_op = find_op("not").unwrap();
        assert_eq!(not_op.arity, Arity::Exact(1));
        assert!(matches!(not_op.op_kind, OpKind::Function(_)));

        let add_op = find_op("+").unwrap();
        if let OpKind::Function(func) = &add_op.op_kind {
            assert_eq!(func(vec![val(1), val(2)]).unwrap(), val(3));
        } else {
            panic!("Expected Function variant");
        }

        let eval_op = find_op("eval").unwrap();
        assert!(matches!(eval_op.op_kind, OpKind::Contextual(_)));
        assert_eq!(eval_op.arity, Arity::Range(1, 2));

        // Names are unique and every name resolves to its own entry
        let all_ops = get_builtin_ops();
        for op in all_ops {
            assert!(std::ptr::eq(find_op(op.name).unwrap(), op), "{}", op.name);
        }
        assert_eq!(BUILTIN_BY_NAME.len(), all_ops.len());

        // Special forms are not primitives
        for name in ["quote", "if", "define", "lambda", "cond", "let", "begin", "set!"] {
            assert!(find_op(name).is_none(), "{name}");
        }
        assert!(find_op("unknown").is_none());
    }

    /// Macro to create test cases, invoking primitives via the registry.
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);

        let pair = Value::cons(val(1), val(2));
        let list = val([1, 2, 3]);
        let many_ones: Vec<Value> = (0..100).map(|_| val(1)).collect();

        let test_cases: Vec<TestCase> = vec![
            // ===== ARITHMETIC =====
            test!("+", &[], success(0)),
            test!("+", &[val(1), val(2)], success(3)),
            test!("+", &[val(0.5), val(0.25), val(1)], success(1.75)),
            test!("+", &many_ones, success(100)),
            test!("+", &[val(1), val("2")], None),
            test!("*", &[], success(1)),
            test!("*", &[val(3), val(4)], success(12)),
            test!("*", &[val(2), val(2), val(2), val(2)], success(16)),
            test!("-", &[val(5)], success(-5)),
            test!("-", &[val(10), val(3)], success(7)),
            test!("-", &[val(10), val(3), val(2)], success(5)),
            test!("-", &[], None),
            test!("/", &[val(4)], success(0.25)),
            test!("/", &[val(12), val(3), val(2)], success(2)),
            test!("/", &[val(1), val(0)], success(f64::INFINITY)),
            test!("/", &[sym("x")], None),
            // ===== COMPARISON =====
            test!("=", &[val(1), val(1)], success(true)),
            test!("=", &[val(1), val(1), val(2)], success(false)),
            test!("<", &[val(1), val(2), val(3)], success(true)),
            test!("<", &[val(1), val(3), val(2)], success(false)),
            test!(">", &[val(3), val(2), val(1)], success(true)),
            test!(">", &[val(1), val(1)], success(false)),
            test!("<", &[val(1)], None),
            test!("=", &[val(1), val("1")], None),
            // ===== PAIRS AND LISTS =====
            test!("car", &[pair.clone()], success(1)),
            test!("cdr", &[pair.clone()], success(2)),
            test!("car", &[list.clone()], success(1)),
            test!("cdr", &[list.clone()], success([2, 3])),
            test!("car", &[nil()], None),
            test!("cdr", &[val(5)], None),
            test!("cons", &[val(1), nil()], success([1])),
            test!("cons", &[val(1), val(2)], Some(pair.clone())),
            test!("list", &[], Some(nil())),
            test!("list", &[val(1), val("a"), sym("b")], success(vec![val(1), val("a"), sym("b")])),
            test!("set-car!", &[val([1]), val(2)], success(sym("ok"))),
            test!("set-cdr!", &[val([1]), val(2)], success(sym("ok"))),
            test!("set-car!", &[nil(), val(2)], None),
            test!("set-cdr!", &[sym("x"), val(2)], None),
            // ===== PREDICATES =====
            test!("pair?", &[pair.clone()], success(true)),
            test!("pair?", &[nil()], success(false)),
            test!("null?", &[nil()], success(true)),
            test!("null?", &[list.clone()], success(false)),
            test!("null?", &[sym("nil")], success(false)),
            test!("number?", &[val(1)], success(true)),
            test!("number?", &[val("1")], success(false)),
            test!("string?", &[val("s")], success(true)),
            test!("string?", &[sym("s")], success(false)),
            test!("symbol?", &[sym("s")], success(true)),
            test!("symbol?", &[val("s")], success(false)),
            test!("eq?", &[list.clone(), list.clone()], success(true)),
            test!("eq?", &[val([1, 2, 3]), list.clone()], success(false)),
            test!("eq?", &[sym("a"), sym("a")], success(true)),
            test!("eq?", &[val(2), val(2)], success(true)),
            test!("not", &[sym("false")], success(true)),
            test!("not", &[nil()], success(false)),
            test!("not", &[val(0)], success(false)),
            // ===== CONVERSIONS =====
            test!("symbol->string", &[sym("abc")], success("abc")),
            test!("symbol->string", &[val("abc")], None),
            test!("string->symbol", &[val("abc")], success(sym("abc"))),
            test!("string->symbol", &[sym("abc")], None),
            test!("number->string", &[val(2.5)], success("2.5")),
            test!("number->string", &[val(42)], success("42")),
            test!("string->number", &[val("42")], success(42)),
            test!("string->number", &[val("-1.5e1")], success(-15)),
            test!("string->number", &[val("abc")], Some(nil())),
            test!("string->number", &[val("")], Some(nil())),
            test!("read", &[val("(1 . 2)")], Some(pair.clone())),
            test!("read", &[val("'x")], success(vec![sym("quote"), sym("x")])),
            test!("read", &[val("(1")], None),
            // ===== INTERPRETER AND HOST =====
            test!("eval", &[val(vec![sym("+"), val(1), val(2)])], success(3)),
            test!("eval", &[val(vec![sym("quote"), sym("x")])], success(sym("x"))),
            test!("eval", &[val(1), val(2)], None),
            test!("apply", &[sym("car"), val([1])], None),
            test!("display", &[val("hi")], Some(nil())),
            test!("time", &[], success(0)),
            test!("repl-depth", &[], success(0)),
            test!("slurp", &[val("missing.scm")], None),
            test!("slurp", &[val(1)], None),
        ];

        for (i, (name, actual, expected)) in test_cases.into_iter().enumerate() {
            let test_id = format!("Builtin test #{} ({name})", i + 1);
            match (&actual, &expected) {
                (Ok(actual_val), Some(expected_val)) => {
                    assert_eq!(actual_val, expected_val, "{test_id}: value mismatch");
                }
                (Err(_), None) => {}
                _ => panic!(
                    "{test_id}: expected success={}, got {actual:?}",
                    expected.is_some()
                ),
            }
        }
    }

    #[test]
    fn test_set_car_mutates_shared_pair() {
        let list = val([1, 2]);
        let alias = list.clone();
        call_builtin("set-car!", &[list.clone(), val(9)]).unwrap();
        call_builtin("set-cdr!", &[list, val(3)]).unwrap();
        assert_eq!(alias, Value::cons(val(9), val(3)));

        // Non-pair targets are rejected before anything is mutated
        for target in [nil(), val(5), val("s")] {
            let err = call_builtin("set-car!", &[target, val(1)]).unwrap_err();
            assert!(
                matches!(&err, Error::TypeError(msg) if msg.contains("expected pair")),
                "{err}"
            );
        }
    }

    #[test]
    fn test_error_message_construction() {
        type ErrorTest = (Vec<Value>, &'static str, Vec<&'static str>, &'static str);
        let test_cases: Vec<ErrorTest> = vec![
            (vec![val("Simple message")], "Simple message", vec![], ""),
            (
                vec![val("Not found:"), val(404), val("page")],
                "Not found:",
                vec!["404", "\"page\""],
                "404\n\"page\"\n",
            ),
            (vec![sym("oops"), val([1, 2])], "oops", vec!["(1 2)"], "(1 2)\n"),
        ];

        for (args, expected_msg, expected_irritants, expected_output) in test_cases {
            let host = BufferHost::new();
            let mut interp = Interpreter::with_host(host.clone());
            match find_op("error").unwrap().invoke(&mut interp, args.clone()) {
                Err(Error::UserError { message, irritants }) => {
                    assert_eq!(message, expected_msg, "Failed for args: {args:?}");
                    assert_eq!(irritants, expected_irritants, "Failed for args: {args:?}");
                }
                other => panic!("Expected UserError for args {args:?}, got {other:?}"),
            }
            assert_eq!(host.contents(), expected_output);
        }
    }

    #[test]
    fn test_host_primitives() {
        let host = BufferHost::new()
            .with_file("data.txt", "contents\n")
            .with_clock(1500.0);
        let mut interp = Interpreter::with_host(host.clone());

        let slurp = find_op("slurp").unwrap();
        assert_eq!(
            slurp.invoke(&mut interp, vec![val("data.txt")]).unwrap(),
            val("contents\n")
        );
        assert!(matches!(
            slurp.invoke(&mut interp, vec![val("nope.txt")]),
            Err(Error::HostError(_))
        ));

        let time = find_op("time").unwrap();
        assert_eq!(time.invoke(&mut interp, vec![]).unwrap(), val(1500));

        let display = find_op("display").unwrap();
        display.invoke(&mut interp, vec![val("a\"b")]).unwrap();
        display.invoke(&mut interp, vec![val([1, 2])]).unwrap();
        assert_eq!(host.contents(), "a\"b(1 2)");
    }

    #[test]
    fn test_arity_validation() {
        use Arity::*;

        Exact(2).validate(2).unwrap();
        Exact(2).validate(1).unwrap_err();
        Exact(2).validate(3).unwrap_err();

        AtLeast(1).validate(1).unwrap();
        AtLeast(1).validate(2).unwrap();
        AtLeast(1).validate(0).unwrap_err();

        Range(1, 3).validate(1).unwrap();
        Range(1, 3).validate(3).unwrap();
        Range(1, 3).validate(0).unwrap_err();
        Range(1, 3).validate(4).unwrap_err();

        Any.validate(0).unwrap();
        Any.validate(100).unwrap();

        match Exact(2).validate(1).unwrap_err() {
            Error::ArityError { expected, got, .. } => {
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            _ => panic!("Expected ArityError"),
        }
        assert!(Range(1, 2).validate(3).unwrap_err().is_too_many());

        // The registry validates before the primitive runs
        let err = call_builtin("car", &[val([1]), val([2])]).unwrap_err();
        assert!(err.is_too_many());
        let err = call_builtin("cons", &[val(1)]).unwrap_err();
        assert!(err.is_too_few());
    }
}
