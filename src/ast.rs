//! Runtime values and the cons-pair structure shared by data and code.
//!
//! The main enum, [`Value`], is a closed set of cases: numbers, strings, symbols,
//! the empty list, mutable pairs, compound procedures, primitives and first-class
//! environment references. Programs are read into the same pairs that `cons` and
//! `set-car!` operate on, so pairs are shared handles: cloning a [`Value::Pair`]
//! clones the handle, never the cell, and mutation through one handle is observed
//! through all of them.
//!
//! Ergonomic helpers such as [`val`], [`sym`] and [`nil`] build values from Rust
//! literals, arrays and vectors, which keeps tests close to the printed form.

use crate::Error;
use crate::builtinops::BuiltinOp;
use crate::evaluator::EnvRef;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Type alias for number values in interpreter
pub(crate) type NumberType = f64;

/// Symbol the evaluator treats as false; every other value is true
pub(crate) const FALSE_SYMBOL: &str = "false";
pub(crate) const TRUE_SYMBOL: &str = "true";
/// Result of `define`, `set!` and the pair mutators
pub(crate) const OK_SYMBOL: &str = "ok";

/// Shared, interior-mutable handle to a cons cell
pub type PairRef = Rc<RefCell<Pair>>;

/// A cons cell
#[derive(Clone)]
pub struct Pair {
    pub first: Value,
    pub rest: Value,
}

/// A user-defined procedure created by evaluating `lambda`
pub struct Procedure {
    pub params: Vec<Rc<str>>,
    /// The body as a single expression (`begin` wrapped when it has several forms)
    pub body: Value,
    pub env: EnvRef,
}

/// Core value type in interpreter
///
/// To build values in code and tests, use the helper functions:
/// - `val(42)` for numbers, `val("text")` for strings, `sym("name")` for symbols
/// - `val([1, 2, 3])` for homogeneous proper lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
/// - `nil()` for the empty list
#[derive(Clone)]
pub enum Value {
    /// Floating point numbers
    Number(NumberType),
    /// Immutable text, distinct from symbols by tag
    String(Rc<str>),
    /// Names, compared by content
    Symbol(Rc<str>),
    /// The empty list
    Nil,
    /// A mutable cons cell
    Pair(PairRef),
    /// Compound procedure (params, body, captured environment)
    Procedure(Rc<Procedure>),
    /// Native operation from the builtin registry
    Primitive(&'static BuiltinOp),
    /// First-class reference to an environment frame
    Environment(EnvRef),
}

impl Drop for Pair {
    // Take apart uniquely owned cells with a worklist so dropping a structure
    // nested deeply on either side does not recurse once per level.
    fn drop(&mut self) {
        if !matches!(self.first, Value::Pair(_)) && !matches!(self.rest, Value::Pair(_)) {
            return;
        }
        let mut pending = vec![
            std::mem::replace(&mut self.first, Value::Nil),
            std::mem::replace(&mut self.rest, Value::Nil),
        ];
        while let Some(value) = pending.pop() {
            let Value::Pair(handle) = value else {
                continue;
            };
            if let Ok(cell) = Rc::try_unwrap(handle) {
                let mut pair = cell.into_inner();
                pending.push(std::mem::replace(&mut pair.first, Value::Nil));
                pending.push(std::mem::replace(&mut pair.rest, Value::Nil));
            }
        }
    }
}

impl Value {
    pub fn cons(first: Value, rest: Value) -> Value {
        Value::Pair(Rc::new(RefCell::new(Pair { first, rest })))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::from(name))
    }

    pub fn string(text: &str) -> Value {
        Value::String(Rc::from(text))
    }

    /// Build a proper list from the given elements
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Self::list_with_tail(items, Value::Nil)
    }

    /// Build a list whose final rest is `tail` (a dotted list unless `tail` is a list)
    pub fn list_with_tail<I: IntoIterator<Item = Value>>(items: I, tail: Value) -> Value {
        let items: Vec<Value> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(tail, |rest, first| Value::cons(first, rest))
    }

    /// Symbolic boolean: the symbols `true` and `false`
    pub fn truth(b: bool) -> Value {
        Value::symbol(if b { TRUE_SYMBOL } else { FALSE_SYMBOL })
    }

    pub(crate) fn ok() -> Value {
        Value::symbol(OK_SYMBOL)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only the symbol `false` is false
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Symbol(name) if &**name == FALSE_SYMBOL)
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        matches!(self, Value::Symbol(s) if &**s == name)
    }

    pub fn as_pair(&self) -> Option<&PairRef> {
        match self {
            Value::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    /// The `first` slot of a pair
    pub fn car(&self) -> Result<Value, Error> {
        match self {
            Value::Pair(pair) => Ok(pair.borrow().first.clone()),
            other => Err(Error::TypeError(format!("car: expected pair, got {other}"))),
        }
    }

    /// The `rest` slot of a pair
    pub fn cdr(&self) -> Result<Value, Error> {
        match self {
            Value::Pair(pair) => Ok(pair.borrow().rest.clone()),
            other => Err(Error::TypeError(format!("cdr: expected pair, got {other}"))),
        }
    }

    /// Collect the elements of a proper list.
    ///
    /// Dotted and cyclic lists are rejected with a type error.
    pub fn to_vec(&self) -> Result<Vec<Value>, Error> {
        let mut items = Vec::new();
        let mut seen: HashSet<*const RefCell<Pair>> = HashSet::new();
        let mut current = self.clone();
        loop {
            let next = match &current {
                Value::Nil => return Ok(items),
                Value::Pair(pair) => {
                    if !seen.insert(Rc::as_ptr(pair)) {
                        return Err(Error::TypeError("expected proper list, found a cycle".into()));
                    }
                    let cell = pair.borrow();
                    items.push(cell.first.clone());
                    cell.rest.clone()
                }
                other => {
                    return Err(Error::TypeError(format!(
                        "expected proper list, found dotted tail {other}"
                    )));
                }
            };
            current = next;
        }
    }

    /// Identity comparison used by `eq?`: pairs, procedures and environments
    /// compare by reference, everything else by value.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::Environment(a), Value::Environment(b)) => a.ptr_eq(b),
            _ => self == other,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Nil => write!(f, "Nil"),
            Value::Pair(_) => write!(f, "Pair{self}"),
            Value::Procedure(p) => write!(f, "Procedure(params={:?})", p.params),
            Value::Primitive(op) => write!(f, "Primitive({})", op.name),
            Value::Environment(_) => write!(f, "Environment"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(_), Value::Pair(_)) => pairs_equal(self, other),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            // Compare primitives by registry name, not function pointer
            (Value::Primitive(a), Value::Primitive(b)) => a.name == b.name,
            (Value::Environment(a), Value::Environment(b)) => a.ptr_eq(b),
            _ => false, // Different variants are never equal
        }
    }
}

/// Structural comparison over an explicit worklist of cell pairs
fn pairs_equal(a: &Value, b: &Value) -> bool {
    let mut pending = vec![(a.clone(), b.clone())];
    while let Some((a, b)) = pending.pop() {
        match (&a, &b) {
            (Value::Pair(pa), Value::Pair(pb)) => {
                if Rc::ptr_eq(pa, pb) {
                    continue;
                }
                let (ca, cb) = (pa.borrow(), pb.borrow());
                pending.push((ca.rest.clone(), cb.rest.clone()));
                pending.push((ca.first.clone(), cb.first.clone()));
            }
            _ if a != b => return false,
            _ => {}
        }
    }
    true
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::truth(b)
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

// Integer types that convert to f64 without loss
impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into))
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::list(slice.iter().cloned().map(Into::into))
    }
}

/// Helper function for creating symbols - works great in mixed lists!
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::symbol(name.as_ref())
}

/// Helper function for creating Values from anything convertible
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// The empty list
pub fn nil() -> Value {
    Value::Nil
}
