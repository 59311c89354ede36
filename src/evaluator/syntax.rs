//! Derived forms, rewritten into core forms before evaluation.
//!
//! Rewrites build fresh pair structure and deep-copy the sub-expressions they
//! reuse, so the rewritten code never aliases the source tree.

use crate::Error;
use crate::ast::{Value, sym};
use std::collections::HashSet;
use std::rc::Rc;

/// Deep copy of pair structure; atoms and opaque values are shared
pub(crate) fn copy_tree(value: &Value) -> Result<Value, Error> {
    copy_with_path(value, &mut HashSet::new())
}

fn copy_with_path(value: &Value, path: &mut HashSet<*const ()>) -> Result<Value, Error> {
    let Value::Pair(_) = value else {
        return Ok(value.clone());
    };

    let mut items = Vec::new();
    let mut entered = Vec::new();
    let mut current = value.clone();
    let tail = loop {
        let Value::Pair(pair) = &current else {
            break current;
        };
        let key = Rc::as_ptr(pair).cast::<()>();
        if !path.insert(key) {
            return Err(Error::FormError("cannot evaluate cyclic expression".into()));
        }
        entered.push(key);
        let (first, rest) = {
            let cell = pair.borrow();
            (cell.first.clone(), cell.rest.clone())
        };
        items.push(copy_with_path(&first, path)?);
        current = rest;
    };

    for key in entered {
        path.remove(&key);
    }
    Ok(Value::list_with_tail(items, tail))
}

/// Operands of a special form as a vector; malformed forms are form errors
pub(crate) fn operands(expr: &Value, keyword: &str) -> Result<Vec<Value>, Error> {
    expr.cdr()
        .and_then(|rest| rest.to_vec())
        .map_err(|_| Error::FormError(format!("malformed {keyword} expression: {expr}")))
}

/// A body sequence as one expression: `nil` when empty, the form itself when
/// alone, otherwise wrapped in `begin`
pub(crate) fn sequence_to_exp(mut forms: Vec<Value>) -> Value {
    match forms.len() {
        0 => sym("nil"),
        1 => forms.remove(0),
        _ => Value::cons(sym("begin"), Value::list(forms)),
    }
}

fn make_if(predicate: Value, consequent: Value, alternative: Value) -> Value {
    Value::list([sym("if"), predicate, consequent, alternative])
}

fn make_lambda(params: Value, body: Value) -> Value {
    Value::cons(sym("lambda"), Value::cons(params, body))
}

/// Parameter names of a `lambda`, which must be a proper list of distinct symbols
pub(crate) fn parameter_names(params: &Value) -> Result<Vec<Rc<str>>, Error> {
    let items = params
        .to_vec()
        .map_err(|_| Error::FormError(format!("lambda parameters must be a list: {params}")))?;

    let mut names: Vec<Rc<str>> = Vec::with_capacity(items.len());
    for item in items {
        let Value::Symbol(name) = item else {
            return Err(Error::FormError(format!(
                "lambda parameters must be symbols: {params}"
            )));
        };
        if names.contains(&name) {
            return Err(Error::FormError(format!("duplicate parameter name: {name}")));
        }
        names.push(name);
    }
    Ok(names)
}

/// Rewrite `(cond (p a...) ... (else e...))` into nested `if` forms.
///
/// An `else` clause anywhere but last is an error. With no clause left the
/// result is the expression `false`.
pub(crate) fn cond_to_if(expr: &Value) -> Result<Value, Error> {
    let clauses = operands(expr, "cond")?;
    let last = clauses.len().saturating_sub(1);
    let mut result = sym("false");

    for (index, clause) in clauses.iter().enumerate().rev() {
        let parts = clause
            .to_vec()
            .ok()
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| Error::FormError(format!("malformed cond clause: {clause}")))?;
        let actions = parts[1..]
            .iter()
            .map(copy_tree)
            .collect::<Result<Vec<_>, _>>()?;

        if parts[0].is_symbol("else") {
            if index != last {
                return Err(Error::FormError("else clause isn't last in cond".into()));
            }
            result = sequence_to_exp(actions);
        } else {
            result = make_if(copy_tree(&parts[0])?, sequence_to_exp(actions), result);
        }
    }

    Ok(result)
}

/// Rewrite `(let ((v e) ...) body...)` into `((lambda (v ...) body...) e ...)`
pub(crate) fn let_to_combination(expr: &Value) -> Result<Value, Error> {
    let parts = operands(expr, "let")?;
    let Some((bindings, body)) = parts.split_first() else {
        return Err(Error::FormError(format!("let requires bindings: {expr}")));
    };
    let bindings = bindings
        .to_vec()
        .map_err(|_| Error::FormError(format!("let bindings must be a list: {expr}")))?;

    let mut names = Vec::with_capacity(bindings.len());
    let mut inits = Vec::with_capacity(bindings.len());
    for binding in &bindings {
        match binding.to_vec().as_deref() {
            Ok([name @ Value::Symbol(_), init]) => {
                names.push(name.clone());
                inits.push(copy_tree(init)?);
            }
            _ => {
                return Err(Error::FormError(format!(
                    "let binding must be (name expression): {binding}"
                )));
            }
        }
    }

    let body = body.iter().map(copy_tree).collect::<Result<Vec<_>, _>>()?;
    let lambda = make_lambda(Value::list(names), Value::list(body));
    Ok(Value::cons(lambda, Value::list(inits)))
}

/// Split a definition into the bound name and the expression for its value.
///
/// `(define (name . params) . body)` yields a `lambda` expression.
pub(crate) fn definition_parts(expr: &Value) -> Result<(Rc<str>, Value), Error> {
    let malformed = || Error::FormError(format!("malformed define expression: {expr}"));
    let target = expr.cdr().and_then(|rest| rest.car()).map_err(|_| malformed())?;
    let after_target = expr
        .cdr()
        .and_then(|rest| rest.cdr())
        .map_err(|_| malformed())?;

    match target {
        Value::Symbol(name) => match after_target.to_vec().as_deref() {
            Ok([value]) => Ok((name, value.clone())),
            _ => Err(malformed()),
        },
        Value::Pair(_) => {
            let Value::Symbol(name) = target.car()? else {
                return Err(malformed());
            };
            Ok((name, make_lambda(target.cdr()?, after_target)))
        }
        _ => Err(malformed()),
    }
}
