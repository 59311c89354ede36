//! The interpreter: special forms, procedure application and the global environment.
//!
//! Evaluation is trampolined. Every form in tail position (the branches of `if`,
//! the last form of `begin`, rewritten `cond` and `let`, and the body of an
//! applied procedure) is returned to the driver loop as [`Step::TailCall`]
//! instead of being evaluated recursively, so tail-recursive programs run in
//! constant native stack. Non-tail evaluation (operators, operands, predicates,
//! `define`/`set!` values) recurses through [`Interpreter::eval`], which grows
//! the native stack on demand and counts against the evaluation depth limit.

pub mod environment;
pub(crate) mod intooperation;
pub(crate) mod syntax;

pub use environment::EnvRef;

use crate::ast::{Procedure, Value, sym};
use crate::builtinops::get_builtin_ops;
use crate::host::{Host, StdHost};
use crate::reader::read_all;
use crate::{Error, MAX_EVAL_DEPTH};
use log::{debug, trace};
use std::rc::Rc;
use syntax::{
    cond_to_if, definition_parts, let_to_combination, operands, parameter_names,
    sequence_to_exp,
};

// Remaining native stack below which `eval` moves onto a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Outcome of one evaluation step
#[derive(Debug)]
pub enum Step {
    /// Evaluation finished with this value
    Done(Value),
    /// Continue by evaluating this expression in this environment
    TailCall(Value, EnvRef),
}

/// Create a root environment holding every primitive and the constant bindings
pub fn create_global_env() -> EnvRef {
    let env = EnvRef::new_root();

    for op in get_builtin_ops() {
        env.define(op.name, Value::Primitive(op));
    }
    env.define("true", sym("true"));
    env.define("false", sym("false"));
    env.define("nil", Value::Nil);
    env.define("the-global-environment", Value::Environment(env.clone()));

    env
}

/// An interpreter instance: the global environment, the host and evaluation counters
pub struct Interpreter {
    global: EnvRef,
    host: Box<dyn Host>,
    max_eval_depth: usize,
    depth: usize,
    repl_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter writing to stdout and reading the real file system
    pub fn new() -> Self {
        Self::with_host(StdHost)
    }

    pub fn with_host<H: Host + 'static>(host: H) -> Self {
        let global = create_global_env();
        debug!("global environment created with {} bindings", global.bindings().len());
        Interpreter {
            global,
            host: Box::new(host),
            max_eval_depth: MAX_EVAL_DEPTH,
            depth: 0,
            repl_depth: 0,
        }
    }

    /// Replace the limit on nested non-tail evaluation
    pub fn with_max_eval_depth(mut self, max_eval_depth: usize) -> Self {
        self.max_eval_depth = max_eval_depth;
        self
    }

    /// The root frame. Its bindings are cleared when the interpreter is dropped.
    pub fn global_env(&self) -> EnvRef {
        self.global.clone()
    }

    /// Evaluate `expr` in `env` to a value
    pub fn eval(&mut self, expr: &Value, env: &EnvRef) -> Result<Value, Error> {
        if self.depth >= self.max_eval_depth {
            return Err(Error::EvalError(format!(
                "Evaluation depth limit exceeded (max: {})",
                self.max_eval_depth
            )));
        }

        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.run(expr.clone(), env.clone())
        });
        self.depth -= 1;
        result
    }

    /// Evaluate `expr` in the global environment
    pub fn eval_global(&mut self, expr: &Value) -> Result<Value, Error> {
        let global = self.global.clone();
        self.eval(expr, &global)
    }

    /// Read every form in `source` and evaluate them in order in the global
    /// environment, returning the last value (`nil` for empty input)
    pub fn eval_str(&mut self, source: &str) -> Result<Value, Error> {
        let mut result = Value::Nil;
        for form in read_all(source)? {
            result = self.eval_global(&form)?;
        }
        Ok(result)
    }

    /// Apply a procedure to evaluated arguments, returning the body of a
    /// compound procedure as a tail call rather than evaluating it
    pub fn apply(&mut self, procedure: &Value, args: Vec<Value>) -> Result<Step, Error> {
        match procedure {
            Value::Primitive(op) => op.invoke(self, args).map(Step::Done),
            Value::Procedure(compound) => {
                let frame = compound.env.extend(&compound.params, args)?;
                Ok(Step::TailCall(compound.body.clone(), frame))
            }
            other => Err(Error::FormError(format!("unknown procedure type: {other}"))),
        }
    }

    /// Apply a procedure and run it to completion
    pub fn call(&mut self, procedure: &Value, args: Vec<Value>) -> Result<Value, Error> {
        match self
            .apply(procedure, args)
            .map_err(|err| err.with_operator(procedure))?
        {
            Step::Done(value) => Ok(value),
            Step::TailCall(body, frame) => self.eval(&body, &frame),
        }
    }

    pub fn enter_repl(&mut self) {
        self.repl_depth += 1;
    }

    pub fn leave_repl(&mut self) {
        self.repl_depth = self.repl_depth.saturating_sub(1);
    }

    /// Number of REPL sessions currently active on this interpreter
    pub fn repl_depth(&self) -> usize {
        self.repl_depth
    }

    pub(crate) fn write_output(&mut self, text: &str) -> Result<(), Error> {
        self.host
            .write_str(text)
            .map_err(|err| Error::HostError(format!("write failed: {err}")))
    }

    pub(crate) fn read_file(&mut self, path: &str) -> Result<String, Error> {
        self.host
            .read_file(path)
            .map_err(|err| Error::HostError(format!("cannot read {path}: {err}")))
    }

    pub(crate) fn now_millis(&self) -> f64 {
        self.host.now_millis()
    }

    /// Driver loop: bounce on tail calls until a step produces a value
    fn run(&mut self, mut expr: Value, mut env: EnvRef) -> Result<Value, Error> {
        loop {
            match self.eval_step(&expr, &env)? {
                Step::Done(value) => return Ok(value),
                Step::TailCall(next, next_env) => {
                    trace!("tail call: {next}");
                    expr = next;
                    env = next_env;
                }
            }
        }
    }

    fn eval_step(&mut self, expr: &Value, env: &EnvRef) -> Result<Step, Error> {
        match expr {
            Value::Number(_) | Value::String(_) => Ok(Step::Done(expr.clone())),
            Value::Symbol(name) => env.lookup(name).map(Step::Done),
            Value::Pair(_) => self.eval_form(expr, env),
            other => Err(Error::FormError(format!(
                "unknown expression type: {other}"
            ))),
        }
    }

    fn eval_form(&mut self, expr: &Value, env: &EnvRef) -> Result<Step, Error> {
        let head = expr.car()?;
        if let Value::Symbol(keyword) = &head {
            match &**keyword {
                "quote" => return eval_quote(expr),
                "set!" => return self.eval_assignment(expr, env),
                "define" => return self.eval_definition(expr, env),
                "if" => return self.eval_if(expr, env),
                "lambda" => return eval_lambda(expr, env),
                "begin" => return self.eval_sequence(expr, env),
                "cond" => return Ok(Step::TailCall(cond_to_if(expr)?, env.clone())),
                "let" => return Ok(Step::TailCall(let_to_combination(expr)?, env.clone())),
                _ => {}
            }
        }

        let operator = self.eval(&head, env)?;
        let mut args = Vec::new();
        for operand in operands(expr, "application")? {
            args.push(self.eval(&operand, env)?);
        }
        self.apply(&operator, args)
            .map_err(|err| err.with_operator(&head))
    }

    fn eval_assignment(&mut self, expr: &Value, env: &EnvRef) -> Result<Step, Error> {
        match operands(expr, "set!")?.as_slice() {
            [Value::Symbol(name), value_expr] => {
                let value = self.eval(value_expr, env)?;
                env.set(name, value)?;
                Ok(Step::Done(Value::ok()))
            }
            _ => Err(Error::FormError(format!("malformed set! expression: {expr}"))),
        }
    }

    fn eval_definition(&mut self, expr: &Value, env: &EnvRef) -> Result<Step, Error> {
        let (name, value_expr) = definition_parts(expr)?;
        let value = self.eval(&value_expr, env)?;
        env.define(&name, value);
        Ok(Step::Done(Value::ok()))
    }

    fn eval_if(&mut self, expr: &Value, env: &EnvRef) -> Result<Step, Error> {
        let (predicate, consequent, alternative) = match operands(expr, "if")?.as_slice() {
            [p, c] => (p.clone(), c.clone(), sym("false")),
            [p, c, a] => (p.clone(), c.clone(), a.clone()),
            _ => return Err(Error::FormError(format!("malformed if expression: {expr}"))),
        };

        let branch = if self.eval(&predicate, env)?.is_false() {
            alternative
        } else {
            consequent
        };
        Ok(Step::TailCall(branch, env.clone()))
    }

    fn eval_sequence(&mut self, expr: &Value, env: &EnvRef) -> Result<Step, Error> {
        let mut forms = operands(expr, "begin")?;
        let Some(last) = forms.pop() else {
            return Ok(Step::Done(Value::Nil));
        };
        for form in &forms {
            self.eval(form, env)?;
        }
        Ok(Step::TailCall(last, env.clone()))
    }
}

impl Drop for Interpreter {
    // Procedures stored in the global frame capture it, forming Rc cycles
    fn drop(&mut self) {
        self.global.clear();
    }
}

fn eval_quote(expr: &Value) -> Result<Step, Error> {
    match operands(expr, "quote")?.as_slice() {
        [datum] => Ok(Step::Done(datum.clone())),
        _ => Err(Error::FormError(format!("malformed quote expression: {expr}"))),
    }
}

fn eval_lambda(expr: &Value, env: &EnvRef) -> Result<Step, Error> {
    let parts = operands(expr, "lambda")?;
    let (params, body) = match parts.split_first() {
        Some((params, body)) if !body.is_empty() => (params, body),
        _ => return Err(Error::FormError(format!("lambda requires a body: {expr}"))),
    };

    let procedure = Procedure {
        params: parameter_names(params)?,
        body: sequence_to_exp(body.to_vec()),
        env: env.clone(),
    };
    Ok(Step::Done(Value::Procedure(Rc::new(procedure))))
}
