use std::{cell::Cell, iter, rc::Rc};

use thiserror::Error;

use crate::{
    ast::{BinOp, Expr, ExprKind, Param, Pattern, UnaryOp},
    builtins::{self, Builtins, Call},
    env::{Closure, Environment},
    lexer::Position,
    value::{Map, Value},
};

/// Lazy stream of evaluation results.
///
/// Consumers stop pulling after the first `Err`; nothing guarantees what a
/// stream yields after one.
pub type ValueStream<'a> = Box<dyn Iterator<Item = Result<Value, RuntimeError>> + 'a>;

/// Error raised while evaluating a query against one document.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {position}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    /// Start of the expression that raised the error
    pub position: Position,
}

/// The kinds of runtime error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// Operation applied to values of the wrong type
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Non-optional field access on an object without that key
    #[error("missing key \"{0}\"")]
    MissingKey(String),

    /// Integer division or modulo by zero
    #[error("division by zero: {0}")]
    DivideByZero(String),

    /// Function exists, but not with this number of arguments
    #[error("{name} takes {} argument(s), called with {found}", arities(.expected))]
    ArityMismatch {
        name: String,
        expected: Vec<usize>,
        found: usize,
    },

    #[error("{name}/{arity} is not defined")]
    UndefinedFunction { name: String, arity: usize },

    #[error("${0} is not defined")]
    UndefinedVariable(String),

    /// Raised by `error` with a caller-supplied value
    #[error("{}", user_message(.0))]
    UserError(Value),

    /// Argument of the right type but an unusable value
    #[error("{function}: {message}")]
    InvalidArgument { function: String, message: String },

    /// Local function calls nested deeper than [`MAX_CALL_DEPTH`]
    #[error("recursion limit of {0} nested calls exceeded")]
    RecursionLimit(usize),
}

/// Deepest nesting of local function calls. Every nested call adds a layer
/// of streams that the next pull walks through on the native stack.
pub const MAX_CALL_DEPTH: usize = 512;

fn arities(expected: &[usize]) -> String {
    let parts: Vec<String> = expected.iter().map(|n| n.to_string()).collect();
    parts.join(" or ")
}

fn user_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, position: Position) -> Self {
        RuntimeError { kind, position }
    }

    pub fn type_mismatch(message: impl Into<String>, position: Position) -> Self {
        Self::new(ErrorKind::TypeMismatch(message.into()), position)
    }

    /// Value handed to a `catch` handler: the payload of `error(v)`, or the
    /// error message for every other kind.
    pub fn catch_value(self) -> Value {
        match self.kind {
            ErrorKind::UserError(value) => value,
            kind => Value::String(kind.to_string()),
        }
    }
}

pub(crate) fn single<'a>(result: Result<Value, RuntimeError>) -> ValueStream<'a> {
    Box::new(iter::once(result))
}

pub(crate) fn fail<'a>(error: RuntimeError) -> ValueStream<'a> {
    single(Err(error))
}

pub(crate) fn nothing<'a>() -> ValueStream<'a> {
    Box::new(iter::empty())
}

pub(crate) fn optional<'a>(result: Result<Option<Value>, RuntimeError>) -> ValueStream<'a> {
    Box::new(result.transpose().into_iter())
}

/// Defers building a stream until its first item is pulled.
pub(crate) fn lazy<'a, F>(build: F) -> ValueStream<'a>
where
    F: FnOnce() -> ValueStream<'a> + 'a,
{
    Box::new(iter::once_with(build).flatten())
}

/// Flat-maps the successful values of `stream`, passing errors through.
pub(crate) fn and_then_each<'a, F>(stream: ValueStream<'a>, mut f: F) -> ValueStream<'a>
where
    F: FnMut(Value) -> ValueStream<'a> + 'a,
{
    Box::new(stream.flat_map(move |item| match item {
        Ok(value) => f(value),
        Err(error) => fail(error),
    }))
}

/// Collects a stream, stopping at the first error.
pub(crate) fn collect(stream: ValueStream<'_>) -> Result<Vec<Value>, RuntimeError> {
    stream.collect()
}

/// The query evaluator.
///
/// Evaluation is pull-based: `evaluate` returns a lazy stream and no work
/// happens until the caller asks for the next value. An evaluator only holds
/// a reference to the process-wide built-in table, so it is `Copy` and can
/// be captured freely by the closures that make up a stream.
#[derive(Clone, Copy)]
pub struct Evaluator {
    builtins: &'static Builtins,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator {
            builtins: builtins::table(),
        }
    }

    /// Evaluates `expr` against `input`, returning every output lazily.
    ///
    /// # Examples
    ///
    /// ```
    /// use aq_lang::{Environment, Evaluator, Query, Value};
    ///
    /// let query = Query::compile(".a, .b").unwrap();
    /// let input = Value::object([("a", Value::Integer(1)), ("b", Value::Integer(2))]);
    ///
    /// let outputs: Vec<Value> = Evaluator::new()
    ///     .evaluate(query.expr(), input, &Environment::new())
    ///     .collect::<Result<_, _>>()
    ///     .unwrap();
    /// assert_eq!(outputs, vec![Value::Integer(1), Value::Integer(2)]);
    /// ```
    pub fn evaluate<'a>(
        &self,
        expr: &'a Expr,
        input: Value,
        env: &Environment<'a>,
    ) -> ValueStream<'a> {
        self.eval(expr, input, env.clone())
    }

    pub(crate) fn eval<'a>(self, expr: &'a Expr, input: Value, env: Environment<'a>) -> ValueStream<'a> {
        let position = expr.position;

        match &expr.kind {
            ExprKind::Identity => single(Ok(input)),
            ExprKind::Literal(value) => single(Ok(value.clone())),

            ExprKind::Field {
                target,
                name,
                optional: opt,
            } => {
                let opt = *opt;
                and_then_each(self.eval(target, input, env), move |value| {
                    optional(access_field(value, name, opt, position))
                })
            }

            ExprKind::Index {
                target,
                index,
                optional: opt,
            } => {
                let opt = *opt;
                let targets = self.eval(target, input.clone(), env.clone());
                and_then_each(targets, move |value| {
                    let indices = self.eval(index, input.clone(), env.clone());
                    and_then_each(indices, move |key| {
                        optional(access_index(value.clone(), key, opt, position))
                    })
                })
            }

            ExprKind::Slice {
                target,
                from,
                to,
                optional: opt,
            } => {
                let opt = *opt;
                let targets = self.eval(target, input.clone(), env.clone());
                and_then_each(targets, move |value| {
                    let (input, env) = (input.clone(), env.clone());
                    let starts = self.eval_bound(from.as_deref(), input.clone(), env.clone());
                    and_then_each(starts, move |start| {
                        let value = value.clone();
                        let ends = self.eval_bound(to.as_deref(), input.clone(), env.clone());
                        and_then_each(ends, move |end| {
                            optional(slice(value.clone(), start.clone(), end, opt, position))
                        })
                    })
                })
            }

            ExprKind::Iterate {
                target,
                optional: opt,
            } => {
                let opt = *opt;
                and_then_each(self.eval(target, input, env), move |value| {
                    iterate(value, opt, position)
                })
            }

            ExprKind::Pipe { left, right } => {
                and_then_each(self.eval(left, input, env.clone()), move |value| {
                    self.eval(right, value, env.clone())
                })
            }

            ExprKind::Comma { left, right } => {
                let first = self.eval(left, input.clone(), env.clone());
                Box::new(first.chain(lazy(move || self.eval(right, input, env))))
            }

            ExprKind::ArrayConstruct(None) => single(Ok(Value::Array(Vec::new()))),
            ExprKind::ArrayConstruct(Some(inner)) => lazy(move || {
                single(collect(self.eval(inner, input, env)).map(Value::Array))
            }),

            ExprKind::ObjectConstruct(entries) => {
                self.construct_object(entries, Map::new(), input, env)
            }

            ExprKind::VariantConstruct { tag, payload } => match payload {
                None => single(Ok(Value::variant(tag.as_str(), None))),
                Some(payload) => Box::new(
                    self.eval(payload, input, env)
                        .map(move |item| item.map(|value| Value::variant(tag.as_str(), Some(value)))),
                ),
            },

            ExprKind::BinaryOp { op, left, right } => {
                self.eval_binary(*op, left, right, input, env, position)
            }

            ExprKind::UnaryOp { op, operand } => {
                let op = *op;
                Box::new(self.eval(operand, input, env).map(move |item| {
                    item.and_then(|value| match op {
                        UnaryOp::Not => Ok(Value::Boolean(!value.is_truthy())),
                        UnaryOp::Negate => negate(value, position),
                    })
                }))
            }

            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let conditions = self.eval(cond, input.clone(), env.clone());
                and_then_each(conditions, move |c| {
                    if c.is_truthy() {
                        self.eval(then_branch, input.clone(), env.clone())
                    } else {
                        match else_branch {
                            Some(branch) => self.eval(branch, input.clone(), env.clone()),
                            None => single(Ok(input.clone())),
                        }
                    }
                })
            }

            ExprKind::FunctionCall { name, args } => self.call(name, args, input, env, position),

            ExprKind::VariableRef(name) => match env.variable(name) {
                Some(value) => single(Ok(value.clone())),
                None if name == "ENV" => single(Ok(environment_object())),
                None => fail(RuntimeError::new(
                    ErrorKind::UndefinedVariable(name.clone()),
                    position,
                )),
            },

            ExprKind::As {
                source,
                pattern,
                body,
            } => {
                let sources = self.eval(source, input.clone(), env.clone());
                and_then_each(sources, move |value| {
                    match destructure(pattern, value, env.clone(), position) {
                        Ok(scope) => self.eval(body, input.clone(), scope),
                        Err(error) => fail(error),
                    }
                })
            }

            ExprKind::FunctionDef {
                name,
                params,
                body,
                rest,
            } => {
                let closure = Closure::definition(name, params, body, env.clone());
                let scope = env.bind_function(name, Rc::new(closure));
                self.eval(rest, input, scope)
            }

            ExprKind::Reduce {
                source,
                pattern,
                init,
                update,
            } => {
                let seeds = self.eval(init, input.clone(), env.clone());
                and_then_each(seeds, move |seed| {
                    let (input, env) = (input.clone(), env.clone());
                    lazy(move || {
                        single(self.fold(source, pattern, update, seed, input, env, position))
                    })
                })
            }

            ExprKind::Try { body, catch } => {
                let attempt = self.eval(body, input, env.clone());
                let recover: Option<Recover<'a>> = catch.as_deref().map(|handler| {
                    Box::new(move |error: RuntimeError| self.eval(handler, error.catch_value(), env))
                        as Recover<'a>
                });
                Box::new(Attempt {
                    body: Some(attempt),
                    recover,
                    handler: None,
                })
            }
        }
    }

    fn eval_bound<'a>(
        self,
        bound: Option<&'a Expr>,
        input: Value,
        env: Environment<'a>,
    ) -> ValueStream<'a> {
        match bound {
            Some(expr) => self.eval(expr, input, env),
            None => single(Ok(Value::Null)),
        }
    }

    /// Builds objects from `entries`, fanning out over every key and value
    /// output. The first entry varies slowest.
    fn construct_object<'a>(
        self,
        entries: &'a [(Expr, Expr)],
        partial: Map,
        input: Value,
        env: Environment<'a>,
    ) -> ValueStream<'a> {
        let Some(((key_expr, value_expr), rest)) = entries.split_first() else {
            return single(Ok(Value::Object(partial)));
        };

        let keys = self.eval(key_expr, input.clone(), env.clone());
        and_then_each(keys, move |key| {
            let key = match key {
                Value::String(key) => key,
                other => {
                    return fail(RuntimeError::type_mismatch(
                        format!("object key must be a string, got {}", other.type_name()),
                        key_expr.position,
                    ));
                }
            };
            let (partial, input, env) = (partial.clone(), input.clone(), env.clone());
            let values = self.eval(value_expr, input.clone(), env.clone());
            and_then_each(values, move |value| {
                let mut next = partial.clone();
                next.insert(key.clone(), value);
                self.construct_object(rest, next, input.clone(), env.clone())
            })
        })
    }

    fn eval_binary<'a>(
        self,
        op: BinOp,
        left: &'a Expr,
        right: &'a Expr,
        input: Value,
        env: Environment<'a>,
        position: Position,
    ) -> ValueStream<'a> {
        match op {
            BinOp::And | BinOp::Or => {
                let lefts = self.eval(left, input.clone(), env.clone());
                and_then_each(lefts, move |l| {
                    let decided = match op {
                        BinOp::And => !l.is_truthy(),
                        _ => l.is_truthy(),
                    };
                    if decided {
                        return single(Ok(Value::Boolean(l.is_truthy())));
                    }
                    Box::new(
                        self.eval(right, input.clone(), env.clone())
                            .map(|item| item.map(|r| Value::Boolean(r.is_truthy()))),
                    )
                })
            }
            BinOp::Alternative => {
                let found = Rc::new(Cell::new(false));
                let seen = Rc::clone(&found);
                let truthy = self
                    .eval(left, input.clone(), env.clone())
                    .take_while(Result::is_ok)
                    .filter(move |item| {
                        let keep = matches!(item, Ok(value) if value.is_truthy());
                        if keep {
                            seen.set(true);
                        }
                        keep
                    });
                let fallback = lazy(move || {
                    if found.get() {
                        nothing()
                    } else {
                        self.eval(right, input, env)
                    }
                });
                Box::new(truthy.chain(fallback))
            }
            _ => {
                let lefts = self.eval(left, input.clone(), env.clone());
                and_then_each(lefts, move |l| {
                    let rights = self.eval(right, input.clone(), env.clone());
                    Box::new(rights.map(move |item| {
                        item.and_then(|r| apply_binop(op, l.clone(), r, position))
                    }))
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fold<'a>(
        self,
        source: &'a Expr,
        pattern: &'a Pattern,
        update: &'a Expr,
        seed: Value,
        input: Value,
        env: Environment<'a>,
        position: Position,
    ) -> Result<Value, RuntimeError> {
        let mut acc = seed;
        for item in self.eval(source, input, env.clone()) {
            let scope = destructure(pattern, item?, env.clone(), position)?;
            let mut last = Value::Null;
            for output in self.eval(update, acc, scope) {
                last = output?;
            }
            acc = last;
        }
        Ok(acc)
    }

    // ========================================
    // Function calls
    // ========================================

    fn call<'a>(
        self,
        name: &'a str,
        args: &'a [Expr],
        input: Value,
        env: Environment<'a>,
        position: Position,
    ) -> ValueStream<'a> {
        if let Some(closure) = env.function(name, args.len()) {
            return self.call_closure(closure, args, input, env, position);
        }

        if let Some(builtin) = self.builtins.get(name, args.len()) {
            return builtin(Call {
                evaluator: self,
                name,
                args,
                input,
                env,
                position,
            });
        }

        let mut expected = env.function_arities(name);
        expected.extend(self.builtins.arities(name));
        expected.sort_unstable();
        expected.dedup();

        let kind = if expected.is_empty() {
            ErrorKind::UndefinedFunction {
                name: name.to_string(),
                arity: args.len(),
            }
        } else {
            ErrorKind::ArityMismatch {
                name: name.to_string(),
                expected,
                found: args.len(),
            }
        };
        fail(RuntimeError::new(kind, position))
    }

    /// Calls a local function.
    ///
    /// Every parameter is bound as a zero-arity function running the argument
    /// in the caller's environment. `$name` parameters are also bound as
    /// variables, once per output of the argument.
    fn call_closure<'a>(
        self,
        closure: Rc<Closure<'a>>,
        args: &'a [Expr],
        input: Value,
        caller: Environment<'a>,
        position: Position,
    ) -> ValueStream<'a> {
        let depth = caller.depth() + 1;
        if depth > MAX_CALL_DEPTH {
            return fail(RuntimeError::new(
                ErrorKind::RecursionLimit(MAX_CALL_DEPTH),
                position,
            ));
        }

        let mut scope = closure.env.at_depth(depth);
        if let Some(name) = closure.name {
            scope = scope.bind_function(name, Rc::clone(&closure));
        }

        let params: &'a [Param] = closure.params;
        let mut value_params = Vec::new();
        for (param, arg) in params.iter().zip(args) {
            let argument = Closure::argument(arg, caller.clone());
            scope = scope.bind_function(param.name(), Rc::new(argument));
            if let Param::Value(name) = param {
                value_params.push((name.as_str(), arg));
            }
        }

        log::trace!("calling {}/{} at {}", closure.name.unwrap_or("<arg>"), args.len(), position);
        self.bind_value_params(Rc::new(value_params), 0, closure.body, scope, input, caller)
    }

    fn bind_value_params<'a>(
        self,
        params: Rc<Vec<(&'a str, &'a Expr)>>,
        next: usize,
        body: &'a Expr,
        scope: Environment<'a>,
        input: Value,
        caller: Environment<'a>,
    ) -> ValueStream<'a> {
        let Some(&(name, arg)) = params.get(next) else {
            return self.eval(body, input, scope);
        };

        let values = self.eval(arg, input.clone(), caller.clone());
        and_then_each(values, move |value| {
            self.bind_value_params(
                Rc::clone(&params),
                next + 1,
                body,
                scope.bind(name, value),
                input.clone(),
                caller.clone(),
            )
        })
    }
}

type Recover<'a> = Box<dyn FnOnce(RuntimeError) -> ValueStream<'a> + 'a>;

/// Stream of `try body catch handler`: the body's outputs up to its first
/// error, then the handler's outputs for that error.
struct Attempt<'a> {
    body: Option<ValueStream<'a>>,
    recover: Option<Recover<'a>>,
    handler: Option<ValueStream<'a>>,
}

impl Iterator for Attempt<'_> {
    type Item = Result<Value, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(handler) = self.handler.as_mut() {
            return handler.next();
        }

        match self.body.as_mut()?.next() {
            Some(Ok(value)) => Some(Ok(value)),
            Some(Err(error)) => {
                self.body = None;
                log::trace!("caught {}", error);
                let recover = self.recover.take()?;
                self.handler.insert(recover(error)).next()
            }
            None => {
                self.body = None;
                None
            }
        }
    }
}

// ========================================
// Access
// ========================================

fn access_field(
    value: Value,
    name: &str,
    optional: bool,
    position: Position,
) -> Result<Option<Value>, RuntimeError> {
    match value {
        Value::Object(mut map) => match map.swap_remove(name) {
            Some(found) => Ok(Some(found)),
            None if optional => Ok(None),
            None => Err(RuntimeError::new(
                ErrorKind::MissingKey(name.to_string()),
                position,
            )),
        },
        _ if optional => Ok(None),
        other => Err(RuntimeError::type_mismatch(
            format!("cannot access field \"{}\" of {}", name, other.type_name()),
            position,
        )),
    }
}

/// Resolves a possibly negative index against a sequence length.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        index.checked_add(len as i64)?
    } else {
        index
    };
    usize::try_from(resolved).ok().filter(|i| *i < len)
}

fn access_index(
    value: Value,
    index: Value,
    optional: bool,
    position: Position,
) -> Result<Option<Value>, RuntimeError> {
    match (value, index) {
        (Value::Array(mut items), Value::Integer(i)) => {
            Ok(resolve_index(i, items.len()).map(|i| items.swap_remove(i)))
        }
        (Value::Bytes(bytes), Value::Integer(i)) => {
            Ok(resolve_index(i, bytes.len()).map(|i| Value::Integer(bytes[i] as i64)))
        }
        (object @ Value::Object(_), Value::String(key)) => {
            access_field(object, &key, optional, position)
        }
        _ if optional => Ok(None),
        (value, index) => Err(RuntimeError::type_mismatch(
            format!(
                "cannot index {} with {}",
                value.type_name(),
                index.type_name()
            ),
            position,
        )),
    }
}

fn slice_bound(bound: &Value, len: usize, default: usize) -> Option<usize> {
    match bound {
        Value::Null => Some(default),
        Value::Integer(i) if *i < 0 => Some(len.saturating_sub(i.unsigned_abs() as usize)),
        Value::Integer(i) => Some((*i as usize).min(len)),
        _ => None,
    }
}

fn slice(
    value: Value,
    from: Value,
    to: Value,
    optional: bool,
    position: Position,
) -> Result<Option<Value>, RuntimeError> {
    let len = match &value {
        Value::Array(items) => items.len(),
        Value::String(s) => s.chars().count(),
        Value::Bytes(bytes) => bytes.len(),
        _ if optional => return Ok(None),
        other => {
            return Err(RuntimeError::type_mismatch(
                format!("cannot slice {}", other.type_name()),
                position,
            ));
        }
    };

    let (Some(start), Some(end)) = (slice_bound(&from, len, 0), slice_bound(&to, len, len)) else {
        if optional {
            return Ok(None);
        }
        return Err(RuntimeError::type_mismatch(
            format!(
                "slice bounds must be integers, got {} and {}",
                from.type_name(),
                to.type_name()
            ),
            position,
        ));
    };
    let end = end.max(start);

    let sliced = match value {
        Value::Array(items) => Value::Array(items[start..end].to_vec()),
        Value::Bytes(bytes) => Value::Bytes(bytes[start..end].to_vec()),
        Value::String(s) => Value::String(s.chars().skip(start).take(end - start).collect()),
        _ => unreachable!("length computed above"),
    };
    Ok(Some(sliced))
}

pub(crate) fn iterate<'a>(value: Value, optional: bool, position: Position) -> ValueStream<'a> {
    match value {
        Value::Array(items) => Box::new(items.into_iter().map(Ok)),
        Value::Object(map) => Box::new(map.into_values().map(Ok)),
        _ if optional => nothing(),
        other => fail(RuntimeError::type_mismatch(
            format!("cannot iterate over {}", other.type_name()),
            position,
        )),
    }
}

/// Binds the variables of `pattern` to the matching parts of `value`.
fn destructure<'a>(
    pattern: &Pattern,
    value: Value,
    env: Environment<'a>,
    position: Position,
) -> Result<Environment<'a>, RuntimeError> {
    match pattern {
        Pattern::Variable(name) => Ok(env.bind(name.as_str(), value)),
        Pattern::Array(items) => {
            let mut elements = match value {
                Value::Array(elements) => elements,
                Value::Null => Vec::new(),
                other => {
                    return Err(RuntimeError::type_mismatch(
                        format!("cannot destructure {} as an array", other.type_name()),
                        position,
                    ));
                }
            };
            elements.resize(items.len().max(elements.len()), Value::Null);
            items
                .iter()
                .zip(elements)
                .try_fold(env, |env, (item, element)| destructure(item, element, env, position))
        }
        Pattern::Object(entries) => {
            let mut map = match value {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                other => {
                    return Err(RuntimeError::type_mismatch(
                        format!("cannot destructure {} as an object", other.type_name()),
                        position,
                    ));
                }
            };
            entries.iter().try_fold(env, |env, (key, item)| {
                let element = map.swap_remove(key.as_str()).unwrap_or_default();
                destructure(item, element, env, position)
            })
        }
    }
}

pub(crate) fn environment_object() -> Value {
    Value::object(std::env::vars().map(|(k, v)| (k, Value::String(v))))
}

// ========================================
// Operators
// ========================================

fn negate(value: Value, position: Position) -> Result<Value, RuntimeError> {
    match value {
        Value::Integer(n) => Ok(n
            .checked_neg()
            .map(Value::Integer)
            .unwrap_or(Value::Float(-(n as f64)))),
        Value::Float(n) => Ok(Value::Float(-n)),
        other => Err(RuntimeError::type_mismatch(
            format!("cannot negate {}", other.type_name()),
            position,
        )),
    }
}

/// Integer arithmetic falls back to floats on overflow.
fn numeric(
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Option<Value> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(
            int_op(*a, *b)
                .map(Value::Integer)
                .unwrap_or_else(|| Value::Float(float_op(*a as f64, *b as f64))),
        ),
        _ => Some(Value::Float(float_op(left.as_float()?, right.as_float()?))),
    }
}

pub(crate) fn apply_binop(
    op: BinOp,
    left: Value,
    right: Value,
    position: Position,
) -> Result<Value, RuntimeError> {
    let mismatch = |left: &Value, right: &Value| {
        RuntimeError::type_mismatch(
            format!(
                "cannot apply {} to {} and {}",
                op,
                left.type_name(),
                right.type_name()
            ),
            position,
        )
    };

    match op {
        BinOp::Equal => Ok(Value::Boolean(left == right)),
        BinOp::NotEqual => Ok(Value::Boolean(left != right)),
        BinOp::LessThan => Ok(Value::Boolean(left.compare(&right).is_lt())),
        BinOp::GreaterThan => Ok(Value::Boolean(left.compare(&right).is_gt())),
        BinOp::LessEqual => Ok(Value::Boolean(left.compare(&right).is_le())),
        BinOp::GreaterEqual => Ok(Value::Boolean(left.compare(&right).is_ge())),

        BinOp::Add => match (left, right) {
            (Value::String(mut a), Value::String(b)) => {
                a.push_str(&b);
                Ok(Value::String(a))
            }
            (Value::Array(mut a), Value::Array(b)) => {
                a.extend(b);
                Ok(Value::Array(a))
            }
            (Value::Bytes(mut a), Value::Bytes(b)) => {
                a.extend(b);
                Ok(Value::Bytes(a))
            }
            (Value::Object(mut a), Value::Object(b)) => {
                a.extend(b);
                Ok(Value::Object(a))
            }
            (left, right) => {
                numeric(&left, &right, i64::checked_add, |a, b| a + b)
                    .ok_or_else(|| mismatch(&left, &right))
            }
        },

        BinOp::Subtract => match (left, right) {
            (Value::Array(mut a), Value::Array(b)) => {
                a.retain(|item| !b.contains(item));
                Ok(Value::Array(a))
            }
            (left, right) => numeric(&left, &right, i64::checked_sub, |a, b| a - b)
                .ok_or_else(|| mismatch(&left, &right)),
        },

        BinOp::Multiply => match (left, right) {
            (Value::Object(a), Value::Object(b)) => Ok(Value::Object(deep_merge(a, b))),
            (left, right) => numeric(&left, &right, i64::checked_mul, |a, b| a * b)
                .ok_or_else(|| mismatch(&left, &right)),
        },

        BinOp::Divide => match (&left, &right) {
            (Value::Integer(a), Value::Integer(0)) => Err(RuntimeError::new(
                ErrorKind::DivideByZero(format!("{} / 0", a)),
                position,
            )),
            (Value::Integer(a), Value::Integer(b)) => match a.checked_rem(*b) {
                Some(0) => Ok(a
                    .checked_div(*b)
                    .map(Value::Integer)
                    .unwrap_or(Value::Float(*a as f64 / *b as f64))),
                _ => Ok(Value::Float(*a as f64 / *b as f64)),
            },
            _ => match (left.as_float(), right.as_float()) {
                (Some(a), Some(b)) => Ok(Value::Float(a / b)),
                _ => Err(mismatch(&left, &right)),
            },
        },

        BinOp::Modulo => match (&left, &right) {
            (Value::Integer(a), Value::Integer(0)) => Err(RuntimeError::new(
                ErrorKind::DivideByZero(format!("{} % 0", a)),
                position,
            )),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.checked_rem(*b).unwrap_or(0))),
            _ => match (left.as_float(), right.as_float()) {
                (Some(a), Some(b)) => Ok(Value::Float(a % b)),
                _ => Err(mismatch(&left, &right)),
            },
        },

        BinOp::And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        BinOp::Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
        BinOp::Alternative => Ok(if left.is_truthy() { left } else { right }),
    }
}

fn deep_merge(mut base: Map, overlay: Map) -> Map {
    for (key, value) in overlay {
        let value = match (base.get_mut(&key), value) {
            (Some(Value::Object(inner)), Value::Object(other)) => {
                *inner = deep_merge(std::mem::take(inner), other);
                continue;
            }
            (_, value) => value,
        };
        base.insert(key, value);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::default()
    }

    #[test]
    fn test_integer_division() {
        let exact = apply_binop(BinOp::Divide, Value::Integer(6), Value::Integer(3), pos()).unwrap();
        assert_eq!(exact, Value::Integer(2));

        let inexact = apply_binop(BinOp::Divide, Value::Integer(7), Value::Integer(2), pos()).unwrap();
        assert_eq!(inexact, Value::Float(3.5));

        let err = apply_binop(BinOp::Divide, Value::Integer(1), Value::Integer(0), pos()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DivideByZero(_)));
    }

    #[test]
    fn test_float_division_by_zero() {
        let inf = apply_binop(BinOp::Divide, Value::Float(1.0), Value::Integer(0), pos()).unwrap();
        assert_eq!(inf, Value::Float(f64::INFINITY));
    }

    #[test]
    fn test_overflow_promotes() {
        let sum = apply_binop(BinOp::Add, Value::Integer(i64::MAX), Value::Integer(1), pos()).unwrap();
        assert!(matches!(sum, Value::Float(_)));
    }

    #[test]
    fn test_object_add_is_right_biased() {
        let a = Value::object([("x", Value::Integer(1)), ("y", Value::Integer(2))]);
        let b = Value::object([("y", Value::Integer(3))]);
        let merged = apply_binop(BinOp::Add, a, b, pos()).unwrap();
        assert_eq!(
            merged,
            Value::object([("x", Value::Integer(1)), ("y", Value::Integer(3))])
        );
    }

    #[test]
    fn test_deep_merge_keeps_key_order() {
        let a = Value::object([
            ("a", Value::object([("b", Value::Integer(1))])),
            ("z", Value::Null),
        ]);
        let b = Value::object([("a", Value::object([("c", Value::Integer(2))]))]);
        let Value::Object(merged) = apply_binop(BinOp::Multiply, a, b, pos()).unwrap() else {
            panic!("expected object");
        };
        let keys: Vec<&String> = merged.keys().collect();
        assert_eq!(keys, vec!["a", "z"]);
        assert_eq!(
            merged["a"],
            Value::object([("b", Value::Integer(1)), ("c", Value::Integer(2))])
        );
    }

    #[test]
    fn test_negative_index() {
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(-4, 3), None);
        assert_eq!(resolve_index(3, 3), None);
    }

    #[test]
    fn test_catch_value() {
        let user = RuntimeError::new(ErrorKind::UserError(Value::Integer(7)), pos());
        assert_eq!(user.catch_value(), Value::Integer(7));

        let missing = RuntimeError::new(ErrorKind::MissingKey("a".into()), pos());
        assert_eq!(missing.catch_value(), Value::from("missing key \"a\""));
    }
}
