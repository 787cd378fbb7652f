//! Built-in function library.
//!
//! The table is built once per process and shared read-only by every
//! evaluation, across threads included. Each entry is keyed by name and
//! arity, so `range/1`, `range/2` and `range/3` are separate functions.

use std::{
    collections::HashMap,
    iter,
    rc::Rc,
    sync::LazyLock,
};

use regex::Regex;

use crate::{
    ast::{BinOp, Expr},
    env::Environment,
    evaluator::{
        ErrorKind, Evaluator, RuntimeError, ValueStream, and_then_each, apply_binop, collect,
        environment_object, fail, lazy, nothing, optional, single,
    },
    lexer::Position,
    output,
    value::{Map, Value},
};

/// A built-in implementation. Arguments arrive unevaluated so filters such
/// as `map(f)` can run them against values of their choosing.
pub(crate) type BuiltinFn = for<'a> fn(Call<'a>) -> ValueStream<'a>;

/// One invocation of a built-in.
#[derive(Clone)]
pub(crate) struct Call<'a> {
    pub(crate) evaluator: Evaluator,
    pub(crate) name: &'a str,
    pub(crate) args: &'a [Expr],
    pub(crate) input: Value,
    pub(crate) env: Environment<'a>,
    pub(crate) position: Position,
}

impl<'a> Call<'a> {
    /// Evaluates argument `index` against the call's input.
    fn arg(&self, index: usize) -> ValueStream<'a> {
        self.arg_on(index, self.input.clone())
    }

    /// Evaluates argument `index` against another input, in the caller's scope.
    fn arg_on(&self, index: usize, input: Value) -> ValueStream<'a> {
        let args: &'a [Expr] = self.args;
        self.evaluator.eval(&args[index], input, self.env.clone())
    }

    fn type_mismatch(&self, expected: &str, found: &Value) -> RuntimeError {
        RuntimeError::type_mismatch(
            format!("{} requires {}, got {}", self.name, expected, found.type_name()),
            self.position,
        )
    }

    fn invalid(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::new(
            ErrorKind::InvalidArgument {
                function: self.name.to_string(),
                message: message.into(),
            },
            self.position,
        )
    }

    fn array(&self, value: Value) -> Result<Vec<Value>, RuntimeError> {
        match value {
            Value::Array(items) => Ok(items),
            other => Err(self.type_mismatch("an array", &other)),
        }
    }

    /// Elements of an array or values of an object.
    fn elements(&self, value: Value) -> Result<Vec<Value>, RuntimeError> {
        match value {
            Value::Array(items) => Ok(items),
            Value::Object(map) => Ok(map.into_values().collect()),
            other => Err(self.type_mismatch("an array or object", &other)),
        }
    }

    fn string(&self, value: Value) -> Result<String, RuntimeError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(self.type_mismatch("a string", &other)),
        }
    }
}

/// Runs `f` on the call's input when the first output is pulled.
fn with_input<'a, F>(call: Call<'a>, f: F) -> ValueStream<'a>
where
    F: FnOnce(&Call<'a>, Value) -> Result<Value, RuntimeError> + 'a,
{
    lazy(move || {
        let mut call = call;
        let input = std::mem::take(&mut call.input);
        single(f(&call, input))
    })
}

/// Runs `f` on the call's input once per output of the first argument.
fn with_arg<'a, F>(call: Call<'a>, mut f: F) -> ValueStream<'a>
where
    F: FnMut(&Call<'a>, &Value, Value) -> Result<Value, RuntimeError> + 'a,
{
    let args = call.arg(0);
    and_then_each(args, move |arg| single(f(&call, &call.input, arg)))
}

pub(crate) struct Builtins {
    table: HashMap<(&'static str, usize), BuiltinFn>,
}

static BUILTINS: LazyLock<Builtins> = LazyLock::new(Builtins::standard);

/// The process-wide built-in table.
pub(crate) fn table() -> &'static Builtins {
    &BUILTINS
}

impl Builtins {
    fn with(mut self, name: &'static str, arity: usize, f: BuiltinFn) -> Self {
        self.table.insert((name, arity), f);
        self
    }

    fn standard() -> Self {
        let builtins = Builtins {
            table: HashMap::new(),
        };

        builtins
            // Inspection
            .with("length", 0, length)
            .with("keys", 0, keys)
            .with("values", 0, values)
            .with("type", 0, type_of)
            .with("has", 1, has)
            .with("tag", 0, tag)
            .with("payload", 0, payload)
            .with("not", 0, not)
            // Streams
            .with("empty", 0, empty)
            .with("error", 0, error)
            .with("error", 1, error_with)
            .with("range", 1, range_from)
            .with("range", 2, range_to)
            .with("range", 3, range_step)
            .with("limit", 2, limit)
            .with("first", 0, first)
            .with("first", 1, first_of)
            .with("last", 0, last)
            .with("last", 1, last_of)
            .with("recurse", 0, recurse)
            .with("recurse", 1, recurse_with)
            // Filtering and mapping
            .with("map", 1, map)
            .with("select", 1, select)
            .with("filter", 1, select)
            .with("any", 0, any)
            .with("any", 1, any_with)
            .with("all", 0, all)
            .with("all", 1, all_with)
            // Aggregation
            .with("add", 0, add)
            .with("min", 0, min)
            .with("max", 0, max)
            .with("sort", 0, sort)
            .with("sort_by", 1, sort_by)
            .with("group_by", 1, group_by)
            .with("unique", 0, unique)
            .with("reverse", 0, reverse)
            .with("flatten", 0, flatten)
            .with("flatten", 1, flatten_depth)
            // Objects
            .with("to_entries", 0, to_entries)
            .with("from_entries", 0, from_entries)
            .with("with_entries", 1, with_entries)
            // Strings
            .with("join", 1, join)
            .with("split", 1, split)
            .with("upper", 0, upper)
            .with("lower", 0, lower)
            .with("trim", 0, trim)
            .with("startswith", 1, starts_with)
            .with("endswith", 1, ends_with)
            .with("contains", 1, contains)
            .with("test", 1, test)
            // Conversion
            .with("to_text", 0, to_text)
            .with("tostring", 0, to_text)
            .with("to_number", 0, to_number)
            .with("tonumber", 0, to_number)
            .with("to_bytes", 0, to_bytes)
            .with("env", 0, env)
    }

    pub(crate) fn get(&self, name: &str, arity: usize) -> Option<BuiltinFn> {
        let table: &HashMap<(&str, usize), BuiltinFn> = &self.table;
        table.get(&(name, arity)).copied()
    }

    /// Every arity `name` is defined with.
    pub(crate) fn arities(&self, name: &str) -> Vec<usize> {
        self.table
            .keys()
            .filter(|(builtin, _)| *builtin == name)
            .map(|(_, arity)| *arity)
            .collect()
    }
}

// ========================================
// Inspection
// ========================================

/// length - characters of a string, elements, entries, bytes; absolute value of a number
fn length<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| match input {
        Value::Null => Ok(Value::Integer(0)),
        Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
        Value::Bytes(bytes) => Ok(Value::Integer(bytes.len() as i64)),
        Value::Array(items) => Ok(Value::Integer(items.len() as i64)),
        Value::Object(map) => Ok(Value::Integer(map.len() as i64)),
        Value::Integer(n) => Ok(n
            .checked_abs()
            .map(Value::Integer)
            .unwrap_or(Value::Float((n as f64).abs()))),
        Value::Float(n) => Ok(Value::Float(n.abs())),
        other => Err(call.type_mismatch("a string, array, object, bytes or number", &other)),
    })
}

/// keys - object keys in insertion order, or array indices
fn keys<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| match input {
        Value::Object(map) => Ok(Value::Array(map.into_keys().map(Value::String).collect())),
        Value::Array(items) => Ok(Value::Array(
            (0..items.len() as i64).map(Value::Integer).collect(),
        )),
        other => Err(call.type_mismatch("an object or array", &other)),
    })
}

/// values - object values in insertion order, or the array itself
fn values<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| call.elements(input).map(Value::Array))
}

fn type_of<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |_, input| Ok(Value::from(input.type_name())))
}

/// has(key) - whether an object has a key or an array an index
fn has<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_arg(call, |call, input, key| match (input, &key) {
        (Value::Object(map), Value::String(k)) => Ok(Value::Boolean(map.contains_key(k.as_str()))),
        (Value::Array(items), Value::Integer(i)) => {
            Ok(Value::Boolean(usize::try_from(*i).is_ok_and(|i| i < items.len())))
        }
        (input, key) => Err(RuntimeError::type_mismatch(
            format!(
                "has cannot look up a {} key in {}",
                key.type_name(),
                input.type_name()
            ),
            call.position,
        )),
    })
}

fn tag<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| match input {
        Value::Variant { tag, .. } => Ok(Value::String(tag)),
        other => Err(call.type_mismatch("a variant", &other)),
    })
}

/// payload - the value carried by a variant, `null` for none
fn payload<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| match input {
        Value::Variant { payload, .. } => Ok(payload.map(|p| *p).unwrap_or_default()),
        other => Err(call.type_mismatch("a variant", &other)),
    })
}

fn not<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |_, input| Ok(Value::Boolean(!input.is_truthy())))
}

// ========================================
// Streams
// ========================================

fn empty<'a>(_call: Call<'a>) -> ValueStream<'a> {
    nothing()
}

/// error - raises the input as a user error
fn error<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        Err(RuntimeError::new(ErrorKind::UserError(input), call.position))
    })
}

/// error(message) - raises a user error carrying `message`
fn error_with<'a>(call: Call<'a>) -> ValueStream<'a> {
    let position = call.position;
    and_then_each(call.arg(0), move |message| {
        fail(RuntimeError::new(ErrorKind::UserError(message), position))
    })
}

/// Integers or floats from `from` while below (or above, for a negative
/// step) `to`. A missing `to` never stops.
fn numeric_range<'a>(
    from: Value,
    to: Option<Value>,
    step: Value,
    position: Position,
) -> ValueStream<'a> {
    let mismatch = |value: &Value| {
        fail(RuntimeError::type_mismatch(
            format!("range requires numbers, got {}", value.type_name()),
            position,
        ))
    };

    match (&from, &to, &step) {
        (_, _, Value::Integer(0)) => fail(RuntimeError::new(
            ErrorKind::InvalidArgument {
                function: "range".to_string(),
                message: "step must not be zero".to_string(),
            },
            position,
        )),
        // an integer start and step count in integers whatever the bound
        (
            Value::Integer(start),
            None | Some(Value::Integer(_) | Value::Float(_)),
            Value::Integer(step),
        ) => {
            let (step, end) = (*step, to.as_ref().and_then(|end| end.as_float()));
            let values = iter::successors(Some(*start), move |n| n.checked_add(step))
                .take_while(move |n| match end {
                    Some(end) if step > 0 => (*n as f64) < end,
                    Some(end) => (*n as f64) > end,
                    None => true,
                })
                .map(|n| Ok(Value::Integer(n)));
            Box::new(values)
        }
        _ => {
            let Some(start) = from.as_float() else {
                return mismatch(&from);
            };
            let Some(delta) = step.as_float() else {
                return mismatch(&step);
            };
            let end = match &to {
                Some(end) => match end.as_float() {
                    Some(end) => Some(end),
                    None => return mismatch(end),
                },
                None => None,
            };
            if delta == 0.0 {
                return fail(RuntimeError::new(
                    ErrorKind::InvalidArgument {
                        function: "range".to_string(),
                        message: "step must not be zero".to_string(),
                    },
                    position,
                ));
            }
            let values = iter::successors(Some(start), move |x| Some(x + delta))
                .take_while(move |x| match end {
                    Some(end) if delta > 0.0 => *x < end,
                    Some(end) => *x > end,
                    None => true,
                })
                .map(|x| Ok(Value::Float(x)));
            Box::new(values)
        }
    }
}

/// range(from) - from, from + 1, ... without end
fn range_from<'a>(call: Call<'a>) -> ValueStream<'a> {
    let position = call.position;
    and_then_each(call.arg(0), move |from| {
        numeric_range(from, None, Value::Integer(1), position)
    })
}

/// range(from; to) - from up to, but excluding, to
fn range_to<'a>(call: Call<'a>) -> ValueStream<'a> {
    let starts = call.arg(0);
    and_then_each(starts, move |from| {
        let position = call.position;
        and_then_each(call.arg(1), move |to| {
            numeric_range(from.clone(), Some(to), Value::Integer(1), position)
        })
    })
}

/// range(from; to; step)
fn range_step<'a>(call: Call<'a>) -> ValueStream<'a> {
    let starts = call.arg(0);
    and_then_each(starts, move |from| {
        let call = call.clone();
        and_then_each(call.arg(1), move |to| {
            let from = from.clone();
            let position = call.position;
            and_then_each(call.arg(2), move |step| {
                numeric_range(from.clone(), Some(to.clone()), step, position)
            })
        })
    })
}

/// limit(n; f) - at most the first n outputs of f
fn limit<'a>(call: Call<'a>) -> ValueStream<'a> {
    let counts = call.arg(0);
    and_then_each(counts, move |n| match n {
        Value::Integer(n) if n <= 0 => nothing(),
        Value::Integer(n) => Box::new(call.arg(1).take(n as usize)),
        other => fail(call.type_mismatch("an integer count", &other)),
    })
}

fn first<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        Ok(call.array(input)?.into_iter().next().unwrap_or_default())
    })
}

fn first_of<'a>(call: Call<'a>) -> ValueStream<'a> {
    Box::new(call.arg(0).take(1))
}

fn last<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| Ok(call.array(input)?.pop().unwrap_or_default()))
}

fn last_of<'a>(call: Call<'a>) -> ValueStream<'a> {
    lazy(move || optional(call.arg(0).try_fold(None, |_, item| item.map(Some))))
}

fn descend<'a>(value: Value) -> ValueStream<'a> {
    let children = value.clone();
    let rest = lazy(move || match children {
        Value::Array(items) => Box::new(items.into_iter().flat_map(descend)),
        Value::Object(map) => Box::new(map.into_values().flat_map(descend)),
        _ => nothing(),
    });
    Box::new(iter::once(Ok(value)).chain(rest))
}

/// recurse - the input and every value nested in it, depth first
fn recurse<'a>(call: Call<'a>) -> ValueStream<'a> {
    descend(call.input)
}

fn recurse_step<'a>(call: Rc<Call<'a>>, value: Value) -> ValueStream<'a> {
    let next = value.clone();
    let rest = lazy(move || {
        let children = call.arg_on(0, next);
        and_then_each(children, move |child| recurse_step(Rc::clone(&call), child))
    });
    Box::new(iter::once(Ok(value)).chain(rest))
}

/// recurse(f) - the input, then recursively every output of f
fn recurse_with<'a>(call: Call<'a>) -> ValueStream<'a> {
    let input = call.input.clone();
    recurse_step(Rc::new(call), input)
}

// ========================================
// Filtering and mapping
// ========================================

/// map(f) - collects f applied to every element
fn map<'a>(call: Call<'a>) -> ValueStream<'a> {
    lazy(move || {
        let items = match call.elements(call.input.clone()) {
            Ok(items) => items,
            Err(error) => return fail(error),
        };
        let mapped = items.into_iter().map(|item| collect(call.arg_on(0, item)));
        single(
            mapped
                .collect::<Result<Vec<Vec<Value>>, _>>()
                .map(|outputs| Value::Array(outputs.concat())),
        )
    })
}

/// select(f) - the input once for every truthy output of f
fn select<'a>(call: Call<'a>) -> ValueStream<'a> {
    let conditions = call.arg(0);
    let input = call.input;
    Box::new(conditions.filter_map(move |item| match item {
        Ok(condition) if condition.is_truthy() => Some(Ok(input.clone())),
        Ok(_) => None,
        Err(error) => Some(Err(error)),
    }))
}

/// Whether f yields a truthy (or falsy, when `wanted` is false) output for
/// any of the items.
fn find_output(call: &Call<'_>, items: Vec<Value>, wanted: bool) -> Result<bool, RuntimeError> {
    for item in items {
        for output in call.arg_on(0, item) {
            if output?.is_truthy() == wanted {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn any<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        Ok(Value::Boolean(call.elements(input)?.iter().any(Value::is_truthy)))
    })
}

/// any(f) - whether f holds for some element
fn any_with<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        let items = call.elements(input)?;
        Ok(Value::Boolean(find_output(call, items, true)?))
    })
}

fn all<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        Ok(Value::Boolean(call.elements(input)?.iter().all(Value::is_truthy)))
    })
}

/// all(f) - whether f holds for every element
fn all_with<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        let items = call.elements(input)?;
        Ok(Value::Boolean(!find_output(call, items, false)?))
    })
}

// ========================================
// Aggregation
// ========================================

/// add - folds the elements with `+`; `null` when there are none
fn add<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        if input == Value::Null {
            return Ok(Value::Null);
        }
        let mut items = call.elements(input)?.into_iter();
        let Some(first) = items.next() else {
            return Ok(Value::Null);
        };
        items.try_fold(first, |sum, item| apply_binop(BinOp::Add, sum, item, call.position))
    })
}

fn min<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        Ok(call
            .array(input)?
            .into_iter()
            .min_by(|a, b| a.compare(b))
            .unwrap_or_default())
    })
}

fn max<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        Ok(call
            .array(input)?
            .into_iter()
            .max_by(|a, b| a.compare(b))
            .unwrap_or_default())
    })
}

fn sort<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        let mut items = call.array(input)?;
        items.sort_by(|a, b| a.compare(b));
        Ok(Value::Array(items))
    })
}

/// Pairs every element with the array of f's outputs for it, sorted by
/// that key. The sort is stable.
fn keyed(call: &Call<'_>, input: Value) -> Result<Vec<(Value, Value)>, RuntimeError> {
    let mut pairs = call
        .array(input)?
        .into_iter()
        .map(|item| -> Result<(Value, Value), RuntimeError> {
            let key = collect(call.arg_on(0, item.clone()))?;
            Ok((Value::Array(key), item))
        })
        .collect::<Result<Vec<_>, RuntimeError>>()?;
    pairs.sort_by(|a, b| a.0.compare(&b.0));
    Ok(pairs)
}

/// sort_by(f) - sorts by the outputs of f
fn sort_by<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        let pairs = keyed(call, input)?;
        Ok(Value::Array(pairs.into_iter().map(|(_, item)| item).collect()))
    })
}

/// group_by(f) - arrays of elements sharing the same outputs of f, ordered by them
fn group_by<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        let pairs = keyed(call, input)?;
        let groups = pairs
            .chunk_by(|a, b| a.0.compare(&b.0).is_eq())
            .map(|group| Value::Array(group.iter().map(|(_, item)| item.clone()).collect()))
            .collect();
        Ok(Value::Array(groups))
    })
}

/// unique - sorted, without duplicates
fn unique<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        let mut items = call.array(input)?;
        items.sort_by(|a, b| a.compare(b));

        // `1` and `1.0` sort as equal but are distinct values, so a run of
        // equal-sorting items can interleave several of them
        let mut unique: Vec<Value> = Vec::with_capacity(items.len());
        for run in items.chunk_by(|a, b| a.compare(b).is_eq()) {
            let start = unique.len();
            for item in run {
                if !unique[start..].contains(item) {
                    unique.push(item.clone());
                }
            }
        }
        Ok(Value::Array(unique))
    })
}

fn reverse<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| match input {
        Value::Array(mut items) => {
            items.reverse();
            Ok(Value::Array(items))
        }
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        Value::Bytes(mut bytes) => {
            bytes.reverse();
            Ok(Value::Bytes(bytes))
        }
        other => Err(call.type_mismatch("an array, string or bytes", &other)),
    })
}

fn flatten_into(items: Vec<Value>, depth: usize, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => flatten_into(inner, depth - 1, out),
            other => out.push(other),
        }
    }
}

/// flatten - splices nested arrays at every depth
fn flatten<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        let mut out = Vec::new();
        flatten_into(call.array(input)?, usize::MAX, &mut out);
        Ok(Value::Array(out))
    })
}

/// flatten(depth)
fn flatten_depth<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_arg(call, |call, input, depth| {
        let depth = match depth {
            Value::Integer(n) => usize::try_from(n).map_err(|_| call.invalid("depth must not be negative"))?,
            other => return Err(call.type_mismatch("an integer depth", &other)),
        };
        let mut out = Vec::new();
        flatten_into(call.array(input.clone())?, depth, &mut out);
        Ok(Value::Array(out))
    })
}

// ========================================
// Objects
// ========================================

fn entries_of(call: &Call<'_>, input: Value) -> Result<Vec<Value>, RuntimeError> {
    match input {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| Value::object([("key", Value::String(key)), ("value", value)]))
            .collect()),
        other => Err(call.type_mismatch("an object", &other)),
    }
}

fn object_of(call: &Call<'_>, entries: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut object = Map::new();
    for entry in entries {
        let Value::Object(mut fields) = entry else {
            return Err(call.type_mismatch("entries that are objects", &entry));
        };
        let key = ["key", "k", "name"]
            .iter()
            .find_map(|name| fields.swap_remove(*name))
            .unwrap_or_default();
        let key = match key {
            Value::String(key) => key,
            key @ (Value::Integer(_) | Value::Float(_) | Value::Boolean(_)) => key.to_string(),
            other => return Err(call.type_mismatch("a string entry key", &other)),
        };
        let value = ["value", "v"]
            .iter()
            .find_map(|name| fields.swap_remove(*name))
            .unwrap_or_default();
        object.insert(key, value);
    }
    Ok(Value::Object(object))
}

/// to_entries - `{key, value}` objects in insertion order
fn to_entries<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| entries_of(call, input).map(Value::Array))
}

/// from_entries - object from `{key, value}` (or `k`/`name`, `v`) objects
fn from_entries<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        let entries = call.array(input)?;
        object_of(call, entries)
    })
}

/// with_entries(f) - to_entries | map(f) | from_entries
fn with_entries<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        let mut mapped = Vec::new();
        for entry in entries_of(call, input)? {
            mapped.extend(collect(call.arg_on(0, entry))?);
        }
        object_of(call, mapped)
    })
}

// ========================================
// Strings
// ========================================

fn text_piece(call: &Call<'_>, value: &Value) -> Result<String, RuntimeError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => Ok(value.to_string()),
        other => Err(call.type_mismatch("strings, numbers, booleans or nulls", other)),
    }
}

/// join(separator)
fn join<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_arg(call, |call, input, separator| {
        let separator = call.string(separator)?;
        let Value::Array(items) = input else {
            return Err(call.type_mismatch("an array", input));
        };
        let pieces = items
            .iter()
            .map(|item| text_piece(call, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::String(pieces.join(&separator)))
    })
}

/// split(separator) - an empty separator splits into characters
fn split<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_arg(call, |call, input, separator| {
        let separator = call.string(separator)?;
        let text = call.string(input.clone())?;
        let parts: Vec<Value> = if separator.is_empty() {
            text.chars().map(|c| Value::String(c.to_string())).collect()
        } else {
            text.split(separator.as_str()).map(Value::from).collect()
        };
        Ok(Value::Array(parts))
    })
}

fn upper<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| Ok(Value::String(call.string(input)?.to_uppercase())))
}

fn lower<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| Ok(Value::String(call.string(input)?.to_lowercase())))
}

fn trim<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| {
        Ok(Value::String(call.string(input)?.trim().to_string()))
    })
}

fn starts_with<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_arg(call, |call, input, prefix| {
        let prefix = call.string(prefix)?;
        Ok(Value::Boolean(call.string(input.clone())?.starts_with(&prefix)))
    })
}

fn ends_with<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_arg(call, |call, input, suffix| {
        let suffix = call.string(suffix)?;
        Ok(Value::Boolean(call.string(input.clone())?.ends_with(&suffix)))
    })
}

/// Recursive containment; `None` when the types cannot be compared.
fn contains_value(haystack: &Value, needle: &Value) -> Option<bool> {
    match (haystack, needle) {
        (Value::String(a), Value::String(b)) => Some(a.contains(b.as_str())),
        (Value::Bytes(a), Value::Bytes(b)) => {
            Some(b.is_empty() || a.windows(b.len()).any(|window| window == b.as_slice()))
        }
        (Value::Array(a), Value::Array(b)) => Some(
            b.iter()
                .all(|y| a.iter().any(|x| contains_value(x, y) == Some(true))),
        ),
        (Value::Object(a), Value::Object(b)) => Some(b.iter().all(|(key, y)| {
            a.get(key)
                .is_some_and(|x| contains_value(x, y) == Some(true))
        })),
        (a, b) if a.as_float().is_some() && b.as_float().is_some() => Some(a.compare(b).is_eq()),
        (a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => Some(a == b),
        _ => None,
    }
}

/// contains(x) - substring, sub-array or sub-object containment
fn contains<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_arg(call, |call, input, needle| match contains_value(input, &needle) {
        Some(found) => Ok(Value::Boolean(found)),
        None => Err(RuntimeError::type_mismatch(
            format!(
                "contains cannot look for {} in {}",
                needle.type_name(),
                input.type_name()
            ),
            call.position,
        )),
    })
}

/// test(regex) - whether the input matches a regular expression
fn test<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_arg(call, |call, input, pattern| {
        let pattern = call.string(pattern)?;
        let regex = Regex::new(&pattern).map_err(|e| call.invalid(e.to_string()))?;
        Ok(Value::Boolean(regex.is_match(&call.string(input.clone())?)))
    })
}

// ========================================
// Conversion
// ========================================

/// to_text - strings unchanged, anything else rendered compactly
fn to_text<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |_, input| match input {
        Value::String(s) => Ok(Value::String(s)),
        other => Ok(Value::String(output::to_text(&other))),
    })
}

/// to_number - numbers unchanged, numeric text parsed
fn to_number<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| match input {
        number @ (Value::Integer(_) | Value::Float(_)) => Ok(number),
        Value::String(text) => {
            let trimmed = text.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                Ok(Value::Integer(n))
            } else if let Ok(x) = trimmed.parse::<f64>() {
                Ok(Value::Float(x))
            } else {
                Err(call.invalid(format!("cannot parse \"{}\" as a number", text)))
            }
        }
        other => Err(call.type_mismatch("a string or number", &other)),
    })
}

/// to_bytes - UTF-8 of a string, or an array of integers 0-255
fn to_bytes<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |call, input| match input {
        Value::Bytes(bytes) => Ok(Value::Bytes(bytes)),
        Value::String(s) => Ok(Value::Bytes(s.into_bytes())),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Integer(n) => u8::try_from(*n)
                    .map_err(|_| call.invalid(format!("{} is not a byte", n))),
                other => Err(call.type_mismatch("integers", other)),
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Value::Bytes),
        other => Err(call.type_mismatch("a string, bytes or array", &other)),
    })
}

/// env - the process environment as an object
fn env<'a>(call: Call<'a>) -> ValueStream<'a> {
    with_input(call, |_, _| Ok(environment_object()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_arities() {
        let table = table();
        let mut arities = table.arities("range");
        arities.sort_unstable();
        assert_eq!(arities, vec![1, 2, 3]);
        assert!(table.get("length", 0).is_some());
        assert!(table.get("length", 1).is_none());
        assert!(table.arities("nope").is_empty());
    }

    #[test]
    fn test_contains_value() {
        let haystack = Value::Array(vec![Value::from("foobar"), Value::Integer(1)]);
        let needle = Value::Array(vec![Value::from("bar")]);
        assert_eq!(contains_value(&haystack, &needle), Some(true));
        assert_eq!(contains_value(&Value::Integer(1), &Value::from("1")), None);
    }

    #[test]
    fn test_flatten_depth() {
        let nested = vec![
            Value::Integer(1),
            Value::Array(vec![Value::Array(vec![Value::Integer(2)])]),
        ];
        let mut out = Vec::new();
        flatten_into(nested, 1, &mut out);
        assert_eq!(
            out,
            vec![Value::Integer(1), Value::Array(vec![Value::Integer(2)])]
        );
    }
}
