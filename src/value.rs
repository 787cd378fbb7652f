use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;

/// Insertion-ordered object body.
pub type Map = IndexMap<String, Value>;

/// A document value of the data model.
///
/// This type covers the JSON baseline plus a distinction between integers
/// and floats, raw byte strings, and tagged variants.
///
/// # Equality
///
/// Equality is strict and type-aware: `Integer(1)` and `Float(1.0)` are not
/// equal. Object equality ignores key order; array equality does not.
///
/// # Examples
///
/// ```
/// use aq_lang::Value;
///
/// let null = Value::Null;
/// let integer = Value::Integer(42);
/// let string = Value::from("hello");
/// let array = Value::Array(vec![Value::Integer(1), Value::Integer(2)]);
/// let some = Value::variant("Option::Some", Some(Value::Integer(1)));
///
/// assert_ne!(Value::Integer(1), Value::Float(1.0));
/// assert_eq!(some.type_name(), "variant");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Null
    #[default]
    Null,

    /// Boolean (true/false)
    Boolean(bool),

    /// 64-bit signed integer (preserved separately from floats)
    Integer(i64),

    /// 64-bit IEEE-754 floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Raw byte string
    Bytes(Vec<u8>),

    /// Ordered sequence of values
    Array(Vec<Value>),

    /// String-keyed mapping, keys kept in insertion order
    Object(Map),

    /// Tagged value, e.g. `Option::Some(1)` or `Option::None`
    Variant {
        tag: String,
        payload: Option<Box<Value>>,
    },
}

impl Value {
    pub fn variant(tag: impl Into<String>, payload: Option<Value>) -> Self {
        Value::Variant {
            tag: tag.into(),
            payload: payload.map(Box::new),
        }
    }

    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Everything is truthy except `false` and `null`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Boolean(false))
    }

    /// Name of the value's type, as reported by the `type` built-in.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Variant { .. } => "variant",
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Bytes(_) => 4,
            Value::Array(_) => 5,
            Value::Object(_) => 6,
            Value::Variant { .. } => 7,
        }
    }

    /// Total order used by comparison operators and sorting built-ins.
    ///
    /// `null < boolean < number < string < bytes < array < object < variant`.
    /// Integers and floats share one numeric rank and compare by value.
    pub fn compare(&self, other: &Value) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => compare_seq(a, b),
            (Value::Object(a), Value::Object(b)) => compare_objects(a, b),
            (
                Value::Variant { tag: ta, payload: pa },
                Value::Variant { tag: tb, payload: pb },
            ) => ta.cmp(tb).then_with(|| match (pa, pb) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.compare(b),
            }),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => compare_numbers(x, y),
                _ => Ordering::Equal,
            },
        }
    }
}

fn compare_numbers(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn compare_seq(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = x.compare(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_objects(a: &Map, b: &Map) -> Ordering {
    let mut keys_a: Vec<&String> = a.keys().collect();
    let mut keys_b: Vec<&String> = b.keys().collect();
    keys_a.sort();
    keys_b.sort();

    let by_keys = keys_a.cmp(&keys_b);
    if by_keys != Ordering::Equal {
        return by_keys;
    }

    for key in keys_a {
        let ord = a[key].compare(&b[key]);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::output::to_text(self))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}
