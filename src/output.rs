//! Text rendering of values.
//!
//! The JSON subset of the data model renders as valid JSON, with object keys
//! in insertion order. The extensions get their own literal forms, the same
//! ones the query language accepts:
//!
//! - **Floats** always carry a fraction or an exponent (`2.0`, `1e21`), so
//!   they never read back as integers; non-finite floats render as `NaN`,
//!   `Inf` and `-Inf`
//! - **Bytes** render as `h"0a ff"`
//! - **Variants** render as `Option::None` or `Option::Some(1)`
//!
//! # Examples
//!
//! ```
//! use aq_lang::Value;
//! use aq_lang::output::{to_text, to_text_pretty};
//!
//! let value = Value::object([("b", Value::Float(2.0)), ("a", Value::Bytes(vec![10, 255]))]);
//!
//! assert_eq!(to_text(&value), r#"{"b":2.0,"a":h"0a ff"}"#);
//! assert_eq!(to_text_pretty(&value), "{\n  \"b\": 2.0,\n  \"a\": h\"0a ff\"\n}");
//! ```

use crate::value::{Map, Value};

pub struct TextPrinter {
    pretty: bool,
}

impl TextPrinter {
    pub fn new(pretty: bool) -> Self {
        TextPrinter { pretty }
    }

    pub fn print(&self, value: &Value) -> String {
        let mut out = String::new();
        self.print_value(value, 0, &mut out);
        out
    }

    fn print_value(&self, value: &Value, indent: usize, out: &mut String) {
        match value {
            Value::Null => out.push_str("null"),
            Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Integer(n) => out.push_str(&n.to_string()),
            Value::Float(n) => out.push_str(&format_float(*n)),
            Value::String(s) => push_string(s, out),
            Value::Bytes(bytes) => {
                let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                out.push_str("h\"");
                out.push_str(&hex.join(" "));
                out.push('"');
            }
            Value::Array(items) => self.print_array(items, indent, out),
            Value::Object(map) => self.print_object(map, indent, out),
            Value::Variant { tag, payload } => {
                out.push_str(tag);
                if let Some(payload) = payload {
                    out.push('(');
                    self.print_value(payload, indent, out);
                    out.push(')');
                }
            }
        }
    }

    fn print_array(&self, items: &[Value], indent: usize, out: &mut String) {
        if items.is_empty() {
            out.push_str("[]");
            return;
        }

        out.push('[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            self.break_line(indent + 1, out);
            self.print_value(item, indent + 1, out);
        }
        self.break_line(indent, out);
        out.push(']');
    }

    fn print_object(&self, map: &Map, indent: usize, out: &mut String) {
        if map.is_empty() {
            out.push_str("{}");
            return;
        }

        out.push('{');
        for (i, (key, value)) in map.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            self.break_line(indent + 1, out);
            push_string(key, out);
            out.push_str(if self.pretty { ": " } else { ":" });
            self.print_value(value, indent + 1, out);
        }
        self.break_line(indent, out);
        out.push('}');
    }

    fn break_line(&self, level: usize, out: &mut String) {
        if self.pretty {
            out.push('\n');
            out.push_str(&"  ".repeat(level));
        }
    }
}

fn format_float(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n < 0.0 { "-" } else { "" };
        format!("{}Inf", sign)
    } else {
        // Debug keeps the trailing `.0` that Display drops
        format!("{:?}", n)
    }
}

fn push_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Renders a value on one line with no extra whitespace.
pub fn to_text(value: &Value) -> String {
    TextPrinter::new(false).print(value)
}

/// Renders a value with one element per line and two-space indentation.
pub fn to_text_pretty(value: &Value) -> String {
    TextPrinter::new(true).print(value)
}
