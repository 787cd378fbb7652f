//! JSON <-> Value conversion

use serde_json::Deserializer;

use crate::Value;

/// Converts a decoded JSON value; integers that fit `i64` stay integers.
pub fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => {
            Value::Object(obj.into_iter().map(|(k, v)| (k, json_to_value(v))).collect())
        }
    }
}

/// Converts to strict JSON.
///
/// Non-finite floats become `null`, bytes become an array of integers and
/// variants become `{"tag": ..., "payload": ...}` objects.
pub fn value_to_json(v: Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(b),
        Value::Integer(i) => serde_json::Value::Number(i.into()),
        Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s),
        Value::Bytes(bytes) => serde_json::Value::Array(
            bytes
                .into_iter()
                .map(|b| serde_json::Value::Number(b.into()))
                .collect(),
        ),
        Value::Array(arr) => serde_json::Value::Array(arr.into_iter().map(value_to_json).collect()),
        Value::Object(obj) => serde_json::Value::Object(
            obj.into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
        Value::Variant { tag, payload } => {
            let mut object = serde_json::Map::new();
            object.insert("tag".to_string(), serde_json::Value::String(tag));
            if let Some(payload) = payload {
                object.insert("payload".to_string(), value_to_json(*payload));
            }
            serde_json::Value::Object(object)
        }
    }
}

/// Decodes a stream of whitespace-separated JSON documents.
pub fn parse_documents(text: &str) -> Result<Vec<Value>, serde_json::Error> {
    Deserializer::from_str(text)
        .into_iter::<serde_json::Value>()
        .map(|document| document.map(json_to_value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_stream() {
        let documents = parse_documents("1 {\"b\": 2, \"a\": 1.5}\n[null]").unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(documents[0], Value::Integer(1));

        let Value::Object(map) = &documents[1] else {
            panic!("expected object");
        };
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(map["a"], Value::Float(1.5));
    }

    #[test]
    fn test_empty_stream() {
        assert!(parse_documents("  \n").unwrap().is_empty());
        assert!(parse_documents("{").is_err());
    }

    #[test]
    fn test_extensions_to_json() {
        let value = Value::Array(vec![
            Value::Bytes(vec![1, 255]),
            Value::variant("Option::Some", Some(Value::Integer(1))),
            Value::Float(f64::NAN),
        ]);
        assert_eq!(
            value_to_json(value).to_string(),
            r#"[[1,255],{"tag":"Option::Some","payload":1},null]"#
        );
    }
}
