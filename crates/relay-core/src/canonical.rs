//! Canonical JSON: the only input ever fed to the hasher.
//!
//! Rules, applied recursively:
//! - object keys sorted by Unicode code point
//! - no whitespace between tokens
//! - every non-ASCII character escaped as lowercase `\uXXXX` (surrogate
//!   pairs above the BMP); control characters use the short escapes where
//!   JSON has one, `\u00XX` otherwise
//! - numbers rendered by `serde_json` (integers verbatim, floats in their
//!   shortest round-trip form); `true`, `false`, `null` as literals
//!
//! Values that are not JSON-native reach this module only after going
//! through `serde`, which for timestamps means the single form defined in
//! `relay_contracts::timestamp`.
//!
//! Two values that are equal as JSON trees (key order ignored) always
//! produce identical bytes.  The output is itself valid JSON and parses back
//! to an equal tree.

use std::fmt::Write;

use serde::Serialize;
use serde_json::Value;

use relay_contracts::error::{RelayError, RelayResult};

/// Canonical byte encoding of `value`.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    canonical_string(value).into_bytes()
}

/// Canonical encoding of `value` as a `String` (pure ASCII).
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Serialize any `Serialize` type through `serde_json` and canonicalize it.
pub fn canonicalize_serialize<T: Serialize + ?Sized>(value: &T) -> RelayResult<Vec<u8>> {
    let tree = serde_json::to_value(value).map_err(RelayError::serialization)?;
    Ok(canonicalize(&tree))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // serde_json's map order depends on crate features; sort explicitly.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || !c.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn keys_are_sorted_recursively() {
        let value = json!({ "b": 1, "a": { "z": true, "m": null } });
        assert_eq!(canonical_string(&value), r#"{"a":{"m":null,"z":true},"b":1}"#);
    }

    #[test]
    fn key_insertion_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":[1,2,{"q":"r","p":"s"}]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y":[1,2,{"p":"s","q":"r"}],"x":1}"#).unwrap();
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn array_order_is_significant() {
        assert_ne!(canonicalize(&json!([1, 2])), canonicalize(&json!([2, 1])));
    }

    #[test]
    fn non_ascii_is_escaped() {
        let value = json!({ "name": "café ☕ 😀" });
        let out = canonical_string(&value);
        assert!(out.is_ascii());
        assert_eq!(out, r#"{"name":"caf\u00e9 \u2615 \ud83d\ude00"}"#);
    }

    #[test]
    fn control_characters_use_short_escapes() {
        let value = json!("a\"b\\c\nd\te\u{01}");
        assert_eq!(canonical_string(&value), r#""a\"b\\c\nd\te\u0001""#);
    }

    #[test]
    fn numbers_and_literals_have_one_form() {
        let value = json!([0, -7, 1.5, true, false, null]);
        assert_eq!(canonical_string(&value), "[0,-7,1.5,true,false,null]");
    }

    #[test]
    fn output_parses_back_to_an_equal_tree() {
        let value = json!({ "k": ["ü", { "n": 2.25 }], "e": {} });
        let text = canonical_string(&value);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn keys_sort_by_code_point() {
        let value = json!({ "é": 1, "z": 2, "Z": 3 });
        assert_eq!(canonical_string(&value), r#"{"Z":3,"z":2,"\u00e9":1}"#);
    }
}
