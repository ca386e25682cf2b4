/*!
 * Wire codec primitives for Portlink.
 *
 * All port, group and message serialization is built on the helpers in
 * this module: colon-separated field splitting/joining, bounded integer
 * parsing and `key=value;...` property blocks. This isolates the one
 * piece of format-sensitive logic in the stack.
 */
use std::collections::HashMap;
use std::fmt::Display;

use crate::error::{Error, Result};

/// The field separator used by all Portlink payloads
pub const SEPARATOR: char = ':';

/// The separator between property pairs in a property block
pub const PROPERTY_SEPARATOR: char = ';';

/// Split a payload on a single-character separator.
///
/// Empty fields are preserved, including trailing ones, so that
/// `join(sep, split(s, sep)) == s` holds for every input.
pub fn split(payload: &str, separator: char) -> Vec<String> {
    payload.split(separator).map(str::to_string).collect()
}

/// Join fields with the given separator.
///
/// Fields are stringified with their `Display` implementation, which for
/// the numeric types used on the wire is locale-independent (no grouping
/// separators, `.` decimal point).
pub fn join<S: Display>(separator: char, fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}

/// Parse an integer field, enforcing inclusive bounds.
///
/// Fails with a [`Error::Format`] naming the field if the value is
/// unparsable or outside `[min, max]`.
pub fn parse_bounded_int(s: &str, field: &str, min: i64, max: i64) -> Result<i64> {
    let value: i64 = s
        .trim()
        .parse()
        .map_err(|_| Error::format(field, format!("'{}' is not a number", s)))?;
    if value < min || value > max {
        return Err(Error::format(
            field,
            format!("{} is outside [{}, {}]", value, min, max),
        ));
    }
    Ok(value)
}

/// Parse a `key=value;key2=value2` property block.
///
/// Pairs without a `=` are skipped; unknown or missing keys are simply
/// absent from the map. Parsing a property block never fails.
pub fn parse_properties(s: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    for pair in s.split(PROPERTY_SEPARATOR) {
        if pair.is_empty() {
            continue;
        }
        if let Some((key, value)) = pair.split_once('=') {
            properties.insert(key.to_string(), value.to_string());
        }
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_preserves_trailing_empty_fields() {
        assert_eq!(split("a:b:", ':'), vec!["a", "b", ""]);
        assert_eq!(split("::", ':'), vec!["", "", ""]);
        assert_eq!(split("abc", ':'), vec!["abc"]);
    }

    #[test]
    fn test_join_is_inverse_of_split() {
        let payload = "SLP:S1:Mode:3:0";
        assert_eq!(join(SEPARATOR, &split(payload, SEPARATOR)), payload);
    }

    #[test]
    fn test_join_numeric_fields() {
        let fields: Vec<String> = vec!["DL".into(), (-10i64).to_string(), 1000.to_string()];
        assert_eq!(join(SEPARATOR, &fields), "DL:-10:1000");
    }

    #[test]
    fn test_parse_bounded_int_accepts_in_range() {
        assert_eq!(parse_bounded_int("42", "flags", 0, 100).unwrap(), 42);
        assert_eq!(parse_bounded_int("-3", "min", -10, 10).unwrap(), -3);
    }

    #[test]
    fn test_parse_bounded_int_names_field_on_failure() {
        let err = parse_bounded_int("abc", "position count", 0, 10).unwrap_err();
        assert!(err.to_string().contains("position count"));

        let err = parse_bounded_int("11", "mode", 0, 3).unwrap_err();
        assert!(err.to_string().contains("mode"));
    }

    #[test]
    fn test_parse_properties() {
        let props = parse_properties("unit=degC;group=g1;layout=wide");
        assert_eq!(props.get("unit").unwrap(), "degC");
        assert_eq!(props.get("group").unwrap(), "g1");
        assert_eq!(props.get("layout").unwrap(), "wide");
        assert!(props.get("icon").is_none());
    }

    #[test]
    fn test_parse_properties_skips_malformed_pairs() {
        let props = parse_properties("unit=degC;;novalue;k=v=w");
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("unit").unwrap(), "degC");
        // only the first '=' separates key from value
        assert_eq!(props.get("k").unwrap(), "v=w");
    }

    #[test]
    fn test_parse_properties_never_errors_on_garbage() {
        assert!(parse_properties("").is_empty());
        assert!(parse_properties(";;;").is_empty());
    }
}
