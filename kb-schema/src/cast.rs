//! Deterministic, total value casts (§4.2). Each cast is a pure function
//! from a `serde_json::Value` to a normalised `serde_json::Value`, failing
//! with `SchemaError::CastFailure` and the offending input attached.

use serde_json::Value;

use crate::error::SchemaError;
use crate::rid::cast_to_rid;

fn fail(property: &str, value: &Value, reason: impl Into<String>) -> SchemaError {
    SchemaError::CastFailure {
        property: property.to_string(),
        value: value.clone(),
        reason: reason.into(),
    }
}

/// `castInteger`: accepts a JSON number with no fractional part, or a
/// string that parses cleanly as an integer.
pub fn cast_integer(property: &str, value: &Value) -> Result<Value, SchemaError> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => {
            let f = n.as_f64().ok_or_else(|| fail(property, value, "not a number"))?;
            if f.fract() == 0.0 {
                Ok(Value::from(f as i64))
            } else {
                Err(fail(property, value, "number has a fractional part"))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| fail(property, value, "string is not a valid integer")),
        _ => Err(fail(property, value, "expected an integer")),
    }
}

/// `castDecimalInteger`: like `castInteger` but also accepts decimal
/// strings/numbers, truncating toward zero (used for properties declared
/// as integer but stored loosely upstream).
pub fn cast_decimal_integer(property: &str, value: &Value) -> Result<Value, SchemaError> {
    match value {
        Value::Number(n) => {
            let f = n.as_f64().ok_or_else(|| fail(property, value, "not a number"))?;
            Ok(Value::from(f.trunc() as i64))
        }
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(|f| Value::from(f.trunc() as i64))
            .map_err(|_| fail(property, value, "string is not a valid decimal")),
        _ => Err(fail(property, value, "expected a decimal integer")),
    }
}

/// `castBoolean`: total over `{t,true,1,f,false,0,null}`, case-insensitive.
pub fn cast_boolean(property: &str, value: &Value) -> Result<Value, SchemaError> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Null => Ok(Value::Null),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(Value::Bool(false)),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(Value::Bool(true)),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "t" | "true" | "1" => Ok(Value::Bool(true)),
            "f" | "false" | "0" => Ok(Value::Bool(false)),
            "null" => Ok(Value::Null),
            _ => Err(fail(property, value, "not one of t/true/1/f/false/0/null")),
        },
        _ => Err(fail(property, value, "not one of t/true/1/f/false/0/null")),
    }
}

/// `castToRID`, re-exposed as a `Value -> Value` cast that normalises to
/// the canonical `#cluster:position` string form.
pub fn cast_rid(property: &str, value: &Value) -> Result<Value, SchemaError> {
    cast_to_rid(value)
        .map(|rid| Value::String(rid.to_string()))
        .map_err(|_| fail(property, value, "expected a record id"))
}

/// `castRangeInt(v, min, max)`.
pub fn cast_range_int(property: &str, value: &Value, min: i64, max: i64) -> Result<Value, SchemaError> {
    let cast = cast_integer(property, value)?;
    let n = cast.as_i64().ok_or_else(|| fail(property, value, "expected an integer"))?;
    if n < min || n > max {
        Err(fail(
            property,
            value,
            format!("{n} is outside the allowed range [{min}, {max}]"),
        ))
    } else {
        Ok(Value::from(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boolean_is_total_over_documented_inputs() {
        for (input, expected) in [
            (json!("t"), Some(true)),
            (json!("TRUE"), Some(true)),
            (json!("1"), Some(true)),
            (json!(1), Some(true)),
            (json!("f"), Some(false)),
            (json!("False"), Some(false)),
            (json!("0"), Some(false)),
            (json!(0), Some(false)),
        ] {
            let out = cast_boolean("flag", &input).unwrap();
            assert_eq!(out, Value::Bool(expected.unwrap()));
        }
        assert_eq!(cast_boolean("flag", &json!("null")).unwrap(), Value::Null);
        assert_eq!(cast_boolean("flag", &Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn boolean_rejects_everything_else() {
        for bad in [json!("yes"), json!(2), json!([true]), json!({"a": 1})] {
            assert!(cast_boolean("flag", &bad).is_err());
        }
    }

    #[test]
    fn integer_accepts_clean_strings_and_numbers() {
        assert_eq!(cast_integer("n", &json!(5)).unwrap(), json!(5));
        assert_eq!(cast_integer("n", &json!("5")).unwrap(), json!(5));
        assert!(cast_integer("n", &json!("5.5")).is_err());
        assert!(cast_integer("n", &json!(5.5)).is_err());
    }

    #[test]
    fn range_int_enforces_bounds() {
        assert!(cast_range_int("depth", &json!(10), 1, 50).is_ok());
        assert!(cast_range_int("depth", &json!(0), 1, 50).is_err());
        assert!(cast_range_int("depth", &json!(51), 1, 50).is_err());
    }

    #[test]
    fn rid_cast_normalises_to_canonical_form() {
        assert_eq!(cast_rid("out", &json!("12:34")).unwrap(), json!("#12:34"));
    }
}
