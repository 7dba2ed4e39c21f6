use serde_json::Value;

use crate::error::{Error, Result, ValidationError};
use crate::schema::{ConfigEntry, ConfigValue};

/// Coerces and validates a raw value against a schema entry.
///
/// Pure function of `(raw, entry)`. Built-in entries fail with
/// [`ValidationError`]; custom entries delegate entirely to their parser and
/// its error propagates unmodified as [`Error::Custom`].
pub fn parse(key: &str, raw: &Value, entry: &ConfigEntry) -> Result<ConfigValue> {
    match entry {
        ConfigEntry::String { .. } => parse_string(key, raw),
        ConfigEntry::StringEnum { members, .. } => parse_string_enum(key, raw, members),
        ConfigEntry::Number { min, max, .. } => parse_number(key, raw, *min, *max),
        ConfigEntry::Boolean { .. } => parse_boolean(key, raw),
        ConfigEntry::Custom { parser, .. } => parser.as_ref()(raw).map_err(Error::Custom),
    }
}

fn parse_string(key: &str, raw: &Value) -> Result<ConfigValue> {
    match raw {
        Value::String(value) => Ok(ConfigValue::String(value.clone())),
        // Numbers and booleans convert losslessly to their canonical text.
        Value::Number(value) => Ok(ConfigValue::String(value.to_string())),
        Value::Bool(value) => Ok(ConfigValue::String(value.to_string())),
        other => Err(type_mismatch(key, other, "string")),
    }
}

fn parse_string_enum(key: &str, raw: &Value, members: &[String]) -> Result<ConfigValue> {
    let candidate = raw.as_str().ok_or_else(|| ValidationError::EnumMismatch {
        key: key.to_owned(),
        value: raw.clone(),
        members: members.to_vec(),
    })?;

    if members.iter().any(|member| member == candidate) {
        Ok(ConfigValue::String(candidate.to_owned()))
    } else {
        Err(Error::Validation(ValidationError::EnumMismatch {
            key: key.to_owned(),
            value: raw.clone(),
            members: members.to_vec(),
        }))
    }
}

fn parse_number(key: &str, raw: &Value, min: Option<f64>, max: Option<f64>) -> Result<ConfigValue> {
    let value = match raw {
        Value::Number(value) => value.as_f64(),
        Value::String(value) => value.trim().parse::<f64>().ok(),
        _ => None,
    };

    let value = match value {
        Some(value) if value.is_finite() => value,
        _ => return Err(type_mismatch(key, raw, "number")),
    };

    if let Some(min) = min {
        if value < min {
            return Err(Error::Validation(ValidationError::BelowMinimum {
                key: key.to_owned(),
                value,
                min,
            }));
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(Error::Validation(ValidationError::AboveMaximum {
                key: key.to_owned(),
                value,
                max,
            }));
        }
    }

    Ok(ConfigValue::Number(value))
}

fn parse_boolean(key: &str, raw: &Value) -> Result<ConfigValue> {
    // Canonical encodings only: bool, "true"/"false", 0/1.
    let value = match raw {
        Value::Bool(value) => Some(*value),
        Value::String(value) => match value.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(value) => match value.as_f64() {
            Some(number) if number == 1.0 => Some(true),
            Some(number) if number == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    };

    value
        .map(ConfigValue::Bool)
        .ok_or_else(|| type_mismatch(key, raw, "boolean"))
}

fn type_mismatch(key: &str, value: &Value, expected: &'static str) -> Error {
    Error::Validation(ValidationError::TypeMismatch {
        key: key.to_owned(),
        value: value.clone(),
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::error::Error;
    use crate::schema::{ConfigEntry, ConfigValue};
    use serde_json::json;
    use std::sync::Arc;

    fn theme_entry() -> ConfigEntry {
        ConfigEntry::StringEnum {
            members: vec!["light".to_owned(), "dark".to_owned()],
            default: None,
        }
    }

    fn port_entry() -> ConfigEntry {
        ConfigEntry::Number {
            min: Some(1.0),
            max: Some(65535.0),
            default: None,
        }
    }

    #[test]
    fn string_accepts_lossless_coercions() {
        let entry = ConfigEntry::String { default: None };
        assert_eq!(
            parse("k", &json!("hello"), &entry).unwrap(),
            ConfigValue::String("hello".to_owned())
        );
        assert_eq!(
            parse("k", &json!(8080), &entry).unwrap(),
            ConfigValue::String("8080".to_owned())
        );
        assert_eq!(
            parse("k", &json!(true), &entry).unwrap(),
            ConfigValue::String("true".to_owned())
        );

        let error = parse("k", &json!({"nested": 1}), &entry).expect_err("objects are not strings");
        assert!(error.to_string().contains("to be a \"string\""));
    }

    #[test]
    fn string_enum_requires_exact_member() {
        assert_eq!(
            parse("theme", &json!("dark"), &theme_entry()).unwrap(),
            ConfigValue::String("dark".to_owned())
        );

        let error = parse("theme", &json!("solarized"), &theme_entry()).expect_err("not a member");
        let message = error.to_string();
        assert!(message.contains("to be one of: light, dark"));
    }

    #[test]
    fn number_accepts_numeric_strings() {
        assert_eq!(
            parse("port", &json!("8080"), &port_entry()).unwrap(),
            ConfigValue::Number(8080.0)
        );
    }

    #[test]
    fn number_names_the_violated_bound() {
        let below = parse("port", &json!(0), &port_entry()).expect_err("below minimum");
        assert!(below.to_string().contains("to be greater than 1"));

        let above = parse("port", &json!(70000), &port_entry()).expect_err("above maximum");
        assert!(above.to_string().contains("to be lower than 65535"));
    }

    #[test]
    fn number_rejects_non_finite_input() {
        let error = parse("port", &json!("inf"), &port_entry()).expect_err("not finite");
        assert!(error.to_string().contains("to be a \"number\""));
    }

    #[test]
    fn boolean_accepts_canonical_encodings() {
        let entry = ConfigEntry::Boolean { default: None };
        assert_eq!(parse("flag", &json!(true), &entry).unwrap(), ConfigValue::Bool(true));
        assert_eq!(parse("flag", &json!("false"), &entry).unwrap(), ConfigValue::Bool(false));
        assert_eq!(parse("flag", &json!(1), &entry).unwrap(), ConfigValue::Bool(true));
        assert_eq!(parse("flag", &json!(0), &entry).unwrap(), ConfigValue::Bool(false));

        let error = parse("flag", &json!("yes"), &entry).expect_err("not canonical");
        assert!(error.to_string().contains("to be a \"boolean\""));
    }

    #[test]
    fn custom_errors_propagate_verbatim() {
        let entry = ConfigEntry::Custom {
            parser: Arc::new(|_raw| anyhow::bail!("host unreachable on port 99")),
            default: None,
        };

        let error = parse("proxy", &json!("anything"), &entry).expect_err("parser failed");
        assert!(matches!(error, Error::Custom(_)));
        assert_eq!(error.to_string(), "host unreachable on port 99");
    }

    #[test]
    fn custom_parser_controls_the_result() {
        let entry = ConfigEntry::Custom {
            parser: Arc::new(|raw| {
                let port = raw
                    .get("port")
                    .and_then(serde_json::Value::as_u64)
                    .ok_or_else(|| anyhow::anyhow!("proxy needs a numeric port"))?;
                Ok(ConfigValue::Json(json!({ "port": port })))
            }),
            default: None,
        };

        assert_eq!(
            parse("proxy", &json!({"port": 3128, "extra": true}), &entry).unwrap(),
            ConfigValue::Json(json!({"port": 3128}))
        );
    }
}
