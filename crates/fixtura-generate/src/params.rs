use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value;

use crate::errors::GenerationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    String,
    Date,
    List,
}

#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn new(key: &'static str, kind: ParamKind, required: bool) -> Self {
        Self {
            key,
            kind,
            required,
        }
    }
}

/// Provider keyword arguments that passed validation.
pub struct ParamMap<'a> {
    map: &'a BTreeMap<String, Value>,
}

/// Check `params` against the accepted `specs` of generator `ctx`.
pub fn validate_params<'a>(
    params: &'a BTreeMap<String, Value>,
    specs: &[ParamSpec],
    ctx: &str,
) -> Result<ParamMap<'a>, GenerationError> {
    for (key, value) in params {
        let Some(spec) = specs.iter().find(|spec| spec.key == key.as_str()) else {
            return Err(GenerationError::Provider(format!(
                "{ctx}: unknown param '{key}'"
            )));
        };
        validate_kind(ctx, key, spec.kind, value)?;
    }

    for spec in specs {
        if spec.required && !params.contains_key(spec.key) {
            return Err(GenerationError::Provider(format!(
                "{ctx}: missing required param '{}'",
                spec.key
            )));
        }
    }

    Ok(ParamMap { map: params })
}

impl<'a> ParamMap<'a> {
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.map.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.map.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.map.get(key).and_then(Value::as_str)
    }

    pub fn get_date(&self, key: &str) -> Option<NaiveDate> {
        self.get_str(key).and_then(parse_date_value)
    }

    pub fn get_list(&self, key: &str) -> Option<&'a [Value]> {
        self.map.get(key).and_then(Value::as_array).map(Vec::as_slice)
    }

    /// Non-negative integer param, or `default` when absent.
    pub fn get_count(&self, ctx: &str, key: &str, default: usize) -> Result<usize, GenerationError> {
        match self.get_i64(key) {
            None => Ok(default),
            Some(value) => usize::try_from(value).map_err(|_| {
                GenerationError::Provider(format!("{ctx}: {key} must be >= 0"))
            }),
        }
    }
}

fn validate_kind(
    ctx: &str,
    key: &str,
    kind: ParamKind,
    value: &Value,
) -> Result<(), GenerationError> {
    let valid = match kind {
        ParamKind::Bool => value.is_boolean(),
        ParamKind::Int => value.as_i64().is_some(),
        ParamKind::Float => value.as_f64().is_some(),
        ParamKind::String => value.is_string(),
        ParamKind::Date => value.as_str().and_then(parse_date_value).is_some(),
        ParamKind::List => value.is_array(),
    };

    if valid {
        Ok(())
    } else {
        Err(GenerationError::Provider(format!(
            "{ctx}: invalid value for param '{key}'"
        )))
    }
}

pub fn parse_date_value(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::new("min_value", ParamKind::Int, false),
        ParamSpec::new("elements", ParamKind::List, true),
        ParamSpec::new("label", ParamKind::String, false),
        ParamSpec::new("strict", ParamKind::Bool, false),
    ];

    fn params(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_known_params() {
        let given = params(json!({"min_value": 3, "elements": [1, 2]}));
        let map = validate_params(&given, SPECS, "test").unwrap();
        assert_eq!(map.get_i64("min_value"), Some(3));
        assert_eq!(map.get_list("elements").unwrap().len(), 2);

        let labelled = params(json!({"elements": [], "label": "x", "strict": true}));
        let map = validate_params(&labelled, SPECS, "test").unwrap();
        assert_eq!(map.get_str("label"), Some("x"));
        assert_eq!(map.get_bool("strict"), Some(true));
    }

    #[test]
    fn rejects_unknown_missing_and_mistyped_params() {
        let unknown = params(json!({"elements": [], "max": 1}));
        assert!(validate_params(&unknown, SPECS, "test").is_err());

        let missing = params(json!({"min_value": 1}));
        assert!(validate_params(&missing, SPECS, "test").is_err());

        let mistyped = params(json!({"elements": "a,b"}));
        assert!(validate_params(&mistyped, SPECS, "test").is_err());

        let mistyped = params(json!({"elements": [], "strict": "yes"}));
        assert!(validate_params(&mistyped, SPECS, "test").is_err());

        let mistyped = params(json!({"elements": [], "label": 3}));
        assert!(validate_params(&mistyped, SPECS, "test").is_err());
    }
}
