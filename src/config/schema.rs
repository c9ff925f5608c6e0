//! Payload Schema
//!
//! Defines the rules a configuration payload must satisfy before the
//! provider will publish it.

use crate::config::model::Payload;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Root schema structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Accept keys that have no rule
    #[serde(default = "default_allow_unknown")]
    pub allow_unknown_keys: bool,

    /// Keys that must be present in every payload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Per-key value rules
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keys: BTreeMap<String, KeyRule>,
}

fn default_allow_unknown() -> bool {
    true
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            allow_unknown_keys: true,
            required: Vec::new(),
            keys: BTreeMap::new(),
        }
    }
}

/// Rule for the value of a single key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyRule {
    /// Whole number within optional bounds
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },

    /// Any number within optional bounds
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },

    /// String, optionally non-empty or restricted to a set of values
    String {
        #[serde(default)]
        non_empty: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        one_of: Vec<String>,
    },

    Boolean,

    /// Absolute http(s) URL
    Url,

    Array,

    Object,

    /// Anything but null
    Any,
}

impl KeyRule {
    /// Check a value against this rule, returning the reason on failure
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        match self {
            KeyRule::Integer { min, max } => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| format!("expected an integer, got {}", type_name(value)))?;
                check_bounds(n, *min, *max)
            }
            KeyRule::Number { min, max } => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| format!("expected a number, got {}", type_name(value)))?;
                check_bounds(n, *min, *max)
            }
            KeyRule::String { non_empty, one_of } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("expected a string, got {}", type_name(value)))?;
                if *non_empty && s.trim().is_empty() {
                    return Err("must not be empty".to_string());
                }
                if !one_of.is_empty() && !one_of.iter().any(|allowed| allowed == s) {
                    return Err(format!("must be one of: {}", one_of.join(", ")));
                }
                Ok(())
            }
            KeyRule::Boolean => value
                .is_boolean()
                .then_some(())
                .ok_or_else(|| format!("expected a boolean, got {}", type_name(value))),
            KeyRule::Url => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("expected a URL string, got {}", type_name(value)))?;
                let url = reqwest::Url::parse(s).map_err(|e| format!("invalid URL: {}", e))?;
                match url.scheme() {
                    "http" | "https" => Ok(()),
                    other => Err(format!("unsupported URL scheme '{}'", other)),
                }
            }
            KeyRule::Array => value
                .is_array()
                .then_some(())
                .ok_or_else(|| format!("expected an array, got {}", type_name(value))),
            KeyRule::Object => value
                .is_object()
                .then_some(())
                .ok_or_else(|| format!("expected an object, got {}", type_name(value))),
            KeyRule::Any => (!value.is_null())
                .then_some(())
                .ok_or_else(|| "must not be null".to_string()),
        }
    }
}

fn check_bounds<T>(n: T, min: Option<T>, max: Option<T>) -> std::result::Result<(), String>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if let Some(min) = min {
        if n < min {
            return Err(format!("{} is below the minimum of {}", n, min));
        }
    }
    if let Some(max) = max {
        if n > max {
            return Err(format!("{} is above the maximum of {}", n, max));
        }
    }
    Ok(())
}

/// JSON type name used in error messages
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Schema {
    /// Validate a raw JSON value and hand back the payload it holds.
    ///
    /// The first violation found is reported; keys are checked in sorted
    /// order so the report is stable.
    pub fn validate(&self, value: Value) -> std::result::Result<Payload, ValidationError> {
        let payload = match value {
            Value::Object(map) => map,
            other => return Err(ValidationError::NotAnObject(type_name(&other))),
        };

        if payload.is_empty() {
            return Err(ValidationError::Empty);
        }

        for key in &self.required {
            if !payload.contains_key(key) {
                return Err(ValidationError::MissingKey(key.clone()));
            }
        }

        let mut keys: Vec<&String> = payload.keys().collect();
        keys.sort();

        for key in keys {
            match self.keys.get(key) {
                Some(rule) => {
                    rule.check(&payload[key.as_str()])
                        .map_err(|reason| ValidationError::InvalidValue {
                            key: key.clone(),
                            reason,
                        })?
                }
                None if !self.allow_unknown_keys => {
                    return Err(ValidationError::UnknownKey(key.clone()));
                }
                None => {}
            }
        }

        Ok(payload)
    }

    /// Merge another schema into this one (later rules override earlier)
    pub fn merge(&mut self, other: Schema) {
        self.allow_unknown_keys = other.allow_unknown_keys;

        for key in other.required {
            if !self.required.contains(&key) {
                self.required.push(key);
            }
        }

        for (key, rule) in other.keys {
            self.keys.insert(key, rule);
        }
    }
}
