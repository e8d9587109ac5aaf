//! Raw request records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ValidationError;

/// A single scalar input value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
    /// Array or object. Kept as-is so extra fields never fail a request;
    /// rejected only when a feature reads it.
    Nested(Value),
    Missing,
}

impl RawValue {
    /// Coerce to a number. Numeric strings are accepted, blank strings count as
    /// missing.
    pub fn as_number(&self) -> Option<Result<f64, String>> {
        match self {
            RawValue::Number(n) => Some(Ok(*n)),
            RawValue::Text(s) if s.trim().is_empty() => None,
            RawValue::Text(s) => Some(s.trim().parse::<f64>().map_err(|_| s.clone())),
            RawValue::Nested(v) => Some(Err(v.to_string())),
            RawValue::Missing => None,
        }
    }

    /// Canonical text form used for category lookup. Integral numbers drop
    /// their fractional part so `1.0` matches the category `"1"`.
    pub fn as_category(&self) -> Option<String> {
        match self {
            RawValue::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                Some(format!("{}", *n as i64))
            }
            RawValue::Number(n) => Some(n.to_string()),
            RawValue::Text(s) if s.is_empty() => None,
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Nested(_) | RawValue::Missing => None,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, RawValue::Nested(_))
    }

    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Text(s) => s.is_empty(),
            RawValue::Number(n) => n.is_nan(),
            RawValue::Nested(_) => false,
        }
    }

    fn from_json(field: &str, value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Null => Ok(RawValue::Missing),
            Value::Bool(b) => Ok(RawValue::Number(if b { 1.0 } else { 0.0 })),
            Value::Number(n) => {
                n.as_f64().map(RawValue::Number).ok_or_else(|| ValidationError::NotNumeric {
                    field: field.to_string(),
                    value: n.to_string(),
                })
            }
            Value::String(s) => Ok(RawValue::Text(s)),
            nested @ (Value::Array(_) | Value::Object(_)) => Ok(RawValue::Nested(nested)),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(n) => write!(f, "{n}"),
            RawValue::Text(s) => write!(f, "{s}"),
            RawValue::Nested(v) => write!(f, "{v}"),
            RawValue::Missing => write!(f, "<missing>"),
        }
    }
}

impl From<&RawValue> for Value {
    fn from(value: &RawValue) -> Self {
        match value {
            RawValue::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            RawValue::Text(s) => Value::String(s.clone()),
            RawValue::Nested(v) => v.clone(),
            RawValue::Missing => Value::Null,
        }
    }
}

/// Ordered mapping from raw input field names to scalar values. One per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct FeatureRecord {
    fields: BTreeMap<String, RawValue>,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, used by tests and fixtures.
    pub fn with(mut self, field: impl Into<String>, value: RawValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    /// Look up a field. Absent fields read as [`RawValue::Missing`].
    pub fn get(&self, field: &str) -> &RawValue {
        self.fields.get(field).unwrap_or(&RawValue::Missing)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a JSON value; anything other than an object is rejected.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(map) => Self::try_from(map),
            _ => Err(ValidationError::NotAnObject),
        }
    }
}

impl TryFrom<Map<String, Value>> for FeatureRecord {
    type Error = ValidationError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut fields = BTreeMap::new();
        for (field, value) in map {
            let raw = RawValue::from_json(&field, value)?;
            fields.insert(field, raw);
        }
        Ok(Self { fields })
    }
}

impl From<FeatureRecord> for Map<String, Value> {
    fn from(record: FeatureRecord) -> Self {
        record.fields.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_scalars_and_nulls() {
        let record = FeatureRecord::from_value(json!({
            "age": 15.0,
            "sex": "female",
            "cabin": null,
            "alone": true,
        }))
        .unwrap();

        assert_eq!(record.get("age"), &RawValue::Number(15.0));
        assert_eq!(record.get("sex"), &RawValue::Text("female".into()));
        assert_eq!(record.get("cabin"), &RawValue::Missing);
        assert_eq!(record.get("alone"), &RawValue::Number(1.0));
        assert_eq!(record.get("not_sent"), &RawValue::Missing);
        assert!(!record.contains("not_sent"));
    }

    #[test]
    fn keeps_nested_values_opaque() {
        let record =
            FeatureRecord::from_value(json!({"age": 3, "client_meta": {"source": "web"}})).unwrap();
        assert!(record.get("client_meta").is_nested());
        assert!(!record.get("client_meta").is_missing());
        assert_eq!(record.get("client_meta").as_category(), None);
        assert_eq!(Value::from(record.get("client_meta")), json!({"source": "web"}));

        let err = FeatureRecord::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject);
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(RawValue::Text(" 3.5 ".into()).as_number(), Some(Ok(3.5)));
        assert_eq!(RawValue::Text("".into()).as_number(), None);
        assert_eq!(RawValue::Text("abc".into()).as_number(), Some(Err("abc".into())));
        assert_eq!(RawValue::Missing.as_number(), None);
    }

    #[test]
    fn category_text_of_integral_numbers() {
        assert_eq!(RawValue::Number(1.0).as_category().as_deref(), Some("1"));
        assert_eq!(RawValue::Number(2.5).as_category().as_deref(), Some("2.5"));
        assert_eq!(RawValue::Text("".into()).as_category(), None);
    }

    #[test]
    fn serde_roundtrip_through_json_object() {
        let record = FeatureRecord::new()
            .with("pclass", RawValue::Number(3.0))
            .with("embarked", RawValue::Text("S".into()))
            .with("age", RawValue::Missing);
        let text = serde_json::to_string(&record).unwrap();
        let back: FeatureRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }
}
