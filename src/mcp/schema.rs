//! Tool input schemas: declaration, validation and JSON-Schema rendering.
//!
//! A [`ToolSchema`] is an ordered list of [`FieldSpec`]s. Validation walks the
//! fields in declaration order and stops at the first field that fails, so the
//! caller always gets exactly one, specific reason. Unknown argument keys are
//! ignored.

use serde_json::{json, Map, Value};

/// JSON type of a tool argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// JSON-Schema type name
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single argument failed its declared constraints
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Offending field (or `arguments` when the payload itself is malformed)
    pub field: String,

    /// What was wrong with it
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for a field
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Declaration of one named argument
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub allowed: Option<Vec<String>>,
}

impl FieldSpec {
    fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            description: None,
            default: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            min_items: None,
            max_items: None,
            allowed: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Array)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Object)
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Value used when the caller omits an optional field
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Inclusive lower bound for numeric fields
    pub fn ge(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    /// Inclusive upper bound for numeric fields
    pub fn le(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    /// Length bounds (in characters) for string fields
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    /// Item-count bounds for array fields
    pub fn items(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_items = min;
        self.max_items = max;
        self
    }

    /// Restrict a string field to a fixed set of values
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    fn check(&self, value: &Value) -> Result<Value, ValidationError> {
        let fail = |message: String| ValidationError::new(&self.name, message);

        match self.field_type {
            FieldType::String => {
                let s = value
                    .as_str()
                    .ok_or_else(|| fail(format!("expected string, got {}", json_type(value))))?;
                let len = s.chars().count();
                if let Some(min) = self.min_length {
                    if len < min {
                        return Err(fail(format!(
                            "must be at least {} characters (got {})",
                            min, len
                        )));
                    }
                }
                if let Some(max) = self.max_length {
                    if len > max {
                        return Err(fail(format!(
                            "must be at most {} characters (got {})",
                            max, len
                        )));
                    }
                }
                if let Some(allowed) = &self.allowed {
                    if !allowed.iter().any(|a| a == s) {
                        return Err(fail(format!(
                            "must be one of [{}] (got '{}')",
                            allowed.join(", "),
                            s
                        )));
                    }
                }
                Ok(value.clone())
            }
            FieldType::Integer => {
                let n = match as_integer(value) {
                    Some(n) => n,
                    None if is_whole(value) => {
                        return Err(fail(format!("{} is out of range for an integer", value)));
                    }
                    None => {
                        return Err(fail(format!("expected integer, got {}", json_type(value))));
                    }
                };
                self.check_bounds(n as f64)?;
                Ok(Value::from(n))
            }
            FieldType::Number => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| fail(format!("expected number, got {}", json_type(value))))?;
                self.check_bounds(n)?;
                Ok(value.clone())
            }
            FieldType::Boolean => {
                if value.is_boolean() {
                    Ok(value.clone())
                } else {
                    Err(fail(format!("expected boolean, got {}", json_type(value))))
                }
            }
            FieldType::Array => {
                let items = value
                    .as_array()
                    .ok_or_else(|| fail(format!("expected array, got {}", json_type(value))))?;
                if let Some(min) = self.min_items {
                    if items.len() < min {
                        return Err(fail(format!(
                            "must contain at least {} items (got {})",
                            min,
                            items.len()
                        )));
                    }
                }
                if let Some(max) = self.max_items {
                    if items.len() > max {
                        return Err(fail(format!(
                            "must contain at most {} items (got {})",
                            max,
                            items.len()
                        )));
                    }
                }
                Ok(value.clone())
            }
            FieldType::Object => {
                if value.is_object() {
                    Ok(value.clone())
                } else {
                    Err(fail(format!("expected object, got {}", json_type(value))))
                }
            }
        }
    }

    fn check_bounds(&self, n: f64) -> Result<(), ValidationError> {
        if let Some(min) = self.minimum {
            if n < min {
                return Err(ValidationError::new(
                    &self.name,
                    format!("must be greater than or equal to {}", min),
                ));
            }
        }
        if let Some(max) = self.maximum {
            if n > max {
                return Err(ValidationError::new(
                    &self.name,
                    format!("must be less than or equal to {}", max),
                ));
            }
        }
        Ok(())
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.field_type.as_str()));
        if let Some(description) = &self.description {
            prop.insert("description".into(), json!(description));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        let bound = |n: f64| match self.field_type {
            FieldType::Integer => json!(n as i64),
            _ => json!(n),
        };
        if let Some(min) = self.minimum {
            prop.insert("minimum".into(), bound(min));
        }
        if let Some(max) = self.maximum {
            prop.insert("maximum".into(), bound(max));
        }
        if let Some(min) = self.min_length {
            prop.insert("minLength".into(), json!(min));
        }
        if let Some(max) = self.max_length {
            prop.insert("maxLength".into(), json!(max));
        }
        if let Some(min) = self.min_items {
            prop.insert("minItems".into(), json!(min));
        }
        if let Some(max) = self.max_items {
            prop.insert("maxItems".into(), json!(max));
        }
        if let Some(allowed) = &self.allowed {
            prop.insert("enum".into(), json!(allowed));
        }
        Value::Object(prop)
    }
}

/// Accepts JSON integers and whole-valued floats (e.g. `5.0`)
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(f as i64),
        _ => None,
    }
}

/// Integral JSON numbers, including ones too large for `i64`
fn is_whole(value: &Value) -> bool {
    value.is_u64() || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The declared input of a tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSchema {
    fields: Vec<FieldSpec>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field; validation follows declaration order
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate raw arguments against the declared fields.
    ///
    /// `null` is treated as an empty argument object. The first failing field
    /// (in declaration order) is reported.
    pub fn validate(&self, raw: &Value) -> Result<ValidatedArgs, ValidationError> {
        let empty = Map::new();
        let args = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ValidationError::new(
                    "arguments",
                    format!("expected object, got {}", json_type(other)),
                ))
            }
        };

        let mut values = Map::new();
        for spec in &self.fields {
            match args.get(&spec.name) {
                // An explicit null counts as absent.
                None | Some(Value::Null) => {
                    if spec.required {
                        return Err(ValidationError::new(&spec.name, "field required"));
                    }
                    if let Some(default) = &spec.default {
                        values.insert(spec.name.clone(), default.clone());
                    }
                }
                Some(value) => {
                    values.insert(spec.name.clone(), spec.check(value)?);
                }
            }
        }

        Ok(ValidatedArgs { values })
    }

    /// Render as a JSON-Schema object for `list_tools`
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Arguments that passed validation, with typed accessors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs {
    values: Map<String, Value>,
}

impl ValidatedArgs {
    /// Raw access to a validated value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Required string field
    pub fn str(&self, name: &str) -> Result<&str, ValidationError> {
        self.opt_str(name)
            .ok_or_else(|| ValidationError::new(name, "field required"))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Required integer field
    pub fn i64(&self, name: &str) -> Result<i64, ValidationError> {
        self.opt_i64(name)
            .ok_or_else(|| ValidationError::new(name, "field required"))
    }

    pub fn opt_i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(as_integer)
    }

    /// Required number field
    pub fn f64(&self, name: &str) -> Result<f64, ValidationError> {
        self.opt_f64(name)
            .ok_or_else(|| ValidationError::new(name, "field required"))
    }

    pub fn opt_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    pub fn opt_bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }
}
