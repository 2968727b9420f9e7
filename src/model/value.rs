//! Serialized values of model entities.

use super::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Reference(Option<EntityId>),
    /// Member values, named after the members of the owning type
    Composite(Vec<Field>),
    Collection(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

impl Field {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value }
    }
}

impl Value {
    pub fn reference(target: EntityId) -> Self {
        Value::Reference(Some(target))
    }

    pub fn composite<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Value::Composite(fields.into_iter().map(|(name, value)| Field::new(name, value)).collect())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Reference(_) => "reference",
            Value::Composite(_) => "composite",
            Value::Collection(_) => "collection",
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Composite(fields) => fields.iter().find(|f| f.name == name).map(|f| &f.value),
            _ => None,
        }
    }

    /// Resolve a member path such as `bounds.min[1]` against this value.
    pub fn lookup(&self, path: &str) -> Result<&Value, String> {
        let path = path.trim();
        if path.is_empty() {
            return Err("empty expression".to_string());
        }

        let mut current = self;
        for segment in path.split('.') {
            let (name, indices) = split_segment(segment)?;
            if !name.is_empty() {
                current = match current {
                    Value::Composite(_) => current
                        .field(name)
                        .ok_or_else(|| format!("unknown member '{}'", name))?,
                    other => {
                        return Err(format!("cannot select '{}' from a {} value", name, other.kind_name()))
                    }
                };
            }
            for index in indices {
                current = match current {
                    Value::Collection(items) => items
                        .get(index)
                        .ok_or_else(|| format!("index {} out of range ({} elements)", index, items.len()))?,
                    other => return Err(format!("cannot index a {} value", other.kind_name())),
                };
            }
        }

        Ok(current)
    }

    /// Cast to a boolean. Composite, collection and null values do not cast.
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Text(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Value::Reference(r) => Some(r.is_some()),
            Value::Null | Value::Composite(_) | Value::Collection(_) => None,
        }
    }
}

/// Split `name[1][2]` into `("name", [1, 2])`.
fn split_segment(segment: &str) -> Result<(&str, Vec<usize>), String> {
    let (name, mut rest) = match segment.find('[') {
        Some(pos) => (&segment[..pos], &segment[pos..]),
        None => (segment, ""),
    };

    if name.is_empty() && rest.is_empty() {
        return Err("empty path segment".to_string());
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(format!("invalid member name '{}'", name));
    }

    let mut indices = Vec::new();
    while !rest.is_empty() {
        let close = rest
            .find(']')
            .ok_or_else(|| format!("unterminated index in '{}'", segment))?;
        let index = rest[1..close]
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid index '{}' in '{}'", &rest[1..close], segment))?;
        indices.push(index);
        rest = &rest[close + 1..];
        if !rest.is_empty() && !rest.starts_with('[') {
            return Err(format!("unexpected '{}' in '{}'", rest, segment));
        }
    }

    Ok((name, indices))
}
