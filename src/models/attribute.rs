use std::collections::HashMap;

/// A single session attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// A string value.
    Text(String),
    /// A boolean value.
    Boolean(bool),
    /// A numeric value.
    Number(f64),
}

/// The attribute mapping of a session.
pub type Attributes = HashMap<String, AttributeValue>;

/// Typed extraction out of an `AttributeValue`.
///
/// Returns `None` when the value holds a different variant.
pub trait FromAttribute: Sized {
    fn from_attribute(value: &AttributeValue) -> Option<Self>;
}

impl FromAttribute for String {
    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromAttribute for bool {
    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromAttribute for f64 {
    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

/// Builds an `Attributes` mapping from `(key, value)` pairs.
pub fn attributes<K, V, I>(pairs: I) -> Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_extraction_checks_the_variant() {
        let text = AttributeValue::from("12345678");
        assert_eq!(String::from_attribute(&text), Some("12345678".to_string()));
        assert_eq!(bool::from_attribute(&text), None);

        let flag = AttributeValue::from(true);
        assert_eq!(bool::from_attribute(&flag), Some(true));
        assert_eq!(String::from_attribute(&flag), None);

        let number = AttributeValue::from(42i64);
        assert_eq!(f64::from_attribute(&number), Some(42.0));
    }

    #[test]
    fn builds_mapping_from_pairs() {
        let attrs = attributes([("test", "ok")]);
        assert_eq!(attrs.get("test"), Some(&AttributeValue::Text("ok".to_string())));
    }
}
