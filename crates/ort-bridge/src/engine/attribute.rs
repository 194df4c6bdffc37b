//! Named node attributes passed alongside operator invocations.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Int,
    Float,
    Ints,
    Floats,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Float(f32),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    String(String),
}

/// One named, typed attribute record.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeProto {
    name: String,
    value: AttributeValue,
}

impl AttributeProto {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        AttributeProto {
            name: name.into(),
            value,
        }
    }

    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, AttributeValue::Int(value))
    }

    pub fn float(name: impl Into<String>, value: f32) -> Self {
        Self::new(name, AttributeValue::Float(value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    pub fn attribute_type(&self) -> AttributeType {
        match self.value {
            AttributeValue::Int(_) => AttributeType::Int,
            AttributeValue::Float(_) => AttributeType::Float,
            AttributeValue::Ints(_) => AttributeType::Ints,
            AttributeValue::Floats(_) => AttributeType::Floats,
            AttributeValue::String(_) => AttributeType::String,
        }
    }
}

/// Attribute set of a single node, keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAttributes {
    entries: BTreeMap<String, AttributeProto>,
}

impl NodeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `attr` under its own name, replacing an earlier entry.
    pub fn insert(&mut self, attr: AttributeProto) {
        self.entries.insert(attr.name.clone(), attr);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeProto> {
        self.entries.get(name)
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.get(name)?.value {
            AttributeValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name)?.value {
            AttributeValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeProto> {
        self.entries.values()
    }
}

impl FromIterator<AttributeProto> for NodeAttributes {
    fn from_iter<I: IntoIterator<Item = AttributeProto>>(iter: I) -> Self {
        let mut attrs = NodeAttributes::new();
        for attr in iter {
            attrs.insert(attr);
        }
        attrs
    }
}
