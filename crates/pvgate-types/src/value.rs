//! Typed values on both sides of the bridge.
//!
//! [`Variant`] is the flat value stored by an address-space variable.
//! [`RemoteValue`] is a structured record as delivered by the remote
//! process-variable protocol: a normative type identity plus a tree of
//! named [`Field`]s.  Two record shapes matter to the gateway:
//!
//! | Shape | Type id | Fields |
//! |---|---|---|
//! | scalar | [`NT_SCALAR_ID`] | `value: <primitive>` |
//! | enumerated | [`NT_ENUM_ID`] | `value: { index: Int32, choices: StringArray }` |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type identity of scalar-shaped records.
pub const NT_SCALAR_ID: &str = "epics:nt/NTScalar:1.0";

/// Type identity of enumerated-index-shaped records.
pub const NT_ENUM_ID: &str = "epics:nt/NTEnum:1.0";

/// A value held by an address-space variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    Boolean(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Float(f32),
    UInt32(u32),
    String(String),
}

impl Variant {
    /// Short type name used in log lines and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Boolean(_) => "Boolean",
            Variant::Int16(_) => "Int16",
            Variant::Int32(_) => "Int32",
            Variant::Int64(_) => "Int64",
            Variant::Double(_) => "Double",
            Variant::Float(_) => "Float",
            Variant::UInt32(_) => "UInt32",
            Variant::String(_) => "String",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Boolean(v) => write!(f, "{v}"),
            Variant::Int16(v) => write!(f, "{v}"),
            Variant::Int32(v) => write!(f, "{v}"),
            Variant::Int64(v) => write!(f, "{v}"),
            Variant::Double(v) => write!(f, "{v}"),
            Variant::Float(v) => write!(f, "{v}"),
            Variant::UInt32(v) => write!(f, "{v}"),
            Variant::String(v) => write!(f, "\"{v}\""),
        }
    }
}

/// One node of a remote record's field tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Field {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
    String(String),
    StringArray(Vec<String>),
    Struct(Vec<(String, Field)>),
}

impl Field {
    /// Primitive type name, as the remote protocol spells it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Field::Bool(_) => "bool",
            Field::Int16(_) => "int16",
            Field::Int32(_) => "int32",
            Field::Int64(_) => "int64",
            Field::UInt32(_) => "uint32",
            Field::Float32(_) => "float32",
            Field::Float64(_) => "float64",
            Field::String(_) => "string",
            Field::StringArray(_) => "string[]",
            Field::Struct(_) => "struct",
        }
    }

    /// Direct child named `name` of a `Struct` field.
    pub fn member(&self, name: &str) -> Option<&Field> {
        match self {
            Field::Struct(members) => members.iter().find(|(n, _)| n == name).map(|(_, f)| f),
            _ => None,
        }
    }

    fn member_mut(&mut self, name: &str) -> Option<&mut Field> {
        match self {
            Field::Struct(members) => members
                .iter_mut()
                .find(|(n, _)| n == name)
                .map(|(_, f)| f),
            _ => None,
        }
    }

    /// `true` when both fields hold the same primitive kind.
    pub fn same_kind(&self, other: &Field) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// A structured record delivered by, or sent to, the remote protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteValue {
    type_id: String,
    fields: Vec<(String, Field)>,
}

impl RemoteValue {
    /// Build a record from an explicit type identity and top-level fields.
    pub fn new(type_id: impl Into<String>, fields: Vec<(String, Field)>) -> Self {
        Self {
            type_id: type_id.into(),
            fields,
        }
    }

    /// Scalar-shaped record whose `value` field is `value`.
    pub fn scalar(value: Field) -> Self {
        Self::new(NT_SCALAR_ID, vec![("value".to_string(), value)])
    }

    /// Enumerated-index-shaped record.
    pub fn enumerated(index: i32, choices: Vec<String>) -> Self {
        Self::new(
            NT_ENUM_ID,
            vec![(
                "value".to_string(),
                Field::Struct(vec![
                    ("index".to_string(), Field::Int32(index)),
                    ("choices".to_string(), Field::StringArray(choices)),
                ]),
            )],
        )
    }

    /// Type identity string of the record.
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Top-level fields in declaration order.
    pub fn fields(&self) -> &[(String, Field)] {
        &self.fields
    }

    /// Resolve a dotted field path such as `value.index`.
    pub fn lookup(&self, path: &str) -> Option<&Field> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self
            .fields
            .iter()
            .find(|(name, _)| name == first)
            .map(|(_, f)| f)?;
        for part in parts {
            current = current.member(part)?;
        }
        Some(current)
    }

    /// Mutable counterpart of [`RemoteValue::lookup`].
    pub fn lookup_mut(&mut self, path: &str) -> Option<&mut Field> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self
            .fields
            .iter_mut()
            .find(|(name, _)| name == first)
            .map(|(_, f)| f)?;
        for part in parts {
            current = current.member_mut(part)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_record_exposes_value_field() {
        let v = RemoteValue::scalar(Field::Float64(42.5));
        assert_eq!(v.type_id(), NT_SCALAR_ID);
        assert_eq!(v.lookup("value"), Some(&Field::Float64(42.5)));
        assert_eq!(v.lookup("value.index"), None);
    }

    #[test]
    fn enumerated_record_nested_lookup() {
        let v = RemoteValue::enumerated(1, vec!["Closed".into(), "Open".into()]);
        assert_eq!(v.lookup("value.index"), Some(&Field::Int32(1)));
        assert!(matches!(
            v.lookup("value.choices"),
            Some(Field::StringArray(c)) if c.len() == 2
        ));
        assert_eq!(v.lookup("alarm"), None);
    }

    #[test]
    fn lookup_mut_updates_nested_field() {
        let mut v = RemoteValue::enumerated(0, vec!["A".into(), "B".into(), "C".into()]);
        *v.lookup_mut("value.index").unwrap() = Field::Int32(2);
        assert_eq!(v.lookup("value.index"), Some(&Field::Int32(2)));
    }

    #[test]
    fn same_kind_ignores_payload() {
        assert!(Field::Int32(1).same_kind(&Field::Int32(7)));
        assert!(!Field::Int32(1).same_kind(&Field::Int64(1)));
    }

    #[test]
    fn variant_serialization_is_tagged() {
        let json = serde_json::to_string(&Variant::Double(20.5)).unwrap();
        assert_eq!(json, r#"{"type":"Double","value":20.5}"#);
        let back: Variant = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Variant::Double(20.5));
    }
}
