//! Value conversion between remote records and address-space variants.
//!
//! A [`RemoteValue`] is first classified into a [`RemoteKind`] by looking at
//! its type identity and, failing that, at the shape of its `value` field.
//! The kind is then matched exhaustively:
//!
//! | Remote | Local |
//! |---|---|
//! | scalar `bool` / `float64` / `int32` / `int64` | `Boolean` / `Double` / `Int32` / `Int64` |
//! | enumerated, two choices, index 0 or 1 | `Boolean` |
//! | enumerated, any other width | `Int16` (or `Int32` when the index overflows i16) |
//!
//! The reverse direction ([`local_to_remote`]) maps `Boolean` to a
//! two-choice enumeration and `Int16` to an enumeration with no labels; the
//! converter never invents choice labels for wide enumerations.

use pvgate_types::{Field, GatewayError, RemoteValue, Variant, NT_ENUM_ID, NT_SCALAR_ID};

/// Choice labels attached to booleans sent to the remote side.
pub const BOOLEAN_CHOICES: [&str; 2] = ["false", "true"];

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Structural kind of a remote record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteKind<'a> {
    /// A single primitive `value` field.
    Scalar(&'a Field),
    /// An index plus its choice labels.
    Enumerated { index: i32, choices: &'a [String] },
}

impl<'a> RemoteKind<'a> {
    /// Classify `value`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::UnsupportedType`] when the record is neither shape.
    pub fn inspect(value: &'a RemoteValue) -> Result<Self, GatewayError> {
        let field = value
            .lookup("value")
            .ok_or_else(|| unsupported(format!("record '{}' has no value field", value.type_id())))?;

        let is_enum_id = value.type_id().starts_with(type_prefix(NT_ENUM_ID));
        let is_scalar_id = value.type_id().starts_with(type_prefix(NT_SCALAR_ID));

        match (enum_shape(field), field) {
            (Some(kind), _) if !is_scalar_id => Ok(kind),
            (None, Field::Struct(_) | Field::StringArray(_)) => Err(unsupported(format!(
                "record '{}' has a {} value field",
                value.type_id(),
                field.type_name()
            ))),
            (None, _) if is_enum_id => Err(unsupported(format!(
                "enumerated record has a {} value field",
                field.type_name()
            ))),
            (_, Field::Struct(_)) => Err(unsupported("scalar record with a struct value field".into())),
            _ => Ok(RemoteKind::Scalar(field)),
        }
    }

    /// Field path a put must target for a record of this kind.
    pub fn put_path(&self) -> &'static str {
        match self {
            RemoteKind::Scalar(_) => "value",
            RemoteKind::Enumerated { .. } => "value.index",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Translate a remote record into an address-space value.
///
/// # Errors
///
/// [`GatewayError::UnsupportedType`] for primitive types without a local
/// counterpart and for two-choice enumerations whose index is not 0 or 1.
pub fn remote_to_local(value: &RemoteValue) -> Result<Variant, GatewayError> {
    match RemoteKind::inspect(value)? {
        RemoteKind::Scalar(field) => match field {
            Field::Bool(b) => Ok(Variant::Boolean(*b)),
            Field::Float64(f) => Ok(Variant::Double(*f)),
            Field::Int32(i) => Ok(Variant::Int32(*i)),
            Field::Int64(i) => Ok(Variant::Int64(*i)),
            other => Err(unsupported(format!("scalar of type {}", other.type_name()))),
        },
        RemoteKind::Enumerated { index, choices } if choices.len() == 2 => match index {
            0 => Ok(Variant::Boolean(false)),
            1 => Ok(Variant::Boolean(true)),
            other => Err(unsupported(format!("two-state index {other} is out of range"))),
        },
        RemoteKind::Enumerated { index, .. } => Ok(match i16::try_from(index) {
            Ok(narrow) => Variant::Int16(narrow),
            Err(_) => Variant::Int32(index),
        }),
    }
}

/// Translate an address-space value into a remote record.
///
/// # Errors
///
/// [`GatewayError::UnsupportedType`] for `Float`, `UInt32` and `String`.
pub fn local_to_remote(value: &Variant) -> Result<RemoteValue, GatewayError> {
    match value {
        Variant::Boolean(b) => Ok(RemoteValue::enumerated(
            i32::from(*b),
            BOOLEAN_CHOICES.iter().map(|s| s.to_string()).collect(),
        )),
        Variant::Double(f) => Ok(RemoteValue::scalar(Field::Float64(*f))),
        Variant::Int32(i) => Ok(RemoteValue::scalar(Field::Int32(*i))),
        Variant::Int64(i) => Ok(RemoteValue::scalar(Field::Int64(*i))),
        Variant::Int16(i) => Ok(RemoteValue::enumerated(i32::from(*i), Vec::new())),
        other => Err(unsupported(format!("local type {}", other.type_name()))),
    }
}

fn enum_shape(field: &Field) -> Option<RemoteKind<'_>> {
    let index = match field.member("index")? {
        Field::Int32(i) => *i,
        Field::Int16(i) => i32::from(*i),
        _ => return None,
    };
    match field.member("choices")? {
        Field::StringArray(choices) => Some(RemoteKind::Enumerated { index, choices }),
        _ => None,
    }
}

// "epics:nt/NTEnum:1.0" -> "epics:nt/NTEnum:" so any minor version matches.
fn type_prefix(id: &str) -> &str {
    id.rfind(':').map(|pos| &id[..=pos]).unwrap_or(id)
}

fn unsupported(detail: String) -> GatewayError {
    GatewayError::UnsupportedType(detail)
}
