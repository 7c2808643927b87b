//! Core data types for the bridge
//!
//! This module contains the value model shared by the transport side and the
//! data element tree.
//!
//! # Main Types
//!
//! - [`BuiltinType`] - Native type tag of a remote value (Int32, Double, String, ...)
//! - [`Variant`] - A tagged remote value: scalar, array, or structure
//! - [`Structure`] - Ordered list of named fields
//! - [`DataValue`] - A variant together with its source/server timestamps
//! - [`ProcessReason`] - Why a consumer is asked to process
//! - [`DataStatus`] - Outcome of the last read or write on a leaf
//! - [`Delivery`] - A recorded delivery, as read from replay files
//!
//! # Arrays
//!
//! Arrays are homogeneous. The native type of an array is the type of its
//! elements; an empty array reports [`BuiltinType::Null`] because the wire
//! does not tell us more.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Native type tag of a remote scalar value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BuiltinType {
    /// No value
    #[default]
    Null,
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    /// Structured value (record of fields)
    Structure,
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuiltinType::Null => "Null",
            BuiltinType::Boolean => "Boolean",
            BuiltinType::SByte => "SByte",
            BuiltinType::Byte => "Byte",
            BuiltinType::Int16 => "Int16",
            BuiltinType::UInt16 => "UInt16",
            BuiltinType::Int32 => "Int32",
            BuiltinType::UInt32 => "UInt32",
            BuiltinType::Int64 => "Int64",
            BuiltinType::UInt64 => "UInt64",
            BuiltinType::Float => "Float",
            BuiltinType::Double => "Double",
            BuiltinType::String => "String",
            BuiltinType::Structure => "Structure",
        };
        f.write_str(name)
    }
}

/// A tagged remote value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    Array(Vec<Variant>),
    Structure(Structure),
}

impl Variant {
    /// Native type tag; for arrays the element type
    pub fn builtin_type(&self) -> BuiltinType {
        match self {
            Variant::Empty => BuiltinType::Null,
            Variant::Boolean(_) => BuiltinType::Boolean,
            Variant::SByte(_) => BuiltinType::SByte,
            Variant::Byte(_) => BuiltinType::Byte,
            Variant::Int16(_) => BuiltinType::Int16,
            Variant::UInt16(_) => BuiltinType::UInt16,
            Variant::Int32(_) => BuiltinType::Int32,
            Variant::UInt32(_) => BuiltinType::UInt32,
            Variant::Int64(_) => BuiltinType::Int64,
            Variant::UInt64(_) => BuiltinType::UInt64,
            Variant::Float(_) => BuiltinType::Float,
            Variant::Double(_) => BuiltinType::Double,
            Variant::String(_) => BuiltinType::String,
            Variant::Array(elements) => elements
                .first()
                .map(Variant::builtin_type)
                .unwrap_or(BuiltinType::Null),
            Variant::Structure(_) => BuiltinType::Structure,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    pub fn as_array(&self) -> Option<&[Variant]> {
        match self {
            Variant::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&Structure> {
        match self {
            Variant::Structure(s) => Some(s),
            _ => None,
        }
    }

    /// Human readable kind, used in type mismatch errors
    pub fn kind_name(&self) -> String {
        if self.is_array() {
            format!("Array of {}", self.builtin_type())
        } else {
            self.builtin_type().to_string()
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => f.write_str("<empty>"),
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::SByte(v) => write!(f, "{}", v),
            Variant::Byte(v) => write!(f, "{}", v),
            Variant::Int16(v) => write!(f, "{}", v),
            Variant::UInt16(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt64(v) => write!(f, "{}", v),
            Variant::Float(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::String(v) => f.write_str(v),
            Variant::Array(elements) => {
                f.write_str("[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_str("]")
            }
            Variant::Structure(s) => {
                f.write_str("{")?;
                for (i, field) in s.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<Structure> for Variant {
    fn from(s: Structure) -> Self {
        Variant::Structure(s)
    }
}

/// One named field of a structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: Variant,
}

/// Ordered record of named fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Structure {
    pub fields: Vec<Field>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder style)
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&Variant> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Replace the value of an existing field, or append it
    pub fn set_field(&mut self, name: &str, value: Variant) {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value,
            None => self.fields.push(Field {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

macro_rules! impl_variant_from {
    ($($t:ty => $v:ident),* $(,)?) => {
        $(
            impl From<$t> for Variant {
                fn from(value: $t) -> Self {
                    Variant::$v(value)
                }
            }
        )*
    };
}

impl_variant_from! {
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl<T: Into<Variant>> From<Vec<T>> for Variant {
    fn from(values: Vec<T>) -> Self {
        Variant::Array(values.into_iter().map(Into::into).collect())
    }
}

/// A value as delivered by the transport, with its timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DataValue {
    pub value: Variant,
    #[serde(default)]
    pub source_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    pub fn new(value: impl Into<Variant>) -> Self {
        Self {
            value: value.into(),
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    pub fn with_source_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(ts);
        self
    }

    pub fn with_server_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.server_timestamp = Some(ts);
        self
    }
}

/// One recorded delivery for an item, the line format of replay files
///
/// ```json
/// {"item": "ns=2;s=Pump", "reason": "FreshData", "value": {"value": {"type": "Int32", "value": 7}}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub item: String,
    #[serde(default)]
    pub reason: ProcessReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<DataValue>,
}

/// Which timestamp of the incoming data to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampSource {
    #[default]
    Server,
    Source,
}

/// Why a consumer is asked to process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProcessReason {
    /// Processing initiated by the consumer itself
    #[default]
    None,
    /// New spontaneous data from a subscription
    FreshData,
    /// Response to an explicit read request
    ReadComplete,
    /// Response to an explicit write request
    WriteComplete,
    /// The link to the source is down
    ConnectionLost,
}

impl ProcessReason {
    /// True for the reasons that carry data to be read
    pub fn carries_data(&self) -> bool {
        matches!(self, ProcessReason::FreshData | ProcessReason::ReadComplete)
    }
}

impl fmt::Display for ProcessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessReason::None => "none",
            ProcessReason::FreshData => "freshData",
            ProcessReason::ReadComplete => "readComplete",
            ProcessReason::WriteComplete => "writeComplete",
            ProcessReason::ConnectionLost => "connectionLost",
        };
        f.write_str(name)
    }
}

/// Outcome of the last read or write service on a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataStatus {
    /// Nothing happened yet
    #[default]
    Unset,
    Good,
    /// Field absent from the last incoming structure
    Missing,
    /// Service reported a failure
    Failed,
    /// Connection to the source was lost
    Disconnected,
}

impl DataStatus {
    pub fn is_good(&self) -> bool {
        matches!(self, DataStatus::Good)
    }
}

impl fmt::Display for DataStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataStatus::Unset => "unset",
            DataStatus::Good => "good",
            DataStatus::Missing => "missing",
            DataStatus::Failed => "failed",
            DataStatus::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}
