//! The decoded value tree.
//!
//! Every node carries the type it was decoded as, so a tree with error leaves interleaved among
//! successes is still self-describing.

use std::fmt::{self, Display};

use alloy::primitives::{Address, Bytes, FixedBytes, I256, U256};
use serde::Serialize;

use crate::{error::DecodingError, error::Error, types::Type, utils::hex::encode_hex};

/// A node of the decoded value tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DecodedValue {
    /// The value was decoded.
    Value {
        /// The type the value was decoded as
        #[serde(rename = "type")]
        ty: Type,
        /// The value
        value: Value,
    },
    /// The value could not be decoded.
    Error {
        /// The type the value would have been decoded as
        #[serde(rename = "type")]
        ty: Type,
        /// Why it could not be decoded
        error: DecodingError,
    },
}

/// The payload of a successfully decoded value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// A non-reference value
    Elementary(ElementaryValue),
    /// Array elements, in index order
    Array(Vec<DecodedValue>),
    /// Struct members, in declaration order
    Struct(Vec<NamedValue>),
    /// A mapping; mappings are not enumerable and always decode empty
    Mapping,
    /// A back-reference to the object being decoded `reference` levels above this node
    Circular {
        /// How many array/struct levels up the referenced object is, starting at 1
        reference: usize,
    },
}

/// A struct member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamedValue {
    /// The member name
    pub name: String,
    /// The member value
    pub value: DecodedValue,
}

/// The contents of a `string`, which need not be valid UTF-8.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum StringValue {
    /// Valid UTF-8
    Valid(String),
    /// Raw bytes that are not valid UTF-8
    Malformed(Bytes),
}

impl From<&[u8]> for StringValue {
    fn from(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(string) => StringValue::Valid(string.to_string()),
            Err(_) => StringValue::Malformed(Bytes::copy_from_slice(bytes)),
        }
    }
}

/// A decoded non-reference value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ElementaryValue {
    /// `bool`
    Bool(bool),
    /// `uintN`
    Uint(U256),
    /// `intN`, sign-extended
    Int(I256),
    /// `fixedMxN`, as its raw scaled integer
    Fixed {
        /// The value times 10^places
        raw: I256,
        /// Decimal places
        places: u32,
    },
    /// `ufixedMxN`, as its raw scaled integer
    Ufixed {
        /// The value times 10^places
        raw: U256,
        /// Decimal places
        places: u32,
    },
    /// `address`
    Address(Address),
    /// `bytesN`
    FixedBytes(Bytes),
    /// `bytes`
    Bytes(Bytes),
    /// `string`
    String(StringValue),
    /// An enum option
    Enum {
        /// The option's index
        index: u8,
        /// The option's name
        name: String,
    },
    /// A contract reference
    Contract(Address),
    /// An external function reference
    ExternalFunction {
        /// The contract address
        address: Address,
        /// The function selector
        selector: FixedBytes<4>,
    },
    /// An internal function reference, as program counters
    InternalFunction {
        /// Program counter in the deployed code
        deployed_pc: u32,
        /// Program counter in the constructor code
        constructor_pc: u32,
    },
}

impl DecodedValue {
    /// A success node.
    pub fn value(ty: Type, value: Value) -> Self {
        DecodedValue::Value { ty, value }
    }

    /// An error node.
    pub fn error(ty: Type, error: DecodingError) -> Self {
        DecodedValue::Error { ty, error }
    }

    /// The type the node was decoded as.
    pub fn ty(&self) -> &Type {
        match self {
            DecodedValue::Value { ty, .. } | DecodedValue::Error { ty, .. } => ty,
        }
    }

    /// Whether this node is an error node.
    pub fn is_error(&self) -> bool {
        matches!(self, DecodedValue::Error { .. })
    }

    /// The embedded error, if this is an error node.
    pub fn as_error(&self) -> Option<&DecodingError> {
        match self {
            DecodedValue::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The elementary payload, if this is an elementary success node.
    pub fn as_elementary(&self) -> Option<&ElementaryValue> {
        match self {
            DecodedValue::Value { value: Value::Elementary(value), .. } => Some(value),
            _ => None,
        }
    }

    /// The unsigned integer payload, if any.
    pub fn as_uint(&self) -> Option<U256> {
        match self.as_elementary() {
            Some(ElementaryValue::Uint(value)) => Some(*value),
            _ => None,
        }
    }

    /// The elements, if this is an array node.
    pub fn as_array(&self) -> Option<&[DecodedValue]> {
        match self {
            DecodedValue::Value { value: Value::Array(elements), .. } => Some(elements),
            _ => None,
        }
    }

    /// The members, if this is a struct node.
    pub fn as_struct(&self) -> Option<&[NamedValue]> {
        match self {
            DecodedValue::Value { value: Value::Struct(members), .. } => Some(members),
            _ => None,
        }
    }

    /// Looks up a struct member by name.
    pub fn member(&self, name: &str) -> Option<&DecodedValue> {
        self.as_struct()?.iter().find(|member| member.name == name).map(|member| &member.value)
    }

    /// Serializes the tree as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Eyre(eyre::eyre!(e)))
    }
}

impl Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Value { value, .. } => write!(f, "{value}"),
            DecodedValue::Error { ty, error } => write!(f, "<{ty}: {error}>"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Elementary(value) => write!(f, "{value}"),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            Value::Struct(members) => {
                write!(f, "{{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", member.name, member.value)?;
                }
                write!(f, " }}")
            }
            Value::Mapping => write!(f, "mapping()"),
            Value::Circular { reference } => write!(f, "<circular ^{reference}>"),
        }
    }
}

fn format_scaled(
    f: &mut fmt::Formatter<'_>,
    negative: bool,
    magnitude: U256,
    places: u32,
) -> fmt::Result {
    if places == 0 {
        return write!(f, "{}{magnitude}", if negative { "-" } else { "" });
    }

    let digits = magnitude.to_string();
    let places = places as usize;
    let padded = if digits.len() <= places {
        format!("{}{digits}", "0".repeat(places - digits.len() + 1))
    } else {
        digits
    };
    let (whole, fraction) = padded.split_at(padded.len() - places);
    write!(f, "{}{whole}.{fraction}", if negative { "-" } else { "" })
}

impl Display for ElementaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementaryValue::Bool(value) => write!(f, "{value}"),
            ElementaryValue::Uint(value) => write!(f, "{value}"),
            ElementaryValue::Int(value) => write!(f, "{value}"),
            ElementaryValue::Fixed { raw, places } => {
                format_scaled(f, raw.is_negative(), raw.unsigned_abs(), *places)
            }
            ElementaryValue::Ufixed { raw, places } => format_scaled(f, false, *raw, *places),
            ElementaryValue::Address(address) | ElementaryValue::Contract(address) => {
                write!(f, "{address}")
            }
            ElementaryValue::FixedBytes(bytes) | ElementaryValue::Bytes(bytes) => {
                write!(f, "0x{}", encode_hex(bytes))
            }
            ElementaryValue::String(StringValue::Valid(string)) => write!(f, "{string:?}"),
            ElementaryValue::String(StringValue::Malformed(bytes)) => {
                write!(f, "hex\"{}\"", encode_hex(bytes))
            }
            ElementaryValue::Enum { name, index } => {
                if name.is_empty() {
                    write!(f, "{index}")
                } else {
                    write!(f, "{name}")
                }
            }
            ElementaryValue::ExternalFunction { address, selector } => {
                write!(f, "{address}.{selector}")
            }
            ElementaryValue::InternalFunction { deployed_pc, constructor_pc } => {
                write!(f, "internal(deployed: {deployed_pc}, constructor: {constructor_pc})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;

    fn uint(value: u64) -> DecodedValue {
        DecodedValue::value(
            Type::uint256(),
            Value::Elementary(ElementaryValue::Uint(U256::from(value))),
        )
    }

    #[test]
    fn test_display_array_with_error_leaf() {
        let array = DecodedValue::value(
            Type::dynamic_array(Type::uint256(), Location::Memory),
            Value::Array(vec![
                uint(1),
                DecodedValue::error(
                    Type::uint256(),
                    DecodingError::OverlargePointer { raw: U256::from(0x100) },
                ),
            ]),
        );
        assert_eq!(array.to_string(), "[1, <uint256: pointer 0x100 is too large to address>]");
    }

    #[test]
    fn test_member_lookup() {
        let point = DecodedValue::value(
            Type::structure("1", "Point", Location::Memory),
            Value::Struct(vec![
                NamedValue { name: "x".to_string(), value: uint(3) },
                NamedValue { name: "y".to_string(), value: uint(4) },
            ]),
        );
        assert_eq!(point.member("y").and_then(DecodedValue::as_uint), Some(U256::from(4)));
        assert!(point.member("z").is_none());
        assert_eq!(point.to_string(), "{ x: 3, y: 4 }");
    }

    #[test]
    fn test_fixed_point_display() {
        let value = ElementaryValue::Fixed { raw: I256::try_from(-1505).expect("fits"), places: 3 };
        assert_eq!(value.to_string(), "-1.505");

        let value = ElementaryValue::Ufixed { raw: U256::from(5), places: 2 };
        assert_eq!(value.to_string(), "0.05");
    }

    #[test]
    fn test_string_value_from_bytes() {
        assert_eq!(StringValue::from(&b"hi"[..]), StringValue::Valid("hi".to_string()));
        assert!(matches!(StringValue::from(&[0xff, 0xfe][..]), StringValue::Malformed(_)));
    }

    #[test]
    fn test_to_json_tags_status() {
        let json = uint(7).to_json().expect("failed to serialize");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("invalid json");
        assert_eq!(parsed["status"], "value");
        assert_eq!(parsed["type"]["kind"], "uint");
    }
}
